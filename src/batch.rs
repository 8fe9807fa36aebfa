//! Batch execution
//!
//! A submitted text is split into one [`WorkItem`] per non-blank line and
//! driven through the AI backend by a single background worker. The
//! [`BatchController`] owns the state machine and is driven entirely from the
//! presentation thread; results come back through [`BatchController::pump`].

use serde::{Deserialize, Serialize};

mod controller;
mod job;
mod token;
mod worker;

pub use controller::BatchController;
pub use job::{
    split_into_items, BatchJob, ExecutionState, ItemOutcome, JobId, JobSnapshot, JobSummary,
    WorkItem,
};
pub use token::JobToken;

/// Marker replaced by the item text in [`BatchSettings::item_prompt`].
pub const TEXT_MARKER: &str = "{text}";

/// Batch section of the application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Prompt sent for each item; `{text}` is replaced by the item.
    #[serde(default = "default_item_prompt")]
    pub item_prompt: String,

    /// Text shown in an empty input field. Submitting it verbatim is refused.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Drop the in-flight backend call on stop instead of letting it finish.
    #[serde(default = "default_true")]
    pub cancel_in_flight: bool,
}

fn default_item_prompt() -> String {
    TEXT_MARKER.to_string()
}

fn default_placeholder() -> String {
    "Paste text here, one sentence per line".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            item_prompt: default_item_prompt(),
            placeholder: default_placeholder(),
            cancel_in_flight: default_true(),
        }
    }
}

impl BatchSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.item_prompt.contains(TEXT_MARKER) {
            return Err(format!("item_prompt must contain {}", TEXT_MARKER));
        }
        Ok(())
    }

    pub fn render_prompt(&self, text: &str) -> String {
        self.item_prompt.replace(TEXT_MARKER, text)
    }

    pub(crate) fn is_placeholder(&self, text: &str) -> bool {
        let placeholder = self.placeholder.trim();
        !placeholder.is_empty() && text.trim() == placeholder
    }
}
