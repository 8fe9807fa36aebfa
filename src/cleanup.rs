//! One-shot text cleanup
//!
//! Sends `prompt + "\n\n" + text` to the backend in the background and
//! delivers exactly one outcome through [`CleanupWorker::pump`]. The prompt is
//! user-editable and persisted through a [`TextStore`].

use std::panic::AssertUnwindSafe;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::delivery::{drain_pending, EventBus, ResultSink};
use crate::error::{ApiError, Rejection};
use crate::provider::AiBackend;
use crate::storage::{validate_key, TextStore};

/// Cleanup section of the application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Store key of the user-editable prompt
    #[serde(default = "default_prompt_key")]
    pub prompt_key: String,

    /// Prompt written to the store on first use
    #[serde(default = "default_prompt")]
    pub default_prompt: String,
}

fn default_prompt_key() -> String {
    "clean_prompt".to_string()
}

fn default_prompt() -> String {
    "Rewrite the following German text with every sentence on its own line. \
     Output only the sentences and nothing else. Fix any mistakes."
        .to_string()
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            prompt_key: default_prompt_key(),
            default_prompt: default_prompt(),
        }
    }
}

impl CleanupSettings {
    pub fn validate(&self) -> Result<(), String> {
        validate_key(&self.prompt_key)?;
        if self.default_prompt.trim().is_empty() {
            return Err("default_prompt cannot be blank".to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
enum CleanupMessage {
    Available(bool),
    Finished(Result<String, ApiError>),
}

/// Background text cleanup with a single request in flight at a time.
pub struct CleanupWorker {
    backend: Arc<dyn AiBackend>,
    model: String,
    store: Arc<dyn TextStore>,
    settings: CleanupSettings,
    runtime: Handle,
    bus: EventBus<CleanupMessage>,
    receiver: Receiver<CleanupMessage>,
    in_flight: bool,
    /// Prompt saved this session that could not be persisted
    unsaved_prompt: Option<String>,
}

impl CleanupWorker {
    pub fn new(
        backend: Arc<dyn AiBackend>,
        model: impl Into<String>,
        store: Arc<dyn TextStore>,
        settings: CleanupSettings,
        runtime: Handle,
    ) -> Self {
        let (bus, receiver) = EventBus::new_pair();
        Self {
            backend,
            model: model.into(),
            store,
            settings,
            runtime,
            bus,
            receiver,
            in_flight: false,
            unsaved_prompt: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Current cleanup prompt. Storage failures fall back to the default.
    pub fn prompt(&self) -> String {
        if let Some(prompt) = &self.unsaved_prompt {
            return prompt.clone();
        }
        match self
            .store
            .load_text(&self.settings.prompt_key, &self.settings.default_prompt)
        {
            Ok(prompt) if !prompt.trim().is_empty() => prompt,
            Ok(_) => {
                warn!(key = %self.settings.prompt_key, "Stored cleanup prompt is blank, using default");
                self.settings.default_prompt.clone()
            }
            Err(e) => {
                warn!(key = %self.settings.prompt_key, error = %e, "Failed to load cleanup prompt, using default");
                self.settings.default_prompt.clone()
            }
        }
    }

    /// Persist a new prompt. If the store fails the prompt still applies for
    /// the rest of this session.
    pub fn save_prompt(&mut self, prompt: &str) -> Result<(), Rejection> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Rejection::BlankPrompt);
        }
        match self.store.save_text(&self.settings.prompt_key, prompt) {
            Ok(()) => {
                info!(key = %self.settings.prompt_key, "Cleanup prompt saved");
                self.unsaved_prompt = None;
            }
            Err(e) => {
                warn!(key = %self.settings.prompt_key, error = %e, "Failed to save cleanup prompt, keeping it in memory");
                self.unsaved_prompt = Some(prompt.to_string());
            }
        }
        Ok(())
    }

    /// Start cleaning `text`. The outcome arrives through [`pump`](Self::pump).
    pub fn submit_cleanup(&mut self, text: &str) -> Result<(), Rejection> {
        if self.in_flight {
            return Err(Rejection::CleanupInFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejection::EmptyInput);
        }

        let request = format!("{}\n\n{}", self.prompt(), text);
        self.in_flight = true;
        self.bus.emit(CleanupMessage::Available(false));

        let backend = Arc::clone(&self.backend);
        let model = self.model.clone();
        let bus = self.bus.clone();
        let input_chars = text.chars().count();
        self.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = AssertUnwindSafe(backend.generate(&request, &model))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(ApiError::ProviderPanicked("cleanup request panicked".to_string()))
                });
            debug!(
                input_chars,
                duration_ms = started.elapsed().as_millis() as u64,
                ok = outcome.is_ok(),
                "Cleanup request finished"
            );
            bus.emit(CleanupMessage::Finished(outcome));
        });
        Ok(())
    }

    /// Deliver queued cleanup notifications to `sink`.
    pub fn pump(&mut self, sink: &mut dyn ResultSink) -> usize {
        let mut delivered = 0;
        for message in drain_pending(&self.receiver) {
            match message {
                CleanupMessage::Available(available) => {
                    sink.on_cleanup_available(available);
                    delivered += 1;
                }
                CleanupMessage::Finished(Ok(cleaned)) => {
                    self.in_flight = false;
                    info!(chars = cleaned.chars().count(), "Text cleaned");
                    sink.on_cleanup_finished(&cleaned);
                    sink.on_log(&format!(
                        "✅ Text cleaned ({} characters)",
                        cleaned.chars().count()
                    ));
                    sink.on_cleanup_available(true);
                    delivered += 3;
                }
                CleanupMessage::Finished(Err(e)) => {
                    self.in_flight = false;
                    warn!(error = %e, "Text cleanup failed");
                    sink.on_error_notification(&format!("Could not clean the text:\n{}", e));
                    sink.on_cleanup_failed(&e);
                    sink.on_log(&format!("❌ Cleanup failed: {}", e));
                    sink.on_cleanup_available(true);
                    delivered += 4;
                }
            }
        }
        delivered
    }
}
