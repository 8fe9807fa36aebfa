//! Terminal presentation: the driver's ResultSink plus summary formatting.

use std::io::Write;

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

use crate::batch::{ExecutionState, ItemOutcome, JobSnapshot, JobSummary};
use crate::delivery::ResultSink;
use crate::error::{ApiError, ControlAction};

/// Writes deliveries to stderr as they arrive, keeping stdout for command
/// output. The cleanup outcome is kept for the caller.
pub struct TerminalSink {
    color: bool,
    out: Box<dyn Write>,
    pub cleaned: Option<String>,
    pub cleanup_error: Option<ApiError>,
}

impl TerminalSink {
    pub fn new(color: bool) -> Self {
        Self::with_writer(color, Box::new(std::io::stderr()))
    }

    pub fn with_writer(color: bool, out: Box<dyn Write>) -> Self {
        Self {
            color,
            out,
            cleaned: None,
            cleanup_error: None,
        }
    }

    fn line(&mut self, text: &str) {
        // Write failures are ignored.
        let _ = writeln!(self.out, "{}", text);
    }
}

pub fn format_progress(completed: usize, total: usize) -> String {
    let percent = if total == 0 {
        0
    } else {
        completed * 100 / total
    };
    format!("[{}/{}] {}%", completed, total, percent)
}

impl ResultSink for TerminalSink {
    fn on_progress(&mut self, completed: usize, total: usize) {
        let text = format_progress(completed, total);
        if self.color {
            let text = text.cyan().to_string();
            self.line(&text);
        } else {
            self.line(&text);
        }
    }

    fn on_log(&mut self, line: &str) {
        self.line(line);
    }

    fn on_state_changed(&mut self, state: ExecutionState) {
        let label = format!("-- {} --", state);
        if self.color {
            let label = label.dimmed().to_string();
            self.line(&label);
        } else {
            self.line(&label);
        }
    }

    fn on_cleanup_finished(&mut self, cleaned: &str) {
        self.cleaned = Some(cleaned.to_string());
    }

    fn on_error_notification(&mut self, message: &str) {
        if self.color {
            let message = message.red().to_string();
            self.line(&message);
        } else {
            self.line(message);
        }
    }

    fn on_cleanup_failed(&mut self, error: &ApiError) {
        self.cleanup_error = Some(error.clone());
    }
}

/// Map one stdin line to a control action.
pub fn parse_control(line: &str) -> Option<ControlAction> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(ControlAction::Pause),
        "r" | "resume" => Some(ControlAction::Resume),
        "s" | "stop" => Some(ControlAction::Stop),
        _ => None,
    }
}

pub fn format_item_table(snapshot: &JobSnapshot) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Text", "Outcome", "Result"]);
    for (index, item) in snapshot.items.iter().enumerate() {
        let (outcome, detail) = match item.outcome {
            ItemOutcome::Pending => ("pending", String::new()),
            ItemOutcome::Succeeded => ("ok", item.result.clone().unwrap_or_default()),
            ItemOutcome::Failed => ("failed", item.error.clone().unwrap_or_default()),
        };
        table.add_row(vec![
            (index + 1).to_string(),
            item.original.clone(),
            outcome.to_string(),
            detail,
        ]);
    }
    table.to_string()
}

pub fn format_summary(summary: &JobSummary, color: bool) -> String {
    let how = if summary.exhausted {
        "finished"
    } else {
        "stopped"
    };
    let line = format!(
        "Batch {}: {}/{} processed, {} succeeded, {} failed ({:.1}s)",
        how,
        summary.completed(),
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.elapsed.as_secs_f64()
    );
    if !color {
        line
    } else if summary.failed > 0 || !summary.exhausted {
        line.yellow().to_string()
    } else {
        line.green().to_string()
    }
}
