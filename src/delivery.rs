//! Presentation-thread delivery.
//!
//! Background work never touches presentation state. It posts messages on an
//! [`EventBus`]; the presentation loop owns the receiving end and applies the
//! messages to a [`ResultSink`] on its own turn.

use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::warn;

use crate::batch::{ExecutionState, WorkItem};
use crate::error::ApiError;

/// Sending half of a presentation queue. Cheap to clone, safe to move to workers.
#[derive(Debug)]
pub struct EventBus<E> {
    sender: Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new_pair() -> (Self, Receiver<E>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }

    /// Fire-and-forget post. A closed receiver means the presentation side is
    /// gone; the event is dropped and `false` returned.
    pub fn emit(&self, event: E) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("presentation queue closed, dropping event");
                false
            }
        }
    }
}

/// Drain everything currently queued without blocking.
pub(crate) fn drain_pending<E>(receiver: &Receiver<E>) -> Vec<E> {
    let mut drained = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        drained.push(event);
    }
    drained
}

/// Presentation-side receiver of batch and cleanup notifications.
///
/// Every method is invoked on the thread that calls `pump`, never from a worker.
pub trait ResultSink {
    fn on_progress(&mut self, completed: usize, total: usize);

    fn on_log(&mut self, line: &str);

    fn on_state_changed(&mut self, state: ExecutionState);

    /// A work item settled (succeeded or failed).
    fn on_item_finished(&mut self, _index: usize, _item: &WorkItem) {}

    /// Enable or disable the control that triggers text cleanup.
    fn on_cleanup_available(&mut self, _available: bool) {}

    /// Cleanup succeeded; the caller replaces its input with `cleaned`.
    fn on_cleanup_finished(&mut self, _cleaned: &str) {}

    /// A user-visible error notification (dialog, toast).
    fn on_error_notification(&mut self, _message: &str) {}

    /// Cleanup failed with `error`. Delivered right after the notification.
    fn on_cleanup_failed(&mut self, _error: &ApiError) {}
}

/// A sink that records everything it receives. Used by the driver binary's
/// summary output and by tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub progress: Vec<(usize, usize)>,
    pub logs: Vec<String>,
    pub states: Vec<ExecutionState>,
    pub finished_items: Vec<(usize, WorkItem)>,
    pub cleanup_available: Vec<bool>,
    pub cleaned: Vec<String>,
    pub errors: Vec<String>,
    pub failures: Vec<ApiError>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total count of progress and log deliveries.
    pub fn progress_and_log_count(&self) -> usize {
        self.progress.len() + self.logs.len()
    }
}

impl ResultSink for RecordingSink {
    fn on_progress(&mut self, completed: usize, total: usize) {
        self.progress.push((completed, total));
    }

    fn on_log(&mut self, line: &str) {
        self.logs.push(line.to_string());
    }

    fn on_state_changed(&mut self, state: ExecutionState) {
        self.states.push(state);
    }

    fn on_item_finished(&mut self, index: usize, item: &WorkItem) {
        self.finished_items.push((index, item.clone()));
    }

    fn on_cleanup_available(&mut self, available: bool) {
        self.cleanup_available.push(available);
    }

    fn on_cleanup_finished(&mut self, cleaned: &str) {
        self.cleaned.push(cleaned.to_string());
    }

    fn on_error_notification(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn on_cleanup_failed(&mut self, error: &ApiError) {
        self.failures.push(error.clone());
    }
}
