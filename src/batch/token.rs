//! Per-job control token.
//!
//! The presentation thread is the only writer, the worker loop the only reader.
//! Flags are plain atomics; the `Notify` only exists so a paused worker can sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TokenState {
    paused: AtomicBool,
    stopped: AtomicBool,
    wake: Notify,
}

/// Pause/stop signal shared between a controller and the worker of one job.
#[derive(Debug, Clone, Default)]
pub struct JobToken {
    inner: Arc<TokenState>,
}

impl JobToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Release);
        self.inner.wake.notify_one();
    }

    /// Stop is terminal; the token cannot be resumed afterwards.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Block until the job may dequeue its next item.
    ///
    /// Returns `false` once stop has been requested, `true` when running.
    pub async fn proceed(&self) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            // notify_one stores a permit when nobody waits, so a resume that
            // lands between the check above and this await is not lost.
            self.inner.wake.notified().await;
        }
    }

    /// Resolve once stop has been requested.
    pub async fn stopped(&self) {
        while !self.is_stopped() {
            self.inner.wake.notified().await;
        }
    }
}
