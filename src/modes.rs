//! Mode arbitration between batch mode and clipboard auto-capture.
//!
//! Both modes feed the same generation pipeline, so at most one may be on.
//! Turning one on forces the other off; observers hear about both changes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Initial mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSettings {
    #[serde(default)]
    pub auto_capture: bool,

    #[serde(default)]
    pub batch_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    AutoCapture,
    BatchMode,
}

/// An effective flag change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub mode: Mode,
    pub enabled: bool,
    /// True when the change was a side effect of enabling the other mode.
    pub forced: bool,
}

/// What to do with a clipboard capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardRoute {
    /// Send straight to generation.
    Generate(String),
    /// Append as a new line of the batch input.
    Collect(String),
    Ignore,
}

/// Handle returned by [`ModeArbiter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&ModeChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    auto_capture: bool,
    batch_mode: bool,
}

impl Flags {
    fn get(&self, mode: Mode) -> bool {
        match mode {
            Mode::AutoCapture => self.auto_capture,
            Mode::BatchMode => self.batch_mode,
        }
    }

    fn set(&mut self, mode: Mode, value: bool) {
        match mode {
            Mode::AutoCapture => self.auto_capture = value,
            Mode::BatchMode => self.batch_mode = value,
        }
    }
}

fn other(mode: Mode) -> Mode {
    match mode {
        Mode::AutoCapture => Mode::BatchMode,
        Mode::BatchMode => Mode::AutoCapture,
    }
}

/// Owner of the mode flag pair.
pub struct ModeArbiter {
    flags: Mutex<Flags>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: Mutex<u64>,
}

impl ModeArbiter {
    pub fn new(settings: ModeSettings) -> Self {
        let mut flags = Flags {
            auto_capture: settings.auto_capture,
            batch_mode: settings.batch_mode,
        };
        if flags.auto_capture && flags.batch_mode {
            warn!("Both batch mode and auto-capture configured on; keeping batch mode");
            flags.auto_capture = false;
        }
        Self {
            flags: Mutex::new(flags),
            observers: Mutex::new(Vec::new()),
            next_subscription: Mutex::new(0),
        }
    }

    pub fn is_auto_capture_enabled(&self) -> bool {
        self.flags.lock().auto_capture
    }

    pub fn is_batch_mode_enabled(&self) -> bool {
        self.flags.lock().batch_mode
    }

    pub fn set_auto_capture(&self, enabled: bool) {
        self.set(Mode::AutoCapture, enabled);
    }

    pub fn set_batch_mode(&self, enabled: bool) {
        self.set(Mode::BatchMode, enabled);
    }

    /// Register an observer. It is called on the thread that changed the flag,
    /// after the change is visible through the getters.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ModeChange) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.next_subscription.lock();
            *next += 1;
            SubscriptionId(*next)
        };
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Decide what a clipboard capture should do under the current modes.
    pub fn route(&self, text: &str) -> ClipboardRoute {
        let text = text.trim();
        if text.is_empty() {
            return ClipboardRoute::Ignore;
        }
        let flags = *self.flags.lock();
        if flags.auto_capture {
            ClipboardRoute::Generate(text.to_string())
        } else if flags.batch_mode {
            ClipboardRoute::Collect(text.to_string())
        } else {
            ClipboardRoute::Ignore
        }
    }

    fn set(&self, mode: Mode, enabled: bool) {
        let mut changes = Vec::with_capacity(2);
        {
            let mut flags = self.flags.lock();
            if flags.get(mode) == enabled {
                return;
            }
            flags.set(mode, enabled);
            changes.push(ModeChange {
                mode,
                enabled,
                forced: false,
            });

            let other = other(mode);
            if enabled && flags.get(other) {
                flags.set(other, false);
                changes.push(ModeChange {
                    mode: other,
                    enabled: false,
                    forced: true,
                });
            }
        }

        // Observers run without either lock held so they may call back in.
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for change in &changes {
            debug!(mode = ?change.mode, enabled = change.enabled, forced = change.forced, "Mode changed");
            for observer in &observers {
                observer(change);
            }
        }
    }
}

impl Default for ModeArbiter {
    fn default() -> Self {
        Self::new(ModeSettings::default())
    }
}

impl std::fmt::Debug for ModeArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = *self.flags.lock();
        f.debug_struct("ModeArbiter")
            .field("auto_capture", &flags.auto_capture)
            .field("batch_mode", &flags.batch_mode)
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}
