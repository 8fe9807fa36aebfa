//! Shared test utilities for integration tests
//!
//! A scripted backend whose calls can fail, panic or be held in flight, and a
//! harness that plays the presentation loop for a controller.

use async_trait::async_trait;
use flashbatch::batch::{BatchController, BatchSettings, ExecutionState};
use flashbatch::delivery::RecordingSink;
use flashbatch::error::ApiError;
use flashbatch::modes::ModeArbiter;
use flashbatch::provider::AiBackend;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::Notify;

/// Serializes tests that touch process environment variables.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one scripted backend call.
pub enum Step {
    Reply(String),
    Fail(String),
    Panic(&'static str),
    /// Stay in flight until the gate is opened, then reply.
    Hold(Arc<Notify>, String),
}

pub fn reply(text: &str) -> Step {
    Step::Reply(text.to_string())
}

pub fn fail(message: &str) -> Step {
    Step::Fail(message.to_string())
}

pub fn hold(gate: &Arc<Notify>, text: &str) -> Step {
    Step::Hold(Arc::clone(gate), text.to_string())
}

/// Backend that plays a script, then echoes `card: <text>`.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            ..Self::default()
        })
    }

    /// Prompts received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AiBackend for ScriptedBackend {
    async fn generate(&self, text: &str, _model: &str) -> Result<String, ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.calls.lock().unwrap().push(text.to_string());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(message)) => Err(ApiError::ProviderRequestFailed(message)),
            Some(Step::Panic(message)) => panic!("{}", message),
            Some(Step::Hold(gate, reply)) => {
                gate.notified().await;
                Ok(reply)
            }
            None => Ok(format!("card: {}", text)),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Poll `condition` until it holds or the timeout elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A controller plus the presentation loop that drives it.
///
/// Field order matters: the controller drops before its runtime.
pub struct Harness {
    pub controller: BatchController,
    pub sink: RecordingSink,
    pub arbiter: Arc<ModeArbiter>,
    pub backend: Arc<ScriptedBackend>,
    pub runtime: Runtime,
}

impl Harness {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_settings(steps, BatchSettings::default())
    }

    pub fn with_settings(steps: Vec<Step>, settings: BatchSettings) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let backend = ScriptedBackend::new(steps);
        let arbiter = Arc::new(ModeArbiter::default());
        let controller = BatchController::new(
            backend.clone(),
            "test-model",
            Arc::clone(&arbiter),
            settings,
            runtime.handle().clone(),
        );
        Self {
            controller,
            sink: RecordingSink::new(),
            arbiter,
            backend,
            runtime,
        }
    }

    pub fn pump(&mut self) -> usize {
        self.controller.pump(&mut self.sink)
    }

    /// Pump until `condition` holds on the harness.
    pub fn pump_until(&mut self, mut condition: impl FnMut(&Harness) -> bool) -> bool {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            self.pump();
            if condition(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    pub fn pump_until_idle(&mut self) {
        assert!(
            self.pump_until(|h| h.controller.state() == ExecutionState::Idle),
            "controller did not return to idle"
        );
    }

    pub fn wait_for_calls(&self, count: usize) {
        let backend = Arc::clone(&self.backend);
        assert!(
            wait_until(|| backend.call_count() >= count),
            "backend never reached {} call(s)",
            count
        );
    }
}
