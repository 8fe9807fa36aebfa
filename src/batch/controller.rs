//! Batch execution controller: the job state machine.
//!
//! Every method runs on the presentation thread. The only thing that crosses
//! to the worker is the job's [`JobToken`] and the sending half of the queue.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use super::job::{BatchJob, ExecutionState, JobId, JobSnapshot, JobSummary};
use super::token::JobToken;
use super::worker::{BatchMessage, BatchWorker, JobEvent};
use super::BatchSettings;
use crate::delivery::{drain_pending, EventBus, ResultSink};
use crate::error::{ControlAction, Rejection};
use crate::modes::ModeArbiter;
use crate::provider::AiBackend;

struct ActiveJob {
    job: BatchJob,
    token: JobToken,
    started: Instant,
}

/// Owns at most one batch job and the worker that drives it.
pub struct BatchController {
    backend: Arc<dyn AiBackend>,
    model: String,
    arbiter: Arc<ModeArbiter>,
    settings: BatchSettings,
    runtime: Handle,
    bus: EventBus<BatchMessage>,
    receiver: Receiver<BatchMessage>,
    state: ExecutionState,
    active: Option<ActiveJob>,
    last: Option<(BatchJob, JobSummary)>,
    worker: Option<JoinHandle<()>>,
}

impl BatchController {
    pub fn new(
        backend: Arc<dyn AiBackend>,
        model: impl Into<String>,
        arbiter: Arc<ModeArbiter>,
        settings: BatchSettings,
        runtime: Handle,
    ) -> Self {
        let (bus, receiver) = EventBus::new_pair();
        Self {
            backend,
            model: model.into(),
            arbiter,
            settings,
            runtime,
            bus,
            receiver,
            state: ExecutionState::Idle,
            active: None,
            last: None,
            worker: None,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Replace the placeholder sentinel, e.g. after a language switch.
    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.settings.placeholder = placeholder.into();
    }

    /// Split `text` into items and start processing them in the background.
    pub fn start(&mut self, text: &str) -> Result<JobId, Rejection> {
        if self.state.is_active() {
            return Err(Rejection::AlreadyActive(self.state));
        }
        if text.trim().is_empty() {
            return Err(Rejection::EmptyInput);
        }
        if self.settings.is_placeholder(text) {
            return Err(Rejection::PlaceholderInput);
        }
        if self.arbiter.is_auto_capture_enabled() {
            return Err(Rejection::AutoCaptureActive);
        }

        let job = BatchJob::from_text(text);
        let job_id = job.id();
        let token = JobToken::new();

        self.transition(ExecutionState::Running, None);

        let worker = BatchWorker {
            job: job_id,
            items: job.items().to_vec(),
            backend: Arc::clone(&self.backend),
            model: self.model.clone(),
            settings: self.settings.clone(),
            token: token.clone(),
            bus: self.bus.clone(),
            previous: self.worker.take(),
        };
        let span = info_span!("batch_job", job_id = %job_id);
        self.worker = Some(self.runtime.spawn(worker.run().instrument(span)));

        info!(job_id = %job_id, total = job.total(), "Batch job started");
        self.active = Some(ActiveJob {
            job,
            token,
            started: Instant::now(),
        });
        Ok(job_id)
    }

    pub fn pause(&mut self) -> Result<(), Rejection> {
        let (job_id, token) = self.require(ExecutionState::Running, ControlAction::Pause)?;
        // Queue the report before signalling so it precedes anything the
        // worker emits afterwards.
        self.transition(ExecutionState::Paused, Some(job_id));
        token.pause();
        info!(job_id = %job_id, "Batch job paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), Rejection> {
        let (job_id, token) = self.require(ExecutionState::Paused, ControlAction::Resume)?;
        self.transition(ExecutionState::Running, Some(job_id));
        token.resume();
        info!(job_id = %job_id, "Batch job resumed");
        Ok(())
    }

    /// Stop the active job. No event of that job reaches a sink afterwards.
    pub fn stop(&mut self) -> Result<(), Rejection> {
        let rejection = Rejection::InvalidTransition {
            from: self.state,
            action: ControlAction::Stop,
        };
        if !self.state.is_active() {
            return Err(rejection);
        }
        let Some(active) = self.active.take() else {
            return Err(rejection);
        };
        active.token.stop();

        let summary = JobSummary {
            job_id: active.job.id(),
            total: active.job.total(),
            succeeded: active.job.succeeded(),
            failed: active.job.failed(),
            elapsed: active.started.elapsed(),
            exhausted: false,
        };
        info!(
            job_id = %summary.job_id,
            completed = summary.completed(),
            total = summary.total,
            "Batch job stopped"
        );
        self.last = Some((active.job, summary));

        self.transition(ExecutionState::Stopped, None);
        self.transition(ExecutionState::Idle, None);
        Ok(())
    }

    /// Read-only view of the active job, or of the last finished one.
    pub fn snapshot(&self) -> JobSnapshot {
        let (job, summary) = match (&self.active, &self.last) {
            (Some(active), _) => (Some(&active.job), None),
            (None, Some((job, summary))) => (Some(job), Some(summary.clone())),
            (None, None) => (None, None),
        };
        JobSnapshot {
            job_id: job.map(BatchJob::id),
            state: self.state,
            completed: job.map_or(0, BatchJob::completed),
            total: job.map_or(0, BatchJob::total),
            items: job.map(|j| j.items().to_vec()).unwrap_or_default(),
            summary,
        }
    }

    /// Deliver everything queued so far to `sink`. Call from the presentation
    /// loop; returns the number of notifications delivered.
    pub fn pump(&mut self, sink: &mut dyn ResultSink) -> usize {
        let mut delivered = 0;
        for message in drain_pending(&self.receiver) {
            match message {
                BatchMessage::State { job, state } => {
                    if job.is_some() && job != self.active_id() {
                        debug!(state = %state, "Discarding state report of finished job");
                        continue;
                    }
                    sink.on_state_changed(state);
                    delivered += 1;
                }
                BatchMessage::Job { job, event } => {
                    if Some(job) != self.active_id() {
                        debug!(job_id = %job, "Discarding event of inactive job");
                        continue;
                    }
                    delivered += self.apply(event, sink);
                }
            }
        }
        delivered
    }

    fn apply(&mut self, event: JobEvent, sink: &mut dyn ResultSink) -> usize {
        match event {
            JobEvent::ItemFinished { index, item } => {
                if let Some(active) = self.active.as_mut() {
                    active.job.apply_settled(index, item.clone());
                }
                sink.on_item_finished(index, &item);
                1
            }
            JobEvent::Progress { completed, total } => {
                sink.on_progress(completed, total);
                1
            }
            JobEvent::Log(line) => {
                debug!(target: "flashbatch::batch::log", "{}", line);
                sink.on_log(&line);
                1
            }
            JobEvent::Finished(summary) => {
                if let Some(active) = self.active.take() {
                    self.last = Some((active.job, summary));
                }
                sink.on_state_changed(ExecutionState::Stopped);
                sink.on_state_changed(ExecutionState::Idle);
                self.state = ExecutionState::Idle;
                2
            }
        }
    }

    fn require(
        &self,
        expected: ExecutionState,
        action: ControlAction,
    ) -> Result<(JobId, JobToken), Rejection> {
        match &self.active {
            Some(active) if self.state == expected => Ok((active.job.id(), active.token.clone())),
            _ => Err(Rejection::InvalidTransition {
                from: self.state,
                action,
            }),
        }
    }

    fn active_id(&self) -> Option<JobId> {
        self.active.as_ref().map(|active| active.job.id())
    }

    /// Record a state change and queue its report for the next pump. A report
    /// scoped to a job is dropped if that job has finished by then.
    fn transition(&mut self, state: ExecutionState, job: Option<JobId>) {
        self.state = state;
        self.bus.emit(BatchMessage::State { job, state });
    }
}

impl Drop for BatchController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.token.stop();
        }
    }
}
