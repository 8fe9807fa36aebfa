//! Background worker loop for one batch job.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::job::{ItemOutcome, JobId, JobSummary, WorkItem};
use super::token::JobToken;
use super::BatchSettings;
use crate::delivery::EventBus;
use crate::error::ApiError;
use crate::provider::AiBackend;

/// Message posted to the presentation queue of a [`BatchController`](super::BatchController).
#[derive(Debug, Clone)]
pub(crate) enum BatchMessage {
    /// Controller-originated state report, optionally scoped to one job.
    State {
        job: Option<JobId>,
        state: super::ExecutionState,
    },
    /// Worker-originated event, dropped if `job` is no longer active.
    Job { job: JobId, event: JobEvent },
}

#[derive(Debug, Clone)]
pub(crate) enum JobEvent {
    ItemFinished { index: usize, item: WorkItem },
    Progress { completed: usize, total: usize },
    Log(String),
    Finished(JobSummary),
}

pub(crate) struct BatchWorker {
    pub job: JobId,
    pub items: Vec<WorkItem>,
    pub backend: Arc<dyn AiBackend>,
    pub model: String,
    pub settings: BatchSettings,
    pub token: JobToken,
    pub bus: EventBus<BatchMessage>,
    /// Worker of the previous job, still finishing an in-flight call.
    pub previous: Option<JoinHandle<()>>,
}

impl BatchWorker {
    pub async fn run(mut self) {
        if let Some(previous) = self.previous.take() {
            if !previous.is_finished() {
                debug!(job_id = %self.job, "Waiting for previous worker to release the backend");
            }
            let _ = previous.await;
        }

        let started = Instant::now();
        let total = self.items.len();
        debug!(job_id = %self.job, total, "Worker started");

        for index in 0..total {
            if !self.token.proceed().await {
                debug!(job_id = %self.job, index, "Stop observed before next item");
                return;
            }

            let prompt = self.settings.render_prompt(&self.items[index].original);
            let call_started = Instant::now();
            let Some(result) = self.call_backend(&prompt).await else {
                debug!(job_id = %self.job, index, "In-flight call dropped on stop");
                return;
            };
            if self.token.is_stopped() {
                debug!(job_id = %self.job, index, "Discarding result of stopped job");
                return;
            }

            let duration_ms = call_started.elapsed().as_millis() as u64;
            let item = &mut self.items[index];
            let line = match result {
                Ok(text) => {
                    debug!(job_id = %self.job, index, duration_ms, "Item succeeded");
                    let line = format!("✅ [{}/{}] {} → {}", index + 1, total, item.original, text);
                    item.succeed(text);
                    line
                }
                Err(err) => {
                    warn!(job_id = %self.job, index, duration_ms, error = %err, "Item failed");
                    let line = format!("❌ [{}/{}] {}: {}", index + 1, total, item.original, err);
                    item.fail(err.to_string());
                    line
                }
            };

            let item = item.clone();
            self.emit(JobEvent::ItemFinished { index, item });
            self.emit(JobEvent::Progress {
                completed: index + 1,
                total,
            });
            self.emit(JobEvent::Log(line));
        }

        let summary = JobSummary {
            job_id: self.job,
            total,
            succeeded: self.count(ItemOutcome::Succeeded),
            failed: self.count(ItemOutcome::Failed),
            elapsed: started.elapsed(),
            exhausted: true,
        };
        info!(
            job_id = %self.job,
            total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = summary.elapsed.as_millis() as u64,
            "Batch job finished"
        );
        self.emit(JobEvent::Log(summary_line(&summary)));
        self.emit(JobEvent::Progress {
            completed: total,
            total,
        });
        self.emit(JobEvent::Finished(summary));
    }

    /// `None` when the call was abandoned because the job was stopped.
    async fn call_backend(&self, prompt: &str) -> Option<Result<String, ApiError>> {
        let call = AssertUnwindSafe(self.backend.generate(prompt, &self.model)).catch_unwind();

        let outcome = if self.settings.cancel_in_flight {
            tokio::select! {
                biased;
                _ = self.token.stopped() => return None,
                outcome = call => outcome,
            }
        } else {
            call.await
        };

        Some(outcome.unwrap_or_else(|payload| {
            Err(ApiError::ProviderPanicked(panic_message(payload.as_ref())))
        }))
    }

    fn count(&self, outcome: ItemOutcome) -> usize {
        self.items.iter().filter(|item| item.outcome == outcome).count()
    }

    fn emit(&self, event: JobEvent) {
        self.bus.emit(BatchMessage::Job {
            job: self.job,
            event,
        });
    }
}

pub(crate) fn summary_line(summary: &JobSummary) -> String {
    format!(
        "🏁 Finished: {} succeeded, {} failed, {} total in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.total,
        summary.elapsed.as_secs_f64()
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
