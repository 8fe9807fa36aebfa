//! Batch job data model: jobs, work items, and the controller state enum.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Phase of the batch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl ExecutionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Running => "running",
            ExecutionState::Paused => "paused",
            ExecutionState::Stopped => "stopped",
        }
    }

    /// Whether a job is currently owned by the controller.
    pub fn is_active(self) -> bool {
        matches!(self, ExecutionState::Running | ExecutionState::Paused)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job identifier, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(u64);

impl JobId {
    /// Generate the next job ID
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        JobId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Outcome of a single work item. Only moves forward out of `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Pending,
    Succeeded,
    Failed,
}

/// One line of the submitted text, transformed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub original: String,
    pub result: Option<String>,
    pub outcome: ItemOutcome,
    pub error: Option<String>,
}

impl WorkItem {
    pub fn new(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            result: None,
            outcome: ItemOutcome::Pending,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == ItemOutcome::Pending
    }

    /// Mark the item succeeded. Returns false (and leaves the item untouched)
    /// if it was already settled.
    pub fn succeed(&mut self, result: String) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.result = Some(result);
        self.outcome = ItemOutcome::Succeeded;
        true
    }

    /// Mark the item failed. Returns false if it was already settled.
    pub fn fail(&mut self, error: String) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.error = Some(error);
        self.outcome = ItemOutcome::Failed;
        true
    }
}

/// Split raw input into work items: one per line, trimmed, blank lines skipped.
pub fn split_into_items(text: &str) -> Vec<WorkItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(WorkItem::new)
        .collect()
}

/// A submitted batch. Items are fixed at construction; only outcomes change.
#[derive(Debug, Clone)]
pub struct BatchJob {
    id: JobId,
    items: Vec<WorkItem>,
}

impl BatchJob {
    pub fn from_text(text: &str) -> Self {
        Self {
            id: JobId::next(),
            items: split_into_items(text),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Number of items no longer pending.
    pub fn completed(&self) -> usize {
        self.items.iter().filter(|item| !item.is_pending()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(ItemOutcome::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemOutcome::Failed)
    }

    fn count(&self, outcome: ItemOutcome) -> usize {
        self.items.iter().filter(|item| item.outcome == outcome).count()
    }

    /// Replace a pending item with its settled copy reported by the worker.
    pub(crate) fn apply_settled(&mut self, index: usize, settled: WorkItem) -> bool {
        match self.items.get_mut(index) {
            Some(item) if item.is_pending() && !settled.is_pending() => {
                *item = settled;
                true
            }
            _ => false,
        }
    }
}

/// Final accounting for a job, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// True when the queue ran dry, false when the caller stopped the job.
    pub exhausted: bool,
}

impl JobSummary {
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Read-only view of the active (or most recent) job for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Option<JobId>,
    pub state: ExecutionState,
    pub completed: usize,
    pub total: usize,
    pub items: Vec<WorkItem>,
    pub summary: Option<JobSummary>,
}
