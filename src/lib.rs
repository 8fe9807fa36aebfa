//! Flashbatch: batch execution core for an AI flashcard utility
//!
//! Raw text is split into one work item per line and pushed through a
//! generative-AI backend by a pausable, stoppable background worker. Results
//! are marshaled back to a single-threaded presentation loop.

pub mod batch;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod modes;
pub mod provider;
pub mod storage;

pub use batch::{BatchController, BatchSettings, ExecutionState, JobId, JobSnapshot, WorkItem};
pub use cleanup::CleanupWorker;
pub use delivery::ResultSink;
pub use error::{ApiError, Rejection};
pub use modes::ModeArbiter;
pub use provider::AiBackend;
