//! Error types for the flashbatch execution core.

use crate::batch::ExecutionState;
use thiserror::Error;

/// Errors returned by fallible library calls (provider, configuration, storage).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Provider call panicked: {0}")]
    ProviderPanicked(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage I/O error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Request refused: {0}")]
    Rejected(#[from] Rejection),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::StorageError(err.to_string())
    }
}

/// Control actions a caller can request from the batch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Synchronous refusal of a caller request. No state is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Input is the placeholder text")]
    PlaceholderInput,

    #[error("Auto-capture mode is enabled; disable it before starting a batch")]
    AutoCaptureActive,

    #[error("A batch job is already {0}")]
    AlreadyActive(ExecutionState),

    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        from: ExecutionState,
        action: ControlAction,
    },

    #[error("A cleanup request is already in flight")]
    CleanupInFlight,

    #[error("Prompt must not be blank")]
    BlankPrompt,
}
