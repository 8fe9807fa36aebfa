//! Configuration System
//!
//! Layered configuration built with the `config` crate. Precedence, lowest to
//! highest: built-in defaults, global user file, working-directory file,
//! `FLASHBATCH__SECTION__KEY` environment variables.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::batch::BatchSettings;
pub use crate::cleanup::CleanupSettings;
pub use crate::logging::LoggingConfig;
pub use crate::modes::ModeSettings;
pub use crate::provider::{CompletionOptions, ProviderConfig, ProviderType};
pub use crate::storage::StorageConfig;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::local_file::LOCAL_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub cleanup: CleanupSettings,

    #[serde(default)]
    pub modes: ModeSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Batch(String),
    Cleanup(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Batch(msg) => write!(f, "Batch: {}", msg),
            ValidationError::Cleanup(msg) => write!(f, "Cleanup: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl AppConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.batch.validate() {
            errors.push(ValidationError::Batch(e));
        }
        if let Err(e) = self.cleanup.validate() {
            errors.push(ValidationError::Cleanup(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all problems into one error.
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// Loads [`AppConfig`] from all layers.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a process started in `work_dir`.
    pub fn load(work_dir: &Path) -> Result<AppConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::local_file::add_to_builder(builder, work_dir)?;
        let builder = sources::environment::add_to_builder(builder);

        let config = builder.build()?;
        Ok(config.try_deserialize::<AppConfig>()?)
    }

    /// Load from one explicit file on top of the defaults. Environment overrides
    /// still apply.
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true));
        let builder = sources::environment::add_to_builder(builder);

        let config = builder.build()?;
        Ok(config.try_deserialize::<AppConfig>()?)
    }
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
