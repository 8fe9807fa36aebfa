//! Merge rules: built-in defaults that every other layer overrides.
//!
//! Only keys without a serde default need to be seeded here; a file that sets
//! `provider.model` alone must still deserialize.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use crate::provider::ProviderConfig;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    let provider = ProviderConfig::default();
    Config::builder()
        .set_default("provider.provider_type", provider.provider_type.slug())?
        .set_default("provider.model", provider.model)
}
