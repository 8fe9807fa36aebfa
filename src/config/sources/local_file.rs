//! Working-directory config file source: ./flashbatch.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;

pub const LOCAL_CONFIG_FILE: &str = "flashbatch.toml";

/// Add the working-directory config file to builder if present.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    work_dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = work_dir.join(LOCAL_CONFIG_FILE);
    if path.exists() {
        return Ok(builder.add_source(File::from(path).required(false)));
    }
    Ok(builder)
}
