//! Integration tests for layered configuration loading

use super::test_utils::ENV_MUTEX;
use flashbatch::config::{AppConfig, ConfigLoader, ProviderType, LOCAL_CONFIG_FILE};
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Points XDG_CONFIG_HOME at a scratch directory and restores every touched
/// variable on drop.
struct EnvScope {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvScope {
    fn new(config_home: &Path) -> Self {
        let mut scope = Self { saved: Vec::new() };
        scope.set("XDG_CONFIG_HOME", config_home.to_str().unwrap());
        scope
    }

    fn set(&mut self, key: &'static str, value: &str) {
        if !self.saved.iter().any(|(saved, _)| *saved == key) {
            self.saved.push((key, std::env::var_os(key)));
        }
        std::env::set_var(key, value);
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn write_global(config_home: &Path, contents: &str) {
    let dir = config_home.join("flashbatch");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), contents).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let config_home = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let _env = EnvScope::new(config_home.path());

    let config = ConfigLoader::load(work_dir.path()).unwrap();
    let defaults = AppConfig::default();

    assert_eq!(config.provider.provider_type, ProviderType::Ollama);
    assert_eq!(config.provider.model, defaults.provider.model);
    assert_eq!(config.batch.item_prompt, "{text}");
    assert!(config.batch.cancel_in_flight);
    assert!(!config.modes.auto_capture);
    assert!(config.validate().is_ok());
}

#[test]
fn test_local_file_overrides_global_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let config_home = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let _env = EnvScope::new(config_home.path());

    write_global(
        config_home.path(),
        r#"
[provider]
provider_type = "openai"
model = "gpt-4o-mini"

[batch]
item_prompt = "Global: {text}"
"#,
    );
    fs::write(
        work_dir.path().join(LOCAL_CONFIG_FILE),
        r#"
[batch]
item_prompt = "Make a flashcard for: {text}"
cancel_in_flight = false
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(work_dir.path()).unwrap();

    // Global values survive where the local file is silent
    assert_eq!(config.provider.provider_type, ProviderType::OpenAI);
    assert_eq!(config.provider.model, "gpt-4o-mini");
    assert_eq!(config.batch.item_prompt, "Make a flashcard for: {text}");
    assert!(!config.batch.cancel_in_flight);
}

#[test]
fn test_environment_overrides_files() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let config_home = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let mut env = EnvScope::new(config_home.path());

    fs::write(
        work_dir.path().join(LOCAL_CONFIG_FILE),
        "[provider]\nmodel = \"from-file\"\n",
    )
    .unwrap();
    env.set("FLASHBATCH__PROVIDER__MODEL", "from-env");
    env.set("FLASHBATCH__MODES__BATCH_MODE", "true");

    let config = ConfigLoader::load(work_dir.path()).unwrap();

    assert_eq!(config.provider.model, "from-env");
    assert!(config.modes.batch_mode);
}

#[test]
fn test_explicit_file_must_exist() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();

    let missing = ConfigLoader::load_from_file(&dir.path().join("nope.toml"));
    assert!(missing.is_err());

    let path = dir.path().join("custom.toml");
    fs::write(&path, "[cleanup]\nprompt_key = \"my_prompt\"\n").unwrap();
    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.cleanup.prompt_key, "my_prompt");
}

#[test]
fn test_invalid_item_prompt_is_reported() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[batch]\nitem_prompt = \"no marker here\"\n").unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(config.validated().is_err());
}
