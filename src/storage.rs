//! User-editable text storage
//!
//! Small UTF-8 text blobs (the cleanup prompt) keyed by name. Files live at
//! `{data_dir}/user_files/{key}.txt` and are written atomically (write to
//! `.tmp`, then rename).

use crate::error::ApiError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const USER_FILES_DIR: &str = "user_files";

/// Storage section of the application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the per-user data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured data dir, or the platform data dir for this application.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ApiError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("", "", "flashbatch")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                ApiError::StorageError("Cannot determine a home directory".to_string())
            })
    }
}

/// Key/value text persistence used for user-editable prompts.
pub trait TextStore: Send + Sync {
    /// Read `key`. When absent, `default` is written and returned.
    fn load_text(&self, key: &str, default: &str) -> Result<String, ApiError>;

    fn save_text(&self, key: &str, value: &str) -> Result<(), ApiError>;
}

/// Keys become file names; reject anything that could leave the directory.
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Key cannot be empty".to_string());
    }
    if key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
        return Err(format!("Key '{}' is not a plain file name", key));
    }
    Ok(())
}

/// File-backed [`TextStore`]
pub struct FileTextStore {
    root: PathBuf,
}

impl FileTextStore {
    /// Store rooted at `{data_dir}/user_files`. The directory is created lazily.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            root: data_dir.as_ref().join(USER_FILES_DIR),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, ApiError> {
        Ok(Self::new(config.resolve_data_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, ApiError> {
        validate_key(key).map_err(ApiError::StorageError)?;
        Ok(self.root.join(format!("{}.txt", key)))
    }
}

impl TextStore for FileTextStore {
    fn load_text(&self, key: &str, default: &str) -> Result<String, ApiError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.save_text(key, default)?;
                Ok(default.to_string())
            }
            Err(e) => Err(ApiError::StorageError(format!(
                "Failed to read {:?}: {}",
                path, e
            ))),
        }
    }

    fn save_text(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|e| {
            ApiError::StorageError(format!(
                "Failed to create directory {:?}: {}",
                self.root, e
            ))
        })?;

        let temp_path = path.with_extension("txt.tmp");
        fs::write(&temp_path, value).map_err(|e| {
            ApiError::StorageError(format!("Failed to write {:?}: {}", temp_path, e))
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ApiError::StorageError(format!("Failed to rename temp file to {:?}: {}", path, e))
        })?;
        Ok(())
    }
}

/// In-memory [`TextStore`], for embedding without a data directory.
#[derive(Debug, Default)]
pub struct MemoryTextStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl TextStore for MemoryTextStore {
    fn load_text(&self, key: &str, default: &str) -> Result<String, ApiError> {
        Ok(self
            .entries
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| default.to_string())
            .clone())
    }

    fn save_text(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
