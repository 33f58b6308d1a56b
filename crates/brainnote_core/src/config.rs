//! Core runtime configuration.
//!
//! # Responsibility
//! - Resolve on-disk locations (database file, log directory) from one data dir.
//! - Resolve the per-user storage key for page snapshots.
//!
//! # Invariants
//! - `log_level` is always a canonical level accepted by `init_logging`.

use crate::logging::{default_log_level, normalize_level, LoggingError};
use crate::repo::page_repo::page_storage_key;
use std::path::{Path, PathBuf};

/// File name of the SQLite snapshot database inside the data directory.
pub const DB_FILE_NAME: &str = "brainnote.sqlite3";
/// Log subdirectory inside the data directory.
pub const LOG_DIR_NAME: &str = "logs";

/// Paths and identity used to open one page store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    data_dir: PathBuf,
    user_id: Option<String>,
    log_level: &'static str,
}

impl CoreConfig {
    /// Creates a guest configuration rooted at `data_dir` with the
    /// build-mode default log level.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            user_id: None,
            log_level: default_log_level(),
        }
    }

    /// Scopes the configuration to a signed-in user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Overrides the log level.
    ///
    /// # Errors
    /// - `UnsupportedLevel` when `level` is not a known level.
    pub fn with_log_level(mut self, level: &str) -> Result<Self, LoggingError> {
        self.log_level = normalize_level(level)?;
        Ok(self)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn log_level(&self) -> &'static str {
        self.log_level
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    /// Namespaced snapshot key for the configured user.
    pub fn storage_key(&self) -> String {
        page_storage_key(self.user_id.as_deref())
    }
}
