//! Runtime configuration for the composition root.
//!
//! # Responsibility
//! - Resolve the database path and logging settings from the environment.
//! - Fall back to `~/.snip/` defaults.
//!
//! # Invariants
//! - Configuration is an explicit value handed to `open_db` and
//!   `init_logging`; nothing here is cached in global state.
//! - Blank environment values are treated as unset.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "SNIP_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "SNIP_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "SNIP_LOG_DIR";

const DATA_DIR_NAME: &str = ".snip";
const DB_FILE_NAME: &str = "notes.db";
const LOG_DIR_NAME: &str = "logs";

/// Configuration resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No explicit path was configured and the home directory is unknown.
    HomeDirUnavailable,
    /// `SNIP_LOG_LEVEL` holds an unsupported value.
    InvalidLogLevel(String),
    /// `SNIP_LOG_DIR` is not an absolute path.
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HomeDirUnavailable => write!(
                f,
                "home directory unavailable; set {DB_PATH_ENV} and {LOG_DIR_ENV}"
            ),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::RelativeLogDir(path) => write!(
                f,
                "{LOG_DIR_ENV} must be an absolute path, got `{}`",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {}

/// Settings consumed by the process composition root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    pub log_dir: PathBuf,
}

impl CoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Resolves configuration from an arbitrary key lookup.
    ///
    /// `home` supplies the base for defaults when a value is not set.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let data_dir = home.map(|dir| dir.join(DATA_DIR_NAME));

        let db_path = match read(DB_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => data_dir
                .as_deref()
                .map(|dir| dir.join(DB_FILE_NAME))
                .ok_or(ConfigError::HomeDirUnavailable)?,
        };

        let log_level = match read(LOG_LEVEL_ENV) {
            Some(level) => normalize_level(&level).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        let log_dir = match read(LOG_DIR_ENV) {
            Some(dir) => absolute_log_dir(PathBuf::from(dir))?,
            None => data_dir
                .as_deref()
                .map(|dir| dir.join(LOG_DIR_NAME))
                .ok_or(ConfigError::HomeDirUnavailable)?,
        };

        Ok(Self {
            db_path,
            log_level,
            log_dir,
        })
    }

    /// Log directory as a UTF-8 string for `init_logging`.
    pub fn log_dir_str(&self) -> String {
        self.log_dir.to_string_lossy().into_owned()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn absolute_log_dir(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Err(ConfigError::RelativeLogDir(path))
    }
}
