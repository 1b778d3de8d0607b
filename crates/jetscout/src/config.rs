//! Configuration management for jetscout.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::Uncased,
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::StaticIdentity;
use crate::view::DEFAULT_EXPORT_PREFIX;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "jetscout";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "scouting.db";

/// Prefix of environment variables that override the config file.
const ENV_PREFIX: &str = "JETSCOUT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `JETSCOUT_`)
/// 2. TOML config file at `~/.config/jetscout/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Who submissions are attributed to.
    pub identity: IdentityConfig,
    /// Scouting form configuration.
    pub form: FormConfig,
    /// Live list configuration.
    pub view: ViewConfig,
    /// CSV export configuration.
    pub export: ExportConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/jetscout/scouting.db`
    pub database_path: Option<PathBuf>,
}

/// Identity configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Signed-in user when `--user` is not given. Unset means anonymous.
    pub user: Option<String>,
}

/// Form-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Interval between auto timer readings in milliseconds.
    pub timer_tick_ms: u64,
}

/// Live list configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Records younger than this many seconds are highlighted.
    pub recent_window_secs: u64,
    /// How often `watch` checks the database for writes by other processes.
    pub poll_interval_ms: u64,
    /// Maximum rows `watch` prints per update.
    pub watch_rows: usize,
}

/// Export-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory export files are written to. Defaults to the current directory.
    pub output_dir: Option<PathBuf>,
    /// File name prefix; the export date and `.csv` are appended.
    pub file_prefix: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { timer_tick_ms: 16 }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: 300,
            poll_interval_ms: 500,
            watch_rows: 10,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            file_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `JETSCOUT_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered figment for a given config file.
    ///
    /// Environment keys split on their first underscore only, so
    /// `JETSCOUT_VIEW_POLL_INTERVAL_MS` sets `view.poll_interval_ms`.
    #[must_use]
    pub fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file).nested())
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                Uncased::from(key.as_str().replacen('_', ".", 1))
            }))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.form.timer_tick_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "timer_tick_ms must be greater than 0".to_string(),
            });
        }

        if self.view.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "poll_interval_ms must be greater than 0".to_string(),
            });
        }

        let prefix = self.export.file_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::ConfigValidation {
                message: "file_prefix cannot be empty".to_string(),
            });
        }
        if prefix.contains(['/', '\\']) {
            return Err(Error::ConfigValidation {
                message: format!("file_prefix cannot contain a path separator: {prefix}"),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the export directory, defaulting to the current directory.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve the caller, preferring an explicit name over the configured one.
    #[must_use]
    pub fn caller_identity(&self, explicit: Option<&str>) -> StaticIdentity {
        StaticIdentity::from_name(explicit.or(self.identity.user.as_deref()))
    }

    /// Get the auto timer tick as a Duration.
    #[must_use]
    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.form.timer_tick_ms)
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.view.poll_interval_ms)
    }

    /// Get the recency window.
    #[must_use]
    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.view.recent_window_secs).unwrap_or(i64::MAX))
    }
}
