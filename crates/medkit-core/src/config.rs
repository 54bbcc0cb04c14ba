//! Core configuration.
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! [schedule]
//! daily_horizon_days = 30
//! weekly_horizon_weeks = 12
//! expired_alert_hour = 10
//!
//! [backup]
//! app_name = "medkit"
//! backups_dir = "/data/backups"
//! photos_dir = "/data/photos"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Upper bound for `schedule.daily_horizon_days`.
pub const MAX_DAILY_HORIZON_DAYS: u32 = 366;
/// Upper bound for `schedule.weekly_horizon_weeks`.
pub const MAX_WEEKLY_HORIZON_WEEKS: u32 = 52;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    pub schedule: ScheduleConfig,
    pub backup: BackupConfig,
}

/// Notification horizon and timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Days of daily intakes materialized ahead of time
    pub daily_horizon_days: u32,
    /// Weeks of weekly intakes materialized ahead of time
    pub weekly_horizon_weeks: u32,
    /// Local hour at which "medicine expired" alerts fire
    pub expired_alert_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_horizon_days: 30,
            weekly_horizon_weeks: 12,
            expired_alert_hour: 10,
        }
    }
}

/// Backup archive locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupConfig {
    /// Prefix of archive file names
    pub app_name: String,
    /// Directory holding finished archives
    pub backups_dir: PathBuf,
    /// Live photo directory
    pub photos_dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            app_name: "medkit".to_string(),
            backups_dir: PathBuf::from("backups"),
            photos_dir: PathBuf::from("photos"),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: CoreConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "schedule.daily_horizon_days",
            self.schedule.daily_horizon_days,
            MAX_DAILY_HORIZON_DAYS,
        )?;
        check_range(
            "schedule.weekly_horizon_weeks",
            self.schedule.weekly_horizon_weeks,
            MAX_WEEKLY_HORIZON_WEEKS,
        )?;
        if self.schedule.expired_alert_hour > 23 {
            return Err(ConfigError::Invalid {
                field: "schedule.expired_alert_hour",
                reason: format!("{} is not an hour of the day", self.schedule.expired_alert_hour),
            });
        }
        let name = self.backup.app_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "backup.app_name",
                reason: "must be a non-empty file name prefix".into(),
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: u32, max: u32) -> ConfigResult<()> {
    if (1..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        reason: format!("{} is outside 1..={}", value, max),
    })
}
