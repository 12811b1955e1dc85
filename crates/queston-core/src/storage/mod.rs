pub mod config;
pub mod database;

pub use config::{Config, ConfigSettings, PomodoroSettings, ScheduleConfig, SettingsProvider};
pub use database::{Database, NewSession, SessionRecord, SessionStore, Stats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/queston[-dev]/` based on QUESTON_ENV.
///
/// Set QUESTON_ENV=dev to use a separate development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("QUESTON_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("queston-dev")
    } else {
        base_dir.join("queston")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
