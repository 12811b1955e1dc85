//! TOML-based application configuration.
//!
//! Stores the pomodoro schedule parameters and the active user. Stored at
//! `~/.config/queston/config.toml`. Durations are minutes in the file; the
//! engine works in seconds via [`PomodoroSettings`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, TimerError};
use crate::timer::SessionPhaseType;

/// Phase durations and cycle parameters, in seconds.
///
/// Read at phase-start time only: a running phase keeps the planned
/// duration it was started with even if the configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    pub focus_secs: u32,
    pub short_break_secs: u32,
    pub long_break_secs: u32,
    /// Focus phases per cycle before a long break.
    pub sessions_per_cycle: u32,
    /// Start the next phase automatically when one completes.
    pub auto_start_next_phase: bool,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            focus_secs: 25 * 60,
            short_break_secs: 5 * 60,
            long_break_secs: 15 * 60,
            sessions_per_cycle: 4,
            auto_start_next_phase: false,
        }
    }
}

impl PomodoroSettings {
    pub fn duration_for(&self, phase: SessionPhaseType) -> u32 {
        match phase {
            SessionPhaseType::Focus => self.focus_secs,
            SessionPhaseType::ShortBreak => self.short_break_secs,
            SessionPhaseType::LongBreak => self.long_break_secs,
        }
    }
}

/// Supplies the settings a phase start should use.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> Result<PomodoroSettings, TimerError>;
}

/// Fixed settings; handy for tests and embedded hosts.
impl SettingsProvider for PomodoroSettings {
    fn settings(&self) -> Result<PomodoroSettings, TimerError> {
        Ok(*self)
    }
}

/// Reads the on-disk configuration at each phase start, so edits to the
/// config file take effect on the next phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigSettings;

impl SettingsProvider for ConfigSettings {
    fn settings(&self) -> Result<PomodoroSettings, TimerError> {
        Config::load()
            .map(|cfg| cfg.pomodoro_settings())
            .map_err(|e| TimerError::SettingsUnavailable(e.to_string()))
    }
}

/// Schedule section of the config file, durations in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break: u32,
    #[serde(default = "default_long_break")]
    pub long_break: u32,
    #[serde(default = "default_sessions_per_cycle")]
    pub sessions_per_cycle: u32,
    #[serde(default)]
    pub auto_start_next_phase: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/queston/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Active user whose sessions the timer records.
    #[serde(default = "default_user_id")]
    pub user_id: i64,
}

fn default_focus_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_sessions_per_cycle() -> u32 {
    4
}
fn default_user_id() -> i64 {
    1
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            sessions_per_cycle: default_sessions_per_cycle(),
            auto_start_next_phase: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            user_id: default_user_id(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the default config on first run.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// The engine-facing view of the schedule section.
    pub fn pomodoro_settings(&self) -> PomodoroSettings {
        PomodoroSettings {
            focus_secs: self.schedule.focus_duration * 60,
            short_break_secs: self.schedule.short_break * 60,
            long_break_secs: self.schedule.long_break * 60,
            sessions_per_cycle: self.schedule.sessions_per_cycle,
            auto_start_next_phase: self.schedule.auto_start_next_phase,
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and persist.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed
    /// as the existing value's type, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.save()
    }

    /// Load from disk, returning default on error. Never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

fn get_json_value_by_path<'a>(
    root: &'a serde_json::Value,
    key: &str,
) -> Option<&'a serde_json::Value> {
    if key.is_empty() {
        return None;
    }
    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn set_json_value_by_path(
    root: &mut serde_json::Value,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let mut parts = key.split('.').peekable();
    if parts.peek().is_none() {
        return Err(unknown());
    }

    let mut current = root;
    while let Some(part) = parts.next() {
        let is_leaf = parts.peek().is_none();
        if is_leaf {
            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        current = current.get_mut(part).ok_or_else(unknown)?;
    }

    Err(unknown())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.schedule.focus_duration, 25);
        assert_eq!(parsed.schedule.sessions_per_cycle, 4);
        assert_eq!(parsed.user_id, 1);
    }

    #[test]
    fn settings_are_converted_to_seconds() {
        let cfg = Config::default();
        let s = cfg.pomodoro_settings();
        assert_eq!(s.focus_secs, 1500);
        assert_eq!(s.short_break_secs, 300);
        assert_eq!(s.long_break_secs, 900);
        assert!(!s.auto_start_next_phase);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("schedule.focus_duration").as_deref(), Some("25"));
        assert_eq!(
            cfg.get("schedule.auto_start_next_phase").as_deref(),
            Some("false")
        );
        assert!(cfg.get("schedule.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_json_value_by_path_updates_number_and_bool() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        set_json_value_by_path(&mut json, "schedule.focus_duration", "50").unwrap();
        set_json_value_by_path(&mut json, "schedule.auto_start_next_phase", "true").unwrap();
        assert_eq!(
            get_json_value_by_path(&json, "schedule.focus_duration").unwrap(),
            &serde_json::Value::Number(50.into())
        );
        assert_eq!(
            get_json_value_by_path(&json, "schedule.auto_start_next_phase").unwrap(),
            &serde_json::Value::Bool(true)
        );
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        assert!(matches!(
            set_json_value_by_path(&mut json, "schedule.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_json_value_by_path_rejects_invalid_type() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        assert!(matches!(
            set_json_value_by_path(&mut json, "schedule.auto_start_next_phase", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn fixed_settings_provider_returns_itself() {
        let s = PomodoroSettings::default();
        assert_eq!(s.settings().unwrap(), s);
    }

    #[test]
    fn duration_for_maps_phases() {
        let s = PomodoroSettings::default();
        assert_eq!(s.duration_for(SessionPhaseType::Focus), 1500);
        assert_eq!(s.duration_for(SessionPhaseType::ShortBreak), 300);
        assert_eq!(s.duration_for(SessionPhaseType::LongBreak), 900);
    }
}
