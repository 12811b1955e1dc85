//! Core error types for queston-core.
//!
//! A thiserror-based hierarchy: `CoreError` is the umbrella type, with
//! dedicated sub-enums for timer transitions, database access and
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::TimerState;

/// Core error type for queston-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer transition errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Failures returned by timer commands.
///
/// Every command on the timer returns synchronously with either the new
/// snapshot or one of these; none are silently swallowed. A failed command
/// leaves the in-memory state exactly as it was before the command.
#[derive(Error, Debug)]
pub enum TimerError {
    /// Command is not valid in the current state (e.g. `pause` while idle)
    #[error("command '{command}' is not valid in state '{state}'")]
    InvalidTransition {
        command: &'static str,
        state: TimerState,
    },

    /// `start` was issued without a bound task
    #[error("cannot start a session without a selected task")]
    NoTaskSelected,

    /// A session record was finalized twice
    #[error("session record {record_id} is already finalized")]
    AlreadyFinalized { record_id: i64 },

    /// A store operation failed; the transition was rolled back
    #[error("persistence failure: {0}")]
    Persistence(#[from] DatabaseError),

    /// Settings could not be read; the command failed and state is unchanged
    #[error("settings unavailable: {0}")]
    SettingsUnavailable(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// A session record referenced by a handle no longer exists
    #[error("session record {0} not found")]
    RecordNotFound(i64),

    /// Database is locked
    #[error("database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key in get/set
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
