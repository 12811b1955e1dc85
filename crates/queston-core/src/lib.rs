//! # Queston Core Library
//!
//! Core business logic for Queston, a personal productivity app built around
//! pomodoro sessions. All operations are available through a standalone CLI
//! binary; GUI hosts are thin layers over this same library.
//!
//! ## Architecture
//!
//! - **Timer engine**: a pure, wall-clock-based state machine. The caller
//!   invokes `tick()` periodically; remaining time is always recomputed from
//!   elapsed wall time, never decremented by tick count, so late or missed
//!   ticks are harmless.
//! - **Session recorder**: opens a provisional database row when a phase
//!   starts running and finalizes it exactly once when the phase ends.
//! - **Rehydration**: on startup, reconciles a possibly-stale persisted
//!   session against wall-clock time before any command is accepted.
//! - **Storage**: SQLite session storage plus TOML configuration.
//!
//! ## Key components
//!
//! - [`PomodoroService`]: orchestrating owner that serializes commands
//! - [`TimerStateMachine`]: the pure timer state machine
//! - [`SessionRecorder`]: provisional/finalize session persistence
//! - [`Database`]: SQLite-backed [`SessionStore`]
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod service;
pub mod session;
pub mod storage;
pub mod task;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result, TimerError};
pub use service::PomodoroService;
pub use session::{RecordHandle, Rehydration, SessionRecorder};
pub use storage::{
    Config, ConfigSettings, Database, NewSession, PomodoroSettings, SessionRecord, SessionStore,
    SettingsProvider, Stats,
};
pub use task::{Task, TaskAugmentation};
pub use timer::{
    Notification, NotificationAction, PhaseEnd, SessionPhaseType, TimerSnapshot, TimerState,
    TimerStateMachine,
};
