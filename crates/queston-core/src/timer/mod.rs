//! Timer domain types and the pomodoro state machine.

mod cycle;
mod engine;
mod notification;

pub use cycle::{plan_cycle, PlannedPhase, MIN_FOCUS_TAIL_MIN};
pub use engine::{PhaseEnd, TimerStateMachine};
pub use notification::{format_mm_ss, project, Notification, NotificationAction};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of phase a pomodoro session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhaseType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionPhaseType {
    pub fn is_focus(self) -> bool {
        self == SessionPhaseType::Focus
    }

    pub fn is_break(self) -> bool {
        matches!(
            self,
            SessionPhaseType::ShortBreak | SessionPhaseType::LongBreak
        )
    }

    /// Human-readable label used by the notification projector.
    pub fn label(self) -> &'static str {
        match self {
            SessionPhaseType::Focus => "Focus",
            SessionPhaseType::ShortBreak => "Short break",
            SessionPhaseType::LongBreak => "Long break",
        }
    }

    /// Stable string used in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhaseType::Focus => "focus",
            SessionPhaseType::ShortBreak => "short_break",
            SessionPhaseType::LongBreak => "long_break",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "focus" => Some(SessionPhaseType::Focus),
            "short_break" => Some(SessionPhaseType::ShortBreak),
            "long_break" => Some(SessionPhaseType::LongBreak),
            _ => None,
        }
    }
}

impl fmt::Display for SessionPhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The coarse state of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Immutable point-in-time view of the timer.
///
/// Every transition produces a new snapshot; nothing is mutated in place.
/// While a phase is active, `remaining_secs <= planned_secs` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    /// Current phase while active; the suggested next phase while idle.
    pub phase: SessionPhaseType,
    pub remaining_secs: u32,
    pub planned_secs: u32,
    /// Pause events within the current phase.
    pub interruptions: u32,
    pub task_id: Option<i64>,
    /// Focus phases completed since the last long break.
    pub focus_completed_in_cycle: u32,
    /// When the current run segment began; `None` while idle or paused.
    pub started_at: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    pub fn running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub(crate) fn idle(next_phase: SessionPhaseType, focus_completed_in_cycle: u32) -> Self {
        Self {
            state: TimerState::Idle,
            phase: next_phase,
            remaining_secs: 0,
            planned_secs: 0,
            interruptions: 0,
            task_id: None,
            focus_completed_in_cycle,
            started_at: None,
        }
    }
}
