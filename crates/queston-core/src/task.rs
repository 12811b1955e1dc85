//! Tasks and their per-approach augmentation params.
//!
//! A task is deliberately minimal; productivity approaches layer extra
//! data on top of it without touching the base row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work sessions are charged against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    /// Rough size estimate in minutes, used to plan a pomodoro cycle.
    pub estimate_min: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Extra per-task data contributed by one productivity approach.
///
/// Stored as one JSON row per (task, approach) pair; re-augmenting the
/// same approach replaces the previous params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "approach", rename_all = "snake_case")]
pub enum TaskAugmentation {
    /// Time-blocking: the task has a slot on the calendar.
    Calendar {
        scheduled_at: DateTime<Utc>,
        duration_min: u32,
    },
    /// Getting Things Done: context and the concrete next action.
    Gtd {
        context: String,
        next_action: String,
    },
    /// Eisenhower matrix quadrant.
    Eisenhower { urgent: bool, important: bool },
    /// Eat-the-frog difficulty ranking.
    Frog { difficulty: u8, is_frog: bool },
}

impl TaskAugmentation {
    pub fn approach(&self) -> &'static str {
        match self {
            Self::Calendar { .. } => "calendar",
            Self::Gtd { .. } => "gtd",
            Self::Eisenhower { .. } => "eisenhower",
            Self::Frog { .. } => "frog",
        }
    }
}
