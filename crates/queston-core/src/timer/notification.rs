//! Notification projection.
//!
//! Translates a timer snapshot into the abstract (text, actions) pair that
//! an external renderer turns into an OS notification. Pure function, no
//! I/O; `None` means any prior notification should be cancelled.

use serde::{Deserialize, Serialize};

use super::{TimerSnapshot, TimerState};

/// Action buttons offered on the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Pause,
    Resume,
    Skip,
    Stop,
}

/// Abstract notification intent; rendering is the host's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub text: String,
    pub actions: Vec<NotificationAction>,
}

/// `mm:ss` rendering of a second count.
pub fn format_mm_ss(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Project a snapshot into its notification intent.
pub fn project(snapshot: &TimerSnapshot) -> Option<Notification> {
    match snapshot.state {
        TimerState::Idle => None,
        TimerState::Running => Some(Notification {
            text: format!(
                "{} - {}",
                snapshot.phase.label(),
                format_mm_ss(snapshot.remaining_secs)
            ),
            actions: vec![
                NotificationAction::Pause,
                NotificationAction::Skip,
                NotificationAction::Stop,
            ],
        }),
        TimerState::Paused => Some(Notification {
            text: format!("Paused - {}", format_mm_ss(snapshot.remaining_secs)),
            actions: vec![NotificationAction::Resume, NotificationAction::Stop],
        }),
    }
}
