//! Cycle planning.
//!
//! Slices a task's estimated duration into a sequence of focus and break
//! phases. Focus slots shorter than [`MIN_FOCUS_TAIL_MIN`] minutes are not
//! worth scheduling and end the plan.

use serde::{Deserialize, Serialize};

use super::SessionPhaseType;
use crate::storage::PomodoroSettings;

/// Minimum tail worth scheduling as its own focus phase, in minutes.
pub const MIN_FOCUS_TAIL_MIN: u32 = 10;

/// One phase of a planned cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPhase {
    pub phase: SessionPhaseType,
    pub duration_secs: u32,
    /// 1-based index among the plan's focus phases; 0 for breaks.
    pub focus_index: u32,
}

/// Plan the phases for a task estimated at `estimate_min` minutes.
///
/// A break is appended after a focus phase when it fits in the remaining
/// estimate, or when the focus that preceded it was a full-length one that
/// exhausted the estimate exactly.
pub fn plan_cycle(settings: &PomodoroSettings, estimate_min: u32) -> Vec<PlannedPhase> {
    let focus_min = (settings.focus_secs / 60).max(1);
    let short_min = (settings.short_break_secs / 60).max(1);
    let long_min = (settings.long_break_secs / 60).max(1);
    let per_cycle = settings.sessions_per_cycle.max(1);

    if estimate_min < MIN_FOCUS_TAIL_MIN {
        if estimate_min == 0 {
            return Vec::new();
        }
        return vec![PlannedPhase {
            phase: SessionPhaseType::Focus,
            duration_secs: estimate_min * 60,
            focus_index: 1,
        }];
    }

    let mut phases = Vec::new();
    let mut remaining = estimate_min;
    let mut focus_count = 0u32;

    while remaining >= MIN_FOCUS_TAIL_MIN {
        focus_count += 1;
        let focus_len = remaining.min(focus_min);
        phases.push(PlannedPhase {
            phase: SessionPhaseType::Focus,
            duration_secs: focus_len * 60,
            focus_index: focus_count,
        });
        remaining -= focus_len;

        let long_due = focus_count % per_cycle == 0;
        let (break_phase, break_min) = if long_due {
            (SessionPhaseType::LongBreak, long_min)
        } else {
            (SessionPhaseType::ShortBreak, short_min)
        };

        let focus_was_full = focus_len == focus_min;
        if remaining >= break_min || (focus_was_full && remaining == 0) {
            phases.push(PlannedPhase {
                phase: break_phase,
                duration_secs: break_min * 60,
                focus_index: 0,
            });
            remaining = remaining.saturating_sub(break_min);
        } else {
            break;
        }
    }

    phases
}
