//! The pomodoro timer state machine.
//!
//! The machine is pure: it never touches the database, the settings file or
//! the real clock. Commands receive the current wall-clock instant and
//! return either the transition's outcome or a [`TimerError`]; transitions
//! that end a phase return a [`PhaseEnd`] that the orchestrating owner
//! ([`crate::PomodoroService`]) must persist. Because the machine is `Clone`,
//! the owner snapshots it before a transition and restores the clone if
//! persistence fails, so in-memory state never diverges from what was
//! durably recorded.
//!
//! ## State transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> (completed | skipped | stopped) -> Idle
//! ```
//!
//! Remaining time is recomputed from elapsed wall time on every observation,
//! never decremented per tick, so scheduling jitter and process suspension
//! cannot cause drift.

use chrono::{DateTime, Utc};

use super::{SessionPhaseType, TimerSnapshot, TimerState};
use crate::error::TimerError;
use crate::session::RecordHandle;
use crate::storage::PomodoroSettings;

/// Outcome of a transition that ended a phase.
///
/// Carries everything the owner needs to finalize the provisional session
/// record and decide whether to chain into the next phase.
#[derive(Debug, Clone)]
pub struct PhaseEnd {
    pub record: RecordHandle,
    pub task_id: i64,
    pub phase: SessionPhaseType,
    /// Active seconds spent in the phase (paused time excluded).
    pub actual_secs: u32,
    pub interruptions: u32,
    /// True only for natural completion via `tick`.
    pub completed: bool,
    /// Next phase per the cycle rule.
    pub next_phase: SessionPhaseType,
    /// Whether the settings captured at phase start ask for auto-start.
    pub auto_start_next: bool,
}

#[derive(Debug, Clone)]
struct ActivePhase {
    phase: SessionPhaseType,
    task_id: i64,
    planned_secs: u32,
    /// Remaining seconds at the moment the current run segment began
    /// (equals `planned_secs` on first start, the frozen value on resume).
    remaining_at_run_start: u32,
    running: bool,
    interruptions: u32,
    /// When the current run segment began.
    run_started_at: DateTime<Utc>,
    /// When the phase itself began (provisional record's start time).
    phase_started_at: DateTime<Utc>,
    /// Settings captured at phase start; mid-phase settings changes do not
    /// alter a running phase.
    settings: PomodoroSettings,
    record: RecordHandle,
}

impl ActivePhase {
    fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        if self.running {
            let elapsed = (now - self.run_started_at).num_seconds().max(0);
            let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
            self.remaining_at_run_start.saturating_sub(elapsed)
        } else {
            self.remaining_at_run_start
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Active(ActivePhase),
}

/// Pure pomodoro state machine.
///
/// All commands must be serialized through one owner; the machine itself is
/// not synchronized. See the module docs for the persistence hand-off
/// protocol.
#[derive(Debug, Clone)]
pub struct TimerStateMachine {
    state: State,
    /// Focus phases completed since the last long break.
    focus_completed_in_cycle: u32,
    /// Suggested phase for the next `start`, updated at each phase end.
    next_phase_hint: SessionPhaseType,
}

impl Default for TimerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerStateMachine {
    pub fn new() -> Self {
        Self::with_cycle_progress(0)
    }

    /// Create an idle machine with a restored cycle counter (used after
    /// process restart so long-break scheduling survives).
    pub fn with_cycle_progress(focus_completed_in_cycle: u32) -> Self {
        Self {
            state: State::Idle,
            focus_completed_in_cycle,
            next_phase_hint: SessionPhaseType::Focus,
        }
    }

    /// Reconstruct a paused phase from a persisted provisional record.
    ///
    /// Rehydrated timers are always paused, never silently auto-resumed.
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrate_paused(
        task_id: i64,
        phase: SessionPhaseType,
        planned_secs: u32,
        remaining_secs: u32,
        interruptions: u32,
        phase_started_at: DateTime<Utc>,
        settings: PomodoroSettings,
        record: RecordHandle,
        focus_completed_in_cycle: u32,
    ) -> Self {
        Self {
            state: State::Active(ActivePhase {
                phase,
                task_id,
                planned_secs,
                remaining_at_run_start: remaining_secs.min(planned_secs),
                running: false,
                interruptions,
                run_started_at: phase_started_at,
                phase_started_at,
                settings,
                record,
            }),
            focus_completed_in_cycle,
            next_phase_hint: SessionPhaseType::Focus,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        match &self.state {
            State::Idle => TimerState::Idle,
            State::Active(p) if p.running => TimerState::Running,
            State::Active(_) => TimerState::Paused,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn cycle_progress(&self) -> u32 {
        self.focus_completed_in_cycle
    }

    /// The phase the cycle rule suggests starting next.
    pub fn next_phase(&self) -> SessionPhaseType {
        self.next_phase_hint
    }

    /// Immutable view of the machine at `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        match &self.state {
            State::Idle => {
                TimerSnapshot::idle(self.next_phase_hint, self.focus_completed_in_cycle)
            }
            State::Active(p) => TimerSnapshot {
                state: if p.running {
                    TimerState::Running
                } else {
                    TimerState::Paused
                },
                phase: p.phase,
                remaining_secs: p.remaining_secs(now),
                planned_secs: p.planned_secs,
                interruptions: p.interruptions,
                task_id: Some(p.task_id),
                focus_completed_in_cycle: self.focus_completed_in_cycle,
                started_at: p.running.then_some(p.run_started_at),
            },
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a phase. Valid only from idle; the caller has already opened
    /// the provisional record.
    pub fn begin_phase(
        &mut self,
        task_id: i64,
        phase: SessionPhaseType,
        settings: PomodoroSettings,
        record: RecordHandle,
        now: DateTime<Utc>,
    ) -> Result<(), TimerError> {
        if !self.is_idle() {
            return Err(self.invalid("start"));
        }
        let planned_secs = settings.duration_for(phase);
        self.state = State::Active(ActivePhase {
            phase,
            task_id,
            planned_secs,
            remaining_at_run_start: planned_secs,
            running: true,
            interruptions: 0,
            run_started_at: now,
            phase_started_at: now,
            settings,
            record,
        });
        Ok(())
    }

    /// Freeze the remaining time and count an interruption.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        match &mut self.state {
            State::Active(p) if p.running => {
                p.remaining_at_run_start = p.remaining_secs(now);
                p.running = false;
                p.interruptions += 1;
                Ok(())
            }
            _ => Err(self.invalid("pause")),
        }
    }

    /// Resume a paused phase; remaining time is unchanged.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        match &mut self.state {
            State::Active(p) if !p.running => {
                p.running = true;
                p.run_started_at = now;
                Ok(())
            }
            _ => Err(self.invalid("resume")),
        }
    }

    /// Cooperative advance. Returns `Some(PhaseEnd)` when the running phase
    /// has reached zero remaining seconds; otherwise a no-op.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<PhaseEnd> {
        let completed = match &self.state {
            State::Active(p) if p.running && p.remaining_secs(now) == 0 => true,
            _ => false,
        };
        if !completed {
            return None;
        }
        let p = self.take_active();
        let next_phase = self.advance_cycle(p.phase, &p.settings);
        Some(PhaseEnd {
            record: p.record,
            task_id: p.task_id,
            phase: p.phase,
            actual_secs: p.planned_secs,
            interruptions: p.interruptions,
            completed: true,
            next_phase,
            auto_start_next: p.settings.auto_start_next_phase,
        })
    }

    /// Abandon the current phase and advance to the next one without
    /// waiting for natural completion. A skipped phase does not count
    /// toward the long-break cycle.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<PhaseEnd, TimerError> {
        if self.is_idle() {
            return Err(self.invalid("skip"));
        }
        let p = self.take_active();
        let next_phase = if p.phase.is_focus() {
            SessionPhaseType::ShortBreak
        } else {
            SessionPhaseType::Focus
        };
        self.next_phase_hint = next_phase;
        Ok(PhaseEnd {
            actual_secs: p.planned_secs - p.remaining_secs(now).min(p.planned_secs),
            record: p.record,
            task_id: p.task_id,
            phase: p.phase,
            interruptions: p.interruptions,
            completed: false,
            next_phase,
            auto_start_next: p.settings.auto_start_next_phase,
        })
    }

    /// End the session entirely: finalize the phase as not completed,
    /// clear the task binding and reset the cycle counter.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<PhaseEnd, TimerError> {
        if self.is_idle() {
            return Err(self.invalid("stop"));
        }
        let p = self.take_active();
        self.focus_completed_in_cycle = 0;
        self.next_phase_hint = SessionPhaseType::Focus;
        Ok(PhaseEnd {
            actual_secs: p.planned_secs - p.remaining_secs(now).min(p.planned_secs),
            record: p.record,
            task_id: p.task_id,
            phase: p.phase,
            interruptions: p.interruptions,
            completed: false,
            next_phase: SessionPhaseType::Focus,
            auto_start_next: false,
        })
    }

    /// Apply the cycle rule for a phase that completed outside the machine
    /// (e.g. it ran to completion while the process was down).
    pub fn record_offline_completion(
        &mut self,
        phase: SessionPhaseType,
        settings: &PomodoroSettings,
    ) {
        self.advance_cycle(phase, settings);
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Completing a focus phase increments the cycle counter; hitting the
    /// configured sessions-per-cycle yields a long break and resets the
    /// counter. Completing any break yields focus.
    fn advance_cycle(
        &mut self,
        completed: SessionPhaseType,
        settings: &PomodoroSettings,
    ) -> SessionPhaseType {
        let next = if completed.is_focus() {
            self.focus_completed_in_cycle += 1;
            if self.focus_completed_in_cycle >= settings.sessions_per_cycle.max(1) {
                self.focus_completed_in_cycle = 0;
                SessionPhaseType::LongBreak
            } else {
                SessionPhaseType::ShortBreak
            }
        } else {
            SessionPhaseType::Focus
        };
        self.next_phase_hint = next;
        next
    }

    fn take_active(&mut self) -> ActivePhase {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Active(p) => p,
            State::Idle => unreachable!("take_active called while idle"),
        }
    }

    fn invalid(&self, command: &'static str) -> TimerError {
        TimerError::InvalidTransition {
            command,
            state: self.state(),
        }
    }
}
