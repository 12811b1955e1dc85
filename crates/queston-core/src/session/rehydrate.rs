use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::{RecordHandle, SessionRecorder};
use crate::error::TimerError;
use crate::storage::{SessionRecord, SessionStore, SettingsProvider};
use crate::timer::TimerStateMachine;

/// What startup reconciliation found in the store.
#[derive(Debug, Clone)]
pub enum Rehydration {
    /// No unfinalized record; the timer starts idle.
    Fresh,
    /// The interrupted phase had already run past its planned duration
    /// while the process was down. It was finalized as completed and the
    /// timer starts idle, cycle credit applied.
    CompletedWhileAway(SessionRecord),
    /// The interrupted phase still had time left. The timer resumes it
    /// paused at the reduced remaining time, never running.
    ResumedPaused(SessionRecord),
}

/// Reconcile the latest unfinalized record against the wall clock and
/// build the timer the process starts with.
pub fn rehydrate<S: SessionStore, P: SettingsProvider>(
    recorder: &SessionRecorder<S>,
    settings: &P,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<(TimerStateMachine, Rehydration), TimerError> {
    let cycle = recorder.store().cycle_progress(user_id)?;

    let Some(record) = recorder.store().find_latest_unfinalized(user_id)? else {
        return Ok((TimerStateMachine::with_cycle_progress(cycle), Rehydration::Fresh));
    };

    let settings = settings.settings()?;
    let elapsed = (now - record.started_at).num_seconds().max(0);

    if elapsed >= i64::from(record.planned_secs) {
        // Ran to completion while the process was down. Finalize at the
        // moment the phase would have ended, not at startup time.
        let handle = RecordHandle::new(record.id);
        let ended_at = record.started_at + Duration::seconds(i64::from(record.planned_secs));
        let finalized = recorder.finalize(
            &handle,
            record.planned_secs,
            record.interruptions,
            true,
            ended_at,
        )?;
        let mut machine = TimerStateMachine::with_cycle_progress(cycle);
        machine.record_offline_completion(record.phase, &settings);
        recorder
            .store()
            .set_cycle_progress(user_id, machine.cycle_progress())?;
        info!(
            record_id = finalized.id,
            phase = finalized.phase.as_str(),
            "finalized session that completed while away"
        );
        Ok((machine, Rehydration::CompletedWhileAway(finalized)))
    } else {
        let remaining = record.planned_secs - elapsed as u32;
        let machine = TimerStateMachine::rehydrate_paused(
            record.task_id,
            record.phase,
            record.planned_secs,
            remaining,
            record.interruptions,
            record.started_at,
            settings,
            RecordHandle::new(record.id),
            cycle,
        );
        info!(
            record_id = record.id,
            remaining_secs = remaining,
            "rehydrated interrupted session as paused"
        );
        Ok((machine, Rehydration::ResumedPaused(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, NewSession, PomodoroSettings};
    use crate::timer::{SessionPhaseType, TimerState};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn recorder() -> SessionRecorder<Database> {
        SessionRecorder::new(Database::open_in_memory().unwrap())
    }

    fn open_focus(rec: &SessionRecorder<Database>, started_at: DateTime<Utc>) -> i64 {
        rec.store()
            .insert(&NewSession {
                user_id: 1,
                task_id: 7,
                phase: SessionPhaseType::Focus,
                planned_secs: 1500,
                started_at,
            })
            .unwrap()
    }

    #[test]
    fn empty_store_starts_fresh() {
        let rec = recorder();
        let (machine, outcome) =
            rehydrate(&rec, &PomodoroSettings::default(), 1, t0()).unwrap();
        assert!(machine.is_idle());
        assert!(matches!(outcome, Rehydration::Fresh));
    }

    #[test]
    fn fresh_start_restores_persisted_cycle_progress() {
        let rec = recorder();
        rec.store().set_cycle_progress(1, 2).unwrap();
        let (machine, _) = rehydrate(&rec, &PomodoroSettings::default(), 1, t0()).unwrap();
        assert_eq!(machine.cycle_progress(), 2);
    }

    #[test]
    fn overdue_record_is_finalized_completed_and_timer_idles() {
        let rec = recorder();
        let id = open_focus(&rec, t0());
        let now = t0() + Duration::seconds(1500); // exactly at the planned end

        let (machine, outcome) =
            rehydrate(&rec, &PomodoroSettings::default(), 1, now).unwrap();
        assert!(machine.is_idle());
        assert_eq!(machine.cycle_progress(), 1);

        let Rehydration::CompletedWhileAway(record) = outcome else {
            panic!("expected CompletedWhileAway");
        };
        assert_eq!(record.id, id);
        assert!(record.completed);
        assert_eq!(record.actual_secs, 1500);
        assert_eq!(record.ended_at, Some(t0() + Duration::seconds(1500)));
        assert_eq!(rec.store().cycle_progress(1).unwrap(), 1);
    }

    #[test]
    fn in_flight_record_resumes_paused_with_reduced_remaining() {
        let rec = recorder();
        let id = open_focus(&rec, t0());
        let now = t0() + Duration::seconds(600);

        let (machine, outcome) =
            rehydrate(&rec, &PomodoroSettings::default(), 1, now).unwrap();
        let snap = machine.snapshot(now);
        assert_eq!(snap.state, TimerState::Paused);
        assert_eq!(snap.remaining_secs, 900);
        assert_eq!(snap.task_id, Some(7));
        assert!(matches!(outcome, Rehydration::ResumedPaused(r) if r.id == id));

        // The row stays open until the resumed phase actually ends.
        assert!(rec.store().find_latest_unfinalized(1).unwrap().is_some());
    }

    #[test]
    fn other_users_records_are_ignored() {
        let rec = recorder();
        open_focus(&rec, t0());
        let (machine, outcome) =
            rehydrate(&rec, &PomodoroSettings::default(), 2, t0()).unwrap();
        assert!(machine.is_idle());
        assert!(matches!(outcome, Rehydration::Fresh));
    }
}
