//! End-to-end flows through the service: full cycles, interruption
//! accounting and crash recovery across process restarts.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use queston_core::{
    Database, ManualClock, PomodoroService, PomodoroSettings, Rehydration, SessionPhaseType,
    SessionStore, TimerState,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn service_at(
    db: Database,
    start: DateTime<Utc>,
) -> (PomodoroService<Database, PomodoroSettings>, ManualClock) {
    let clock = ManualClock::new(start);
    let svc = PomodoroService::new(
        db,
        PomodoroSettings::default(),
        Arc::new(clock.clone()),
        1,
    )
    .unwrap();
    (svc, clock)
}

#[test]
fn full_cycle_ends_in_long_break() {
    let (mut svc, clock) = service_at(Database::open_in_memory().unwrap(), t0());

    // Four focus phases with short breaks in between.
    for round in 1..=4u32 {
        svc.start(Some(1), None).unwrap();
        assert_eq!(svc.snapshot().phase, SessionPhaseType::Focus);
        clock.advance_secs(1500);
        let record = svc.tick().unwrap().unwrap();
        assert!(record.completed);

        if round < 4 {
            assert_eq!(svc.snapshot().phase, SessionPhaseType::ShortBreak);
            svc.start(None, None).unwrap();
            clock.advance_secs(300);
            svc.tick().unwrap().unwrap();
        }
    }

    // The fourth completion earns the long break and resets the counter.
    let snap = svc.snapshot();
    assert_eq!(snap.phase, SessionPhaseType::LongBreak);
    assert_eq!(snap.focus_completed_in_cycle, 0);

    let stats = svc.store().stats_all(1).unwrap();
    assert_eq!(stats.completed_pomodoros, 4);
    assert_eq!(stats.total_focus_secs, 4 * 1500);
    assert_eq!(stats.total_break_secs, 3 * 300);
}

#[test]
fn pause_time_never_counts_as_work() {
    let (mut svc, clock) = service_at(Database::open_in_memory().unwrap(), t0());
    svc.start(Some(1), None).unwrap();

    clock.advance_secs(10);
    let paused = svc.pause().unwrap();
    assert_eq!(paused.remaining_secs, 1490);
    assert_eq!(paused.interruptions, 1);

    clock.advance_secs(3600); // a long lunch
    assert_eq!(svc.snapshot().remaining_secs, 1490);
    svc.resume().unwrap();
    clock.advance_secs(5);

    let record = svc.stop().unwrap();
    assert_eq!(record.actual_secs, 15);
    assert_eq!(record.interruptions, 1);
    assert!(!record.completed);
}

#[test]
fn every_phase_end_produces_exactly_one_record() {
    let (mut svc, clock) = service_at(Database::open_in_memory().unwrap(), t0());
    let mut events = svc.subscribe_records();

    svc.start(Some(1), None).unwrap();
    clock.advance_secs(1500);
    svc.tick().unwrap().unwrap();

    svc.start(None, None).unwrap();
    clock.advance_secs(60);
    svc.skip().unwrap();

    svc.start(None, None).unwrap();
    svc.stop().unwrap();

    let mut seen = Vec::new();
    while let Ok(record) = events.try_recv() {
        seen.push(record.id);
    }
    assert_eq!(seen.len(), 3);
    seen.dedup();
    assert_eq!(seen.len(), 3, "a record was finalized twice");

    // Extra ticks after idle finalize nothing.
    clock.advance_secs(10_000);
    assert!(svc.tick().unwrap().is_none());
}

#[test]
fn restart_mid_phase_resumes_paused_where_wall_clock_left_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queston.db");

    {
        let (mut svc, clock) = service_at(Database::open_at(&path).unwrap(), t0());
        svc.start(Some(1), None).unwrap();
        clock.advance_secs(400);
        svc.tick().unwrap();
        // Process dies here; the provisional row stays open.
    }

    let restart = t0() + Duration::seconds(600);
    let (mut svc, clock) = service_at(Database::open_at(&path).unwrap(), restart);

    assert!(matches!(svc.rehydration(), Rehydration::ResumedPaused(_)));
    let snap = svc.snapshot();
    assert_eq!(snap.state, TimerState::Paused);
    assert_eq!(snap.remaining_secs, 900);
    assert_eq!(snap.task_id, Some(1));

    svc.resume().unwrap();
    clock.advance_secs(900);
    let record = svc.tick().unwrap().unwrap();
    assert!(record.completed);
    assert_eq!(record.actual_secs, 1500);
}

#[test]
fn restart_after_phase_would_have_ended_finalizes_it_completed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queston.db");

    {
        let (mut svc, _clock) = service_at(Database::open_at(&path).unwrap(), t0());
        svc.start(Some(1), None).unwrap();
    }

    let restart = t0() + Duration::hours(2);
    let (svc, _clock) = service_at(Database::open_at(&path).unwrap(), restart);

    let Rehydration::CompletedWhileAway(record) = svc.rehydration() else {
        panic!("expected CompletedWhileAway");
    };
    assert!(record.completed);
    assert_eq!(record.actual_secs, 1500);
    // Finalized at the phase's own end, not at startup.
    assert_eq!(record.ended_at, Some(t0() + Duration::seconds(1500)));

    // The offline completion still earned cycle credit.
    let snap = svc.snapshot();
    assert_eq!(snap.state, TimerState::Idle);
    assert_eq!(snap.focus_completed_in_cycle, 1);
    assert_eq!(snap.phase, SessionPhaseType::ShortBreak);
    assert_eq!(svc.store().cycle_progress(1).unwrap(), 1);
}

#[test]
fn cycle_progress_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queston.db");

    let mut now = t0();
    {
        let (mut svc, clock) = service_at(Database::open_at(&path).unwrap(), now);
        for _ in 0..2 {
            svc.start(Some(1), None).unwrap();
            clock.advance_secs(1500);
            svc.tick().unwrap().unwrap();
            svc.start(None, None).unwrap();
            clock.advance_secs(300);
            svc.tick().unwrap().unwrap();
            now += Duration::seconds(1800);
        }
        assert_eq!(svc.snapshot().focus_completed_in_cycle, 2);
    }

    let (svc, _clock) = service_at(Database::open_at(&path).unwrap(), now);
    assert_eq!(svc.snapshot().focus_completed_in_cycle, 2);
}

#[test]
fn skipped_focus_earns_no_cycle_credit_but_is_recorded() {
    let (mut svc, clock) = service_at(Database::open_in_memory().unwrap(), t0());
    svc.start(Some(1), None).unwrap();
    clock.advance_secs(700);

    let record = svc.skip().unwrap();
    assert!(!record.completed);
    assert_eq!(record.actual_secs, 700);

    let snap = svc.snapshot();
    assert_eq!(snap.focus_completed_in_cycle, 0);
    assert_eq!(snap.phase, SessionPhaseType::ShortBreak);

    let stats = svc.store().stats_all(1).unwrap();
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.completed_pomodoros, 0);
}

#[test]
fn short_abandoned_focus_never_counts_as_a_pomodoro() {
    let (mut svc, clock) = service_at(Database::open_in_memory().unwrap(), t0());

    // Nine minutes is under the ten-minute floor for a counted pomodoro.
    svc.start(Some(1), None).unwrap();
    clock.advance_secs(9 * 60);
    svc.stop().unwrap();

    let stats = svc.store().stats_all(1).unwrap();
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.completed_pomodoros, 0);
    assert_eq!(stats.total_focus_secs, 540);
}
