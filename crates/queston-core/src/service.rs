//! Orchestrating owner of the timer.
//!
//! [`PomodoroService`] serializes commands onto the pure
//! [`TimerStateMachine`] and performs the persistence the machine itself
//! never does. Every transition that ends a phase follows the same
//! contract: snapshot the machine, apply the transition, persist, and on
//! persistence failure restore the snapshot so the machine never gets
//! ahead of the database.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::TimerError;
use crate::session::{Rehydration, SessionRecorder};
use crate::storage::{SessionRecord, SessionStore, SettingsProvider};
use crate::timer::{
    self, Notification, PhaseEnd, SessionPhaseType, TimerSnapshot, TimerStateMachine,
};

pub struct PomodoroService<S: SessionStore, P: SettingsProvider> {
    machine: TimerStateMachine,
    recorder: SessionRecorder<S>,
    settings: P,
    clock: Arc<dyn Clock>,
    user_id: i64,
    /// Task the current cycle is charged against; breaks inherit it,
    /// `stop` clears it.
    current_task: Option<i64>,
    rehydration: Rehydration,
    snapshots: watch::Sender<TimerSnapshot>,
    notifications: watch::Sender<Option<Notification>>,
}

impl<S: SessionStore, P: SettingsProvider> PomodoroService<S, P> {
    /// Build the service, reconciling any interrupted session against the
    /// wall clock before the first command is accepted.
    pub fn new(
        store: S,
        settings: P,
        clock: Arc<dyn Clock>,
        user_id: i64,
    ) -> Result<Self, TimerError> {
        let recorder = SessionRecorder::new(store);
        let (machine, rehydration) =
            crate::session::rehydrate(&recorder, &settings, user_id, clock.now())?;

        let current_task = machine.snapshot(clock.now()).task_id;
        let initial = machine.snapshot(clock.now());
        let (snapshots, _) = watch::channel(initial.clone());
        let (notifications, _) = watch::channel(timer::project(&initial));

        Ok(Self {
            machine,
            recorder,
            settings,
            clock,
            user_id,
            current_task,
            rehydration,
            snapshots,
            notifications,
        })
    }

    /// What startup reconciliation found.
    pub fn rehydration(&self) -> &Rehydration {
        &self.rehydration
    }

    pub fn store(&self) -> &S {
        self.recorder.store()
    }

    /// Current view of the timer; safe to call at any cadence.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.machine.snapshot(self.clock.now())
    }

    /// Watch the timer state; the receiver always holds the latest snapshot.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.subscribe()
    }

    /// Watch the user-facing notification projection of the timer.
    pub fn subscribe_notifications(&self) -> watch::Receiver<Option<Notification>> {
        self.notifications.subscribe()
    }

    /// Receive every session record finalized from now on.
    pub fn subscribe_records(&self) -> broadcast::Receiver<SessionRecord> {
        self.recorder.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a phase. `task_id` defaults to the task of the current cycle;
    /// `phase` defaults to whatever naturally comes next.
    pub fn start(
        &mut self,
        task_id: Option<i64>,
        phase: Option<SessionPhaseType>,
    ) -> Result<TimerSnapshot, TimerError> {
        if !self.machine.is_idle() {
            return Err(TimerError::InvalidTransition {
                command: "start",
                state: self.machine.state(),
            });
        }
        let task = task_id
            .or(self.current_task)
            .ok_or(TimerError::NoTaskSelected)?;
        let phase = phase.unwrap_or_else(|| self.machine.next_phase());
        self.begin(task, phase)?;
        Ok(self.publish())
    }

    /// Freeze the running phase; the pause is counted as an interruption.
    pub fn pause(&mut self) -> Result<TimerSnapshot, TimerError> {
        self.machine.pause(self.clock.now())?;
        info!("paused");
        Ok(self.publish())
    }

    /// Continue a paused phase with its remaining time unchanged.
    pub fn resume(&mut self) -> Result<TimerSnapshot, TimerError> {
        self.machine.resume(self.clock.now())?;
        info!("resumed");
        Ok(self.publish())
    }

    /// Cooperative advance. Returns the finalized record when the running
    /// phase completed on this tick, `None` otherwise. Late or missed
    /// ticks only delay completion detection, never lose time.
    pub fn tick(&mut self) -> Result<Option<SessionRecord>, TimerError> {
        let backup = self.machine.clone();
        let Some(end) = self.machine.tick(self.clock.now()) else {
            self.publish();
            return Ok(None);
        };
        info!(phase = end.phase.as_str(), "phase completed");
        let auto_start = end.auto_start_next;
        let next_phase = end.next_phase;
        let record = self.finish_phase(end, backup)?;

        if auto_start {
            if let Err(e) = self.start(None, Some(next_phase)) {
                warn!(error = %e, "auto-start of next phase failed; staying idle");
            }
        }
        self.publish();
        Ok(Some(record))
    }

    /// Abandon the current phase and move on to the next one. No cycle
    /// credit is given for a skipped focus phase.
    pub fn skip(&mut self) -> Result<SessionRecord, TimerError> {
        let backup = self.machine.clone();
        let end = self.machine.skip(self.clock.now())?;
        info!(phase = end.phase.as_str(), "phase skipped");
        let auto_start = end.auto_start_next;
        let next_phase = end.next_phase;
        let record = self.finish_phase(end, backup)?;

        if auto_start {
            if let Err(e) = self.start(None, Some(next_phase)) {
                warn!(error = %e, "auto-start after skip failed; staying idle");
            }
        }
        self.publish();
        Ok(record)
    }

    /// End the session: finalize the current phase as not completed,
    /// reset the cycle and drop the task binding.
    pub fn stop(&mut self) -> Result<SessionRecord, TimerError> {
        let backup = self.machine.clone();
        let end = self.machine.stop(self.clock.now())?;
        info!(phase = end.phase.as_str(), "session stopped");
        let record = self.finish_phase(end, backup)?;
        self.current_task = None;
        self.publish();
        Ok(record)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin(&mut self, task: i64, phase: SessionPhaseType) -> Result<(), TimerError> {
        let settings = self.settings.settings()?;
        let now = self.clock.now();
        // The idle check already happened, so opening the row first cannot
        // leave an orphan behind a rejected transition.
        let record = self.recorder.open_provisional(
            self.user_id,
            task,
            phase,
            settings.duration_for(phase),
            now,
        )?;
        self.machine.begin_phase(task, phase, settings, record, now)?;
        self.current_task = Some(task);
        info!(phase = phase.as_str(), task_id = task, "phase started");
        Ok(())
    }

    /// Persist a phase end, rolling the machine back if persistence fails.
    fn finish_phase(
        &mut self,
        end: PhaseEnd,
        backup: TimerStateMachine,
    ) -> Result<SessionRecord, TimerError> {
        let result = self.recorder.finalize(
            &end.record,
            end.actual_secs,
            end.interruptions,
            end.completed,
            self.clock.now(),
        );
        match result {
            Ok(record) => {
                if let Err(e) = self
                    .recorder
                    .store()
                    .set_cycle_progress(self.user_id, self.machine.cycle_progress())
                {
                    // The record itself is safe; progress would be rebuilt
                    // one long break late at worst.
                    warn!(error = %e, "failed to persist cycle progress");
                }
                Ok(record)
            }
            Err(e) => {
                self.machine = backup;
                warn!(error = %e, "failed to finalize phase; transition rolled back");
                self.publish();
                Err(e)
            }
        }
    }

    fn publish(&self) -> TimerSnapshot {
        let snap = self.machine.snapshot(self.clock.now());
        self.snapshots.send_replace(snap.clone());
        self.notifications.send_replace(timer::project(&snap));
        snap
    }
}
