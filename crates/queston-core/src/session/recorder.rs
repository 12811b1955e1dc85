use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::{DatabaseError, TimerError};
use crate::storage::{NewSession, SessionRecord, SessionStore};
use crate::timer::SessionPhaseType;

/// Handle to a provisional session row.
///
/// Clones share the finalization flag, so a state machine snapshot taken
/// for rollback still refers to the same underlying record.
#[derive(Debug, Clone)]
pub struct RecordHandle {
    id: i64,
    finalized: Arc<AtomicBool>,
}

impl RecordHandle {
    pub(crate) fn new(id: i64) -> Self {
        Self {
            id,
            finalized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn id(&self) -> i64 {
        self.id
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

/// Writes session rows and announces finalized ones.
///
/// A phase opens a provisional row (`ended_at` NULL) the moment it starts,
/// so a crash mid-phase leaves evidence for [`rehydrate`](super::rehydrate)
/// to pick up. Finalization fills in the outcome exactly once.
pub struct SessionRecorder<S: SessionStore> {
    store: S,
    events: broadcast::Sender<SessionRecord>,
}

impl<S: SessionStore> SessionRecorder<S> {
    pub fn new(store: S) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { store, events }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive every record finalized after the point of subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionRecord> {
        self.events.subscribe()
    }

    /// Insert a provisional row for a phase that just started.
    pub fn open_provisional(
        &self,
        user_id: i64,
        task_id: i64,
        phase: SessionPhaseType,
        planned_secs: u32,
        started_at: DateTime<Utc>,
    ) -> Result<RecordHandle, TimerError> {
        let id = self.store.insert(&NewSession {
            user_id,
            task_id,
            phase,
            planned_secs,
            started_at,
        })?;
        tracing::debug!(record_id = id, phase = phase.as_str(), "opened provisional session");
        Ok(RecordHandle::new(id))
    }

    /// Fill in the outcome of a provisional row.
    ///
    /// The row may be finalized at most once. The in-memory flag is only
    /// armed after the update succeeds, so a failed attempt can be retried.
    pub fn finalize(
        &self,
        handle: &RecordHandle,
        actual_secs: u32,
        interruptions: u32,
        completed: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionRecord, TimerError> {
        if handle.is_finalized() {
            return Err(TimerError::AlreadyFinalized { record_id: handle.id });
        }
        let mut record = self
            .store
            .find_by_id(handle.id)?
            .ok_or(DatabaseError::RecordNotFound(handle.id))?;
        if record.is_finalized() {
            handle.finalized.store(true, Ordering::SeqCst);
            return Err(TimerError::AlreadyFinalized { record_id: handle.id });
        }

        record.actual_secs = actual_secs;
        record.interruptions = interruptions;
        record.completed = completed;
        record.ended_at = Some(ended_at);
        self.store.update(&record)?;
        handle.finalized.store(true, Ordering::SeqCst);

        tracing::debug!(
            record_id = record.id,
            completed = record.completed,
            actual_secs = record.actual_secs,
            "finalized session"
        );
        // Nobody listening is fine.
        let _ = self.events.send(record.clone());
        Ok(record)
    }
}
