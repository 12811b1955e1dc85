//! SQLite-based session and task storage.
//!
//! Provides persistent storage for:
//! - Pomodoro session records (provisional rows finalized at phase end)
//! - Tasks and their per-approach augmentation params
//! - Session statistics (daily and all-time)
//! - Key-value store for small bits of application state

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data_dir;
use crate::error::DatabaseError;
use crate::task::{Task, TaskAugmentation};
use crate::timer::SessionPhaseType;

/// A focus session shorter than this does not count as a completed
/// pomodoro in statistics (it still gets a record).
const MIN_COUNTED_FOCUS_SECS: u32 = 10 * 60;

/// Durable record of one pomodoro phase.
///
/// Created provisionally when the phase starts running; `ended_at` stays
/// NULL until the record is finalized, exactly once, when the phase ends.
/// A finalized record is never mutated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub phase: SessionPhaseType,
    pub planned_secs: u32,
    pub actual_secs: u32,
    pub interruptions: u32,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Fields needed to open a provisional session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub task_id: i64,
    pub phase: SessionPhaseType,
    pub planned_secs: u32,
    pub started_at: DateTime<Utc>,
}

/// Aggregate session statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    /// Completed focus sessions of at least ten minutes actual duration.
    pub completed_pomodoros: u64,
    pub total_focus_secs: u64,
    pub total_break_secs: u64,
    pub total_interruptions: u64,
    pub today_sessions: u64,
    pub today_focus_secs: u64,
}

/// Durable persistence for session records.
///
/// The one shared mutable resource across timers; each user's rows are
/// independent.
pub trait SessionStore: Send {
    fn insert(&self, session: &NewSession) -> Result<i64, DatabaseError>;
    /// Overwrite the mutable fields of an existing record.
    fn update(&self, record: &SessionRecord) -> Result<(), DatabaseError>;
    fn find_by_id(&self, id: i64) -> Result<Option<SessionRecord>, DatabaseError>;
    /// Most recent record whose phase never ended, if any.
    fn find_latest_unfinalized(&self, user_id: i64) -> Result<Option<SessionRecord>, DatabaseError>;
    fn sessions_for_task(&self, user_id: i64, task_id: i64)
        -> Result<Vec<SessionRecord>, DatabaseError>;
    fn sessions_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, DatabaseError>;
    /// Focus phases completed since the last long break; survives restarts.
    fn cycle_progress(&self, user_id: i64) -> Result<u32, DatabaseError>;
    fn set_cycle_progress(&self, user_id: i64, progress: u32) -> Result<(), DatabaseError>;
}

/// SQLite database backing [`SessionStore`] plus task and stats queries.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/queston/queston.db`.
    ///
    /// Creates the file and schema if they don't exist.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::OpenFailed {
                path: PathBuf::from("~/.config/queston"),
                source: rusqlite::Error::InvalidPath(PathBuf::from(e.to_string())),
            })?
            .join("queston.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened database");
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, throwaway hosts).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS pomodoro_session (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id       INTEGER NOT NULL,
                    task_id       INTEGER NOT NULL,
                    phase         TEXT NOT NULL,
                    planned_secs  INTEGER NOT NULL,
                    actual_secs   INTEGER NOT NULL DEFAULT 0,
                    interruptions INTEGER NOT NULL DEFAULT 0,
                    completed     INTEGER NOT NULL DEFAULT 0,
                    started_at    TEXT NOT NULL,
                    ended_at      TEXT
                );

                CREATE TABLE IF NOT EXISTS task (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id      INTEGER NOT NULL,
                    title        TEXT NOT NULL,
                    estimate_min INTEGER,
                    created_at   TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS task_params (
                    task_id  INTEGER NOT NULL,
                    approach TEXT NOT NULL,
                    params   TEXT NOT NULL,
                    PRIMARY KEY (task_id, approach)
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_session_user ON pomodoro_session(user_id);
                CREATE INDEX IF NOT EXISTS idx_session_task ON pomodoro_session(user_id, task_id);
                CREATE INDEX IF NOT EXISTS idx_session_open ON pomodoro_session(user_id, ended_at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
        let phase_str: String = row.get(3)?;
        let started_at: String = row.get(8)?;
        let ended_at: Option<String> = row.get(9)?;
        Ok(SessionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            task_id: row.get(2)?,
            phase: SessionPhaseType::parse(&phase_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown phase '{phase_str}'").into(),
                )
            })?,
            planned_secs: row.get(4)?,
            actual_secs: row.get(5)?,
            interruptions: row.get(6)?,
            completed: row.get(7)?,
            started_at: parse_ts(8, &started_at)?,
            ended_at: ended_at.as_deref().map(|s| parse_ts(9, s)).transpose()?,
        })
    }

    const SESSION_COLUMNS: &'static str = "id, user_id, task_id, phase, planned_secs, \
         actual_secs, interruptions, completed, started_at, ended_at";

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn insert_task(
        &self,
        user_id: i64,
        title: &str,
        estimate_min: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO task (user_id, title, estimate_min, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, title, estimate_min, created_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, estimate_min, created_at FROM task WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_task)?;
        rows.next().transpose().map_err(DatabaseError::from)
    }

    pub fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, estimate_min, created_at
             FROM task WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![user_id], Self::map_task)?;
        rows.collect::<rusqlite::Result<_>>().map_err(DatabaseError::from)
    }

    fn map_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        let created_at: String = row.get(4)?;
        Ok(Task {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            estimate_min: row.get(3)?,
            created_at: parse_ts(4, &created_at)?,
        })
    }

    /// Insert or replace a task's params for one productivity approach.
    pub fn upsert_augmentation(
        &self,
        task_id: i64,
        augmentation: &TaskAugmentation,
    ) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(augmentation)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO task_params (task_id, approach, params) VALUES (?1, ?2, ?3)",
            params![task_id, augmentation.approach(), json],
        )?;
        Ok(())
    }

    pub fn augmentations_for_task(
        &self,
        task_id: i64,
    ) -> Result<Vec<TaskAugmentation>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT params FROM task_params WHERE task_id = ?1 ORDER BY approach")?;
        let rows = stmt.query_map(params![task_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            let json = row?;
            let aug = serde_json::from_str(&json)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            out.push(aug);
        }
        Ok(out)
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub fn stats_all(&self, user_id: i64) -> Result<Stats, DatabaseError> {
        self.query_stats(user_id, None)
    }

    pub fn stats_today(&self, user_id: i64) -> Result<Stats, DatabaseError> {
        let midnight = format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"));
        self.query_stats(user_id, Some(midnight))
    }

    fn query_stats(&self, user_id: i64, since: Option<String>) -> Result<Stats, DatabaseError> {
        let midnight = format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"));
        let since_filter = since.unwrap_or_default();
        let mut stmt = self.conn.prepare(
            "SELECT phase, COUNT(*),
                    COALESCE(SUM(actual_secs), 0),
                    COALESCE(SUM(interruptions), 0),
                    COALESCE(SUM(CASE WHEN completed = 1 AND actual_secs >= ?3 THEN 1 ELSE 0 END), 0)
             FROM pomodoro_session
             WHERE user_id = ?1 AND ended_at IS NOT NULL AND ended_at >= ?2
             GROUP BY phase",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(
            params![user_id, since_filter, MIN_COUNTED_FOCUS_SECS],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, u64>(4)?,
                ))
            },
        )?;

        for row in rows {
            let (phase, count, secs, interruptions, counted) = row?;
            stats.total_sessions += count;
            stats.total_interruptions += interruptions;
            match phase.as_str() {
                "focus" => {
                    stats.completed_pomodoros += counted;
                    stats.total_focus_secs += secs;
                }
                _ => {
                    stats.total_break_secs += secs;
                }
            }
        }

        // Today's focus slice, regardless of the window queried above.
        let mut stmt2 = self.conn.prepare(
            "SELECT COUNT(*), COALESCE(SUM(actual_secs), 0)
             FROM pomodoro_session
             WHERE user_id = ?1 AND phase = 'focus' AND ended_at IS NOT NULL AND ended_at >= ?2",
        )?;
        let (today_sessions, today_focus_secs) = stmt2.query_row(params![user_id, midnight], |row| {
            Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?))
        })?;
        stats.today_sessions = today_sessions;
        stats.today_focus_secs = today_focus_secs;

        Ok(stats)
    }

    // ── Key-value store ──────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn insert(&self, session: &NewSession) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO pomodoro_session (user_id, task_id, phase, planned_secs, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.user_id,
                session.task_id,
                session.phase.as_str(),
                session.planned_secs,
                session.started_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE pomodoro_session
             SET actual_secs = ?2, interruptions = ?3, completed = ?4, ended_at = ?5
             WHERE id = ?1",
            params![
                record.id,
                record.actual_secs,
                record.interruptions,
                record.completed,
                record.ended_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::RecordNotFound(record.id));
        }
        Ok(())
    }

    fn find_by_id(&self, id: i64) -> Result<Option<SessionRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM pomodoro_session WHERE id = ?1",
            Self::SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::map_session)?;
        rows.next().transpose().map_err(DatabaseError::from)
    }

    fn find_latest_unfinalized(
        &self,
        user_id: i64,
    ) -> Result<Option<SessionRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM pomodoro_session
             WHERE user_id = ?1 AND ended_at IS NULL
             ORDER BY started_at DESC, id DESC LIMIT 1",
            Self::SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![user_id], Self::map_session)?;
        rows.next().transpose().map_err(DatabaseError::from)
    }

    fn sessions_for_task(
        &self,
        user_id: i64,
        task_id: i64,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM pomodoro_session
             WHERE user_id = ?1 AND task_id = ?2 ORDER BY started_at DESC",
            Self::SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, task_id], Self::map_session)?;
        rows.collect::<rusqlite::Result<_>>().map_err(DatabaseError::from)
    }

    fn sessions_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM pomodoro_session
             WHERE user_id = ?1 AND started_at >= ?2 AND started_at < ?3
             ORDER BY started_at",
            Self::SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_id, from.to_rfc3339(), to.to_rfc3339()],
            Self::map_session,
        )?;
        rows.collect::<rusqlite::Result<_>>().map_err(DatabaseError::from)
    }

    fn cycle_progress(&self, user_id: i64) -> Result<u32, DatabaseError> {
        let key = format!("cycle_progress:{user_id}");
        Ok(self
            .kv_get(&key)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    fn set_cycle_progress(&self, user_id: i64, progress: u32) -> Result<(), DatabaseError> {
        let key = format!("cycle_progress:{user_id}");
        self.kv_set(&key, &progress.to_string())
    }
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_session(user_id: i64, task_id: i64, started_at: DateTime<Utc>) -> NewSession {
        NewSession {
            user_id,
            task_id,
            phase: SessionPhaseType::Focus,
            planned_secs: 1500,
            started_at,
        }
    }

    #[test]
    fn insert_creates_provisional_row() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let id = db.insert(&new_session(1, 7, now)).unwrap();

        let rec = db.find_by_id(id).unwrap().unwrap();
        assert_eq!(rec.task_id, 7);
        assert_eq!(rec.planned_secs, 1500);
        assert_eq!(rec.actual_secs, 0);
        assert!(!rec.completed);
        assert!(!rec.is_finalized());
    }

    #[test]
    fn update_finalizes_row() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let id = db.insert(&new_session(1, 7, now)).unwrap();

        let mut rec = db.find_by_id(id).unwrap().unwrap();
        rec.actual_secs = 1500;
        rec.completed = true;
        rec.ended_at = Some(now + Duration::seconds(1500));
        db.update(&rec).unwrap();

        let stored = db.find_by_id(id).unwrap().unwrap();
        assert!(stored.completed);
        assert!(stored.is_finalized());
        assert_eq!(stored.actual_secs, 1500);
    }

    #[test]
    fn update_missing_row_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let rec = SessionRecord {
            id: 999,
            user_id: 1,
            task_id: 7,
            phase: SessionPhaseType::Focus,
            planned_secs: 1500,
            actual_secs: 0,
            interruptions: 0,
            completed: false,
            started_at: Utc::now(),
            ended_at: None,
        };
        assert!(matches!(
            db.update(&rec),
            Err(DatabaseError::RecordNotFound(999))
        ));
    }

    #[test]
    fn latest_unfinalized_ignores_finalized_and_other_users() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let finalized = db.insert(&new_session(1, 7, now - Duration::hours(2))).unwrap();
        let mut rec = db.find_by_id(finalized).unwrap().unwrap();
        rec.ended_at = Some(now - Duration::hours(1));
        db.update(&rec).unwrap();

        db.insert(&new_session(2, 9, now)).unwrap(); // other user
        let open = db.insert(&new_session(1, 7, now - Duration::minutes(5))).unwrap();

        let found = db.find_latest_unfinalized(1).unwrap().unwrap();
        assert_eq!(found.id, open);
        assert!(db.find_latest_unfinalized(3).unwrap().is_none());
    }

    #[test]
    fn sessions_between_filters_by_start_time() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert(&new_session(1, 7, now - Duration::days(3))).unwrap();
        db.insert(&new_session(1, 7, now - Duration::hours(1))).unwrap();

        let recent = db
            .sessions_between(1, now - Duration::days(1), now)
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn stats_count_only_finalized_sessions() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        // One completed full focus, one abandoned short focus, one break.
        for (phase, planned, actual, completed) in [
            (SessionPhaseType::Focus, 1500u32, 1500u32, true),
            (SessionPhaseType::Focus, 1500, 120, false),
            (SessionPhaseType::ShortBreak, 300, 300, true),
        ] {
            let id = db
                .insert(&NewSession {
                    user_id: 1,
                    task_id: 7,
                    phase,
                    planned_secs: planned,
                    started_at: now,
                })
                .unwrap();
            let mut rec = db.find_by_id(id).unwrap().unwrap();
            rec.actual_secs = actual;
            rec.completed = completed;
            rec.interruptions = 1;
            rec.ended_at = Some(now);
            db.update(&rec).unwrap();
        }
        // Still-open session must not show up.
        db.insert(&new_session(1, 7, now)).unwrap();

        let stats = db.stats_all(1).unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.completed_pomodoros, 1);
        assert_eq!(stats.total_focus_secs, 1620);
        assert_eq!(stats.total_break_secs, 300);
        assert_eq!(stats.total_interruptions, 3);
        assert_eq!(stats.today_sessions, 2);
    }

    #[test]
    fn kv_store_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn cycle_progress_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.cycle_progress(1).unwrap(), 0);
        db.set_cycle_progress(1, 3).unwrap();
        assert_eq!(db.cycle_progress(1).unwrap(), 3);
        assert_eq!(db.cycle_progress(2).unwrap(), 0);
    }

    #[test]
    fn tasks_and_augmentations() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let id = db.insert_task(1, "Write report", Some(90), now).unwrap();

        let task = db.find_task(id).unwrap().unwrap();
        assert_eq!(task.title, "Write report");
        assert_eq!(task.estimate_min, Some(90));

        db.upsert_augmentation(
            id,
            &TaskAugmentation::Eisenhower {
                urgent: true,
                important: false,
            },
        )
        .unwrap();
        db.upsert_augmentation(
            id,
            &TaskAugmentation::Frog {
                difficulty: 3,
                is_frog: true,
            },
        )
        .unwrap();
        // Replacing the same approach does not add a row.
        db.upsert_augmentation(
            id,
            &TaskAugmentation::Eisenhower {
                urgent: true,
                important: true,
            },
        )
        .unwrap();

        let augs = db.augmentations_for_task(id).unwrap();
        assert_eq!(augs.len(), 2);
        assert!(augs.contains(&TaskAugmentation::Eisenhower {
            urgent: true,
            important: true,
        }));
    }
}
