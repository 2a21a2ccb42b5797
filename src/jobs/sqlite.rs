//! SQLite-backed job store and continue-queue.
//!
//! One database file holds both the `jobs` table and the `job_queue`
//! table, so a phase result and its follow-up trigger live side by side.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::schema::{apply_schema, read_schema_version};
use super::store::{ClaimedMessage, ContinueQueue, JobStore, lease_deadline};
use super::types::{Drive, Job, Phase};
use crate::error::{Result, ScoutError};

/// How long a writer waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const JOB_COLUMNS: &str = "id, phase, current_step, total_steps, thesis_inputs, thesis_summary, \
     checkpoint, picked_candidate, result_payload, error_message, error_step, retry_count, \
     version, created_at, updated_at, next_attempt_at, drive";

/// SQLite-backed [`JobStore`] and [`ContinueQueue`].
///
/// Thread-safe via an internal `Mutex<Connection>`. Other processes (a
/// separate worker binary) coordinate through SQLite locking.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database at `path`, applying the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ScoutError::Store(format!("connection lock poisoned: {e}")))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: &Job) -> Result<Job> {
        let mut stored = job.clone();
        stored.version = 1;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO jobs ({JOB_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17)"
            ),
            params![
                stored.id,
                stored.phase.as_str(),
                i64::from(stored.current_step),
                i64::from(stored.total_steps),
                to_json(&stored.thesis_inputs)?,
                opt_json(&stored.thesis_summary)?,
                opt_json(&stored.checkpoint)?,
                opt_json(&stored.picked_candidate)?,
                opt_json(&stored.result_payload)?,
                stored.error_message,
                stored.error_step,
                i64::from(stored.retry_count),
                version_to_sql(stored.version),
                stored.created_at.timestamp_millis(),
                stored.updated_at.timestamp_millis(),
                stored.next_attempt_at.map(|t| t.timestamp_millis()),
                stored.drive.as_str(),
            ],
        )?;
        Ok(stored)
    }

    fn get(&self, id: &str) -> Result<Job> {
        let conn = self.lock()?;
        read_job(&conn, id)?.ok_or_else(|| ScoutError::JobNotFound(id.to_owned()))
    }

    fn save(&self, job: &Job) -> Result<Job> {
        let mut stored = job.clone();
        stored.version = job.version + 1;
        stored.updated_at = Utc::now();

        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE jobs SET phase = ?2, current_step = ?3, total_steps = ?4, thesis_inputs = ?5, \
             thesis_summary = ?6, checkpoint = ?7, picked_candidate = ?8, result_payload = ?9, \
             error_message = ?10, error_step = ?11, retry_count = ?12, version = ?13, \
             updated_at = ?14, next_attempt_at = ?15 \
             WHERE id = ?1 AND version = ?16",
            params![
                stored.id,
                stored.phase.as_str(),
                i64::from(stored.current_step),
                i64::from(stored.total_steps),
                to_json(&stored.thesis_inputs)?,
                opt_json(&stored.thesis_summary)?,
                opt_json(&stored.checkpoint)?,
                opt_json(&stored.picked_candidate)?,
                opt_json(&stored.result_payload)?,
                stored.error_message,
                stored.error_step,
                i64::from(stored.retry_count),
                version_to_sql(stored.version),
                stored.updated_at.timestamp_millis(),
                stored.next_attempt_at.map(|t| t.timestamp_millis()),
                version_to_sql(job.version),
            ],
        )?;

        if rows == 0 {
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM jobs WHERE id = ?1", params![job.id], |r| {
                    r.get(0)
                })
                .optional()?;
            return Err(match exists {
                Some(_) => ScoutError::VersionConflict {
                    job_id: job.id.clone(),
                    expected: job.version,
                },
                None => ScoutError::JobNotFound(job.id.clone()),
            });
        }
        Ok(stored)
    }

    fn force_error(&self, id: &str, reason: &str) -> Result<Job> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut job = read_job(&tx, id)?.ok_or_else(|| ScoutError::JobNotFound(id.to_owned()))?;
        if job.phase.is_terminal() {
            return Err(ScoutError::PhaseContractViolation {
                job_id: id.to_owned(),
                phase: job.phase.to_string(),
                operation: "force_error".into(),
            });
        }

        job.error_step = job.phase.step().map(|s| s.as_str().to_owned());
        job.set_phase(Phase::Error);
        job.error_message = Some(reason.to_owned());
        job.next_attempt_at = None;
        job.version += 1;
        job.updated_at = Utc::now();

        tx.execute(
            "UPDATE jobs SET phase = ?2, error_message = ?3, error_step = ?4, \
             next_attempt_at = NULL, version = ?5, updated_at = ?6 WHERE id = ?1",
            params![
                id,
                job.phase.as_str(),
                job.error_message,
                job.error_step,
                version_to_sql(job.version),
                job.updated_at.timestamp_millis(),
            ],
        )?;
        tx.commit()?;
        Ok(job)
    }
}

impl ContinueQueue for SqliteJobStore {
    fn enqueue_continue(&self, job_id: &str, visible_at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let at = visible_at.timestamp_millis();
        let coalesced = tx.execute(
            "UPDATE job_queue SET visible_at = MIN(visible_at, ?2) \
             WHERE job_id = ?1 AND attempts = 0",
            params![job_id, at],
        )?;
        if coalesced == 0 {
            tx.execute(
                "INSERT INTO job_queue (job_id, visible_at, attempts, enqueued_at) \
                 VALUES (?1, ?2, 0, ?3)",
                params![job_id, at, Utc::now().timestamp_millis()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<ClaimedMessage>> {
        let deadline = lease_deadline(now, lease).timestamp_millis();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let due: Vec<(i64, String, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT id, job_id, attempts FROM job_queue \
                 WHERE visible_at <= ?1 ORDER BY visible_at, id LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![now.timestamp_millis(), limit], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut claimed = Vec::with_capacity(due.len());
        for (id, job_id, attempts) in due {
            tx.execute(
                "UPDATE job_queue SET visible_at = ?2, attempts = attempts + 1 WHERE id = ?1",
                params![id, deadline],
            )?;
            claimed.push(ClaimedMessage {
                id,
                job_id,
                attempts: u32::try_from(attempts + 1).unwrap_or(u32::MAX),
            });
        }
        tx.commit()?;
        Ok(claimed)
    }

    fn ack(&self, message_id: i64) -> Result<()> {
        self.lock()?
            .execute("DELETE FROM job_queue WHERE id = ?1", params![message_id])?;
        Ok(())
    }

    fn pending(&self) -> Result<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM job_queue", [], |r| r.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn read_job(conn: &Connection, id: &str) -> Result<Option<Job>> {
    Ok(conn
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            params![id],
            row_to_job,
        )
        .optional()?)
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let phase_str: String = row.get(1)?;
    let phase = Phase::parse(&phase_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown phase '{phase_str}'").into(),
        )
    })?;
    let drive_str: String = row.get(16)?;
    let drive = Drive::parse(&drive_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            16,
            Type::Text,
            format!("unknown drive '{drive_str}'").into(),
        )
    })?;
    let thesis_inputs = json_col(row, 4)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Null, "missing thesis_inputs".into())
    })?;

    Ok(Job {
        id: row.get(0)?,
        phase,
        current_step: u8::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
        total_steps: u8::try_from(row.get::<_, i64>(3)?).unwrap_or(0),
        drive,
        thesis_inputs,
        thesis_summary: json_col(row, 5)?,
        checkpoint: json_col(row, 6)?,
        picked_candidate: json_col(row, 7)?,
        result_payload: json_col(row, 8)?,
        error_message: row.get(9)?,
        error_step: row.get(10)?,
        retry_count: u32::try_from(row.get::<_, i64>(11)?).unwrap_or(0),
        version: u64::try_from(row.get::<_, i64>(12)?).unwrap_or(0),
        created_at: from_millis(row.get(13)?),
        updated_at: from_millis(row.get(14)?),
        next_attempt_at: row.get::<_, Option<i64>>(15)?.map(from_millis),
    })
}

fn json_col<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn opt_json<T: Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value.as_ref().map(to_json).transpose()
}

fn version_to_sql(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
