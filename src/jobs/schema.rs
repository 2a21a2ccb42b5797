//! SQLite DDL for the job store and continue-queue.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Bump when the DDL changes incompatibly.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Complete DDL. Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- WAL lets the host bridge read status while a worker writes.
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per job. JSON columns hold serde-serialized payloads;
-- timestamps are epoch milliseconds.
CREATE TABLE IF NOT EXISTS jobs (
    id               TEXT PRIMARY KEY,
    phase            TEXT NOT NULL,      -- snake_case Phase variant
    current_step     INTEGER NOT NULL,
    total_steps      INTEGER NOT NULL,
    drive            TEXT NOT NULL DEFAULT 'queue',  -- 'queue' | 'client'
    thesis_inputs    TEXT NOT NULL,
    thesis_summary   TEXT,
    checkpoint       TEXT,
    picked_candidate TEXT,
    result_payload   TEXT,
    error_message    TEXT,
    error_step       TEXT,
    retry_count      INTEGER NOT NULL DEFAULT 0,
    version          INTEGER NOT NULL,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    next_attempt_at  INTEGER
);

CREATE INDEX IF NOT EXISTS idx_jobs_phase ON jobs(phase);

-- Durable continue triggers.
CREATE TABLE IF NOT EXISTS job_queue (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      TEXT NOT NULL,
    visible_at  INTEGER NOT NULL,
    attempts    INTEGER NOT NULL DEFAULT 0,
    enqueued_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queue_visible ON job_queue(visible_at);
CREATE INDEX IF NOT EXISTS idx_queue_job     ON job_queue(job_id);
"#;

/// Version 2 records who drives each job.
const MIGRATE_V1_TO_V2: &str =
    "ALTER TABLE jobs ADD COLUMN drive TEXT NOT NULL DEFAULT 'queue';";

/// Apply the full schema, seed the version on a fresh database and
/// migrate older ones forward.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    match read_schema_version(conn)? {
        None => {}
        Some(v) if v >= CURRENT_SCHEMA_VERSION => return Ok(()),
        Some(_) => conn.execute_batch(MIGRATE_V1_TO_V2)?,
    }
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Read the schema version, `None` if never seeded.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
