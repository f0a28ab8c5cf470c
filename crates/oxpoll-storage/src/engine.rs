use crate::{NewJob, PollStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use oxpoll_common::types::{JobRow, PollResultRow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed [`PollStore`].
///
/// One database file in WAL mode; statements are cached and bulk
/// inserts run in a single transaction.
pub struct SqlitePollStore {
    conn: Mutex<Connection>,
}

impl SqlitePollStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("oxpoll.db");
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS poll_jobs (
                 id INTEGER PRIMARY KEY,
                 ip TEXT NOT NULL,
                 port INTEGER NOT NULL,
                 system_type TEXT NOT NULL,
                 credentials TEXT NOT NULL,
                 created_at INTEGER NOT NULL,
                 updated_at INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS poll_results (
                 id INTEGER PRIMARY KEY,
                 job_id INTEGER NOT NULL,
                 result TEXT NOT NULL,
                 collected_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_poll_results_job_time
                 ON poll_results (job_id, collected_at);",
        )?;
        tracing::info!(path = %db_path.display(), "Initialized poll store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, u16, String, String, i64, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn job_from_parts(parts: (i64, String, u16, String, String, i64, i64)) -> JobRow {
    let (id, ip, port, system_type, credentials_str, created_ms, updated_ms) = parts;
    JobRow {
        id,
        ip,
        port,
        system_type,
        credentials: serde_json::from_str(&credentials_str).unwrap_or_default(),
        created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_default(),
    }
}

impl PollStore for SqlitePollStore {
    fn select_job_page(&self, offset: usize, limit: usize) -> Result<Vec<JobRow>> {
        self.list_jobs(limit, offset)
    }

    fn bulk_insert_results(&self, rows: &[PollResultRow]) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut ids = Vec::with_capacity(rows.len());
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO poll_results (id, job_id, result, collected_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for row in rows {
                    let result_json = serde_json::to_string(&row.result)?;
                    stmt.execute(rusqlite::params![
                        row.id,
                        row.job_id,
                        result_json,
                        row.collected_at.timestamp_millis(),
                    ])?;
                    ids.push(row.id);
                }
            }
            tx.commit()?;
            Ok(ids)
        })
    }

    fn insert_job(&self, job: &NewJob) -> Result<JobRow> {
        let now = Utc::now();
        let row = JobRow {
            id: oxpoll_common::id::next_id(),
            ip: job.ip.clone(),
            port: job.port,
            system_type: job.system_type.clone(),
            credentials: job.credentials.clone(),
            created_at: now,
            updated_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO poll_jobs (id, ip, port, system_type, credentials, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    row.id,
                    &row.ip,
                    row.port as i64,
                    &row.system_type,
                    serde_json::to_string(&row.credentials)?,
                    row.created_at.timestamp_millis(),
                    row.updated_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })?;
        Ok(row)
    }

    fn list_jobs(&self, limit: usize, offset: usize) -> Result<Vec<JobRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, ip, port, system_type, credentials, created_at, updated_at
                 FROM poll_jobs ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![limit as i64, offset as i64],
                row_to_job,
            )?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(job_from_parts(row?));
            }
            Ok(jobs)
        })
    }

    fn count_jobs(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM poll_jobs", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn query_results_for_job(&self, job_id: i64, limit: usize) -> Result<Vec<PollResultRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, job_id, result, collected_at FROM poll_results
                 WHERE job_id = ?1 ORDER BY collected_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![job_id, limit as i64], |row| {
                let id: i64 = row.get(0)?;
                let job_id: i64 = row.get(1)?;
                let result_str: String = row.get(2)?;
                let collected_ms: i64 = row.get(3)?;
                Ok((id, job_id, result_str, collected_ms))
            })?;
            let mut results = Vec::new();
            for row in rows {
                let (id, job_id, result_str, collected_ms) = row?;
                results.push(PollResultRow {
                    id,
                    job_id,
                    result: serde_json::from_str(&result_str).unwrap_or_default(),
                    collected_at: DateTime::from_timestamp_millis(collected_ms)
                        .unwrap_or_default(),
                });
            }
            Ok(results)
        })
    }
}
