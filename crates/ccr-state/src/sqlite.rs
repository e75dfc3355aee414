use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::JobStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS jobs (
        job_name TEXT PRIMARY KEY,
        job_info TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS progresses (
        job_name TEXT PRIMARY KEY,
        progress TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open or create a job store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening job store");

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory job store (for testing).
    pub fn in_memory() -> StateResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StateResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::Poisoned)
    }
}

impl JobStore for SqliteJobStore {
    fn job_exists(&self, name: &str) -> StateResult<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row("SELECT 1 FROM jobs WHERE job_name = ?1", [name], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn add_job(&self, name: &str, job_info: &str) -> StateResult<()> {
        let conn = self.conn()?;

        let result = conn.execute(
            "INSERT INTO jobs (job_name, job_info) VALUES (?1, ?2)",
            params![name, job_info],
        );

        match result {
            Ok(_) => {
                debug!(job = name, "Added job");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StateError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_job(&self, name: &str, job_info: &str) -> StateResult<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE jobs SET job_info = ?2, updated_at = CURRENT_TIMESTAMP WHERE job_name = ?1",
            params![name, job_info],
        )?;

        if updated == 0 {
            return Err(StateError::NotFound(name.to_string()));
        }
        Ok(())
    }

    fn get_job(&self, name: &str) -> StateResult<Option<String>> {
        let conn = self.conn()?;
        let job_info = conn
            .query_row(
                "SELECT job_info FROM jobs WHERE job_name = ?1",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(job_info)
    }

    fn list_jobs(&self) -> StateResult<Vec<(String, String)>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT job_name, job_info FROM jobs ORDER BY job_name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }

        Ok(result)
    }

    fn remove_job(&self, name: &str) -> StateResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM jobs WHERE job_name = ?1", [name])?;
        tx.execute("DELETE FROM progresses WHERE job_name = ?1", [name])?;
        tx.commit()?;

        if removed == 0 {
            return Err(StateError::NotFound(name.to_string()));
        }
        info!(job = name, "Removed job");
        Ok(())
    }

    fn progress_exists(&self, name: &str) -> StateResult<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM progresses WHERE job_name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_progress(&self, name: &str) -> StateResult<Option<String>> {
        let conn = self.conn()?;
        let progress = conn
            .query_row(
                "SELECT progress FROM progresses WHERE job_name = ?1",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(progress)
    }

    fn update_progress(&self, name: &str, progress: &str) -> StateResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO progresses (job_name, progress, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(job_name) DO UPDATE SET
                progress = ?2,
                updated_at = CURRENT_TIMESTAMP",
            params![name, progress],
        )?;

        Ok(())
    }
}
