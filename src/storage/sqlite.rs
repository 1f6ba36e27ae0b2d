//! SQLite-backed execution store.
//!
//! Execution records are the one storage output the engine owns, so a
//! concrete backend ships with the crate. Records are upserted on id and
//! never deleted by the engine; retention is an external concern.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Execution, ExecutionStatus};
use super::ExecutionStore;
use crate::error::{Error, Result};
use crate::workflow::StepResults;

/// Execution store backed by a SQLite database.
pub struct SqliteExecutionStore {
    conn: Mutex<Connection>,
}

impl SqliteExecutionStore {
    /// Open (or create) a database at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error TEXT,
                results TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_executions_workflow
                ON executions (workflow_id, started_at);",
        )
        .map_err(storage_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

#[async_trait]
impl ExecutionStore for SqliteExecutionStore {
    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        let results = serde_json::to_string(&execution.results)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO executions
                (id, workflow_id, tenant_id, status, started_at, completed_at, error, results)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                completed_at = excluded.completed_at,
                error = excluded.error,
                results = excluded.results",
            params![
                execution.id,
                execution.workflow_id,
                execution.tenant_id,
                execution.status.to_string(),
                execution.started_at.to_rfc3339(),
                execution.completed_at.map(|t| t.to_rfc3339()),
                execution.error,
                results,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, workflow_id, tenant_id, status, started_at, completed_at, error, results
             FROM executions WHERE id = ?1",
            params![execution_id],
            |row| {
                Ok(RawExecution {
                    id: row.get(0)?,
                    workflow_id: row.get(1)?,
                    tenant_id: row.get(2)?,
                    status: row.get(3)?,
                    started_at: row.get(4)?,
                    completed_at: row.get(5)?,
                    error: row.get(6)?,
                    results: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(storage_err)?
        .map(RawExecution::into_execution)
        .transpose()
    }
}

struct RawExecution {
    id: String,
    workflow_id: String,
    tenant_id: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    error: Option<String>,
    results: String,
}

impl RawExecution {
    fn into_execution(self) -> Result<Execution> {
        let status = ExecutionStatus::from_str(&self.status).map_err(Error::Storage)?;
        let results: StepResults = serde_json::from_str(&self.results)?;

        Ok(Execution {
            id: self.id,
            workflow_id: self.workflow_id,
            tenant_id: self.tenant_id,
            status,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            error: self.error,
            results,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid timestamp '{}': {}", raw, e)))
}
