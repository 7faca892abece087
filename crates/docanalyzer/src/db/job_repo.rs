//! Job repository: queries against the `jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row. Timestamps are RFC 3339 text, `result` is JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub query: String,
    pub source_path: String,
    pub file_name: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub worker: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            query: row.get("query")?,
            source_path: row.get("source_path")?,
            file_name: row.get("file_name")?,
            result: row.get("result")?,
            error: row.get("error")?,
            worker: row.get("worker")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts the row, or replaces every mutable column if the id exists.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, status, query, source_path, file_name, result, error,
             worker, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                query = excluded.query,
                source_path = excluded.source_path,
                file_name = excluded.file_name,
                result = excluded.result,
                error = excluded.error,
                worker = excluded.worker,
                updated_at = excluded.updated_at",
            params![
                job.id,
                job.status,
                job.query,
                job.source_path,
                job.file_name,
                job.result,
                job.error,
                job.worker,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
