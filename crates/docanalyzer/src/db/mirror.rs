//! SQLite-backed [`PersistenceMirror`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::job::{JobRecord, JobStatus};
use crate::persistence::PersistenceMirror;

use super::job_repo::{self, JobRow};
use super::{Database, DatabaseError};

#[derive(Clone)]
pub struct SqliteMirror {
    db: Database,
}

impl SqliteMirror {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        job_repo::count_by_status(&self.db, status.as_str())
    }
}

impl PersistenceMirror for SqliteMirror {
    fn upsert(&self, record: &JobRecord) -> Result<(), DatabaseError> {
        job_repo::upsert(&self.db, &to_row(record)?)
    }

    fn fetch(&self, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        job_repo::find_by_id(&self.db, id)?
            .map(from_row)
            .transpose()
    }
}

fn to_row(record: &JobRecord) -> Result<JobRow, DatabaseError> {
    let result = record
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::InvalidRow {
            id: record.id.clone(),
            reason: format!("result is not serializable: {}", e),
        })?;

    Ok(JobRow {
        id: record.id.clone(),
        status: record.status.as_str().to_string(),
        query: record.query.clone(),
        source_path: record.source_path.to_string_lossy().to_string(),
        file_name: record.file_name.clone(),
        result,
        error: record.error.clone(),
        worker: record.worker.clone(),
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
    })
}

fn from_row(row: JobRow) -> Result<JobRecord, DatabaseError> {
    let invalid = |reason: String| DatabaseError::InvalidRow {
        id: row.id.clone(),
        reason,
    };

    let status = JobStatus::parse(&row.status)
        .ok_or_else(|| invalid(format!("unknown status '{}'", row.status)))?;
    let result = row
        .result
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| invalid(format!("bad result JSON: {}", e)))?;
    let created_at = parse_timestamp(&row.created_at).map_err(&invalid)?;
    let updated_at = parse_timestamp(&row.updated_at).map_err(&invalid)?;

    Ok(JobRecord {
        status,
        query: row.query.clone(),
        source_path: PathBuf::from(&row.source_path),
        file_name: row.file_name.clone(),
        result,
        error: row.error.clone(),
        created_at,
        updated_at,
        worker: row.worker.clone(),
        id: row.id.clone(),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{}': {}", value, e))
}
