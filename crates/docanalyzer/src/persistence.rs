//! Optional durable mirror of job state.
//!
//! The in-memory [`JobStore`](crate::job::JobStore) is authoritative. A mirror
//! only receives snapshots after the fact; its failures are logged by the
//! caller and never roll back an in-memory transition.

use crate::db::DatabaseError;
use crate::job::JobRecord;

pub type PersistenceError = DatabaseError;

pub trait PersistenceMirror: Send + Sync {
    /// Idempotent insert-or-replace keyed by `record.id`.
    fn upsert(&self, record: &JobRecord) -> Result<(), PersistenceError>;

    /// Reads back a previously mirrored record.
    fn fetch(&self, _id: &str) -> Result<Option<JobRecord>, PersistenceError> {
        Ok(None)
    }
}
