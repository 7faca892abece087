use std::path::PathBuf;

use thiserror::Error;

/// Failures of the SQLite job mirror.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the database directory failed.
    #[error("cannot prepare database location '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema migration v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored row does not decode into a job record.
    #[error("stored job '{id}' is malformed: {reason}")]
    InvalidRow { id: String, reason: String },

    #[error("database connection lock poisoned")]
    LockPoisoned,
}
