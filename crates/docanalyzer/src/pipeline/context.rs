use std::path::PathBuf;

use crate::job::{JobId, JobRecord};

/// Inputs of one pipeline run, detached from the store.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub job_id: JobId,
    pub query: String,
    pub source_path: PathBuf,
}

impl PipelineContext {
    pub fn new(job_id: impl Into<JobId>, query: impl Into<String>, source_path: PathBuf) -> Self {
        Self {
            job_id: job_id.into(),
            query: query.into(),
            source_path,
        }
    }

    pub fn from_record(record: &JobRecord) -> Self {
        Self::new(record.id.clone(), record.query.clone(), record.source_path.clone())
    }
}
