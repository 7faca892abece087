use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::error::JobStoreError;

pub type JobId = String;

/// Status of a job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted document and everything known about its analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Unique job identifier.
    pub id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Caller-supplied analysis instruction.
    pub query: String,
    /// Temporary input artifact. Deleted once the job is terminal.
    pub source_path: PathBuf,
    /// File name of the artifact at submission time.
    pub file_name: String,
    /// Pipeline output (completed jobs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    /// Failure cause (failed jobs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Worker that claimed the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

impl JobRecord {
    /// Creates a queued record with a fresh id.
    pub fn new(query: &str, source_path: &Path) -> Self {
        let now = Utc::now();
        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            query: query.to_string(),
            source_path: source_path.to_path_buf(),
            file_name,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            worker: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// `queued -> processing`, recording the claiming worker.
    pub fn claim(&mut self, worker: &str) -> Result<(), JobStoreError> {
        self.expect_status(JobStatus::Queued, JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.worker = Some(worker.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `processing -> completed`.
    pub fn complete(&mut self, result: AnalysisResult) -> Result<(), JobStoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `processing -> failed`.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobStoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn expect_status(&self, required: JobStatus, to: JobStatus) -> Result<(), JobStoreError> {
        if self.status == required {
            Ok(())
        } else {
            Err(JobStoreError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{assess_risk, InvestmentAnalyzer};

    fn sample_result() -> AnalysisResult {
        let text = "Revenue: $10 Net Income: $1";
        AnalysisResult {
            investment_analysis: InvestmentAnalyzer::new().analyze(text, "q").unwrap(),
            risk_assessment: assess_risk(text).unwrap(),
        }
    }

    #[test]
    fn test_new_record_is_queued() {
        let record = JobRecord::new("query", Path::new("/tmp/data/report.pdf"));
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.file_name, "report.pdf");
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.result.is_none());
        assert!(record.error.is_none());
        assert!(record.worker.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = JobRecord::new("q", Path::new("a.pdf"));
        let b = JobRecord::new("q", Path::new("a.pdf"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_full_success_lifecycle() {
        let mut record = JobRecord::new("q", Path::new("a.pdf"));
        record.claim("worker-1").unwrap();
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(record.worker.as_deref(), Some("worker-1"));

        record.complete(sample_result()).unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.result.is_some());
        assert!(record.error.is_none());
        assert!(record.is_finished());
    }

    #[test]
    fn test_failure_keeps_worker_and_sets_error() {
        let mut record = JobRecord::new("q", Path::new("a.pdf"));
        record.claim("worker-2").unwrap();
        record.fail("extract: boom").unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("extract: boom"));
        assert!(record.result.is_none());
        assert_eq!(record.worker.as_deref(), Some("worker-2"));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut record = JobRecord::new("q", Path::new("a.pdf"));
        record.claim("w").unwrap();
        record.fail("x").unwrap();

        assert!(record.claim("w").is_err());
        assert!(record.complete(sample_result()).is_err());
        assert!(record.fail("again").is_err());
        assert_eq!(record.error.as_deref(), Some("x"));
    }

    #[test]
    fn test_cannot_claim_twice() {
        let mut record = JobRecord::new("q", Path::new("a.pdf"));
        record.claim("worker-1").unwrap();
        let err = record.claim("worker-2").unwrap_err();
        assert!(matches!(
            err,
            JobStoreError::InvalidTransition {
                from: JobStatus::Processing,
                to: JobStatus::Processing,
                ..
            }
        ));
        assert_eq!(record.worker.as_deref(), Some("worker-1"));
    }

    #[test]
    fn test_cannot_complete_queued_job() {
        let mut record = JobRecord::new("q", Path::new("a.pdf"));
        assert!(record.complete(sample_result()).is_err());
        assert_eq!(record.status, JobStatus::Queued);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("pending"), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = JobRecord::new("q", Path::new("/tmp/a.pdf"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "queued");
        assert!(json.get("sourcePath").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("result").is_none());
    }
}
