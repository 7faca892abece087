use std::fmt;

use thiserror::Error;

use crate::error::{AnalysisError, ProcessError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Extract,
    AnalyzeMetrics,
    AssessRisk,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Extract => "extract",
            PipelineStage::AnalyzeMetrics => "analyze_metrics",
            PipelineStage::AssessRisk => "assess_risk",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First failure of a pipeline run. The display text is what lands in a
/// failed job's `error` field.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("extract: {0}")]
    Extraction(#[from] ProcessError),

    #[error("{stage}: {source}")]
    Analysis {
        stage: PipelineStage,
        #[source]
        source: AnalysisError,
    },

    #[error("cancelled: shutdown requested before stage {0}")]
    Cancelled(PipelineStage),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Stage the failure is attributed to, when known.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Extraction(_) => Some(PipelineStage::Extract),
            PipelineError::Analysis { stage, .. } => Some(*stage),
            PipelineError::Cancelled(stage) => Some(*stage),
            PipelineError::Panicked(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stage_tagged() {
        let err = PipelineError::from(ProcessError::EmptyContent);
        assert_eq!(err.to_string(), "extract: Document contains no readable text");
        assert_eq!(err.stage(), Some(PipelineStage::Extract));

        let err = PipelineError::Analysis {
            stage: PipelineStage::AssessRisk,
            source: AnalysisError::EmptyInput {
                analysis: "risk assessment",
            },
        };
        assert!(err.to_string().starts_with("assess_risk: "));

        let err = PipelineError::Cancelled(PipelineStage::AnalyzeMetrics);
        assert_eq!(
            err.to_string(),
            "cancelled: shutdown requested before stage analyze_metrics"
        );
    }
}
