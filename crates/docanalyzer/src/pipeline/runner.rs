use std::sync::Arc;

use tracing::{debug, info_span};

use crate::analysis::{assess_risk, AnalysisResult, InvestmentAnalyzer};
use crate::processor::{ProcessorRegistry, TextExtractor};
use crate::sanitize;

use super::context::PipelineContext;
use super::error::{PipelineError, PipelineStage};

/// Extract, score metrics, assess risk. Stateless between runs and shared
/// by every worker.
pub struct Pipeline {
    extractor: Arc<dyn TextExtractor>,
    investment: InvestmentAnalyzer,
}

impl Pipeline {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            extractor,
            investment: InvestmentAnalyzer::new(),
        }
    }

    /// Pipeline backed by the built-in PDF and plain-text extractors.
    pub fn with_default_extractor() -> Self {
        Self::new(Arc::new(ProcessorRegistry::new()))
    }

    /// Runs every stage in order and stops at the first failure.
    ///
    /// `should_stop` is consulted before each stage; when it returns true the
    /// run ends with [`PipelineError::Cancelled`] naming the stage that was
    /// about to start. Pass `&|| false` to always run to completion.
    pub fn run(
        &self,
        ctx: &PipelineContext,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<AnalysisResult, PipelineError> {
        let filename = sanitize::redact_path(&ctx.source_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job_id,
            filename = %filename,
        )
        .entered();

        let checkpoint = |stage: PipelineStage| {
            if should_stop() {
                debug!(stage = %stage, "Shutdown requested, abandoning job");
                Err(PipelineError::Cancelled(stage))
            } else {
                Ok(())
            }
        };

        // Stage 1: extract text
        checkpoint(PipelineStage::Extract)?;
        let text = {
            let _step = info_span!("extract").entered();
            let text = self.extractor.extract_text(&ctx.source_path)?;
            if text.trim().is_empty() {
                return Err(crate::error::ProcessError::EmptyContent.into());
            }
            debug!(chars = text.len(), "Text extracted");
            text
        };

        // Stage 2: financial metrics and recommendation
        checkpoint(PipelineStage::AnalyzeMetrics)?;
        let investment_analysis = {
            let _step = info_span!("analyze_metrics").entered();
            self.investment
                .analyze(&text, &ctx.query)
                .map_err(|source| PipelineError::Analysis {
                    stage: PipelineStage::AnalyzeMetrics,
                    source,
                })?
        };

        // Stage 3: risk keywords
        checkpoint(PipelineStage::AssessRisk)?;
        let risk_assessment = {
            let _step = info_span!("assess_risk").entered();
            assess_risk(&text).map_err(|source| PipelineError::Analysis {
                stage: PipelineStage::AssessRisk,
                source,
            })?
        };

        debug!(
            recommendation = %investment_analysis.recommendation,
            risk_count = risk_assessment.risk_count,
            "Pipeline finished"
        );

        Ok(AnalysisResult {
            investment_analysis,
            risk_assessment,
        })
    }
}
