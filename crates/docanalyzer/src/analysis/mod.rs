//! Deterministic scoring of extracted document text.
//!
//! Both analysers are pure: the same text always yields the same output and
//! the only failure mode is empty input.

pub mod metrics;
pub mod risk;

use serde::{Deserialize, Serialize};

pub use metrics::{
    analyze_metrics, FinancialMetrics, InvestmentAnalysis, InvestmentAnalyzer, Recommendation,
};
pub use risk::{assess_risk, RiskAssessment, RiskLevel, RISK_CATEGORIES};

/// Output of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub investment_analysis: InvestmentAnalysis,
    pub risk_assessment: RiskAssessment,
}
