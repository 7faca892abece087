use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Keyword categories and the message recorded when each is found.
/// Matching is a case-insensitive substring test; each category counts once.
pub const RISK_CATEGORIES: &[(&str, &str)] = &[
    ("supply chain", "Supply-chain exposure mentioned."),
    ("regulatory", "Regulatory risk discussed."),
    ("litigation", "Legal/litigation risk detected."),
    ("volatility", "Market volatility highlighted."),
    ("inflation", "Inflationary pressure referenced."),
    ("recession", "Recession-related concern detected."),
];

pub const HIGH_RISK_THRESHOLD: usize = 4;
pub const MEDIUM_RISK_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_count(count: usize) -> Self {
        if count >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if count >= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub detected_risks: Vec<String>,
    pub risk_count: usize,
    pub overall_risk_level: RiskLevel,
}

pub fn assess_risk(text: &str) -> Result<RiskAssessment, AnalysisError> {
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyInput {
            analysis: "risk assessment",
        });
    }

    let lowered = text.to_lowercase();
    let detected_risks: Vec<String> = RISK_CATEGORIES
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, message)| message.to_string())
        .collect();

    let risk_count = detected_risks.len();

    Ok(RiskAssessment {
        detected_risks,
        risk_count,
        overall_risk_level: RiskLevel::from_count(risk_count),
    })
}
