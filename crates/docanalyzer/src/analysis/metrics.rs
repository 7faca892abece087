use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Net income must exceed this share of detected debt for a BUY.
pub const LEVERAGE_RATIO: f64 = 0.05;

/// Maximum number of non-digit characters allowed between a label and its amount.
const LABEL_WINDOW: usize = 25;

const RATIONALE_INSUFFICIENT: &str = "Insufficient financial metrics for strong conviction.";
const RATIONALE_NO_DEBT: &str = "Company is profitable with no detected debt.";
const RATIONALE_MANAGEABLE: &str = "Positive profitability and manageable leverage.";
const RATIONALE_LEVERAGED: &str = "Profitable but debt level requires monitoring.";
const RATIONALE_LOSS: &str = "Negative net income increases downside risk.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Cautious,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Buy => write!(f, "BUY"),
            Recommendation::Hold => write!(f, "HOLD"),
            Recommendation::Cautious => write!(f, "CAUTIOUS"),
        }
    }
}

/// Monetary figures found in the document. `None` means the label was absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub cash: Option<f64>,
    pub debt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentAnalysis {
    pub query: String,
    pub metrics: FinancialMetrics,
    pub recommendation: Recommendation,
    pub recommendation_rationale: String,
}

/// Extracts labelled money amounts and derives an investment recommendation.
pub struct InvestmentAnalyzer {
    whitespace: Regex,
    revenue: Regex,
    net_income: Regex,
    cash: Regex,
    debt: Regex,
}

impl InvestmentAnalyzer {
    pub fn new() -> Self {
        Self {
            whitespace: Regex::new(r"\s+").expect("static whitespace pattern"),
            revenue: money_pattern("revenue"),
            net_income: money_pattern("net income"),
            cash: money_pattern("cash"),
            debt: money_pattern("debt"),
        }
    }

    pub fn analyze(&self, text: &str, query: &str) -> Result<InvestmentAnalysis, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput {
                analysis: "investment analysis",
            });
        }

        let normalized = self.whitespace.replace_all(text, " ");
        let metrics = FinancialMetrics {
            revenue: extract_amount(&self.revenue, &normalized),
            net_income: extract_amount(&self.net_income, &normalized),
            cash: extract_amount(&self.cash, &normalized),
            debt: extract_amount(&self.debt, &normalized),
        };

        let (recommendation, rationale) = recommend(&metrics);

        Ok(InvestmentAnalysis {
            query: query.to_string(),
            metrics,
            recommendation,
            recommendation_rationale: rationale.to_string(),
        })
    }
}

impl Default for InvestmentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the shared analyzer instance.
pub fn analyze_metrics(text: &str, query: &str) -> Result<InvestmentAnalysis, AnalysisError> {
    static ANALYZER: OnceLock<InvestmentAnalyzer> = OnceLock::new();
    ANALYZER
        .get_or_init(InvestmentAnalyzer::new)
        .analyze(text, query)
}

/// Applies the recommendation policy to extracted metrics.
///
/// A reported loss is enough for CAUTIOUS on its own; a positive call needs
/// both revenue and net income.
pub fn recommend(metrics: &FinancialMetrics) -> (Recommendation, &'static str) {
    match (metrics.revenue, metrics.net_income) {
        (_, Some(net_income)) if net_income < 0.0 => {
            (Recommendation::Cautious, RATIONALE_LOSS)
        }
        (Some(_), Some(net_income)) if net_income > 0.0 => match metrics.debt {
            None => (Recommendation::Buy, RATIONALE_NO_DEBT),
            Some(debt) if net_income > debt * LEVERAGE_RATIO => {
                (Recommendation::Buy, RATIONALE_MANAGEABLE)
            }
            Some(_) => (Recommendation::Hold, RATIONALE_LEVERAGED),
        },
        _ => (Recommendation::Hold, RATIONALE_INSUFFICIENT),
    }
}

fn money_pattern(label: &str) -> Regex {
    let pattern = format!(
        r"(?i){}(?P<gap>[^0-9]{{0,{}}})(?P<amount>[0-9][0-9,]*(?:\.[0-9]+)?)",
        regex::escape(label),
        LABEL_WINDOW
    );
    Regex::new(&pattern).expect("money pattern is built from escaped literals")
}

fn extract_amount(pattern: &Regex, text: &str) -> Option<f64> {
    let captures = pattern.captures(text)?;
    let amount = captures.name("amount")?.as_str().replace(',', "");
    let value: f64 = amount.parse().ok()?;

    let gap = captures.name("gap").map(|m| m.as_str()).unwrap_or_default();
    if is_negative(gap) {
        Some(-value)
    } else {
        Some(value)
    }
}

/// A minus sign or opening parenthesis directly in front of the amount
/// (optionally separated by a currency symbol) marks it as negative.
/// A dash set off by spaces ("Revenue - $10") is a separator, not a sign.
fn is_negative(gap: &str) -> bool {
    let gap = gap.strip_suffix(' ').unwrap_or(gap);
    let gap = gap.strip_suffix(['$', '€', '£']).unwrap_or(gap);
    gap.ends_with(['-', '\u{2212}', '('])
}
