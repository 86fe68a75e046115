//! Records produced by the analysis pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateway::{BeliefSetHandle, EngineSignature, ModelDescription};

/// The outcome of analyzing one text.
///
/// A degraded analysis is still well formed: it is recognisable by a
/// non-empty `validation_errors` and a low `confidence_score`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Formula lines, without declarations.
    pub formulas: Vec<String>,
    /// Sort and type declarations emitted by rule-based conversion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declarations: Vec<String>,
    pub interpretations: Vec<ModelDescription>,
    pub consistency_check: bool,
    pub inferences: Vec<String>,
    pub validation_errors: Vec<String>,
    /// In `[0, 1]`.
    pub confidence_score: f64,
    pub reasoning_steps: Vec<String>,
}

impl AnalysisResult {
    pub fn is_degraded(&self) -> bool {
        !self.validation_errors.is_empty()
    }
}

/// A belief set a caller can query.
///
/// Carries the engine handle when it was built programmatically; otherwise
/// only the textual content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeliefSet {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<BeliefSetHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<EngineSignature>,
}

impl BeliefSet {
    /// A text-only belief set.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Non-blank lines of the content, in order.
    pub fn lines(&self) -> Vec<String> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The content split the way the engine reads it: every line, blank
    /// separator included.
    pub fn raw_lines(&self) -> Vec<String> {
        self.content.lines().map(str::to_string).collect()
    }
}

/// Answer to [`super::AnalysisPipeline::execute_query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// `None` when no verdict could be reached.
    pub holds: Option<bool>,
    pub message: String,
}

impl QueryOutcome {
    pub fn undecided(message: impl Into<String>) -> Self {
        Self {
            holds: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.holds {
            Some(true) => "ACCEPTED",
            Some(false) => "REJECTED",
            None => "UNKNOWN",
        };
        write!(f, "{verdict}: {}", self.message)
    }
}

/// Aggregate statistics over cached analyses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_analyses: usize,
    pub avg_confidence: f64,
    /// Fraction of analyses whose formulas were found consistent.
    pub consistency_rate: f64,
    pub total_formulas: usize,
    pub total_inferences: usize,
    pub analyses_with_errors: usize,
}

impl AnalysisSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a AnalysisResult>) -> Self {
        let mut summary = Self::default();
        let mut confidence_sum = 0.0;
        let mut consistent = 0usize;
        for r in results {
            summary.total_analyses += 1;
            confidence_sum += r.confidence_score;
            consistent += usize::from(r.consistency_check);
            summary.total_formulas += r.formulas.len();
            summary.total_inferences += r.inferences.len();
            summary.analyses_with_errors += usize::from(r.is_degraded());
        }
        if summary.total_analyses > 0 {
            let n = summary.total_analyses as f64;
            summary.avg_confidence = confidence_sum / n;
            summary.consistency_rate = consistent as f64 / n;
        }
        summary
    }
}
