//! Natural language → first-order formulas.
//!
//! Two paths:
//! - **LLM**: a completion service translates the text and replies with JSON
//!   (`formulas` plus `predicates`, `variables`, `reasoning` metadata). Formulas
//!   are normalized from Unicode logic symbols to the engine's ASCII syntax.
//! - **Rule-based** ([`rules`]): cue-word patterns, always available.
//!
//! A failed LLM call or a reply without usable `formulas` degrades to the
//! rule-based path. The degradation is recorded on the [`Conversion`] (and in
//! its trace), never raised.

pub mod prompt;
pub mod rules;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fol::syntax::{FolDocument, unicode_to_ascii};
use crate::llm::{self, CompletionError, CompletionService};

pub use rules::convert_rule_based;

/// Auxiliary data returned by the LLM alongside its formulas. Not validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmMetadata {
    pub service: String,
    pub predicates: serde_json::Value,
    pub variables: serde_json::Value,
    pub reasoning: Option<String>,
}

/// Which path produced a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversionSource {
    /// The completion service's formulas were used.
    Llm(LlmMetadata),
    /// No completion service was configured.
    RuleBased,
    /// The completion service failed; rule-based output was used instead.
    Degraded { reason: String },
}

/// Formulas for one text plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub document: FolDocument,
    pub source: ConversionSource,
}

impl Conversion {
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, ConversionSource::Degraded { .. })
    }

    /// Human-readable trace lines describing the conversion.
    pub fn trace(&self) -> Vec<String> {
        let n = self.document.formulas.len();
        match &self.source {
            ConversionSource::Llm(meta) => {
                let mut steps = vec![format!(
                    "Conversion LLM ({}): {n} formule(s) extraite(s)",
                    meta.service
                )];
                if let Some(reasoning) = meta.reasoning.as_deref().filter(|r| !r.is_empty()) {
                    steps.push(format!("Raisonnement LLM: {reasoning}"));
                }
                if let Some(preds) = meta.predicates.as_object().filter(|p| !p.is_empty()) {
                    let names: Vec<&str> = preds.keys().map(String::as_str).collect();
                    steps.push(format!("Prédicats LLM: {}", names.join(", ")));
                }
                steps
            }
            ConversionSource::RuleBased => {
                vec![format!("Conversion par règles: {n} formule(s) générée(s)")]
            }
            ConversionSource::Degraded { reason } => vec![
                format!("Conversion LLM indisponible ({reason}), repli sur les règles"),
                format!("Conversion par règles: {n} formule(s) générée(s)"),
            ],
        }
    }
}

/// Translates text into formulas, preferring the completion service when present.
#[derive(Debug, Clone, Default)]
pub struct NlToFolConverter {
    completion: Option<Arc<dyn CompletionService>>,
}

impl NlToFolConverter {
    pub fn new(completion: Option<Arc<dyn CompletionService>>) -> Self {
        Self { completion }
    }

    /// A converter that only uses the cue rules.
    pub fn rule_based() -> Self {
        Self::default()
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Convert `text`. Never fails.
    pub async fn convert(&self, text: &str) -> Conversion {
        let Some(service) = self.completion.as_deref() else {
            return Conversion {
                document: convert_rule_based(text),
                source: ConversionSource::RuleBased,
            };
        };

        match convert_with_llm(service, text).await {
            Ok((formulas, metadata)) => {
                tracing::debug!(service = service.name(), formulas = formulas.len(), "LLM conversion");
                Conversion {
                    document: FolDocument::from_formulas(formulas),
                    source: ConversionSource::Llm(metadata),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM conversion failed, using rule-based fallback");
                Conversion {
                    document: convert_rule_based(text),
                    source: ConversionSource::Degraded {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

async fn convert_with_llm(
    service: &dyn CompletionService,
    text: &str,
) -> Result<(Vec<String>, LlmMetadata), CompletionError> {
    let response = service
        .complete(&prompt::conversion_prompt(text), Some(prompt::CONVERSION_SYSTEM))
        .await?;
    parse_conversion_reply(&response, service.name())
}

/// Parse a conversion reply: a JSON object whose `formulas` is a non-empty
/// array of strings. Formulas are normalized to ASCII.
pub fn parse_conversion_reply(
    response: &str,
    service: &str,
) -> Result<(Vec<String>, LlmMetadata), CompletionError> {
    let value = llm::extract_json_object(response)?;
    let formulas: Vec<String> = llm::string_array(&value, "formulas")
        .ok_or_else(|| CompletionError::ParseError {
            message: "missing 'formulas' array".into(),
        })?
        .iter()
        .map(|f| unicode_to_ascii(f.trim()))
        .filter(|f| !f.is_empty())
        .collect();
    if formulas.is_empty() {
        return Err(CompletionError::ParseError {
            message: "'formulas' array is empty".into(),
        });
    }

    let metadata = LlmMetadata {
        service: service.to_string(),
        predicates: value["predicates"].clone(),
        variables: value["variables"].clone(),
        reasoning: value["reasoning"].as_str().map(str::to_string),
    };
    Ok((formulas, metadata))
}
