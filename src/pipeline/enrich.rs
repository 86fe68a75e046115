//! Post-reasoning enrichment: reasoning trace, confidence adjustment, and the
//! optional LLM second opinion.

use crate::convert::prompt;
use crate::gateway::ModelDescription;
use crate::llm::{self, CompletionError, CompletionService};
use crate::pipeline::AnalysisResult;

/// Ceiling for the consistency bonus.
pub const CONFIDENCE_CEILING: f64 = 0.95;
/// Floor for the error penalty.
pub const CONFIDENCE_FLOOR: f64 = 0.1;

/// Append the trace summary and nudge the confidence score.
///
/// Consistent analyses with inferences and no errors gain 0.1 (capped at
/// [`CONFIDENCE_CEILING`]); analyses with errors lose 0.2 (floored at
/// [`CONFIDENCE_FLOOR`]).
pub fn enrich(result: &mut AnalysisResult) {
    result
        .reasoning_steps
        .push(format!("Analyse de {} formule(s)", result.formulas.len()));
    result.reasoning_steps.push(format!(
        "Vérification de cohérence: {}",
        if result.consistency_check {
            "cohérent"
        } else {
            "incohérent ou indéterminé"
        }
    ));
    result.reasoning_steps.push(format!(
        "{} inférence(s) dérivée(s)",
        result.inferences.len()
    ));
    result.reasoning_steps.push(format!(
        "{} modèle(s) généré(s)",
        result.interpretations.len()
    ));

    if result.consistency_check
        && !result.inferences.is_empty()
        && result.validation_errors.is_empty()
    {
        result.confidence_score = (result.confidence_score + 0.1).min(CONFIDENCE_CEILING);
    } else if !result.validation_errors.is_empty() {
        result.confidence_score = (result.confidence_score - 0.2).max(CONFIDENCE_FLOOR);
    }
}

/// The LLM's independent assessment of an analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondOpinion {
    pub consistency: Option<bool>,
    pub inferences: Vec<String>,
    pub interpretations: Vec<ModelDescription>,
    pub validation_errors: Vec<String>,
    pub reasoning_steps: Vec<String>,
    pub confidence: Option<f64>,
}

/// Parse an enrichment reply. Missing fields are empty.
pub fn parse_second_opinion(response: &str) -> Result<SecondOpinion, CompletionError> {
    let value = llm::extract_json_object(response)?;
    let interpretations = value["interpretations"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(ModelDescription {
                        description: s.clone(),
                        ..Default::default()
                    }),
                    serde_json::Value::Object(_) => {
                        serde_json::from_value::<ModelDescription>(item.clone()).ok()
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SecondOpinion {
        consistency: value["consistency"].as_bool(),
        inferences: llm::string_array(&value, "inferences").unwrap_or_default(),
        interpretations,
        validation_errors: llm::string_array(&value, "validation_errors").unwrap_or_default(),
        reasoning_steps: llm::string_array(&value, "reasoning_steps").unwrap_or_default(),
        confidence: value["confidence"].as_f64().map(|c| c.clamp(0.0, 1.0)),
    })
}

/// Fold a second opinion into a result: lists are extended, the confidence
/// becomes the maximum of both scores.
pub fn merge_second_opinion(result: &mut AnalysisResult, opinion: SecondOpinion, service: &str) {
    result.inferences.extend(opinion.inferences);
    result.interpretations.extend(opinion.interpretations);
    result.validation_errors.extend(opinion.validation_errors);
    result.reasoning_steps.push(format!(
        "Avis LLM ({service}): {}",
        match opinion.consistency {
            Some(true) => "cohérent",
            Some(false) => "incohérent",
            None => "cohérence non évaluée",
        }
    ));
    result.reasoning_steps.extend(opinion.reasoning_steps);
    if let Some(confidence) = opinion.confidence {
        result.confidence_score = result.confidence_score.max(confidence);
    }
}

/// Ask the completion service for a second opinion and merge it.
///
/// Failures are logged and noted in the trace; the result is otherwise left
/// untouched.
pub async fn llm_second_pass(
    result: &mut AnalysisResult,
    service: &dyn CompletionService,
    text: &str,
) {
    let reply = service
        .complete(
            &prompt::enrichment_prompt(text, &result.formulas),
            Some(prompt::ENRICHMENT_SYSTEM),
        )
        .await
        .and_then(|r| parse_second_opinion(&r));
    match reply {
        Ok(opinion) => merge_second_opinion(result, opinion, service.name()),
        Err(e) => {
            tracing::warn!(error = %e, "LLM enrichment pass failed");
            result
                .reasoning_steps
                .push(format!("Enrichissement LLM ignoré: {e}"));
        }
    }
}
