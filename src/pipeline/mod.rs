//! The analysis pipeline: text → formulas → engine verdicts → enriched result.
//!
//! [`AnalysisPipeline::analyze`] never fails. Conversion problems fall back to
//! the cue rules, engine errors become `validation_errors` with a low
//! confidence, and a missing engine is treated as "assume consistent". The
//! programmatic path ([`AnalysisPipeline::build_belief_set`]) is the opposite:
//! engine errors are returned to the caller.

pub mod enrich;
pub mod result;

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use regex::Regex;

use crate::cache::{AnalysisCache, cache_key};
use crate::config::PipelineConfig;
use crate::convert::{prompt, NlToFolConverter};
use crate::error::{GatewayResult, RhetorResult};
use crate::fol::syntax::{self, FolDocument, unicode_to_ascii};
use crate::fol::{BeliefSetMaterializer, FormulaBuilder};
use crate::gateway::{NullGateway, QueryTarget, ReasoningGateway};
use crate::llm::{self, CompletionError, CompletionService, OllamaClient, OllamaConfig};

pub use result::{AnalysisResult, AnalysisSummary, BeliefSet, QueryOutcome};

/// Reserved query: is the belief set consistent?
pub const CONSISTENCY_QUERY: &str = "consistency_check";
/// Reserved query: does the belief set entail anything?
pub const DERIVE_QUERY: &str = "derive_conclusions";

/// Error recorded when there is nothing to analyze.
pub const EMPTY_TEXT_ERROR: &str = "Texte vide: aucune formule à analyser";
/// Error recorded when the engine finds the formulas inconsistent.
pub const INCONSISTENT_ERROR: &str = "Formules incohérentes détectées";

/// Confidence after the engine confirms consistency and derives inferences.
const CONFIDENCE_DERIVED: f64 = 0.9;
/// Confidence when the engine reports an inconsistency.
const CONFIDENCE_INCONSISTENT: f64 = 0.3;
/// Confidence when the engine call failed.
const CONFIDENCE_ENGINE_ERROR: f64 = 0.1;
/// Confidence when no engine is configured.
const CONFIDENCE_UNCHECKED: f64 = 0.5;

static RE_GROUND_ATOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z0-9_]*\(\s*[a-z0-9_][A-Za-z0-9_]*(?:\s*,\s*[a-z0-9_][A-Za-z0-9_]*)*\s*\)")
        .expect("valid regex")
});

fn engine_error(e: impl std::fmt::Display) -> String {
    format!("Erreur Tweety: {e}")
}

/// How the reasoning step of one analysis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineOutcome {
    /// The engine answered every call.
    Checked,
    /// An engine call failed.
    Failed,
    /// No engine is configured.
    Unavailable,
}

/// External services the pipeline may use.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub gateway: Arc<dyn ReasoningGateway>,
    pub completion: Option<Arc<dyn CompletionService>>,
}

impl Capabilities {
    /// No engine and no completion service.
    pub fn offline() -> Self {
        Self {
            gateway: Arc::new(NullGateway),
            completion: None,
        }
    }

    pub fn with_gateway(gateway: Arc<dyn ReasoningGateway>) -> Self {
        Self {
            gateway,
            completion: None,
        }
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Attach an Ollama server as the completion service.
    ///
    /// The server is contacted once up front; an unreachable server is an
    /// error rather than a silently degraded pipeline.
    pub async fn with_ollama(self, config: OllamaConfig) -> RhetorResult<Self> {
        let url = config.base_url.clone();
        let mut client = OllamaClient::new(config);
        let client = tokio::task::spawn_blocking(move || {
            client.probe();
            client
        })
        .await
        .map_err(|e| CompletionError::RequestFailed {
            message: format!("availability check aborted: {e}"),
        })?;
        if !client.is_available() {
            return Err(CompletionError::Unavailable { url }.into());
        }
        tracing::info!(model = client.model(), "using ollama completion service");
        Ok(self.with_completion(Arc::new(client)))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::offline()
    }
}

/// Orchestrates conversion, reasoning, enrichment, and caching.
#[derive(Debug)]
pub struct AnalysisPipeline {
    gateway: Arc<dyn ReasoningGateway>,
    completion: Option<Arc<dyn CompletionService>>,
    converter: NlToFolConverter,
    cache: AnalysisCache,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(capabilities: Capabilities, config: PipelineConfig) -> Self {
        let cache = AnalysisCache::new(config.cache.clone());
        Self::with_cache(capabilities, config, cache)
    }

    /// Use a caller-provided cache, e.g. one driven by a manual clock.
    pub fn with_cache(capabilities: Capabilities, config: PipelineConfig, cache: AnalysisCache) -> Self {
        tracing::info!(
            engine = capabilities.gateway.is_available(),
            completion = capabilities.completion.as_ref().map(|c| c.name()),
            cache_capacity = cache.config().capacity,
            "initializing analysis pipeline"
        );
        Self {
            converter: NlToFolConverter::new(capabilities.completion.clone()),
            gateway: capabilities.gateway,
            completion: capabilities.completion,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn converter(&self) -> &NlToFolConverter {
        &self.converter
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &dyn ReasoningGateway {
        self.gateway.as_ref()
    }

    /// Analyze `text` under an optional context.
    ///
    /// Results are memoized per (text, context). Empty input yields a result
    /// with confidence 0 and is not cached.
    pub async fn analyze(&self, text: &str, context: Option<&serde_json::Value>) -> AnalysisResult {
        if text.trim().is_empty() {
            return AnalysisResult {
                validation_errors: vec![EMPTY_TEXT_ERROR.into()],
                confidence_score: 0.0,
                reasoning_steps: vec!["Aucun texte fourni".into()],
                ..Default::default()
            };
        }

        let key = cache_key(text, context);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "analysis cache hit");
            return (*hit).clone();
        }
        tracing::debug!(key = %key, "analysis cache miss");

        let started = Instant::now();
        let conversion = self.converter.convert(text).await;
        let mut result = AnalysisResult {
            formulas: conversion.document.formulas.clone(),
            declarations: conversion.document.declarations.clone(),
            reasoning_steps: conversion.trace(),
            ..Default::default()
        };

        if conversion.document.is_empty() {
            result.validation_errors.push(EMPTY_TEXT_ERROR.into());
            return result;
        }

        let outcome = self.reason(&conversion.document, &mut result).await;
        enrich::enrich(&mut result);

        // Only an engine verdict may be refined; a failed or missing engine keeps its fixed score.
        if outcome == EngineOutcome::Checked
            && self.config.enrichment.llm_pass
            && let Some(service) = self.completion.as_deref()
        {
            enrich::llm_second_pass(&mut result, service, text).await;
        }
        result.confidence_score = result.confidence_score.clamp(0.0, 1.0);

        tracing::info!(
            formulas = result.formulas.len(),
            consistent = result.consistency_check,
            inferences = result.inferences.len(),
            errors = result.validation_errors.len(),
            confidence = result.confidence_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );

        self.cache.insert(key, Arc::new(result.clone()));
        result
    }

    /// Consult the engine and record its verdicts on `result`.
    async fn reason(&self, document: &FolDocument, result: &mut AnalysisResult) -> EngineOutcome {
        if !self.gateway.is_available() {
            tracing::warn!("no reasoning engine configured, assuming consistency");
            result.consistency_check = true;
            result.confidence_score = CONFIDENCE_UNCHECKED;
            result
                .reasoning_steps
                .push("Moteur de raisonnement indisponible: cohérence supposée".into());
            return EngineOutcome::Unavailable;
        }

        let lines = document.lines();
        match self.consult_engine(&lines, result).await {
            Ok(()) => EngineOutcome::Checked,
            Err(e) => {
                tracing::warn!(error = %e, "reasoning engine failed");
                result.consistency_check = false;
                result.validation_errors.push(engine_error(&e));
                result.confidence_score = CONFIDENCE_ENGINE_ERROR;
                EngineOutcome::Failed
            }
        }
    }

    async fn consult_engine(&self, lines: &[String], result: &mut AnalysisResult) -> GatewayResult<()> {
        let verdict = self.gateway.check_consistency(lines).await?;
        if let Some(diagnostic) = verdict.diagnostic.as_deref().filter(|d| !d.is_empty()) {
            result
                .reasoning_steps
                .push(format!("Diagnostic du moteur: {diagnostic}"));
        }

        if !verdict.consistent {
            result.consistency_check = false;
            result.validation_errors.push(INCONSISTENT_ERROR.into());
            result.confidence_score = CONFIDENCE_INCONSISTENT;
            return Ok(());
        }

        result.consistency_check = true;
        result.inferences = self.gateway.derive_inferences(lines).await?;
        result.confidence_score = CONFIDENCE_DERIVED;
        result.interpretations = self.gateway.generate_models(lines).await?;
        Ok(())
    }

    /// Whether `conclusion` follows from `premises`.
    ///
    /// The argument is valid iff the premises together with the negated
    /// conclusion are inconsistent. Without a working engine the answer is
    /// `false`.
    pub async fn validate_argument<S: AsRef<str>>(&self, premises: &[S], conclusion: &str) -> bool {
        if !self.gateway.is_available() {
            tracing::warn!("no reasoning engine configured, argument not validated");
            return false;
        }

        let mut formulas: Vec<String> = premises
            .iter()
            .map(|p| unicode_to_ascii(p.as_ref().trim()))
            .collect();
        formulas.push(syntax::negate_grouped(&unicode_to_ascii(conclusion.trim())));

        match self.gateway.check_consistency(&formulas).await {
            Ok(verdict) => {
                tracing::debug!(premises = premises.len(), valid = !verdict.consistent, "argument checked");
                !verdict.consistent
            }
            Err(e) => {
                tracing::warn!(error = %e, "argument validation failed");
                false
            }
        }
    }

    /// Convert `text` into a queryable, text-only belief set.
    pub async fn text_to_belief_set(&self, text: &str) -> BeliefSet {
        let conversion = self.converter.convert(text).await;
        BeliefSet::from_content(conversion.document.render())
    }

    /// Build a belief set in the engine from builder state.
    ///
    /// Engine errors are returned unchanged.
    pub async fn build_belief_set(&self, builder: &FormulaBuilder) -> GatewayResult<BeliefSet> {
        let built = BeliefSetMaterializer::new(self.gateway.as_ref())
            .build(builder)
            .await?;
        Ok(BeliefSet {
            content: built.declarations.render(),
            handle: Some(built.handle),
            signature: Some(built.signature),
        })
    }

    /// Formulas worth testing against `belief_set`.
    ///
    /// Uses the completion service when present; otherwise, or when it fails,
    /// returns the reserved queries followed by the ground facts of the
    /// belief set.
    pub async fn generate_queries(
        &self,
        text: &str,
        belief_set: &BeliefSet,
        context: Option<&serde_json::Value>,
    ) -> Vec<String> {
        if let Some(service) = self.completion.as_deref() {
            match llm_queries(service, text, belief_set, context).await {
                Ok(queries) if !queries.is_empty() => return queries,
                Ok(_) => tracing::warn!("completion service proposed no queries"),
                Err(e) => tracing::warn!(error = %e, "query generation failed, using fallback"),
            }
        }
        fallback_queries(belief_set)
    }

    /// Evaluate `query` against `belief_set`.
    ///
    /// [`CONSISTENCY_QUERY`] and [`DERIVE_QUERY`] are answered with a
    /// consistency check and an inference derivation respectively; any other
    /// query is a formula whose entailment is tested, against the engine
    /// handle when the belief set carries one.
    pub async fn execute_query(&self, belief_set: &BeliefSet, query: &str) -> QueryOutcome {
        if !self.gateway.is_available() {
            return QueryOutcome::undecided("Moteur de raisonnement indisponible");
        }

        match query.trim() {
            CONSISTENCY_QUERY => {
                match self.gateway.check_consistency(&belief_set.raw_lines()).await {
                    Ok(verdict) => QueryOutcome {
                        holds: Some(verdict.consistent),
                        message: verdict.diagnostic.unwrap_or_else(|| {
                            if verdict.consistent {
                                "Base de croyances cohérente".into()
                            } else {
                                "Base de croyances incohérente".into()
                            }
                        }),
                    },
                    Err(e) => QueryOutcome::undecided(engine_error(e)),
                }
            }
            DERIVE_QUERY => match self.gateway.derive_inferences(&belief_set.raw_lines()).await {
                Ok(inferences) if inferences.is_empty() => QueryOutcome {
                    holds: Some(false),
                    message: "Aucune conclusion dérivée".into(),
                },
                Ok(inferences) => QueryOutcome {
                    holds: Some(true),
                    message: inferences.join("; "),
                },
                Err(e) => QueryOutcome::undecided(engine_error(e)),
            },
            formula => {
                let formula = unicode_to_ascii(formula);
                let target = match &belief_set.handle {
                    Some(handle) => QueryTarget::Handle(handle),
                    None => QueryTarget::Content(&belief_set.content),
                };
                match self.gateway.execute_query(target, &formula).await {
                    Ok(answer) => QueryOutcome {
                        message: answer.diagnostic.unwrap_or_else(|| match answer.entailed {
                            Some(true) => format!("{formula} est impliquée"),
                            Some(false) => format!("{formula} n'est pas impliquée"),
                            None => format!("{formula}: indéterminé"),
                        }),
                        holds: answer.entailed,
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, query = %formula, "query failed");
                        QueryOutcome::undecided(engine_error(e))
                    }
                }
            }
        }
    }

    /// Aggregate statistics over the cached analyses.
    pub fn get_analysis_summary(&self) -> AnalysisSummary {
        let results = self.cache.snapshot();
        AnalysisSummary::from_results(results.iter().map(|r| &**r))
    }
}

async fn llm_queries(
    service: &dyn CompletionService,
    text: &str,
    belief_set: &BeliefSet,
    context: Option<&serde_json::Value>,
) -> Result<Vec<String>, CompletionError> {
    let reply = service
        .complete(
            &prompt::query_prompt(text, &belief_set.content, context),
            Some(prompt::QUERY_SYSTEM),
        )
        .await?;
    let value = llm::extract_json_object(&reply)?;
    let queries = llm::string_array(&value, "queries").ok_or_else(|| CompletionError::ParseError {
        message: "missing 'queries' array".into(),
    })?;
    Ok(dedup(
        queries
            .iter()
            .map(|q| unicode_to_ascii(q.trim()))
            .filter(|q| !q.is_empty()),
    ))
}

/// The reserved queries, then every ground atom stated as a fact in the
/// belief set, without duplicates.
pub fn fallback_queries(belief_set: &BeliefSet) -> Vec<String> {
    let atoms = belief_set
        .lines()
        .into_iter()
        .filter(|line| !syntax::is_declaration(line) && !syntax::is_quantified(line))
        .flat_map(|line| {
            RE_GROUND_ATOM
                .find_iter(&line)
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        });
    dedup([CONSISTENCY_QUERY.to_string(), DERIVE_QUERY.to_string()].into_iter().chain(atoms))
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
