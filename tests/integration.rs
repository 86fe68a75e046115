//! End-to-end tests for the analysis pipeline.
//!
//! These tests drive the public facade against instrumented gateway and
//! completion stubs, checking degradation, caching, validation, and the
//! programmatic belief-set path together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use rhetor::cache::{AnalysisCache, CacheConfig, ManualClock};
use rhetor::config::{EnrichmentConfig, PipelineConfig};
use rhetor::convert::{prompt, ConversionSource};
use rhetor::error::{GatewayError, GatewayResult};
use rhetor::fol::{BeliefSetDeclarations, FormulaBuilder, SortResolution};
use rhetor::gateway::{
    BeliefSetHandle, ConsistencyVerdict, EngineSignature, ModelDescription, QueryAnswer,
    QueryTarget, ReasoningGateway,
};
use rhetor::llm::{CompletionError, CompletionService};
use rhetor::pipeline::{
    AnalysisPipeline, BeliefSet, Capabilities, CONSISTENCY_QUERY, DERIVE_QUERY,
    EMPTY_TEXT_ERROR, INCONSISTENT_ERROR,
};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StubGateway {
    consistent: bool,
    failure: Option<GatewayError>,
    fail_build: bool,
    inferences: Vec<String>,
    consistency_calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
    queries: Mutex<Vec<String>>,
}

impl StubGateway {
    fn consistent() -> Self {
        Self {
            consistent: true,
            inferences: vec!["Q0(a)".into()],
            ..Default::default()
        }
    }

    fn inconsistent() -> Self {
        Self::default()
    }

    fn failing(message: &str) -> Self {
        Self {
            failure: Some(GatewayError::engine(message)),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.consistency_calls.load(Ordering::SeqCst)
    }

    fn last_seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn fail(&self) -> GatewayResult<()> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReasoningGateway for StubGateway {
    async fn check_consistency(&self, formulas: &[String]) -> GatewayResult<ConsistencyVerdict> {
        self.consistency_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(formulas.to_vec());
        tokio::task::yield_now().await;
        self.fail()?;
        Ok(if self.consistent {
            ConsistencyVerdict::consistent()
        } else {
            ConsistencyVerdict::inconsistent()
        })
    }

    async fn derive_inferences(&self, _formulas: &[String]) -> GatewayResult<Vec<String>> {
        self.fail()?;
        Ok(self.inferences.clone())
    }

    async fn generate_models(&self, _formulas: &[String]) -> GatewayResult<Vec<ModelDescription>> {
        self.fail()?;
        Ok(vec![ModelDescription {
            description: "P0 = {a}".into(),
            ..Default::default()
        }])
    }

    async fn build_belief_set(
        &self,
        declarations: &BeliefSetDeclarations,
    ) -> GatewayResult<(BeliefSetHandle, EngineSignature)> {
        if self.fail_build {
            return Err(GatewayError::engine("unknown sort in type(mortal(mortal))"));
        }
        Ok((
            BeliefSetHandle("bs-1".into()),
            EngineSignature {
                sorts: declarations.sorts.iter().map(|s| s.name.clone()).collect(),
                constants: declarations
                    .sorts
                    .iter()
                    .flat_map(|s| s.constants.iter().cloned())
                    .collect(),
                predicates: declarations.predicates.iter().map(|p| p.name.clone()).collect(),
            },
        ))
    }

    async fn execute_query(
        &self,
        target: QueryTarget<'_>,
        query: &str,
    ) -> GatewayResult<QueryAnswer> {
        let target = match target {
            QueryTarget::Handle(h) => format!("handle:{h}"),
            QueryTarget::Content(_) => "content".to_string(),
        };
        self.queries.lock().unwrap().push(format!("{target} {query}"));
        self.fail()?;
        Ok(QueryAnswer {
            entailed: Some(query == "mortal(socrate)"),
            diagnostic: None,
        })
    }
}

/// Completion stub answering by system prompt.
#[derive(Debug)]
struct StubCompletion {
    conversion: String,
    enrichment: String,
    queries: String,
    /// System prompt whose requests fail as if the server dropped them.
    failing: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubCompletion {
    fn new(conversion: &str) -> Self {
        Self {
            conversion: conversion.into(),
            enrichment: r#"{"consistency": true, "inferences": ["Mortal(socrate)"], "confidence": 0.99}"#.into(),
            queries: r#"{"queries": ["Mortal(socrate)", "∃x(Human(x))", "Mortal(socrate)"]}"#.into(),
            failing: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_at(system: &'static str, conversion: &str) -> Self {
        Self {
            failing: Some(system),
            ..Self::new(conversion)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _prompt: &str, system: Option<&str>) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if system.is_some() && system == self.failing {
            return Err(CompletionError::RequestFailed {
                message: "connection reset by peer".into(),
            });
        }
        match system {
            Some(prompt::CONVERSION_SYSTEM) => Ok(self.conversion.clone()),
            Some(prompt::ENRICHMENT_SYSTEM) => Ok(self.enrichment.clone()),
            Some(prompt::QUERY_SYSTEM) => Ok(self.queries.clone()),
            _ => Err(CompletionError::RequestFailed {
                message: "unexpected prompt".into(),
            }),
        }
    }
}

fn pipeline_with(gateway: Arc<StubGateway>) -> AnalysisPipeline {
    AnalysisPipeline::new(Capabilities::with_gateway(gateway), PipelineConfig::default())
}

const SYLLOGISM: &str = "Tous les hommes sont mortels. Socrate est un homme.";

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consistent_analysis_is_enriched() {
    let gateway = Arc::new(StubGateway::consistent());
    let pipeline = pipeline_with(gateway.clone());

    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert!(result.consistency_check);
    assert_eq!(result.inferences, vec!["Q0(a)"]);
    assert_eq!(result.interpretations.len(), 1);
    assert!(result.validation_errors.is_empty());
    assert!((result.confidence_score - 0.95).abs() < 1e-9);
    assert_eq!(
        result.formulas,
        vec!["forall X: (P0(X) => Q0(X))", "P1(a)"]
    );

    // The engine sees declarations, the blank separator, then formulas.
    let seen = gateway.last_seen();
    assert_eq!(seen[0], "thing = {a}");
    let blank = seen.iter().position(String::is_empty).unwrap();
    assert_eq!(&seen[blank + 1..], result.formulas.as_slice());
}

#[tokio::test]
async fn inconsistency_is_reported_in_band() {
    let pipeline = pipeline_with(Arc::new(StubGateway::inconsistent()));
    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert!(!result.consistency_check);
    assert_eq!(result.validation_errors, vec![INCONSISTENT_ERROR]);
    assert!((result.confidence_score - 0.1).abs() < 1e-9);
    assert!(result.inferences.is_empty());
}

#[tokio::test]
async fn engine_failure_degrades_gracefully() {
    let pipeline = pipeline_with(Arc::new(StubGateway::failing("parse error at line 2")));
    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert!(!result.consistency_check);
    assert!((result.confidence_score - 0.1).abs() < 1e-9);
    assert!(
        result
            .validation_errors
            .iter()
            .any(|e| e.starts_with("Erreur Tweety") && e.contains("parse error at line 2"))
    );
    assert!(result.inferences.is_empty());
    assert!(result.interpretations.is_empty());
}

#[tokio::test]
async fn unreadable_engine_reply_is_an_engine_error() {
    let gateway = Arc::new(StubGateway {
        failure: Some(GatewayError::malformed("verdict: peut-être")),
        ..StubGateway::consistent()
    });
    let result = pipeline_with(gateway).analyze(SYLLOGISM, None).await;
    assert!(!result.consistency_check);
    assert!((result.confidence_score - 0.1).abs() < 1e-9);
    assert_eq!(
        result.validation_errors,
        vec!["Erreur Tweety: reasoning engine returned an unexpected reply: verdict: peut-être"]
    );
}

#[tokio::test]
async fn empty_text_never_reaches_the_engine() {
    let gateway = Arc::new(StubGateway::consistent());
    let pipeline = pipeline_with(gateway.clone());
    let result = pipeline.analyze("", None).await;
    assert_eq!(result.confidence_score, 0.0);
    assert_eq!(result.validation_errors, vec![EMPTY_TEXT_ERROR]);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn repeated_analysis_hits_the_cache() {
    let gateway = Arc::new(StubGateway::consistent());
    let pipeline = pipeline_with(gateway.clone());
    let ctx = serde_json::json!({"speaker": "Platon"});

    let first = pipeline.analyze(SYLLOGISM, Some(&ctx)).await;
    let second = pipeline.analyze(SYLLOGISM, Some(&ctx)).await;
    assert_eq!(first, second);
    assert_eq!(gateway.calls(), 1);

    pipeline.analyze(SYLLOGISM, None).await;
    assert_eq!(gateway.calls(), 2);
    assert_eq!(pipeline.cache().len(), 2);
}

#[tokio::test]
async fn expired_entries_are_recomputed() {
    let gateway = Arc::new(StubGateway::consistent());
    let clock = Arc::new(ManualClock::new());
    let config = PipelineConfig {
        cache: CacheConfig {
            capacity: 4,
            max_age_secs: Some(10),
        },
        ..Default::default()
    };
    let cache = AnalysisCache::with_clock(config.cache.clone(), clock.clone());
    let pipeline = AnalysisPipeline::with_cache(
        Capabilities::with_gateway(gateway.clone()),
        config,
        cache,
    );

    pipeline.analyze(SYLLOGISM, None).await;
    clock.advance(Duration::from_secs(5));
    pipeline.analyze(SYLLOGISM, None).await;
    assert_eq!(gateway.calls(), 1);

    clock.advance(Duration::from_secs(30));
    pipeline.analyze(SYLLOGISM, None).await;
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test]
async fn concurrent_identical_analyses_are_well_formed() {
    let gateway = Arc::new(StubGateway::consistent());
    let pipeline = pipeline_with(gateway.clone());

    let (a, b) = tokio::join!(
        pipeline.analyze(SYLLOGISM, None),
        pipeline.analyze(SYLLOGISM, None)
    );
    for result in [&a, &b] {
        assert!(result.consistency_check);
        assert!((0.0..=1.0).contains(&result.confidence_score));
        assert_eq!(result.formulas.len(), 2);
    }
    assert!((1..=2).contains(&gateway.calls()));
    assert_eq!(pipeline.cache().len(), 1);
}

#[tokio::test]
async fn summary_aggregates_cached_analyses() {
    let pipeline = pipeline_with(Arc::new(StubGateway::consistent()));
    assert_eq!(pipeline.get_analysis_summary().total_analyses, 0);

    pipeline.analyze(SYLLOGISM, None).await;
    pipeline.analyze("Certains oiseaux volent.", None).await;
    let summary = pipeline.get_analysis_summary();
    assert_eq!(summary.total_analyses, 2);
    assert_eq!(summary.total_formulas, 3);
    assert_eq!(summary.total_inferences, 2);
    assert!((summary.consistency_rate - 1.0).abs() < 1e-9);
    assert!((summary.avg_confidence - 0.95).abs() < 1e-9);
    assert_eq!(summary.analyses_with_errors, 0);
}

// ---------------------------------------------------------------------------
// LLM paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn llm_formulas_are_used_and_second_opinion_merged() {
    let gateway = Arc::new(StubGateway::consistent());
    let completion = Arc::new(StubCompletion::new(
        r#"Voici: {"formulas": ["∀x(Human(x) → Mortal(x))", "Human(socrate)"], "reasoning": "syllogisme"}"#,
    ));
    let pipeline = AnalysisPipeline::new(
        Capabilities::with_gateway(gateway.clone()).with_completion(completion.clone()),
        PipelineConfig::default(),
    );

    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert_eq!(
        result.formulas,
        vec!["forall x(Human(x) => Mortal(x))", "Human(socrate)"]
    );
    assert!(result.declarations.is_empty());
    assert_eq!(result.inferences, vec!["Q0(a)", "Mortal(socrate)"]);
    assert!((result.confidence_score - 0.99).abs() < 1e-9);
    assert_eq!(gateway.last_seen(), result.formulas);
    assert_eq!(completion.calls(), 2);
}

#[tokio::test]
async fn engine_failure_is_not_overridden_by_second_opinion() {
    let completion = Arc::new(StubCompletion::new(r#"{"formulas": ["Human(socrate)"]}"#));
    let pipeline = AnalysisPipeline::new(
        Capabilities::with_gateway(Arc::new(StubGateway::failing("parse error at line 2")))
            .with_completion(completion.clone()),
        PipelineConfig::default(),
    );

    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert!(!result.consistency_check);
    assert!((result.confidence_score - 0.1).abs() < 1e-9);
    assert!(result.inferences.is_empty());
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn missing_engine_is_not_overridden_by_second_opinion() {
    let completion = Arc::new(StubCompletion::new(r#"{"formulas": ["Human(socrate)"]}"#));
    let pipeline = AnalysisPipeline::new(
        Capabilities::offline().with_completion(completion.clone()),
        PipelineConfig::default(),
    );

    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert!(result.consistency_check);
    assert_eq!(result.confidence_score, 0.5);
    assert!(result.inferences.is_empty());
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn failed_second_opinion_leaves_result_untouched() {
    let conversion = r#"{"formulas": ["∀x(Human(x) → Mortal(x))", "Human(socrate)"]}"#;
    let without_pass = AnalysisPipeline::new(
        Capabilities::with_gateway(Arc::new(StubGateway::consistent()))
            .with_completion(Arc::new(StubCompletion::new(conversion))),
        PipelineConfig {
            enrichment: EnrichmentConfig { llm_pass: false },
            ..Default::default()
        },
    )
    .analyze(SYLLOGISM, None)
    .await;

    let completion = Arc::new(StubCompletion::failing_at(prompt::ENRICHMENT_SYSTEM, conversion));
    let pipeline = AnalysisPipeline::new(
        Capabilities::with_gateway(Arc::new(StubGateway::consistent()))
            .with_completion(completion.clone()),
        PipelineConfig::default(),
    );
    let mut result = pipeline.analyze(SYLLOGISM, None).await;
    assert_eq!(completion.calls(), 2);

    let skipped = result.reasoning_steps.pop().unwrap();
    assert!(skipped.starts_with("Enrichissement LLM ignoré"));
    assert!(skipped.contains("connection reset by peer"));
    assert_eq!(result, without_pass);
    assert!((result.confidence_score - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn second_pass_can_be_disabled() {
    let completion = Arc::new(StubCompletion::new(r#"{"formulas": ["Human(socrate)"]}"#));
    let pipeline = AnalysisPipeline::new(
        Capabilities::with_gateway(Arc::new(StubGateway::consistent()))
            .with_completion(completion.clone()),
        PipelineConfig {
            enrichment: EnrichmentConfig { llm_pass: false },
            ..Default::default()
        },
    );
    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert!((result.confidence_score - 0.95).abs() < 1e-9);
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn malformed_llm_reply_falls_back_to_rules() {
    let gateway = Arc::new(StubGateway::consistent());
    let pipeline = AnalysisPipeline::new(
        Capabilities::with_gateway(gateway.clone())
            .with_completion(Arc::new(StubCompletion::new("je ne sais pas"))),
        PipelineConfig {
            enrichment: EnrichmentConfig { llm_pass: false },
            ..Default::default()
        },
    );

    let result = pipeline.analyze("Tous les hommes sont mortels.", None).await;
    assert_eq!(result.formulas, vec!["forall X: (P0(X) => Q0(X))"]);
    assert_eq!(result.declarations[0], "thing = {a}");
    assert!(result.reasoning_steps.iter().any(|s| s.contains("repli sur les règles")));
    assert!(result.validation_errors.is_empty());
    assert_eq!(gateway.last_seen()[0], "thing = {a}");
}

#[tokio::test]
async fn failing_completion_falls_back_to_rules() {
    let completion = Arc::new(StubCompletion::failing_at(prompt::CONVERSION_SYSTEM, "{}"));
    let pipeline = AnalysisPipeline::new(
        Capabilities::with_gateway(Arc::new(StubGateway::consistent()))
            .with_completion(completion.clone()),
        PipelineConfig {
            enrichment: EnrichmentConfig { llm_pass: false },
            ..Default::default()
        },
    );

    let conversion = pipeline.converter().convert(SYLLOGISM).await;
    assert!(conversion.is_degraded());
    assert!(matches!(
        &conversion.source,
        ConversionSource::Degraded { reason } if reason.contains("connection reset by peer")
    ));

    let result = pipeline.analyze(SYLLOGISM, None).await;
    assert_eq!(
        result.formulas,
        vec!["forall X: (P0(X) => Q0(X))", "P1(a)"]
    );
    assert_eq!(result.declarations[0], "thing = {a}");
    assert!(result.reasoning_steps[0].contains("repli sur les règles"));
    assert!(result.validation_errors.is_empty());
    assert!(result.consistency_check);
    assert_eq!(completion.calls(), 2);
}

#[tokio::test]
async fn queries_come_from_llm_or_fallback() {
    let bs = BeliefSet::from_content("thing = {socrate}\ntype(Human(thing))\n\nHuman(socrate)");

    let with_llm = AnalysisPipeline::new(
        Capabilities::with_gateway(Arc::new(StubGateway::consistent()))
            .with_completion(Arc::new(StubCompletion::new("{}"))),
        PipelineConfig::default(),
    );
    assert_eq!(
        with_llm.generate_queries(SYLLOGISM, &bs, None).await,
        vec!["Mortal(socrate)", "exists x(Human(x))"]
    );

    let without_llm = pipeline_with(Arc::new(StubGateway::consistent()));
    assert_eq!(
        without_llm.generate_queries(SYLLOGISM, &bs, None).await,
        vec![CONSISTENCY_QUERY, DERIVE_QUERY, "Human(socrate)"]
    );
}

// ---------------------------------------------------------------------------
// validate_argument
// ---------------------------------------------------------------------------

#[tokio::test]
async fn argument_is_valid_iff_refutation_is_inconsistent() {
    let premises = ["∀x(Human(x) => Mortal(x))", "Human(socrate)"];

    let refuting = Arc::new(StubGateway::inconsistent());
    assert!(
        pipeline_with(refuting.clone())
            .validate_argument(&premises, "Mortal(socrate)")
            .await
    );
    assert_eq!(
        refuting.last_seen(),
        vec![
            "forall x(Human(x) => Mortal(x))",
            "Human(socrate)",
            "!(Mortal(socrate))"
        ]
    );

    let satisfiable = Arc::new(StubGateway::consistent());
    assert!(
        !pipeline_with(satisfiable)
            .validate_argument(&premises, "Mortal(socrate)")
            .await
    );

    let broken = Arc::new(StubGateway::failing("timeout"));
    assert!(
        !pipeline_with(broken)
            .validate_argument(&premises, "Mortal(socrate)")
            .await
    );
}

// ---------------------------------------------------------------------------
// Programmatic belief sets and queries
// ---------------------------------------------------------------------------

fn socrates() -> FormulaBuilder {
    let mut b = FormulaBuilder::new();
    b.add_sort("human");
    b.add_sort("mortal");
    b.add_predicate_schema("human", &["human"]);
    b.add_predicate_schema("mortal", &["mortal"]);
    b.add_universal_implication("human", "mortal", "thing");
    b.add_constant_to_sort("socrate", "human");
    b
}

#[tokio::test]
async fn programmatic_build_carries_handle_into_queries() {
    let gateway = Arc::new(StubGateway::consistent());
    let pipeline = pipeline_with(gateway.clone());

    let mut builder = socrates();
    let resolutions = builder.add_typed_fact("mortal", &["socrate"]);
    assert_eq!(
        resolutions,
        vec![SortResolution::ViaSubtype {
            sort: "mortal".into(),
            via: "human".into()
        }]
    );

    let bs = pipeline.build_belief_set(&builder).await.unwrap();
    assert_eq!(bs.handle, Some(BeliefSetHandle("bs-1".into())));
    assert!(bs.content.starts_with("human = {}\nmortal = {socrate}"));
    assert_eq!(bs.signature.as_ref().unwrap().constants, vec!["socrate"]);

    let yes = pipeline.execute_query(&bs, "mortal(socrate)").await;
    assert_eq!(yes.holds, Some(true));
    let no = pipeline.execute_query(&bs, "human(platon)").await;
    assert_eq!(no.holds, Some(false));
    assert_eq!(
        gateway.queries.lock().unwrap().as_slice(),
        ["handle:bs-1 mortal(socrate)", "handle:bs-1 human(platon)"]
    );

    let text_only = BeliefSet::from_content(bs.content.clone());
    pipeline.execute_query(&text_only, "mortal(socrate)").await;
    assert_eq!(
        gateway.queries.lock().unwrap().last().map(String::as_str),
        Some("content mortal(socrate)")
    );
}

#[tokio::test]
async fn programmatic_build_fails_hard() {
    let gateway = Arc::new(StubGateway {
        fail_build: true,
        ..StubGateway::consistent()
    });
    let err = pipeline_with(gateway)
        .build_belief_set(&socrates())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::EngineFailure { .. }));
    assert!(err.to_string().contains("unknown sort"));
}

#[tokio::test]
async fn reserved_queries_delegate_to_engine_checks() {
    let pipeline = pipeline_with(Arc::new(StubGateway::consistent()));
    let bs = BeliefSet::from_content("thing = {a}\n\nP0(a)");

    let consistency = pipeline.execute_query(&bs, CONSISTENCY_QUERY).await;
    assert_eq!(consistency.holds, Some(true));

    let derived = pipeline.execute_query(&bs, DERIVE_QUERY).await;
    assert_eq!(derived.holds, Some(true));
    assert_eq!(derived.message, "Q0(a)");

    let failing = pipeline_with(Arc::new(StubGateway::failing("boom")));
    let outcome = failing.execute_query(&bs, "P0(a)").await;
    assert_eq!(outcome.holds, None);
    assert!(outcome.message.contains("boom"));
}
