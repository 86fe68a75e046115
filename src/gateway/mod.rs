//! The reasoning-engine contract.
//!
//! Consistency checking, inference derivation, model generation, and belief-set
//! construction are performed by an external first-order engine. This module
//! defines what rhetor expects from it; adapters for a concrete engine live
//! outside the crate.
//!
//! Every operation is async. Adapters around a blocking engine must move the
//! blocking work off the executor (e.g. `tokio::task::spawn_blocking`).
//! Implementations must tolerate concurrent calls, or serialize them
//! internally; the pipeline holds no lock around the gateway.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::fol::materialize::BeliefSetDeclarations;

// ---------------------------------------------------------------------------
// Engine data
// ---------------------------------------------------------------------------

/// Opaque reference to a belief set living inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeliefSetHandle(pub String);

impl fmt::Display for BeliefSetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signature the engine inferred for a belief set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSignature {
    pub sorts: Vec<String>,
    pub constants: Vec<String>,
    pub predicates: Vec<String>,
}

/// Outcome of a consistency check, with optional engine diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyVerdict {
    pub consistent: bool,
    pub diagnostic: Option<String>,
}

impl ConsistencyVerdict {
    pub fn consistent() -> Self {
        Self {
            consistent: true,
            diagnostic: None,
        }
    }

    pub fn inconsistent() -> Self {
        Self {
            consistent: false,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}

/// A satisfying interpretation produced by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub description: String,
    #[serde(default)]
    pub model: BTreeMap<String, serde_json::Value>,
}

/// What a query is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum QueryTarget<'a> {
    /// A belief set previously built with [`ReasoningGateway::build_belief_set`].
    Handle(&'a BeliefSetHandle),
    /// Belief-set text in the engine's format.
    Content(&'a str),
}

/// The engine's answer to an entailment query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// `None` when the engine could not decide.
    pub entailed: Option<bool>,
    pub diagnostic: Option<String>,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// An external first-order reasoning engine.
#[async_trait]
pub trait ReasoningGateway: Send + Sync + fmt::Debug {
    /// Whether a real engine stands behind this gateway.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether the formulas have at least one model.
    async fn check_consistency(&self, formulas: &[String]) -> GatewayResult<ConsistencyVerdict>;

    /// Formulas that follow from the given ones.
    async fn derive_inferences(&self, formulas: &[String]) -> GatewayResult<Vec<String>>;

    /// Example models of the given formulas.
    async fn generate_models(&self, formulas: &[String]) -> GatewayResult<Vec<ModelDescription>>;

    /// Construct a belief set from sorts, signatures, and formulas.
    async fn build_belief_set(
        &self,
        declarations: &BeliefSetDeclarations,
    ) -> GatewayResult<(BeliefSetHandle, EngineSignature)>;

    /// Test whether `query` is entailed by the target belief set.
    async fn execute_query(
        &self,
        target: QueryTarget<'_>,
        query: &str,
    ) -> GatewayResult<QueryAnswer>;
}

/// Gateway used when no engine is configured.
///
/// Reports itself unavailable. Read-style operations return neutral values;
/// construction and queries fail with [`GatewayError::Unavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGateway;

#[async_trait]
impl ReasoningGateway for NullGateway {
    fn is_available(&self) -> bool {
        false
    }

    async fn check_consistency(&self, _formulas: &[String]) -> GatewayResult<ConsistencyVerdict> {
        Ok(ConsistencyVerdict::consistent().with_diagnostic("no reasoning engine configured"))
    }

    async fn derive_inferences(&self, _formulas: &[String]) -> GatewayResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn generate_models(&self, _formulas: &[String]) -> GatewayResult<Vec<ModelDescription>> {
        Ok(Vec::new())
    }

    async fn build_belief_set(
        &self,
        _declarations: &BeliefSetDeclarations,
    ) -> GatewayResult<(BeliefSetHandle, EngineSignature)> {
        Err(GatewayError::Unavailable)
    }

    async fn execute_query(
        &self,
        _target: QueryTarget<'_>,
        _query: &str,
    ) -> GatewayResult<QueryAnswer> {
        Err(GatewayError::Unavailable)
    }
}
