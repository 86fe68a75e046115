//! Turning a [`FormulaBuilder`] into an engine-side belief set.
//!
//! The materializer performs no validation of its own. It settles each
//! constant on a single sort, hands sorts, signatures, and formulas to the
//! gateway, and propagates whatever the engine's construction call returns.

use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::fol::builder::{FormulaBuilder, PredicateSchema};
use crate::fol::syntax;
use crate::gateway::{BeliefSetHandle, EngineSignature, ReasoningGateway};

/// A sort with the constants emitted under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDeclaration {
    pub name: String,
    pub constants: Vec<String>,
}

/// Everything the engine needs to build a belief set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefSetDeclarations {
    pub sorts: Vec<SortDeclaration>,
    pub predicates: Vec<PredicateSchema>,
    pub formulas: Vec<String>,
}

impl BeliefSetDeclarations {
    /// Snapshot a builder, placing every constant in exactly one sort.
    ///
    /// A constant filed under several sorts is emitted under the sort it was
    /// most recently newly filed under. Sorts keep declaration order and
    /// constants keep registration order.
    ///
    /// Every sort is emitted, including one left with no constants (`human = {}`
    /// once its only constant moved to a subsort). Predicate types may still
    /// name such a sort, and the engine rejects a `type(...)` line that refers
    /// to an undeclared sort.
    pub fn from_builder(builder: &FormulaBuilder) -> Self {
        let sorts = builder
            .sorts()
            .iter()
            .map(|sort| SortDeclaration {
                name: sort.name().to_string(),
                constants: sort
                    .constants()
                    .iter()
                    .filter(|c| builder.latest_sort_of(c) == Some(sort.name()))
                    .cloned()
                    .collect(),
            })
            .collect();

        Self {
            sorts,
            predicates: builder.predicates().to_vec(),
            formulas: builder.formulas().iter().map(|f| f.text.clone()).collect(),
        }
    }

    /// Declaration lines: sorts first, then predicate types.
    pub fn declaration_lines(&self) -> Vec<String> {
        self.sorts
            .iter()
            .map(|s| syntax::render_sort_declaration(&s.name, &s.constants))
            .chain(
                self.predicates
                    .iter()
                    .map(|p| syntax::render_type_declaration(&p.name, &p.arg_sorts)),
            )
            .collect()
    }

    /// The belief set in the engine's textual format.
    pub fn render(&self) -> String {
        syntax::FolDocument {
            declarations: self.declaration_lines(),
            formulas: self.formulas.clone(),
        }
        .render()
    }

    /// The sort a constant is emitted under.
    pub fn sort_of(&self, constant: &str) -> Option<&str> {
        self.sorts
            .iter()
            .find(|s| s.constants.iter().any(|c| c == constant))
            .map(|s| s.name.as_str())
    }
}

/// A belief set built by the engine, with what it was built from.
#[derive(Debug, Clone)]
pub struct MaterializedBeliefSet {
    pub handle: BeliefSetHandle,
    pub signature: EngineSignature,
    pub declarations: BeliefSetDeclarations,
}

/// Builds engine belief sets from builder state.
pub struct BeliefSetMaterializer<'g> {
    gateway: &'g dyn ReasoningGateway,
}

impl<'g> BeliefSetMaterializer<'g> {
    pub fn new(gateway: &'g dyn ReasoningGateway) -> Self {
        Self { gateway }
    }

    /// Ask the engine to construct the builder's belief set.
    ///
    /// Engine errors are returned unchanged.
    pub async fn build(&self, builder: &FormulaBuilder) -> GatewayResult<MaterializedBeliefSet> {
        let declarations = BeliefSetDeclarations::from_builder(builder);
        tracing::debug!(
            sorts = declarations.sorts.len(),
            predicates = declarations.predicates.len(),
            formulas = declarations.formulas.len(),
            "materializing belief set"
        );
        let (handle, signature) = self.gateway.build_belief_set(&declarations).await?;
        Ok(MaterializedBeliefSet {
            handle,
            signature,
            declarations,
        })
    }
}
