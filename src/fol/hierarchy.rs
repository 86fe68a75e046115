//! Sort hierarchy: is-a edges inferred from universal implications.
//!
//! A formula `forall X: (P(X) => Q(X))` between two unary predicates reads as
//! "every P is a Q". Unary predicates used this way double as sort tags, so the
//! implication contributes the edge `P → Q` between sorts of the same names.
//!
//! The hierarchy is derived on demand from the builder's formulas and is never
//! stored. Raw input may contain cycles; every traversal keeps a visited set.
//!
//! Resolution files an accepted constant under the *expected* sort of the
//! predicate argument, not under its most specific known subtype.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::fol::builder::{FormulaBuilder, FormulaShape};

/// How a constant came to be typed for a predicate argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortResolution {
    /// The constant was already filed under the expected sort.
    AlreadyMember { sort: String },
    /// The constant belongs to `via`, a subtype of `sort`, and is now also filed under `sort`.
    ViaSubtype { sort: String, via: String },
    /// No subtype path was found. The constant was filed under `sort` anyway.
    Unresolved { sort: String },
    /// The predicate is unknown or has no argument at that position; nothing was filed.
    Untyped { predicate: String, position: usize },
}

impl SortResolution {
    /// The sort the constant ended up filed under, if any.
    pub fn sort(&self) -> Option<&str> {
        match self {
            Self::AlreadyMember { sort }
            | Self::ViaSubtype { sort, .. }
            | Self::Unresolved { sort } => Some(sort),
            Self::Untyped { .. } => None,
        }
    }

    /// Whether the hierarchy (or prior membership) justified the typing.
    pub fn is_justified(&self) -> bool {
        matches!(self, Self::AlreadyMember { .. } | Self::ViaSubtype { .. })
    }
}

/// Directed is-a graph over sort names. `A → B` means every A is a B.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortHierarchy {
    /// Direct supertypes of each sort, in formula order.
    supertypes: HashMap<String, Vec<String>>,
}

impl SortHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the builder's universal implications between registered unary predicates.
    pub fn infer(builder: &FormulaBuilder) -> Self {
        let mut hierarchy = Self::new();
        for formula in builder.formulas() {
            let FormulaShape::UniversalImplication {
                antecedent,
                consequent,
                ..
            } = &formula.shape
            else {
                continue;
            };
            let unary = |name: &str| builder.predicate(name).is_some_and(|p| p.is_unary());
            if unary(antecedent) && unary(consequent) {
                hierarchy.add_edge(antecedent, consequent);
            }
        }
        tracing::debug!(edges = hierarchy.edge_count(), "sort hierarchy inferred");
        hierarchy
    }

    /// Record `sub → sup`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, sub: &str, sup: &str) {
        let parents = self.supertypes.entry(sub.to_string()).or_default();
        if !parents.iter().any(|p| p == sup) {
            parents.push(sup.to_string());
        }
    }

    /// Direct supertypes of `sort`.
    pub fn direct_supertypes(&self, sort: &str) -> &[String] {
        self.supertypes
            .get(sort)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All sorts reachable upward from `sort`, breadth-first, excluding `sort`
    /// itself unless a cycle leads back to it.
    pub fn supertypes_of(&self, sort: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        for parent in self.direct_supertypes(sort) {
            if visited.insert(parent.as_str()) {
                queue.push_back(parent.as_str());
            }
        }
        while let Some(current) = queue.pop_front() {
            found.push(current.to_string());
            for parent in self.direct_supertypes(current) {
                if visited.insert(parent.as_str()) {
                    queue.push_back(parent.as_str());
                }
            }
        }
        found
    }

    /// Whether a directed path `sub → ... → sup` of length ≥ 1 exists.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(sub);

        while let Some(current) = queue.pop_front() {
            for parent in self.direct_supertypes(current) {
                if parent == sup {
                    return true;
                }
                if visited.insert(parent.as_str()) {
                    queue.push_back(parent.as_str());
                }
            }
        }
        false
    }

    pub fn edge_count(&self) -> usize {
        self.supertypes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }

    /// Type `constant` for argument `position` of `predicate`.
    ///
    /// Looks up the expected sort S from the predicate's schema. If the
    /// constant is already in S nothing changes. Otherwise the first declared
    /// sort T holding the constant with a path `T → ... → S` justifies filing
    /// it under S. Without such a path it is filed under S regardless; the
    /// engine's parser stays the final judge. Never fails.
    pub fn resolve_argument_sort(
        &self,
        builder: &mut FormulaBuilder,
        predicate: &str,
        position: usize,
        constant: &str,
    ) -> SortResolution {
        let Some(expected) = builder
            .predicate(predicate)
            .and_then(|p| p.arg_sorts.get(position))
            .cloned()
        else {
            return SortResolution::Untyped {
                predicate: predicate.to_string(),
                position,
            };
        };

        if builder.is_member(constant, &expected) {
            return SortResolution::AlreadyMember { sort: expected };
        }

        let via = builder
            .sorts()
            .iter()
            .filter(|s| s.name() != expected && s.contains(constant))
            .find(|s| self.is_subtype_of(s.name(), &expected))
            .map(|s| s.name().to_string());

        builder.add_constant_to_sort(constant, &expected);

        match via {
            Some(via) => {
                tracing::debug!(constant, sort = %expected, via = %via, "constant typed via subtype");
                SortResolution::ViaSubtype {
                    sort: expected,
                    via,
                }
            }
            None => {
                tracing::debug!(constant, sort = %expected, "constant accepted without subtype path");
                SortResolution::Unresolved { sort: expected }
            }
        }
    }
}

impl FormulaBuilder {
    /// Infer the sort hierarchy from the formulas accumulated so far.
    pub fn infer_sort_hierarchy(&self) -> SortHierarchy {
        SortHierarchy::infer(self)
    }

    /// Type `constant` as the first argument of `predicate`.
    pub fn resolve_expected_sort_for_fact(
        &mut self,
        predicate: &str,
        constant: &str,
    ) -> SortResolution {
        let hierarchy = self.infer_sort_hierarchy();
        hierarchy.resolve_argument_sort(self, predicate, 0, constant)
    }

    /// Type every argument of `predicate(args)` through the hierarchy, then
    /// append the fact.
    pub fn add_typed_fact<S: AsRef<str>>(
        &mut self,
        predicate: &str,
        args: &[S],
    ) -> Vec<SortResolution> {
        let hierarchy = self.infer_sort_hierarchy();
        let resolutions: Vec<SortResolution> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| hierarchy.resolve_argument_sort(self, predicate, i, arg.as_ref()))
            .collect();
        self.add_atomic_fact(predicate, args);
        resolutions
    }
}
