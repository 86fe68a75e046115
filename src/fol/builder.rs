//! Incremental construction of a sorted first-order belief set.
//!
//! A [`FormulaBuilder`] owns one belief set under construction: its sorts
//! (with member constants), predicate signatures, and formulas. Mutation is
//! permissive: duplicate registrations are no-ops and predicate signatures
//! are overwritten on re-registration. Mutators report what changed so the
//! permissiveness stays observable.
//!
//! Formulas are kept as engine-syntax strings together with the shape they
//! were built from, so that sort-hierarchy inference can read the structure
//! of universal implications without parsing text.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::fol::syntax;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A named domain with its known member constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    name: String,
    /// Registration order, for stable emission.
    order: Vec<String>,
    members: HashSet<String>,
}

impl Sort {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Vec::new(),
            members: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member constants in registration order.
    pub fn constants(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, constant: &str) -> bool {
        self.members.contains(constant)
    }

    fn insert(&mut self, constant: &str) -> bool {
        if self.members.insert(constant.to_string()) {
            self.order.push(constant.to_string());
            true
        } else {
            false
        }
    }
}

/// A predicate name and its argument-sort signature. Arity is `arg_sorts.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSchema {
    pub name: String,
    pub arg_sorts: Vec<String>,
}

impl PredicateSchema {
    pub fn arity(&self) -> usize {
        self.arg_sorts.len()
    }

    pub fn is_unary(&self) -> bool {
        self.arg_sorts.len() == 1
    }
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// The structure a formula was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaShape {
    /// `pred(args)`
    Atomic { predicate: String, args: Vec<String> },
    /// `!pred(args)`
    NegatedAtomic { predicate: String, args: Vec<String> },
    /// `forall X: (antecedent(X) => consequent(X))`, read as "antecedent is-a consequent".
    UniversalImplication {
        antecedent: String,
        consequent: String,
        sort: String,
    },
    /// `exists X: (left(X) && right(X))`
    ExistentialConjunction {
        left: String,
        right: String,
        sort: String,
    },
    /// Opaque text supplied by the caller.
    Raw,
}

/// A formula in engine syntax plus its provenance shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub text: String,
    pub shape: FormulaShape,
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates the declarations of one belief set under construction.
#[derive(Debug, Clone, Default)]
pub struct FormulaBuilder {
    sorts: Vec<Sort>,
    sort_index: HashMap<String, usize>,
    predicates: Vec<PredicateSchema>,
    predicate_index: HashMap<String, usize>,
    formulas: Vec<Formula>,
    /// For each constant, the sort it was most recently newly filed under.
    latest_sort: HashMap<String, String>,
}

impl FormulaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every sort, predicate, and formula.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Register a sort. Returns `false` if it already existed.
    pub fn add_sort(&mut self, name: &str) -> bool {
        if self.sort_index.contains_key(name) {
            return false;
        }
        self.sort_index.insert(name.to_string(), self.sorts.len());
        self.sorts.push(Sort::new(name));
        true
    }

    /// File `constant` under `sort`, creating the sort if needed.
    ///
    /// Returns `false` if the constant was already a member of that sort.
    pub fn add_constant_to_sort(&mut self, constant: &str, sort: &str) -> bool {
        self.add_sort(sort);
        let idx = self.sort_index[sort];
        let inserted = self.sorts[idx].insert(constant);
        if inserted {
            self.latest_sort
                .insert(constant.to_string(), sort.to_string());
        }
        inserted
    }

    /// Register (or overwrite) a predicate signature.
    ///
    /// Returns the previous schema when one was overwritten.
    pub fn add_predicate_schema<S: AsRef<str>>(
        &mut self,
        name: &str,
        arg_sorts: &[S],
    ) -> Option<PredicateSchema> {
        let schema = PredicateSchema {
            name: name.to_string(),
            arg_sorts: arg_sorts.iter().map(|s| s.as_ref().to_string()).collect(),
        };
        match self.predicate_index.get(name) {
            Some(&idx) => {
                let previous = std::mem::replace(&mut self.predicates[idx], schema);
                if previous.arg_sorts != self.predicates[idx].arg_sorts {
                    tracing::debug!(
                        predicate = name,
                        "predicate signature overwritten"
                    );
                }
                Some(previous)
            }
            None => {
                self.predicate_index
                    .insert(name.to_string(), self.predicates.len());
                self.predicates.push(schema);
                None
            }
        }
    }

    /// Append `pred(args)`. Arity is not checked against the schema.
    pub fn add_atomic_fact<S: AsRef<str>>(&mut self, predicate: &str, args: &[S]) {
        let text = syntax::render_atom(predicate, args);
        self.formulas.push(Formula {
            text,
            shape: FormulaShape::Atomic {
                predicate: predicate.to_string(),
                args: owned(args),
            },
        });
    }

    /// Append `!pred(args)`.
    pub fn add_negated_atomic_fact<S: AsRef<str>>(&mut self, predicate: &str, args: &[S]) {
        let text = syntax::negate(&syntax::render_atom(predicate, args));
        self.formulas.push(Formula {
            text,
            shape: FormulaShape::NegatedAtomic {
                predicate: predicate.to_string(),
                args: owned(args),
            },
        });
    }

    /// Append `forall X: (antecedent(X) => consequent(X))`.
    ///
    /// This is how is-a edges between sorts are expressed. `sort` is recorded
    /// but not checked against the predicates' own signatures.
    pub fn add_universal_implication(&mut self, antecedent: &str, consequent: &str, sort: &str) {
        self.formulas.push(Formula {
            text: syntax::render_universal_implication(antecedent, consequent),
            shape: FormulaShape::UniversalImplication {
                antecedent: antecedent.to_string(),
                consequent: consequent.to_string(),
                sort: sort.to_string(),
            },
        });
    }

    /// Append `exists X: (left(X) && right(X))`.
    pub fn add_existential_conjunction(&mut self, left: &str, right: &str, sort: &str) {
        self.formulas.push(Formula {
            text: syntax::render_existential_conjunction(left, right),
            shape: FormulaShape::ExistentialConjunction {
                left: left.to_string(),
                right: right.to_string(),
                sort: sort.to_string(),
            },
        });
    }

    /// Append a formula the builder does not interpret.
    pub fn add_raw_formula(&mut self, text: impl Into<String>) {
        self.formulas.push(Formula {
            text: text.into(),
            shape: FormulaShape::Raw,
        });
    }

    // -- read access --------------------------------------------------------

    /// Sorts in declaration order.
    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn sort(&self, name: &str) -> Option<&Sort> {
        self.sort_index.get(name).map(|&idx| &self.sorts[idx])
    }

    /// Predicate schemas in declaration order.
    pub fn predicates(&self) -> &[PredicateSchema] {
        &self.predicates
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateSchema> {
        self.predicate_index.get(name).map(|&idx| &self.predicates[idx])
    }

    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    /// Whether `constant` is filed under `sort`.
    pub fn is_member(&self, constant: &str, sort: &str) -> bool {
        self.sort(sort).is_some_and(|s| s.contains(constant))
    }

    /// Every sort `constant` is filed under, in declaration order.
    pub fn sorts_of_constant(&self, constant: &str) -> Vec<&str> {
        self.sorts
            .iter()
            .filter(|s| s.contains(constant))
            .map(Sort::name)
            .collect()
    }

    /// The sort `constant` was most recently newly filed under.
    pub fn latest_sort_of(&self, constant: &str) -> Option<&str> {
        self.latest_sort.get(constant).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty() && self.predicates.is_empty() && self.formulas.is_empty()
    }
}

fn owned<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter().map(|s| s.as_ref().to_string()).collect()
}
