//! Deterministic rule-based conversion.
//!
//! Works without a completion service. Each sentence becomes one formula over
//! synthetic predicates `Pi`/`Qi` (where `i` is the sentence index), chosen by
//! French cue words:
//!
//! | cue                      | formula                       |
//! |--------------------------|-------------------------------|
//! | `tous`, `chaque`         | `forall X: (Pi(X) => Qi(X))`  |
//! | `il existe`, `certains`  | `exists X: (Pi(X) && Qi(X))`  |
//! | `si` ... `alors`         | `forall X: (Pi(X) => Qi(X))`  |
//! | anything else            | `Pi(a)`                       |
//!
//! The output always declares the single sort `thing = {a}` and a type line for
//! every generated predicate, ahead of the formulas.

use std::sync::LazyLock;

use regex::Regex;

use crate::fol::syntax::{self, FolDocument};

/// The sort every synthetic predicate ranges over.
pub const THING_SORT: &str = "thing";
/// The single constant of [`THING_SORT`].
pub const THING_CONSTANT: &str = "a";

static RE_UNIVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(tous|chaque)\b").expect("valid regex"));
static RE_EXISTENTIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(il\s+existe|certains)\b").expect("valid regex"));
static RE_IF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bsi\b").expect("valid regex"));
static RE_THEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\balors\b").expect("valid regex"));

/// Sentence pattern recognised by the cue rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentencePattern {
    Universal,
    Existential,
    Conditional,
    Atomic,
}

/// Classify one sentence by its cue words.
pub fn classify_sentence(sentence: &str) -> SentencePattern {
    let lower = sentence.to_lowercase();
    if RE_UNIVERSAL.is_match(&lower) {
        SentencePattern::Universal
    } else if RE_EXISTENTIAL.is_match(&lower) {
        SentencePattern::Existential
    } else if RE_IF.is_match(&lower) && RE_THEN.is_match(&lower) {
        SentencePattern::Conditional
    } else {
        SentencePattern::Atomic
    }
}

/// Non-empty sentences of `text`, split on `.`.
pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split('.').map(str::trim).filter(|s| !s.is_empty())
}

/// Convert text with the cue rules.
pub fn convert_rule_based(text: &str) -> FolDocument {
    let mut predicates = Vec::new();
    let mut formulas = Vec::new();

    for (i, sentence) in sentences(text).enumerate() {
        let p = format!("P{i}");
        let q = format!("Q{i}");
        match classify_sentence(sentence) {
            SentencePattern::Universal | SentencePattern::Conditional => {
                formulas.push(syntax::render_universal_implication(&p, &q));
                predicates.extend([p, q]);
            }
            SentencePattern::Existential => {
                formulas.push(syntax::render_existential_conjunction(&p, &q));
                predicates.extend([p, q]);
            }
            SentencePattern::Atomic => {
                formulas.push(syntax::render_atom(&p, &[THING_CONSTANT]));
                predicates.push(p);
            }
        }
    }

    if formulas.is_empty() {
        return FolDocument::default();
    }

    let mut declarations = vec![syntax::render_sort_declaration(THING_SORT, &[THING_CONSTANT])];
    declarations.extend(
        predicates
            .iter()
            .map(|p| syntax::render_type_declaration(p, &[THING_SORT])),
    );

    FolDocument {
        declarations,
        formulas,
    }
}
