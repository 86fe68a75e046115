//! The engine's ASCII formula syntax.
//!
//! Formulas are exchanged with the reasoning engine as plain strings:
//! `forall X: (P(X) => Q(X))`, `exists X: (P(X) && Q(X))`, `!P(a)`.
//! Sort declarations read `sort = {a, b}` and predicate signatures read
//! `type(P(sort))`. When declarations and formulas travel together, a single
//! blank line separates them.

use serde::{Deserialize, Serialize};

/// Universal quantifier keyword.
pub const FORALL: &str = "forall";
/// Existential quantifier keyword.
pub const EXISTS: &str = "exists";
/// Conjunction.
pub const AND: &str = "&&";
/// Disjunction.
pub const OR: &str = "||";
/// Implication.
pub const IMPLIES: &str = "=>";
/// Negation prefix.
pub const NOT: &str = "!";
/// Equivalence.
pub const IFF: &str = "<=>";
/// Tautology constant.
pub const TOP: &str = "+";
/// Contradiction constant.
pub const BOTTOM: &str = "-";

/// ASCII token for a Unicode logical symbol, if it is one.
fn ascii_token(c: char) -> Option<&'static str> {
    match c {
        '∀' => Some("forall "),
        '∃' => Some("exists "),
        '∧' => Some(AND),
        '∨' => Some(OR),
        '→' => Some(IMPLIES),
        '¬' => Some(NOT),
        '↔' => Some(IFF),
        '⊤' => Some(TOP),
        '⊥' => Some(BOTTOM),
        _ => None,
    }
}

/// Rewrite Unicode logical symbols into the engine's ASCII syntax.
///
/// Each symbol maps to exactly one token, so the rewrite is total and does not
/// depend on replacement order. ASCII input passes through unchanged.
pub fn unicode_to_ascii(formula: &str) -> String {
    let mut out = String::with_capacity(formula.len() + 8);
    for c in formula.chars() {
        match ascii_token(c) {
            Some(token) => out.push_str(token),
            None => out.push(c),
        }
    }
    out
}

/// Render an atom `pred(a, b)`. Zero-argument predicates render bare.
pub fn render_atom<S: AsRef<str>>(predicate: &str, args: &[S]) -> String {
    if args.is_empty() {
        return predicate.to_string();
    }
    let joined: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    format!("{predicate}({})", joined.join(", "))
}

/// Prefix a formula with negation.
pub fn negate(formula: &str) -> String {
    format!("{NOT}{formula}")
}

/// Negate an arbitrary formula, parenthesised so the negation covers all of it.
pub fn negate_grouped(formula: &str) -> String {
    format!("{NOT}({formula})")
}

/// `sort = {c1, c2}`
pub fn render_sort_declaration<S: AsRef<str>>(sort: &str, constants: &[S]) -> String {
    let joined: Vec<&str> = constants.iter().map(AsRef::as_ref).collect();
    format!("{sort} = {{{}}}", joined.join(", "))
}

/// `type(P(s1, s2))`
pub fn render_type_declaration<S: AsRef<str>>(predicate: &str, arg_sorts: &[S]) -> String {
    format!("type({})", render_atom(predicate, arg_sorts))
}

/// `forall X: (P(X) => Q(X))`
pub fn render_universal_implication(antecedent: &str, consequent: &str) -> String {
    format!("{FORALL} X: ({antecedent}(X) {IMPLIES} {consequent}(X))")
}

/// `exists X: (P(X) && Q(X))`
pub fn render_existential_conjunction(left: &str, right: &str) -> String {
    format!("{EXISTS} X: ({left}(X) {AND} {right}(X))")
}

/// Whether a belief-set line is a sort or type declaration rather than a formula.
pub fn is_declaration(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("type(") || (line.contains(" = {") && line.ends_with('}'))
}

/// Whether a formula binds variables.
pub fn is_quantified(formula: &str) -> bool {
    formula
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| word == FORALL || word == EXISTS)
}

/// A converted text: declaration lines plus formula lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolDocument {
    /// Sort and predicate-type declarations, in emission order.
    pub declarations: Vec<String>,
    /// Formula lines, in emission order.
    pub formulas: Vec<String>,
}

impl FolDocument {
    /// A document holding formulas only.
    pub fn from_formulas(formulas: Vec<String>) -> Self {
        Self {
            declarations: Vec::new(),
            formulas,
        }
    }

    /// Declarations, one blank separator line, then formulas.
    ///
    /// The separator is only present when there are declarations.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.declarations.len() + self.formulas.len() + 1);
        if !self.declarations.is_empty() {
            lines.extend(self.declarations.iter().cloned());
            lines.push(String::new());
        }
        lines.extend(self.formulas.iter().cloned());
        lines
    }

    /// The document as the text the engine's parser reads.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}
