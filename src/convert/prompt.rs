//! Prompts sent to the completion service.
//!
//! Replies are always requested as a single JSON object so they can be parsed
//! with [`crate::llm::extract_json_object`].

/// System message for text → formula translation.
pub const CONVERSION_SYSTEM: &str = "You translate argumentative text into first-order logic. \
    Reply with one JSON object only, no prose.";

/// System message for the enrichment pass.
pub const ENRICHMENT_SYSTEM: &str = "You are a first-order logic reviewer. \
    Reply with one JSON object only, no prose.";

/// System message for query generation.
pub const QUERY_SYSTEM: &str = "You propose entailment queries for a first-order belief set. \
    Reply with one JSON object only, no prose.";

const SYNTAX_HINTS: &str = "\
Syntax:
- quantifiers: `forall X: (...)`, `exists X: (...)`
- connectives: `&&` (and), `||` (or), `=>` (implies), `<=>` (iff), `!` (not)
- predicates start with a letter: `Human(X)`, `Loves(X, Y)`; constants are lowercase: `socrate`
- variables are uppercase: `X`, `Y`

Examples:
- \"Tous les hommes sont mortels.\" -> `forall X: (Human(X) => Mortal(X))`
- \"Socrate est un homme.\" -> `Human(socrate)`
- \"Certains oiseaux ne volent pas.\" -> `exists X: (Bird(X) && !Flies(X))`";

/// Prompt for translating `text` into formulas.
pub fn conversion_prompt(text: &str) -> String {
    format!(
        "Translate the following text into first-order logic formulas.\n\n\
         {SYNTAX_HINTS}\n\n\
         Reply as JSON:\n\
         {{\"formulas\": [\"...\"], \"predicates\": {{\"Name\": \"meaning\"}}, \
         \"variables\": {{\"X\": \"domain\"}}, \"reasoning\": \"short explanation\"}}\n\n\
         Text:\n{text}"
    )
}

/// Prompt asking for an independent assessment of an analysis.
pub fn enrichment_prompt(text: &str, formulas: &[String]) -> String {
    format!(
        "Assess these first-order formulas, extracted from the text below.\n\n\
         Formulas:\n{}\n\n\
         Reply as JSON:\n\
         {{\"consistency\": true, \"inferences\": [\"...\"], \
         \"interpretations\": [{{\"description\": \"...\"}}], \
         \"validation_errors\": [\"...\"], \"reasoning_steps\": [\"...\"], \
         \"confidence\": 0.0}}\n\n\
         Text:\n{text}",
        bullet_list(formulas)
    )
}

/// Prompt asking for queries worth testing against a belief set.
pub fn query_prompt(text: &str, belief_set: &str, context: Option<&serde_json::Value>) -> String {
    let context = context
        .map(|c| format!("\nContext:\n{c}\n"))
        .unwrap_or_default();
    format!(
        "Propose formulas whose entailment by the belief set below is worth checking, \
         using only its declared predicates and constants.\n\n\
         {SYNTAX_HINTS}\n\n\
         Reply as JSON: {{\"queries\": [\"...\"]}}\n\n\
         Belief set:\n{belief_set}\n\
         {context}\n\
         Source text:\n{text}"
    )
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}
