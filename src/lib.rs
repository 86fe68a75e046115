// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # rhetor
//!
//! Argument analysis over first-order logic. Natural-language text is turned
//! into formulas, checked by an external reasoning engine, and returned as an
//! enriched, cached analysis.
//!
//! ## Architecture
//!
//! - **Formulas** (`fol`): ASCII wire syntax, a belief-set builder, sort
//!   hierarchy resolution, and materialization into engine declarations
//! - **Conversion** (`convert`): LLM translation with a French cue-word fallback
//! - **Engine contract** (`gateway`): async `ReasoningGateway` trait and the
//!   `NullGateway` used when no engine is configured
//! - **Completion** (`llm`): async `CompletionService` trait and an Ollama client
//! - **Pipeline** (`pipeline`): `analyze`, argument validation, queries, summary
//! - **Cache** (`cache`): bounded LRU of analysis results
//!
//! ## Library usage
//!
//! ```no_run
//! use rhetor::config::PipelineConfig;
//! use rhetor::pipeline::{AnalysisPipeline, Capabilities};
//!
//! # async fn demo() {
//! let pipeline = AnalysisPipeline::new(Capabilities::offline(), PipelineConfig::default());
//! let result = pipeline.analyze("Tous les hommes sont mortels.", None).await;
//! assert!(result.consistency_check);
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod fol;
pub mod gateway;
pub mod llm;
pub mod pipeline;
