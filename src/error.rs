//! Diagnostic error types for rhetor.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! giving every failure an error code and help text. The NL-driven `analyze`
//! path never returns these to its caller; they surface from the programmatic
//! belief-set path, configuration loading, and the CLI.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::CompletionError;

/// Top-level error type for rhetor.
#[derive(Debug, Error, Diagnostic)]
pub enum RhetorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Gateway errors
// ---------------------------------------------------------------------------

/// Failures reported by (or about) the external reasoning engine.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum GatewayError {
    #[error("{message}")]
    #[diagnostic(
        code(rhetor::gateway::engine_failure),
        help(
            "The reasoning engine rejected the request. This usually means a formula \
             does not parse under the engine's grammar: check that sorts and predicate \
             types are declared before the formulas that use them."
        )
    )]
    EngineFailure { message: String },

    #[error("no reasoning engine is configured")]
    #[diagnostic(
        code(rhetor::gateway::unavailable),
        help(
            "The pipeline was built with the null gateway. Pass a working \
             `ReasoningGateway` in `Capabilities` to enable consistency checks."
        )
    )]
    Unavailable,

    #[error("reasoning engine returned an unexpected reply: {message}")]
    #[diagnostic(
        code(rhetor::gateway::malformed_reply),
        help("The gateway adapter could not interpret the engine's answer.")
    )]
    MalformedReply { message: String },
}

impl GatewayError {
    /// Shorthand for an engine-side failure with the given message.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineFailure {
            message: message.into(),
        }
    }

    /// An engine answer the adapter could not interpret.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReply {
            message: message.into(),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result type for setup that may fail in any subsystem.
pub type RhetorResult<T> = std::result::Result<T, RhetorError>;
