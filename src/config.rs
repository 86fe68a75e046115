//! Pipeline configuration, loaded from TOML.
//!
//! ```toml
//! [cache]
//! capacity = 256
//! max_age_secs = 3600
//!
//! [llm]
//! base_url = "http://localhost:11434"
//! model = "llama3.2"
//!
//! [enrichment]
//! llm_pass = true
//! ```
//!
//! Every section is optional. Without `[llm]` no completion service is built
//! and conversion is rule-based.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::llm::OllamaConfig;

/// Errors from configuration loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(rhetor::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(rhetor::config::parse),
        help("Check the TOML syntax. Known sections are [cache], [llm] and [enrichment].")
    )]
    Parse { path: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Enrichment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Ask the completion service for a second opinion on each analysis.
    pub llm_pass: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { llm_pass: true }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cache: CacheConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<OllamaConfig>,
    pub enrichment: EnrichmentConfig,
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }
}
