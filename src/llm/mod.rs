//! Text-completion services for natural-language to logic translation.
//!
//! The LLM is used **only** for:
//! - Translating text into candidate formulas
//! - Proposing entailment queries for a belief set
//! - An optional second opinion when enriching an analysis
//!
//! Consistency and entailment are always decided by the reasoning engine,
//! never by the LLM. Every LLM-backed path has a rule-based fallback.

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the completion subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum CompletionError {
    #[error("completion service is not available at {url}")]
    #[diagnostic(
        code(rhetor::llm::unavailable),
        help("Start Ollama with `ollama serve`, or run without --ollama to use rule-based conversion.")
    )]
    Unavailable { url: String },

    #[error("completion request failed: {message}")]
    #[diagnostic(
        code(rhetor::llm::request_failed),
        help("Check that the service is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse completion response: {message}")]
    #[diagnostic(
        code(rhetor::llm::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("completion request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(rhetor::llm::timeout),
        help("Increase `timeout_secs` in the [llm] config section or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// A service that completes a prompt with text.
#[async_trait]
pub trait CompletionService: Send + Sync + std::fmt::Debug {
    /// Short name for logs and reasoning traces.
    fn name(&self) -> &str;

    /// Complete `prompt`, optionally steered by a system message.
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionError>;
}

/// Locate the outermost JSON object in a model reply and parse it.
///
/// Models often wrap JSON in prose or code fences; everything outside the
/// first `{` and the last `}` is ignored.
pub fn extract_json_object(response: &str) -> Result<serde_json::Value, CompletionError> {
    let trimmed = response.trim();
    let json_str = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(s), Some(e)) if e > s => &trimmed[s..=e],
        _ => {
            return Err(CompletionError::ParseError {
                message: "no JSON object found in response".into(),
            });
        }
    };
    let value: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| CompletionError::ParseError {
            message: format!("JSON parse error: {e}"),
        })?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CompletionError::ParseError {
            message: "response JSON is not an object".into(),
        })
    }
}

/// Read `key` as an array of strings. Non-string items are skipped.
pub fn string_array(value: &serde_json::Value, key: &str) -> Option<Vec<String>> {
    value[key].as_array().map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

/// Configuration for the Ollama client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

/// Client for the Ollama REST API.
///
/// Requests are blocking (`ureq`); the [`CompletionService`] impl runs them on
/// tokio's blocking pool.
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    available: bool,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            available: false,
        }
    }

    /// Probe the server's `/api/tags` endpoint.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        self.available = matches!(agent.get(&url).call(), Ok(resp) if resp.status() == 200);
        tracing::debug!(url = %url, available = self.available, "probed ollama");
        self.available
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Blocking completion against `/api/generate`.
    pub fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionError> {
        if !self.available {
            return Err(CompletionError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let resp = agent.post(&url).send_json(body).map_err(|e| match e {
            ureq::Error::Transport(t) if t.to_string().contains("timed out") => {
                CompletionError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                }
            }
            other => CompletionError::RequestFailed {
                message: other.to_string(),
            },
        })?;

        let json: serde_json::Value =
            resp.into_json().map_err(|e| CompletionError::ParseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CompletionError::ParseError {
                message: "missing 'response' field".into(),
            })
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, CompletionError> {
        let client = self.clone();
        let prompt = prompt.to_string();
        let system = system.map(str::to_string);
        tokio::task::spawn_blocking(move || client.generate(&prompt, system.as_deref()))
            .await
            .map_err(|e| CompletionError::RequestFailed {
                message: format!("completion task failed: {e}"),
            })?
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.available)
            .finish()
    }
}
