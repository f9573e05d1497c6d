//! Generative text capability used by evaluation and content generation.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from a text generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generative service is not configured")]
    NotConfigured,

    #[error("Circuit breaker is open, service temporarily unavailable")]
    CircuitOpen,

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generative service error: {0}")]
    ServiceError(String),

    /// The service answered but returned no text, e.g. blocked by safety filters.
    #[error("Generative service returned no text: {0}")]
    EmptyResponse(String),
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// When set, the model is asked for JSON matching this schema.
    pub response_schema: Option<Value>,
}

impl GenerationParams {
    pub fn text(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            response_schema: None,
        }
    }

    pub fn json(temperature: f32, max_output_tokens: u32, schema: Value) -> Self {
        Self {
            temperature,
            max_output_tokens,
            response_schema: Some(schema),
        }
    }
}

/// Single-prompt text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;

    /// Availability label reported by the health endpoint.
    async fn status(&self) -> &'static str {
        "ready"
    }
}
