//! Gemini `generateContent` client.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::GeminiConfig;
use crate::services::generator::{GenerationError, GenerationParams, TextGenerator};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_request<'a>(prompt: &'a str, params: &GenerationParams) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
            response_mime_type: params.response_schema.as_ref().map(|_| "application/json"),
            response_schema: params.response_schema.clone(),
        },
    }
}

/// Text of the first candidate's parts, concatenated.
fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let block_reason = response
        .prompt_feedback
        .and_then(|f| f.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(GenerationError::EmptyResponse(
            block_reason.unwrap_or_else(|| "no candidates".to_string()),
        ));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse(
            candidate
                .finish_reason
                .unwrap_or_else(|| "empty candidate".to_string()),
        ));
    }

    Ok(text)
}

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Opens after consecutive failures and lets a probe through after the reset
/// timeout.
struct CircuitBreaker {
    is_open: AtomicBool,
    failure_count: AtomicU32,
    failure_threshold: u32,
    reset_timeout: Duration,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        Self {
            is_open: AtomicBool::new(false),
            failure_count: AtomicU32::new(0),
            failure_threshold: failure_threshold.max(1),
            reset_timeout: Duration::from_secs(reset_timeout_secs),
            opened_at: RwLock::new(None),
        }
    }

    async fn is_allowed(&self) -> bool {
        self.state().await != CircuitState::Open
    }

    async fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if self.is_open.swap(false, Ordering::Relaxed) {
            info!("Circuit breaker closed after successful request");
            *self.opened_at.write().await = None;
        }
    }

    async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count >= self.failure_threshold {
            if !self.is_open.swap(true, Ordering::Relaxed) {
                warn!(
                    failure_count = count,
                    threshold = self.failure_threshold,
                    "Circuit breaker opened due to consecutive failures"
                );
            }
            // A failed half-open probe restarts the wait.
            *self.opened_at.write().await = Some(Instant::now());
        }
    }

    async fn state(&self) -> CircuitState {
        if !self.is_open.load(Ordering::Relaxed) {
            return CircuitState::Closed;
        }

        match *self.opened_at.read().await {
            Some(opened) if opened.elapsed() >= self.reset_timeout => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

// ============================================================================
// Gemini Client
// ============================================================================

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    circuit_breaker: CircuitBreaker,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let circuit_breaker =
            CircuitBreaker::new(config.circuit_breaker_failures, config.circuit_breaker_reset_secs);

        Ok(Self {
            client,
            config,
            circuit_breaker,
        })
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn call(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&build_request(prompt, params))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout_ms)
                } else {
                    GenerationError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServiceError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::ServiceError(format!("Invalid response body: {}", e)))?;

        extract_text(body)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        if !self.config.is_configured() {
            return Err(GenerationError::NotConfigured);
        }

        if !self.circuit_breaker.is_allowed().await {
            return Err(GenerationError::CircuitOpen);
        }

        let start = Instant::now();
        let result = self.call(prompt, params).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(text) => {
                self.circuit_breaker.record_success().await;
                debug!(
                    model = %self.config.model,
                    prompt_chars = prompt.len(),
                    response_chars = text.len(),
                    duration_ms,
                    "Gemini call succeeded"
                );
            }
            // The service answered; it is not unhealthy.
            Err(GenerationError::EmptyResponse(reason)) => {
                self.circuit_breaker.record_success().await;
                warn!(model = %self.config.model, reason = %reason, duration_ms, "Gemini returned no text");
            }
            Err(e) => {
                self.circuit_breaker.record_failure().await;
                error!(model = %self.config.model, error = %e, duration_ms, "Gemini call failed");
            }
        }

        result
    }

    async fn status(&self) -> &'static str {
        self.circuit_state().await.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            ..GeminiConfig::default()
        }
    }

    #[test]
    fn test_request_body_for_plain_text() {
        let params = GenerationParams::text(0.2, 1024);
        let body = serde_json::to_value(build_request("Evaluate this", &params)).unwrap();

        assert_eq!(
            body["contents"],
            json!([{"role": "user", "parts": [{"text": "Evaluate this"}]}])
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert!(body["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_request_body_with_schema_asks_for_json() {
        let schema = json!({"type": "ARRAY"});
        let params = GenerationParams::json(0.7, 4096, schema.clone());
        let body = serde_json::to_value(build_request("Quiz", &params)).unwrap();

        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"], schema);
    }

    #[test]
    fn test_extract_text_from_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "Topic: "}, {"text": "AI"}]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();

        assert_eq!(extract_text(response).unwrap(), "Topic: AI");
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();

        match extract_text(response) {
            Err(GenerationError::EmptyResponse(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("Expected EmptyResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_text_empty_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();

        assert!(matches!(
            extract_text(response),
            Err(GenerationError::EmptyResponse(_))
        ));
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(config()).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let result = client
            .generate("hello", &GenerationParams::text(0.2, 16))
            .await;
        assert!(matches!(result, Err(GenerationError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(2, 60);
        assert_eq!(breaker.state().await, CircuitState::Closed);

        breaker.record_failure().await;
        assert!(breaker.is_allowed().await);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.is_allowed().await);
    }

    #[tokio::test]
    async fn test_circuit_breaker_half_open_after_reset() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        assert!(breaker.is_allowed().await);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[test]
    fn test_circuit_state_labels() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }
}
