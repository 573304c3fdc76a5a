//! Generative AI client (Gemini `generateContent`) with retry and backoff

use super::error::ToolError;
use crate::config::AiConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI features are not configured")]
    NotConfigured,

    #[error("AI provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("AI request failed: {0}")]
    Transport(String),

    #[error("Unexpected AI response: {0}")]
    InvalidResponse(String),
}

impl AiError {
    /// Rate limits, server errors and transport failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

impl From<AiError> for ToolError {
    fn from(err: AiError) -> Self {
        ToolError::External(err.to_string())
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at `max_delay`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retries run out. `op` receives the 0-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, AiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "AI request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    policy: RetryPolicy,
}

impl GeminiClient {
    /// `None` when no API key is configured
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("paperdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| AiError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Some(Self {
            http,
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from_config(config),
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Ask the model about one file; returns the concatenated text parts
    pub async fn generate(&self, prompt: &str, mime: &str, data: &[u8]) -> Result<String, AiError> {
        let encoded = STANDARD.encode(data);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: mime.to_string(),
                            data: encoded,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        retry_with_backoff(&self.policy, |_| self.send(&body)).await
    }

    async fn send(&self, body: &GenerateRequest<'_>) -> Result<String, AiError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| text.chars().take(200).collect());
            return Err(AiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(&text)
    }
}

fn parse_response(body: &str) -> Result<String, AiError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AiError::InvalidResponse(e.to_string()))?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AiError::InvalidResponse("no text in the response".to_string()));
    }
    Ok(text.trim().to_string())
}

/// Strip a Markdown code fence the model sometimes wraps answers in
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.split_once('\n').map(|(_, rest)| rest).unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
