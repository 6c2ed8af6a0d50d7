//! Generation-backend HTTP client using reqwest.
//!
//! The backend generates text only — all routing, planning and source
//! bookkeeping stays in Rust. Speaks the OpenAI-compatible chat-completions
//! protocol (Groq serves it), with proper error mapping for 401, 429 and
//! 5xx responses.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::{config::Config, error::AgentError};

/// One chat message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// A fully assembled completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The text-generation collaborator.
///
/// Used for classification, ticker extraction, specialist synthesis, response
/// synthesis, confidence scoring, personalization and tool-need analysis.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the assistant message content.
    async fn complete(&self, request: ChatRequest) -> Result<String, AgentError>;
}

/// HTTP client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCompletionClient {
    /// Build a client with the request timeout from `config`.
    pub fn new(config: &Config) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.completion_base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn build_body(request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "model":       request.model,
            "messages":    request.messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    /// Parse the raw chat-completions JSON into the assistant content string.
    fn parse_response(json: serde_json::Value) -> Result<String, AgentError> {
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::Completion("response missing choices[0].message.content".to_string())
            })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, AgentError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(AgentError::Http)?;

        let status = response.status();

        if status.is_success() {
            let raw = response
                .json::<serde_json::Value>()
                .await
                .map_err(AgentError::Http)?;
            return Self::parse_response(raw);
        }

        // Read body for diagnostics before consuming the response.
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "(unreadable body)".to_string());

        Err(map_http_error(status.as_u16(), &error_body))
    }
}

// ── HTTP error mapping ────────────────────────────────────────────────────────

/// Maximum number of characters from an HTTP error body included in error
/// messages. Prevents large or potentially sensitive server responses from
/// propagating verbatim through error chains and log sinks.
const MAX_ERROR_BODY_LEN: usize = 200;

pub(crate) fn map_http_error(status: u16, body: &str) -> AgentError {
    // Char-based truncation to avoid panicking at a multi-byte UTF-8 boundary.
    let safe_body = if body.chars().count() > MAX_ERROR_BODY_LEN {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{truncated}…[truncated]")
    } else {
        body.to_string()
    };

    match status {
        401 => AgentError::Completion("Unauthorized: check GROQ_API_KEY".to_string()),
        429 => AgentError::Completion("Rate limited by completion backend".to_string()),
        s if s >= 500 => {
            AgentError::Completion(format!("Completion backend server error {s}: {safe_body}"))
        }
        s => AgentError::Completion(format!("HTTP {s}: {safe_body}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
