//! LLM gateway client
//!
//! Provides a `CompletionGateway` trait and `GatewayClient`, which talks to an
//! OpenAI-compatible `POST /chat/completions` endpoint (non-streaming).
//!
//! The client never retries: rate limits and billing failures are surfaced as
//! distinct error variants so the caller can decide when to try again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::Turn;
use crate::config::GatewayConfig;

// ============================================================================
// CompletionGateway trait
// ============================================================================

/// Abstraction over chat-completion providers.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Generate one assistant reply for `turns`, steered by `system_prompt`.
    async fn complete(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, GatewayError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("GATEWAY_API_KEY is not configured")]
    MissingApiKey,

    #[error("Gateway rate limit exceeded")]
    RateLimited,

    #[error("Gateway payment required")]
    PaymentRequired,

    #[error("AI Gateway error: {status}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned no completion content")]
    EmptyCompletion,
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

// ============================================================================
// GatewayClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.api_key.is_empty() {
            return Err(GatewayError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionGateway for GatewayClient {
    async fn complete(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, GatewayError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(turns.iter().map(|t| WireMessage {
            role: t.role.as_str(),
            content: &t.content,
        }));

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "AI Gateway error");

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => GatewayError::PaymentRequired,
                _ => GatewayError::Api {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let completion: CompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GatewayError::EmptyCompletion)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

// ============================================================================
// TESTS
// ============================================================================
