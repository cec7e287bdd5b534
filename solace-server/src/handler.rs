//! Chat request handler
//!
//! One invocation per chat turn or per session end:
//! - **chat**: classify the latest user turn, answer with the fixed safety
//!   reply on risk, otherwise ask the gateway for a counselor reply and store
//!   it as an assistant message
//! - **summary**: ask the gateway for an end-of-session summary; nothing is
//!   stored here, the caller completes the session
//!
//! The handler is independent of HTTP so it can be exercised directly.

use std::sync::Arc;

use axum::http::StatusCode;
use solace_core::config::HandlerConfig;
use solace_core::crisis::{detect_crisis, SAFETY_REPLY};
use solace_core::gateway::{CompletionGateway, GatewayError};
use solace_core::prompts::{COUNSELOR_PROMPT, SUMMARY_PROMPT};
use solace_core::{ChatReply, ChatRequest, MessageStore, Role, Turn};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    #[error("Service temporarily unavailable. Please try again later.")]
    ServiceUnavailable,

    #[error("AI Gateway error: {0}")]
    GatewayFailure(u16),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            HandlerError::ServiceUnavailable => StatusCode::PAYMENT_REQUIRED,
            HandlerError::Configuration(_)
            | HandlerError::GatewayFailure(_)
            | HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for HandlerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::MissingApiKey => HandlerError::Configuration(e.to_string()),
            GatewayError::RateLimited => HandlerError::RateLimited,
            GatewayError::PaymentRequired => HandlerError::ServiceUnavailable,
            GatewayError::Api { status, .. } => HandlerError::GatewayFailure(status),
            other => HandlerError::Internal(other.to_string()),
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Settings injected at construction time.
#[derive(Debug, Clone, Default)]
pub struct HandlerSettings {
    pub persist_crisis_replies: bool,
}

impl From<&HandlerConfig> for HandlerSettings {
    fn from(config: &HandlerConfig) -> Self {
        Self {
            persist_crisis_replies: config.persist_crisis_replies,
        }
    }
}

#[derive(Clone)]
pub struct ChatHandler {
    settings: HandlerSettings,
    /// `None` when no gateway credential was supplied.
    gateway: Option<Arc<dyn CompletionGateway>>,
    store: Arc<dyn MessageStore>,
}

impl ChatHandler {
    pub fn new(
        settings: HandlerSettings,
        gateway: Option<Arc<dyn CompletionGateway>>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            settings,
            gateway,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Parse a raw JSON body and dispatch it.
    pub async fn handle_json(&self, body: &[u8]) -> Result<ChatReply, HandlerError> {
        let gateway = self.gateway()?;
        let request: ChatRequest = serde_json::from_slice(body)
            .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;
        self.dispatch(gateway, request).await
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, HandlerError> {
        let gateway = self.gateway()?;
        self.dispatch(gateway, request).await
    }

    fn gateway(&self) -> Result<&Arc<dyn CompletionGateway>, HandlerError> {
        self.gateway.as_ref().ok_or_else(|| {
            tracing::error!("Gateway credential missing; refusing request");
            HandlerError::from(GatewayError::MissingApiKey)
        })
    }

    async fn dispatch(
        &self,
        gateway: &Arc<dyn CompletionGateway>,
        request: ChatRequest,
    ) -> Result<ChatReply, HandlerError> {
        tracing::info!(
            kind = request.kind(),
            session_id = ?request.session_id(),
            "Handling chat request"
        );

        match request {
            ChatRequest::Chat { messages, session_id } => {
                self.chat(gateway.as_ref(), &messages, session_id).await
            }
            ChatRequest::Summary { messages, session_id } => {
                self.summary(gateway.as_ref(), &messages, session_id).await
            }
        }
    }

    async fn chat(
        &self,
        gateway: &dyn CompletionGateway,
        turns: &[Turn],
        session_id: Option<Uuid>,
    ) -> Result<ChatReply, HandlerError> {
        let latest = latest_user_content(turns).ok_or_else(|| {
            HandlerError::InvalidRequest("chat requires at least one user message".to_string())
        })?;

        if detect_crisis(Some(latest)) {
            tracing::warn!(session_id = ?session_id, "Crisis language detected; skipping gateway");
            // A failed write never replaces the safety reply; persist_reply logs it.
            if self.settings.persist_crisis_replies {
                let _ = self.persist_reply(session_id, SAFETY_REPLY).await;
            }
            return Ok(ChatReply::chat(SAFETY_REPLY, true));
        }

        let reply = gateway.complete(COUNSELOR_PROMPT, turns).await?;
        self.persist_reply(session_id, &reply).await?;

        Ok(ChatReply::chat(reply, false))
    }

    async fn summary(
        &self,
        gateway: &dyn CompletionGateway,
        turns: &[Turn],
        session_id: Option<Uuid>,
    ) -> Result<ChatReply, HandlerError> {
        if turns.is_empty() {
            return Err(HandlerError::InvalidRequest(
                "summary requires the session history".to_string(),
            ));
        }

        let summary = gateway.complete(SUMMARY_PROMPT, turns).await?;
        tracing::info!(session_id = ?session_id, chars = summary.len(), "Summary generated");

        Ok(ChatReply::summary(summary))
    }

    async fn persist_reply(&self, session_id: Option<Uuid>, content: &str) -> Result<(), HandlerError> {
        let Some(session_id) = session_id else {
            return Ok(());
        };

        self.store
            .insert_message(session_id, Role::Assistant, content)
            .await
            .map_err(|e| {
                tracing::error!(session_id = %session_id, error = %e, "Failed to store assistant reply");
                HandlerError::Internal(e.to_string())
            })?;
        Ok(())
    }
}

/// Content of the most recent user turn, if any.
pub fn latest_user_content(turns: &[Turn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .find(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
}

// ============================================================================
// Unit Tests
// ============================================================================
