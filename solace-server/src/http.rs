//! Solace HTTP API
//!
//! Axum-based HTTP server for the support chat.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - POST /chat                    - chat turn or session summary
//! - OPTIONS *                     - CORS preflight
//! - POST /sessions                - start a session (anonymous without `userId`)
//! - GET  /sessions?userId=&status= - session history
//! - GET  /sessions/:id            - one session
//! - GET  /sessions/:id/messages   - ordered messages
//! - POST /sessions/:id/messages   - append a user message
//! - POST /sessions/:id/end        - complete a session with its summary
//! - GET  /sessions/:id/events     - live feed of inserted messages (SSE)
//! - GET  /health                  - health check with store status
//! - GET  /version                 - server version info

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use solace_core::{ErrorBody, MessageStore, Role, SessionOwner, SessionStatus, SolaceConfig, SolaceError};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use uuid::Uuid;

use crate::handler::ChatHandler;

/// Headers browsers may send on cross-origin calls.
pub const CORS_ALLOW_HEADERS: [&str; 4] = ["authorization", "x-client-info", "apikey", "content-type"];

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub handler: ChatHandler,
    pub store: Arc<dyn MessageStore>,
    /// Present when the store is PostgreSQL-backed; used by `/health`.
    pub pool: Option<PgPool>,
}

impl HttpState {
    pub fn new(handler: ChatHandler, pool: Option<PgPool>) -> Self {
        let store = handler.store().clone();
        Self {
            handler,
            store,
            pool,
        }
    }
}

/// Wildcard-origin CORS. Every OPTIONS request is answered here as a
/// preflight (empty 200) before reaching any route.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::list(
            CORS_ALLOW_HEADERS.map(HeaderName::from_static),
        ))
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route("/sessions/:id", get(get_session_handler))
        .route(
            "/sessions/:id/messages",
            get(list_messages_handler).post(append_message_handler),
        )
        .route("/sessions/:id/end", post(end_session_handler))
        .route("/sessions/:id/events", get(events_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(cors_layer())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    config: &SolaceConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);

    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Solace HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndSessionRequest {
    pub summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: Uuid,
    pub status: Option<SessionStatus>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

fn error_json(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    let body = ErrorBody::new(msg);
    match serde_json::to_value(&body) {
        Ok(v) => (status, v),
        Err(_) => (status, serde_json::Value::String(body.error)),
    }
}

fn store_error(e: SolaceError) -> (StatusCode, serde_json::Value) {
    let status = match e {
        SolaceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        SolaceError::SessionCompleted(_) => StatusCode::CONFLICT,
        _ => {
            tracing::error!(error = %e, "Store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_json(status, e.to_string())
}

fn to_json<T: serde::Serialize>(status: StatusCode, value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(v) => (status, v),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Inner chat - runs the request handler over a raw JSON body.
pub async fn chat_inner(handler: &ChatHandler, body: &[u8]) -> (StatusCode, serde_json::Value) {
    match handler.handle_json(body).await {
        Ok(reply) => to_json(StatusCode::OK, &reply),
        Err(e) => {
            tracing::warn!(status = e.status().as_u16(), error = %e, "Chat request failed");
            error_json(e.status(), e.to_string())
        }
    }
}

/// Inner health check - reports the store backend and, for PostgreSQL, its version.
pub async fn health_inner(store: &dyn MessageStore, pool: Option<&PgPool>) -> (StatusCode, serde_json::Value) {
    let Some(pool) = pool else {
        return (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
            }),
        );
    };

    match solace_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "solace/1",
    })
}

pub async fn create_session_inner(
    store: &dyn MessageStore,
    req: CreateSessionRequest,
) -> (StatusCode, serde_json::Value) {
    match store.create_session(SessionOwner::from(req.user_id)).await {
        Ok(session) => to_json(StatusCode::CREATED, &session),
        Err(e) => store_error(e),
    }
}

pub async fn get_session_inner(store: &dyn MessageStore, id: Uuid) -> (StatusCode, serde_json::Value) {
    match store.get_session(id).await {
        Ok(Some(session)) => to_json(StatusCode::OK, &session),
        Ok(None) => store_error(SolaceError::SessionNotFound(id)),
        Err(e) => store_error(e),
    }
}

/// Inner history - sessions of one user, completed ones unless `status` says otherwise.
pub async fn list_sessions_inner(
    store: &dyn MessageStore,
    query: HistoryQuery,
) -> (StatusCode, serde_json::Value) {
    let status = query.status.unwrap_or(SessionStatus::Completed);
    match store.list_sessions(query.user_id, status).await {
        Ok(sessions) => to_json(StatusCode::OK, &sessions),
        Err(e) => store_error(e),
    }
}

pub async fn list_messages_inner(store: &dyn MessageStore, id: Uuid) -> (StatusCode, serde_json::Value) {
    match store.list_messages(id).await {
        Ok(messages) => to_json(StatusCode::OK, &messages),
        Err(e) => store_error(e),
    }
}

/// Inner append - stores a trimmed, non-empty user message.
pub async fn append_message_inner(
    store: &dyn MessageStore,
    id: Uuid,
    req: AppendMessageRequest,
) -> (StatusCode, serde_json::Value) {
    let content = req.content.trim();
    if content.is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "content must not be empty");
    }

    match store.insert_message(id, Role::User, content).await {
        Ok(message) => to_json(StatusCode::CREATED, &message),
        Err(e) => store_error(e),
    }
}

pub async fn end_session_inner(
    store: &dyn MessageStore,
    id: Uuid,
    req: EndSessionRequest,
) -> (StatusCode, serde_json::Value) {
    match store.complete_session(id, &req.summary).await {
        Ok(session) => to_json(StatusCode::OK, &session),
        Err(e) => store_error(e),
    }
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn chat_handler(State(state): State<Arc<HttpState>>, body: Bytes) -> impl IntoResponse {
    let (status, body) = chat_inner(&state.handler, &body).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref(), state.pool.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn create_session_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    // The body is optional: no body means an anonymous session
    let req = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        match serde_json::from_slice::<CreateSessionRequest>(&body) {
            Ok(req) => req,
            Err(e) => return rejection(e.to_string()),
        }
    };
    let (status, body) = create_session_inner(state.store.as_ref(), req).await;
    (status, Json(body))
}

pub async fn list_sessions_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> impl IntoResponse {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return rejection(e.body_text()),
    };
    let (status, body) = list_sessions_inner(state.store.as_ref(), query).await;
    (status, Json(body))
}

pub async fn get_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = get_session_inner(state.store.as_ref(), id).await;
    (status, Json(body))
}

pub async fn list_messages_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = list_messages_inner(state.store.as_ref(), id).await;
    (status, Json(body))
}

pub async fn append_message_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    body: Result<Json<AppendMessageRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return rejection(e.body_text()),
    };
    let (status, body) = append_message_inner(state.store.as_ref(), id, req).await;
    (status, Json(body))
}

pub async fn end_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    body: Result<Json<EndSessionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return rejection(e.body_text()),
    };
    let (status, body) = end_session_inner(state.store.as_ref(), id, req).await;
    (status, Json(body))
}

/// Server-Sent Events feed of messages inserted into one session.
pub async fn events_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> Response {
    // Subscribe before the existence check so no insert slips between them
    let rx = state.store.subscribe();
    match state.store.get_session(id).await {
        Ok(Some(_)) => Sse::new(session_events(rx, id))
            .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
            .into_response(),
        Ok(None) => {
            let (status, body) = store_error(SolaceError::SessionNotFound(id));
            (status, Json(body)).into_response()
        }
        Err(e) => {
            let (status, body) = store_error(e);
            (status, Json(body)).into_response()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn rejection(msg: String) -> (StatusCode, Json<serde_json::Value>) {
    let (status, body) = error_json(StatusCode::BAD_REQUEST, msg);
    (status, Json(body))
}

/// Adapt the store's insert feed into SSE events for one session.
pub fn session_events(
    rx: broadcast::Receiver<solace_core::Message>,
    session_id: Uuid,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(move |item| match item {
        Ok(message) if message.session_id == session_id => {
            match Event::default().event("message").json_data(&message) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode message event");
                    None
                }
            }
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Event subscriber lagged");
            None
        }
    })
}

// ============================================================================
// Unit Tests - call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::MemoryMessageStore;

    fn store() -> MemoryMessageStore {
        MemoryMessageStore::new()
    }

    #[test]
    fn test_error_json_is_error_body() {
        let (status, body) = error_json(StatusCode::CONFLICT, "Session is already completed");
        assert_eq!(status, StatusCode::CONFLICT);

        let parsed: ErrorBody = serde_json::from_value(body).unwrap();
        assert_eq!(parsed, ErrorBody::new("Session is already completed"));
    }

    #[test]
    fn test_store_error_maps_status() {
        let id = Uuid::new_v4();
        let (status, body) = store_error(SolaceError::SessionNotFound(id));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("Session {} not found", id));

        let (status, _) = store_error(SolaceError::SessionCompleted(id));
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "solace/1");
    }

    #[tokio::test]
    async fn test_health_inner_memory_store() {
        let store = store();
        let (status, body) = health_inner(&store, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_create_session_without_user_is_anonymous() {
        let store = store();
        let (status, body) = create_session_inner(&store, CreateSessionRequest::default()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["is_anonymous"], true);
        assert_eq!(body["status"], "active");
        assert!(body["user_id"].is_null());
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_404() {
        let (status, body) = get_session_inner(&store(), Uuid::new_v4()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_append_blank_message_is_400() {
        let store = store();
        let session = store.create_session(SessionOwner::Anonymous).await.unwrap();

        let (status, body) = append_message_inner(
            &store,
            session.id,
            AppendMessageRequest {
                content: "   ".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "content must not be empty");
    }

    #[tokio::test]
    async fn test_append_trims_and_stores_user_message() {
        let store = store();
        let session = store.create_session(SessionOwner::Anonymous).await.unwrap();

        let (status, body) = append_message_inner(
            &store,
            session.id,
            AppendMessageRequest {
                content: "  I can't sleep  ".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "user");
        assert_eq!(body["content"], "I can't sleep");
    }

    #[tokio::test]
    async fn test_end_session_twice_is_conflict() {
        let store = store();
        let session = store.create_session(SessionOwner::Anonymous).await.unwrap();

        let (status, body) = end_session_inner(
            &store,
            session.id,
            EndSessionRequest {
                summary: "We talked.".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["summary"], "We talked.");
        assert!(body["ended_at"].is_string());

        let (status, _) = end_session_inner(
            &store,
            session.id,
            EndSessionRequest {
                summary: "Again".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_history_defaults_to_completed() {
        let store = store();
        let user = Uuid::new_v4();
        let done = store.create_session(SessionOwner::User(user)).await.unwrap();
        store.create_session(SessionOwner::User(user)).await.unwrap();
        store.complete_session(done.id, "s").await.unwrap();

        let (status, body) = list_sessions_inner(
            &store,
            HistoryQuery {
                user_id: user,
                status: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sessions = body.as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["id"], done.id.to_string());
    }

    #[tokio::test]
    async fn test_session_events_only_yield_matching_session() {
        let store = store();
        let watched = store.create_session(SessionOwner::Anonymous).await.unwrap();
        let other = store.create_session(SessionOwner::Anonymous).await.unwrap();

        let events = session_events(store.subscribe(), watched.id);
        tokio::pin!(events);

        store.insert_message(other.id, Role::User, "elsewhere").await.unwrap();
        store.insert_message(watched.id, Role::Assistant, "here").await.unwrap();

        let next = tokio::time::timeout(Duration::from_secs(1), events.next())
            .await
            .expect("event should arrive");
        assert!(next.is_some());
    }
}
