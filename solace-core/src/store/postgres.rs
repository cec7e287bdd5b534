use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{MessageEvents, MessageStore};
use crate::error::SolaceError;
use crate::models::{Message, Role, Session, SessionOwner, SessionStatus};

const SESSION_COLUMNS: &str = "id, user_id, is_anonymous, status, created_at, ended_at, summary";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, created_at";

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Option<Uuid>,
    is_anonymous: bool,
    status: String,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    summary: Option<String>,
}

impl TryFrom<SessionRow> for Session {
    type Error = SolaceError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            is_anonymous: row.is_anonymous,
            status: row.status.parse().map_err(SolaceError::Other)?,
            created_at: row.created_at,
            ended_at: row.ended_at,
            summary: row.summary,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = SolaceError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            session_id: row.session_id,
            role: row.role.parse().map_err(SolaceError::Other)?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed store over the `sessions` and `messages` tables.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
    events: MessageEvents,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            events: MessageEvents::default(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Distinguish "no such session" from "session already completed" after a
    /// guarded write affected no rows.
    async fn inactive_reason(&self, id: Uuid) -> SolaceError {
        match self.get_session(id).await {
            Ok(Some(_)) => SolaceError::SessionCompleted(id),
            Ok(None) => SolaceError::SessionNotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create_session(&self, owner: SessionOwner) -> Result<Session, SolaceError> {
        let row: SessionRow = sqlx::query_as(&format!(
            "INSERT INTO sessions (id, user_id, is_anonymous, status)
             VALUES ($1, $2, $3, 'active')
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner.user_id())
        .bind(owner.is_anonymous())
        .fetch_one(&self.pool)
        .await?;

        let session = Session::try_from(row)?;
        tracing::info!(session_id = %session.id, anonymous = session.is_anonymous, "Session created");
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, SolaceError> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Session::try_from).transpose()
    }

    async fn insert_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, SolaceError> {
        // Guarded insert: only lands while the session is still active
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "INSERT INTO messages (id, session_id, role, content)
             SELECT $1, $2, $3, $4
             WHERE EXISTS (SELECT 1 FROM sessions WHERE id = $2 AND status = 'active')
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(self.inactive_reason(session_id).await);
        };

        let message = Message::try_from(row)?;
        tracing::debug!(session_id = %session_id, role = %role, message_id = %message.id, "Message stored");
        self.events.publish(&message);
        Ok(message)
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, SolaceError> {
        if self.get_session(session_id).await?.is_none() {
            return Err(SolaceError::SessionNotFound(session_id));
        }

        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE session_id = $1
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn complete_session(&self, id: Uuid, summary: &str) -> Result<Session, SolaceError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "UPDATE sessions
             SET status = 'completed', ended_at = now(), summary = $2
             WHERE id = $1 AND status = 'active'
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(summary)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let session = Session::try_from(row)?;
                tracing::info!(session_id = %id, "Session completed");
                Ok(session)
            }
            None => Err(self.inactive_reason(id).await),
        }
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        status: SessionStatus,
    ) -> Result<Vec<Session>, SolaceError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_id = $1 AND status = $2
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Session::try_from).collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
