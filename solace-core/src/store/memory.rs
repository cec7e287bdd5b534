use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{MessageEvents, MessageStore};
use crate::error::SolaceError;
use crate::models::{Message, Role, Session, SessionOwner, SessionStatus};

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    messages: HashMap<Uuid, Vec<Message>>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: RwLock<Inner>,
    events: MessageEvents,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create_session(&self, owner: SessionOwner) -> Result<Session, SolaceError> {
        let session = Session::new(owner);
        let mut inner = self.inner.write().await;
        inner.sessions.insert(session.id, session.clone());
        inner.messages.insert(session.id, Vec::new());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, SolaceError> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn insert_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, SolaceError> {
        let message = {
            let mut inner = self.inner.write().await;
            match inner.sessions.get(&session_id) {
                None => return Err(SolaceError::SessionNotFound(session_id)),
                Some(s) if !s.is_active() => return Err(SolaceError::SessionCompleted(session_id)),
                Some(_) => {}
            }

            let message = Message {
                id: Uuid::new_v4(),
                session_id,
                role,
                content: content.to_string(),
                created_at: Utc::now(),
            };
            inner
                .messages
                .entry(session_id)
                .or_default()
                .push(message.clone());
            message
        };

        self.events.publish(&message);
        Ok(message)
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, SolaceError> {
        let inner = self.inner.read().await;
        if !inner.sessions.contains_key(&session_id) {
            return Err(SolaceError::SessionNotFound(session_id));
        }
        // Vec order is insertion order, which is creation order
        Ok(inner.messages.get(&session_id).cloned().unwrap_or_default())
    }

    async fn complete_session(&self, id: Uuid, summary: &str) -> Result<Session, SolaceError> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or(SolaceError::SessionNotFound(id))?;

        if !session.is_active() {
            return Err(SolaceError::SessionCompleted(id));
        }

        session.status = SessionStatus::Completed;
        session.ended_at = Some(Utc::now());
        session.summary = Some(summary.to_string());
        Ok(session.clone())
    }

    async fn list_sessions(
        &self,
        user_id: Uuid,
        status: SessionStatus,
    ) -> Result<Vec<Session>, SolaceError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == Some(user_id) && s.status == status)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
