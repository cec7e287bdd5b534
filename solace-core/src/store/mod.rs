//! Session and message persistence
//!
//! `MessageStore` is the narrow interface the handler and the HTTP layer
//! consume. Two backends implement it:
//! - **PostgreSQL** (`PgMessageStore`) for deployments
//! - **Memory** (`MemoryMessageStore`) for local development and tests
//!
//! Every successful message insert is published on a `MessageEvents` hub so
//! live views can follow a session without polling.

mod memory;
mod postgres;

pub use memory::MemoryMessageStore;
pub use postgres::PgMessageStore;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::SolaceError;
use crate::models::{Message, Role, Session, SessionOwner, SessionStatus};

/// Capacity of the insert feed. Subscribers that fall further behind miss events.
pub const EVENT_CAPACITY: usize = 256;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_session(&self, owner: SessionOwner) -> Result<Session, SolaceError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, SolaceError>;

    /// Append a message. Fails for unknown or completed sessions.
    async fn insert_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, SolaceError>;

    /// Messages of a session in creation order.
    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, SolaceError>;

    /// Transition `active -> completed`, recording the end time and summary.
    /// A session can only be completed once.
    async fn complete_session(&self, id: Uuid, summary: &str) -> Result<Session, SolaceError>;

    /// Sessions owned by `user_id` with `status`, newest first.
    async fn list_sessions(
        &self,
        user_id: Uuid,
        status: SessionStatus,
    ) -> Result<Vec<Session>, SolaceError>;

    /// Feed of every message inserted through this store.
    fn subscribe(&self) -> broadcast::Receiver<Message>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Broadcast hub for inserted messages.
#[derive(Debug, Clone)]
pub struct MessageEvents {
    tx: broadcast::Sender<Message>,
}

impl MessageEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, message: &Message) {
        // No receivers is not an error
        let _ = self.tx.send(message.clone());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }
}

impl Default for MessageEvents {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}
