pub mod api;
pub mod config;
pub mod crisis;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod prompts;
pub mod store;

pub use api::{ChatReply, ChatRequest, ErrorBody, Turn};
pub use config::SolaceConfig;
pub use crisis::{detect_crisis, CRISIS_RESOURCES, SAFETY_REPLY};
pub use error::SolaceError;
pub use gateway::{CompletionGateway, GatewayClient, GatewayError};
pub use models::{Message, Role, Session, SessionOwner, SessionStatus};
pub use store::{MemoryMessageStore, MessageEvents, MessageStore, PgMessageStore};
