use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SolaceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Session {0} is already completed")]
    SessionCompleted(Uuid),

    #[error("Other error: {0}")]
    Other(String),
}
