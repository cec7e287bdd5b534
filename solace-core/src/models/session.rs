use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// Who a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOwner {
    User(Uuid),
    Anonymous,
}

impl SessionOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            SessionOwner::User(id) => Some(*id),
            SessionOwner::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, SessionOwner::Anonymous)
    }
}

impl From<Option<Uuid>> for SessionOwner {
    fn from(user_id: Option<Uuid>) -> Self {
        user_id.map_or(SessionOwner::Anonymous, SessionOwner::User)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_anonymous: bool,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

impl Session {
    pub fn new(owner: SessionOwner) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: owner.user_id(),
            is_anonymous: owner.is_anonymous(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            ended_at: None,
            summary: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}
