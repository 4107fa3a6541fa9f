//! Session storage
//!
//! The gateway only asks "is this request authenticated?". Stores decide
//! how sessions are kept; the in-memory store is the default.

pub mod memory;

pub use memory::MemorySessionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// An authenticated principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Session credentials carried by one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub token: Option<String>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new session for `username`.
    async fn create(&self, username: &str) -> Session;

    /// Look up a live session. Expired sessions are never returned.
    async fn get(&self, token: &str) -> Option<Session>;

    /// End a session. Unknown tokens are ignored.
    async fn revoke(&self, token: &str);

    async fn is_authenticated(&self, ctx: &SessionContext) -> bool {
        match ctx.token.as_deref() {
            Some(token) => self.get(token).await.is_some(),
            None => false,
        }
    }
}
