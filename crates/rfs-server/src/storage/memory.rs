//! In-memory session store using DashMap

use super::{Session, SessionStore};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sessions with a fixed time-to-live, kept in process memory
pub struct MemorySessionStore {
    data: Arc<DashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl MemorySessionStore {
    /// Create a store and start its expiry sweep. Must be called inside a
    /// tokio runtime.
    pub fn new(ttl: Duration) -> Self {
        let store = Self {
            data: Arc::new(DashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        };

        store.start_cleanup_task();

        store
    }

    /// Number of stored sessions, expired ones included until swept
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn start_cleanup_task(&self) {
        let data: Weak<DashMap<String, Session>> = Arc::downgrade(&self.data);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;

                // Store dropped: nothing left to sweep.
                let Some(data) = data.upgrade() else {
                    break;
                };

                let now = Utc::now();
                let before = data.len();
                data.retain(|_, session| session.expires_at > now);
                let removed = before.saturating_sub(data.len());
                if removed > 0 {
                    debug!("Swept {} expired sessions", removed);
                }
            }
        });
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, username: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(chrono::DateTime::<Utc>::MAX_UTC),
        };
        self.data.insert(session.token.clone(), session.clone());
        session
    }

    async fn get(&self, token: &str) -> Option<Session> {
        let session = self.data.get(token).map(|entry| entry.value().clone())?;
        if session.expires_at <= Utc::now() {
            self.data.remove(token);
            return None;
        }
        Some(session)
    }

    async fn revoke(&self, token: &str) {
        self.data.remove(token);
    }
}
