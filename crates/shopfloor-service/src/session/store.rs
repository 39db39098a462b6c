//! # Session Store
//!
//! Storage seam for live sessions. The in-memory implementation is the only
//! one shipped; the trait keeps the tracker independent of it.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use shopfloor_core::{Money, Session};

use crate::error::ServiceResult;

/// Concurrency-safe map of live sessions keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Adds a session. An existing entry with the same id is replaced.
    async fn insert(&self, session: Session) -> ServiceResult<()>;

    /// Returns a snapshot of a live session.
    async fn get(&self, session_id: &str) -> ServiceResult<Option<Session>>;

    /// Adds one sale of `amount` to the session's counters.
    ///
    /// Returns `false` when no such session is live; nothing is created.
    async fn add_sale(&self, session_id: &str, amount: Money) -> ServiceResult<bool>;

    /// Takes a session out of the live set. At most one caller gets it.
    async fn remove(&self, session_id: &str) -> ServiceResult<Option<Session>>;

    /// Snapshots of every live session.
    async fn list(&self) -> ServiceResult<Vec<Session>>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> ServiceResult<()> {
        self.sessions.write().await.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> ServiceResult<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn add_sale(&self, session_id: &str, amount: Money) -> ServiceResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.sale_count += 1;
                session.sale_total = session.sale_total.saturating_add(amount);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, session_id: &str) -> ServiceResult<Option<Session>> {
        Ok(self.sessions.write().await.remove(session_id))
    }

    async fn list(&self) -> ServiceResult<Vec<Session>> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_sale_only_touches_live_sessions() {
        let store = InMemorySessionStore::new();
        let session = Session::start("staff-1", "Ayesha", "tenant-1");
        let id = session.id.clone();
        store.insert(session).await.unwrap();

        assert!(store.add_sale(&id, Money::from_cents(1000)).await.unwrap());
        assert!(!store.add_sale("ghost", Money::from_cents(1000)).await.unwrap());

        assert!(store.get("ghost").await.unwrap().is_none());
        let live = store.get(&id).await.unwrap().unwrap();
        assert_eq!(live.sale_count, 1);
        assert_eq!(live.sale_total, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_remove_hands_out_session_once() {
        let store = InMemorySessionStore::new();
        let session = Session::start("staff-1", "Ayesha", "tenant-1");
        let id = session.id.clone();
        store.insert(session).await.unwrap();

        assert!(store.remove(&id).await.unwrap().is_some());
        assert!(store.remove(&id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemorySessionStore::new());
        let session = Session::start("staff-1", "Ayesha", "tenant-1");
        let id = session.id.clone();
        store.insert(session).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store.add_sale(&id, Money::from_cents(100)).await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let live = store.get(&id).await.unwrap().unwrap();
        assert_eq!(live.sale_count, 50);
        assert_eq!(live.sale_total, Money::from_cents(5000));
    }
}
