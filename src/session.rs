//! Per-user conversational sessions.
//!
//! Each user has at most one session holding the current flow step and the
//! form fields accumulated so far. Sessions are ephemeral: created lazily,
//! overwritten on reset, never persisted. Keys are disjoint per user, so no
//! cross-user coordination is needed beyond the map lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::engine::state::FlowState;

/// Partially-filled game creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameForm {
    pub location: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// One user's conversational state.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: FlowState,
    pub form: GameForm,
    pub last_active: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: FlowState::Idle,
            form: GameForm::default(),
            last_active: Utc::now(),
        }
    }
}

/// Keyed store of sessions, one per Telegram user id.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the user's session, creating an idle one if absent. Never fails.
    pub async fn get(&self, user_id: i64) -> Session {
        if let Some(session) = self.inner.read().await.get(&user_id) {
            return session.clone();
        }
        let session = Session::default();
        self.inner
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| session.clone());
        session
    }

    /// Store the session back after processing an event, refreshing its
    /// activity timestamp.
    pub async fn put(&self, user_id: i64, mut session: Session) {
        session.last_active = Utc::now();
        self.inner.write().await.insert(user_id, session);
    }

    /// Overwrite with a fresh idle session.
    pub async fn reset(&self, user_id: i64) {
        self.inner.write().await.insert(user_id, Session::default());
    }

    /// Drop sessions idle longer than `max_idle`. Returns how many were
    /// evicted. Abandoned mid-flow sessions are simply discarded; the user
    /// starts over on their next interaction.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, s| s.last_active > cutoff);
        before - map.len()
    }
}

/// Spawn the background sweep that evicts idle sessions every 10 minutes.
pub fn spawn_eviction_task(store: SessionStore, max_idle: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let evicted = store.evict_idle(max_idle).await;
            if evicted > 0 {
                tracing::debug!(evicted, "Evicted idle sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_creates_idle_session() {
        let store = SessionStore::new();
        let session = store.get(1).await;
        assert_eq!(session.state, FlowState::Idle);
        assert_eq!(session.form, GameForm::default());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = SessionStore::new();
        let mut session = store.get(1).await;
        session.state = FlowState::AwaitDate;
        session.form.location = Some("Court A".into());
        store.put(1, session).await;

        let loaded = store.get(1).await;
        assert_eq!(loaded.state, FlowState::AwaitDate);
        assert_eq!(loaded.form.location.as_deref(), Some("Court A"));
    }

    #[tokio::test]
    async fn reset_overwrites_not_merges() {
        let store = SessionStore::new();
        let mut session = store.get(7).await;
        session.state = FlowState::AwaitTime;
        session.form.location = Some("x".into());
        store.put(7, session).await;

        store.reset(7).await;
        let fresh = store.get(7).await;
        assert_eq!(fresh.state, FlowState::Idle);
        assert!(fresh.form.location.is_none());
    }

    #[tokio::test]
    async fn sessions_are_per_user() {
        let store = SessionStore::new();
        let mut a = store.get(1).await;
        a.state = FlowState::AwaitLocation;
        store.put(1, a).await;

        let b = store.get(2).await;
        assert_eq!(b.state, FlowState::Idle);
    }

    #[tokio::test]
    async fn evict_drops_only_stale_sessions() {
        let store = SessionStore::new();
        let mut stale = Session::default();
        stale.last_active = Utc::now() - chrono::Duration::hours(2);
        store.inner.write().await.insert(1, stale);
        store.put(2, Session::default()).await;

        let evicted = store.evict_idle(Duration::from_secs(3600)).await;
        assert_eq!(evicted, 1);
        assert_eq!(store.inner.read().await.len(), 1);
        assert!(store.inner.read().await.contains_key(&2));
    }
}
