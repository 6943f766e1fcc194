//! In-memory registry of live sessions.
//!
//! A browser never announces that it went away, so sessions that see no request for
//! `idle_timeout` are discarded, together with their document index and transcript.

use super::{Credentials, Session, SessionConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Identifier carried by the browser session cookie.
pub type SessionId = Uuid;

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

impl SessionEntry {
    /// A session is idle once its timeout has passed and no request holds it.
    fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= idle_timeout
            && Arc::strong_count(&self.session) == 1
    }
}

/// Sessions keyed by id.
///
/// Each session sits behind its own mutex, so operations within a session run one at a
/// time while different sessions proceed independently.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    startup_credentials: Option<Credentials>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Create an empty store. When `startup_credentials` is set, new sessions start
    /// configured with them. Sessions unused for `idle_timeout` are dropped.
    pub fn new(startup_credentials: Option<Credentials>, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            startup_credentials,
            idle_timeout,
        }
    }

    /// Return the session for `id`, creating one when `id` is absent, unknown or expired.
    ///
    /// Every call refreshes the session's idle clock. The returned flag tells whether a
    /// new session was created.
    pub async fn get_or_create(
        &self,
        id: Option<SessionId>,
    ) -> (SessionId, Arc<Mutex<Session>>, bool) {
        self.get_or_create_at(id, Instant::now()).await
    }

    async fn get_or_create_at(
        &self,
        id: Option<SessionId>,
        now: Instant,
    ) -> (SessionId, Arc<Mutex<Session>>, bool) {
        let mut sessions = self.sessions.write().await;
        if let Some(id) = id {
            match sessions.get_mut(&id) {
                Some(entry) if !entry.is_idle(now, self.idle_timeout) => {
                    entry.last_seen = now;
                    return (id, Arc::clone(&entry.session), false);
                }
                Some(_) => {
                    sessions.remove(&id);
                    tracing::debug!(session = %id, "Session expired");
                }
                None => {}
            }
        }

        let id = Uuid::new_v4();
        let config = self
            .startup_credentials
            .clone()
            .map(SessionConfig::configured_with)
            .unwrap_or_default();
        let session = Arc::new(Mutex::new(Session::with_config(config)));
        sessions.insert(
            id,
            SessionEntry {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        tracing::debug!(session = %id, "Session created");
        (id, session, true)
    }

    /// Drop every session idle for longer than the timeout. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    async fn evict_idle_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_idle(now, self.idle_timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Periodically evict idle sessions for as long as the store is alive.
    ///
    /// Sweeps run at half the idle timeout, and at least once a second.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = (self.idle_timeout / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.evict_idle().await;
            }
        })
    }

    /// End a session, dropping its document and transcript. Returns whether it existed.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "Session ended");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn unknown_id_creates_a_new_session() {
        let store = SessionStore::new(None, IDLE);
        let (id, _, created) = store.get_or_create(Some(Uuid::new_v4())).await;
        assert!(created);

        let (same, _, created) = store.get_or_create(Some(id)).await;
        assert_eq!(same, id);
        assert!(!created);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(None, IDLE);
        let (_, first, _) = store.get_or_create(None).await;
        let (_, second, _) = store.get_or_create(None).await;

        first.lock().await.set_credentials("a", "b").expect("credentials");
        assert!(!second.lock().await.is_configured());
    }

    #[tokio::test]
    async fn startup_credentials_seed_new_sessions() {
        let credentials = Credentials::new("env-gemini", "env-llama").expect("credentials");
        let store = SessionStore::new(Some(credentials), IDLE);
        let (_, session, _) = store.get_or_create(None).await;
        assert!(session.lock().await.is_configured());
    }

    #[tokio::test]
    async fn remove_ends_the_session() {
        let store = SessionStore::new(None, IDLE);
        let (id, _, _) = store.get_or_create(None).await;
        assert!(store.remove(id).await);
        assert!(!store.remove(id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let store = SessionStore::new(None, IDLE);
        let start = Instant::now();
        for _ in 0..1000 {
            store.get_or_create_at(None, start).await;
        }
        let (active, _, _) = store.get_or_create_at(None, start).await;
        assert_eq!(store.len().await, 1001);

        store.get_or_create_at(Some(active), start + IDLE / 2).await;
        let evicted = store.evict_idle_at(start + IDLE + Duration::from_secs(1)).await;

        assert_eq!(evicted, 1000);
        assert_eq!(store.len().await, 1);
        let (id, _, created) = store
            .get_or_create_at(Some(active), start + IDLE + Duration::from_secs(2))
            .await;
        assert_eq!(id, active);
        assert!(!created);
    }

    #[tokio::test]
    async fn expired_cookie_gets_a_fresh_session() {
        let store = SessionStore::new(None, IDLE);
        let start = Instant::now();
        let (id, session, _) = store.get_or_create_at(None, start).await;
        session.lock().await.set_credentials("a", "b").expect("credentials");
        drop(session);

        let (fresh, session, created) = store
            .get_or_create_at(Some(id), start + IDLE + Duration::from_secs(1))
            .await;
        assert!(created);
        assert_ne!(fresh, id);
        assert!(!session.lock().await.is_configured());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_in_use_survive_the_sweep() {
        let store = SessionStore::new(None, IDLE);
        let start = Instant::now();
        let (_, held, _) = store.get_or_create_at(None, start).await;

        let evicted = store.evict_idle_at(start + IDLE * 2).await;
        assert_eq!(evicted, 0);
        drop(held);
        assert_eq!(store.evict_idle_at(start + IDLE * 2).await, 1);
    }
}
