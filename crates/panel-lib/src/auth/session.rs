// ============================
// proxy-panel-lib/src/auth/session.rs
// ============================
//! Session storage with deadline based expiry.
//!
//! Sessions live only in memory. A session with empty `data` is a public
//! (pre-login) session that exists so the login form can carry a CSRF
//! token; any other value is the identity of an authenticated operator.
use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::token_generator::generate_session_id;
use crate::error::AppError;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};
use crate::sweeper::Sweep;

/// Session information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Empty for public sessions, the operator's username otherwise
    pub data: String,
    pub expires_at: Instant,
}

impl Session {
    /// Whether this session belongs to a logged-in operator
    pub fn is_authenticated(&self) -> bool {
        !self.data.is_empty()
    }

    /// The operator behind an authenticated session
    pub fn identity(&self) -> Option<&str> {
        self.is_authenticated().then_some(self.data.as_str())
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Session manager for handling authentication sessions
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionManager {
    /// Create a new session manager whose sessions live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        SessionManager {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace the session stored under `id`
    pub async fn create(&self, id: String, data: String) -> Session {
        let session = Session {
            id: id.clone(),
            data,
            expires_at: Instant::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session.clone());

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        session
    }

    /// Create a public session under a fresh random id
    pub async fn create_public(&self) -> Result<Session, AppError> {
        let id = generate_session_id()?;
        Ok(self.create(id, String::new()).await)
    }

    /// Create an authenticated session for `identity` under a fresh random id
    pub async fn create_authenticated(&self, identity: &str) -> Result<Session, AppError> {
        let id = generate_session_id()?;
        Ok(self.create(id, identity.to_string()).await)
    }

    /// Look up a live session.
    ///
    /// An expired entry is removed and reported as [`AppError::SessionExpired`];
    /// later lookups of the same id report [`AppError::SessionNotFound`].
    pub async fn get(&self, id: &str) -> Result<Session, AppError> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Err(AppError::SessionNotFound),
                Some(session) if !session.is_expired_at(Instant::now()) => {
                    return Ok(session.clone());
                },
                Some(_) => {},
            }
        }

        // Expired under the read lock; re-check under the write lock since the
        // entry may have been replaced or removed in between.
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            None => Err(AppError::SessionNotFound),
            Some(session) if !session.is_expired_at(Instant::now()) => Ok(session.clone()),
            Some(_) => {
                sessions.remove(id);
                counter!(SESSION_EXPIRED).increment(1);
                gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
                Err(AppError::SessionExpired)
            },
        }
    }

    /// Remove a session
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(id) {
            Some(_) => {
                gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
                Ok(())
            },
            None => Err(AppError::SessionNotFound),
        }
    }

    /// Drop every expired session, returning how many were removed
    pub async fn remove_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before_count = sessions.len();

        sessions.retain(|_, session| !session.is_expired_at(now));

        let after_count = sessions.len();
        let removed = before_count - after_count;

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(after_count as f64);
        }
        removed
    }

    /// Number of stored sessions, expired or not
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Sweep for SessionManager {
    fn name(&self) -> &'static str {
        "sessions"
    }

    async fn sweep(&self) -> usize {
        self.remove_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_session_ttl() {
        let sessions = SessionManager::new(MINUTE);
        let created = sessions.create("abc".into(), "admin".into()).await;
        assert!(created.is_authenticated());

        advance(Duration::from_secs(59)).await;
        let session = sessions.get("abc").await.unwrap();
        assert_eq!(session.identity(), Some("admin"));

        advance(Duration::from_secs(2)).await;
        assert!(matches!(
            sessions.get("abc").await,
            Err(AppError::SessionExpired)
        ));

        advance(Duration::from_secs(1)).await;
        assert!(matches!(
            sessions.get("abc").await,
            Err(AppError::SessionNotFound)
        ));
        assert!(sessions.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_overwrites_and_refreshes() {
        let sessions = SessionManager::new(MINUTE);
        sessions.create("abc".into(), String::new()).await;

        advance(Duration::from_secs(50)).await;
        sessions.create("abc".into(), "admin".into()).await;

        advance(Duration::from_secs(50)).await;
        let session = sessions.get("abc").await.unwrap();
        assert_eq!(session.data, "admin");
        assert_eq!(sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_public_and_authenticated_sessions() {
        let sessions = SessionManager::new(MINUTE);

        let public = sessions.create_public().await.unwrap();
        assert!(!public.is_authenticated());
        assert_eq!(public.identity(), None);

        let private = sessions.create_authenticated("admin").await.unwrap();
        assert_ne!(public.id, private.id);
        assert_eq!(sessions.get(&private.id).await.unwrap().identity(), Some("admin"));
    }

    #[tokio::test]
    async fn test_delete() {
        let sessions = SessionManager::new(MINUTE);
        let session = sessions.create_public().await.unwrap();

        sessions.delete(&session.id).await.unwrap();
        assert!(matches!(
            sessions.delete(&session.id).await,
            Err(AppError::SessionNotFound)
        ));
        assert!(matches!(
            sessions.get(&session.id).await,
            Err(AppError::SessionNotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let sessions = SessionManager::new(MINUTE);
        sessions.create("old".into(), String::new()).await;

        advance(Duration::from_secs(40)).await;
        sessions.create("new".into(), String::new()).await;

        advance(Duration::from_secs(30)).await;
        assert_eq!(sessions.sweep().await, 1);
        assert_eq!(sessions.len().await, 1);
        assert!(sessions.get("new").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_access() {
        let sessions = SessionManager::new(MINUTE);
        let mut tasks = Vec::new();

        for i in 0..32 {
            let sessions = sessions.clone();
            tasks.push(tokio::spawn(async move {
                let id = format!("session-{i}");
                sessions.create(id.clone(), "admin".into()).await;
                let found = sessions.get(&id).await.unwrap();
                assert_eq!(found.id, id);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(sessions.len().await, 32);
    }
}
