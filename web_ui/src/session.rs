use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use er_axum::session::SessionId;
use tokio::sync::RwLock;
use tokio::time::Instant;
use types::FrameInfo;

use crate::handlers::error_response;
use crate::state::AppContext;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Everything the browser session has produced so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub uploaded_files: Vec<PathBuf>,
    pub job_id: Option<String>,
    pub final_video: Option<PathBuf>,
    pub frames: Vec<FrameInfo>,
}

#[derive(Debug)]
struct Entry {
    data: SessionData,
    last_seen: Instant,
}

/// In-memory session table keyed by the `session_id` cookie. Only ids minted
/// here are ever stored. Sessions idle for longer than the TTL are dropped,
/// and everything is lost on restart.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            ttl,
        }
    }

    /// Keeps a live session the store issued, otherwise mints a new one.
    /// Expired sessions are swept out first.
    pub async fn ensure(&self, session_id: Option<String>) -> String {
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < self.ttl);
        if sessions.len() < before {
            tracing::debug!("expired {} idle sessions", before - sessions.len());
        }

        if let Some(session_id) = session_id {
            if let Some(entry) = sessions.get_mut(&session_id) {
                entry.last_seen = Instant::now();
                return session_id;
            }
            tracing::info!(%session_id, "unknown or expired session, issuing a new one");
        }

        let session_id = er_axum::session::new_session_id();
        tracing::info!(%session_id, "new session");
        sessions.insert(
            session_id.clone(),
            Entry {
                data: SessionData::default(),
                last_seen: Instant::now(),
            },
        );

        session_id
    }

    /// True for a live session. Resets its idle timer.
    pub async fn touch(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(entry) if entry.last_seen.elapsed() < self.ttl => {
                entry.last_seen = Instant::now();
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionData> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|entry| entry.last_seen.elapsed() < self.ttl)
            .map(|entry| entry.data.clone())
    }

    /// Applies `f` to a stored session. Unknown ids are ignored.
    pub async fn update<F>(&self, session_id: &str, f: F)
    where
        F: FnOnce(&mut SessionData),
    {
        match self.sessions.write().await.get_mut(session_id) {
            Some(entry) => f(&mut entry.data),
            None => tracing::debug!(%session_id, "update for a session that is gone"),
        }
    }
}

/// A session cookie naming a live session in [`SessionStore`]. Anything else
/// is rejected before a handler can build a path from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession(pub String);

impl FromRequestParts<AppContext> for ActiveSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let not_found = || {
            error_response(
                StatusCode::BAD_REQUEST,
                "Session not found",
                "Reload the page to start a new session.",
            )
        };

        let Ok(SessionId(session_id)) = SessionId::from_request_parts(parts, state).await else {
            return Err(not_found());
        };

        if state.sessions.touch(&session_id).await {
            Ok(Self(session_id))
        } else {
            tracing::warn!(%session_id, "request for an unknown session");
            Err(not_found())
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::SessionStore;

    #[tokio::test]
    async fn test_ensure_keeps_issued_ids() {
        let store = SessionStore::default();

        let fresh = store.ensure(None).await;
        assert_eq!(fresh.len(), 36);
        assert_eq!(store.ensure(Some(fresh.clone())).await, fresh);

        store
            .update(&fresh, |session| {
                session.final_video = Some(PathBuf::from("out.mp4"));
            })
            .await;
        assert_eq!(store.ensure(Some(fresh.clone())).await, fresh);
        assert_eq!(
            store.get(&fresh).await.unwrap().final_video,
            Some(PathBuf::from("out.mp4"))
        );
    }

    #[tokio::test]
    async fn test_client_chosen_ids_are_replaced() {
        let store = SessionStore::default();

        for chosen in ["../escaped", "/tmp", "0192f0c1-7c3a-7d2e-8a4b-0c1d2e3f4a5b"] {
            let issued = store.ensure(Some(chosen.to_string())).await;
            assert_ne!(issued, chosen);
            assert!(store.touch(&issued).await);
            assert!(!store.touch(chosen).await);
        }
    }

    #[tokio::test]
    async fn test_update_ignores_unknown_sessions() {
        let store = SessionStore::default();

        store
            .update("never-issued", |session| {
                session.job_id = Some("job".to_string());
            })
            .await;

        assert!(store.get("never-issued").await.is_none());
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(Duration::ZERO);

        let first = store.ensure(None).await;
        assert!(!store.touch(&first).await);
        assert!(store.get(&first).await.is_none());

        let second = store.ensure(Some(first.clone())).await;
        assert_ne!(second, first);

        let sessions = store.sessions.read().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&second));
    }
}
