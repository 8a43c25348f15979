//! Login sessions and CSRF token bookkeeping.

use dashmap::{DashMap, DashSet};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "gateway_sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
/// Cookie set by the login form before a session exists.
pub const LOGIN_CSRF_COOKIE: &str = "csrfToken";
pub const CSRF_HEADER: &str = "x-csrftoken";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub username: String,
    pub csrf_token: String,
}

/// In-memory session and CSRF bookkeeping.
///
/// Nothing here expires. Sessions live until logout and recorded CSRF tokens
/// are kept for the lifetime of the process.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    local_csrf: Arc<DashSet<String>>,
    /// `csrftoken` values the upstream handed out itself.
    downstream_csrf: Arc<DashSet<String>>,
}

pub fn new_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str) -> Session {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            csrf_token: new_csrf_token(),
        };

        self.local_csrf.insert(session.csrf_token.clone());
        self.sessions
            .insert(session.session_id.clone(), session.clone());

        tracing::info!(username = %username, "Session created");
        session
    }

    pub fn username_for(&self, session_id: &str) -> Option<String> {
        self.sessions.get(session_id).map(|s| s.username.clone())
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        let (_, session) = self.sessions.remove(session_id)?;
        self.local_csrf.remove(&session.csrf_token);
        Some(session)
    }

    /// Whether the token belongs to a live local session.
    pub fn is_local_csrf(&self, token: &str) -> bool {
        self.local_csrf.contains(token)
    }

    pub fn remember_downstream_csrf(&self, token: &str) {
        if self.downstream_csrf.insert(token.to_string()) {
            tracing::debug!("Recorded upstream csrftoken");
        }
    }

    pub fn is_downstream_csrf(&self, token: &str) -> bool {
        self.downstream_csrf.contains(token)
    }
}
