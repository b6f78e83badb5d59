//! Session access for the admission guard.
//!
//! The session store is owned by the identity layer; the guard only reads it.
//! Bearer tokens are kept as `SecretString` and must never be logged.

use secrecy::SecretString;
use std::sync::{PoisonError, RwLock};

/// Authenticated identity and the bearer token presented to the oracle.
#[derive(Clone)]
pub struct Session {
    pub subject_id: String,
    pub bearer_token: SecretString,
    pub is_authenticated: bool,
}

impl Session {
    #[must_use]
    pub fn new(subject_id: impl Into<String>, bearer_token: SecretString) -> Self {
        Self {
            subject_id: subject_id.into(),
            bearer_token,
            is_authenticated: true,
        }
    }

    /// A session only counts when it is still flagged authenticated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_authenticated
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("subject_id", &self.subject_id)
            .field("bearer_token", &"***")
            .field("is_authenticated", &self.is_authenticated)
            .finish()
    }
}

/// "Get current session" from the identity collaborator.
pub trait SessionStore: Send + Sync {
    fn current(&self) -> Option<Session>;

    /// Returns the session only when it is active.
    fn active(&self) -> Option<Session> {
        self.current().filter(Session::is_active)
    }
}

/// Process-local session store, used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }

    pub fn sign_in(&self, session: Session) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn sign_out(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SessionStore for MemorySessionStore {
    fn current(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
