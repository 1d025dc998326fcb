//! Session-bound identity caching with idempotent authentication.

use rls_identity_core::{AuthResult, Authenticator, CallbackParams, UserIdentity};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Holds at most one [`UserIdentity`] per session. Once bound, an identity is
/// stable for the life of the session unless the user explicitly logs out.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, UserIdentity>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn identity(&self, session_id: &SessionId) -> Option<UserIdentity> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    pub async fn bind(&self, session_id: SessionId, identity: UserIdentity) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id, identity);
    }

    pub async fn remove(&self, session_id: &SessionId) -> Option<UserIdentity> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds the result of one authentication attempt onto a session, exactly
/// once. Repeated requests for an authenticated session short-circuit without
/// touching the authenticator, so a spent authorization code is never
/// re-exchanged.
#[derive(Clone)]
pub struct SessionBinder {
    store: SessionStore,
    auth_disabled: bool,
}

impl SessionBinder {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            auth_disabled: false,
        }
    }

    /// Development-only escape hatch: skip authentication and hand out empty
    /// identities. Never enable this by default.
    pub fn with_auth_disabled(mut self, disabled: bool) -> Self {
        self.auth_disabled = disabled;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Return the session's identity, authenticating at most once. Errors
    /// from the authenticator propagate and leave the session unbound.
    pub async fn ensure_authenticated(
        &self,
        session_id: SessionId,
        params: &CallbackParams,
        authenticator: &dyn Authenticator,
    ) -> AuthResult<UserIdentity> {
        if self.auth_disabled {
            debug!("authentication disabled, returning an empty identity");
            return Ok(UserIdentity::empty());
        }

        if let Some(identity) = self.store.identity(&session_id).await {
            debug!("session {} already authenticated", session_id);
            return Ok(identity);
        }

        let identity = authenticator.authenticate(params).await?;
        self.store.bind(session_id, identity.clone()).await;
        info!("bound identity to session {}", session_id);

        Ok(identity)
    }

    /// Forget the session's identity. Called on explicit logout only.
    pub async fn logout(&self, session_id: &SessionId) -> Option<UserIdentity> {
        self.store.remove(session_id).await
    }
}
