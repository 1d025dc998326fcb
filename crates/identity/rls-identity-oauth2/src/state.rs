//! CSRF state tokens, scoped per login attempt.

use crate::error::{FlowError, FlowResult};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, thread_rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Generate an unguessable, URL-safe state token (32 random bytes).
pub fn generate_state_token() -> String {
    let mut rng = thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.r#gen::<u8>()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// True iff both values are present, non-empty, and equal.
pub fn verify(expected: Option<&str>, received: Option<&str>) -> bool {
    match (expected, received) {
        (Some(expected), Some(received)) => !expected.is_empty() && expected == received,
        _ => false,
    }
}

/// Outcome of comparing the expected state against an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCheck {
    /// No state was supplied: a fresh, non-callback request. The redirect
    /// path may proceed without comparison.
    Fresh,
    Valid,
    /// Mismatched or untrusted state. Always surfaced, never ignored.
    Mismatch,
}

impl StateCheck {
    pub fn evaluate(expected: Option<&str>, received: Option<&str>) -> Self {
        match received {
            None => StateCheck::Fresh,
            Some(received) => {
                if verify(expected, Some(received)) {
                    StateCheck::Valid
                } else {
                    StateCheck::Mismatch
                }
            }
        }
    }
}

/// One in-flight login attempt, keyed by its state token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(ttl_seconds: u64) -> Self {
        let created_at = Utc::now();
        let expires_at = created_at + Duration::seconds(ttl_seconds as i64);

        Self {
            state: generate_state_token(),
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Server-side storage for in-flight login attempts.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store a new attempt.
    async fn store(&self, attempt: LoginAttempt) -> FlowResult<()>;

    /// Retrieve and remove an attempt by its state token. Unknown or expired
    /// tokens are a CSRF failure.
    async fn consume(&self, state: &str) -> FlowResult<LoginAttempt>;

    /// Drop attempts whose TTL has elapsed, returning how many were removed.
    async fn cleanup_expired(&self) -> FlowResult<usize>;
}

/// In-memory implementation of [`StateStore`].
pub struct InMemoryStateStore {
    attempts: Arc<RwLock<HashMap<String, LoginAttempt>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn store(&self, attempt: LoginAttempt) -> FlowResult<()> {
        let mut attempts = self.attempts.write().await;
        attempts.insert(attempt.state.clone(), attempt);
        Ok(())
    }

    async fn consume(&self, state: &str) -> FlowResult<LoginAttempt> {
        let mut attempts = self.attempts.write().await;

        let attempt = attempts.remove(state).ok_or(FlowError::CsrfState)?;

        if attempt.is_expired() {
            return Err(FlowError::CsrfState);
        }

        Ok(attempt)
    }

    async fn cleanup_expired(&self) -> FlowResult<usize> {
        let mut attempts = self.attempts.write().await;
        let now = Utc::now();

        let expired_keys: Vec<String> = attempts
            .iter()
            .filter(|(_, attempt)| now > attempt.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            attempts.remove(&key);
        }

        Ok(count)
    }
}
