//! Core identity types and traits shared by the login-flow crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("state mismatch, possible cross-site request forgery")]
    CsrfState,

    #[error("authorization exchange failed: {0}")]
    Exchange(String),

    #[error("identity provider unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Profile claims returned by the provider's userinfo endpoint, as bound to a
/// session. Read-only to the downstream application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(rename = "sub", default)]
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "name", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl UserIdentity {
    /// The identity handed out when authentication is disabled.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.subject.is_empty() || self.email.is_some()
    }

    /// Look up a claim that has no dedicated field.
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }
}

/// Query parameters delivered to the redirect URI by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn is_callback(&self) -> bool {
        self.code.is_some()
    }
}

/// Seam between the session layer and the concrete login flow. A session
/// binder calls this at most once per session.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, params: &CallbackParams) -> AuthResult<UserIdentity>;
}
