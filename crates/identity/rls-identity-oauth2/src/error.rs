//! Login-flow error types.

use rls_identity_core::AuthError;
use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Fatal at startup, never retried.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// State mismatch on the callback. The attempt is abandoned before any
    /// provider call.
    #[error("state mismatch, possible cross-site request forgery")]
    CsrfState,

    /// Token exchange or profile fetch rejected by the provider. The code is
    /// single-use, so the attempt is not retried.
    #[error("authorization exchange failed: {0}")]
    Exchange(String),

    /// Transport failure reaching the provider. The user may re-initiate
    /// login with a fresh code.
    #[error("identity provider unreachable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<FlowError> for AuthError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Configuration(message) => AuthError::Configuration(message),
            FlowError::CsrfState => AuthError::CsrfState,
            FlowError::Exchange(message) => AuthError::Exchange(message),
            FlowError::UpstreamUnavailable(e) => AuthError::UpstreamUnavailable(e.to_string()),
            FlowError::Url(e) => AuthError::Configuration(e.to_string()),
            FlowError::Serialization(e) => AuthError::Serialization(e),
        }
    }
}
