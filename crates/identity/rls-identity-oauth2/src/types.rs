//! Wire types for the provider's authorize and token endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters serialized into the authorize redirect URL. Exists only long
/// enough to be turned into that URL.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest<'a> {
    pub response_type: &'static str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub state: &'a str,
}

/// JSON body POSTed to the token endpoint.
#[derive(Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<&'a str>,
}

/// Successful token-endpoint response. The access token is an opaque bearer
/// credential consumed by the profile fetch and then dropped; it is never
/// persisted.
#[derive(Clone, Deserialize)]
pub struct TokenExchangeResult {
    pub access_token: String,
}

impl fmt::Debug for TokenExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeResult")
            .field("access_token", &"[redacted]")
            .finish()
    }
}
