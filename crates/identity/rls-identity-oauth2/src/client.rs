//! HTTP client for the provider's token and userinfo endpoints.

use crate::config::ProviderConfig;
use crate::error::{FlowError, FlowResult};
use crate::types::{TokenExchangeResult, TokenRequest};
use reqwest::Client;
use rls_identity_core::UserIdentity;
use std::time::Duration;
use tracing::{debug, error, info};

/// Client for the two server-side provider calls of one login attempt.
#[derive(Clone)]
pub struct OAuth2Client {
    http_client: Client,
}

impl OAuth2Client {
    pub fn new(http_timeout_seconds: u64) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(http_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client }
    }

    /// Exchange the single-use authorization code for an access token. A
    /// non-success status or a response without an `access_token` fails the
    /// attempt; it is not retried because a retry would fail identically.
    pub async fn exchange_code(
        &self,
        config: &ProviderConfig,
        code: &str,
    ) -> FlowResult<TokenExchangeResult> {
        let payload = TokenRequest {
            grant_type: "authorization_code",
            client_id: &config.client_id,
            client_secret: &config.client_secret,
            code,
            redirect_uri: &config.redirect_uri,
            audience: config.audience.as_deref(),
        };

        let response = self
            .http_client
            .post(config.token_endpoint())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("token exchange failed: {}", error_text);
            return Err(FlowError::Exchange(error_text));
        }

        let token: TokenExchangeResult = response
            .json()
            .await
            .map_err(|e| FlowError::Exchange(format!("malformed token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(FlowError::Exchange(
                "token response did not contain an access token".to_string(),
            ));
        }

        info!("exchanged authorization code for an access token");
        Ok(token)
    }

    /// Fetch the user's profile with the freshly issued access token. The
    /// token is dropped by the caller right after this call.
    pub async fn fetch_userinfo(
        &self,
        config: &ProviderConfig,
        access_token: &str,
    ) -> FlowResult<UserIdentity> {
        let response = self
            .http_client
            .get(config.userinfo_endpoint())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("userinfo request failed: {}", error_text);
            return Err(FlowError::Exchange(error_text));
        }

        let identity: UserIdentity = response
            .json()
            .await
            .map_err(|e| FlowError::Exchange(format!("malformed userinfo response: {e}")))?;

        debug!("retrieved profile for subject {}", identity.subject);
        Ok(identity)
    }
}
