//! The authentication state machine for one login attempt.

use crate::client::OAuth2Client;
use crate::config::ProviderConfig;
use crate::error::{FlowError, FlowResult};
use crate::redirect::{RedirectInstruction, login_redirect};
use crate::state::{LoginAttempt, StateCheck, StateStore};
use async_trait::async_trait;
use rls_identity_core::{AuthError, AuthResult, Authenticator, CallbackParams, UserIdentity};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_STATE_TTL_SECONDS: u64 = 600;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// What the request handler should do next for an unauthenticated request.
#[derive(Debug)]
pub enum FlowDirective {
    /// No callback code present: send the browser to the provider.
    RedirectToLogin(RedirectInstruction),
    /// Callback completed; the identity is ready to bind to the session.
    Authenticated(UserIdentity),
}

/// Drives one authentication attempt per incoming request. Within an attempt
/// the state check completes strictly before the token exchange, and the
/// exchange strictly before the profile fetch.
#[derive(Clone)]
pub struct LoginFlow {
    config: Arc<ProviderConfig>,
    client: OAuth2Client,
    state_store: Arc<dyn StateStore>,
    state_ttl_seconds: u64,
}

impl LoginFlow {
    pub fn new(config: Arc<ProviderConfig>, state_store: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            client: OAuth2Client::new(DEFAULT_HTTP_TIMEOUT_SECONDS),
            state_store,
            state_ttl_seconds: DEFAULT_STATE_TTL_SECONDS,
        }
    }

    pub fn with_state_ttl(mut self, seconds: u64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.client = OAuth2Client::new(seconds);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Route a request: no `code` means a fresh login redirect, a `code`
    /// means completing the callback. The two paths are mutually exclusive.
    pub async fn drive(&self, params: &CallbackParams) -> FlowResult<FlowDirective> {
        match params.code.as_deref() {
            None => {
                let instruction = self.begin_login().await?;
                Ok(FlowDirective::RedirectToLogin(instruction))
            }
            Some(code) => {
                let identity = self.complete_login(code, params).await?;
                Ok(FlowDirective::Authenticated(identity))
            }
        }
    }

    /// Open a new login attempt: store its state token and build the
    /// authorize redirect.
    pub async fn begin_login(&self) -> FlowResult<RedirectInstruction> {
        let attempt = LoginAttempt::new(self.state_ttl_seconds);
        let state = attempt.state.clone();
        self.state_store.store(attempt).await?;

        let instruction = login_redirect(&self.config, &state)?;
        info!("redirecting browser to the provider login page");
        Ok(instruction)
    }

    /// Complete a callback: verify CSRF state, then exchange the code, then
    /// fetch the profile. A state failure stops the attempt before any
    /// provider call is made.
    pub async fn complete_login(
        &self,
        code: &str,
        params: &CallbackParams,
    ) -> FlowResult<UserIdentity> {
        let received = params.state.as_deref();

        let attempt = match received {
            Some(state) => self.state_store.consume(state).await?,
            None => {
                warn!("callback carried a code but no state parameter");
                return Err(FlowError::CsrfState);
            }
        };

        if StateCheck::evaluate(Some(attempt.state.as_str()), received) != StateCheck::Valid {
            warn!("callback state did not match the stored login attempt");
            return Err(FlowError::CsrfState);
        }

        // The provider can report a login failure on the callback itself.
        if let Some(error) = &params.error {
            let description = params
                .error_description
                .as_deref()
                .unwrap_or("no description");
            return Err(FlowError::Exchange(format!("{error}: {description}")));
        }

        let token = self.client.exchange_code(&self.config, code).await?;
        let identity = self
            .client
            .fetch_userinfo(&self.config, &token.access_token)
            .await?;

        info!("completed login for subject {}", identity.subject);
        Ok(identity)
    }
}

#[async_trait]
impl Authenticator for LoginFlow {
    async fn authenticate(&self, params: &CallbackParams) -> AuthResult<UserIdentity> {
        let code = params.code.as_deref().ok_or_else(|| {
            AuthError::Exchange("authorization code missing from callback".to_string())
        })?;

        self.complete_login(code, params).await.map_err(AuthError::from)
    }
}
