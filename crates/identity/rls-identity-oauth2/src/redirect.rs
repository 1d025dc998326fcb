//! Authorize-URL construction for the login redirect.

use crate::config::ProviderConfig;
use crate::error::FlowResult;
use crate::types::AuthorizationRequest;
use tracing::debug;
use url::Url;

/// Scopes requested on every login.
pub const LOGIN_SCOPE: &str = "openid profile email";

/// A redirect target the client must navigate to. The navigation replaces the
/// current document so the authorize URL never enters browser history.
#[derive(Debug, Clone)]
pub struct RedirectInstruction {
    url: Url,
}

impl RedirectInstruction {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Render as a document-level replace script (not a normal link).
    pub fn into_replace_script(self) -> String {
        format!(
            "<script>window.location.replace(\"{}\");</script>",
            self.url
        )
    }
}

/// Deterministically build the provider authorize URL for one login attempt.
/// No network call is made here.
pub fn login_redirect(config: &ProviderConfig, state: &str) -> FlowResult<RedirectInstruction> {
    let request = AuthorizationRequest {
        response_type: "code",
        client_id: &config.client_id,
        redirect_uri: &config.redirect_uri,
        scope: LOGIN_SCOPE,
        state,
    };

    let mut url = Url::parse(&config.authorize_endpoint())?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("client_id", request.client_id);
        params.append_pair("response_type", request.response_type);
        params.append_pair("redirect_uri", request.redirect_uri);
        params.append_pair("scope", request.scope);
        params.append_pair("state", request.state);
    }

    debug!("built authorize redirect for client {}", config.client_id);

    Ok(RedirectInstruction { url })
}
