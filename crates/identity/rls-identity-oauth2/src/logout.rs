//! Logout-URL construction and the out-of-band client message.

use crate::config::ProviderConfig;
use crate::error::FlowResult;
use tracing::info;
use url::Url;

/// A provider logout target pushed to an already-rendered client. Server-side
/// session state is not cleared here; the provider's logout endpoint and the
/// client navigating away handle the rest.
#[derive(Debug, Clone)]
pub struct LogoutInstruction {
    url: Url,
}

impl LogoutInstruction {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The payload delivered outside a normal response body, e.g. over a
    /// server-push channel. The client replaces its location with `url`.
    pub fn into_message(self) -> serde_json::Value {
        serde_json::json!({ "url": self.url.as_str() })
    }
}

/// Build `https://{domain}/v2/logout?client_id=...&returnTo=...` with the
/// configured redirect URI percent-encoded as the return target.
pub fn logout_instruction(config: &ProviderConfig) -> FlowResult<LogoutInstruction> {
    let mut url = Url::parse(&config.logout_endpoint())?;

    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("returnTo", &config.redirect_uri);

    info!("dispatching provider logout for client {}", config.client_id);

    Ok(LogoutInstruction { url })
}
