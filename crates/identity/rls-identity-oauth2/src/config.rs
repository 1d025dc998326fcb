//! Provider configuration, loaded from a TOML file or the environment.

use crate::error::{FlowError, FlowResult};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Connection settings for the identity provider. Immutable once loaded;
/// endpoint URLs are derived from the domain.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub audience: Option<String>,
}

// The client secret must never reach logs, so Debug is written by hand.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    auth: ProviderConfig,
}

impl ProviderConfig {
    /// Load configuration from `path` if it exists, otherwise from the
    /// `AUTH_*` environment variables. A missing domain fails closed.
    pub fn load(path: Option<&Path>) -> FlowResult<Self> {
        let config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::from_env(),
        };

        if config.domain.trim().is_empty() {
            return Err(FlowError::Configuration(
                "identity provider domain is not configured".to_string(),
            ));
        }

        Ok(config)
    }

    /// Parse the nested `[auth]` table of a TOML file.
    pub fn from_file(path: &Path) -> FlowResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        let parsed: ConfigFile = toml::from_str(&raw).map_err(|e| {
            FlowError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;

        Ok(parsed.auth)
    }

    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            domain: var("AUTH_DOMAIN").unwrap_or_default(),
            client_id: var("AUTH_CLIENT_ID").unwrap_or_default(),
            client_secret: var("AUTH_CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: var("AUTH_REDIRECT_URI").unwrap_or_default(),
            audience: var("AUTH_AUDIENCE").filter(|v| !v.is_empty()),
        }
    }

    // A bare domain gets an https scheme; an explicit scheme is kept so local
    // non-TLS providers remain reachable.
    fn issuer_base(&self) -> String {
        let domain = self.domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.issuer_base())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.issuer_base())
    }

    pub fn userinfo_endpoint(&self) -> String {
        format!("{}/userinfo", self.issuer_base())
    }

    pub fn logout_endpoint(&self) -> String {
        format!("{}/v2/logout", self.issuer_base())
    }
}

/// Development-only escape hatch: `AUTH_DISABLE=1` skips authentication
/// entirely. Never default-on.
pub fn auth_disabled() -> bool {
    std::env::var("AUTH_DISABLE").map(|v| v == "1").unwrap_or(false)
}
