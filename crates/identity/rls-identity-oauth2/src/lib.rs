//! Browser-based OAuth2 Authorization Code login/logout flow.
//!
//! This crate drives one authentication attempt per incoming request: an
//! unauthenticated request is redirected to the provider's login page, the
//! callback is checked for CSRF state, the single-use code is exchanged for an
//! access token, and the user's profile is fetched server-side. The provider's
//! endpoints are treated as black-box HTTP APIs derived from its domain.

mod client;
mod config;
mod error;
mod flow;
mod logout;
mod redirect;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use client::OAuth2Client;
pub use config::{ProviderConfig, auth_disabled};
pub use error::{FlowError, FlowResult};
pub use flow::{FlowDirective, LoginFlow};
pub use logout::{LogoutInstruction, logout_instruction};
pub use redirect::{LOGIN_SCOPE, RedirectInstruction, login_redirect};
pub use state::{
    InMemoryStateStore, LoginAttempt, StateCheck, StateStore, generate_state_token, verify,
};
pub use types::{AuthorizationRequest, TokenExchangeResult};

// Re-export common types for convenience
pub use rls_identity_core::{AuthError, Authenticator, CallbackParams, UserIdentity};
