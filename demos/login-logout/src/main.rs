//! Login/logout demo: an axum app protected by the provider login flow.
//!
//! `GET /` either redirects the browser to the provider, completes a callback,
//! or renders the signed-in page. `POST /logout` pushes the provider logout
//! URL to the client over the `/events` SSE channel.

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        Html, IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::Stream;
use rls_identity_core::{AuthError, CallbackParams, UserIdentity};
use rls_identity_oauth2::{
    InMemoryStateStore, LoginFlow, ProviderConfig, auth_disabled, logout_instruction,
};
use rls_identity_session::{SessionBinder, SessionId, SessionStore};
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

const SESSION_COOKIE: &str = "rls_session";

#[derive(Clone)]
struct AppState {
    config: Arc<ProviderConfig>,
    flow: Arc<LoginFlow>,
    binder: SessionBinder,
    disabled: bool,
    logout_channels: Arc<RwLock<HashMap<SessionId, mpsc::Sender<serde_json::Value>>>>,
}

fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            value.parse().ok()
        } else {
            None
        }
    })
}

fn with_session_cookie(mut response: Response, session_id: SessionId, set: bool) -> Response {
    if set {
        let value = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

fn signed_in_page(identity: &UserIdentity) -> Html<String> {
    let email = identity.email.as_deref().unwrap_or("unknown");
    let status = if identity.is_authenticated() {
        "Signed in."
    } else {
        "Authentication is disabled."
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login/Logout Demo</title></head>
<body>
    <h2>Login, logout, and protected pages</h2>
    <p id="email">Email: {email}</p>
    <p id="status">{status}</p>
    <button onclick="logout()">Logout</button>
    <script>
        const events = new EventSource("/events");
        events.addEventListener("auth-redirect", (e) => {{
            const message = JSON.parse(e.data);
            window.location.replace(message.url);
        }});
        async function logout() {{
            await fetch("/logout", {{ method: "POST" }});
        }}
    </script>
</body>
</html>
"#
    ))
}

fn error_page(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(format!("<h3>Authentication error: {message}</h3>")),
    )
        .into_response()
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (session_id, is_new_session) = match session_from_headers(&headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    };

    if state.disabled {
        let identity = UserIdentity::empty();
        let response = signed_in_page(&identity).into_response();
        return with_session_cookie(response, session_id, is_new_session);
    }

    // Bound sessions short-circuit: no redirect, no second exchange.
    if let Some(identity) = state.binder.store().identity(&session_id).await {
        let response = signed_in_page(&identity).into_response();
        return with_session_cookie(response, session_id, is_new_session);
    }

    if !params.is_callback() {
        // Fresh request: send the browser to the provider login page via a
        // document replace so the authorize URL stays out of history.
        let response = match state.flow.begin_login().await {
            Ok(instruction) => Html(instruction.into_replace_script()).into_response(),
            Err(e) => {
                error!("failed to begin login: {}", e);
                error_page(&e.to_string())
            }
        };
        return with_session_cookie(response, session_id, is_new_session);
    }

    // Callback: authenticate at most once, then leave the code behind with a
    // clean redirect to the protected page.
    let result = state
        .binder
        .ensure_authenticated(session_id, &params, state.flow.as_ref())
        .await;

    let response = match result {
        Ok(_) => Redirect::to("/").into_response(),
        Err(AuthError::CsrfState) => {
            warn!("rejected callback with invalid state");
            error_page("invalid state (possible CSRF)")
        }
        Err(e) => {
            error!("authentication attempt failed: {}", e);
            error_page(&e.to_string())
        }
    };

    with_session_cookie(response, session_id, is_new_session)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(session_id) = session_from_headers(&headers) else {
        return StatusCode::NO_CONTENT;
    };

    if !state.disabled {
        match logout_instruction(&state.config) {
            Ok(instruction) => {
                let channels = state.logout_channels.read().await;
                if let Some(tx) = channels.get(&session_id) {
                    let _ = tx.send(instruction.into_message()).await;
                }
            }
            Err(e) => error!("failed to build logout instruction: {}", e),
        }
    }

    state.binder.logout(&session_id).await;
    info!("session {} logged out", session_id);
    StatusCode::NO_CONTENT
}

async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = session_from_headers(&headers).unwrap_or_else(Uuid::new_v4);

    let (tx, rx) = mpsc::channel(4);
    state.logout_channels.write().await.insert(session_id, tx);

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let message = rx.recv().await?;
        let event = Event::default().event("auth-redirect").data(message.to_string());
        Some((Ok(event), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let _ = dotenvy::dotenv();

    let disabled = auth_disabled();
    let config_path = std::env::var("AUTH_CONFIG").ok().map(PathBuf::from);

    let config = if disabled {
        warn!("authentication is disabled (AUTH_DISABLE=1), for development only");
        Arc::new(ProviderConfig::from_env())
    } else {
        Arc::new(
            ProviderConfig::load(config_path.as_deref())
                .context("loading provider configuration")?,
        )
    };

    let flow = Arc::new(LoginFlow::new(
        config.clone(),
        Arc::new(InMemoryStateStore::new()),
    ));
    let binder = SessionBinder::new(SessionStore::new()).with_auth_disabled(disabled);

    let app_state = AppState {
        config,
        flow,
        binder,
        disabled,
        logout_channels: Arc::new(RwLock::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/logout", post(logout))
        .route("/events", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let bind_addr = std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;

    info!("server running on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
