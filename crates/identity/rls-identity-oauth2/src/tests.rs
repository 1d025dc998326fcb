//! Integration and security tests for the login flow.

#[cfg(test)]
mod integration_tests {
    use crate::flow::FlowDirective;
    use crate::{
        CallbackParams, FlowError, InMemoryStateStore, LoginFlow, ProviderConfig, StateStore,
    };
    use rls_identity_core::Authenticator;
    use std::sync::Arc;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_config(mock_server: &MockServer) -> Arc<ProviderConfig> {
        Arc::new(ProviderConfig {
            // The scheme is kept, so the flow talks to the mock server.
            domain: mock_server.uri(),
            client_id: "mock_client_id".to_string(),
            client_secret: "mock_secret".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            audience: None,
        })
    }

    fn flow_against(mock_server: &MockServer) -> (LoginFlow, Arc<InMemoryStateStore>) {
        let state_store = Arc::new(InMemoryStateStore::new());
        let flow = LoginFlow::new(mock_config(mock_server), state_store.clone());
        (flow, state_store)
    }

    /// Begin a login and pull the state token back out of the redirect URL.
    async fn begin_and_extract_state(flow: &LoginFlow) -> String {
        let instruction = flow.begin_login().await.unwrap();
        let url = Url::parse(instruction.as_str()).unwrap();
        url.query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("redirect URL carries a state parameter")
    }

    #[tokio::test]
    async fn full_login_flow_yields_the_profile_identity() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(serde_json::json!({
                "grant_type": "authorization_code",
                "client_id": "mock_client_id",
                "code": "mock_auth_code",
                "redirect_uri": "http://localhost:3000/"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mock_access_token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("Authorization", "Bearer mock_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "auth0|12345",
                "email": "a@b.com",
                "email_verified": true,
                "name": "Test User"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some(state),
            ..Default::default()
        };

        let directive = flow.drive(&params).await.unwrap();
        let identity = match directive {
            FlowDirective::Authenticated(identity) => identity,
            other => panic!("expected an authenticated directive, got {other:?}"),
        };

        assert_eq!(identity.subject, "auth0|12345");
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Test User"));
    }

    #[tokio::test]
    async fn requests_without_a_code_are_redirected_to_login() {
        let mock_server = MockServer::start().await;
        let (flow, state_store) = flow_against(&mock_server);

        let directive = flow.drive(&CallbackParams::default()).await.unwrap();

        let instruction = match directive {
            FlowDirective::RedirectToLogin(instruction) => instruction,
            other => panic!("expected a login redirect, got {other:?}"),
        };

        let url = Url::parse(instruction.as_str()).unwrap();
        assert_eq!(url.path(), "/authorize");

        // The attempt was stored server-side and is consumable exactly once.
        let state = url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert!(state_store.consume(&state).await.is_ok());
    }

    #[tokio::test]
    async fn mismatched_state_never_reaches_the_token_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);
        let _ = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some("forged-state-value".to_string()),
            ..Default::default()
        };

        let result = flow.drive(&params).await;
        assert!(matches!(result, Err(FlowError::CsrfState)));

        mock_server.verify().await;
    }

    #[tokio::test]
    async fn callback_without_state_is_rejected_before_any_provider_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            ..Default::default()
        };

        let result = flow.drive(&params).await;
        assert!(matches!(result, Err(FlowError::CsrfState)));

        mock_server.verify().await;
    }

    #[tokio::test]
    async fn provider_reported_callback_error_skips_the_exchange() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some(state),
            error: Some("access_denied".to_string()),
            error_description: Some("user cancelled".to_string()),
        };

        let result = flow.drive(&params).await;
        match result {
            Err(FlowError::Exchange(message)) => {
                assert!(message.contains("access_denied"));
                assert!(message.contains("user cancelled"));
            }
            other => panic!("expected an exchange error, got {other:?}"),
        }

        mock_server.verify().await;
    }

    #[tokio::test]
    async fn rejected_token_exchange_fails_the_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "the authorization code is spent"
            })))
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("spent_code".to_string()),
            state: Some(state),
            ..Default::default()
        };

        let result = flow.drive(&params).await;
        match result {
            Err(FlowError::Exchange(message)) => assert!(message.contains("invalid_grant")),
            other => panic!("expected an exchange error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_response_without_access_token_fails_the_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "token_type": "Bearer" })),
            )
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some(state),
            ..Default::default()
        };

        let result = flow.drive(&params).await;
        assert!(matches!(result, Err(FlowError::Exchange(_))));
    }

    #[tokio::test]
    async fn failed_userinfo_fetch_fails_the_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mock_access_token"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let (flow, _) = flow_against(&mock_server);
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some(state),
            ..Default::default()
        };

        let result = flow.drive(&params).await;
        assert!(matches!(result, Err(FlowError::Exchange(_))));
    }

    #[tokio::test]
    async fn unreachable_provider_is_reported_as_upstream_unavailable() {
        // Nothing listens on this port.
        let config = Arc::new(ProviderConfig {
            domain: "http://127.0.0.1:9".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            audience: None,
        });

        let state_store = Arc::new(InMemoryStateStore::new());
        let flow = LoginFlow::new(config, state_store).with_http_timeout(2);
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some(state),
            ..Default::default()
        };

        let result = flow.drive(&params).await;
        assert!(matches!(result, Err(FlowError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn configured_audience_is_forwarded_to_the_token_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(serde_json::json!({
                "audience": "https://api.example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mock_access_token"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "auth0|12345",
                "email": "a@b.com"
            })))
            .mount(&mock_server)
            .await;

        let config = Arc::new(ProviderConfig {
            domain: mock_server.uri(),
            client_id: "mock_client_id".to_string(),
            client_secret: "mock_secret".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            audience: Some("https://api.example.com".to_string()),
        });

        let flow = LoginFlow::new(config, Arc::new(InMemoryStateStore::new()));
        let state = begin_and_extract_state(&flow).await;

        let params = CallbackParams {
            code: Some("mock_auth_code".to_string()),
            state: Some(state),
            ..Default::default()
        };

        let identity = flow.complete_login("mock_auth_code", &params).await.unwrap();
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));

        mock_server.verify().await;
    }

    #[tokio::test]
    async fn concurrent_attempts_get_unique_states() {
        use tokio::task;

        let mock_server = MockServer::start().await;
        let (flow, _) = flow_against(&mock_server);

        let mut handles = vec![];
        for _ in 0..10 {
            let flow = flow.clone();
            handles.push(task::spawn(async move {
                flow.begin_login().await.map(|i| {
                    Url::parse(i.as_str())
                        .unwrap()
                        .query_pairs()
                        .find(|(key, _)| key == "state")
                        .map(|(_, value)| value.into_owned())
                        .unwrap()
                })
            }));
        }

        let mut states = vec![];
        for handle in handles {
            states.push(handle.await.unwrap().unwrap());
        }

        let unique: std::collections::HashSet<_> = states.iter().collect();
        assert_eq!(unique.len(), states.len());
    }

    #[tokio::test]
    async fn authenticator_rejects_requests_without_a_code() {
        let mock_server = MockServer::start().await;
        let (flow, _) = flow_against(&mock_server);

        let result = flow.authenticate(&CallbackParams::default()).await;
        assert!(matches!(
            result,
            Err(rls_identity_core::AuthError::Exchange(_))
        ));
    }
}
