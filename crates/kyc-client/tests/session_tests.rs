//! Session bootstrap against a mock KYC Shield API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kyc_client::{routes, ApiClient, ClientConfig, ClientError, RefreshProvider, SessionManager};

async fn setup() -> (MockServer, Arc<ApiClient>, SessionManager) {
    let server = MockServer::start().await;
    let api = Arc::new(ApiClient::new(ClientConfig::with_base_url(server.uri())).unwrap());
    let session = SessionManager::new(Arc::clone(&api) as Arc<dyn RefreshProvider>);
    (server, api, session)
}

#[tokio::test]
async fn test_bootstrap_restores_session() {
    let (server, _api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(session.is_bootstrapping());
    session.bootstrap().await;

    assert_eq!(session.access_token().as_deref(), Some("tok-1"));
    assert!(!session.is_bootstrapping());
}

#[tokio::test]
async fn test_bootstrap_retries_once_after_rejection() {
    let (server, _api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "no cookie"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
        .expect(1)
        .mount(&server)
        .await;

    session.bootstrap().await;

    assert_eq!(session.access_token().as_deref(), Some("tok-2"));
    assert!(!session.is_bootstrapping());
}

#[tokio::test]
async fn test_bootstrap_gives_up_after_second_rejection() {
    let (server, _api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    session.bootstrap().await;

    assert!(session.access_token().is_none());
    assert!(!session.is_bootstrapping());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let (server, _api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    session.bootstrap().await;

    assert!(!session.is_authenticated());
    assert!(!session.is_bootstrapping());
}

#[tokio::test]
async fn test_forbidden_refresh_is_not_retried() {
    let (server, api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Account disabled"})))
        .mount(&server)
        .await;

    session.bootstrap().await;

    assert!(!session.is_authenticated());
    assert!(!session.is_bootstrapping());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // Surfaced as a server error, not as a rejected cookie.
    let err = api.refresh_token().await.unwrap_err();
    assert!(!err.is_unauthorized());
    assert_eq!(err.http_status(), Some(403));
}

#[tokio::test]
async fn test_concurrent_bootstraps_share_one_exchange() {
    let (server, _api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "shared"}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    tokio::join!(session.bootstrap(), session.bootstrap(), session.bootstrap());

    assert_eq!(session.access_token().as_deref(), Some("shared"));
}

#[tokio::test]
async fn test_refresh_cookie_from_login_is_sent() {
    let (server, api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_LOGIN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refresh_token=cookie-1; Path=/; HttpOnly")
                .set_body_json(json!({"access_token": "login-tok"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .and(header("cookie", "refresh_token=cookie-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "refreshed"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = api.login("ana@example.com", "hunter22").await.unwrap();
    assert_eq!(response.token(), Some("login-tok"));

    // A fresh session on the same client restores itself from the cookie.
    session.bootstrap().await;
    assert_eq!(session.access_token().as_deref(), Some("refreshed"));
}

#[tokio::test]
async fn test_login_rejection_message() {
    let (server, api, _session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_LOGIN))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "bad password"})))
        .mount(&server)
        .await;

    let err = api.login("ana@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(ref m) if m == "Invalid credentials"));
}

#[tokio::test]
async fn test_login_validation_skips_network() {
    let (server, api, _session) = setup().await;

    let err = api.login("", "secret").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_login_during_refresh_wins() {
    let (server, _api, session) = setup().await;

    Mock::given(method("POST"))
        .and(path(routes::AUTH_REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "stale"}))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;

    let login = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        session.login("fresh");
    };
    tokio::join!(session.bootstrap(), login);

    assert_eq!(session.access_token().as_deref(), Some("fresh"));
    assert!(!session.is_bootstrapping());
}
