//! Token refresh and PIN exchange against the mock OAuth endpoint.

use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use media_sync_config::CredentialStore;
use media_sync_sources::{SourceError, TrackingService, TraktClient};

use crate::common;

fn token_body(access: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 7776000,
        "refresh_token": "rotated-refresh-token",
        "scope": "public",
        "created_at": 1487889741
    })
}

#[tokio::test]
async fn test_refresh_replaces_access_token() {
    let (server, mut client) = common::setup_trakt_mock().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": common::REFRESH_TOKEN
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh-token")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sync/collection/movies"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    client.refresh_access_token().await.expect("refresh failed");

    let movies = client.collection_movies().await.expect("fetch with fresh token failed");
    assert!(movies.is_empty());
}

#[tokio::test]
async fn test_refresh_failure_is_token_refresh_error() {
    let (server, mut client) = common::setup_trakt_mock().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.refresh_access_token().await.unwrap_err();
    assert!(matches!(err, SourceError::TokenRefresh(_)));
}

#[tokio::test]
async fn test_refresh_without_refresh_token() {
    let server = wiremock::MockServer::start().await;
    let mut client = TraktClient::new("id".to_string(), "secret".to_string(), Duration::from_secs(5))
        .expect("client")
        .with_base_url(server.uri())
        .with_tokens("only-access", None);

    let err = client.refresh_access_token().await.unwrap_err();
    assert!(matches!(err, SourceError::TokenRefresh(_)));
}

#[tokio::test]
async fn test_exchange_code_persists_tokens() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({
            "grant_type": "authorization_code",
            "code": "PIN1234"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("pin-token")))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let creds_path = dir.path().join("credentials.toml");
    let mut client = TraktClient::new("id".to_string(), "secret".to_string(), Duration::from_secs(5))
        .expect("client")
        .with_base_url(server.uri())
        .with_credential_store(CredentialStore::new(creds_path.clone()));
    assert!(!client.is_authenticated());

    client.exchange_code(" PIN1234 ").await.expect("exchange failed");
    assert!(client.is_authenticated());

    let mut store = CredentialStore::new(creds_path);
    store.load().unwrap();
    assert_eq!(store.get_trakt_access_token(), Some(&"pin-token".to_string()));
    assert_eq!(store.get_trakt_refresh_token(), Some(&"rotated-refresh-token".to_string()));
    assert!(store.get_trakt_token_expires().is_some());
}
