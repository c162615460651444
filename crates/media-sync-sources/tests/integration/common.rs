//! Shared helpers: a mock server and a client pointed at it.

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use media_sync_sources::TraktClient;

pub const CLIENT_ID: &str = "test-client-id";
pub const ACCESS_TOKEN: &str = "test-access-token";
pub const REFRESH_TOKEN: &str = "test-refresh-token";

/// Start a mock server and return a client that already holds tokens.
pub async fn setup_trakt_mock() -> (MockServer, TraktClient) {
    let server = MockServer::start().await;
    let client = TraktClient::new(CLIENT_ID.to_string(), "test-secret".to_string(), Duration::from_secs(5))
        .expect("client")
        .with_base_url(server.uri())
        .with_tokens(ACCESS_TOKEN, Some(REFRESH_TOKEN.to_string()));
    (server, client)
}

/// Mount a GET endpoint that only answers correctly authorized requests.
pub async fn mount_get(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(header("Authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .and(header("trakt-api-version", "2"))
        .and(header("trakt-api-key", CLIENT_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a POST endpoint returning a sync response.
pub async fn mount_post(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(201).set_body_json(body))
        .mount(server)
        .await;
}

/// Body of the last request the server received.
pub async fn last_request_body(server: &MockServer) -> serde_json::Value {
    let requests = server.received_requests().await.expect("request recording enabled");
    let request = requests.last().expect("at least one request");
    serde_json::from_slice(&request.body).expect("json body")
}
