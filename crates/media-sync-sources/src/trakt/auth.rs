use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;
use crate::trakt::api::{check_status, decode};

/// Out-of-band redirect: the user copies a PIN from the browser.
pub const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
const AUTHORIZE_URL: &str = "https://trakt.tv/oauth/authorize";

/// HTTP client used for every Trakt call. The timeout bounds each request.
pub fn create_trakt_client(timeout: std::time::Duration) -> Result<Client, SourceError> {
    let client = Client::builder()
        .user_agent(concat!("mediasync/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<TokenResponse> for TokenInfo {
    fn from(token_response: TokenResponse) -> Self {
        // Two minutes of slack so a token is never used right at its expiry.
        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in as i64 - 120);
        TokenInfo {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_at,
        }
    }
}

/// URL the user opens to obtain an authorization PIN.
pub fn authorize_url(client_id: &str) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}",
        AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(REDIRECT_URI)
    )
}

async fn request_token(
    client: &Client,
    base_url: &str,
    payload: serde_json::Value,
    action: &str,
) -> Result<TokenInfo, SourceError> {
    let url = format!("{}/oauth/token", base_url);
    debug!("POST {}", url);
    let response = client
        .post(&url)
        .json(&payload)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|e| SourceError::TokenRefresh(e.to_string()))?;

    let response = check_status(response, action)
        .await
        .map_err(|e| SourceError::TokenRefresh(e.to_string()))?;
    let token_response: TokenResponse = decode(response)
        .await
        .map_err(|e| SourceError::TokenRefresh(e.to_string()))?;
    Ok(token_response.into())
}

/// Exchange a refresh token for a new token pair.
pub async fn refresh_access_token(
    client: &Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenInfo, SourceError> {
    let payload = serde_json::json!({
        "refresh_token": refresh_token,
        "client_id": client_id,
        "client_secret": client_secret,
        "redirect_uri": REDIRECT_URI,
        "grant_type": "refresh_token"
    });
    request_token(client, base_url, payload, "refresh access token").await
}

/// Exchange the PIN shown after authorization for a token pair.
pub async fn exchange_code(
    client: &Client,
    base_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<TokenInfo, SourceError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(SourceError::TokenRefresh("Authorization code cannot be empty".to_string()));
    }
    let payload = serde_json::json!({
        "code": code,
        "client_id": client_id,
        "client_secret": client_secret,
        "redirect_uri": REDIRECT_URI,
        "grant_type": "authorization_code"
    });
    request_token(client, base_url, payload, "exchange authorization code").await
}
