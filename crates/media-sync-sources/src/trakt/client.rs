use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use media_sync_config::{CredentialStore, TraktConfig, DEFAULT_TRAKT_API_URL};
use media_sync_models::{RemoteMovie, RemoteShow, SyncItems, SyncResponse};
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::traits::TrackingService;
use crate::trakt::api::{self, TraktApi};
use crate::trakt::auth::{self, TokenInfo};

#[derive(Clone)]
pub struct TraktClient {
    client: Arc<Client>,
    base_url: String,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_expires: Option<DateTime<Utc>>,
    credentials: Option<CredentialStore>,
}

impl TraktClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout: std::time::Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(auth::create_trakt_client(timeout)?),
            base_url: DEFAULT_TRAKT_API_URL.to_string(),
            client_id,
            client_secret,
            access_token: None,
            refresh_token: None,
            token_expires: None,
            credentials: None,
        })
    }

    pub fn from_config(config: &TraktConfig, timeout: std::time::Duration) -> Result<Self, SourceError> {
        Ok(Self::new(config.client_id.clone(), config.client_secret.clone(), timeout)?
            .with_base_url(config.api_url()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_tokens(mut self, access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        self.access_token = Some(access_token.into()).filter(|t| !t.is_empty());
        self.refresh_token = refresh_token.filter(|t| !t.is_empty());
        self
    }

    /// Take tokens from a loaded credential store, and write refreshed tokens back to it.
    pub fn with_credential_store(mut self, store: CredentialStore) -> Self {
        self.access_token = store.get_trakt_access_token().cloned().filter(|t| !t.is_empty());
        self.refresh_token = store.get_trakt_refresh_token().cloned().filter(|t| !t.is_empty());
        self.token_expires = store.get_trakt_token_expires();
        self.credentials = Some(store);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_expires(&self) -> Option<DateTime<Utc>> {
        self.token_expires
    }

    /// True when the stored token expires within five minutes and can be refreshed.
    pub fn needs_refresh(&self) -> bool {
        match (self.token_expires, &self.refresh_token) {
            (Some(expires_at), Some(_)) => expires_at <= Utc::now() + Duration::minutes(5),
            _ => false,
        }
    }

    /// Finish the PIN authorization flow and keep the resulting tokens.
    pub async fn exchange_code(&mut self, code: &str) -> Result<(), SourceError> {
        let token_info = auth::exchange_code(
            &self.client,
            &self.base_url,
            &self.client_id,
            &self.client_secret,
            code,
        )
        .await?;
        self.store_tokens(token_info);
        info!("Authenticated to Trakt");
        Ok(())
    }

    fn store_tokens(&mut self, token_info: TokenInfo) {
        self.access_token = Some(token_info.access_token.clone());
        self.refresh_token = Some(token_info.refresh_token.clone());
        self.token_expires = Some(token_info.expires_at);

        if let Some(store) = self.credentials.as_mut() {
            store.set_trakt_tokens(token_info.access_token, token_info.refresh_token, token_info.expires_at);
            if let Err(e) = store.save() {
                warn!("Failed to save Trakt tokens to {}: {}", store.path().display(), e);
            }
        }
    }

    fn api(&self) -> Result<TraktApi<'_>, SourceError> {
        let access_token = self.access_token.as_deref().ok_or(SourceError::NotAuthenticated)?;
        Ok(TraktApi {
            client: &self.client,
            base_url: &self.base_url,
            access_token,
            client_id: &self.client_id,
        })
    }
}

#[async_trait]
impl TrackingService for TraktClient {
    fn service_name(&self) -> &str {
        "trakt"
    }

    fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    async fn refresh_access_token(&mut self) -> Result<(), SourceError> {
        let refresh_token = self
            .refresh_token
            .clone()
            .ok_or_else(|| SourceError::TokenRefresh("no refresh token stored".to_string()))?;

        let token_info = auth::refresh_access_token(
            &self.client,
            &self.base_url,
            &self.client_id,
            &self.client_secret,
            &refresh_token,
        )
        .await?;
        self.store_tokens(token_info);
        info!("Refreshed Trakt access token");
        Ok(())
    }

    async fn collection_movies(&self) -> Result<Vec<RemoteMovie>, SourceError> {
        api::get_collection_movies(&self.api()?).await
    }

    async fn collection_shows(&self) -> Result<Vec<RemoteShow>, SourceError> {
        api::get_collection_shows(&self.api()?).await
    }

    async fn watched_movies(&self) -> Result<Vec<RemoteMovie>, SourceError> {
        api::get_watched_movies(&self.api()?).await
    }

    async fn watched_shows(&self) -> Result<Vec<RemoteShow>, SourceError> {
        api::get_watched_shows(&self.api()?).await
    }

    async fn add_to_collection(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        api::add_to_collection(&self.api()?, items).await
    }

    async fn add_to_history(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        api::add_to_history(&self.api()?, items).await
    }

    async fn remove_from_collection(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        api::remove_from_collection(&self.api()?, items).await
    }

    async fn remove_from_history(&self, items: &SyncItems) -> Result<SyncResponse, SourceError> {
        api::remove_from_history(&self.api()?, items).await
    }
}
