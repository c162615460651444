use async_trait::async_trait;
use media_sync_models::{RemoteMovie, RemoteShow, SyncItems, SyncResponse};

use crate::error::SourceError;

/// A remote collection-tracking service.
///
/// Every call maps a 401 to [`SourceError::Unauthorized`] so that callers can
/// refresh the token and retry. Calls never retry on their own.
#[async_trait]
pub trait TrackingService: Send + Sync {
    fn service_name(&self) -> &str;

    // Authentication
    fn is_authenticated(&self) -> bool;
    async fn refresh_access_token(&mut self) -> Result<(), SourceError>;

    // Data retrieval
    async fn collection_movies(&self) -> Result<Vec<RemoteMovie>, SourceError>;
    async fn collection_shows(&self) -> Result<Vec<RemoteShow>, SourceError>;
    async fn watched_movies(&self) -> Result<Vec<RemoteMovie>, SourceError>;
    async fn watched_shows(&self) -> Result<Vec<RemoteShow>, SourceError>;

    // Data modification
    async fn add_to_collection(&self, items: &SyncItems) -> Result<SyncResponse, SourceError>;
    async fn add_to_history(&self, items: &SyncItems) -> Result<SyncResponse, SourceError>;
    async fn remove_from_collection(&self, items: &SyncItems) -> Result<SyncResponse, SourceError>;
    async fn remove_from_history(&self, items: &SyncItems) -> Result<SyncResponse, SourceError>;
}
