use media_sync_sources::SourceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while running a sync or clear operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A call was rejected with 401. Handled by one refresh and one retry;
    /// only escapes when converted into [`SyncError::AuthFailure`].
    #[error("access token expired")]
    AuthExpired,

    /// Not authenticated, refresh failed, or still rejected after a refresh.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// Any other non-2xx response, network error or timeout.
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// A single entity could not be merged or persisted.
    #[error("failed to reconcile {entity}: {reason}")]
    EntityReconcile { entity: String, reason: String },

    #[error("sync cancelled")]
    Cancelled,
}

/// Serializable tag of a session-level failure. Entity errors are never
/// session-level; they are counted per pass instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthFailure,
    RemoteUnavailable,
    Cancelled,
}

impl SyncError {
    /// `None` for errors that stay inside a pass.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SyncError::AuthExpired | SyncError::AuthFailure(_) => Some(FailureKind::AuthFailure),
            SyncError::RemoteUnavailable(_) => Some(FailureKind::RemoteUnavailable),
            SyncError::EntityReconcile { .. } => None,
            SyncError::Cancelled => Some(FailureKind::Cancelled),
        }
    }

    /// Errors after which nothing else in the session may run.
    pub fn aborts_session(&self) -> bool {
        matches!(
            self,
            SyncError::AuthExpired | SyncError::AuthFailure(_) | SyncError::Cancelled
        )
    }
}

impl From<SourceError> for SyncError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unauthorized => SyncError::AuthExpired,
            SourceError::NotAuthenticated | SourceError::TokenRefresh(_) => {
                SyncError::AuthFailure(err.to_string())
            }
            other => SyncError::RemoteUnavailable(other.to_string()),
        }
    }
}
