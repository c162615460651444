use thiserror::Error;

/// Errors returned by a tracking service client.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP 401: the access token was rejected.
    #[error("unauthorized (HTTP 401)")]
    Unauthorized,

    /// Any other non-2xx response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection failure or timeout.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),
}

impl SourceError {
    /// HTTP status code, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Unauthorized => Some(401),
            SourceError::Http { status, .. } => Some(*status),
            SourceError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SourceError::Unauthorized)
    }
}
