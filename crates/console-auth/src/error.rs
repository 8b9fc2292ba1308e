//! Error types for session and token operations

/// Errors from session storage and token refresh operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("session parse error: {0}")]
    SessionParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result alias for session and token operations.
pub type Result<T> = std::result::Result<T, Error>;
