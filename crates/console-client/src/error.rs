//! Error taxonomy for the request core
//!
//! One variant per failure category the classifier can produce. A stale
//! credential that is successfully refreshed never surfaces here — the
//! recovery is invisible to the caller.

/// Errors surfaced to callers of the request core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend accepted the request but reported a logical failure in
    /// its response envelope.
    #[error("request rejected: {0}")]
    Business(String),

    /// 403 — the credential is valid but insufficient for the target path.
    /// Refreshing would not help.
    #[error("permission denied for {path}")]
    Forbidden { path: String },

    /// The credential was stale on a request that had already spent its
    /// one-shot retry.
    #[error("credential expired")]
    CredentialExpired,

    /// The refresh itself failed; the session has been torn down.
    #[error("session expired, sign in again")]
    SessionExpired,

    /// Network failure, timeout, or an unclassified upstream status.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result alias for request-core operations.
pub type Result<T> = std::result::Result<T, Error>;
