//! Console backend protocol constants
//!
//! Wire-level agreements with the console backend and its auth gateway.
//! None of these are secrets — they are the paths the client targets and the
//! markers the gateway embeds in responses. The actual secrets (access and
//! refresh tokens) live in the session store.

/// Path of the token refresh endpoint, relative to the same-origin API prefix
pub const REFRESH_PATH: &str = "/auth/refresh_token";

/// Login entry point the shell navigates to after session termination
pub const LOGIN_PATH: &str = "/login";

/// Envelope status values the backend uses for logical success
pub const OK_STATUSES: &[&str] = &["OK", "SUCCESS"];

/// Envelope status code the auth gateway sets when the access token is stale.
/// This is the code-signalled expiry path; it must reach the refresh logic,
/// so the response classifier excludes it from generic business failures.
pub const EXPIRED_TOKEN_STATUS: &str = "EXPIRED_TOKEN";

/// Substring the gateway embeds in opaque error bodies when the token is
/// stale. Compatibility shim for responses that carry no status code at all
/// (plain-text bodies and the gateway's `raw` passthrough field). The exact
/// wording is gateway-specific — match it verbatim, do not generalize.
pub const TOKEN_EXPIRY_MARKER: &str = "auth token is expired";
