//! Request signing
//!
//! Attaches the current credential to an outgoing request immediately before
//! transmission. The token travels in its obfuscated wire form. Absence of a
//! token is not an error — pre-login traffic goes out unsigned. The signer
//! mutates only the outgoing header map, never the session store.

use console_auth::obfuscate_token;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::warn;

/// Sign an outgoing request with the given access token, if one exists.
pub fn sign(headers: &mut HeaderMap, access_token: Option<&str>) {
    let Some(token) = access_token else {
        return;
    };
    let bearer = format!("Bearer {}", obfuscate_token(token));
    match HeaderValue::from_str(&bearer) {
        Ok(value) => {
            headers.insert(AUTHORIZATION, value);
        }
        Err(e) => {
            warn!(error = %e, "token produced an invalid header value, sending unsigned");
        }
    }
}
