//! Token refresh against the auth gateway
//!
//! One wire operation: POST the refresh token to the gateway's refresh
//! endpoint and extract the replacement pair. The gateway has shipped two
//! success-body shapes over time — the token object nested under `token`,
//! and the same fields at the top level — so both are accepted. A success
//! body without `access_token` counts as failure: there is nothing to sign
//! with.
//!
//! This call is issued by the refresh coordinator with a bare HTTP client,
//! never through the request signer — the stale access token must not be
//! attached to its own replacement request.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
struct TokenFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshBody {
    token: Option<TokenFields>,
    #[serde(flatten)]
    top: TokenFields,
}

/// Replacement tokens extracted from a successful refresh response.
///
/// `refresh` is `None` when the gateway chose not to rotate the refresh
/// token; the caller keeps the previous one.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access: String,
    pub refresh: Option<String>,
}

/// Exchange a refresh token for a new credential pair.
pub async fn refresh_session(
    client: &reqwest::Client,
    refresh_url: &str,
    refresh_token: &str,
) -> Result<RefreshedTokens> {
    let response = client
        .post(refresh_url)
        .json(&serde_json::json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token itself is revoked or invalid
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::Refresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    let body: RefreshBody = response
        .json()
        .await
        .map_err(|e| Error::Refresh(format!("invalid refresh response: {e}")))?;

    extract_tokens(body)
}

fn extract_tokens(body: RefreshBody) -> Result<RefreshedTokens> {
    let fields = body.token.unwrap_or(body.top);
    let access = fields
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Refresh("refresh response carried no access_token".into()))?;
    Ok(RefreshedTokens {
        access,
        refresh: fields.refresh_token.filter(|t| !t.is_empty()),
    })
}
