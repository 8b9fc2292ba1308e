//! Authenticated request client
//!
//! The console's single request-sending surface. Every outgoing request is
//! signed, every response classified; a stale credential triggers the shared
//! refresh and exactly one replay. The contract is identical whether a call
//! is a first attempt or a replay — callers cannot tell a silent refresh
//! happened.
//!
//! All traffic targets `base_url` + path, the same-origin proxy prefix; the
//! client is agnostic to what lies behind the proxy. Only the refresh call
//! itself goes to the refresh endpoint, unsigned.

use std::sync::Arc;

use console_auth::SessionStore;
use console_auth::constants::{LOGIN_PATH, REFRESH_PATH};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::classify::{Disposition, classify};
use crate::error::{Error, Result};
use crate::refresh::RefreshCoordinator;
use crate::session::SessionTerminator;
use crate::signer::sign;

/// Client construction parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Same-origin API prefix, e.g. `https://console.example/api`.
    pub base_url: String,
    /// Refresh endpoint URL. Defaults to `{base_url}` + the fixed refresh
    /// path when unset.
    pub refresh_url: Option<String>,
    /// Login entry point broadcast on session termination.
    pub login_path: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_url: None,
            login_path: LOGIN_PATH.into(),
        }
    }
}

/// The authenticated client core.
///
/// One instance per application context. All coordination state (the refresh
/// flag, the waiter queue, the teardown latch) lives inside the instance, so
/// independent clients never share a refresh window.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    refresh: RefreshCoordinator,
    terminator: Arc<SessionTerminator>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, store: Arc<SessionStore>, http: reqwest::Client) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let refresh_url = config
            .refresh_url
            .unwrap_or_else(|| format!("{base_url}{REFRESH_PATH}"));
        let terminator = Arc::new(SessionTerminator::new(store.clone(), config.login_path));
        let refresh = RefreshCoordinator::new(
            store.clone(),
            terminator.clone(),
            http.clone(),
            refresh_url,
        );
        Self {
            http,
            base_url,
            store,
            refresh,
            terminator,
        }
    }

    /// Observe session termination; yields the login path on teardown.
    pub fn on_session_terminated(&self) -> watch::Receiver<Option<String>> {
        self.terminator.on_terminated()
    }

    /// Send an authenticated request and return the response payload.
    ///
    /// The one-shot retry marker lives in this loop: a request replays at
    /// most once after a refresh, and a replay that still finds the
    /// credential stale surfaces `CredentialExpired` instead of triggering
    /// another refresh.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut token = self.store.access_token().await;
        let mut retried = false;

        loop {
            let mut request_headers = headers.clone();
            sign(&mut request_headers, token.as_deref());

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .headers(request_headers);
            if let Some(ref body) = body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Transport(format!("{method} {path}: {e}")))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| Error::Transport(format!("{method} {path}: reading body: {e}")))?;

            match classify(status, &text, retried) {
                Disposition::Pass => return Ok(parse_payload(&text)),
                Disposition::Business { message } => return Err(Error::Business(message)),
                Disposition::Forbidden => {
                    return Err(Error::Forbidden {
                        path: path.to_string(),
                    });
                }
                Disposition::Expired => {
                    debug!(path, "credential stale, entering refresh");
                    // Spend the retry before the refresh so a racing second
                    // expiry on the replay cannot re-enter.
                    retried = true;
                    token = Some(self.refresh.refresh().await?);
                    // Loop: re-sign with the fresh token and resubmit.
                }
                Disposition::ExpiredAfterRetry => return Err(Error::CredentialExpired),
                Disposition::Transport { status } => {
                    return Err(Error::Transport(format!(
                        "{method} {path}: upstream returned {status}"
                    )));
                }
            }
        }
    }

    /// GET convenience wrapper.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, HeaderMap::new(), None).await
    }

    /// POST convenience wrapper.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::POST, path, HeaderMap::new(), Some(body))
            .await
    }
}

fn parse_payload(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
