//! Single-flight token refresh
//!
//! Owns the refresh state machine. The first request that observes a stale
//! credential performs the refresh; every request that observes it while one
//! is already in flight parks on a FIFO queue and shares the outcome. One
//! expiry event therefore issues exactly one call to the refresh endpoint,
//! no matter how many concurrent requests saw the stale credential —
//! anything else burns refresh tokens at the identity provider.
//!
//! The queue holds oneshot senders, released in insertion order and only
//! after the replacement credential is committed to the store, so a replayed
//! request can never race ahead of the credential update.

use std::sync::{Arc, Mutex};

use console_auth::{SessionStore, refresh_session};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::SessionTerminator;

/// Waiters receive the new access token, or a session-expired failure.
/// `Error` is not `Clone`, so each waiter gets its own constructed value.
type WaiterResult = Result<String>;

struct FlightState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<WaiterResult>>,
}

/// Coordinates the one in-flight refresh and its queue of waiting requests.
///
/// One instance per client context — the state is owned, not process-global,
/// so independent clients (and tests) never share a refresh window.
pub struct RefreshCoordinator {
    state: Mutex<FlightState>,
    store: Arc<SessionStore>,
    terminator: Arc<SessionTerminator>,
    http: reqwest::Client,
    refresh_url: String,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        terminator: Arc<SessionTerminator>,
        http: reqwest::Client,
        refresh_url: String,
    ) -> Self {
        Self {
            state: Mutex::new(FlightState {
                refreshing: false,
                waiters: Vec::new(),
            }),
            store,
            terminator,
            http,
            refresh_url,
        }
    }

    /// Obtain a fresh access token, joining the in-flight refresh if one
    /// exists. Returns the token the caller should re-sign its replay with,
    /// or `SessionExpired` once the session has been torn down.
    pub async fn refresh(&self) -> Result<String> {
        // The check-and-set happens under one non-async lock: every caller
        // observes the IDLE -> REFRESHING transition atomically, so exactly
        // one caller leads and the rest queue.
        let receiver = {
            let mut state = self.state.lock().expect("refresh state poisoned");
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        match receiver {
            Some(rx) => {
                debug!("refresh already in flight, queueing");
                match rx.await {
                    Ok(outcome) => outcome,
                    // Sender dropped without settling: the leading future was
                    // cancelled mid-refresh. Treat as an expired session
                    // rather than hanging or retrying.
                    Err(_) => Err(Error::SessionExpired),
                }
            }
            None => self.lead_refresh().await,
        }
    }

    /// The winning caller's path. The guard returns the machine to IDLE on
    /// every exit — including cancellation of this future — so the system
    /// can never be stuck in REFRESHING with requests parked forever.
    async fn lead_refresh(&self) -> Result<String> {
        let mut guard = SettleGuard::new(&self.state);

        match self.perform_refresh().await {
            Ok(token) => {
                let waiters = guard.finish();
                info!(
                    waiters = waiters.len(),
                    "token refresh succeeded, releasing queued requests"
                );
                for waiter in waiters {
                    let _ = waiter.send(Ok(token.clone()));
                }
                Ok(token)
            }
            Err(e) => {
                let waiters = guard.finish();
                warn!(
                    error = %e,
                    waiters = waiters.len(),
                    "token refresh failed, tearing down session"
                );
                for waiter in waiters {
                    let _ = waiter.send(Err(Error::SessionExpired));
                }
                self.terminator.terminate().await;
                Err(Error::SessionExpired)
            }
        }
    }

    /// Issue the actual refresh and commit the result.
    ///
    /// Uses the bare HTTP client: the request signer must not attach the
    /// stale access token to its own replacement request.
    async fn perform_refresh(&self) -> console_auth::Result<String> {
        let refresh_token = self.store.refresh_token().await.ok_or_else(|| {
            console_auth::Error::NotFound("no refresh token in session store".into())
        })?;

        let tokens = refresh_session(&self.http, &self.refresh_url, &refresh_token).await?;

        // Commit before any waiter is released. A failed disk write is
        // survivable — the in-memory session already carries the new pair —
        // but a waiter must never see the store without it.
        if let Err(e) = self
            .store
            .update_tokens(tokens.access.clone(), tokens.refresh)
            .await
        {
            warn!(error = %e, "failed to persist refreshed credential");
        }
        Ok(tokens.access)
    }
}

/// Puts the state machine back to IDLE exactly once.
///
/// Normal settlement goes through `finish`, which drains the queue for the
/// caller to release. If the leading future is dropped instead, `Drop`
/// performs the same transition and discards the drained senders — their
/// receivers observe a closed channel and fail with `SessionExpired`, so no
/// queued request hangs on a refresh that will never settle.
struct SettleGuard<'a> {
    state: &'a Mutex<FlightState>,
    settled: bool,
}

impl<'a> SettleGuard<'a> {
    fn new(state: &'a Mutex<FlightState>) -> Self {
        Self {
            state,
            settled: false,
        }
    }

    fn finish(&mut self) -> Vec<oneshot::Sender<WaiterResult>> {
        self.settled = true;
        let mut state = self.state.lock().expect("refresh state poisoned");
        state.refreshing = false;
        std::mem::take(&mut state.waiters)
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.refreshing = false;
            state.waiters.clear();
        }
    }
}
