//! Session teardown
//!
//! Invoked when recovery is impossible: the refresh token is gone, the
//! refresh call failed, or the gateway returned no usable token. Clears
//! every piece of persisted session state and broadcasts the login path so
//! the embedding shell can navigate there. Multiple failure paths may race
//! into teardown; only the first invocation has any observable effect.
//!
//! After teardown the session is dead for good — a fresh login constructs a
//! new client context rather than reviving this one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use console_auth::SessionStore;
use tokio::sync::watch;
use tracing::{info, warn};

/// Tears the session down exactly once and tells the shell where to go.
pub struct SessionTerminator {
    store: Arc<SessionStore>,
    login_path: String,
    terminated: AtomicBool,
    signal: watch::Sender<Option<String>>,
}

impl SessionTerminator {
    pub fn new(store: Arc<SessionStore>, login_path: impl Into<String>) -> Self {
        let (signal, _) = watch::channel(None);
        Self {
            store,
            login_path: login_path.into(),
            terminated: AtomicBool::new(false),
            signal,
        }
    }

    /// Subscribe to the teardown signal. The received value becomes the
    /// login path once the session has been terminated.
    pub fn on_terminated(&self) -> watch::Receiver<Option<String>> {
        self.signal.subscribe()
    }

    /// The configured login entry point.
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Wipe the session and broadcast the login path. Idempotent.
    pub async fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.store.clear().await {
            // The in-memory wipe may have partially happened; the broadcast
            // still fires so the shell leaves the authenticated surface.
            warn!(error = %e, "failed to clear persisted session state");
        }
        info!(login = %self.login_path, "session terminated, redirecting to login");
        let _ = self.signal.send(Some(self.login_path.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_auth::Credential;

    async fn seeded_store(dir: &tempfile::TempDir) -> Arc<SessionStore> {
        let store = SessionStore::load(dir.path().join("session.json"))
            .await
            .unwrap();
        store
            .set_credential(Credential {
                access: "at_live".into(),
                refresh: "rt_live".into(),
            })
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn terminate_clears_store_and_broadcasts_login_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir).await;
        let terminator = SessionTerminator::new(store.clone(), "/login");
        let mut signal = terminator.on_terminated();

        terminator.terminate().await;

        assert!(!store.is_authenticated().await);
        signal.changed().await.unwrap();
        assert_eq!(signal.borrow().as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn second_invocation_has_no_additional_effect() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir).await;
        let terminator = SessionTerminator::new(store.clone(), "/login");

        terminator.terminate().await;

        // A credential written after teardown (e.g. by a racing login flow)
        // must survive a second terminate call — the teardown is one-shot.
        store
            .set_credential(Credential {
                access: "at_next".into(),
                refresh: "rt_next".into(),
            })
            .await
            .unwrap();
        terminator.terminate().await;

        assert!(store.is_authenticated().await);
    }

    #[tokio::test]
    async fn concurrent_teardowns_settle_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir).await;
        let terminator = Arc::new(SessionTerminator::new(store.clone(), "/login"));

        let mut handles = vec![];
        for _ in 0..5 {
            let terminator = terminator.clone();
            handles.push(tokio::spawn(async move { terminator.terminate().await }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(!store.is_authenticated().await);
    }
}
