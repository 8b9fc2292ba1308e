//! Session credential storage
//!
//! Persists the console session — one access/refresh credential pair plus the
//! identity mirror (username, organization) — as a JSON file. The file plays
//! the role the browser's persistent storage plays for the console: its
//! lifecycle is independent of any single client instance. All writes use
//! atomic temp-file + rename to prevent corruption on crash; a tokio Mutex
//! serializes writers so a refresh commit and a session teardown cannot
//! interleave.
//!
//! Ownership per the component contract: the refresh coordinator is the only
//! writer of the credential pair, the session terminator the only caller of
//! `clear`, and the request signer reads on every outgoing request.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The session's credential pair.
///
/// Both tokens are opaque strings minted by the identity provider. The
/// access token is short-lived and attached (in wire form) to every request;
/// the refresh token is exchanged for a new pair when the access token goes
/// stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access: String,
    pub refresh: String,
}

/// Session-identifying state mirrored alongside the credential pair.
///
/// Cleared together with the tokens on teardown so no trace of the session
/// survives a forced logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub organization: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<Identity>,
}

/// File-backed session store.
///
/// The Mutex guards the in-memory state; reads briefly take the lock to
/// clone, so request-time token reads never block on a slow disk write.
pub struct SessionStore {
    path: PathBuf,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Load the session from the given file path.
    ///
    /// A missing file is a cold start (no active session) and creates the
    /// file as an empty session, so later loads skip the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let state: SessionState = serde_json::from_str(&contents)
                .map_err(|e| Error::SessionParse(format!("parsing session file: {e}")))?;
            info!(
                path = %path.display(),
                authenticated = state.credential.is_some(),
                "loaded session"
            );
            state
        } else {
            info!(path = %path.display(), "session file not found, starting signed out");
            let state = SessionState::default();
            write_atomic(&path, &state).await?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the current credential pair, if a session is active.
    pub async fn credential(&self) -> Option<Credential> {
        let state = self.state.lock().await;
        state.credential.clone()
    }

    /// Current access token, if any. Absence is valid — pre-login requests
    /// go out unsigned.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.credential.as_ref().map(|c| c.access.clone())
    }

    /// Current refresh token, if any.
    pub async fn refresh_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.credential.as_ref().map(|c| c.refresh.clone())
    }

    /// Whether a credential pair is currently held.
    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.lock().await;
        state.credential.is_some()
    }

    /// Replace the credential pair wholesale and persist. Used at login.
    pub async fn set_credential(&self, credential: Credential) -> Result<()> {
        let mut state = self.state.lock().await;
        state.credential = Some(credential);
        debug!("stored credential pair");
        write_atomic(&self.path, &state).await
    }

    /// Commit refreshed tokens to the active session and persist.
    ///
    /// The refresh token is only replaced when the gateway supplied a new
    /// one; otherwise the previous refresh token stays valid. Errors if no
    /// session is active — there is nothing to refresh into.
    pub async fn update_tokens(&self, access: String, refresh: Option<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        let credential = state
            .credential
            .as_mut()
            .ok_or_else(|| Error::NotFound("no active session to update".into()))?;
        credential.access = access;
        if let Some(refresh) = refresh {
            credential.refresh = refresh;
        }
        debug!("committed refreshed tokens");
        write_atomic(&self.path, &state).await
    }

    /// Get a clone of the session identity, if set.
    pub async fn identity(&self) -> Option<Identity> {
        let state = self.state.lock().await;
        state.identity.clone()
    }

    /// Set the session identity mirror and persist.
    pub async fn set_identity(&self, identity: Identity) -> Result<()> {
        let mut state = self.state.lock().await;
        state.identity = Some(identity);
        debug!("stored session identity");
        write_atomic(&self.path, &state).await
    }

    /// Wipe the credential pair and identity mirror. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.credential.is_none() && state.identity.is_none() {
            return Ok(());
        }
        state.credential = None;
        state.identity = None;
        info!("cleared session state");
        write_atomic(&self.path, &state).await
    }
}

/// Write session state to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write cannot corrupt the session file. File
/// permissions are 0600 — the file holds live tokens.
async fn write_atomic(path: &Path, state: &SessionState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::SessionParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
