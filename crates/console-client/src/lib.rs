//! Authenticated HTTP client core for the security-operations console
//!
//! Everything the console sends to its backend flows through [`ApiClient`]:
//! requests are signed with the obfuscated bearer credential, responses are
//! classified, and a stale credential triggers exactly one coordinated
//! refresh while concurrent requests queue and replay. When recovery is
//! impossible the session is torn down and a logout signal is broadcast.
//!
//! Request lifecycle:
//! 1. `signer::sign` attaches the current credential in wire form
//! 2. `classify::classify` triages the completed response
//! 3. `RefreshCoordinator` performs the single-flight refresh on expiry,
//!    queueing every request that observes the same expiry window
//! 4. `SessionTerminator` wipes session state when the refresh cannot
//!    succeed and broadcasts the login path

pub mod classify;
pub mod client;
pub mod error;
pub mod refresh;
pub mod session;
pub mod signer;

pub use classify::{Disposition, classify};
pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result};
pub use refresh::RefreshCoordinator;
pub use session::SessionTerminator;
pub use signer::sign;
