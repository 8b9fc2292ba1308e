//! Session credential management for the console
//!
//! Holds the console's session state (access/refresh credential pair and the
//! identity mirror) and speaks the auth gateway's wire protocol. This crate
//! is a standalone library with no dependency on the client core — it can be
//! tested and reused independently.
//!
//! Session flow:
//! 1. Login (external to this workspace) seeds `SessionStore` with a
//!    credential pair and identity
//! 2. The client core reads `SessionStore::access_token()` on every request
//!    and sends it through `obfuscate_token()`
//! 3. On expiry, the client core calls `token::refresh_session()` and commits
//!    the replacement pair via `SessionStore::update_tokens()`
//! 4. On unrecoverable failure, `SessionStore::clear()` wipes everything

pub mod constants;
pub mod credentials;
pub mod error;
pub mod obfuscate;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, Identity, SessionStore};
pub use error::{Error, Result};
pub use obfuscate::obfuscate_token;
pub use token::{RefreshedTokens, refresh_session};
