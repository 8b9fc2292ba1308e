//! Response classification
//!
//! Decides what a completed response means for the caller: logical business
//! failure, insufficient permission, stale credential, pass-through success,
//! or plain transport error. Rules run in a fixed order:
//!
//! 1. A failing business envelope (non-OK `status` field); never refreshes
//! 2. 403; never refreshes, the credential is valid but insufficient
//! 3. The stale-credential signals: transport 401, the expired-token
//!    envelope code, or the expiry marker substring in the body or its
//!    nested `raw` field
//! 4. Everything else: 2xx passes through, other statuses are transport
//!    errors
//!
//! The expired-token code is excluded from rule 1 so rule 3 can observe it;
//! otherwise code-signalled expiry would classify as a business failure and
//! never reach the refresh path. Rule 3 only yields `Expired` while the
//! request's one-shot retry is unspent — a retried request surfaces instead
//! of looping.

use console_auth::constants::{EXPIRED_TOKEN_STATUS, OK_STATUSES, TOKEN_EXPIRY_MARKER};
use serde_json::Value;

/// What the classifier decided about one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// 2xx with no failing envelope; hand the payload to the caller.
    Pass,
    /// The envelope carried a non-OK status.
    Business { message: String },
    /// 403, surfaced immediately with the target path.
    Forbidden,
    /// Stale credential with the retry unspent: enter the refresh path.
    Expired,
    /// Stale credential on an already-retried request.
    ExpiredAfterRetry,
    /// Non-2xx outside the rules above.
    Transport { status: u16 },
}

/// Classify one completed response.
///
/// `already_retried` is the request's one-shot retry marker: set once the
/// request has been replayed after a refresh, it keeps a still-stale
/// credential from triggering a second refresh for the same request.
pub fn classify(status: u16, body: &str, already_retried: bool) -> Disposition {
    let payload: Option<Value> = serde_json::from_str(body).ok();

    // Rule 1: business envelope
    if let Some(status_field) = envelope_status(payload.as_ref()) {
        if !is_ok_status(status_field) && !status_field.eq_ignore_ascii_case(EXPIRED_TOKEN_STATUS) {
            return Disposition::Business {
                message: envelope_message(payload.as_ref(), status_field),
            };
        }
    }

    // Rule 2: forbidden
    if status == 403 {
        return Disposition::Forbidden;
    }

    // Rule 3: stale credential
    if is_expired_signal(status, body, payload.as_ref()) {
        return if already_retried {
            Disposition::ExpiredAfterRetry
        } else {
            Disposition::Expired
        };
    }

    // Rule 4
    if (200..300).contains(&status) {
        Disposition::Pass
    } else {
        Disposition::Transport { status }
    }
}

fn envelope_status(payload: Option<&Value>) -> Option<&str> {
    payload?.get("status")?.as_str()
}

fn is_ok_status(status: &str) -> bool {
    OK_STATUSES.iter().any(|ok| ok.eq_ignore_ascii_case(status))
}

/// Message for a failing envelope: `description`, then `message`, then the
/// status value itself.
fn envelope_message(payload: Option<&Value>, envelope_status: &str) -> String {
    payload
        .and_then(|p| p.get("description").or_else(|| p.get("message")))
        .and_then(Value::as_str)
        .unwrap_or(envelope_status)
        .to_string()
}

fn is_expired_signal(status: u16, body: &str, payload: Option<&Value>) -> bool {
    if status == 401 {
        return true;
    }
    if envelope_status(payload)
        .is_some_and(|s| s.eq_ignore_ascii_case(EXPIRED_TOKEN_STATUS))
    {
        return true;
    }
    // Marker fallback: some gateway paths return no status code at all, just
    // an opaque body or a `raw` passthrough string.
    if body.contains(TOKEN_EXPIRY_MARKER) {
        return true;
    }
    payload
        .and_then(|p| p.get("raw"))
        .and_then(Value::as_str)
        .is_some_and(|raw| raw.contains(TOKEN_EXPIRY_MARKER))
}
