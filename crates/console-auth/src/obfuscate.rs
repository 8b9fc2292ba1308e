//! Bearer token wire transform
//!
//! The backend expects the bearer value in an obfuscated form: the token's
//! characters reversed, then base64-encoded. This is an agreed wire
//! convention with the backend, not a security boundary — the transform
//! carries no key and is trivially reversible. It only keeps raw tokens from
//! appearing verbatim in intermediate access logs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Transform an access token into the wire form the backend expects.
///
/// Pure function; the same token always yields the same wire value.
pub fn obfuscate_token(token: &str) -> String {
    let reversed: String = token.chars().rev().collect();
    STANDARD.encode(reversed.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_base64_of_reversed_token() {
        // Pinned fixtures: the backend decodes exactly this form, so the
        // transform must never drift.
        assert_eq!(obfuscate_token("abc"), "Y2Jh");
        assert_eq!(obfuscate_token("at_12345"), "NTQzMjFfdGE=");
    }

    #[test]
    fn empty_token_encodes_to_empty_string() {
        assert_eq!(obfuscate_token(""), "");
    }

    #[test]
    fn transform_is_deterministic() {
        let token = "eyJhbGciOiJIUzI1NiJ9.e30.sig";
        assert_eq!(obfuscate_token(token), obfuscate_token(token));
    }

    #[test]
    fn transform_differs_from_plain_base64() {
        // The reversal step is load-bearing: without it the value would be
        // ordinary base64 of the token, which is not what the backend expects.
        let plain = STANDARD.encode("at_12345");
        assert_ne!(obfuscate_token("at_12345"), plain);
    }

    #[test]
    fn multibyte_tokens_round_trip_through_char_reversal() {
        // Reversal operates on chars, not bytes, so multibyte tokens still
        // produce valid UTF-8 before encoding.
        let wire = obfuscate_token("tök€n");
        let decoded = STANDARD.decode(wire).unwrap();
        let reversed = String::from_utf8(decoded).unwrap();
        assert_eq!(reversed.chars().rev().collect::<String>(), "tök€n");
    }
}
