//! Wrapper for sensitive configuration values
//!
//! Values wrapped in `Secret` never appear in Debug or Display output, so
//! config structs can derive Debug and be logged without leaking upstream
//! credentials. The inner value is wiped from memory on drop.

use std::fmt;
use zeroize::Zeroize;

/// A sensitive value redacted from all formatted output.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Call sites should be few and deliberate.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = Secret::new(String::from("Basic ZWxhc3RpYzpzMw=="));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn expose_returns_the_inner_value() {
        let secret = Secret::new(String::from("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn from_builds_a_secret() {
        let secret: Secret<String> = String::from("value").into();
        assert_eq!(secret.expose(), "value");
    }

    #[test]
    fn clone_preserves_the_value_and_redaction() {
        let secret = Secret::new(String::from("copy-me"));
        let cloned = secret.clone();
        assert_eq!(cloned.expose(), "copy-me");
        assert_eq!(format!("{cloned:?}"), "[REDACTED]");
    }
}
