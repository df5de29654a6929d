//! Secret handling for Hookwarden.
//!
//! Credentials (API tokens, the webhook signing secret) live in files that
//! are rotated out from under the process. [`SecretAgent`] loads them once,
//! keeps refreshing them in the background and hands out [`TokenGenerator`]s
//! that always read the value that is current at call time.
//!
//! Values are carried as [`Secret`] so they never end up in logs.

pub mod agent;
pub mod signature;

pub use agent::{SecretAgent, SecretSnapshot, TokenGenerator};

use std::fmt;
use std::path::PathBuf;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that is redacted in logs and debug output.
///
/// # Example
///
/// ```rust
/// use hookwarden_common_secret::Secret;
///
/// let token = Secret::new("ghp_abc123".to_string());
/// assert_eq!(format!("{}", token), "[REDACTED]");
/// assert_eq!(format!("{:?}", token), "Secret([REDACTED])");
/// assert_eq!(token.expose(), "ghp_abc123");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the secret value.
    ///
    /// Keep the exposed reference short-lived.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<Vec<u8>> {
    /// Whether the secret holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Interpret the bytes as UTF-8, e.g. for an `Authorization` header.
    pub fn to_utf8(&self) -> Option<Secret<String>> {
        std::str::from_utf8(&self.0)
            .ok()
            .map(|s| Secret::new(s.to_string()))
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Errors raised while loading secrets.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// A secret file could not be read.
    #[error("failed to read secret {path}: {source}")]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A secret file exists but holds nothing.
    #[error("secret file {path} is empty")]
    Empty {
        /// The empty file.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_display_is_redacted() {
        let secret = Secret::new("my-api-key".to_string());
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new(b"hmac-key".to_vec());
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
    }

    #[test]
    fn test_bytes_to_utf8() {
        let secret = Secret::new(b"ghp_token".to_vec());
        assert_eq!(secret.to_utf8().unwrap().expose(), "ghp_token");

        let invalid = Secret::new(vec![0xff, 0xfe]);
        assert!(invalid.to_utf8().is_none());
    }

    #[test]
    fn test_secret_equality() {
        let a = Secret::new(b"one".to_vec());
        let b = Secret::new(b"one".to_vec());
        let c = Secret::new(b"two".to_vec());

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
