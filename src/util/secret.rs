//! Redacting wrapper for credentials
//!
//! Bearer tokens and store URLs with embedded passwords pass through logs,
//! `Debug` output of config structs and error messages. Wrapping them keeps
//! the value out of all of those.

use serde::Deserialize;
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// A string that never prints its contents.
///
/// Access requires an explicit [`expose_secret`](Self::expose_secret).
/// The buffer is cleared on drop (best effort; copies made elsewhere are
/// not tracked).
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The value read as a URL with any `user:password@` part masked.
    ///
    /// `redis://:hunter2@cache:6379/0` becomes `redis://***@cache:6379/0`.
    /// Values that are not `scheme://` URLs are fully redacted.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.0.split_once("://") else {
            return REDACTED.to_string();
        };

        let authority_end = rest.find('/').unwrap_or(rest.len());
        match rest[..authority_end].rfind('@') {
            Some(at) => format!("{scheme}://***{}", &rest[at..]),
            None => self.0.clone(),
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}
