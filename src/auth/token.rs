//! Bearer token presence
//!
//! Tokens are validated upstream. Here a token only has to be present and
//! well formed; anything else counts as absent.

use crate::util::SecretString;
use axum::http::{HeaderMap, HeaderName};

const BEARER_SCHEME: &str = "bearer";

/// Extract the credential from a raw token header value.
///
/// Returns `None` for absent, blank or malformed values, and for a bare
/// `Bearer` scheme without credentials.
pub fn extract_token(raw: Option<&str>) -> Option<SecretString> {
    let value = raw?.trim();
    if value.is_empty() || !value.bytes().all(|b| b == b' ' || b == b'\t' || b.is_ascii_graphic()) {
        return None;
    }

    let credential = match value.split_once([' ', '\t']) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => rest.trim(),
        None if value.eq_ignore_ascii_case(BEARER_SCHEME) => "",
        _ => value,
    };

    if credential.is_empty() {
        None
    } else {
        Some(SecretString::new(credential))
    }
}

/// Whether `raw` carries a usable token
pub fn has_token(raw: Option<&str>) -> bool {
    extract_token(raw).is_some()
}

/// First value of the token header, if it is valid visible ASCII
pub fn token_header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
