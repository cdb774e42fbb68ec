//! Policy source trait and role-list decoding
//!
//! A source is anything that can hand back the full current mapping on
//! demand. Sources are read on every decision and must not cache across
//! calls: other processes update the backing store at runtime.

use crate::error::{PolicyResult, PolicyStoreError};
use crate::policy::snapshot::PolicySnapshot;
// async_trait required for dyn-compatibility with Arc<dyn PolicySource>
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Backing store of the pattern-to-roles mapping
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Read the full current mapping
    async fn fetch(&self) -> PolicyResult<PolicySnapshot>;

    /// Get a description of the source (for logging)
    fn source_type(&self) -> &'static str;
}

/// Shared source handle
pub type SharedPolicySource = Arc<dyn PolicySource>;

/// Decode one stored role list.
///
/// Accepted forms:
/// - JSON array of strings: `["ADMIN","OPS"]`
/// - Jackson typed list: `["java.util.ArrayList",["ADMIN","OPS"]]`
/// - JSON string or bare text split on `delimiter`: `"ADMIN,OPS"` / `ADMIN,OPS`
pub fn decode_role_list(raw: &str, delimiter: &str) -> Result<HashSet<String>, String> {
    let trimmed = raw.trim();

    if trimmed.starts_with('[') {
        let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
        return roles_from_json(&value);
    }

    if trimmed.starts_with('"') {
        let text: String = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
        return Ok(split_roles(&text, delimiter));
    }

    Ok(split_roles(trimmed, delimiter))
}

fn roles_from_json(value: &Value) -> Result<HashSet<String>, String> {
    let Value::Array(items) = value else {
        return Err("expected a JSON array".to_string());
    };

    if let [Value::String(class), Value::Array(inner)] = items.as_slice()
        && is_java_class_name(class)
    {
        return roles_from_json(&Value::Array(inner.clone()));
    }

    items
        .iter()
        .map(|item| match item {
            Value::String(role) => Ok(role.trim().to_string()),
            other => Err(format!("role must be a string, got {other}")),
        })
        .filter(|role| !matches!(role, Ok(r) if r.is_empty()))
        .collect()
}

/// `java.util.ArrayList` and the like: dotted, no whitespace
fn is_java_class_name(name: &str) -> bool {
    name.contains('.')
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

fn split_roles(raw: &str, delimiter: &str) -> HashSet<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(String::from)
        .collect()
}

/// Decode a whole raw mapping, dropping entries that cannot be decoded.
///
/// Fails only when no entry at all could be decoded.
pub fn decode_mapping<I>(raw: I, delimiter: &str) -> PolicyResult<PolicySnapshot>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut snapshot = PolicySnapshot::new();
    let mut first_error = None;

    for (pattern, value) in raw {
        match decode_role_list(&value, delimiter) {
            Ok(roles) => snapshot.insert(pattern, roles),
            Err(reason) => {
                warn!(pattern = %pattern, reason = %reason, "Skipping malformed policy entry");
                first_error.get_or_insert(PolicyStoreError::Parse { pattern, reason });
            }
        }
    }

    match first_error {
        Some(err) if snapshot.is_empty() => Err(err),
        _ => Ok(snapshot),
    }
}
