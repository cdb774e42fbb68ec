//! Redis-backed policy source
//!
//! The mapping lives in a single hash: field = path pattern, value = the
//! role list in any form [`decode_role_list`](super::source::decode_role_list)
//! accepts. The whole hash is read with `HGETALL` on every fetch.

use crate::error::{PolicyResult, PolicyStoreError};
use crate::policy::snapshot::PolicySnapshot;
use crate::policy::source::{PolicySource, decode_mapping};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct RedisPolicySource {
    client: redis::Client,
    key: String,
    delimiter: String,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisPolicySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPolicySource")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl RedisPolicySource {
    /// Create a source. No connection is made until the first fetch.
    pub fn new(url: &str, key: impl Into<String>, delimiter: impl Into<String>) -> PolicyResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            key: key.into(),
            delimiter: delimiter.into(),
            conn: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn connection(&self) -> PolicyResult<MultiplexedConnection> {
        let mut cached = self.conn.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        debug!(key = %self.key, "Opening redis connection for policy reads");
        let conn = self.client.get_multiplexed_async_connection().await?;
        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        self.conn.lock().await.take();
    }
}

/// Decode a raw `HGETALL` reply.
///
/// Fields or values that are not UTF-8 (a JDK-serialised value, for one)
/// are skipped like any other malformed entry.
fn decode_hash(raw: HashMap<Vec<u8>, Vec<u8>>, delimiter: &str) -> PolicyResult<PolicySnapshot> {
    let mut entries = Vec::with_capacity(raw.len());
    let mut first_error = None;

    for (field, value) in raw {
        let entry = match String::from_utf8(field) {
            Ok(pattern) => match String::from_utf8(value) {
                Ok(value) => Ok((pattern, value)),
                Err(_) => Err((pattern, "role list is not valid UTF-8")),
            },
            Err(e) => Err((
                String::from_utf8_lossy(e.as_bytes()).into_owned(),
                "pattern is not valid UTF-8",
            )),
        };

        match entry {
            Ok(entry) => entries.push(entry),
            Err((pattern, reason)) => {
                warn!(pattern = %pattern, reason = %reason, "Skipping malformed policy entry");
                first_error.get_or_insert(PolicyStoreError::Parse {
                    pattern,
                    reason: reason.to_string(),
                });
            }
        }
    }

    match (decode_mapping(entries, delimiter), first_error) {
        (Ok(snapshot), Some(err)) if snapshot.is_empty() => Err(err),
        (result, _) => result,
    }
}

#[async_trait]
impl PolicySource for RedisPolicySource {
    async fn fetch(&self) -> PolicyResult<PolicySnapshot> {
        let mut conn = self.connection().await?;

        let raw: HashMap<Vec<u8>, Vec<u8>> = match redis::cmd("HGETALL")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.key, error = %e, "HGETALL failed, dropping connection");
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        decode_hash(raw, &self.delimiter)
    }

    fn source_type(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;

    const JDK_STREAM_MAGIC: [u8; 4] = [0xAC, 0xED, 0x00, 0x05];

    fn bulk(bytes: &[u8]) -> Value {
        Value::BulkString(bytes.to_vec())
    }

    #[test]
    fn test_non_utf8_value_skips_only_that_entry() {
        let reply = Value::Array(vec![
            bulk(b"/api/orders/**"),
            bulk(br#"["ADMIN"]"#),
            bulk(b"/api/legacy/**"),
            bulk(&JDK_STREAM_MAGIC),
        ]);
        let raw: HashMap<Vec<u8>, Vec<u8>> = redis::from_redis_value(&reply).unwrap();

        let snapshot = decode_hash(raw, ",").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("/api/orders/**").unwrap().contains("ADMIN"));
        assert!(snapshot.get("/api/legacy/**").is_none());
    }

    #[test]
    fn test_non_utf8_field_is_skipped() {
        let raw = HashMap::from([
            (vec![0xFF, 0xFE], b"ADMIN".to_vec()),
            (b"/api/**".to_vec(), b"OPS".to_vec()),
        ]);
        let snapshot = decode_hash(raw, ",").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("/api/**").unwrap().contains("OPS"));
    }

    #[test]
    fn test_only_undecodable_entries_is_error() {
        let raw = HashMap::from([(b"/api/**".to_vec(), JDK_STREAM_MAGIC.to_vec())]);
        assert!(matches!(
            decode_hash(raw, ","),
            Err(PolicyStoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_empty_hash_is_empty_mapping() {
        assert!(decode_hash(HashMap::new(), ",").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = RedisPolicySource::new("not-a-redis-url", "auth:resource-roles", ",");
        assert!(matches!(result, Err(PolicyStoreError::Redis(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error() {
        // Port 1 is never a redis server
        let source = RedisPolicySource::new("redis://127.0.0.1:1/", "auth:resource-roles", ",")
            .unwrap();
        assert!(source.fetch().await.is_err());
        assert_eq!(source.source_type(), "redis");
    }
}
