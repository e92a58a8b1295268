//! Counter store trait for abstracting the key-value backend.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in counter store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service could not be reached or returned an error reply.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A value read back from the store.
///
/// Values are written as opaque strings or JSON-serialized structures and
/// auto-detected on read: anything that parses as JSON comes back
/// structured, everything else as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// A JSON-decoded structured value
    Json(serde_json::Value),
    /// A raw string that did not parse as JSON
    Text(String),
}

impl StoreValue {
    /// Decode a raw store payload, preferring JSON.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => StoreValue::Json(value),
            Err(_) => StoreValue::Text(raw.to_string()),
        }
    }

    /// Encode for writing to the store.
    pub fn encode(&self) -> String {
        match self {
            StoreValue::Json(value) => value.to_string(),
            StoreValue::Text(text) => text.clone(),
        }
    }

    /// Read the value as an unsigned counter, if it is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            StoreValue::Json(value) => value.as_u64(),
            StoreValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<&str> for StoreValue {
    fn from(text: &str) -> Self {
        StoreValue::Text(text.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(text: String) -> Self {
        StoreValue::Text(text)
    }
}

impl From<serde_json::Value> for StoreValue {
    fn from(value: serde_json::Value) -> Self {
        StoreValue::Json(value)
    }
}

/// Uniform interface over the key-value store holding all counters.
///
/// This trait abstracts over the remote Redis backend and the in-process
/// memory backend so the admission engine can work with either. All
/// correctness for concurrent counting rests on `increment` being atomic
/// across callers; implementations must not read-modify-write.
///
/// Every operation may fail with [`StoreError::Unavailable`]. Failures are
/// surfaced to the caller, never retried here; the admission engine
/// handles them fail-open.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the integer at `key`, returning the new value.
    ///
    /// If the increment creates the key, an expiry of `ttl_seconds` is
    /// attached in the same operation. Later increments within the window
    /// must leave the expiry untouched; refreshing it would turn the fixed
    /// window into one that never closes.
    async fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64, StoreError>;

    /// Read the value at `key`. Absent or expired keys are `Ok(None)`,
    /// not an error.
    async fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError>;

    /// Unconditionally write `value` at `key` with an expiry.
    async fn set(&self, key: &str, value: StoreValue, ttl_seconds: u64)
        -> Result<(), StoreError>;

    /// Seconds until `key` expires; `-1` when the key is absent or has no
    /// expiry set.
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Remove `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_object() {
        let value = StoreValue::decode(r#"{"plan":"premium","calls":42}"#);
        assert_eq!(
            value,
            StoreValue::Json(json!({"plan": "premium", "calls": 42}))
        );
    }

    #[test]
    fn test_decode_number() {
        let value = StoreValue::decode("42");
        assert_eq!(value.as_u64(), Some(42));
    }

    #[test]
    fn test_decode_falls_back_to_text() {
        let value = StoreValue::decode("not json at all");
        assert_eq!(value, StoreValue::Text("not json at all".to_string()));
    }

    #[test]
    fn test_text_counter_parses() {
        let value = StoreValue::Text("17".to_string());
        assert_eq!(value.as_u64(), Some(17));
    }

    #[test]
    fn test_non_numeric_is_not_a_counter() {
        assert_eq!(StoreValue::decode("abc").as_u64(), None);
        assert_eq!(StoreValue::Json(json!({"n": 1})).as_u64(), None);
    }

    #[test]
    fn test_encode_round_trip() {
        let original = StoreValue::Json(json!({"a": [1, 2, 3]}));
        let decoded = StoreValue::decode(&original.encode());
        assert_eq!(decoded, original);

        let text = StoreValue::Text("plain".to_string());
        assert_eq!(StoreValue::decode(&text.encode()), text);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(
            StoreValue::from("raw"),
            StoreValue::Text("raw".to_string())
        );
        assert_eq!(
            StoreValue::from(json!(7)).as_u64(),
            Some(7)
        );
    }
}
