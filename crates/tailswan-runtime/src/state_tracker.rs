//! Per-topic change detection.
//!
//! The tracker keeps the SHA-256 of the last accepted snapshot for each
//! [`Topic`]. Snapshots are hashed over their canonical JSON encoding (object
//! keys sorted at every depth) so that map iteration order never produces a
//! spurious change.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tailswan_core::Topic;
use tracing::warn;

type Fingerprint = [u8; 32];

/// Encode `value` as JSON with object keys sorted recursively.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Last-known fingerprint per topic.
///
/// Each topic has its own lock: pollers of different topics never contend,
/// and two checks of the same topic are serialized.
#[derive(Debug, Default)]
pub struct StateTracker {
    fingerprints: [Mutex<Option<Fingerprint>>; Topic::ALL.len()],
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report whether `snapshot` differs from the last one seen for `topic`,
    /// recording it if so.
    ///
    /// The first observation of a topic is always a change. A snapshot that
    /// cannot be serialized is logged and reported as unchanged.
    pub fn has_changed<T: Serialize + ?Sized>(&self, topic: Topic, snapshot: &T) -> bool {
        match canonical_json(snapshot) {
            Ok(bytes) => self.has_changed_payload(topic, &bytes),
            Err(e) => {
                warn!(topic = %topic, "Failed to encode snapshot: {}", e);
                false
            }
        }
    }

    /// Like [`has_changed`](Self::has_changed) for an already canonical payload.
    pub fn has_changed_payload(&self, topic: Topic, payload: &[u8]) -> bool {
        let fingerprint: Fingerprint = Sha256::digest(payload).into();
        let mut slot = self.fingerprints[topic.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if slot.as_ref() == Some(&fingerprint) {
            return false;
        }
        *slot = Some(fingerprint);
        true
    }
}
