//! Outbound messages fanned out to subscribers.

use bytes::Bytes;

use crate::domain::Topic;

/// A detected change for one topic.
///
/// The payload is the canonical JSON encoding of the topic's snapshot at the
/// moment the change was detected. Cloning is cheap: the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Topic,
    pub payload: Bytes,
}

impl Message {
    /// Create a message for a topic.
    pub fn new(topic: Topic, payload: impl Into<Bytes>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    /// SSE event name for this message.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        self.topic.event_name()
    }

    /// Payload as text, if it is valid UTF-8.
    #[must_use]
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accessors() {
        let msg = Message::new(Topic::Peers, r#"{"peers":[]}"#.as_bytes().to_vec());
        assert_eq!(msg.event_name(), "peer-update");
        assert_eq!(msg.payload_str(), Some(r#"{"peers":[]}"#));
    }

    #[test]
    fn test_clone_shares_payload() {
        let msg = Message::new(Topic::NodeStatus, Bytes::from_static(b"{}"));
        let copy = msg.clone();
        assert_eq!(msg.payload.as_ptr(), copy.payload.as_ptr());
    }
}
