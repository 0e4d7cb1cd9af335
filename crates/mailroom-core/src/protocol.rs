//! Server-to-client wire frames.
//!
//! The viewer protocol is plain JSON text frames. A connection receives
//! exactly one [`HistoryFrame`] immediately after registration; every
//! message ingested afterwards is forwarded as its own raw JSON frame with
//! no envelope.

use serde::Serialize;
use serde_json::Value;

/// One-time history replay sent to a session right after it connects.
///
/// Carries the most recent `limit` log entries ordered newest-first: the
/// trailing slice of the append-ordered log, reversed.
#[derive(Debug, Serialize)]
pub struct HistoryFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    messages: Vec<Value>,
}

impl HistoryFrame {
    /// Build a history frame from an append-ordered log.
    #[must_use]
    pub fn from_log(log: &[Value], limit: usize) -> Self {
        let start = log.len().saturating_sub(limit);
        Self {
            kind: "history",
            messages: log[start..].iter().rev().cloned().collect(),
        }
    }

    /// Number of messages carried by the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check whether the frame carries no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Encode to the JSON text frame sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_is_newest_first_and_capped() {
        let log: Vec<Value> = (0..5).map(|n| json!({"n": n})).collect();

        let frame = HistoryFrame::from_log(&log, 3);
        assert_eq!(frame.len(), 3);
        assert_eq!(
            frame.messages,
            vec![json!({"n": 4}), json!({"n": 3}), json!({"n": 2})]
        );
    }

    #[test]
    fn test_history_shorter_than_limit() {
        let log = vec![json!({"a": 1}), json!({"b": 2})];

        let frame = HistoryFrame::from_log(&log, 100);
        assert_eq!(frame.messages, vec![json!({"b": 2}), json!({"a": 1})]);
    }

    #[test]
    fn test_empty_log_still_sends_frame() {
        let frame = HistoryFrame::from_log(&[], 100);
        assert!(frame.is_empty());

        let text = frame.encode().unwrap();
        assert_eq!(text, r#"{"type":"history","messages":[]}"#);
    }

    #[test]
    fn test_encoding_shape() {
        let frame = HistoryFrame::from_log(&[json!({"subject": "hi"})], 100);
        let decoded: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();

        assert_eq!(decoded["type"], "history");
        assert_eq!(decoded["messages"][0]["subject"], "hi");
    }
}
