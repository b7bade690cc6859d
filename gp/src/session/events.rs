//! Inbound event decoding for the chat stream
//!
//! Frames are JSON `{"event_type": ..., "data": ...}`.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::TranscriptEntry;

#[derive(Debug, Deserialize)]
struct RawEvent {
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// A decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Server-issued session identity
    SessionId(String),
    /// Full transcript replay on resume
    History(Vec<TranscriptEntry>),
    /// Streamed answer fragment
    Answer(String),
    /// Source-document metadata; informational only
    Document(Value),
    /// Server-side failure while answering
    Error(String),
    /// Event kind this client does not know
    Unknown(String),
}

/// Decode one frame; `None` when the frame is not a well-formed event
pub fn parse_event(raw: &str) -> Option<ChannelEvent> {
    let event: RawEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "parse_event: malformed frame");
            return None;
        }
    };

    match event.event_type.as_str() {
        "session_id" => event.data.as_str().map(|s| ChannelEvent::SessionId(s.to_string())),
        "history" => match serde_json::from_value(event.data) {
            Ok(entries) => Some(ChannelEvent::History(entries)),
            Err(e) => {
                debug!(error = %e, "parse_event: malformed history");
                None
            }
        },
        "answer" => event.data.as_str().map(|s| ChannelEvent::Answer(s.to_string())),
        "document" => Some(ChannelEvent::Document(event.data)),
        "error" => Some(ChannelEvent::Error(match event.data {
            Value::String(s) => s,
            other => other.to_string(),
        })),
        other => Some(ChannelEvent::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    #[test]
    fn test_parse_session_id() {
        let event = parse_event(r#"{"event_type": "session_id", "data": "abc-123"}"#);
        assert_eq!(event, Some(ChannelEvent::SessionId("abc-123".to_string())));
    }

    #[test]
    fn test_parse_history() {
        let raw = r#"{"event_type": "history", "data": [
            {"role": "user", "message": "hi"},
            {"role": "assistant", "message": "hello"}
        ]}"#;
        match parse_event(raw) {
            Some(ChannelEvent::History(entries)) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].role, Role::User);
                assert_eq!(entries[1].message, "hello");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_answer_fragment() {
        let event = parse_event(r#"{"event_type": "answer", "data": "Squats "}"#);
        assert_eq!(event, Some(ChannelEvent::Answer("Squats ".to_string())));
    }

    #[test]
    fn test_unknown_kind_is_reported_not_rejected() {
        let event = parse_event(r#"{"event_type": "typing", "data": null}"#);
        assert_eq!(event, Some(ChannelEvent::Unknown("typing".to_string())));
    }

    #[test]
    fn test_malformed_frames() {
        assert_eq!(parse_event("not json"), None);
        assert_eq!(parse_event(r#"{"data": "x"}"#), None);
        assert_eq!(parse_event(r#"{"event_type": "answer", "data": 5}"#), None);
        assert_eq!(parse_event(r#"{"event_type": "history", "data": "oops"}"#), None);
    }

    #[test]
    fn test_error_event() {
        let event = parse_event(r#"{"event_type": "error", "data": "vector store offline"}"#);
        assert_eq!(event, Some(ChannelEvent::Error("vector store offline".to_string())));
    }
}
