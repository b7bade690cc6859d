//! Chat export document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::CodecError;
use crate::domain::{Transcript, TranscriptEntry};

/// `{sessionId, messages, exportDate}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDocument {
    #[serde(default)]
    pub session_id: String,

    pub messages: Vec<TranscriptEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
}

impl ChatDocument {
    /// Snapshot a session; an in-flight answer with no text yet is left out
    pub fn from_session(session_id: Option<&str>, transcript: &Transcript, exported_at: DateTime<Utc>) -> Self {
        let messages = transcript
            .entries()
            .iter()
            .filter(|e| !(e.is_pending() && e.message.is_empty()))
            .cloned()
            .collect();
        Self {
            session_id: session_id.unwrap_or_default().to_string(),
            messages,
            export_date: Some(exported_at),
        }
    }

    /// Pretty JSON, as written to export files
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parse and validate a chat export
pub fn decode_chat(raw: &str) -> Result<ChatDocument, CodecError> {
    debug!(len = raw.len(), "decode_chat: called");
    let value: Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| CodecError::Validation("chat export must be a JSON object".to_string()))?;
    match object.get("messages") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(CodecError::Validation("'messages' must be an array".to_string())),
        None => return Err(CodecError::Validation("missing required key 'messages'".to_string())),
    }
    serde_json::from_value(value).map_err(|e| CodecError::Validation(e.to_string()))
}
