//! Streaming chat session
//!
//! [`SessionChannel`] owns one logical connection to the assistant, keeps the
//! session identity in an injected [`IdentityStore`] and assembles streamed
//! answer fragments into the transcript.

mod channel;
mod events;
mod store;
pub mod transport;

use serde_json::Value;
use thiserror::Error;

pub use channel::SessionChannel;
pub use events::{ChannelEvent, parse_event};
pub use store::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use transport::{Connection, Connector, Inbound, WsConnector};

use crate::domain::FragmentMerge;

/// Lifecycle of the streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Precondition and transport failures of the channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel is already open; close it first")]
    AlreadyOpen,

    #[error("Channel is not open")]
    NotOpen,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Connection error: {0}")]
    Connection(String),
}

/// What an inbound event or lifecycle step did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    /// Stream established; carries the identity it was opened with, if any
    Connected { session_id: Option<String> },
    /// Server issued (or confirmed) the session identity
    SessionAssigned { session_id: String },
    /// Transcript replaced by a history replay
    HistoryReplaced { count: usize },
    /// Answer fragment merged into the transcript
    Answer { fragment: String, merge: FragmentMerge },
    /// Source-document metadata, not applied to the transcript
    Document(Value),
    /// Server reported a failure while answering
    ServerError(String),
    /// Nothing to do (unknown kind, malformed frame, or channel not open)
    Ignored,
    /// Stream is gone; reconnecting is up to the caller
    Disconnected { reason: String },
}
