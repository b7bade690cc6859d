//! The session channel: one streaming connection plus the transcript it feeds

use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info, warn};

use super::events::{ChannelEvent, parse_event};
use super::store::IdentityStore;
use super::transport::{Connection, Connector, Inbound};
use super::{ChannelError, ChannelUpdate, ConnectionState};
use crate::codec::ChatDocument;
use crate::domain::Transcript;
use crate::service::{PlanService, ServiceError};

/// Streaming chat session
///
/// Inbound frames are applied one at a time, in arrival order, through
/// [`SessionChannel::next_update`] (or [`SessionChannel::on_event`] directly).
/// The channel never reconnects on its own; a failed stream moves to
/// [`ConnectionState::Closed`] and keeps the identity so the next `open`
/// resumes the same session.
pub struct SessionChannel {
    endpoint: String,
    connector: Arc<dyn Connector>,
    store: Arc<dyn IdentityStore>,
    session_id: Option<String>,
    transcript: Transcript,
    state: ConnectionState,
    connection: Option<Connection>,
}

impl SessionChannel {
    /// Create a closed channel, picking up any identity the store remembers
    pub fn new(endpoint: impl Into<String>, connector: Arc<dyn Connector>, store: Arc<dyn IdentityStore>) -> Self {
        let session_id = store.get();
        debug!(?session_id, "SessionChannel::new: called");
        Self {
            endpoint: endpoint.into(),
            connector,
            store,
            session_id,
            transcript: Transcript::new(),
            state: ConnectionState::Disconnected,
            connection: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn url_for(&self, session_id: Option<&str>) -> Result<String, ChannelError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| ChannelError::Connection(e.to_string()))?;
        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            url.query_pairs_mut().append_pair("session_id", id);
        }
        Ok(url.to_string())
    }

    /// Establish the stream, resuming `existing` when given
    ///
    /// Opening without an identity starts a fresh session, so any remembered
    /// id is dropped. Connection failures are reported as
    /// [`ChannelUpdate::Disconnected`]; only opening twice is an error.
    pub async fn open(&mut self, existing: Option<&str>) -> Result<ChannelUpdate, ChannelError> {
        debug!(?existing, state = %self.state, "SessionChannel::open: called");
        if matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            return Err(ChannelError::AlreadyOpen);
        }

        self.session_id = existing.filter(|id| !id.is_empty()).map(str::to_string);

        self.state = ConnectionState::Connecting;
        let connected = match self.url_for(existing) {
            Ok(url) => self.connector.connect(&url).await,
            Err(e) => Err(e),
        };

        match connected {
            Ok(connection) => {
                info!(session_id = ?self.session_id, "SessionChannel: connected");
                self.connection = Some(connection);
                self.state = ConnectionState::Open;
                Ok(ChannelUpdate::Connected {
                    session_id: self.session_id.clone(),
                })
            }
            Err(e) => {
                warn!(error = %e, "SessionChannel: connect failed");
                self.state = ConnectionState::Closed;
                Ok(ChannelUpdate::Disconnected { reason: e.to_string() })
            }
        }
    }

    /// Reopen with the remembered identity
    pub async fn resume(&mut self) -> Result<ChannelUpdate, ChannelError> {
        let id = self.session_id.clone();
        self.open(id.as_deref()).await
    }

    /// Send a user message
    ///
    /// The user entry and an empty pending assistant entry are added before
    /// the text goes out.
    pub async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        debug!(len = text.len(), state = %self.state, "SessionChannel::send: called");
        if self.state != ConnectionState::Open {
            return Err(ChannelError::NotOpen);
        }
        let outbound = match &self.connection {
            Some(connection) => connection.outbound.clone(),
            None => return Err(ChannelError::NotOpen),
        };
        if text.trim().is_empty() {
            return Err(ChannelError::EmptyMessage);
        }

        self.transcript.begin_exchange(text);
        if outbound.send(text.to_string()).await.is_err() {
            let reason = "stream closed while sending".to_string();
            self.disconnect(reason.clone());
            return Err(ChannelError::Connection(reason));
        }
        Ok(())
    }

    /// Wait for the next inbound frame and apply it
    ///
    /// Returns `None` when there is no connection to read from.
    pub async fn next_update(&mut self) -> Option<ChannelUpdate> {
        let connection = self.connection.as_mut()?;
        let inbound = connection.inbound.recv().await;
        let update = match inbound {
            Some(Inbound::Text(raw)) => self.on_event(&raw),
            Some(Inbound::Error(reason)) => self.disconnect(reason),
            None => self.disconnect("connection closed".to_string()),
        };
        Some(update)
    }

    /// Apply one raw inbound frame
    pub fn on_event(&mut self, raw: &str) -> ChannelUpdate {
        if self.state != ConnectionState::Open {
            debug!(state = %self.state, "SessionChannel::on_event: not open, discarding frame");
            return ChannelUpdate::Ignored;
        }

        match parse_event(raw) {
            Some(ChannelEvent::SessionId(session_id)) => {
                debug!(%session_id, "SessionChannel::on_event: session identity");
                if let Err(e) = self.store.set(&session_id) {
                    warn!(error = %e, "SessionChannel: failed to persist session identity");
                }
                self.session_id = Some(session_id.clone());
                ChannelUpdate::SessionAssigned { session_id }
            }
            Some(ChannelEvent::History(entries)) => {
                let count = entries.len();
                debug!(count, "SessionChannel::on_event: history replay");
                self.transcript.replace(entries);
                ChannelUpdate::HistoryReplaced { count }
            }
            Some(ChannelEvent::Answer(fragment)) => {
                let merge = self.transcript.apply_fragment(&fragment);
                ChannelUpdate::Answer { fragment, merge }
            }
            Some(ChannelEvent::Document(data)) => ChannelUpdate::Document(data),
            Some(ChannelEvent::Error(message)) => {
                warn!(%message, "SessionChannel: server error event");
                ChannelUpdate::ServerError(message)
            }
            Some(ChannelEvent::Unknown(kind)) => {
                debug!(%kind, "SessionChannel::on_event: ignoring unknown event kind");
                ChannelUpdate::Ignored
            }
            None => ChannelUpdate::Ignored,
        }
    }

    fn disconnect(&mut self, reason: String) -> ChannelUpdate {
        info!(%reason, "SessionChannel: disconnected");
        self.connection = None;
        self.state = ConnectionState::Closed;
        self.transcript.abandon_pending();
        ChannelUpdate::Disconnected { reason }
    }

    /// Close the stream; safe to call any number of times
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!("SessionChannel::close: closing stream");
            drop(connection);
            self.state = ConnectionState::Closed;
            self.transcript.abandon_pending();
        }
    }

    /// Forget the identity and transcript; the next `open` starts a new session
    pub fn reset_identity(&mut self) {
        debug!(session_id = ?self.session_id, "SessionChannel::reset_identity: called");
        self.close();
        self.session_id = None;
        self.transcript.clear();
        self.state = ConnectionState::Disconnected;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "SessionChannel: failed to clear stored session identity");
        }
    }

    /// Delete the stored transcript on the service, then reset locally
    ///
    /// Nothing local changes when the service call fails.
    pub async fn reset_remote(&mut self, service: &dyn PlanService) -> Result<(), ServiceError> {
        debug!(session_id = ?self.session_id, "SessionChannel::reset_remote: called");
        if let Some(id) = self.session_id.as_deref() {
            service.clear_history(id).await?;
        }
        self.reset_identity();
        Ok(())
    }

    /// Load a previously exported chat while the channel is not open
    pub fn restore_transcript(&mut self, document: &ChatDocument) -> Result<(), ChannelError> {
        debug!(count = document.messages.len(), "SessionChannel::restore_transcript: called");
        if matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            return Err(ChannelError::AlreadyOpen);
        }
        self.transcript.replace(document.messages.clone());
        if !document.session_id.is_empty() {
            if let Err(e) = self.store.set(&document.session_id) {
                warn!(error = %e, "SessionChannel: failed to persist restored session identity");
            }
            self.session_id = Some(document.session_id.clone());
        }
        Ok(())
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FragmentMerge, Role, TranscriptEntry};
    use crate::service::client::mock::MockPlanService;
    use crate::session::store::MemoryIdentityStore;
    use crate::session::transport::mock::{MockConnector, MockServer, pair};
    use serde_json::json;

    const ENDPOINT: &str = "ws://localhost:8000/ws/chat";

    fn channel_with(
        connections: Vec<Result<Connection, String>>,
        store: Arc<MemoryIdentityStore>,
    ) -> (SessionChannel, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::with(connections));
        let channel = SessionChannel::new(ENDPOINT, connector.clone(), store);
        (channel, connector)
    }

    async fn open_channel() -> (SessionChannel, MockServer, Arc<MockConnector>) {
        let (conn, server) = pair();
        let (mut channel, connector) = channel_with(vec![Ok(conn)], Arc::new(MemoryIdentityStore::new()));
        let update = channel.open(None).await.unwrap();
        assert_eq!(update, ChannelUpdate::Connected { session_id: None });
        (channel, server, connector)
    }

    #[tokio::test]
    async fn test_open_without_identity() {
        let (channel, _server, connector) = open_channel().await;
        assert!(channel.is_open());
        assert_eq!(connector.urls(), vec![ENDPOINT.to_string()]);
    }

    #[tokio::test]
    async fn test_open_with_identity_adds_query() {
        let (conn, _server) = pair();
        let (mut channel, connector) = channel_with(vec![Ok(conn)], Arc::new(MemoryIdentityStore::new()));
        channel.open(Some("abc 1")).await.unwrap();
        assert_eq!(connector.urls(), vec![format!("{}?session_id=abc+1", ENDPOINT)]);
        assert_eq!(channel.session_id(), Some("abc 1"));
    }

    #[tokio::test]
    async fn test_open_without_identity_forgets_stored_one() {
        let (conn, _server) = pair();
        let store = Arc::new(MemoryIdentityStore::with_id("stale"));
        let (mut channel, connector) = channel_with(vec![Ok(conn)], store);
        assert_eq!(channel.session_id(), Some("stale"));

        let update = channel.open(None).await.unwrap();
        assert_eq!(update, ChannelUpdate::Connected { session_id: None });
        assert_eq!(channel.session_id(), None);
        assert_eq!(connector.urls(), vec![ENDPOINT.to_string()]);
    }

    #[tokio::test]
    async fn test_second_open_rejected() {
        let (mut channel, _server, _) = open_channel().await;
        assert!(matches!(channel.open(None).await, Err(ChannelError::AlreadyOpen)));
        assert!(channel.is_open());
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported_not_thrown() {
        let store = Arc::new(MemoryIdentityStore::with_id("keep-me"));
        let (mut channel, _) = channel_with(vec![Err("refused".to_string())], store);
        let update = channel.resume().await.unwrap();
        assert!(matches!(update, ChannelUpdate::Disconnected { .. }));
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(channel.session_id(), Some("keep-me"));
    }

    #[tokio::test]
    async fn test_session_identity_is_persisted() {
        let (conn, _server) = pair();
        let store = Arc::new(MemoryIdentityStore::new());
        let (mut channel, _) = channel_with(vec![Ok(conn)], store.clone());
        channel.open(None).await.unwrap();

        let update = channel.on_event(r#"{"event_type": "session_id", "data": "s-42"}"#);
        assert_eq!(
            update,
            ChannelUpdate::SessionAssigned {
                session_id: "s-42".to_string()
            }
        );
        assert_eq!(channel.session_id(), Some("s-42"));
        assert_eq!(store.get().as_deref(), Some("s-42"));
    }

    #[tokio::test]
    async fn test_send_streams_into_pending_entry() {
        let (mut channel, mut server, _) = open_channel().await;
        channel.send("how many sets?").await.unwrap();
        assert_eq!(server.from_client.recv().await.as_deref(), Some("how many sets?"));

        for fragment in ["Three ", "sets ", "of ten."] {
            server.emit(&format!(r#"{{"event_type": "answer", "data": "{}"}}"#, fragment)).await;
            let update = channel.next_update().await.unwrap();
            assert!(matches!(update, ChannelUpdate::Answer { merge: FragmentMerge::Pending, .. }));
        }

        let entries = channel.transcript().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], TranscriptEntry::user("how many sets?"));
        assert_eq!(entries[1].message, "Three sets of ten.");
    }

    #[tokio::test]
    async fn test_history_replaces_transcript() {
        let (mut channel, server, _) = open_channel().await;
        channel.send("old").await.unwrap();
        let history = json!({
            "event_type": "history",
            "data": [{"role": "user", "message": "hi"}, {"role": "assistant", "message": "hello"}]
        });
        server.emit(&history.to_string()).await;
        assert_eq!(channel.next_update().await, Some(ChannelUpdate::HistoryReplaced { count: 2 }));
        assert_eq!(channel.transcript().len(), 2);
        assert_eq!(channel.transcript().entries()[1].role, Role::Assistant);
        assert!(!channel.transcript().has_pending());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_events_ignored() {
        let (mut channel, _server, _) = open_channel().await;
        assert_eq!(channel.on_event(r#"{"event_type": "typing"}"#), ChannelUpdate::Ignored);
        assert_eq!(channel.on_event("garbage"), ChannelUpdate::Ignored);
        assert!(channel.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_open() {
        let (mut channel, _) = channel_with(vec![], Arc::new(MemoryIdentityStore::new()));
        assert!(matches!(channel.send("hi").await, Err(ChannelError::NotOpen)));
        assert!(channel.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_blank_text() {
        let (mut channel, _server, _) = open_channel().await;
        assert!(matches!(channel.send("   ").await, Err(ChannelError::EmptyMessage)));
        assert!(channel.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_double_close_is_noop() {
        let (mut channel, _server, _) = open_channel().await;
        channel.close();
        assert_eq!(channel.state(), ConnectionState::Closed);
        channel.close();
        assert_eq!(channel.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_close_never_opened() {
        let (mut channel, _) = channel_with(vec![], Arc::new(MemoryIdentityStore::new()));
        channel.close();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_discards_later_fragments() {
        let (mut channel, server, _) = open_channel().await;
        channel.send("hi").await.unwrap();
        server.emit(r#"{"event_type": "answer", "data": "Hel"}"#).await;
        channel.next_update().await.unwrap();

        channel.close();
        assert_eq!(channel.on_event(r#"{"event_type": "answer", "data": "lo"}"#), ChannelUpdate::Ignored);
        assert_eq!(channel.transcript().entries()[1].message, "Hel");
        assert!(!channel.transcript().has_pending());
        assert!(channel.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_closes_and_keeps_identity() {
        let (conn, server) = pair();
        let store = Arc::new(MemoryIdentityStore::with_id("s-1"));
        let (mut channel, _) = channel_with(vec![Ok(conn)], store);
        channel.resume().await.unwrap();
        channel.send("hi").await.unwrap();

        server.to_client.send(Inbound::Error("reset by peer".to_string())).await.unwrap();
        let update = channel.next_update().await.unwrap();
        assert_eq!(
            update,
            ChannelUpdate::Disconnected {
                reason: "reset by peer".to_string()
            }
        );
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(channel.session_id(), Some("s-1"));
        // empty placeholder dropped
        assert_eq!(channel.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_after_close_resumes() {
        let (first, _s1) = pair();
        let (second, _s2) = pair();
        let store = Arc::new(MemoryIdentityStore::with_id("s-9"));
        let (mut channel, connector) = channel_with(vec![Ok(first), Ok(second)], store);
        channel.resume().await.unwrap();
        channel.close();
        channel.resume().await.unwrap();
        assert!(channel.is_open());
        let urls = connector.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u.ends_with("?session_id=s-9")));
    }

    #[tokio::test]
    async fn test_reset_identity_clears_everything() {
        let (conn, _server) = pair();
        let store = Arc::new(MemoryIdentityStore::with_id("s-1"));
        let (mut channel, _) = channel_with(vec![Ok(conn)], store.clone());
        channel.resume().await.unwrap();
        channel.send("hi").await.unwrap();

        channel.reset_identity();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.session_id(), None);
        assert!(channel.transcript().is_empty());
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn test_reset_remote_keeps_state_on_failure() {
        let store = Arc::new(MemoryIdentityStore::with_id("s-1"));
        let (mut channel, _) = channel_with(vec![], store.clone());
        let service = MockPlanService::new();
        MockPlanService::push(&service.clears, Err("Session not found"));

        assert!(channel.reset_remote(&service).await.is_err());
        assert_eq!(channel.session_id(), Some("s-1"));

        MockPlanService::push(&service.clears, Ok(()));
        channel.reset_remote(&service).await.unwrap();
        assert_eq!(channel.session_id(), None);
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_restore_transcript() {
        let store = Arc::new(MemoryIdentityStore::new());
        let (mut channel, _) = channel_with(vec![], store.clone());
        let document = ChatDocument {
            session_id: "s-7".to_string(),
            messages: vec![TranscriptEntry::user("hi"), TranscriptEntry::assistant("hello")],
            export_date: None,
        };
        channel.restore_transcript(&document).unwrap();
        assert_eq!(channel.transcript().len(), 2);
        assert_eq!(channel.session_id(), Some("s-7"));
        assert_eq!(store.get().as_deref(), Some("s-7"));
    }
}
