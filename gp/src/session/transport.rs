//! Streaming transport for the chat channel
//!
//! A [`Connector`] produces a [`Connection`]: a pair of queues bridged to
//! the wire by a background task. Dropping the connection's outbound sender
//! closes the socket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::ChannelError;

/// Queue depth between the socket task and the channel
const QUEUE_CAPACITY: usize = 256;

/// Something that arrived from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame
    Text(String),
    /// The transport failed; no more frames will follow
    Error(String),
}

/// An established stream: raw text out, frames in
#[derive(Debug)]
pub struct Connection {
    pub(crate) outbound: mpsc::Sender<String>,
    pub(crate) inbound: mpsc::Receiver<Inbound>,
}

impl Connection {
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<Inbound>) -> Self {
        Self { outbound, inbound }
    }
}

/// Opens streaming connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError>;
}

/// WebSocket connector
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError> {
        debug!(%url, "WsConnector::connect: called");
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(QUEUE_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<Inbound>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                warn!(error = %e, "WsConnector: send failed");
                                let _ = in_tx.send(Inbound::Error(e.to_string())).await;
                                break;
                            }
                        }
                        None => {
                            debug!("WsConnector: outbound closed, closing socket");
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(Inbound::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("WsConnector: remote closed");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WsConnector: receive failed");
                            let _ = in_tx.send(Inbound::Error(e.to_string())).await;
                            break;
                        }
                    },
                }
            }
            debug!("WsConnector: socket task finished");
        });

        Ok(Connection::new(out_tx, in_rx))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Server side of a mock connection
    pub struct MockServer {
        pub to_client: mpsc::Sender<Inbound>,
        pub from_client: mpsc::Receiver<String>,
    }

    impl MockServer {
        pub async fn emit(&self, raw: &str) -> bool {
            self.to_client.send(Inbound::Text(raw.to_string())).await.is_ok()
        }
    }

    /// Build a connected pair
    pub fn pair() -> (Connection, MockServer) {
        let (out_tx, out_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(QUEUE_CAPACITY);
        (
            Connection::new(out_tx, in_rx),
            MockServer {
                to_client: in_tx,
                from_client: out_rx,
            },
        )
    }

    /// Connector handing out pre-built connections and recording URLs
    #[derive(Default)]
    pub struct MockConnector {
        pub connections: Mutex<VecDeque<Result<Connection, String>>>,
        pub urls: Mutex<Vec<String>>,
    }

    impl MockConnector {
        pub fn with(connections: Vec<Result<Connection, String>>) -> Self {
            Self {
                connections: Mutex::new(connections.into()),
                urls: Mutex::new(Vec::new()),
            }
        }

        pub fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, url: &str) -> Result<Connection, ChannelError> {
            self.urls.lock().unwrap().push(url.to_string());
            match self.connections.lock().unwrap().pop_front() {
                Some(Ok(conn)) => Ok(conn),
                Some(Err(reason)) => Err(ChannelError::Connection(reason)),
                None => Err(ChannelError::Connection("no more mock connections".to_string())),
            }
        }
    }
}
