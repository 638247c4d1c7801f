//! JSON-lines TCP client for the session relay server.
//!
//! Each line in either direction is one [`ChannelMessage`]. The server fans
//! events out to every client; listeners are kept locally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::registry::ListenerRegistry;
use super::types::{ChannelMessage, ListenerId};
use super::{ChannelError, EventChannel};

pub struct RelayChannel {
    writer: Mutex<OwnedWriteHalf>,
    registry: Arc<ListenerRegistry>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl RelayChannel {
    /// Connect to the relay at `address` (`host:port`).
    pub async fn connect(address: &str) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| ChannelError::Unreachable(format!("{address}: {e}")))?;
        let (read_half, write_half) = stream.into_split();

        let registry = Arc::new(ListenerRegistry::new());
        let connected = Arc::new(AtomicBool::new(true));

        let reader = {
            let registry = registry.clone();
            let connected = connected.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(read_half).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) if line.trim().is_empty() => continue,
                        Ok(Some(line)) => match serde_json::from_str::<ChannelMessage>(&line) {
                            Ok(message) => {
                                let delivered = registry.dispatch(&message);
                                tracing::debug!("'{}' -> {delivered} listener(s)", message.event);
                            }
                            Err(e) => tracing::warn!("Ignoring malformed relay line: {e}"),
                        },
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!("Relay read failed: {e}");
                            break;
                        }
                    }
                }
                connected.store(false, Ordering::SeqCst);
                tracing::warn!("Relay connection closed");
            })
        };

        tracing::info!("Connected to relay at {address}");
        Ok(Self {
            writer: Mutex::new(write_half),
            registry,
            connected,
            reader,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for RelayChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl EventChannel for RelayChannel {
    async fn emit(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }

        let mut line =
            serde_json::to_string(&message).map_err(|e| ChannelError::Encode(e.to_string()))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChannelError::Unreachable(e.to_string()))
    }

    async fn listen(
        &self,
        event: &str,
        deliver: mpsc::UnboundedSender<ChannelMessage>,
    ) -> Result<ListenerId, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        Ok(self.registry.add(event, deliver))
    }

    async fn unlisten(&self, id: ListenerId) -> Result<(), ChannelError> {
        self.registry.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::types::OutboundEvent;
    use serde_json::json;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_relay_exchanges_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            let first = lines.next_line().await.unwrap().unwrap();
            write_half
                .write_all(b"{\"event\":\"presence-confirmed\",\"data\":null}\n")
                .await
                .unwrap();
            first
        });

        let relay = RelayChannel::connect(&address).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        relay.listen("presence-confirmed", tx).await.unwrap();
        relay
            .send(&OutboundEvent::ConfirmArrival {
                room: "teleconsultation-9".to_string(),
            })
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "presence-confirmed");

        let sent: ChannelMessage = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent.event, "confirm-arrival");
        assert_eq!(sent.data, json!("teleconsultation-9"));
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(
            RelayChannel::connect(&address).await,
            Err(ChannelError::Unreachable(_))
        ));
    }
}
