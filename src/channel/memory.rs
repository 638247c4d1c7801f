//! In-process event hub.
//!
//! Stands in for the relay server: tests and offline demos push inbound
//! events with [`LocalEventHub::inject`] and inspect what was emitted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::registry::ListenerRegistry;
use super::types::{ChannelMessage, ListenerId};
use super::{ChannelError, EventChannel};

#[derive(Debug)]
pub struct LocalEventHub {
    registry: ListenerRegistry,
    emitted: Mutex<Vec<ChannelMessage>>,
    reachable: AtomicBool,
}

impl LocalEventHub {
    pub fn new() -> Self {
        Self {
            registry: ListenerRegistry::new(),
            emitted: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Deliver an event as if the server had pushed it. Returns the number of
    /// listeners reached.
    pub fn inject(&self, event: &str, data: Value) -> usize {
        self.registry.dispatch(&ChannelMessage::new(event, data))
    }

    /// Simulate losing (or regaining) the connection to the server.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Every message emitted so far, oldest first.
    pub fn emitted(&self) -> Vec<ChannelMessage> {
        self.emitted
            .lock()
            .map(|emitted| emitted.clone())
            .unwrap_or_default()
    }

    pub fn emitted_named(&self, event: &str) -> Vec<ChannelMessage> {
        self.emitted()
            .into_iter()
            .filter(|m| m.event == event)
            .collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.count(event)
    }

    pub fn total_listeners(&self) -> usize {
        self.registry.total()
    }

    fn ensure_reachable(&self) -> Result<(), ChannelError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChannelError::Unreachable("hub offline".to_string()))
        }
    }
}

impl Default for LocalEventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventChannel for LocalEventHub {
    async fn emit(&self, message: ChannelMessage) -> Result<(), ChannelError> {
        self.ensure_reachable()?;
        if let Ok(mut emitted) = self.emitted.lock() {
            emitted.push(message);
        }
        Ok(())
    }

    async fn listen(
        &self,
        event: &str,
        deliver: mpsc::UnboundedSender<ChannelMessage>,
    ) -> Result<ListenerId, ChannelError> {
        self.ensure_reachable()?;
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

    #[tokio::test]
    async fn test_inject_reaches_listener() {
        let hub = LocalEventHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.listen("presence-confirmed", tx).await.unwrap();

        assert_eq!(hub.inject("presence-confirmed", json!(null)), 1);
        assert_eq!(rx.recv().await.unwrap().event, "presence-confirmed");
    }

    #[tokio::test]
    async fn test_offline_hub_rejects_traffic() {
        let hub = LocalEventHub::new();
        hub.set_reachable(false);

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            hub.listen("presence-confirmed", tx).await,
            Err(ChannelError::Unreachable(_))
        ));
        let join = OutboundEvent::JoinRoom {
            room: "r".to_string(),
        };
        assert!(hub.send(&join).await.is_err());
        assert!(hub.emitted().is_empty());
    }

    #[tokio::test]
    async fn test_records_emitted_messages() {
        let hub = LocalEventHub::new();
        hub.send(&OutboundEvent::ConfirmArrival {
            room: "teleconsultation-1".to_string(),
        })
        .await
        .unwrap();

        let sent = hub.emitted_named("confirm-arrival");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, json!("teleconsultation-1"));
    }
}
