//! Listener bookkeeping shared by channel transports.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{ChannelMessage, ListenerId};

type Entry = (ListenerId, mpsc::UnboundedSender<ChannelMessage>);

/// Event-name → listeners map. Every registration gets a fresh id, so a
/// removed listener can never be revived.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<String, Vec<Entry>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        event: &str,
        deliver: mpsc::UnboundedSender<ChannelMessage>,
    ) -> ListenerId {
        let id = Uuid::new_v4();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners
                .entry(event.to_string())
                .or_default()
                .push((id, deliver));
        }
        id
    }

    /// Remove a listener. Returns false when it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };

        let mut removed = false;
        listeners.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    /// Hand a message to every listener of its event. Returns the number of
    /// listeners reached; closed listeners are pruned. Listener queues are
    /// unbounded, so a slow listener never loses a control event.
    pub fn dispatch(&self, message: &ChannelMessage) -> usize {
        let Ok(mut listeners) = self.listeners.lock() else {
            return 0;
        };
        let Some(entries) = listeners.get_mut(&message.event) else {
            return 0;
        };

        let mut delivered = 0;
        entries.retain(|(id, deliver)| match deliver.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!("Listener {id} closed, pruning");
                false
            }
        });
        delivered
    }

    pub fn count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.get(event).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_add_dispatch_remove() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = registry.add("presence-confirmed", tx);
        assert_eq!(registry.count("presence-confirmed"), 1);

        let delivered = registry.dispatch(&ChannelMessage::new("presence-confirmed", Value::Null));
        assert_eq!(delivered, 1);
        assert_eq!(rx.try_recv().unwrap().event, "presence-confirmed");

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.total(), 0);
        assert_eq!(
            registry.dispatch(&ChannelMessage::new("presence-confirmed", Value::Null)),
            0
        );
    }

    #[test]
    fn test_burst_is_delivered_in_full() {
        let registry = ListenerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.add("incoming-call", tx);

        for _ in 0..100 {
            assert_eq!(
                registry.dispatch(&ChannelMessage::new("incoming-call", Value::Null)),
                1
            );
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 100);
    }

    #[test]
    fn test_closed_listeners_are_pruned() {
        let registry = ListenerRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.add("incoming-call", tx);
        drop(rx);

        assert_eq!(
            registry.dispatch(&ChannelMessage::new("incoming-call", Value::Null)),
            0
        );
        assert_eq!(registry.count("incoming-call"), 0);
    }
}
