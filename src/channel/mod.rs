//! Real-time event channel.
//!
//! Named events scoped by room identifier, exchanged with the session relay
//! server. The coordinator only sees the [`EventChannel`] trait; transports
//! are an in-process hub and a JSON-lines TCP relay client.

pub mod memory;
pub mod registry;
pub mod relay;
pub mod types;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use memory::LocalEventHub;
pub use registry::ListenerRegistry;
pub use relay::RelayChannel;
pub use types::{
    room_available_event, ChannelMessage, InboundEvent, ListenerId, OutboundEvent,
    INCOMING_CALL, PRESENCE_CONFIRMED,
};

/// Channel failures. A session that cannot reach the channel stays in its
/// waiting state until the user leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    Unreachable(String),
    Encode(String),
    Closed,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Unreachable(e) => write!(f, "Event channel unreachable: {e}"),
            ChannelError::Encode(e) => write!(f, "Event encoding failed: {e}"),
            ChannelError::Closed => write!(f, "Event channel closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Bidirectional named-event channel.
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn emit(&self, message: ChannelMessage) -> Result<(), ChannelError>;

    /// Register a listener for `event`. Matching messages are delivered to
    /// `deliver` until [`unlisten`](Self::unlisten) is called with the
    /// returned id. Each call creates a new registration.
    async fn listen(
        &self,
        event: &str,
        deliver: mpsc::UnboundedSender<ChannelMessage>,
    ) -> Result<ListenerId, ChannelError>;

    /// Remove a listener. Removing an unknown id is not an error.
    async fn unlisten(&self, id: ListenerId) -> Result<(), ChannelError>;

    async fn send(&self, event: &OutboundEvent) -> Result<(), ChannelError> {
        self.emit(event.to_message()?).await
    }
}
