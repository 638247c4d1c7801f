//! Capability traits implemented by radio backends.
//!
//! Both the simulated sensor and the btleplug central conform to these.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::DeviceHandle;
use super::SensorError;

/// Bluetooth LE central role, restricted to what the gateway needs.
#[async_trait]
pub trait BiosensorProvider: Send + Sync {
    /// Start scanning. Every discovered device is delivered on the returned
    /// receiver until [`stop_scan`](Self::stop_scan) is called.
    ///
    /// Fails with [`SensorError::CapabilityUnavailable`] when the platform
    /// cannot scan at all.
    async fn start_scan(&self) -> Result<mpsc::Receiver<DeviceHandle>, SensorError>;

    async fn stop_scan(&self) -> Result<(), SensorError>;

    /// Connect and discover services and characteristics.
    async fn connect(&self, device: &DeviceHandle) -> Result<Box<dyn BiosensorLink>, SensorError>;
}

/// An established link to one biosensor.
#[async_trait]
pub trait BiosensorLink: Send + Sync {
    fn device(&self) -> &DeviceHandle;

    /// Enable notifications on the data characteristic. Raw payloads are
    /// delivered in arrival order on `payloads`.
    async fn subscribe(&self, payloads: mpsc::Sender<Vec<u8>>) -> Result<(), SensorError>;

    async fn unsubscribe(&self) -> Result<(), SensorError>;

    async fn disconnect(&self) -> Result<(), SensorError>;
}
