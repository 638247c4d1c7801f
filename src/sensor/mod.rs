//! Biosensor gateway.
//!
//! Discovers the wearable ECG sensor, connects, subscribes to its data
//! characteristic and decodes each update into a [`SampleBatch`]. The radio
//! itself is a capability supplied through [`BiosensorProvider`]; when no
//! provider exists the session runs without live telemetry.

pub mod decode;
pub mod gateway;
pub mod provider;
pub mod simulated;
pub mod types;

#[cfg(feature = "ble")]
pub mod btle;

pub use decode::{decode_payload, encode_samples, Decoded};
pub use gateway::SensorGateway;
pub use provider::{BiosensorLink, BiosensorProvider};
pub use simulated::{SimulatedBiosensor, SimulatedLinkCounters};
pub use types::{DeviceHandle, LinkState, Sample, SampleBatch, SensorStatus};

#[cfg(feature = "ble")]
pub use btle::BtleProvider;

/// Errors raised by the sensor gateway and its providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No Bluetooth support in this execution context
    CapabilityUnavailable(String),
    ScanFailed(String),
    ConnectionFailed(String),
    SubscribeFailed(String),
    NotConnected,
    Disconnected,
}

impl SensorError {
    /// Whether the failure means the platform cannot do Bluetooth at all.
    pub fn is_capability_absent(&self) -> bool {
        matches!(self, SensorError::CapabilityUnavailable(_))
    }
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::CapabilityUnavailable(e) => write!(f, "Bluetooth unavailable: {e}"),
            SensorError::ScanFailed(e) => write!(f, "Scan failed: {e}"),
            SensorError::ConnectionFailed(e) => write!(f, "Connection failed: {e}"),
            SensorError::SubscribeFailed(e) => write!(f, "Subscription failed: {e}"),
            SensorError::NotConnected => write!(f, "No sensor connected"),
            SensorError::Disconnected => write!(f, "Sensor disconnected"),
        }
    }
}

impl std::error::Error for SensorError {}
