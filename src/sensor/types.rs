//! Sample and device types produced by the sensor gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single signed ECG amplitude value.
pub type Sample = i16;

/// An ordered run of samples decoded from one characteristic update.
///
/// Samples are only meaningful in sequence; a batch is never reordered or split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBatch {
    /// When the update was decoded
    pub received_at: DateTime<Utc>,
    /// Decoded samples in wire order
    pub samples: Vec<Sample>,
}

impl SampleBatch {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            received_at: Utc::now(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Platform identifier (MAC address, peripheral id, or simulated id)
    pub id: String,
    /// Advertised local name, if any
    pub name: Option<String>,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// Whether the advertised name contains the expected sensor family.
    pub fn matches(&self, name_filter: &str) -> bool {
        self.name
            .as_deref()
            .map(|name| name.contains(name_filter))
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed sensor)")
    }
}

/// Biosensor link state.
///
/// Moves forward only; any teardown returns to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Disconnected,
    Scanning,
    Connected,
    Subscribed,
}

/// Observable sensor status surfaced to the session screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    /// Session type carries no biometrics
    NotApplicable,
    /// Waiting for the session to become active
    Idle,
    Searching,
    Connected(String),
    Streaming,
    /// Platform has no Bluetooth capability; the session continues without telemetry
    Unavailable,
    /// Handshake failed; the user may retry manually
    Failed(String),
}

impl SensorStatus {
    pub fn message(&self) -> String {
        match self {
            SensorStatus::NotApplicable => "No sensor for this session".to_string(),
            SensorStatus::Idle => "Sensor idle".to_string(),
            SensorStatus::Searching => "Searching for sensor...".to_string(),
            SensorStatus::Connected(name) => format!("Connected to {name}"),
            SensorStatus::Streaming => "Live ECG".to_string(),
            SensorStatus::Unavailable => "Sensor unavailable on this device".to_string(),
            SensorStatus::Failed(reason) => format!("Sensor connection failed: {reason}"),
        }
    }
}
