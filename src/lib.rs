//! CardioHub Session - real-time telemetry and session coordination for
//! remote cardiac rehabilitation.
//!
//! A patient joins a scheduled activity (solo or group exercise, group
//! education workshop, video consultation) while a wearable ECG sensor
//! streams samples that are displayed live and reduced to a heart-rate
//! estimate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SessionCoordinator                          │
//! │   AwaitingRoom → Active → Ended                                  │
//! │   AwaitingProfessional → {RingingIncoming | VisioActive} → Ended │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐      │
//! │  │SensorGateway │──▶│WaveformBuffer│   │  EventChannel    │◀──▶ relay
//! │  │ scan/connect │   │  (300 FIFO)  │   │ room-scoped      │      │
//! │  │ /subscribe   │──▶│HeartRate est.│──▶│ events+telemetry │      │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘      │
//! │         ▲                                                        │
//! │  BiosensorProvider      VideoCall / AlertTone      SessionTimer  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hardware and media are injected as [`Capabilities`]; a missing capability
//! degrades the session instead of failing it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cardiohub_session::{
//!     channel::LocalEventHub, sensor::SimulatedBiosensor, stats::create_shared_stats,
//!     Capabilities, CoordinatorSettings, Session, SessionCoordinator, UserAction,
//! };
//!
//! # async fn demo() {
//! let hub = Arc::new(LocalEventHub::new());
//! let sensor = Arc::new(SimulatedBiosensor::new("Movesense 175030000123"));
//! let mut coordinator = SessionCoordinator::new(
//!     Session::solo("42"),
//!     hub,
//!     Capabilities::none().with_sensor(sensor),
//!     CoordinatorSettings::default(),
//!     create_shared_stats(),
//! );
//!
//! let (actions, rx) = tokio::sync::mpsc::channel(8);
//! let session = tokio::spawn(async move { coordinator.run(rx).await });
//! actions.send(UserAction::Leave).await.unwrap();
//! session.await.unwrap();
//! # }
//! ```

pub mod call;
pub mod channel;
pub mod config;
pub mod core;
pub mod sensor;
pub mod session;
pub mod stats;

// Re-export key types at crate root for convenience
pub use call::{AlertTone, CallError, CallIdentity, VideoCall};
pub use channel::{ChannelError, ChannelMessage, EventChannel};
pub use config::Config;
pub use core::{format_elapsed, HeartRateEstimator, SessionTimer, TelemetryFrame, WaveformBuffer};
pub use sensor::{decode_payload, SampleBatch, SensorError, SensorGateway, SensorStatus};
pub use session::{
    Capabilities, CoordinatorSettings, Notice, Session, SessionCoordinator, SessionState,
    SessionType, SessionUpdate, UserAction,
};
pub use stats::{SessionStats, SharedSessionStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown next to the live heart rate.
pub const HEART_RATE_DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 CARDIOHUB - LIVE HEART RATE NOTICE               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  The heart rate shown during a session is an ESTIMATE derived    ║
║  from the mean amplitude of the last ECG samples.                ║
║                                                                  ║
║  ✗ It is NOT a beat-to-beat measurement and is NOT suitable      ║
║    for diagnosis.                                                ║
║                                                                  ║
║  ✓ Your care team sees the raw ECG trace alongside it.           ║
║                                                                  ║
║  Stop exercising and alert your care team if you feel unwell.    ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disclaimer_contents() {
        assert!(HEART_RATE_DISCLAIMER.contains("ESTIMATE"));
        assert!(HEART_RATE_DISCLAIMER.contains("NOT suitable"));
    }
}
