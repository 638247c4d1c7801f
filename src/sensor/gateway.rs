//! Scan, connect and subscribe to the biosensor.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::decode::decode_payload;
use super::provider::{BiosensorLink, BiosensorProvider};
use super::types::{DeviceHandle, LinkState, SampleBatch};
use super::SensorError;
use crate::stats::SharedSessionStats;

/// Payload queue depth between the radio and the decoder.
const PAYLOAD_QUEUE: usize = 64;

/// Owns the single biosensor link of a session.
pub struct SensorGateway {
    provider: Arc<dyn BiosensorProvider>,
    name_filter: String,
    state: LinkState,
    link: Option<Box<dyn BiosensorLink>>,
    pump: Option<JoinHandle<()>>,
    stats: SharedSessionStats,
}

impl SensorGateway {
    pub fn new(
        provider: Arc<dyn BiosensorProvider>,
        name_filter: impl Into<String>,
        stats: SharedSessionStats,
    ) -> Self {
        Self {
            provider,
            name_filter: name_filter.into(),
            state: LinkState::Disconnected,
            link: None,
            pump: None,
            stats,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Scan until the first device whose name contains the sensor family
    /// filter, then stop scanning.
    pub async fn scan(&mut self) -> Result<DeviceHandle, SensorError> {
        self.state = LinkState::Scanning;

        let mut discovered = match self.provider.start_scan().await {
            Ok(rx) => rx,
            Err(e) => {
                self.state = LinkState::Disconnected;
                return Err(e);
            }
        };

        tracing::debug!("Scanning for '{}' sensors", self.name_filter);
        while let Some(device) = discovered.recv().await {
            if !device.matches(&self.name_filter) {
                tracing::trace!("Ignoring device {}", device.display_name());
                continue;
            }

            if let Err(e) = self.provider.stop_scan().await {
                tracing::warn!("Failed to stop scan: {e}");
            }
            self.state = LinkState::Disconnected;
            tracing::info!("Sensor detected: {}", device.display_name());
            return Ok(device);
        }

        let _ = self.provider.stop_scan().await;
        self.state = LinkState::Disconnected;
        Err(SensorError::ScanFailed(
            "scan ended before a matching sensor was found".to_string(),
        ))
    }

    /// Connect to a scanned device. A second connect while linked is a no-op.
    pub async fn connect(&mut self, device: &DeviceHandle) -> Result<(), SensorError> {
        if self.link.is_some() {
            tracing::debug!("Already connected, ignoring connect");
            return Ok(());
        }

        match self.provider.connect(device).await {
            Ok(link) => {
                tracing::info!("Connected to {}", device.display_name());
                self.link = Some(link);
                self.state = LinkState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                Err(e)
            }
        }
    }

    /// Register a persistent listener on the data characteristic.
    ///
    /// Each update is decoded and handed to `on_batch` synchronously, in
    /// arrival order. Updates that decode to zero samples are skipped.
    pub async fn subscribe<F>(&mut self, mut on_batch: F) -> Result<(), SensorError>
    where
        F: FnMut(SampleBatch) + Send + 'static,
    {
        let link = self.link.as_ref().ok_or(SensorError::NotConnected)?;
        if self.pump.is_some() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(PAYLOAD_QUEUE);
        link.subscribe(tx).await?;

        let stats = self.stats.clone();
        self.pump = Some(tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let decoded = decode_payload(&payload);
                if decoded.dropped_bytes > 0 {
                    tracing::debug!(
                        "Dropped {} trailing byte(s) from {}-byte payload",
                        decoded.dropped_bytes,
                        payload.len()
                    );
                    stats.record_dropped_bytes(decoded.dropped_bytes);
                }
                if decoded.samples.is_empty() {
                    continue;
                }

                stats.record_batch(decoded.samples.len());
                on_batch(SampleBatch::new(decoded.samples));
            }
        }));

        self.state = LinkState::Subscribed;
        tracing::info!("Subscribed to ECG stream");
        Ok(())
    }

    /// Stop the ECG subscription. Safe to call in any state.
    pub async fn unsubscribe(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        if self.state == LinkState::Subscribed {
            if let Some(link) = self.link.as_ref() {
                if let Err(e) = link.unsubscribe().await {
                    tracing::warn!("Unsubscribe failed: {e}");
                }
            }
            self.state = LinkState::Connected;
            tracing::info!("ECG subscription stopped");
        }
    }

    /// Stop a scan left running by an abandoned [`scan`](Self::scan),
    /// unsubscribe and drop the link. Safe to call in any state; failures are
    /// logged and swallowed.
    pub async fn disconnect(&mut self) {
        if self.state == LinkState::Scanning {
            if let Err(e) = self.provider.stop_scan().await {
                tracing::warn!("Failed to stop abandoned scan: {e}");
            }
            tracing::debug!("Abandoned scan stopped");
        }

        self.unsubscribe().await;

        if let Some(link) = self.link.take() {
            match link.disconnect().await {
                Ok(()) => tracing::info!("Disconnected from {}", link.device().display_name()),
                Err(e) => tracing::warn!("Disconnect failed: {e}"),
            }
        }
        self.state = LinkState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::simulated::SimulatedBiosensor;
    use crate::stats::create_shared_stats;
    use std::time::Duration;

    fn gateway(sensor: &Arc<SimulatedBiosensor>) -> SensorGateway {
        SensorGateway::new(sensor.clone(), "Movesense", create_shared_stats())
    }

    #[tokio::test]
    async fn test_scan_skips_non_matching_devices() {
        let sensor = Arc::new(
            SimulatedBiosensor::new("Movesense 175030000123")
                .with_bystanders(vec!["Polar H10".to_string(), "Headphones".to_string()]),
        );
        let mut gw = gateway(&sensor);

        let device = gw.scan().await.unwrap();
        assert_eq!(device.name.as_deref(), Some("Movesense 175030000123"));
        assert!(sensor.counters().scan_stopped());
    }

    #[tokio::test]
    async fn test_scan_without_capability() {
        let sensor = Arc::new(SimulatedBiosensor::new("Movesense").without_radio());
        let mut gw = gateway(&sensor);

        let err = gw.scan().await.unwrap_err();
        assert!(err.is_capability_absent());
        assert_eq!(gw.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let sensor = Arc::new(SimulatedBiosensor::new("Movesense").refusing_connections());
        let mut gw = gateway(&sensor);

        let device = gw.scan().await.unwrap();
        let err = gw.connect(&device).await.unwrap_err();
        assert!(matches!(err, SensorError::ConnectionFailed(_)));
        assert_eq!(gw.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_subscribe_decodes_batches_in_order() {
        let sensor = Arc::new(SimulatedBiosensor::new("Movesense").with_script(vec![
            vec![0x9C, 0xFF, 0x32, 0x00],
            vec![0x07],
            vec![0xB0, 0xFF, 0x01],
        ]));
        let stats = create_shared_stats();
        let mut gw = SensorGateway::new(sensor.clone(), "Movesense", stats.clone());

        let device = gw.scan().await.unwrap();
        gw.connect(&device).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        gw.subscribe(move |batch| {
            let _ = tx.send(batch);
        })
        .await
        .unwrap();
        assert_eq!(gw.state(), LinkState::Subscribed);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.samples, vec![-100, 50]);
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.samples, vec![-80]);

        let snapshot = stats.stats();
        assert_eq!(snapshot.batches_received, 2);
        assert_eq!(snapshot.bytes_dropped, 2);
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let sensor = Arc::new(SimulatedBiosensor::new("Movesense"));
        let mut gw = gateway(&sensor);
        let err = gw.subscribe(|_| {}).await.unwrap_err();
        assert_eq!(err, SensorError::NotConnected);
    }

    #[tokio::test]
    async fn test_disconnect_stops_abandoned_scan() {
        let sensor = Arc::new(
            SimulatedBiosensor::new("Movesense").with_scan_delay(Duration::from_millis(200)),
        );
        let mut gw = gateway(&sensor);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), gw.scan()).await;
        assert!(abandoned.is_err());
        assert_eq!(gw.state(), LinkState::Scanning);
        assert!(!sensor.counters().scan_stopped());

        gw.disconnect().await;
        assert!(sensor.counters().scan_stopped());
        assert_eq!(gw.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let sensor = Arc::new(SimulatedBiosensor::new("Movesense"));
        let mut gw = gateway(&sensor);

        // Never connected: both are no-ops.
        gw.unsubscribe().await;
        gw.disconnect().await;

        let device = gw.scan().await.unwrap();
        gw.connect(&device).await.unwrap();
        gw.subscribe(|_| {}).await.unwrap();

        gw.unsubscribe().await;
        gw.unsubscribe().await;
        gw.disconnect().await;
        gw.disconnect().await;

        let counters = sensor.counters();
        assert_eq!(counters.unsubscribes(), 1);
        assert_eq!(counters.disconnects(), 1);
        assert_eq!(gw.state(), LinkState::Disconnected);
    }
}
