//! In-process biosensor.
//!
//! Advertises like a real sensor, accepts connections and streams either a
//! scripted list of payloads or a synthetic ECG trace. Used by tests and by
//! the CLI when no radio is present.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::decode::encode_samples;
use super::provider::{BiosensorLink, BiosensorProvider};
use super::types::{DeviceHandle, Sample};
use super::SensorError;

/// Samples per synthetic notification.
const SAMPLES_PER_PAYLOAD: usize = 16;

/// Synthetic samples per heartbeat (roughly 60 bpm at the default cadence).
const BEAT_PERIOD: usize = 128;

/// Call counters shared between the simulator and its links.
#[derive(Debug, Default)]
pub struct SimulatedLinkCounters {
    scans: AtomicUsize,
    scan_stopped: AtomicBool,
    connects: AtomicUsize,
    subscribes: AtomicUsize,
    unsubscribes: AtomicUsize,
    disconnects: AtomicUsize,
}

impl SimulatedLinkCounters {
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn scan_stopped(&self) -> bool {
        self.scan_stopped.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// A simulated biosensor and the radio that finds it.
pub struct SimulatedBiosensor {
    name: String,
    bystanders: Vec<String>,
    radio: bool,
    accept_connections: bool,
    script: Option<Vec<Vec<u8>>>,
    cadence: Duration,
    scan_delay: Duration,
    connect_delay: Duration,
    counters: Arc<SimulatedLinkCounters>,
}

impl SimulatedBiosensor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bystanders: Vec::new(),
            radio: true,
            accept_connections: true,
            script: None,
            cadence: Duration::from_millis(125),
            scan_delay: Duration::ZERO,
            connect_delay: Duration::ZERO,
            counters: Arc::new(SimulatedLinkCounters::default()),
        }
    }

    /// Other devices advertised before the sensor.
    pub fn with_bystanders(mut self, names: Vec<String>) -> Self {
        self.bystanders = names;
        self
    }

    /// Stream these payloads once instead of a synthetic trace.
    pub fn with_script(mut self, payloads: Vec<Vec<u8>>) -> Self {
        self.script = Some(payloads);
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = delay;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Behave like a platform without Bluetooth.
    pub fn without_radio(mut self) -> Self {
        self.radio = false;
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.accept_connections = false;
        self
    }

    pub fn counters(&self) -> Arc<SimulatedLinkCounters> {
        self.counters.clone()
    }
}

#[async_trait]
impl BiosensorProvider for SimulatedBiosensor {
    async fn start_scan(&self) -> Result<mpsc::Receiver<DeviceHandle>, SensorError> {
        if !self.radio {
            return Err(SensorError::CapabilityUnavailable(
                "no Bluetooth adapter in this environment".to_string(),
            ));
        }
        self.counters.scans.fetch_add(1, Ordering::SeqCst);
        self.counters.scan_stopped.store(false, Ordering::SeqCst);

        let mut names = self.bystanders.clone();
        names.push(self.name.clone());
        let delay = self.scan_delay;
        let (tx, rx) = mpsc::channel(names.len().max(1));

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for name in names {
                let device = DeviceHandle::new(Uuid::new_v4().to_string(), Some(name));
                if tx.send(device).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), SensorError> {
        self.counters.scan_stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<Box<dyn BiosensorLink>, SensorError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if !self.accept_connections {
            return Err(SensorError::ConnectionFailed(
                "service discovery did not complete".to_string(),
            ));
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SimulatedLink {
            device: device.clone(),
            script: self.script.clone(),
            cadence: self.cadence,
            counters: self.counters.clone(),
            stream: Mutex::new(None),
        }))
    }
}

struct SimulatedLink {
    device: DeviceHandle,
    script: Option<Vec<Vec<u8>>>,
    cadence: Duration,
    counters: Arc<SimulatedLinkCounters>,
    stream: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedLink {
    fn stop_stream(&self) {
        if let Ok(mut stream) = self.stream.lock() {
            if let Some(handle) = stream.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl BiosensorLink for SimulatedLink {
    fn device(&self) -> &DeviceHandle {
        &self.device
    }

    async fn subscribe(&self, payloads: mpsc::Sender<Vec<u8>>) -> Result<(), SensorError> {
        self.counters.subscribes.fetch_add(1, Ordering::SeqCst);

        let script = self.script.clone();
        let cadence = self.cadence;
        let handle = tokio::spawn(async move {
            match script {
                Some(script) => {
                    for payload in script {
                        if payloads.send(payload).await.is_err() {
                            return;
                        }
                    }
                }
                None => {
                    let mut ticker = tokio::time::interval(cadence);
                    let mut position = 0usize;
                    loop {
                        ticker.tick().await;
                        let samples: Vec<Sample> = (position..position + SAMPLES_PER_PAYLOAD)
                            .map(synthetic_sample)
                            .collect();
                        position += SAMPLES_PER_PAYLOAD;
                        if payloads.send(encode_samples(&samples)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        let mut stream = self
            .stream
            .lock()
            .map_err(|_| SensorError::SubscribeFailed("link state poisoned".to_string()))?;
        if let Some(previous) = stream.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), SensorError> {
        self.counters.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.stop_stream();
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SensorError> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        self.stop_stream();
        Ok(())
    }
}

/// A crude ECG shape: low baseline wander with a sharp QRS spike each beat.
fn synthetic_sample(index: usize) -> Sample {
    let phase = index % BEAT_PERIOD;
    let wander = ((index as f64 / BEAT_PERIOD as f64) * TAU).sin() * 40.0;
    let spike = match phase {
        0 => -150.0,
        1 => 900.0,
        2 => -300.0,
        _ => 0.0,
    };
    (wander + spike) as Sample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_trace_has_one_spike_per_beat() {
        let spikes = (0..BEAT_PERIOD * 4)
            .map(synthetic_sample)
            .filter(|s| *s > 500)
            .count();
        assert_eq!(spikes, 4);
    }

    #[tokio::test]
    async fn test_synthetic_stream_produces_even_payloads() {
        let sensor = SimulatedBiosensor::new("Movesense").with_cadence(Duration::from_millis(5));
        let device = DeviceHandle::new("sim", Some("Movesense".to_string()));
        let link = sensor.connect(&device).await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        link.subscribe(tx).await.unwrap();
        let payload = rx.recv().await.unwrap();
        assert_eq!(payload.len(), SAMPLES_PER_PAYLOAD * 2);

        link.disconnect().await.unwrap();
        assert_eq!(sensor.counters().disconnects(), 1);
    }
}
