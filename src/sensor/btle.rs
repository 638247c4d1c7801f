//! Bluetooth LE central backed by btleplug.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::provider::{BiosensorLink, BiosensorProvider};
use super::types::DeviceHandle;
use super::SensorError;

/// Scan results buffered between the adapter and the gateway.
const DISCOVERY_QUEUE: usize = 32;

/// Central role on the first Bluetooth adapter of the host.
pub struct BtleProvider {
    adapter: Adapter,
    service: Uuid,
    characteristic: Uuid,
    seen: Arc<Mutex<HashMap<String, Peripheral>>>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleProvider {
    /// Open the first adapter. Hosts without one report `CapabilityUnavailable`.
    pub async fn first_adapter(service: Uuid, characteristic: Uuid) -> Result<Self, SensorError> {
        let manager = Manager::new()
            .await
            .map_err(|e| SensorError::CapabilityUnavailable(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| SensorError::CapabilityUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SensorError::CapabilityUnavailable("no Bluetooth adapter found".to_string())
            })?;

        if let Ok(info) = adapter.adapter_info().await {
            tracing::info!("Using Bluetooth adapter {info}");
        }

        Ok(Self {
            adapter,
            service,
            characteristic,
            seen: Arc::new(Mutex::new(HashMap::new())),
            scan_task: Mutex::new(None),
        })
    }

    fn lookup(&self, device: &DeviceHandle) -> Option<Peripheral> {
        self.seen
            .lock()
            .ok()
            .and_then(|seen| seen.get(&device.id).cloned())
    }
}

#[async_trait]
impl BiosensorProvider for BtleProvider {
    async fn start_scan(&self) -> Result<mpsc::Receiver<DeviceHandle>, SensorError> {
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| SensorError::CapabilityUnavailable(e.to_string()))?;

        let (tx, rx) = mpsc::channel(DISCOVERY_QUEUE);
        let adapter = self.adapter.clone();
        let seen = self.seen.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let name = peripheral
                    .properties()
                    .await
                    .ok()
                    .flatten()
                    .and_then(|p| p.local_name);

                let key = format!("{id:?}");
                if let Ok(mut seen) = seen.lock() {
                    seen.insert(key.clone(), peripheral);
                }
                if tx.send(DeviceHandle::new(key, name)).await.is_err() {
                    break;
                }
            }
        });

        if let Ok(mut task) = self.scan_task.lock() {
            if let Some(previous) = task.replace(handle) {
                previous.abort();
            }
        }
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), SensorError> {
        if let Ok(mut task) = self.scan_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<Box<dyn BiosensorLink>, SensorError> {
        let peripheral = self.lookup(device).ok_or_else(|| {
            SensorError::ConnectionFailed(format!("{} is no longer visible", device.display_name()))
        })?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral
                .connect()
                .await
                .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;
        }
        peripheral
            .discover_services()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| {
                c.uuid == self.characteristic
                    && c.service_uuid == self.service
                    && c.properties.contains(CharPropFlags::NOTIFY)
            })
            .ok_or_else(|| {
                SensorError::ConnectionFailed("ECG characteristic not found".to_string())
            })?;

        Ok(Box::new(BtleLink {
            device: device.clone(),
            peripheral,
            characteristic,
            stream: Mutex::new(None),
        }))
    }
}

struct BtleLink {
    device: DeviceHandle,
    peripheral: Peripheral,
    characteristic: Characteristic,
    stream: Mutex<Option<JoinHandle<()>>>,
}

impl BtleLink {
    fn stop_stream(&self) {
        if let Ok(mut stream) = self.stream.lock() {
            if let Some(handle) = stream.take() {
                handle.abort();
            }
        }
    }
}

#[async_trait]
impl BiosensorLink for BtleLink {
    fn device(&self) -> &DeviceHandle {
        &self.device
    }

    async fn subscribe(&self, payloads: mpsc::Sender<Vec<u8>>) -> Result<(), SensorError> {
        self.peripheral
            .subscribe(&self.characteristic)
            .await
            .map_err(|e| SensorError::SubscribeFailed(e.to_string()))?;
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| SensorError::SubscribeFailed(e.to_string()))?;

        let uuid = self.characteristic.uuid;
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if payloads.send(notification.value).await.is_err() {
                    break;
                }
            }
        });

        if let Ok(mut stream) = self.stream.lock() {
            if let Some(previous) = stream.replace(handle) {
                previous.abort();
            }
        }
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), SensorError> {
        self.stop_stream();
        self.peripheral
            .unsubscribe(&self.characteristic)
            .await
            .map_err(|e| SensorError::SubscribeFailed(e.to_string()))
    }

    async fn disconnect(&self) -> Result<(), SensorError> {
        self.stop_stream();
        self.peripheral
            .disconnect()
            .await
            .map_err(|_| SensorError::Disconnected)
    }
}
