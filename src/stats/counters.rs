//! Session activity counters.
//!
//! Tracks what a session did (batches decoded, frames sent, calls placed)
//! without retaining any sample data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Sample batches received from the sensor
    batches_received: AtomicU64,
    /// Samples decoded across all batches
    samples_decoded: AtomicU64,
    /// Trailing odd bytes discarded while decoding
    bytes_dropped: AtomicU64,
    /// Inbound channel events accepted by the coordinator
    events_received: AtomicU64,
    /// Telemetry frames emitted to remote observers
    frames_sent: AtomicU64,
    /// Video calls started
    calls_started: AtomicU64,
    /// Incoming-call rings
    rings: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            samples_decoded: AtomicU64::new(0),
            bytes_dropped: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            calls_started: AtomicU64::new(0),
            rings: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create counters that accumulate on top of previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous session stats: {e}");
        }

        stats
    }

    /// Record one decoded batch.
    pub fn record_batch(&self, samples: usize) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.samples_decoded
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_dropped_bytes(&self, count: usize) {
        self.bytes_dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call_started(&self) {
        self.calls_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ring(&self) {
        self.rings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            samples_decoded: self.samples_decoded.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            calls_started: self.calls_started.load(Ordering::Relaxed),
            rings: self.rings.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary string for display at the end of a session.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - ECG batches received: {}\n\
             - Samples decoded: {}\n\
             - Malformed trailing bytes dropped: {}\n\
             - Channel events received: {}\n\
             - Telemetry frames sent: {}\n\
             - Video calls started: {}\n\
             - Incoming-call rings: {}\n\
             - Session duration: {} seconds",
            stats.batches_received,
            stats.samples_decoded,
            stats.bytes_dropped,
            stats.events_received,
            stats.frames_sent,
            stats.calls_started,
            stats.rings,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                batches_received: stats.batches_received,
                samples_decoded: stats.samples_decoded,
                bytes_dropped: stats.bytes_dropped,
                frames_sent: stats.frames_sent,
                calls_started: stats.calls_started,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.batches_received
                    .store(persisted.batches_received, Ordering::Relaxed);
                self.samples_decoded
                    .store(persisted.samples_decoded, Ordering::Relaxed);
                self.bytes_dropped
                    .store(persisted.bytes_dropped, Ordering::Relaxed);
                self.frames_sent
                    .store(persisted.frames_sent, Ordering::Relaxed);
                self.calls_started
                    .store(persisted.calls_started, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.batches_received.store(0, Ordering::Relaxed);
        self.samples_decoded.store(0, Ordering::Relaxed);
        self.bytes_dropped.store(0, Ordering::Relaxed);
        self.events_received.store(0, Ordering::Relaxed);
        self.frames_sent.store(0, Ordering::Relaxed);
        self.calls_started.store(0, Ordering::Relaxed);
        self.rings.store(0, Ordering::Relaxed);
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub batches_received: u64,
    pub samples_decoded: u64,
    pub bytes_dropped: u64,
    pub events_received: u64,
    pub frames_sent: u64,
    pub calls_started: u64,
    pub rings: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Cumulative totals kept across sessions.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    batches_received: u64,
    samples_decoded: u64,
    bytes_dropped: u64,
    frames_sent: u64,
    calls_started: u64,
    last_updated: DateTime<Utc>,
}

pub type SharedSessionStats = Arc<SessionStats>;

pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedSessionStats {
    Arc::new(SessionStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = SessionStats::new();

        stats.record_batch(20);
        stats.record_batch(12);
        stats.record_dropped_bytes(1);
        stats.record_call_started();

        let snapshot = stats.stats();
        assert_eq!(snapshot.batches_received, 2);
        assert_eq!(snapshot.samples_decoded, 32);
        assert_eq!(snapshot.bytes_dropped, 1);
        assert_eq!(snapshot.calls_started, 1);
    }

    #[test]
    fn test_reset() {
        let stats = SessionStats::new();
        stats.record_batch(100);
        stats.record_frame_sent();
        stats.reset();

        let snapshot = stats.stats();
        assert_eq!(snapshot.batches_received, 0);
        assert_eq!(snapshot.frames_sent, 0);
    }

    #[test]
    fn test_persistence_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_stats.json");

        let first = SessionStats::with_persistence(path.clone());
        first.record_batch(10);
        first.record_call_started();
        first.save().unwrap();

        let second = SessionStats::with_persistence(path);
        second.record_batch(5);
        let snapshot = second.stats();
        assert_eq!(snapshot.batches_received, 2);
        assert_eq!(snapshot.samples_decoded, 15);
        assert_eq!(snapshot.calls_started, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionStats::new().summary();
        assert!(summary.contains("ECG batches received"));
        assert!(summary.contains("Video calls started"));
    }
}
