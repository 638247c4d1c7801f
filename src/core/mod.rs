//! Signal processing and session bookkeeping.
//!
//! This module contains:
//! - The rolling waveform window and its renderable path
//! - The amplitude-based heart-rate estimate
//! - The elapsed-time session timer
//! - Telemetry frames for remote observers

pub mod heart_rate;
pub mod telemetry;
pub mod timer;
pub mod waveform;

pub use heart_rate::{HeartRateEstimator, ESTIMATE_SPAN};
pub use telemetry::TelemetryFrame;
pub use timer::{format_elapsed, SessionTimer};
pub use waveform::{PathPoint, WaveformBuffer, WINDOW_CAPACITY};
