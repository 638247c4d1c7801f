//! Heart-rate estimate derived from raw ECG amplitude.
//!
//! The estimate is the rounded mean absolute amplitude of the latest ten
//! samples. It is a coarse proxy with no baseline correction or R-peak
//! detection; its numbers are shown to patients, so changing the formula is
//! a product decision rather than a fix.

use std::collections::VecDeque;

use statrs::statistics::Statistics;

use crate::sensor::types::{Sample, SampleBatch};

/// Samples contributing to the estimate.
pub const ESTIMATE_SPAN: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct HeartRateEstimator {
    recent: VecDeque<Sample>,
}

impl HeartRateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch. Only the last [`ESTIMATE_SPAN`] samples are retained
    /// since older ones can never affect the estimate.
    pub fn update(&mut self, batch: &SampleBatch) {
        self.recent.extend(batch.samples.iter().copied());
        while self.recent.len() > ESTIMATE_SPAN {
            self.recent.pop_front();
        }
    }

    /// Current beats-per-minute estimate, absent until a sample arrived.
    pub fn estimate(&self) -> Option<u32> {
        if self.recent.is_empty() {
            return None;
        }

        let mean = self
            .recent
            .iter()
            .map(|&s| f64::from(s).abs())
            .mean();
        Some(mean.round() as u32)
    }
}
