//! Rolling ECG waveform window and its renderable path.

use serde::{Deserialize, Serialize};

use crate::sensor::types::{Sample, SampleBatch};

/// Samples retained for display.
pub const WINDOW_CAPACITY: usize = 300;

/// Horizontal distance between consecutive samples.
pub const X_SPACING: f64 = 2.0;

/// Y coordinate of a zero amplitude.
pub const BASELINE_Y: f64 = 150.0;

/// Amplitude to pixel scale.
pub const Y_SCALE: f64 = 0.1;

/// One vertex of the rendered trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

/// Fixed-capacity FIFO of the most recent samples.
#[derive(Debug, Clone, Default)]
pub struct WaveformBuffer {
    window: Vec<Sample>,
}

impl WaveformBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch and keep only the newest [`WINDOW_CAPACITY`] samples.
    ///
    /// The window is rebuilt rather than shifted so readers never observe a
    /// half-updated trace.
    pub fn push(&mut self, batch: &SampleBatch) {
        let total = self.window.len() + batch.samples.len();
        let excess = total.saturating_sub(WINDOW_CAPACITY);

        self.window = self
            .window
            .iter()
            .chain(batch.samples.iter())
            .skip(excess)
            .copied()
            .collect();
    }

    pub fn samples(&self) -> &[Sample] {
        &self.window
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Points of the trace, left to right. Empty when no samples arrived yet.
    pub fn render(&self) -> Vec<PathPoint> {
        self.window
            .iter()
            .enumerate()
            .map(|(i, &amplitude)| PathPoint {
                x: i as f64 * X_SPACING,
                y: BASELINE_Y - f64::from(amplitude) * Y_SCALE,
            })
            .collect()
    }

    /// The trace as an SVG path (`M x y L x y ...`).
    pub fn to_svg_path(&self) -> String {
        let mut path = String::new();
        for (i, point) in self.render().iter().enumerate() {
            let command = if i == 0 { "M" } else { " L" };
            path.push_str(&format!("{command} {} {}", point.x, point.y));
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(range: std::ops::Range<i16>) -> SampleBatch {
        SampleBatch::new(range.collect())
    }

    #[test]
    fn test_oldest_samples_evicted_first() {
        let mut buffer = WaveformBuffer::new();
        let b1 = batch(0..100);
        let b2 = batch(1000..1250);

        buffer.push(&b1);
        buffer.push(&b2);

        assert_eq!(buffer.len(), WINDOW_CAPACITY);
        let expected: Vec<Sample> = (50..100).chain(1000..1250).collect();
        assert_eq!(buffer.samples(), expected.as_slice());
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut buffer = WaveformBuffer::new();
        for start in (0..5000i16).step_by(137) {
            buffer.push(&batch(start..start + 137));
            assert!(buffer.len() <= WINDOW_CAPACITY);
        }
        assert_eq!(buffer.len(), WINDOW_CAPACITY);

        // A single oversized batch keeps only its tail.
        let mut buffer = WaveformBuffer::new();
        buffer.push(&batch(0..400));
        assert_eq!(buffer.samples().first(), Some(&100));
    }

    #[test]
    fn test_render_empty_buffer() {
        let buffer = WaveformBuffer::new();
        assert!(buffer.render().is_empty());
        assert_eq!(buffer.to_svg_path(), "");
    }

    #[test]
    fn test_render_scales_points() {
        let mut buffer = WaveformBuffer::new();
        buffer.push(&SampleBatch::new(vec![0, 500, -500]));

        let points = buffer.render();
        assert_eq!(points[0], PathPoint { x: 0.0, y: 150.0 });
        assert_eq!(points[1], PathPoint { x: 2.0, y: 100.0 });
        assert_eq!(points[2], PathPoint { x: 4.0, y: 200.0 });
        assert_eq!(buffer.to_svg_path(), "M 0 150 L 2 100 L 4 200");
    }
}
