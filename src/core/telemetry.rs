//! Telemetry frames sent to remote observers.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::sensor::types::Sample;

/// Samples received since the previous frame plus the derived heart rate, as
/// seen by the supervising professional. The heart rate may lag the samples
/// slightly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub group_id: Option<String>,
    pub patient_id: String,
    pub ecg_samples: Vec<Sample>,
    pub heart_rate: Option<u32>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl TelemetryFrame {
    pub fn new(
        group_id: Option<String>,
        patient_id: impl Into<String>,
        ecg_samples: Vec<Sample>,
        heart_rate: Option<u32>,
    ) -> Self {
        Self {
            group_id,
            patient_id: patient_id.into(),
            ecg_samples,
            heart_rate,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let frame = TelemetryFrame::new(
            Some("g-7".to_string()),
            "p-42",
            vec![-100, 50],
            Some(75),
        );
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["groupId"], "g-7");
        assert_eq!(json["patientId"], "p-42");
        assert_eq!(json["ecgSamples"], serde_json::json!([-100, 50]));
        assert_eq!(json["heartRate"], 75);
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_missing_heart_rate_is_null() {
        let frame = TelemetryFrame::new(None, "p-1", vec![1], None);
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json["heartRate"].is_null());
        assert!(json["groupId"].is_null());
    }
}
