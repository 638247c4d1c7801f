//! Biosensor characteristic payload decoding.
//!
//! The ECG characteristic carries consecutive little-endian signed 16-bit
//! integers. A trailing odd byte is a decode anomaly: it is dropped and
//! reported, never raised.

use super::types::Sample;

/// Result of decoding one characteristic payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub samples: Vec<Sample>,
    /// Number of trailing bytes discarded (0 or 1)
    pub dropped_bytes: usize,
}

/// Decode a payload into samples, discarding any trailing odd byte.
pub fn decode_payload(payload: &[u8]) -> Decoded {
    let chunks = payload.chunks_exact(2);
    let dropped_bytes = chunks.remainder().len();
    let samples = chunks
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Decoded {
        samples,
        dropped_bytes,
    }
}

/// Encode samples back into wire form. Used by the simulated sensor.
pub fn encode_samples(samples: &[Sample]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_payload() {
        let decoded = decode_payload(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F]);
        assert_eq!(decoded.samples, vec![1, -1, i16::MIN, i16::MAX]);
        assert_eq!(decoded.dropped_bytes, 0);
    }

    #[test]
    fn test_odd_payload_drops_trailing_byte() {
        let decoded = decode_payload(&[0x9C, 0xFF, 0x32, 0x00, 0x07]);
        assert_eq!(decoded.samples, vec![-100, 50]);
        assert_eq!(decoded.dropped_bytes, 1);
    }

    #[test]
    fn test_degenerate_payloads() {
        assert!(decode_payload(&[]).samples.is_empty());

        let single = decode_payload(&[0x42]);
        assert!(single.samples.is_empty());
        assert_eq!(single.dropped_bytes, 1);
    }

    #[test]
    fn test_sample_count_matches_half_length() {
        for len in 0..64usize {
            let payload: Vec<u8> = (0..len).map(|i| (i * 37) as u8).collect();
            let decoded = decode_payload(&payload);
            assert_eq!(decoded.samples.len(), len / 2);
            assert_eq!(decoded.dropped_bytes, len % 2);
        }
    }

    #[test]
    fn test_encode_matches_wire_order() {
        assert_eq!(encode_samples(&[-100, 50]), vec![0x9C, 0xFF, 0x32, 0x00]);
    }
}
