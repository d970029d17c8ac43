//! Wire codec for audio exchanged with the remote service.
//!
//! Outbound: float samples → 16-bit little-endian PCM → base64.
//! Inbound: base64 → 16-bit little-endian PCM → float frame.

use crate::audio::frame::AudioFrame;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

/// Width of one PCM sample on the wire.
const SAMPLE_BYTES: usize = 2;

/// Scale between the float range and i16.
const I16_SCALE: f32 = 32768.0;

/// Base64-encoded 16-bit PCM, tagged with its sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireAudioPayload {
    data: String,
    sample_rate: u32,
}

impl WireAudioPayload {
    /// Wraps base64 text received from the channel.
    pub fn from_base64(data: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            data: data.into(),
            sample_rate,
        }
    }

    pub fn as_base64(&self) -> &str {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// MIME type the service expects for this payload.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Reasons an inbound payload cannot be turned into a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed base64 audio: {0}")]
    Transport(#[from] base64::DecodeError),

    #[error("payload of {len} bytes is not a whole number of 16-bit samples")]
    MisalignedLength { len: usize },

    #[error("target channel count must be at least 1")]
    InvalidChannels,
}

/// Converts one float sample to i16, clamping out-of-range input.
fn to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    (clamped * I16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encodes captured samples for transport.
///
/// Samples outside [-1, 1] are clamped, never rejected. Empty input yields an
/// empty payload.
pub fn encode(samples: &[f32], sample_rate: u32) -> WireAudioPayload {
    let mut bytes = Vec::with_capacity(samples.len() * SAMPLE_BYTES);
    for &sample in samples {
        bytes.extend_from_slice(&to_i16(sample).to_le_bytes());
    }
    WireAudioPayload {
        data: BASE64.encode(&bytes),
        sample_rate,
    }
}

/// Decodes a payload into a frame with `target_channels` interleaved channels.
///
/// The service sends mono audio; extra channels repeat the mono sample.
pub fn decode(
    payload: &WireAudioPayload,
    target_sample_rate: u32,
    target_channels: u16,
) -> Result<AudioFrame, DecodeError> {
    if target_channels == 0 {
        return Err(DecodeError::InvalidChannels);
    }

    let bytes = BASE64.decode(payload.as_base64())?;
    if bytes.len() % SAMPLE_BYTES != 0 {
        return Err(DecodeError::MisalignedLength { len: bytes.len() });
    }

    let channels = target_channels as usize;
    let mut samples = Vec::with_capacity(bytes.len() / SAMPLE_BYTES * channels);
    for pair in bytes.chunks_exact(SAMPLE_BYTES) {
        let value = i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE;
        samples.extend(std::iter::repeat_n(value, channels));
    }

    Ok(AudioFrame::new(samples, target_sample_rate, target_channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One i16 step in float units.
    const QUANTUM: f32 = 1.0 / 32768.0;

    #[test]
    fn test_empty_input_gives_empty_payload() {
        let payload = encode(&[], 16000);
        assert!(payload.is_empty());
        let frame = decode(&payload, 24000, 1).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_encode_known_bytes() {
        // 0.5 → 16384 = 0x4000, little-endian [0x00, 0x40]
        let payload = encode(&[0.0, 0.5], 16000);
        let bytes = BASE64.decode(payload.as_base64()).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x40]);
        assert_eq!(payload.mime_type(), "audio/pcm;rate=16000");
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let payload = encode(&[2.0, -3.0, 1.0, -1.0, f32::NAN], 16000);
        let bytes = BASE64.decode(payload.as_base64()).unwrap();
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(values, vec![i16::MAX, i16::MIN, i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..2000)
            .map(|i| ((i as f32) * 0.013).sin() * 0.9)
            .collect();
        let payload = encode(&samples, 16000);
        let frame = decode(&payload, 16000, 1).unwrap();

        assert_eq!(frame.samples().len(), samples.len());
        for (original, decoded) in samples.iter().zip(frame.samples()) {
            assert!(
                (original - decoded).abs() <= QUANTUM,
                "{original} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn test_round_trip_extremes() {
        let samples = [-1.0f32, 0.0, 0.999];
        let frame = decode(&encode(&samples, 24000), 24000, 1).unwrap();
        assert_eq!(frame.samples()[0], -1.0);
        assert_eq!(frame.samples()[1], 0.0);
        assert!((frame.samples()[2] - 0.999).abs() <= QUANTUM);
    }

    #[test]
    fn test_decode_duplicates_mono_into_stereo() {
        let payload = encode(&[0.25, -0.5], 24000);
        let frame = decode(&payload, 24000, 2).unwrap();
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.samples(), &[0.25, 0.25, -0.5, -0.5]);
        assert_eq!(frame.frame_count(), 2);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        let payload = WireAudioPayload::from_base64(BASE64.encode([1u8, 2, 3]), 24000);
        assert_eq!(
            decode(&payload, 24000, 1),
            Err(DecodeError::MisalignedLength { len: 3 })
        );
    }

    #[test]
    fn test_decode_rejects_malformed_base64() {
        let payload = WireAudioPayload::from_base64("not*base64!", 24000);
        assert!(matches!(
            decode(&payload, 24000, 1),
            Err(DecodeError::Transport(_))
        ));
    }

    #[test]
    fn test_decode_rejects_zero_channels() {
        let payload = encode(&[0.1], 24000);
        assert_eq!(
            decode(&payload, 24000, 0),
            Err(DecodeError::InvalidChannels)
        );
    }

    #[test]
    fn test_decoded_duration_uses_target_rate() {
        // 2400 samples at 24kHz = 100ms
        let payload = encode(&vec![0.0; 2400], 24000);
        let frame = decode(&payload, 24000, 1).unwrap();
        assert_eq!(frame.duration(), std::time::Duration::from_millis(100));
    }
}
