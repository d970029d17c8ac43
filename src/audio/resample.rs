//! Channel mixing and sample-rate conversion for device audio.

/// Averages interleaved multi-channel audio down to mono.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampling of a mono signal.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    resample_to_len(samples, from_rate, to_rate, output_len)
}

/// Linear-interpolation resampling to exactly `output_len` samples.
///
/// Positions past the end of the input hold the last sample; empty input
/// yields silence.
pub fn resample_to_len(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
    output_len: usize,
) -> Vec<f32> {
    let Some(&last) = samples.last() else {
        return vec![0.0; output_len];
    };
    let ratio = if from_rate == 0 || to_rate == 0 {
        1.0
    } else {
        from_rate as f64 / to_rate as f64
    };

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                last
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

/// Converts device-native audio to mono at `target_rate`.
pub fn to_mono_at_rate(
    samples: &[f32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let mono = mix_to_mono(samples, channels);
    resample(&mono, source_rate, target_rate)
}

/// Expands mono audio to `channels` interleaved channels.
pub fn expand_channels(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .iter()
        .flat_map(|&s| std::iter::repeat_n(s, channels))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_same_rate() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_upsample_doubles_length() {
        let samples = vec![0.0, 0.5, 1.0];
        let resampled = resample(&samples, 8000, 16000);
        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0.0);
        assert!((resampled[1] - 0.25).abs() < 1e-6);
        assert_eq!(resampled[2], 0.5);
    }

    #[test]
    fn resample_downsample_48k_to_16k() {
        let samples = vec![0.0f32; 4800];
        assert_eq!(resample(&samples, 48000, 16000).len(), 1600);
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], 48000, 16000).is_empty());
    }

    #[test]
    fn resample_to_len_hits_exact_length() {
        let samples = vec![0.5f32; 241];
        assert_eq!(resample_to_len(&samples, 24000, 44100, 443).len(), 443);
        assert_eq!(resample_to_len(&samples, 24000, 44100, 442).len(), 442);
        assert!(
            resample_to_len(&samples, 24000, 44100, 443)
                .iter()
                .all(|s| *s == 0.5)
        );
    }

    #[test]
    fn resample_to_len_same_rate_pads_and_truncates() {
        assert_eq!(resample_to_len(&[0.1, 0.2], 24000, 24000, 3), vec![0.1, 0.2, 0.2]);
        assert_eq!(resample_to_len(&[0.1, 0.2], 24000, 24000, 1), vec![0.1]);
        assert_eq!(resample_to_len(&[], 24000, 48000, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn mix_stereo_to_mono_averages() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(mix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn to_mono_at_rate_combines_steps() {
        let stereo = vec![0.2f32; 9600]; // 100ms of 48kHz stereo
        let converted = to_mono_at_rate(&stereo, 2, 48000, 16000);
        assert_eq!(converted.len(), 1600);
        assert!(converted.iter().all(|s| (s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn expand_channels_repeats_samples() {
        assert_eq!(expand_channels(&[0.1, 0.2], 2), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(expand_channels(&[0.1], 1), vec![0.1]);
    }
}
