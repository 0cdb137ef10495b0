//! Linear PCM conversions.
//!
//! The transcription stream and synthesized speech both use 16-bit signed
//! little-endian mono samples; capture works in `f32` in `[-1.0, 1.0]`.

/// Full-scale remap of a float sample: `sample * 32767`, clamped to i16.
pub fn f32_to_i16(sample: f32) -> i16 {
    let scaled = sample * i16::MAX as f32;
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

/// Converts float samples to 16-bit little-endian PCM bytes.
pub fn f32_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&f32_to_i16(s).to_le_bytes());
    }
    bytes
}

pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Reads 16-bit little-endian samples. A trailing odd byte is ignored.
pub fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Averages interleaved channels down to mono.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampling.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale_remap() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(0.5), 16383);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
    }

    #[test]
    fn test_little_endian_bytes() {
        let bytes = f32_to_le_bytes(&[1.0, -1.0]);
        assert_eq!(bytes, vec![0xff, 0x7f, 0x01, 0x80]);
        assert_eq!(le_bytes_to_i16(&bytes), vec![32767, -32767]);
    }

    #[test]
    fn test_le_bytes_ignores_trailing_odd_byte() {
        assert_eq!(le_bytes_to_i16(&[0x01, 0x00, 0x05]), vec![1]);
    }

    #[test]
    fn test_i16_byte_conversion() {
        assert_eq!(i16_to_le_bytes(&[256, -1]), vec![0x00, 0x01, 0xff, 0xff]);
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..480).map(|i| i as f32 / 480.0).collect();
        let out = resample(&samples, 48000, 16000);
        assert_eq!(out.len(), 160);
        assert!((out[1] - samples[3]).abs() < 1e-6);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_i16_to_f32_round_trip_sign() {
        assert!((i16_to_f32(32767) - 1.0).abs() < f32::EPSILON);
        assert!(i16_to_f32(-100) < 0.0);
    }
}
