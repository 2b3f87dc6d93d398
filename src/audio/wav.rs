use crate::{Result, StudioError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Size of the standard PCM WAV header produced by [`encode_clip`].
pub const WAV_HEADER_LEN: usize = 44;

/// Convert a normalized f32 sample to signed 16-bit PCM.
///
/// Samples are clamped to [-1, 1]; positive values scale by 0x7FFF and
/// negative values by 0x8000 so the full i16 range is reachable.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s >= 0.0 {
        (s * 0x7FFF as f32) as i16
    } else {
        (s * 0x8000 as f32) as i16
    }
}

/// Encode mono 16-bit PCM samples into an in-memory WAV clip.
///
/// The result is a standard 44-byte header followed by the raw sample
/// data, suitable for multipart upload to the transcription endpoint.
pub fn encode_clip(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    if sample_rate == 0 {
        return Err(StudioError::ConfigError(
            "Sample rate must be greater than 0".into(),
        ));
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| StudioError::EncodingError(format!("Failed to create WAV writer: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| StudioError::EncodingError(format!("Failed to write sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| StudioError::EncodingError(format!("Failed to finalize clip: {}", e)))?;
    }

    let bytes = cursor.into_inner();
    debug!(
        "Encoded clip: {} samples at {} Hz ({} bytes)",
        samples.len(),
        sample_rate,
        bytes.len()
    );
    Ok(bytes)
}

/// Header fields recovered from an encoded WAV clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Length of the sample data in bytes
    pub data_len: u32,
}

/// Parse the header of an encoded WAV clip.
///
/// Only the canonical 44-byte PCM layout produced by [`encode_clip`] is
/// accepted; the server side makes the same assumption when framing
/// uploads.
pub fn parse_header(bytes: &[u8]) -> Result<WavInfo> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(StudioError::EncodingError(format!(
            "Clip too short for a WAV header: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(StudioError::EncodingError("Not a RIFF/WAVE clip".into()));
    }
    if &bytes[12..16] != b"fmt " {
        return Err(StudioError::EncodingError("Missing fmt chunk".into()));
    }
    if &bytes[36..40] != b"data" {
        return Err(StudioError::EncodingError("Missing data chunk".into()));
    }

    let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

    Ok(WavInfo {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bits_per_sample: u16_at(34),
        data_len: u32_at(40),
    })
}

/// Write audio samples to a WAV file
///
/// # Arguments
/// * `path` - Path to the output WAV file
/// * `samples` - Audio samples (f32, range -1.0 to 1.0)
/// * `sample_rate` - Sample rate in Hz
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| StudioError::IOError(format!("Failed to create WAV file: {}", e)))?;

    for &sample in samples {
        writer
            .write_sample(sample_to_i16(sample))
            .map_err(|e| StudioError::IOError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| StudioError::IOError(format!("Failed to finalize WAV file: {}", e)))?;

    debug!("Wrote {} samples to {:?}", samples.len(), path.as_ref());
    Ok(())
}

/// Read audio samples from a WAV file
///
/// # Returns
/// * Tuple of (samples, sample_rate, channels)
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32, u16)> {
    let mut reader = WavReader::open(path.as_ref())
        .map_err(|e| StudioError::IOError(format!("Failed to open WAV file: {}", e)))?;

    let spec = reader.spec();
    debug!(
        "Reading WAV file: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let samples: Result<Vec<f32>> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| StudioError::IOError(format!("Failed to read sample: {}", e))))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| {
                s.map(|sample| sample as f32 / i16::MAX as f32)
                    .map_err(|e| StudioError::IOError(format!("Failed to read sample: {}", e)))
            })
            .collect(),
        (SampleFormat::Int, bits) => Err(StudioError::AudioProcessingError(format!(
            "Unsupported bit depth: {}",
            bits
        ))),
    };

    Ok((samples?, spec.sample_rate, spec.channels))
}

/// Convert interleaved stereo audio to mono by averaging channels
pub fn stereo_to_mono(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks(2)
        .map(|chunk| {
            if chunk.len() == 2 {
                (chunk[0] + chunk[1]) / 2.0
            } else {
                chunk[0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_sample_conversion_bounds() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), 0x7FFF);
        assert_eq!(sample_to_i16(-1.0), i16::MIN);
        // Out-of-range input is clamped
        assert_eq!(sample_to_i16(2.5), 0x7FFF);
        assert_eq!(sample_to_i16(-3.0), i16::MIN);
    }

    #[test]
    fn test_encode_header_layout() {
        let samples = vec![0i16; 1600];
        let bytes = encode_clip(&samples, 16000).unwrap();

        assert_eq!(bytes.len(), WAV_HEADER_LEN + samples.len() * 2);

        let info = parse_header(&bytes).unwrap();
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.sample_rate, 16000);
        assert_eq!(info.data_len as usize, samples.len() * 2);
    }

    #[test]
    fn test_encode_preserves_rate() {
        let bytes = encode_clip(&[0i16; 441], 44100).unwrap();
        let info = parse_header(&bytes).unwrap();
        assert_eq!(info.sample_rate, 44100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_header(&[0u8; 10]).is_err());
        assert!(parse_header(&[0u8; 64]).is_err());
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(encode_clip(&[0i16; 4], 0).is_err());
    }

    #[test]
    fn test_write_read_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_audio.wav");

        // One second of a 440 Hz sine wave
        let sample_rate = 16000;
        let samples: Vec<f32> = (0..sample_rate as usize)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect();

        write_wav(&path, &samples, sample_rate).unwrap();

        let (read_samples, read_rate, read_channels) = read_wav(&path).unwrap();
        assert_eq!(read_rate, sample_rate);
        assert_eq!(read_channels, 1);
        assert_eq!(read_samples.len(), samples.len());

        // Some precision loss from i16 conversion is expected
        for (original, read) in samples.iter().zip(read_samples.iter()) {
            assert!((original - read).abs() < 0.001);
        }
    }

    #[test]
    fn test_stereo_to_mono() {
        let stereo = vec![0.5, 0.3, 0.7, 0.1];
        let mono = stereo_to_mono(&stereo);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.4).abs() < 0.001);
    }
}
