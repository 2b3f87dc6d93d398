use crate::{Result, StudioError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Mono audio resampler used to force captured audio down to the
/// backend's expected sample rate.
///
/// Capture devices rarely run at 16 kHz natively; the upload path
/// resamples each block before it reaches the VAD controller so every
/// clip is encoded at the backend rate.
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    chunk_size: usize,
    // Samples waiting for a full input chunk
    pending: Vec<f32>,
}

impl AudioResampler {
    /// Create a new mono resampler between two sample rates.
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(StudioError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let resample_ratio = output_rate as f64 / input_rate as f64;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let chunk_size = 1024;
        let resampler = SincFixedIn::<f32>::new(resample_ratio, 2.0, params, chunk_size, 1)
            .map_err(|e| {
                StudioError::AudioProcessingError(format!("Failed to create resampler: {}", e))
            })?;

        debug!("Created resampler: {} Hz -> {} Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            chunk_size,
            pending: Vec::new(),
        })
    }

    /// Feed mono samples and return whatever full chunks resample out.
    ///
    /// Input is buffered internally until a full processing chunk is
    /// available, so output length varies call to call; no samples are
    /// dropped between calls.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.pending.extend_from_slice(input);

        let mut output = Vec::new();
        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            let planar = self
                .resampler
                .process(&[chunk], None)
                .map_err(|e| StudioError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
            output.extend_from_slice(&planar[0]);
        }
        Ok(output)
    }

    /// Get the input sample rate
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Get the output sample rate
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Drop buffered input and reset the filter state.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.resampler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampler_creation() {
        assert!(AudioResampler::new(48000, 16000).is_ok());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(AudioResampler::new(0, 16000).is_err());
        assert!(AudioResampler::new(48000, 0).is_err());
    }

    #[test]
    fn test_downsampling_ratio() {
        let mut resampler = AudioResampler::new(48000, 16000).unwrap();
        let input: Vec<f32> = (0..48000).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resampler.process(&input).unwrap();
        // Roughly a third of the input, modulo the pending tail
        assert!(output.len() > 14000 && output.len() < 17000);
    }

    #[test]
    fn test_small_blocks_are_buffered() {
        let mut resampler = AudioResampler::new(48000, 16000).unwrap();
        // Below the internal chunk size: nothing comes out yet
        let out = resampler.process(&vec![0.0; 512]).unwrap();
        assert!(out.is_empty());
        // The next block completes a chunk
        let out = resampler.process(&vec![0.0; 512]).unwrap();
        assert!(!out.is_empty());
    }
}
