//! Microphone capture.
//!
//! Wraps a cpal input stream: discovers the default input device, mixes
//! interleaved frames down to mono, optionally resamples to the backend
//! rate, and delivers fixed-size blocks over a crossbeam channel. The
//! VAD controller never touches the hardware; it only sees the blocks.

use crate::audio::resampler::AudioResampler;
use crate::{Result, StudioError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Re-chunks an incoming mono stream into fixed-size blocks, resampling
/// on the way when a target rate is set.
pub struct BlockAssembler {
    block_size: usize,
    resampler: Option<AudioResampler>,
    buffer: Vec<f32>,
}

impl BlockAssembler {
    /// Create an assembler producing `block_size`-sample blocks.
    ///
    /// When `target_rate` differs from `input_rate` the stream is
    /// resampled before re-chunking.
    pub fn new(input_rate: u32, target_rate: Option<u32>, block_size: usize) -> Result<Self> {
        let resampler = match target_rate {
            Some(rate) if rate != input_rate => Some(AudioResampler::new(input_rate, rate)?),
            _ => None,
        };
        Ok(Self {
            block_size,
            resampler,
            buffer: Vec::new(),
        })
    }

    /// Feed mono samples; returns zero or more complete blocks.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        match &mut self.resampler {
            Some(resampler) => {
                let resampled = resampler.process(samples)?;
                self.buffer.extend_from_slice(&resampled);
            }
            None => self.buffer.extend_from_slice(samples),
        }

        let mut blocks = Vec::new();
        while self.buffer.len() >= self.block_size {
            blocks.push(self.buffer.drain(..self.block_size).collect());
        }
        Ok(blocks)
    }
}

/// Audio recorder for capturing microphone input.
///
/// Captures from the default input device and sends fixed-size mono
/// blocks via a crossbeam channel. Microphone unavailability is an
/// explicit, unretried error: recording features simply stay off.
pub struct AudioRecorder {
    stream: Option<Stream>,
    sample_rate: u32,
    channels: u16,
    is_capturing: Arc<AtomicBool>,
    device: Device,
    config: StreamConfig,
}

impl AudioRecorder {
    /// Create a recorder on the default input device.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| StudioError::AudioDeviceError("No input device available".into()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using input device: {}", device_name);

        let supported_config = device.default_input_config().map_err(|e| {
            StudioError::AudioDeviceError(format!("Failed to get input config: {}", e))
        })?;

        let config: StreamConfig = supported_config.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        info!("Audio config: {}Hz, {} channel(s)", sample_rate, channels);

        Ok(Self {
            stream: None,
            sample_rate,
            channels,
            is_capturing: Arc::new(AtomicBool::new(false)),
            device,
            config,
        })
    }

    /// Native sample rate of the capture device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start capturing.
    ///
    /// Blocks of `block_size` mono samples (at `target_rate` when set,
    /// the device rate otherwise) are sent through `block_tx`.
    pub fn start(
        &mut self,
        block_tx: Sender<Vec<f32>>,
        block_size: usize,
        target_rate: Option<u32>,
    ) -> Result<()> {
        if self.is_capturing.load(Ordering::SeqCst) {
            warn!("Already capturing, ignoring start request");
            return Ok(());
        }

        let channels = self.channels as usize;
        let is_capturing = Arc::clone(&self.is_capturing);
        let mut assembler = BlockAssembler::new(self.sample_rate, target_rate, block_size)?;

        let err_fn = |err| {
            error!("Audio input stream error: {}", err);
        };

        debug!(
            "Building audio input stream: {}Hz, {} channel(s), block size {}",
            self.sample_rate, channels, block_size
        );

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_capturing.load(Ordering::SeqCst) {
                        return;
                    }

                    // Mix interleaved frames down to mono
                    let mono: Vec<f32> = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };

                    match assembler.push(&mono) {
                        Ok(blocks) => {
                            for block in blocks {
                                if block_tx.try_send(block).is_err() {
                                    warn!("Audio channel full, dropping block");
                                }
                            }
                        }
                        Err(e) => error!("Block assembly failed: {}", e),
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                StudioError::AudioDeviceError(format!("Failed to build input stream: {}", e))
            })?;

        stream
            .play()
            .map_err(|e| StudioError::AudioDeviceError(format!("Failed to start stream: {}", e)))?;

        self.is_capturing.store(true, Ordering::SeqCst);
        self.stream = Some(stream);
        info!("Audio capture started");
        Ok(())
    }

    /// Stop capturing and release the stream.
    pub fn stop(&mut self) {
        self.is_capturing.store(false, Ordering::SeqCst);
        if self.stream.take().is_some() {
            info!("Audio capture stopped");
        }
    }

    /// Whether the input stream is currently running
    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_fixed_blocks() {
        let mut assembler = BlockAssembler::new(16000, None, 1024).unwrap();
        assert!(assembler.push(&vec![0.0; 512]).unwrap().is_empty());
        let blocks = assembler.push(&vec![0.0; 2048]).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.len() == 1024));
    }

    #[test]
    fn test_assembler_same_rate_skips_resampler() {
        let mut assembler = BlockAssembler::new(16000, Some(16000), 256).unwrap();
        let blocks = assembler.push(&vec![0.1; 256]).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0][0], 0.1);
    }

    #[test]
    fn test_assembler_resamples_to_target() {
        let mut assembler = BlockAssembler::new(48000, Some(16000), 512).unwrap();
        // 48000 input samples -> roughly 16000 output samples -> ~31 blocks
        let blocks = assembler.push(&vec![0.0; 48000]).unwrap();
        assert!(blocks.len() >= 29 && blocks.len() <= 32);
    }
}
