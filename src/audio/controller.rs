//! Voice-activity-gated recording controller.
//!
//! Consumes fixed-size blocks of normalized audio samples and turns them
//! into discrete utterance clips. In hands-free mode a small state machine
//! (Idle -> Speaking -> Recording) gates buffering on RMS energy; in manual
//! mode the caller drives recording directly with start/stop commands.
//!
//! Blocks arrive at a fixed cadence, so all durations (silence hangover,
//! minimum utterance floor) are derived from accumulated sample counts.
//! This keeps the controller fully deterministic and testable without any
//! real audio hardware.

use crate::audio::wav;
use crate::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// State of the recording gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VadState {
    /// Waiting for speech (hands-free) or a start command (manual)
    Idle,
    /// Energy just crossed the threshold; buffering is about to begin
    Speaking,
    /// Actively buffering audio into the current session
    Recording,
}

/// Tuning for voice activity detection and utterance segmentation.
///
/// Observed noise floors vary by device, so none of these are constants.
#[derive(Clone, Debug)]
pub struct VadConfig {
    /// Normalized RMS energy above which a block counts as speech
    pub volume_threshold: f32,

    /// Trailing silence that closes an utterance, in milliseconds
    pub silence_hangover_ms: u32,

    /// Utterances shorter than this are discarded as click/pop noise
    pub min_utterance_ms: u32,

    /// Hard ceiling on a single utterance; the buffer is flushed when hit
    pub max_utterance_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 0.02,
            silence_hangover_ms: 1500,
            min_utterance_ms: 500,
            max_utterance_ms: 30_000,
        }
    }
}

impl VadConfig {
    /// Set the energy threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.volume_threshold = threshold;
        self
    }

    /// Set the trailing-silence hangover
    pub fn with_hangover_ms(mut self, ms: u32) -> Self {
        self.silence_hangover_ms = ms;
        self
    }

    /// Set the minimum utterance floor
    pub fn with_min_utterance_ms(mut self, ms: u32) -> Self {
        self.min_utterance_ms = ms;
        self
    }

    /// Set the maximum utterance length
    pub fn with_max_utterance_ms(mut self, ms: u32) -> Self {
        self.max_utterance_ms = ms;
        self
    }
}

/// A finished utterance, encoded as an uploadable WAV clip.
#[derive(Clone, Debug)]
pub struct EncodedClip {
    /// Complete WAV container (44-byte header + mono 16-bit PCM data)
    pub wav: Vec<u8>,

    /// Sample rate the clip was captured at
    pub sample_rate: u32,

    /// Number of samples in the clip
    pub samples: usize,

    /// Clip duration in milliseconds
    pub duration_ms: u32,

    /// Timestamp of the first sample of the session
    pub started_at: DateTime<Utc>,
}

/// Compute root-mean-square energy of a sample block.
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Voice-activity-gated recording controller.
///
/// One continuous recording attempt is buffered as ordered 16-bit PCM
/// blocks; the buffer is non-empty only while the state is `Recording`
/// and its ownership is released on every transition back to `Idle`.
pub struct CaptureController {
    config: VadConfig,
    sample_rate: u32,
    state: VadState,
    hands_free: bool,

    // Active session buffer, insertion order = temporal order
    chunks: Vec<Vec<i16>>,
    buffered_samples: usize,
    started_at: Option<DateTime<Utc>>,

    // Samples of contiguous trailing silence; None while above threshold
    silence_samples: Option<usize>,

    // Last observed block energy, feeds the live level indicator
    level: f32,
}

impl CaptureController {
    /// Create a controller for a capture stream at the given sample rate.
    pub fn new(sample_rate: u32, config: VadConfig) -> Result<Self> {
        if sample_rate == 0 {
            return Err(crate::StudioError::ConfigError(
                "Sample rate must be greater than 0".into(),
            ));
        }
        Ok(Self {
            config,
            sample_rate,
            state: VadState::Idle,
            hands_free: false,
            chunks: Vec::new(),
            buffered_samples: 0,
            started_at: None,
            silence_samples: None,
            level: 0.0,
        })
    }

    /// Current gate state
    pub fn state(&self) -> VadState {
        self.state
    }

    /// Whether audio is currently being buffered
    pub fn is_recording(&self) -> bool {
        self.state == VadState::Recording
    }

    /// Whether automatic (VAD-driven) mode is active
    pub fn hands_free(&self) -> bool {
        self.hands_free
    }

    /// Energy of the most recent block, for a live level indicator
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Sample rate of the owning capture stream
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Replace the VAD tuning; takes effect on the next block.
    pub fn set_config(&mut self, config: VadConfig) {
        self.config = config;
    }

    /// Toggle automatic mode.
    ///
    /// Turning hands-free off while recording forces an immediate stop;
    /// the forced clip (if any survives the minimum-duration floor) is
    /// returned to the caller.
    pub fn set_hands_free(&mut self, enabled: bool) -> Result<Option<EncodedClip>> {
        if self.hands_free == enabled {
            return Ok(None);
        }
        self.hands_free = enabled;
        debug!("Hands-free mode {}", if enabled { "enabled" } else { "disabled" });
        if !enabled && self.state == VadState::Recording {
            return self.stop_recording();
        }
        Ok(None)
    }

    /// Manual-mode entry point: begin buffering immediately.
    ///
    /// Idempotent no-op while already recording.
    pub fn start_recording(&mut self) {
        if self.state == VadState::Recording {
            return;
        }
        self.begin_session();
        debug!("Recording started (manual)");
    }

    /// Stop buffering and emit the finished utterance.
    ///
    /// Returns `None` while idle, and `None` when the buffered duration is
    /// below the minimum-utterance floor (the buffer is discarded). In
    /// hands-free mode the controller stays armed and will re-trigger on
    /// the next speech onset.
    pub fn stop_recording(&mut self) -> Result<Option<EncodedClip>> {
        if self.state == VadState::Idle {
            return Ok(None);
        }
        self.finish_utterance()
    }

    /// Single ingestion point: feed one fixed-size block of samples.
    ///
    /// Computes block energy, appends to the active session while
    /// recording, and runs the hands-free transition logic. Returns a
    /// finished clip when the VAD closes an utterance.
    pub fn on_audio_block(&mut self, samples: &[f32]) -> Result<Option<EncodedClip>> {
        let energy = rms_energy(samples);
        self.level = energy;

        // Speech onset: in hands-free mode an over-threshold block while
        // idle opens a session and starts buffering with this very block.
        if self.state == VadState::Idle {
            if self.hands_free && energy > self.config.volume_threshold {
                self.state = VadState::Speaking;
                self.begin_session();
                trace!("Speech onset at energy {:.4}", energy);
            } else {
                return Ok(None);
            }
        }

        if self.state != VadState::Recording {
            return Ok(None);
        }

        self.append_block(samples);

        if self.hands_free {
            if energy > self.config.volume_threshold {
                self.silence_samples = None;
            } else {
                let silent = self.silence_samples.unwrap_or(0) + samples.len();
                self.silence_samples = Some(silent);
                if self.samples_to_ms(silent) > self.config.silence_hangover_ms as u64 {
                    trace!("Silence hangover elapsed, closing utterance");
                    return self.finish_utterance();
                }
            }
        }

        // Overly long utterances are flushed rather than grown unbounded
        if self.samples_to_ms(self.buffered_samples) >= self.config.max_utterance_ms as u64 {
            debug!("Maximum utterance length reached, flushing");
            return self.finish_utterance();
        }

        Ok(None)
    }

    fn begin_session(&mut self) {
        self.chunks.clear();
        self.buffered_samples = 0;
        self.silence_samples = None;
        self.started_at = Some(Utc::now());
        self.state = VadState::Recording;
    }

    fn append_block(&mut self, samples: &[f32]) {
        let pcm: Vec<i16> = samples.iter().map(|&s| wav::sample_to_i16(s)).collect();
        self.buffered_samples += pcm.len();
        self.chunks.push(pcm);
    }

    fn finish_utterance(&mut self) -> Result<Option<EncodedClip>> {
        self.state = VadState::Idle;
        self.silence_samples = None;

        let chunks = std::mem::take(&mut self.chunks);
        let total = self.buffered_samples;
        self.buffered_samples = 0;
        let started_at = self.started_at.take().unwrap_or_else(Utc::now);

        let duration_ms = self.samples_to_ms(total);
        if duration_ms < self.config.min_utterance_ms as u64 {
            debug!(
                "Discarding short utterance ({} ms < {} ms floor)",
                duration_ms, self.config.min_utterance_ms
            );
            return Ok(None);
        }

        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend_from_slice(&chunk);
        }

        let bytes = wav::encode_clip(&samples, self.sample_rate)?;
        debug!(
            "Emitting utterance: {} samples, {} ms, {} bytes",
            samples.len(),
            duration_ms,
            bytes.len()
        );

        Ok(Some(EncodedClip {
            wav: bytes,
            sample_rate: self.sample_rate,
            samples: samples.len(),
            duration_ms: duration_ms as u32,
            started_at,
        }))
    }

    fn samples_to_ms(&self, samples: usize) -> u64 {
        samples as u64 * 1000 / self.sample_rate as u64
    }
}
