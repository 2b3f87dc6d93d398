//! Audio capture, voice activity detection, and clip encoding.

#[cfg(feature = "audio-io")]
pub mod capture;
pub mod controller;
pub mod resampler;
pub mod wav;

pub use controller::{CaptureController, EncodedClip, VadConfig, VadState};

/// Default block size delivered to the controller, in samples.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;
