//! Client configuration.

use crate::api::types::TranscribeOptions;
use crate::audio::VadConfig;
use crate::cluster::ClusterConfig;
use std::time::Duration;

/// Sample rate the backend expects for uploaded clips.
pub const BACKEND_SAMPLE_RATE: u32 = 16000;

/// Configuration for a studio session.
#[derive(Clone, Debug)]
pub struct StudioConfig {
    /// Base URL of the transcription / chat backend
    pub server_url: String,

    /// Path of the transcription endpoint
    pub transcribe_path: String,

    /// Options attached to every transcription upload
    pub transcribe: TranscribeOptions,

    /// Voice activity detection tuning
    pub vad: VadConfig,

    /// Speaker clustering tuning
    pub cluster: ClusterConfig,

    /// Start in hands-free (VAD-driven) mode
    pub hands_free: bool,

    /// Resample captured audio to the backend rate before encoding;
    /// when disabled clips keep the capture device's native rate
    pub force_backend_rate: bool,

    /// Samples per block delivered to the controller
    pub block_size: usize,

    /// System prompt prefixed to every chat request
    pub system_prompt: String,

    /// Chat sampling temperature
    pub chat_temperature: f32,

    /// Chat response token budget
    pub chat_max_tokens: u32,

    /// Number of recent conversation turns sent with each chat request
    pub history_window: usize,

    /// Interval between health probes
    pub health_poll_interval: Duration,

    /// Interval between metrics scrapes
    pub metrics_poll_interval: Duration,

    /// Attach a microphone on startup; disable for tests and for
    /// environments without audio hardware
    pub enable_capture: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:15030".to_string(),
            transcribe_path: crate::api::TRANSCRIBE_PATH.to_string(),
            transcribe: TranscribeOptions::default(),
            vad: VadConfig::default(),
            cluster: ClusterConfig::default(),
            hands_free: false,
            force_backend_rate: true,
            block_size: crate::audio::DEFAULT_BLOCK_SIZE,
            system_prompt: "You are a helpful assistant.".to_string(),
            chat_temperature: 0.7,
            chat_max_tokens: 512,
            history_window: 10,
            health_poll_interval: Duration::from_secs(5),
            metrics_poll_interval: Duration::from_secs(5),
            enable_capture: true,
        }
    }
}

impl StudioConfig {
    /// Create a configuration for the given backend URL
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Set the VAD tuning
    pub fn with_vad(mut self, vad: VadConfig) -> Self {
        self.vad = vad;
        self
    }

    /// Set the clustering tuning
    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Set the transcription upload options
    pub fn with_transcribe_options(mut self, options: TranscribeOptions) -> Self {
        self.transcribe = options;
        self
    }

    /// Start in hands-free mode
    pub fn with_hands_free(mut self, enabled: bool) -> Self {
        self.hands_free = enabled;
        self
    }

    /// Keep clips at the capture device's native rate
    pub fn with_native_rate(mut self) -> Self {
        self.force_backend_rate = false;
        self
    }

    /// Set the system prompt for chat requests
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Disable microphone capture (tests, CI environments)
    pub fn without_capture(mut self) -> Self {
        self.enable_capture = false;
        self
    }

    /// Target sample rate for the capture pipeline, if forcing is on
    pub fn capture_target_rate(&self) -> Option<u32> {
        if self.force_backend_rate {
            Some(BACKEND_SAMPLE_RATE)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StudioConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:15030");
        assert_eq!(config.vad.volume_threshold, 0.02);
        assert_eq!(config.cluster.threshold, 0.85);
        assert_eq!(config.history_window, 10);
        assert_eq!(config.capture_target_rate(), Some(BACKEND_SAMPLE_RATE));
    }

    #[test]
    fn test_builder_pattern() {
        let config = StudioConfig::new("http://stt.local:9000")
            .with_hands_free(true)
            .with_native_rate()
            .without_capture();

        assert_eq!(config.server_url, "http://stt.local:9000");
        assert!(config.hands_free);
        assert_eq!(config.capture_target_rate(), None);
        assert!(!config.enable_capture);
    }
}
