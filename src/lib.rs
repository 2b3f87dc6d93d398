pub mod api;
pub mod audio;
pub mod cluster;
pub mod config;
pub mod studio;
pub mod transcript;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StudioError {
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Generation aborted")]
    Aborted,

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Export error: {0}")]
    ExportError(String),
}

impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::IOError(e.to_string())
    }
}

impl StudioError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Hardware/device errors require user intervention
            StudioError::AudioDeviceError(_) => false,
            StudioError::AudioProcessingError(_) => true,
            StudioError::EncodingError(_) => true,
            // The backend may come back; the user can simply retry
            StudioError::NetworkError(_) => true,
            StudioError::BackendError(_) => true,
            StudioError::Aborted => true,
            StudioError::IOError(_) => false,
            StudioError::ConfigError(_) => false,
            StudioError::ChannelError(_) => false,
            StudioError::ExportError(_) => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            StudioError::AudioDeviceError(_) => {
                "No usable microphone. Please check your input device.".to_string()
            }
            StudioError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            StudioError::EncodingError(_) => {
                "Could not encode the recorded clip. Please try again.".to_string()
            }
            StudioError::NetworkError(_) => {
                "Could not reach the transcription server.".to_string()
            }
            StudioError::BackendError(_) => {
                "The transcription server rejected the request. Please retry.".to_string()
            }
            StudioError::Aborted => "Generation was superseded by a newer request.".to_string(),
            StudioError::IOError(_) => "File system error occurred.".to_string(),
            StudioError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            StudioError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            StudioError::ExportError(_) => {
                "Transcript export failed. Please check the target path.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
