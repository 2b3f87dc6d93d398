//! Client for the speech-to-text / chat backend.
//!
//! The backend is an external collaborator: everything heavy (speech
//! recognition, diarization, language modeling) lives behind its HTTP
//! surface. This module owns the wire types, the request plumbing, the
//! chat stream parsing, and the health/metrics polling helpers.

pub mod client;
pub mod metrics;
pub mod types;

pub use client::{ApiClient, ChatEngine, SseEvent, TRANSCRIBE_PATH, TRANSCRIBE_PATH_OPENAI};
pub use metrics::{parse_metrics, ThroughputTracker};
pub use types::{
    ChatMessage, ChatRequest, HealthStatus, TranscribeOptions, TranscribeResponse,
    TranscriptSegment, WordTiming,
};
