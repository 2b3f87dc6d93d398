//! Wire types for the transcription and chat endpoints.
//!
//! The response shape is fixed by the backend; every segment-level field
//! is optional here because partial, degraded display is preferred over
//! failing a whole utterance on a missing field.

use serde::{Deserialize, Serialize};

/// Optional form fields accompanying a transcription upload.
#[derive(Clone, Debug, Default)]
pub struct TranscribeOptions {
    /// Source language hint (None = auto-detect)
    pub language: Option<String>,

    /// Decoding prompt / hotword context
    pub prompt: Option<String>,

    /// Translate the transcript to English
    pub translate: bool,

    /// Ask the backend to attach speaker information to segments
    pub diarization: bool,

    /// Decoder sampling temperature
    pub temperature: Option<f32>,

    /// Decoder beam size
    pub beam_size: Option<u32>,
}

/// Word-level timing inside a segment.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct WordTiming {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    pub probability: Option<f32>,
}

/// One transcript segment as returned by the backend.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub start: f64,

    #[serde(default)]
    pub end: f64,

    pub probability: Option<f32>,

    /// Simple diarization signal: the next segment belongs to a
    /// different speaker
    #[serde(default)]
    pub speaker_turn_next: bool,

    /// Prosody-derived speaker embedding (8-dim when present)
    pub speaker_vec: Option<Vec<f32>>,

    /// Inferred voice category ("F"/"M", "?" when unknown)
    pub gender: Option<String>,

    pub emotion: Option<String>,

    #[serde(default)]
    pub words: Vec<WordTiming>,
}

/// Processing metadata attached to a transcription response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TranscribeMeta {
    pub rtf: Option<f64>,
    pub processing_time: Option<f64>,
    pub input_sr: Option<u32>,
    pub input_channels: Option<u16>,
}

/// Response body of the transcription endpoint.
///
/// The minimal shape is `{text, language, duration}`; richer backends
/// add per-segment detail.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub text: String,

    pub language: Option<String>,

    pub duration: Option<f64>,

    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,

    pub meta: Option<TranscribeMeta>,
}

/// One conversation turn in a chat request.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Request body of the chat completion endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// One parsed chunk of the chat completion event stream.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub delta: ChatDelta,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatDelta {
    pub content: Option<String>,
}

/// Response body of the health endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub model_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_response_shape() {
        let json = r#"{"text": "hello", "language": "en", "duration": 1.5}"#;
        let resp: TranscribeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text, "hello");
        assert_eq!(resp.language.as_deref(), Some("en"));
        assert!(resp.segments.is_empty());
    }

    #[test]
    fn test_rich_segment_shape() {
        let json = r#"{
            "text": "hi there",
            "segments": [{
                "text": "hi there",
                "start": 0.0,
                "end": 1.2,
                "probability": 0.93,
                "speaker_turn_next": true,
                "speaker_vec": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
                "gender": "F",
                "emotion": "neutral",
                "words": [{"word": "hi", "start": 0.0, "end": 0.4, "probability": 0.99}]
            }],
            "meta": {"rtf": 0.12, "processing_time": 0.3, "input_sr": 16000, "input_channels": 1}
        }"#;
        let resp: TranscribeResponse = serde_json::from_str(json).unwrap();
        let seg = &resp.segments[0];
        assert!(seg.speaker_turn_next);
        assert_eq!(seg.speaker_vec.as_ref().unwrap().len(), 8);
        assert_eq!(seg.words.len(), 1);
        assert_eq!(resp.meta.unwrap().input_sr, Some(16000));
    }

    #[test]
    fn test_missing_fields_default() {
        // Fields the backend omits degrade to safe defaults
        let json = r#"{"segments": [{}]}"#;
        let resp: TranscribeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text, "");
        let seg = &resp.segments[0];
        assert_eq!(seg.text, "");
        assert!(!seg.speaker_turn_next);
        assert!(seg.speaker_vec.is_none());
    }

    #[test]
    fn test_chat_request_serializes_stream_flag() {
        let req = ChatRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 256,
            stream: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
    }
}
