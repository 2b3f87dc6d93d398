//! HTTP client for the transcription / chat backend.
//!
//! Clips go up as multipart form uploads; chat completions come back as
//! a server-sent-event stream of `data:` lines terminated by
//! `data: [DONE]`. Starting a new generation supersedes the previous
//! one: at most one abort handle is outstanding at a time.

use crate::api::types::{
    ChatRequest, ChatStreamChunk, HealthStatus, TranscribeOptions, TranscribeResponse,
};
use crate::{Result, StudioError};
use futures::future::{AbortHandle, Abortable};
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default path of the transcription endpoint.
pub const TRANSCRIBE_PATH: &str = "/v1/transcribe";

/// OpenAI-compatible alias some deployments expose instead.
pub const TRANSCRIBE_PATH_OPENAI: &str = "/v1/audio/transcriptions";

const CHAT_PATH: &str = "/v1/chat/completions";
const HEALTH_PATH: &str = "/health";
const METRICS_PATH: &str = "/metrics";

/// One parsed line of the chat event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseEvent {
    /// An incremental content fragment
    Delta(String),
    /// The `[DONE]` terminator
    Done,
}

/// Parse a single SSE line into an event.
///
/// Lines without the `data: ` prefix and chunks without delta content
/// are ignored; a malformed JSON payload is logged and skipped rather
/// than failing the stream.
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix("data: ")?.trim();
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    match serde_json::from_str::<ChatStreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .first()
            .and_then(|c| c.delta.content.clone())
            .map(SseEvent::Delta),
        Err(e) => {
            warn!("Skipping malformed stream chunk: {}", e);
            None
        }
    }
}

/// Client for the backend's HTTP surface.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    transcribe_path: String,
}

impl ApiClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StudioError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transcribe_path: TRANSCRIBE_PATH.to_string(),
        })
    }

    /// Point the client at a different transcription path (e.g. the
    /// OpenAI-compatible alias).
    pub fn with_transcribe_path(mut self, path: impl Into<String>) -> Self {
        self.transcribe_path = path.into();
        self
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload an encoded clip for transcription.
    pub async fn transcribe(
        &self,
        wav: Vec<u8>,
        options: &TranscribeOptions,
    ) -> Result<TranscribeResponse> {
        let url = format!("{}{}", self.base_url, self.transcribe_path);

        let part = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| StudioError::NetworkError(format!("Invalid upload part: {}", e)))?;

        let mut form = Form::new().part("file", part);
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &options.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if options.translate {
            form = form.text("translate", "true");
        }
        if options.diarization {
            form = form.text("diarization", "true");
        }
        if let Some(temperature) = options.temperature {
            form = form.text("temperature", temperature.to_string());
        }
        if let Some(beam_size) = options.beam_size {
            form = form.text("beam_size", beam_size.to_string());
        }

        debug!("Uploading clip to {}", url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| StudioError::NetworkError(format!("Upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StudioError::BackendError(format!(
                "Transcription failed ({}): {}",
                status, body
            )));
        }

        response
            .json::<TranscribeResponse>()
            .await
            .map_err(|e| StudioError::BackendError(format!("Malformed response: {}", e)))
    }

    /// Stream a chat completion, invoking `on_delta` per content
    /// fragment. Returns the accumulated full text.
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let url = format!("{}{}", self.base_url, CHAT_PATH);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| StudioError::NetworkError(format!("Chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StudioError::BackendError(format!(
                "Chat failed ({}): {}",
                status, body
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| StudioError::NetworkError(format!("Stream error: {}", e)))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Consume complete lines, keep the trailing remainder
            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                match parse_sse_line(line.trim_end()) {
                    Some(SseEvent::Done) => return Ok(full_text),
                    Some(SseEvent::Delta(content)) => {
                        full_text.push_str(&content);
                        on_delta(content);
                    }
                    None => {}
                }
            }
        }

        Ok(full_text)
    }

    /// Query backend health. Non-2xx responses still carry a body
    /// (`model_ready: false` while loading), so the status code is not
    /// treated as an error by itself.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| StudioError::NetworkError(format!("Health check failed: {}", e)))?;

        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| StudioError::BackendError(format!("Malformed health response: {}", e)))
    }

    /// Fetch the raw metrics exposition text.
    pub async fn metrics_raw(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, METRICS_PATH);
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| StudioError::NetworkError(format!("Metrics scrape failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StudioError::BackendError(format!(
                "Metrics scrape failed ({})",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| StudioError::NetworkError(format!("Metrics read failed: {}", e)))
    }
}

/// Chat generation front-end enforcing the supersede-previous policy.
///
/// Issuing a new generation aborts the stream of the previous one; the
/// abandoned request's response is simply dropped.
pub struct ChatEngine {
    client: Arc<ApiClient>,
    // Generation counter + abort handle of the one outstanding request
    active: Mutex<Option<(u64, AbortHandle)>>,
    next_generation: std::sync::atomic::AtomicU64,
}

impl ChatEngine {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            active: Mutex::new(None),
            next_generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Run one streaming generation, aborting any generation still in
    /// flight. Returns the full accumulated text.
    pub async fn generate(
        &self,
        request: ChatRequest,
        on_delta: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let (handle, registration) = AbortHandle::new_pair();
        if let Some((_, previous)) = self.active.lock().replace((generation, handle)) {
            debug!("Superseding in-flight generation");
            previous.abort();
        }

        let result = Abortable::new(self.client.chat_stream(&request, on_delta), registration)
            .await
            .unwrap_or(Err(StudioError::Aborted));

        // Release the handle unless a newer generation already took over
        let mut guard = self.active.lock();
        if guard.as_ref().map(|(g, _)| *g) == Some(generation) {
            *guard = None;
        }

        result
    }

    /// Abort the in-flight generation, if any.
    pub fn abort(&self) {
        if let Some((_, handle)) = self.active.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delta_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(SseEvent::Delta("Hel".into())));
    }

    #[test]
    fn test_parse_done_line() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseEvent::Done));
    }

    #[test]
    fn test_parse_ignores_non_data_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
    }

    #[test]
    fn test_parse_ignores_empty_delta() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert_eq!(parse_sse_line(line), None);
        let line = r#"data: {"choices":[]}"#;
        assert_eq!(parse_sse_line(line), None);
    }

    #[test]
    fn test_parse_skips_malformed_json() {
        assert_eq!(parse_sse_line("data: {not json"), None);
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let client = ApiClient::new("http://localhost:15030/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:15030");
    }
}
