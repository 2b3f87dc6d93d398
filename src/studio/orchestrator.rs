//! Studio orchestrator.
//!
//! Owns the capture controller, the speaker registry, the transcript
//! store, and the conversation history, and wires them to the network
//! edge over typed channels. All mutable state lives on the control
//! thread; network tasks only report completions back, so uploads never
//! block capture and results are rendered in arrival order.

use crate::api::metrics::{STT_REQUESTS_TOTAL, STT_TOKENS_GENERATED_TOTAL};
use crate::api::{
    parse_metrics, ApiClient, ChatEngine, ChatMessage, ChatRequest, ThroughputTracker,
    TranscribeResponse,
};
use crate::audio::{CaptureController, EncodedClip, VadState};
use crate::cluster::{SpeakerId, SpeakerRegistry};
use crate::config::{StudioConfig, BACKEND_SAMPLE_RATE};
use crate::transcript::{ExportFormat, TranscriptEntry, TranscriptStore};
use crate::utils::channels::StudioChannels;
use crate::{Result, StudioError};
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Commands accepted by the orchestrator.
#[derive(Clone, Debug)]
pub enum StudioCommand {
    /// Begin a manual recording
    StartRecording,

    /// Stop the manual recording and upload the clip
    StopRecording,

    /// Toggle hands-free (VAD-driven) capture
    SetHandsFree(bool),

    /// Reconfigure the speaker assignment threshold
    SetSpeakerThreshold(f32),

    /// Rename a speaker identity
    RenameSpeaker { id: SpeakerId, name: String },

    /// Send a chat message; the response streams back as events
    Chat { text: String, request_id: Uuid },

    /// Abort the in-flight chat generation
    AbortChat,

    /// Clear transcript, speaker registry, and chat history
    ClearConversation,

    /// Export the transcript to a file
    Export { path: PathBuf, format: ExportFormat },

    /// Shut the orchestrator down
    Shutdown,
}

/// Events emitted by the orchestrator.
#[derive(Clone, Debug)]
pub enum StudioEvent {
    /// Live input level (RMS energy of the last block)
    Level(f32),

    /// The recording gate changed state
    StateChanged(VadState),

    /// An utterance was captured and its upload started
    ClipCaptured { request_id: Uuid, duration_ms: u32 },

    /// A transcript entry is ready for display
    Transcript(TranscriptEntry),

    /// An upload failed; the utterance will not be displayed
    TranscriptionFailed { request_id: Uuid, error: String },

    /// Incremental chat content
    ChatDelta { request_id: Uuid, content: String },

    /// Chat generation finished
    ChatComplete {
        request_id: Uuid,
        text: String,
        tokens: u32,
        elapsed_ms: u64,
    },

    /// Chat generation failed
    ChatFailed { request_id: Uuid, error: String },

    /// Backend health changed (polled)
    Health { online: bool },

    /// Live backend throughput derived from metrics scrapes
    Throughput {
        requests_per_sec: Option<f64>,
        tokens_per_sec: Option<f64>,
    },

    /// Transcript export finished
    Exported { path: PathBuf },

    /// Transcript export failed
    ExportFailed { error: String },

    /// The orchestrator shut down
    ShutDown,
}

/// Completions flowing back from network tasks to the control thread.
#[derive(Debug)]
pub enum NetEvent {
    Transcribed {
        request_id: Uuid,
        result: Result<TranscribeResponse>,
    },
    ChatFinished {
        request_id: Uuid,
        result: Result<String>,
        tokens: u32,
        elapsed_ms: u64,
    },
}

/// Caller-facing handle to a running orchestrator.
pub struct StudioHandle {
    command_tx: Sender<StudioCommand>,
    event_rx: Receiver<StudioEvent>,
    block_tx: Sender<Vec<f32>>,
}

impl StudioHandle {
    /// Send a command to the orchestrator
    pub fn send_command(&self, command: StudioCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| StudioError::ChannelError(format!("Command channel closed: {}", e)))
    }

    /// Receiver for orchestrator events
    pub fn events(&self) -> Receiver<StudioEvent> {
        self.event_rx.clone()
    }

    /// Sender for audio blocks; used by tests to inject synthetic audio
    pub fn audio_sender(&self) -> Sender<Vec<f32>> {
        self.block_tx.clone()
    }
}

/// The studio orchestrator.
pub struct Orchestrator {
    config: StudioConfig,
    channels: StudioChannels,
    client: Arc<ApiClient>,
    chat: Arc<ChatEngine>,
}

impl Orchestrator {
    /// Create an orchestrator and its caller handle.
    pub fn new(config: StudioConfig) -> Result<(Self, StudioHandle)> {
        let client = Arc::new(
            ApiClient::new(config.server_url.clone())?
                .with_transcribe_path(config.transcribe_path.clone()),
        );
        let chat = Arc::new(ChatEngine::new(Arc::clone(&client)));
        let channels = StudioChannels::new();

        let handle = StudioHandle {
            command_tx: channels.command_tx.clone(),
            event_rx: channels.event_rx.clone(),
            block_tx: channels.block_tx.clone(),
        };

        Ok((
            Self {
                config,
                channels,
                client,
                chat,
            },
            handle,
        ))
    }

    /// Start all workers. Returns their join handles.
    ///
    /// Fails with an explicit device error when capture is enabled but no
    /// input device is available; recording features are simply off in
    /// that case and the caller decides whether to continue without them.
    pub fn start(self) -> Result<Vec<std::thread::JoinHandle<()>>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| StudioError::ConfigError(format!("Failed to build runtime: {}", e)))?;

        let mut handles = Vec::new();
        let stop_capture = Arc::new(AtomicBool::new(false));

        // Sample rate the controller sees: the backend rate when forcing,
        // otherwise the device's native rate reported by the capture thread.
        let mut controller_rate = self
            .config
            .capture_target_rate()
            .unwrap_or(BACKEND_SAMPLE_RATE);

        if self.config.enable_capture {
            #[cfg(feature = "audio-io")]
            {
                let (rate, capture_handle) = spawn_capture_thread(
                    &self.config,
                    self.channels.block_tx.clone(),
                    Arc::clone(&stop_capture),
                )?;
                controller_rate = rate;
                handles.push(capture_handle);
            }
            #[cfg(not(feature = "audio-io"))]
            {
                return Err(StudioError::ConfigError(
                    "Audio capture requires the audio-io feature".into(),
                ));
            }
        }

        // Backend status polling
        spawn_health_poller(
            &runtime,
            Arc::clone(&self.client),
            self.channels.event_tx.clone(),
            self.config.health_poll_interval,
        );
        spawn_metrics_poller(
            &runtime,
            Arc::clone(&self.client),
            self.channels.event_tx.clone(),
            self.config.metrics_poll_interval,
        );

        let control = ControlLoop::new(self, controller_rate, runtime, stop_capture)?;
        handles.push(std::thread::spawn(move || control.run()));

        Ok(handles)
    }
}

#[cfg(feature = "audio-io")]
fn spawn_capture_thread(
    config: &StudioConfig,
    block_tx: Sender<Vec<f32>>,
    stop: Arc<AtomicBool>,
) -> Result<(u32, std::thread::JoinHandle<()>)> {
    use crate::audio::capture::AudioRecorder;
    use crossbeam_channel::bounded;

    let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);
    let block_size = config.block_size;
    let target_rate = config.capture_target_rate();

    // cpal streams are not Send, so the recorder lives on its own thread
    let handle = std::thread::spawn(move || {
        let mut recorder = match AudioRecorder::new() {
            Ok(recorder) => recorder,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let native_rate = recorder.sample_rate();
        let effective_rate = target_rate.unwrap_or(native_rate);
        if let Err(e) = recorder.start(block_tx, block_size, target_rate) {
            let _ = ready_tx.send(Err(e));
            return;
        }
        let _ = ready_tx.send(Ok(effective_rate));

        while !stop.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        recorder.stop();
    });

    let rate = ready_rx
        .recv()
        .map_err(|_| StudioError::AudioDeviceError("Capture thread died".into()))??;
    Ok((rate, handle))
}

fn spawn_health_poller(
    runtime: &tokio::runtime::Runtime,
    client: Arc<ApiClient>,
    event_tx: Sender<StudioEvent>,
    interval: std::time::Duration,
) {
    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let online = match client.health().await {
                Ok(status) => status.model_ready,
                Err(_) => false,
            };
            // A full channel only drops the update; disconnection ends the poll
            if let Err(crossbeam_channel::TrySendError::Disconnected(_)) =
                event_tx.try_send(StudioEvent::Health { online })
            {
                break;
            }
        }
    });
}

fn spawn_metrics_poller(
    runtime: &tokio::runtime::Runtime,
    client: Arc<ApiClient>,
    event_tx: Sender<StudioEvent>,
    interval: std::time::Duration,
) {
    runtime.spawn(async move {
        let mut tracker = ThroughputTracker::new();
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match client.metrics_raw().await {
                Ok(text) => {
                    tracker.update(parse_metrics(&text), Instant::now());
                    let event = StudioEvent::Throughput {
                        requests_per_sec: tracker.rate(STT_REQUESTS_TOTAL),
                        tokens_per_sec: tracker.rate(STT_TOKENS_GENERATED_TOTAL),
                    };
                    if let Err(crossbeam_channel::TrySendError::Disconnected(_)) =
                        event_tx.try_send(event)
                    {
                        break;
                    }
                }
                Err(e) => debug!("Metrics scrape skipped: {}", e),
            }
        }
    });
}

/// State owned by the control thread.
struct ControlLoop {
    config: StudioConfig,
    controller: CaptureController,
    registry: SpeakerRegistry,
    store: TranscriptStore,
    history: Vec<ChatMessage>,
    // Previous segment's speaker-turn flag, for the embedding-less fallback
    turn_pending: bool,

    client: Arc<ApiClient>,
    chat: Arc<ChatEngine>,
    runtime: tokio::runtime::Runtime,
    stop_capture: Arc<AtomicBool>,

    command_rx: Receiver<StudioCommand>,
    block_rx: Receiver<Vec<f32>>,
    net_rx: Receiver<NetEvent>,
    net_tx: Sender<NetEvent>,
    event_tx: Sender<StudioEvent>,
}

impl ControlLoop {
    fn new(
        orchestrator: Orchestrator,
        controller_rate: u32,
        runtime: tokio::runtime::Runtime,
        stop_capture: Arc<AtomicBool>,
    ) -> Result<Self> {
        let Orchestrator {
            config,
            channels,
            client,
            chat,
        } = orchestrator;

        let mut controller = CaptureController::new(controller_rate, config.vad.clone())?;
        controller.set_hands_free(config.hands_free)?;
        let registry = SpeakerRegistry::new(config.cluster.clone());

        Ok(Self {
            config,
            controller,
            registry,
            store: TranscriptStore::new(),
            history: Vec::new(),
            turn_pending: false,
            client,
            chat,
            runtime,
            stop_capture,
            command_rx: channels.command_rx,
            block_rx: channels.block_rx,
            net_rx: channels.net_rx,
            net_tx: channels.net_tx,
            event_tx: channels.event_tx,
        })
    }

    fn run(mut self) {
        info!("Studio orchestrator started");
        let command_rx = self.command_rx.clone();
        let block_rx = self.block_rx.clone();
        let net_rx = self.net_rx.clone();
        loop {
            crossbeam_channel::select! {
                recv(command_rx) -> msg => match msg {
                    Ok(StudioCommand::Shutdown) => break,
                    Ok(command) => self.handle_command(command),
                    Err(_) => break,
                },
                recv(block_rx) -> msg => match msg {
                    Ok(block) => self.handle_block(&block),
                    Err(_) => break,
                },
                recv(net_rx) -> msg => match msg {
                    Ok(event) => self.handle_net_event(event),
                    Err(_) => break,
                },
            }
        }

        self.stop_capture.store(true, Ordering::SeqCst);
        self.chat.abort();
        let _ = self.event_tx.send(StudioEvent::ShutDown);
        info!("Studio orchestrator stopped");
    }

    fn handle_block(&mut self, block: &[f32]) {
        let was_recording = self.controller.is_recording();
        match self.controller.on_audio_block(block) {
            Ok(clip) => {
                // Level updates are lossy by design
                let _ = self
                    .event_tx
                    .try_send(StudioEvent::Level(self.controller.level()));
                if was_recording != self.controller.is_recording() {
                    self.emit(StudioEvent::StateChanged(self.controller.state()));
                }
                if let Some(clip) = clip {
                    self.upload(clip);
                }
            }
            Err(e) => error!("Audio block processing failed: {}", e),
        }
    }

    fn handle_command(&mut self, command: StudioCommand) {
        match command {
            StudioCommand::StartRecording => {
                self.controller.start_recording();
                self.emit(StudioEvent::StateChanged(self.controller.state()));
            }
            StudioCommand::StopRecording => match self.controller.stop_recording() {
                Ok(clip) => {
                    self.emit(StudioEvent::StateChanged(self.controller.state()));
                    if let Some(clip) = clip {
                        self.upload(clip);
                    }
                }
                Err(e) => error!("Stop recording failed: {}", e),
            },
            StudioCommand::SetHandsFree(enabled) => match self.controller.set_hands_free(enabled) {
                Ok(clip) => {
                    self.emit(StudioEvent::StateChanged(self.controller.state()));
                    if let Some(clip) = clip {
                        self.upload(clip);
                    }
                }
                Err(e) => error!("Hands-free toggle failed: {}", e),
            },
            StudioCommand::SetSpeakerThreshold(threshold) => {
                self.registry.set_threshold(threshold);
            }
            StudioCommand::RenameSpeaker { id, name } => {
                if !self.registry.rename(id, name) {
                    warn!("Rename ignored: unknown speaker {}", id);
                }
            }
            StudioCommand::Chat { text, request_id } => self.start_chat(text, request_id),
            StudioCommand::AbortChat => self.chat.abort(),
            StudioCommand::ClearConversation => {
                self.store.clear();
                self.registry.reset();
                self.history.clear();
                self.turn_pending = false;
                info!("Conversation cleared");
            }
            StudioCommand::Export { path, format } => {
                match self.store.write_to_file(&path, format) {
                    Ok(()) => self.emit(StudioEvent::Exported { path }),
                    Err(e) => self.emit(StudioEvent::ExportFailed {
                        error: e.to_string(),
                    }),
                }
            }
            StudioCommand::Shutdown => unreachable!("handled by the select loop"),
        }
    }

    fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Transcribed { request_id, result } => match result {
                Ok(response) => self.render_response(response),
                Err(e) => {
                    warn!("Transcription {} failed: {}", request_id, e);
                    self.emit(StudioEvent::TranscriptionFailed {
                        request_id,
                        error: e.user_message(),
                    });
                }
            },
            NetEvent::ChatFinished {
                request_id,
                result,
                tokens,
                elapsed_ms,
            } => match result {
                Ok(text) => {
                    self.history.push(ChatMessage::assistant(text.clone()));
                    self.emit(StudioEvent::ChatComplete {
                        request_id,
                        text,
                        tokens,
                        elapsed_ms,
                    });
                }
                Err(StudioError::Aborted) => {
                    debug!("Chat {} superseded", request_id);
                }
                Err(e) => {
                    self.emit(StudioEvent::ChatFailed {
                        request_id,
                        error: e.user_message(),
                    });
                }
            },
        }
    }

    fn upload(&mut self, clip: EncodedClip) {
        let request_id = Uuid::new_v4();
        self.emit(StudioEvent::ClipCaptured {
            request_id,
            duration_ms: clip.duration_ms,
        });

        let client = Arc::clone(&self.client);
        let options = self.config.transcribe.clone();
        let net_tx = self.net_tx.clone();

        // Capture keeps running while the upload is in flight; the result
        // comes back through the net channel in arrival order.
        self.runtime.spawn(async move {
            let result = client.transcribe(clip.wav, &options).await;
            let _ = net_tx.send(NetEvent::Transcribed { request_id, result });
        });
    }

    fn render_response(&mut self, response: TranscribeResponse) {
        if response.segments.is_empty() {
            // Minimal response shape: one entry for the whole utterance
            let text = response.text.trim();
            if text.is_empty() {
                debug!("Empty transcription, nothing to display");
                return;
            }
            let duration = response.duration.unwrap_or(0.0);
            let cluster = self.registry.identify_by_turn(self.turn_pending);
            self.turn_pending = false;
            let entry = TranscriptEntry {
                speaker: cluster.id,
                speaker_name: cluster.display_name.clone(),
                text: text.to_string(),
                start: 0.0,
                end: duration,
                emotion: None,
            };
            self.store.push(entry.clone());
            self.emit(StudioEvent::Transcript(entry));
            return;
        }

        for segment in response.segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }

            let cluster = match &segment.speaker_vec {
                Some(vec) => self
                    .registry
                    .identify(Some(vec.as_slice()), segment.gender.as_deref()),
                None => self.registry.identify_by_turn(self.turn_pending),
            };
            let entry = TranscriptEntry {
                speaker: cluster.id,
                speaker_name: cluster.display_name.clone(),
                text: text.to_string(),
                start: segment.start,
                end: segment.end,
                emotion: segment.emotion.clone(),
            };
            self.turn_pending = segment.speaker_turn_next;

            self.store.push(entry.clone());
            self.emit(StudioEvent::Transcript(entry));
        }
    }

    fn start_chat(&mut self, text: String, request_id: Uuid) {
        self.history.push(ChatMessage::user(text));

        let mut messages = vec![ChatMessage::system(self.config.system_prompt.clone())];
        let tail_start = self.history.len().saturating_sub(self.config.history_window);
        messages.extend_from_slice(&self.history[tail_start..]);

        let request = ChatRequest {
            messages,
            temperature: self.config.chat_temperature,
            max_tokens: self.config.chat_max_tokens,
            stream: true,
        };

        let chat = Arc::clone(&self.chat);
        let event_tx = self.event_tx.clone();
        let net_tx = self.net_tx.clone();

        self.runtime.spawn(async move {
            let started = Instant::now();
            let mut tokens = 0u32;
            let mut on_delta = |content: String| {
                tokens += 1;
                let _ = event_tx.send(StudioEvent::ChatDelta {
                    request_id,
                    content,
                });
            };
            let result = chat.generate(request, &mut on_delta).await;
            let _ = net_tx.send(NetEvent::ChatFinished {
                request_id,
                result,
                tokens,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        });
    }

    fn emit(&self, event: StudioEvent) {
        let _ = self.event_tx.send(event);
    }
}
