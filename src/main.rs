use clap::Parser;
use omni_studio::api::types::TranscribeOptions;
use omni_studio::audio::VadConfig;
use omni_studio::cluster::{ClusterConfig, SpeakerId};
use omni_studio::config::StudioConfig;
use omni_studio::studio::{Orchestrator, StudioCommand, StudioEvent};
use omni_studio::transcript::ExportFormat;
use std::io::Write as _;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Terminal client for a speech-to-text / chat backend.
#[derive(Parser, Debug)]
#[command(name = "omni-studio", version, about)]
struct Cli {
    /// Backend base URL
    #[arg(long, default_value = "http://127.0.0.1:15030")]
    server: String,

    /// Start in hands-free (VAD-driven) capture mode
    #[arg(long)]
    hands_free: bool,

    /// Transcription language hint (auto-detect when omitted)
    #[arg(long)]
    language: Option<String>,

    /// Translate transcripts to English
    #[arg(long)]
    translate: bool,

    /// Do not request per-segment speaker data
    #[arg(long)]
    no_diarization: bool,

    /// RMS energy threshold for voice activity
    #[arg(long, default_value_t = 0.02)]
    vad_threshold: f32,

    /// Trailing silence that closes an utterance, in milliseconds
    #[arg(long, default_value_t = 1500)]
    silence_ms: u32,

    /// Discard utterances shorter than this, in milliseconds
    #[arg(long, default_value_t = 500)]
    min_utterance_ms: u32,

    /// Cosine similarity threshold for speaker assignment
    #[arg(long, default_value_t = 0.85)]
    speaker_threshold: f32,

    /// Keep clips at the capture device's native sample rate
    #[arg(long)]
    native_rate: bool,

    /// Run without a microphone (chat only)
    #[arg(long)]
    no_capture: bool,

    /// System prompt for chat requests
    #[arg(long)]
    system_prompt: Option<String>,
}

fn build_config(cli: &Cli) -> StudioConfig {
    let vad = VadConfig::default()
        .with_threshold(cli.vad_threshold)
        .with_hangover_ms(cli.silence_ms)
        .with_min_utterance_ms(cli.min_utterance_ms);

    let cluster = ClusterConfig::default().with_threshold(cli.speaker_threshold);

    let transcribe = TranscribeOptions {
        language: cli.language.clone(),
        translate: cli.translate,
        diarization: !cli.no_diarization,
        ..Default::default()
    };

    let mut config = StudioConfig::new(cli.server.clone())
        .with_vad(vad)
        .with_cluster(cluster)
        .with_transcribe_options(transcribe)
        .with_hands_free(cli.hands_free);

    if cli.native_rate {
        config = config.with_native_rate();
    }
    if cli.no_capture {
        config = config.without_capture();
    }
    if let Some(prompt) = &cli.system_prompt {
        config = config.with_system_prompt(prompt.clone());
    }
    config
}

fn print_help() {
    println!("Commands:");
    println!("  start                 begin a manual recording");
    println!("  stop                  stop and upload the recording");
    println!("  hands on|off          toggle hands-free capture");
    println!("  say <text>            send a chat message");
    println!("  abort                 abort the streaming chat response");
    println!("  rename <id> <name>    rename a speaker (id from spk_<id>)");
    println!("  export <path> [fmt]   export transcript (txt, json, srt)");
    println!("  clear                 clear the conversation");
    println!("  quit                  exit");
}

fn parse_command(line: &str) -> Option<StudioCommand> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb {
        "start" => Some(StudioCommand::StartRecording),
        "stop" => Some(StudioCommand::StopRecording),
        "hands" => match rest {
            "on" => Some(StudioCommand::SetHandsFree(true)),
            "off" => Some(StudioCommand::SetHandsFree(false)),
            _ => {
                eprintln!("Usage: hands on|off");
                None
            }
        },
        "say" if !rest.is_empty() => Some(StudioCommand::Chat {
            text: rest.to_string(),
            request_id: Uuid::new_v4(),
        }),
        "abort" => Some(StudioCommand::AbortChat),
        "rename" => {
            let (id, name) = rest.split_once(char::is_whitespace)?;
            match id.trim_start_matches("spk_").parse::<u32>() {
                Ok(id) => Some(StudioCommand::RenameSpeaker {
                    id: SpeakerId(id),
                    name: name.trim().to_string(),
                }),
                Err(_) => {
                    eprintln!("Usage: rename <id> <name>");
                    None
                }
            }
        }
        "export" if !rest.is_empty() => {
            let mut parts = rest.split_whitespace();
            let path = parts.next()?.to_string();
            let format = match parts.next() {
                Some(fmt) => match fmt.parse::<ExportFormat>() {
                    Ok(format) => format,
                    Err(e) => {
                        eprintln!("{}", e);
                        return None;
                    }
                },
                None => ExportFormat::Text,
            };
            Some(StudioCommand::Export {
                path: path.into(),
                format,
            })
        }
        "clear" => Some(StudioCommand::ClearConversation),
        "quit" | "exit" => Some(StudioCommand::Shutdown),
        "help" | "?" => {
            print_help();
            None
        }
        "" => None,
        other => {
            eprintln!("Unknown command: {} (try 'help')", other);
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omni_studio=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Starting Omni-Studio client for {}", cli.server);

    let config = build_config(&cli);
    let (orchestrator, handle) = Orchestrator::new(config)?;
    let workers = orchestrator.start()?;

    print_help();
    let events = handle.events();

    // Commands come from stdin on their own thread; events render below.
    let stdin_thread = std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => {
                    let _ = handle.send_command(StudioCommand::Shutdown);
                    break;
                }
                Ok(_) => {
                    if let Some(command) = parse_command(&line) {
                        let is_shutdown = matches!(command, StudioCommand::Shutdown);
                        if handle.send_command(command).is_err() || is_shutdown {
                            break;
                        }
                    }
                }
                Err(_) => {
                    let _ = handle.send_command(StudioCommand::Shutdown);
                    break;
                }
            }
        }
    });

    let mut online: Option<bool> = None;
    for event in events.iter() {
        match event {
            StudioEvent::Level(_) => {}
            StudioEvent::StateChanged(state) => info!("Recorder state: {:?}", state),
            StudioEvent::ClipCaptured { duration_ms, .. } => {
                println!("[clip] {} ms captured, uploading...", duration_ms);
            }
            StudioEvent::Transcript(entry) => {
                println!("{}: {}", entry.speaker_name, entry.text);
            }
            StudioEvent::TranscriptionFailed { error, .. } => {
                eprintln!("[error] {}", error);
            }
            StudioEvent::ChatDelta { content, .. } => {
                print!("{}", content);
                let _ = std::io::stdout().flush();
            }
            StudioEvent::ChatComplete {
                tokens, elapsed_ms, ..
            } => {
                let seconds = (elapsed_ms as f64 / 1000.0).max(0.001);
                println!();
                println!(
                    "[done] {} tokens in {} ms ({:.1} tok/s)",
                    tokens,
                    elapsed_ms,
                    tokens as f64 / seconds
                );
            }
            StudioEvent::ChatFailed { error, .. } => {
                println!();
                eprintln!("[error] {}", error);
            }
            StudioEvent::Health { online: now } => {
                if online != Some(now) {
                    online = Some(now);
                    println!("[backend] {}", if now { "Online" } else { "Offline" });
                }
            }
            StudioEvent::Throughput {
                requests_per_sec,
                tokens_per_sec,
            } => {
                if let (Some(rps), Some(tps)) = (requests_per_sec, tokens_per_sec) {
                    info!("Backend throughput: {:.2} req/s, {:.1} tok/s", rps, tps);
                }
            }
            StudioEvent::Exported { path } => println!("[export] wrote {:?}", path),
            StudioEvent::ExportFailed { error } => eprintln!("[error] {}", error),
            StudioEvent::ShutDown => break,
        }
    }

    // stdin may still be blocked in read_line; the thread dies with the
    // process rather than holding up shutdown
    drop(stdin_thread);
    for worker in workers {
        let _ = worker.join();
    }
    info!("Goodbye");
    Ok(())
}
