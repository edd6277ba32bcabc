//! Terminal frontend for Reggie.
//!
//! Prints runtime events and reads commands from stdin. Lines starting with
//! `/` are frontend commands; anything else is sent as a typed command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use reggie::config::ReggieConfig;
use reggie::dispatch::ToolRegistry;
use reggie::llm::GeminiSessionFactory;
use reggie::pipeline::Sender;
use reggie::preferences::PreferenceStore;
use reggie::runtime::{NoticeLevel, RuntimeEvent, UserIntent};
use reggie::speech::{CommandSink, LogSink, ProcessSource, SpeechSink};
use reggie::AssistantCoordinator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Reggie: a voice-driven desktop assistant.
#[derive(Parser)]
#[command(name = "reggie", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the preferences file.
    #[arg(long)]
    preferences: Option<PathBuf>,

    /// Do not start the microphone automatically.
    #[arg(long)]
    no_mic: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ReggieConfig::default_config_path);
    let config = if config_path.exists() {
        ReggieConfig::from_file(&config_path)?
    } else {
        ReggieConfig::default()
    };

    if cli.write_config {
        config.save_to_file(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let _log_guard = init_logging(&config)?;

    let preferences = PreferenceStore::load(
        cli.preferences
            .clone()
            .unwrap_or_else(PreferenceStore::default_path),
    )?;

    let registry = Arc::new(ToolRegistry::with_builtin_tools());
    let sessions = Arc::new(GeminiSessionFactory::new(
        config.llm.clone(),
        registry.schemas_for_api(),
    ));

    let sink: Arc<dyn SpeechSink> = match CommandSink::detect(&config.output) {
        Some(sink) => {
            info!(program = %config.output.effective_command(), "speech output enabled");
            Arc::new(sink)
        }
        None => {
            warn!("no speech synthesizer found, replies are logged only");
            Arc::new(LogSink)
        }
    };

    let source = if config.capture.command.is_empty() {
        None
    } else {
        match ProcessSource::new(&config.capture.command, config.capture.language.clone()) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(error = %e, "speech recognizer disabled");
                None
            }
        }
    };
    let has_source = source.is_some();

    let (runtime_tx, runtime_rx) = broadcast::channel(64);
    let mut coordinator = AssistantCoordinator::new(config.clone(), sessions, sink, preferences)
        .with_registry(registry)
        .with_runtime_events(runtime_tx);
    if let Some(source) = source {
        coordinator = coordinator.with_speech_source(Arc::new(source));
    }
    let cancel = coordinator.cancel_token();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    tokio::spawn(print_events(runtime_rx));

    let (intent_tx, intent_rx) = mpsc::channel(16);
    if has_source && !cli.no_mic {
        intent_tx.send(UserIntent::ActivateMicrophone).await?;
    }
    tokio::spawn(read_stdin(intent_tx));

    println!("Reggie v{}", env!("CARGO_PKG_VERSION"));
    if has_source {
        println!(
            "Say \"{}\" followed by a command, or type one below.",
            capitalize(&config.assistant.wake_phrase)
        );
    } else {
        println!("Type a command below.");
    }
    println!("Commands: /mic, /voice <name>, /key <api key>, /quit\n");

    coordinator.run(intent_rx).await?;
    Ok(())
}

/// Log to daily files when a log directory is configured, else to stderr.
fn init_logging(config: &ReggieConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reggie=info"));

    let (file_layer, guard) = match &config.logging.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("reggie")
                .filename_suffix("log")
                .max_log_files(7)
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(guard)
}

async fn print_events(mut rx: broadcast::Receiver<RuntimeEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "console fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            RuntimeEvent::StatusChanged(status) => println!("[{status}]"),
            RuntimeEvent::Transcript(text) if !text.is_empty() => println!("  … {text}"),
            RuntimeEvent::Transcript(_) => {}
            RuntimeEvent::Message(message) => {
                let who = match message.sender {
                    Sender::User => "You",
                    Sender::Assistant => "Reggie",
                };
                println!(
                    "{} {who}: {}",
                    message.created_at.format("%H:%M"),
                    message.text
                );
            }
            RuntimeEvent::CaptureNotice { level, message, .. } => match level {
                NoticeLevel::Transient => println!("(!) {message}"),
                NoticeLevel::Fatal => println!("(x) {message}"),
            },
            RuntimeEvent::Alert { .. } => print!("\x07"),
            RuntimeEvent::CredentialRequired { reason } => {
                println!("{reason} Use /key <api key>.");
            }
            RuntimeEvent::CaptureActive(active) => {
                println!("{}", if active { "(mic on)" } else { "(mic off)" });
            }
        }
    }
}

async fn read_stdin(tx: mpsc::Sender<UserIntent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        let Some(intent) = parse_line(&line) else {
            continue;
        };
        let quit = intent == UserIntent::Shutdown;
        if tx.send(intent).await.is_err() || quit {
            return;
        }
    }
    let _ = tx.send(UserIntent::Shutdown).await;
}

fn parse_line(line: &str) -> Option<UserIntent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let intent = match command {
        "/mic" => UserIntent::ActivateMicrophone,
        "/voice" => UserIntent::SetVoice(rest.to_string()),
        "/key" => UserIntent::SetCredential(rest.to_string()),
        "/quit" | "/exit" => UserIntent::Shutdown,
        _ => UserIntent::SendText(line.to_string()),
    };
    Some(intent)
}

/// Capitalize the first character of a string.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => {
            let mut result = c.to_uppercase().to_string();
            result.push_str(chars.as_str());
            result
        }
        None => String::new(),
    }
}
