//! Continuous speech capture.
//!
//! A [`SpeechSource`] opens one recognition stream at a time. The
//! [`CaptureAdapter`] keeps a stream running while capture is active:
//! when a stream ends on its own it is reopened after the restart delay,
//! unless capture was stopped or a fatal error was reported.
//!
//! Error classification:
//!
//! | source code                            | kind                | restart | surfaced |
//! |----------------------------------------|---------------------|---------|----------|
//! | `not-allowed`, `service-not-allowed`   | permission denied   | no      | yes      |
//! | `audio-capture`                        | no audio hardware   | no      | yes      |
//! | `no-speech`                            | silence             | yes     | no       |
//! | anything else                          | transient           | yes     | yes      |

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ReggieError, Result};

/// One event from an open recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Recognition result: newly finalized text and the current interim text.
    Result {
        /// Finalized text since the previous result (may be empty).
        final_text: String,
        /// Unstable hypothesis for what is being said now (may be empty).
        interim_text: String,
    },
    /// Recognizer error code, e.g. `no-speech` or `not-allowed`.
    Error(String),
}

/// Classified capture error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// Microphone access refused.
    PermissionDenied,
    /// No usable audio input device.
    NoHardware,
    /// Nothing was said before the recognizer gave up.
    NoSpeech,
    /// The recognizer could not be started at all.
    Unavailable(String),
    /// Anything else (network, aborted, unknown).
    Transient(String),
}

impl CaptureErrorKind {
    /// Classify a recognizer error code.
    pub fn classify(code: &str) -> Self {
        match code.trim() {
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            "audio-capture" => Self::NoHardware,
            "no-speech" => Self::NoSpeech,
            other => Self::Transient(other.to_string()),
        }
    }

    /// Fatal errors stop capture; no restart follows.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::NoHardware | Self::Unavailable(_)
        )
    }

    /// Silent errors are not shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NoSpeech)
    }

    /// Message for the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Microphone access was denied. Please allow microphone access to use voice commands.".into()
            }
            Self::NoHardware => "No microphone was found. Voice commands are unavailable.".into(),
            Self::NoSpeech => "No speech detected.".into(),
            Self::Unavailable(reason) => {
                format!("Speech recognition is unavailable ({reason}). You can still type commands.")
            }
            Self::Transient(code) => format!("Speech recognition error: {code}"),
        }
    }
}

/// What the adapter reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureUpdate {
    /// A recognition stream is open.
    Started,
    /// Recognition result to feed the segmenter.
    Fragment {
        /// Newly finalized text.
        final_text: String,
        /// Current interim text.
        interim_text: String,
    },
    /// Non-fatal error worth showing; capture continues.
    Transient(CaptureErrorKind),
    /// Fatal error; capture has stopped.
    Fatal(CaptureErrorKind),
    /// Capture stopped (after [`CaptureAdapter::stop`] or a fatal error).
    Stopped,
}

/// Something that can open recognition streams.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    /// Open one stream. The stream has ended when the receiver yields `None`.
    ///
    /// Dropping the receiver must release the underlying recognizer.
    async fn open(&self) -> Result<mpsc::Receiver<SourceEvent>>;
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps a recognition stream running while capture is active.
pub struct CaptureAdapter {
    source: Arc<dyn SpeechSource>,
    restart_delay: Duration,
    updates: mpsc::Sender<CaptureUpdate>,
    running: Option<Running>,
}

impl CaptureAdapter {
    /// Create a stopped adapter reporting to `updates`.
    pub fn new(
        source: Arc<dyn SpeechSource>,
        restart_delay: Duration,
        updates: mpsc::Sender<CaptureUpdate>,
    ) -> Self {
        Self {
            source,
            restart_delay,
            updates,
            running: None,
        }
    }

    /// Whether a capture loop is active.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled() && !r.handle.is_finished())
    }

    /// Start capturing. Does nothing if already running.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("capture already running");
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            Arc::clone(&self.source),
            self.restart_delay,
            self.updates.clone(),
            cancel.clone(),
        ));
        info!("speech capture started");
        self.running = Some(Running { cancel, handle });
    }

    /// Stop capturing and suppress any pending restart.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            info!("speech capture stopped");
        }
    }
}

impl Drop for CaptureAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn capture_loop(
    source: Arc<dyn SpeechSource>,
    restart_delay: Duration,
    updates: mpsc::Sender<CaptureUpdate>,
    cancel: CancellationToken,
) {
    loop {
        let mut stream = tokio::select! {
            () = cancel.cancelled() => break,
            opened = source.open() => match opened {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "cannot open speech recognition stream");
                    let _ = updates
                        .send(CaptureUpdate::Fatal(CaptureErrorKind::Unavailable(e.to_string())))
                        .await;
                    break;
                }
            },
        };
        let _ = updates.send(CaptureUpdate::Started).await;

        let mut fatal = false;
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => None,
                event = stream.recv() => event,
            };
            let Some(event) = event else { break };

            match event {
                SourceEvent::Result {
                    final_text,
                    interim_text,
                } => {
                    let _ = updates
                        .send(CaptureUpdate::Fragment {
                            final_text,
                            interim_text,
                        })
                        .await;
                }
                SourceEvent::Error(code) => {
                    let kind = CaptureErrorKind::classify(&code);
                    if kind.is_fatal() {
                        warn!(code, "fatal speech recognition error");
                        let _ = updates.send(CaptureUpdate::Fatal(kind)).await;
                        fatal = true;
                        break;
                    } else if kind.is_silent() {
                        debug!("no speech detected");
                    } else {
                        warn!(code, "transient speech recognition error");
                        let _ = updates.send(CaptureUpdate::Transient(kind)).await;
                    }
                }
            }
        }
        drop(stream);

        if fatal || cancel.is_cancelled() {
            break;
        }

        debug!(delay_ms = restart_delay.as_millis() as u64, "recognition stream ended, restarting");
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(restart_delay) => {}
        }
    }
    let _ = updates.send(CaptureUpdate::Stopped).await;
}

// ── Process-backed source ──────────────────────────────────────

/// Parse one line of the recognizer line protocol.
///
/// `final: <text>` and `interim: <text>` carry results; `error: <code>`
/// reports an error. Anything else is ignored.
pub fn parse_protocol_line(line: &str) -> Option<SourceEvent> {
    let (tag, rest) = line.split_once(':')?;
    let rest = rest.trim();
    match tag.trim() {
        "final" => Some(SourceEvent::Result {
            final_text: rest.to_string(),
            interim_text: String::new(),
        }),
        "interim" => Some(SourceEvent::Result {
            final_text: String::new(),
            interim_text: rest.to_string(),
        }),
        "error" => Some(SourceEvent::Error(rest.to_string())),
        _ => None,
    }
}

/// Runs an external recognizer program per stream and reads its stdout.
///
/// The program exiting ends the stream; dropping the stream kills it.
#[derive(Debug, Clone)]
pub struct ProcessSource {
    program: String,
    args: Vec<String>,
    language: String,
}

impl ProcessSource {
    /// Build from a command line (`program arg...`).
    ///
    /// # Errors
    ///
    /// Returns [`ReggieError::Config`] when the command line is empty.
    pub fn new(command: &[String], language: impl Into<String>) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ReggieError::Config("capture command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            language: language.into(),
        })
    }
}

#[async_trait]
impl SpeechSource for ProcessSource {
    async fn open(&self) -> Result<mpsc::Receiver<SourceEvent>> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env("REGGIE_LANG", &self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReggieError::Capture(format!("cannot start {}: {e}", self.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReggieError::Capture("recognizer stdout unavailable".into()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let line = tokio::select! {
                    () = tx.closed() => break,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_protocol_line(&line)
                            && tx.send(event).await.is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "recognizer output unreadable");
                        break;
                    }
                }
            }
            // Dropping the child kills the recognizer if it is still running.
            drop(child);
        });
        Ok(rx)
    }
}
