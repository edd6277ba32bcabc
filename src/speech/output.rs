//! Speech output.
//!
//! A [`SpeechSink`] speaks one text and returns when it is done. The
//! [`SpeechWorker`] serialises utterances through one sink and reports a
//! start notification plus exactly one terminal notification (ended or
//! failed) for every utterance it accepted.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OutputConfig;
use crate::error::{ReggieError, Result};

/// Something that can speak text.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    /// Speak `text`, optionally with a specific voice. Resolves when speech
    /// has finished.
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<()>;
}

/// Speaks through an external text-to-speech program.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    voice_flag: String,
}

impl CommandSink {
    /// Sink for `program`, passing the voice with `voice_flag`.
    pub fn new(program: impl Into<String>, voice_flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voice_flag: voice_flag.into(),
        }
    }

    /// Sink for the configured program, if it can be found on `PATH`.
    pub fn detect(config: &OutputConfig) -> Option<Self> {
        let program = config.effective_command();
        match which::which(&program) {
            Ok(path) => {
                info!(program = %path.display(), "using speech output program");
                Some(Self::new(path.to_string_lossy(), config.voice_flag.clone()))
            }
            Err(e) => {
                warn!(program, error = %e, "speech output program not found");
                None
            }
        }
    }

    fn args<'a>(&'a self, text: &'a str, voice: Option<&'a str>) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(3);
        if let Some(voice) = voice.map(str::trim).filter(|v| !v.is_empty())
            && !self.voice_flag.is_empty()
        {
            args.push(self.voice_flag.as_str());
            args.push(voice);
        }
        args.push(text);
        args
    }
}

#[async_trait]
impl SpeechSink for CommandSink {
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .args(self.args(text, voice))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| ReggieError::Output(format!("cannot run {}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(ReggieError::Output(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

/// Sink that only logs; used when no speech program is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl SpeechSink for LogSink {
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<()> {
        info!(voice, text, "speak");
        Ok(())
    }
}

/// Identifies one accepted utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

/// Lifecycle notifications from the [`SpeechWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Speech for the utterance began.
    Started(UtteranceId),
    /// Speech finished normally.
    Ended(UtteranceId),
    /// Speech failed or was cut short.
    Failed {
        /// Utterance that failed.
        id: UtteranceId,
        /// What went wrong.
        error: String,
    },
}

struct SpeakRequest {
    id: UtteranceId,
    text: String,
    voice: Option<String>,
}

/// Handle to the background task that speaks queued utterances in order.
pub struct SpeechWorker {
    requests: mpsc::UnboundedSender<SpeakRequest>,
    next_id: u64,
}

impl SpeechWorker {
    /// Spawn the worker. Notifications go to `events`; `cancel` stops it.
    pub fn spawn(
        sink: Arc<dyn SpeechSink>,
        events: mpsc::Sender<SpeechEvent>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(speech_loop(sink, rx, events, cancel));
        (
            Self {
                requests: tx,
                next_id: 0,
            },
            handle,
        )
    }

    /// Queue `text` for speaking.
    ///
    /// # Errors
    ///
    /// Returns [`ReggieError::Channel`] if the worker has stopped; no
    /// notifications will follow for this text in that case.
    pub fn speak(&mut self, text: impl Into<String>, voice: Option<String>) -> Result<UtteranceId> {
        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        self.requests
            .send(SpeakRequest {
                id,
                text: text.into(),
                voice,
            })
            .map_err(|_| ReggieError::Channel("speech worker stopped".into()))?;
        Ok(id)
    }
}

async fn speech_loop(
    sink: Arc<dyn SpeechSink>,
    mut requests: mpsc::UnboundedReceiver<SpeakRequest>,
    events: mpsc::Sender<SpeechEvent>,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            () = cancel.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let id = request.id;
        debug!(id = id.0, "speaking");
        if events.send(SpeechEvent::Started(id)).await.is_err() {
            break;
        }

        let terminal = tokio::select! {
            () = cancel.cancelled() => SpeechEvent::Failed {
                id,
                error: "cancelled".into(),
            },
            result = sink.speak(&request.text, request.voice.as_deref()) => match result {
                Ok(()) => SpeechEvent::Ended(id),
                Err(e) => {
                    warn!(id = id.0, error = %e, "speech output failed");
                    SpeechEvent::Failed {
                        id,
                        error: e.to_string(),
                    }
                }
            },
        };

        let stop = matches!(&terminal, SpeechEvent::Failed { error, .. } if error == "cancelled");
        if events.send(terminal).await.is_err() || stop {
            break;
        }
    }
    debug!("speech worker stopped");
}
