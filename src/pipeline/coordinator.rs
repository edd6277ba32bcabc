//! Assistant coordinator.
//!
//! One task owns every piece of mutable assistant state: the status
//! machine, the utterance segmenter, the scheduled item store, the message
//! log and the preferences. Everything else (capture, speech output, remote
//! requests, frontends) talks to it over channels, so state changes happen
//! in one place and in arrival order.
//!
//! ```text
//! capture ─┐                         ┌─▶ speech worker ─┐
//! intents ─┼─▶ coordinator loop ─────┼─▶ runtime events │
//! poll ────┤   (status, segmenter,   └─▶ dispatch task ─┤
//! timers ──┘    store, log)  ◀────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{AssistantConfig, ReggieConfig};
use crate::dispatch::{
    DispatchKind, DispatchOutcome, Dispatcher, SideEffect, TRANSPORT_FAILURE_MESSAGE,
    ToolContext, ToolRegistry,
};
use crate::error::Result;
use crate::launcher::{AppLauncher, SystemLauncher};
use crate::llm::SessionFactory;
use crate::pipeline::messages::{MessageLog, Sender};
use crate::pipeline::segmenter::UtteranceSegmenter;
use crate::preferences::PreferenceStore;
use crate::runtime::{NoticeLevel, RuntimeEvent, UserIntent};
use crate::scheduler::{ExpiredItem, ScheduledItemStore};
use crate::speech::{
    CaptureAdapter, CaptureErrorKind, CaptureUpdate, SpeechEvent, SpeechSink, SpeechSource,
    SpeechWorker, clean_for_speech,
};
use crate::status::{AssistantStatus, StatusEvent, StatusMachine, Transition};
use crate::wakeword::{GateDecision, WakeGate};

/// Shown when a command arrives but no session exists.
const NO_KEY_REASON: &str = "No API key configured. Please enter your Gemini API key.";

/// Shown after the remote endpoint rejected the key.
const KEY_REJECTED_REASON: &str = "The API key was rejected. Please enter a valid key.";

/// A dispatch result tagged with the session that produced it.
struct Completed {
    session: u64,
    outcome: DispatchOutcome,
}

/// Orchestrates capture, gating, dispatch, scheduling and speech output.
pub struct AssistantCoordinator {
    config: ReggieConfig,
    sessions: Arc<dyn SessionFactory>,
    sink: Arc<dyn SpeechSink>,
    source: Option<Arc<dyn SpeechSource>>,
    clock: Arc<dyn Clock>,
    launcher: Arc<dyn AppLauncher>,
    registry: Arc<ToolRegistry>,
    preferences: PreferenceStore,
    runtime_tx: Option<broadcast::Sender<RuntimeEvent>>,
    cancel: CancellationToken,
}

impl AssistantCoordinator {
    /// Create a coordinator with the system clock and launcher and the
    /// built-in tools. Voice capture is off until a source is attached.
    pub fn new(
        config: ReggieConfig,
        sessions: Arc<dyn SessionFactory>,
        sink: Arc<dyn SpeechSink>,
        preferences: PreferenceStore,
    ) -> Self {
        Self {
            config,
            sessions,
            sink,
            source: None,
            clock: Arc::new(SystemClock),
            launcher: Arc::new(SystemLauncher),
            registry: Arc::new(ToolRegistry::with_builtin_tools()),
            preferences,
            runtime_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a speech recognition source.
    pub fn with_speech_source(mut self, source: Arc<dyn SpeechSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the application launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn AppLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replace the tool registry.
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Attach a runtime event broadcaster for frontends.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        self.runtime_tx = Some(tx);
        self
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled, a [`UserIntent::Shutdown`] arrives or the intent
    /// channel closes.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; failures inside the loop are reported
    /// to the user and logged instead.
    pub async fn run(self, mut intents: mpsc::Receiver<UserIntent>) -> Result<()> {
        let cancel = self.cancel.clone();
        let worker_cancel = cancel.child_token();

        let (speech_tx, mut speech_rx) = mpsc::channel(32);
        let (speech, speech_handle) =
            SpeechWorker::spawn(Arc::clone(&self.sink), speech_tx, worker_cancel.clone());

        let (capture_tx, mut capture_rx) = mpsc::channel(64);
        let restart_delay = Duration::from_millis(self.config.capture.effective_restart_delay_ms());
        let capture = self
            .source
            .as_ref()
            .map(|source| CaptureAdapter::new(Arc::clone(source), restart_delay, capture_tx));

        let (outcome_tx, mut outcome_rx) = mpsc::channel(4);
        let poll_period = Duration::from_millis(self.config.scheduler.poll_interval_ms.max(1));

        let mut core = Core::new(self, speech, capture, outcome_tx);
        core.connect_stored_key();

        let mut poll = tokio::time::interval(poll_period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("assistant running");
        loop {
            let deadline = core.segmenter.deadline();
            tokio::select! {
                () = cancel.cancelled() => break,
                intent = intents.recv() => match intent {
                    Some(UserIntent::Shutdown) | None => break,
                    Some(intent) => core.on_intent(intent),
                },
                Some(update) = capture_rx.recv() => core.on_capture(update),
                Some(event) = speech_rx.recv() => core.on_speech(event),
                Some(done) = outcome_rx.recv() => core.on_completed(done),
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => core.on_boundary(),
                _ = poll.tick() => core.on_poll(),
            }
        }

        core.shutdown();
        worker_cancel.cancel();
        let _ = speech_handle.await;
        info!("assistant stopped");
        Ok(())
    }
}

/// Loop-owned state.
struct Core {
    assistant: AssistantConfig,
    machine: StatusMachine,
    gate: WakeGate,
    segmenter: UtteranceSegmenter,
    store: ScheduledItemStore,
    log: MessageLog,
    clock: Arc<dyn Clock>,
    launcher: Arc<dyn AppLauncher>,
    registry: Arc<ToolRegistry>,
    sessions: Arc<dyn SessionFactory>,
    dispatcher: Option<Dispatcher>,
    /// Bumped on every session change; stale outcomes carry an older value.
    session: u64,
    preferences: PreferenceStore,
    speech: SpeechWorker,
    capture: Option<CaptureAdapter>,
    capture_active: bool,
    outcomes: mpsc::Sender<Completed>,
    runtime_tx: Option<broadcast::Sender<RuntimeEvent>>,
}

impl Core {
    fn new(
        owner: AssistantCoordinator,
        speech: SpeechWorker,
        capture: Option<CaptureAdapter>,
        outcomes: mpsc::Sender<Completed>,
    ) -> Self {
        let assistant = owner.config.assistant;
        Self {
            machine: StatusMachine::new(),
            gate: WakeGate::new(&assistant.wake_phrase),
            segmenter: UtteranceSegmenter::new(Duration::from_millis(assistant.quiet_period_ms)),
            store: ScheduledItemStore::new(),
            log: MessageLog::new(),
            clock: owner.clock,
            launcher: owner.launcher,
            registry: owner.registry,
            sessions: owner.sessions,
            dispatcher: None,
            session: 0,
            preferences: owner.preferences,
            speech,
            capture,
            capture_active: false,
            outcomes,
            runtime_tx: owner.runtime_tx,
            assistant,
        }
    }

    fn publish(&self, event: RuntimeEvent) {
        if let Some(tx) = &self.runtime_tx {
            let _ = tx.send(event);
        }
    }

    // ── Session ────────────────────────────────────────────────

    fn connect_stored_key(&mut self) {
        self.publish(RuntimeEvent::StatusChanged(self.machine.status()));
        match self.preferences.get().api_key().map(str::to_owned) {
            Some(key) => self.connect(&key),
            None => self.publish(RuntimeEvent::CredentialRequired {
                reason: NO_KEY_REASON.to_string(),
            }),
        }
    }

    fn connect(&mut self, api_key: &str) {
        self.session += 1;
        match self.sessions.connect(api_key) {
            Ok(backends) => {
                let ctx = ToolContext {
                    clock: Arc::clone(&self.clock),
                    launcher: Arc::clone(&self.launcher),
                    search: backends.search,
                };
                self.dispatcher = Some(Dispatcher::new(
                    backends.chat,
                    Arc::clone(&self.registry),
                    ctx,
                ));
                info!(session = self.session, "remote session ready");
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "cannot create remote session");
                self.dispatcher = None;
                self.publish(RuntimeEvent::CredentialRequired {
                    reason: e.message().to_string(),
                });
            }
        }
    }

    // ── Status ─────────────────────────────────────────────────

    fn apply(&mut self, event: StatusEvent) {
        let transition = self.machine.submit(event);
        self.handle_transition(transition);
    }

    fn handle_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Moved { from, to } => {
                if from != to {
                    debug!(%from, %to, "status changed");
                    self.publish(RuntimeEvent::StatusChanged(to));
                    if to == AssistantStatus::Listening {
                        self.open_reply_window();
                    }
                }
            }
            Transition::Dispatch { command, from } => {
                debug!(%from, "status changed to thinking");
                self.publish(RuntimeEvent::StatusChanged(AssistantStatus::Thinking));
                self.start_dispatch(command);
            }
            Transition::Queued { replaced } => {
                debug!(replaced = replaced.is_some(), "command queued while speaking");
            }
            Transition::Rejected(reason) => {
                debug!(?reason, status = %self.machine.status(), "event rejected");
            }
        }
    }

    fn open_reply_window(&mut self) {
        if self.assistant.prompt_timeout_ms > 0 && self.machine.awaiting_command() {
            self.segmenter.expect_reply(
                Instant::now(),
                Duration::from_millis(self.assistant.prompt_timeout_ms),
            );
        }
    }

    // ── Commands ───────────────────────────────────────────────

    fn submit_command(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.dispatcher.is_none() {
            warn!("command dropped: no remote session");
            if self.machine.awaiting_command() {
                self.apply(StatusEvent::PromptAbandoned);
            }
            self.publish(RuntimeEvent::CredentialRequired {
                reason: NO_KEY_REASON.to_string(),
            });
            return;
        }
        self.apply(StatusEvent::Command(text.to_string()));
    }

    fn start_dispatch(&mut self, command: String) {
        let message = self.log.append(command.clone(), Sender::User, self.clock.now());
        self.publish(RuntimeEvent::Message(message));

        let Some(dispatcher) = self.dispatcher.clone() else {
            // The session went away while the command was queued.
            self.publish(RuntimeEvent::CredentialRequired {
                reason: NO_KEY_REASON.to_string(),
            });
            self.finish_dispatch(DispatchOutcome {
                reply: TRANSPORT_FAILURE_MESSAGE.to_string(),
                effect: None,
                kind: DispatchKind::Failed,
            });
            return;
        };

        // The request runs in its own task so a panic inside a tool still
        // yields exactly one outcome.
        let session = self.session;
        let outcomes = self.outcomes.clone();
        let request = tokio::spawn(async move { dispatcher.dispatch(&command).await });
        tokio::spawn(async move {
            let outcome = match request.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "dispatch task failed");
                    DispatchOutcome {
                        reply: TRANSPORT_FAILURE_MESSAGE.to_string(),
                        effect: None,
                        kind: DispatchKind::Failed,
                    }
                }
            };
            if outcomes.send(Completed { session, outcome }).await.is_err() {
                debug!("dispatch finished after shutdown");
            }
        });
    }

    fn on_completed(&mut self, done: Completed) {
        let mut outcome = done.outcome;
        if outcome.kind == DispatchKind::CredentialRejected && done.session != self.session {
            // The key was replaced while the request was in flight.
            debug!(
                session = done.session,
                current = self.session,
                "rejection of a replaced key ignored"
            );
            outcome.kind = DispatchKind::Failed;
        }
        self.finish_dispatch(outcome);
    }

    fn finish_dispatch(&mut self, outcome: DispatchOutcome) {
        match outcome.effect {
            Some(SideEffect::InsertTimer(draft)) => {
                let timer = self.store.insert_timer(draft);
                info!(id = timer.id, secs = timer.initial_duration_secs, "timer set");
            }
            Some(SideEffect::InsertEvent(draft)) => {
                let event = self.store.insert_event(draft);
                info!(id = event.id, kind = ?event.kind, at = %event.trigger_time, "event set");
            }
            None => {}
        }

        if outcome.kind == DispatchKind::CredentialRejected {
            self.session += 1;
            self.dispatcher = None;
            if let Err(e) = self.preferences.clear_api_key() {
                warn!(error = %e, "cannot clear rejected API key");
            }
            self.publish(RuntimeEvent::CredentialRequired {
                reason: KEY_REJECTED_REASON.to_string(),
            });
        }

        let message = self
            .log
            .append(outcome.reply.clone(), Sender::Assistant, self.clock.now());
        self.publish(RuntimeEvent::Message(message));

        let transition = self.machine.submit(StatusEvent::ReplyReady);
        if matches!(transition, Transition::Rejected(_)) {
            warn!(status = %self.machine.status(), "reply arrived outside thinking");
            return;
        }
        self.handle_transition(transition);
        self.speak(&clean_for_speech(&outcome.reply));
    }

    // ── Speech output ──────────────────────────────────────────

    /// Hand text to the speech worker. The status machine must already
    /// count this utterance as outstanding.
    fn speak(&mut self, text: &str) {
        let voice = self.preferences.get().voice().map(str::to_owned);
        if let Err(e) = self.speech.speak(text, voice) {
            warn!(error = %e, "speech output unavailable");
            self.apply(StatusEvent::SpeechEnded);
        }
    }

    fn on_speech(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Started(id) => debug!(id = id.0, "speech started"),
            SpeechEvent::Ended(id) => {
                debug!(id = id.0, "speech ended");
                self.apply(StatusEvent::SpeechEnded);
            }
            SpeechEvent::Failed { id, error } => {
                debug!(id = id.0, error = %error, "speech failed, treating as ended");
                self.apply(StatusEvent::SpeechEnded);
            }
        }
    }

    // ── Capture and segmentation ───────────────────────────────

    fn set_capture_active(&mut self, active: bool) {
        if self.capture_active != active {
            self.capture_active = active;
            self.publish(RuntimeEvent::CaptureActive(active));
        }
    }

    fn on_capture(&mut self, update: CaptureUpdate) {
        match update {
            CaptureUpdate::Started => self.set_capture_active(true),
            CaptureUpdate::Fragment {
                final_text,
                interim_text,
            } => {
                let preview = self
                    .segmenter
                    .push(&final_text, &interim_text, Instant::now())
                    .to_string();
                self.publish(RuntimeEvent::Transcript(preview));
            }
            CaptureUpdate::Transient(kind) => self.notice(NoticeLevel::Transient, kind),
            CaptureUpdate::Fatal(kind) => self.notice(NoticeLevel::Fatal, kind),
            CaptureUpdate::Stopped => self.set_capture_active(false),
        }
    }

    fn notice(&self, level: NoticeLevel, kind: CaptureErrorKind) {
        let message = kind.user_message();
        self.publish(RuntimeEvent::CaptureNotice {
            level,
            kind,
            message,
        });
    }

    fn on_boundary(&mut self) {
        let Some(utterance) = self.segmenter.fire(Instant::now()) else {
            return;
        };
        self.publish(RuntimeEvent::Transcript(String::new()));

        match self
            .gate
            .classify(&utterance, self.machine.awaiting_command())
        {
            GateDecision::Command {
                text,
                consumes_latch,
            } => {
                if consumes_latch && self.dispatcher.is_some() {
                    self.apply(StatusEvent::LatchConsumed);
                }
                self.submit_command(&text);
            }
            GateDecision::Prompt => {
                let transition = self.machine.submit(StatusEvent::WakePrompt);
                if matches!(transition, Transition::Rejected(_)) {
                    debug!("wake phrase ignored while thinking");
                    return;
                }
                self.handle_transition(transition);
                let prompt = self.assistant.wake_prompt.clone();
                self.speak(&prompt);
            }
            GateDecision::AbandonPrompt => {
                debug!("no command after wake prompt");
                self.apply(StatusEvent::PromptAbandoned);
            }
            GateDecision::Discard => debug!("utterance not addressed to the assistant"),
        }
    }

    // ── Scheduled items ────────────────────────────────────────

    fn on_poll(&mut self) {
        for item in self.store.poll(self.clock.now()) {
            self.announce(item);
        }
    }

    fn announce(&mut self, item: ExpiredItem) {
        let text = item.announcement();
        info!(id = item.id(), "scheduled item fired");

        let message = self
            .log
            .append(text.clone(), Sender::Assistant, self.clock.now());
        self.publish(RuntimeEvent::Message(message));
        self.publish(RuntimeEvent::Alert { item_id: item.id() });

        self.apply(StatusEvent::Announcement);
        self.speak(&clean_for_speech(&text));
    }

    // ── Intents ────────────────────────────────────────────────

    fn on_intent(&mut self, intent: UserIntent) {
        match intent {
            UserIntent::SendText(text) => self.submit_command(&text),
            UserIntent::ActivateMicrophone => self.activate_microphone(),
            UserIntent::SetCredential(key) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    self.publish(RuntimeEvent::CredentialRequired {
                        reason: NO_KEY_REASON.to_string(),
                    });
                    return;
                }
                if let Err(e) = self.preferences.set_api_key(&key) {
                    warn!(error = %e, "cannot save API key");
                }
                self.connect(&key);
            }
            UserIntent::SetVoice(voice) => {
                if let Err(e) = self.preferences.set_voice(&voice) {
                    warn!(error = %e, "cannot save voice");
                }
                info!(voice = self.preferences.get().voice(), "voice selected");
            }
            UserIntent::Shutdown => {}
        }
    }

    fn activate_microphone(&mut self) {
        if self.capture.is_none() {
            self.notice(
                NoticeLevel::Fatal,
                CaptureErrorKind::Unavailable("no speech recognizer configured".into()),
            );
            return;
        }
        let accepts_input = self.machine.accepts_input();
        if let Some(capture) = self.capture.as_mut() {
            if capture.is_running() || !accepts_input {
                debug!(accepts_input, "microphone activation ignored");
                return;
            }
            capture.start();
        }
    }

    fn shutdown(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.stop();
        }
        self.segmenter.cancel();
        if !self.store.is_empty() {
            info!(pending = self.store.len(), "discarding pending scheduled items");
        }
    }
}
