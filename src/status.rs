//! Assistant status state machine.
//!
//! [`StatusMachine`] is the single owner of the assistant status, the
//! awaiting-command latch and the one-slot pending command. Every change goes
//! through [`StatusMachine::submit`], which returns a [`Transition`] telling
//! the caller which side effect (if any) to perform.
//!
//! ```text
//! idle/listening --Command--> thinking --ReplyReady--> speaking
//! speaking --SpeechEnded--> listening (latch armed) | idle
//! speaking + Command --> pending slot (last write wins), drained on exit
//! ```

use serde::{Deserialize, Serialize};

/// Assistant status. Exactly one value is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantStatus {
    /// Nothing happening.
    #[default]
    Idle,
    /// Expecting a command after the wake prompt.
    Listening,
    /// Waiting on the remote chat endpoint.
    Thinking,
    /// Speech output in progress.
    Speaking,
}

impl std::fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        };
        f.write_str(label)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A trimmed command (typed text, wake-gated utterance or drained queue).
    Command(String),
    /// The in-flight request resolved; its reply is about to be spoken.
    ReplyReady,
    /// The wake phrase was heard alone: arm the latch and speak the prompt.
    WakePrompt,
    /// The armed latch was consumed by an utterance.
    LatchConsumed,
    /// Silence after the wake prompt: disarm the latch.
    PromptAbandoned,
    /// An announcement (timer/alarm/reminder) is about to be spoken.
    Announcement,
    /// One utterance finished (normally or with an error).
    SpeechEnded,
}

/// Why an event was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty command text.
    EmptyCommand,
    /// A request is already in flight.
    Busy,
    /// The event does not apply to the current status.
    NotApplicable,
}

/// Result of submitting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Status changed (or stayed) without a command to dispatch.
    Moved {
        /// Status before the event.
        from: AssistantStatus,
        /// Status after the event.
        to: AssistantStatus,
    },
    /// A command was accepted: status is now `Thinking` and the caller must
    /// start exactly one remote request for it.
    Dispatch {
        /// Command text.
        command: String,
        /// Status the machine settled in before entering `Thinking`.
        from: AssistantStatus,
    },
    /// Command buffered while speaking.
    Queued {
        /// Previously buffered command that was overwritten.
        replaced: Option<String>,
    },
    /// Event ignored.
    Rejected(RejectReason),
}

/// Single-writer owner of status, latch and pending command.
#[derive(Debug, Default)]
pub struct StatusMachine {
    status: AssistantStatus,
    awaiting_command: bool,
    pending: Option<String>,
    /// Utterances handed to the sink that have not ended yet.
    outstanding_speech: usize,
}

impl StatusMachine {
    /// New machine in `Idle` with the latch disarmed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> AssistantStatus {
        self.status
    }

    /// Whether the awaiting-command latch is armed.
    pub fn awaiting_command(&self) -> bool {
        self.awaiting_command
    }

    /// The buffered command, if any.
    pub fn pending_command(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Whether new input can be accepted for dispatch right now.
    pub fn accepts_input(&self) -> bool {
        matches!(
            self.status,
            AssistantStatus::Idle | AssistantStatus::Listening
        )
    }

    /// Apply one event.
    pub fn submit(&mut self, event: StatusEvent) -> Transition {
        let from = self.status;
        match event {
            StatusEvent::Command(text) => self.on_command(text),
            StatusEvent::ReplyReady => {
                if from != AssistantStatus::Thinking {
                    return Transition::Rejected(RejectReason::NotApplicable);
                }
                self.begin_speech();
                Transition::Moved {
                    from,
                    to: self.status,
                }
            }
            StatusEvent::WakePrompt => {
                if from == AssistantStatus::Thinking {
                    return Transition::Rejected(RejectReason::Busy);
                }
                self.awaiting_command = true;
                self.begin_speech();
                Transition::Moved {
                    from,
                    to: self.status,
                }
            }
            StatusEvent::LatchConsumed => {
                if !self.awaiting_command {
                    return Transition::Rejected(RejectReason::NotApplicable);
                }
                self.awaiting_command = false;
                Transition::Moved { from, to: from }
            }
            StatusEvent::PromptAbandoned => {
                if !self.awaiting_command {
                    return Transition::Rejected(RejectReason::NotApplicable);
                }
                self.awaiting_command = false;
                if from == AssistantStatus::Listening {
                    self.status = AssistantStatus::Idle;
                }
                Transition::Moved {
                    from,
                    to: self.status,
                }
            }
            StatusEvent::Announcement => {
                if from == AssistantStatus::Thinking {
                    // Tracked so its end does not disturb the request.
                    self.outstanding_speech += 1;
                } else {
                    self.begin_speech();
                }
                Transition::Moved {
                    from,
                    to: self.status,
                }
            }
            StatusEvent::SpeechEnded => self.on_speech_ended(),
        }
    }

    fn on_command(&mut self, text: String) -> Transition {
        let command = text.trim();
        if command.is_empty() {
            return Transition::Rejected(RejectReason::EmptyCommand);
        }
        match self.status {
            AssistantStatus::Thinking => Transition::Rejected(RejectReason::Busy),
            AssistantStatus::Speaking => {
                let replaced = self.pending.replace(command.to_owned());
                Transition::Queued { replaced }
            }
            AssistantStatus::Idle | AssistantStatus::Listening => {
                let from = self.status;
                self.status = AssistantStatus::Thinking;
                Transition::Dispatch {
                    command: command.to_owned(),
                    from,
                }
            }
        }
    }

    fn begin_speech(&mut self) {
        self.outstanding_speech += 1;
        self.status = AssistantStatus::Speaking;
    }

    fn on_speech_ended(&mut self) -> Transition {
        let from = self.status;
        if self.outstanding_speech == 0 {
            return Transition::Rejected(RejectReason::NotApplicable);
        }
        self.outstanding_speech -= 1;

        if from != AssistantStatus::Speaking || self.outstanding_speech > 0 {
            return Transition::Moved { from, to: from };
        }

        self.status = if self.awaiting_command {
            AssistantStatus::Listening
        } else {
            AssistantStatus::Idle
        };

        // Drain the queued command exactly once, clearing the slot first.
        match self.pending.take() {
            Some(command) => {
                let settled = self.status;
                self.status = AssistantStatus::Thinking;
                Transition::Dispatch {
                    command,
                    from: settled,
                }
            }
            None => Transition::Moved {
                from,
                to: self.status,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn speaking_machine() -> StatusMachine {
        let mut machine = StatusMachine::new();
        machine.submit(StatusEvent::Command("what time is it".into()));
        machine.submit(StatusEvent::ReplyReady);
        assert_eq!(machine.status(), AssistantStatus::Speaking);
        machine
    }

    #[test]
    fn command_from_idle_dispatches_and_enters_thinking() {
        let mut machine = StatusMachine::new();
        let t = machine.submit(StatusEvent::Command("  set a timer ".into()));
        assert_eq!(
            t,
            Transition::Dispatch {
                command: "set a timer".into(),
                from: AssistantStatus::Idle
            }
        );
        assert_eq!(machine.status(), AssistantStatus::Thinking);
    }

    #[test]
    fn empty_command_is_rejected() {
        let mut machine = StatusMachine::new();
        assert_eq!(
            machine.submit(StatusEvent::Command("   ".into())),
            Transition::Rejected(RejectReason::EmptyCommand)
        );
        assert_eq!(machine.status(), AssistantStatus::Idle);
    }

    #[test]
    fn second_command_while_thinking_is_rejected() {
        let mut machine = StatusMachine::new();
        machine.submit(StatusEvent::Command("one".into()));
        assert_eq!(
            machine.submit(StatusEvent::Command("two".into())),
            Transition::Rejected(RejectReason::Busy)
        );
        assert_eq!(machine.pending_command(), None);
    }

    #[test]
    fn reply_ready_only_applies_while_thinking() {
        let mut machine = StatusMachine::new();
        assert_eq!(
            machine.submit(StatusEvent::ReplyReady),
            Transition::Rejected(RejectReason::NotApplicable)
        );
    }

    #[test]
    fn speech_end_returns_to_idle_without_latch() {
        let mut machine = speaking_machine();
        let t = machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(
            t,
            Transition::Moved {
                from: AssistantStatus::Speaking,
                to: AssistantStatus::Idle
            }
        );
    }

    #[test]
    fn wake_prompt_then_speech_end_listens() {
        let mut machine = StatusMachine::new();
        machine.submit(StatusEvent::WakePrompt);
        assert!(machine.awaiting_command());
        assert_eq!(machine.status(), AssistantStatus::Speaking);

        machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(machine.status(), AssistantStatus::Listening);
    }

    #[test]
    fn prompt_abandoned_disarms_and_idles() {
        let mut machine = StatusMachine::new();
        machine.submit(StatusEvent::WakePrompt);
        machine.submit(StatusEvent::SpeechEnded);

        machine.submit(StatusEvent::PromptAbandoned);
        assert!(!machine.awaiting_command());
        assert_eq!(machine.status(), AssistantStatus::Idle);
    }

    #[test]
    fn commands_while_speaking_keep_only_the_latest() {
        let mut machine = speaking_machine();
        assert_eq!(
            machine.submit(StatusEvent::Command("first".into())),
            Transition::Queued { replaced: None }
        );
        assert_eq!(
            machine.submit(StatusEvent::Command("second".into())),
            Transition::Queued {
                replaced: Some("first".into())
            }
        );
        assert_eq!(machine.status(), AssistantStatus::Speaking);

        let t = machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(
            t,
            Transition::Dispatch {
                command: "second".into(),
                from: AssistantStatus::Idle
            }
        );
        assert_eq!(machine.pending_command(), None);
        assert_eq!(machine.status(), AssistantStatus::Thinking);

        // A stray end notification must not re-dispatch anything.
        assert_eq!(
            machine.submit(StatusEvent::SpeechEnded),
            Transition::Rejected(RejectReason::NotApplicable)
        );
    }

    #[test]
    fn overlapping_announcement_delays_leaving_speaking() {
        let mut machine = speaking_machine();
        machine.submit(StatusEvent::Announcement);

        machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(machine.status(), AssistantStatus::Speaking);

        machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(machine.status(), AssistantStatus::Idle);
    }

    #[test]
    fn announcement_during_thinking_leaves_status_alone() {
        let mut machine = StatusMachine::new();
        machine.submit(StatusEvent::Command("search".into()));
        machine.submit(StatusEvent::Announcement);
        assert_eq!(machine.status(), AssistantStatus::Thinking);

        machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(machine.status(), AssistantStatus::Thinking);

        machine.submit(StatusEvent::ReplyReady);
        machine.submit(StatusEvent::SpeechEnded);
        assert_eq!(machine.status(), AssistantStatus::Idle);
    }

    #[test]
    fn accepts_input_only_when_idle_or_listening() {
        let mut machine = StatusMachine::new();
        assert!(machine.accepts_input());
        machine.submit(StatusEvent::Command("x".into()));
        assert!(!machine.accepts_input());
    }
}
