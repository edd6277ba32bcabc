//! Wake phrase gate.
//!
//! Decides what a completed utterance means: a command following the wake
//! phrase, the wake phrase on its own (prompt the user), the reply to an
//! earlier prompt, or background speech to discard. The awaiting-command
//! latch itself lives in [`StatusMachine`](crate::status::StatusMachine);
//! the gate only reads it.

/// What to do with a completed utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Dispatch this command text.
    Command {
        /// Trimmed command text.
        text: String,
        /// The utterance answered an earlier wake prompt, so the latch must be
        /// consumed before dispatching.
        consumes_latch: bool,
    },
    /// Wake phrase heard with nothing after it: arm the latch and prompt.
    Prompt,
    /// Silence while the latch is armed: disarm and go back to idle.
    AbandonPrompt,
    /// Not addressed to the assistant.
    Discard,
}

/// Text wake phrase matcher.
#[derive(Debug, Clone)]
pub struct WakeGate {
    wake_phrase: String,
}

impl WakeGate {
    /// Create a gate for `wake_phrase` (matched case-insensitively).
    pub fn new(wake_phrase: &str) -> Self {
        Self {
            wake_phrase: wake_phrase.trim().to_lowercase(),
        }
    }

    /// The normalized wake phrase.
    pub fn wake_phrase(&self) -> &str {
        &self.wake_phrase
    }

    /// Classify one utterance given the current latch state.
    ///
    /// While the latch is armed the whole utterance is the command, even when
    /// it contains the wake phrase again.
    pub fn classify(&self, utterance: &str, awaiting_command: bool) -> GateDecision {
        let utterance = utterance.trim();

        if utterance.is_empty() {
            return if awaiting_command {
                GateDecision::AbandonPrompt
            } else {
                GateDecision::Discard
            };
        }

        if awaiting_command {
            return GateDecision::Command {
                text: utterance.to_owned(),
                consumes_latch: true,
            };
        }

        match self.command_after_wake_phrase(utterance) {
            Some(command) if !command.is_empty() => GateDecision::Command {
                text: command,
                consumes_latch: false,
            },
            Some(_) => GateDecision::Prompt,
            None => GateDecision::Discard,
        }
    }

    /// Text following the last occurrence of the wake phrase, or `None` when
    /// the phrase does not occur.
    fn command_after_wake_phrase(&self, utterance: &str) -> Option<String> {
        if self.wake_phrase.is_empty() {
            return None;
        }
        let (lower, ends) = fold_case(utterance);
        let pos = lower.rfind(&self.wake_phrase)?;
        let match_end = pos + self.wake_phrase.len();
        let cut = ends
            .iter()
            .find(|(folded, _)| *folded >= match_end)
            .map_or(utterance.len(), |(_, original)| *original);
        let after = &utterance[cut..];
        let after = after.trim_start_matches([',', ':', '.', '!', '?', ' ']);
        Some(after.trim().to_owned())
    }
}

/// Lowercase `text`, pairing each source char's end offset in the folded
/// string with its end offset in `text`. Lowercasing can change a char's
/// byte length.
fn fold_case(text: &str) -> (String, Vec<(usize, usize)>) {
    let mut folded = String::with_capacity(text.len());
    let mut ends = Vec::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        folded.extend(c.to_lowercase());
        ends.push((folded.len(), i + c.len_utf8()));
    }
    (folded, ends)
}
