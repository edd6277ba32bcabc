//! Events for the presentation layer and intents coming back from it.
//!
//! The coordinator publishes [`RuntimeEvent`]s on a broadcast channel; any
//! number of frontends may subscribe. Frontends send [`UserIntent`]s on an
//! mpsc channel.

use crate::pipeline::messages::Message;
use crate::speech::CaptureErrorKind;
use crate::status::AssistantStatus;

/// Severity of a capture notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Dismissable; capture continues.
    Transient,
    /// Capture has stopped.
    Fatal,
}

/// Events that describe what the assistant is doing "right now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// Status changed.
    StatusChanged(AssistantStatus),
    /// Live transcript preview (empty clears it).
    Transcript(String),
    /// A message was appended to the log.
    Message(Message),
    /// Speech capture problem worth showing.
    CaptureNotice {
        /// Severity.
        level: NoticeLevel,
        /// Classified error.
        kind: CaptureErrorKind,
        /// Text for the user.
        message: String,
    },
    /// A scheduled item fired; play the alert sound.
    Alert {
        /// Id of the expired item.
        item_id: u64,
    },
    /// No usable API key: prompt for one.
    CredentialRequired {
        /// Why the prompt is shown.
        reason: String,
    },
    /// Capture started or stopped.
    CaptureActive(bool),
}

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    /// Typed command; bypasses the wake gate.
    SendText(String),
    /// Start listening.
    ActivateMicrophone,
    /// Save a new API key and open a session with it.
    SetCredential(String),
    /// Save the selected voice (empty clears it).
    SetVoice(String),
    /// Stop everything.
    Shutdown,
}
