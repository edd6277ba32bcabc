//! Speech input and output adapters.
//!
//! - [`capture`]: continuous recognition with restart-on-drop and error
//!   classification, over a pluggable [`SpeechSource`].
//! - [`output`]: ordered speech synthesis with start/end notifications,
//!   over a pluggable [`SpeechSink`].
//! - [`text`]: markdown cleanup before speaking.

pub mod capture;
pub mod output;
pub mod text;

pub use capture::{
    CaptureAdapter, CaptureErrorKind, CaptureUpdate, ProcessSource, SourceEvent, SpeechSource,
};
pub use output::{CommandSink, LogSink, SpeechEvent, SpeechSink, SpeechWorker, UtteranceId};
pub use text::clean_for_speech;
