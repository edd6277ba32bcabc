//! Reggie: a voice-driven desktop assistant.
//!
//! Spoken or typed commands flow through a single coordinator:
//! speech capture → utterance segmentation → wake phrase gate → chat
//! endpoint with tool calling → reply → speech output.
//!
//! # Architecture
//!
//! - **Speech capture**: an external recognizer process streams final and
//!   interim text; the adapter restarts it after it ends
//! - **Segmentation**: a quiet period after the last fragment closes an
//!   utterance
//! - **Wake gate**: only utterances that contain the wake phrase (the text
//!   after its last occurrence) or answer a wake prompt become commands
//! - **Dispatch**: the Gemini chat endpoint answers in text or asks for one
//!   of the built-in tools (timers, alarms, reminders, apps, music, search)
//! - **Scheduler**: expired timers and events are announced aloud
//! - **Speech output**: a worker speaks one utterance at a time

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod llm;
pub mod pipeline;
pub mod preferences;
pub mod runtime;
pub mod scheduler;
pub mod speech;
pub mod status;
pub mod wakeword;

pub use config::ReggieConfig;
pub use error::{ReggieError, Result};
pub use pipeline::coordinator::AssistantCoordinator;
pub use runtime::{RuntimeEvent, UserIntent};
pub use status::AssistantStatus;
