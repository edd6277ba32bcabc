//! Error types for the reggie assistant.

use crate::llm::error::LlmError;

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum ReggieError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Missing or rejected remote API credential.
    #[error("credential error: {0}")]
    Credential(String),

    /// Speech capture (recognition) error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech output (synthesis) error.
    #[error("speech output error: {0}")]
    Output(String),

    /// Remote chat / search API error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool validation or execution error.
    #[error("tool error: {0}")]
    Tool(String),

    /// Scheduled item error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Application launch error.
    #[error("launch error: {0}")]
    Launch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ReggieError>;
