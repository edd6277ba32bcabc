//! Remote conversational and search endpoints.
//!
//! The dispatcher talks to the model only through [`ChatBackend`] and
//! [`SearchBackend`], so tests can script replies without a network.
//! [`gemini::GeminiClient`] implements both against the hosted API.

pub mod error;
pub mod gemini;

pub use error::LlmError;
pub use gemini::{GeminiClient, GeminiConfig, GeminiSessionFactory};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A structured tool invocation returned instead of (or with) free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Declared tool name, e.g. `setTimer`.
    pub name: String,
    /// Arguments as sent by the model.
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    /// Build a call from a name and a JSON object of arguments.
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }
}

/// One reply from the conversational endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    /// Free text, if any.
    pub text: Option<String>,
    /// First tool call, if any. Further calls in the same reply are dropped.
    pub tool_call: Option<ToolCall>,
}

impl ChatReply {
    /// Reply carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_call: None,
        }
    }

    /// Reply carrying only a tool call.
    pub fn tool(call: ToolCall) -> Self {
        Self {
            text: None,
            tool_call: Some(call),
        }
    }
}

/// A grounding source returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    /// Page title.
    pub title: String,
    /// Page URI.
    pub uri: String,
}

/// Summary plus sources from the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    /// Model-written summary.
    pub summary: String,
    /// Grounding sources, in the order returned.
    pub sources: Vec<SearchSource>,
}

/// Multi-turn conversational endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one user message and wait for the reply.
    async fn send_message(&self, text: &str) -> Result<ChatReply, LlmError>;

    /// Record what a tool call produced so the next turn has context.
    fn record_tool_result(&self, call: &ToolCall, result: &str);
}

/// Search-grounded endpoint.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Answer `query` with a summary and its sources.
    async fn search(&self, query: &str) -> Result<SearchSummary, LlmError>;
}

/// Chat and search endpoints for one authenticated session.
#[derive(Clone)]
pub struct SessionBackends {
    /// Conversational endpoint (keeps the multi-turn history).
    pub chat: Arc<dyn ChatBackend>,
    /// Search-grounded endpoint.
    pub search: Arc<dyn SearchBackend>,
}

/// Opens a session for an API key.
pub trait SessionFactory: Send + Sync {
    /// Create a fresh session. Fails when the key is unusable.
    fn connect(&self, api_key: &str) -> Result<SessionBackends, LlmError>;
}
