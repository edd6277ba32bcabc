//! Tool trait and registry.
//!
//! Each supported tool validates its own arguments, performs its work and
//! renders the confirmation text. The [`ToolRegistry`] maps the names the
//! remote model uses to handlers and exports their declarations for the
//! chat request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::launcher::AppLauncher;
use crate::llm::SearchBackend;
use crate::scheduler::{EventDraft, TimerDraft};

/// Arguments of a tool call.
pub type ToolArgs = Map<String, Value>;

/// Why a tool call could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// A required argument is absent or empty.
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),

    /// An argument is present but unusable.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The tool's work failed after validation.
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// State change the coordinator must apply after a tool ran.
///
/// Tools never touch the scheduled item store directly; inserts are handed
/// back so that the store keeps a single writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Add a countdown timer.
    InsertTimer(TimerDraft),
    /// Add an alarm or reminder.
    InsertEvent(EventDraft),
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Confirmation shown and spoken to the user (may contain markdown).
    pub confirmation: String,
    /// Store mutation to apply, if any.
    pub effect: Option<SideEffect>,
}

impl ToolOutput {
    /// Output with no side effect.
    pub fn reply(confirmation: impl Into<String>) -> Self {
        Self {
            confirmation: confirmation.into(),
            effect: None,
        }
    }

    /// Output with a side effect.
    pub fn with_effect(confirmation: impl Into<String>, effect: SideEffect) -> Self {
        Self {
            confirmation: confirmation.into(),
            effect: Some(effect),
        }
    }
}

/// Collaborators available to tools.
#[derive(Clone)]
pub struct ToolContext {
    /// Wall clock used for timers, alarms and the time query.
    pub clock: Arc<dyn Clock>,
    /// Opens application URIs.
    pub launcher: Arc<dyn AppLauncher>,
    /// Search-grounded endpoint.
    pub search: Arc<dyn SearchBackend>,
}

/// A tool the remote model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name as declared to the model, e.g. `setTimer`.
    fn name(&self) -> &str;

    /// Description sent with the declaration.
    fn description(&self) -> &str;

    /// Parameter schema in the API's (uppercase-typed) schema dialect.
    fn schema(&self) -> Value;

    /// Validate `args`, do the work and render the confirmation.
    async fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Registry of tools by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for tool in super::tools::builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Function declarations for the chat request, sorted by name.
    ///
    /// Each entry contains `name`, `description` and `parameters`.
    pub fn schemas_for_api(&self) -> Vec<Value> {
        let mut schemas: Vec<(String, Value)> = self
            .tools
            .values()
            .map(|t| {
                let entry = serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.schema(),
                });
                (t.name().to_string(), entry)
            })
            .collect();
        schemas.sort_by(|a, b| a.0.cmp(&b.0));
        schemas.into_iter().map(|(_, v)| v).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
