//! Command dispatcher.
//!
//! Sends one command to the chat endpoint and turns the reply into the text
//! the assistant says back, plus an optional store mutation for the
//! coordinator to apply. Every branch produces a reply; failures become a
//! fixed apology instead of an error.

pub mod registry;
pub mod tools;

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::llm::ChatBackend;

pub use registry::{SideEffect, Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolRegistry};

/// Reply for an unknown tool or arguments that fail validation.
pub const UNKNOWN_TOOL_MESSAGE: &str = "I'm not sure how to do that, Sir.";

/// Reply when the model returns neither text nor a tool call.
pub const EMPTY_REPLY_MESSAGE: &str = "Sorry, Sir, I couldn't process that.";

/// Reply when the chat endpoint cannot be reached or errors.
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "I seem to be having some trouble, Sir. Please try again later.";

/// How a dispatch ended, for logging and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// Free text from the model.
    Text,
    /// A tool ran (or was rejected as unknown/invalid).
    Tool,
    /// Nothing usable came back.
    Empty,
    /// The chat request failed.
    Failed,
    /// The chat request failed because the credential was rejected.
    CredentialRejected,
}

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Assistant reply, possibly containing markdown.
    pub reply: String,
    /// Store mutation to apply.
    pub effect: Option<SideEffect>,
    /// Which branch produced the reply.
    pub kind: DispatchKind,
}

impl DispatchOutcome {
    fn new(reply: impl Into<String>, kind: DispatchKind) -> Self {
        Self {
            reply: reply.into(),
            effect: None,
            kind,
        }
    }
}

/// Routes commands through the chat endpoint and the tool registry.
#[derive(Clone)]
pub struct Dispatcher {
    chat: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(chat: Arc<dyn ChatBackend>, registry: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self { chat, registry, ctx }
    }

    /// Dispatch one command. Never fails.
    pub async fn dispatch(&self, command: &str) -> DispatchOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("dispatch", %request_id);
        self.dispatch_inner(command).instrument(span).await
    }

    async fn dispatch_inner(&self, command: &str) -> DispatchOutcome {
        info!(chars = command.len(), "dispatching command");

        let reply = match self.chat.send_message(command).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(code = e.code(), error = %e, "chat request failed");
                let kind = if e.is_credential_error() {
                    DispatchKind::CredentialRejected
                } else {
                    DispatchKind::Failed
                };
                return DispatchOutcome::new(TRANSPORT_FAILURE_MESSAGE, kind);
            }
        };

        if let Some(call) = reply.tool_call {
            let output = self.run_tool(&call.name, &call.args).await;
            self.chat.record_tool_result(&call, &output.confirmation);
            return DispatchOutcome {
                reply: output.confirmation,
                effect: output.effect,
                kind: DispatchKind::Tool,
            };
        }

        match reply.text {
            Some(text) if !text.trim().is_empty() => DispatchOutcome::new(text, DispatchKind::Text),
            _ => {
                warn!("chat reply had neither text nor a tool call");
                DispatchOutcome::new(EMPTY_REPLY_MESSAGE, DispatchKind::Empty)
            }
        }
    }

    async fn run_tool(&self, name: &str, args: &ToolArgs) -> ToolOutput {
        let Some(tool) = self.registry.get(name) else {
            warn!(tool = name, "unknown tool requested");
            return ToolOutput::reply(UNKNOWN_TOOL_MESSAGE);
        };

        match tool.invoke(args, &self.ctx).await {
            Ok(output) => {
                info!(tool = name, effect = output.effect.is_some(), "tool completed");
                output
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool call rejected");
                ToolOutput::reply(UNKNOWN_TOOL_MESSAGE)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Local, TimeZone};
    use serde_json::json;

    use super::test_support::context_at;
    use super::*;
    use crate::llm::{ChatReply, LlmError, ToolCall};

    #[derive(Default)]
    struct ScriptedChat {
        replies: Mutex<VecDeque<Result<ChatReply, LlmError>>>,
        recorded: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedChat {
        fn with(replies: Vec<Result<ChatReply, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                recorded: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedChat {
        async fn send_message(&self, _text: &str) -> Result<ChatReply, LlmError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatReply::default()))
        }

        fn record_tool_result(&self, call: &ToolCall, result: &str) {
            self.recorded
                .lock()
                .unwrap()
                .push((call.name.clone(), result.to_string()));
        }
    }

    fn dispatcher(chat: Arc<ScriptedChat>) -> Dispatcher {
        let (ctx, _) = context_at(Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        Dispatcher::new(chat, Arc::new(ToolRegistry::with_builtin_tools()), ctx)
    }

    #[tokio::test]
    async fn text_reply_is_used_verbatim() {
        let chat = ScriptedChat::with(vec![Ok(ChatReply::text("**Hello**, Sir."))]);
        let out = dispatcher(chat).dispatch("hello").await;
        assert_eq!(out.reply, "**Hello**, Sir.");
        assert_eq!(out.kind, DispatchKind::Text);
        assert!(out.effect.is_none());
    }

    #[tokio::test]
    async fn empty_reply_falls_back() {
        let chat = ScriptedChat::with(vec![Ok(ChatReply::default())]);
        let out = dispatcher(chat).dispatch("hmm").await;
        assert_eq!(out.reply, EMPTY_REPLY_MESSAGE);
        assert_eq!(out.kind, DispatchKind::Empty);
    }

    #[tokio::test]
    async fn transport_failure_apologises() {
        let chat = ScriptedChat::with(vec![Err(LlmError::TimeoutError("slow".into()))]);
        let out = dispatcher(chat).dispatch("anything").await;
        assert_eq!(out.reply, TRANSPORT_FAILURE_MESSAGE);
        assert_eq!(out.kind, DispatchKind::Failed);
    }

    #[tokio::test]
    async fn rejected_key_is_flagged() {
        let chat = ScriptedChat::with(vec![Err(LlmError::AuthError("bad key".into()))]);
        let out = dispatcher(chat).dispatch("anything").await;
        assert_eq!(out.reply, TRANSPORT_FAILURE_MESSAGE);
        assert_eq!(out.kind, DispatchKind::CredentialRejected);
    }

    #[tokio::test]
    async fn tool_call_wins_over_text_and_is_recorded() {
        let chat = ScriptedChat::with(vec![Ok(ChatReply {
            text: Some("ignored".into()),
            tool_call: Some(ToolCall::new(
                "setTimer",
                json!({"durationInSeconds": 300}),
            )),
        })]);
        let out = dispatcher(chat.clone()).dispatch("five minute timer").await;
        assert_eq!(out.reply, "Okay Sir, I've set a timer for 300 seconds.");
        assert!(matches!(out.effect, Some(SideEffect::InsertTimer(_))));

        let recorded = chat.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "setTimer");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_sure() {
        let chat = ScriptedChat::with(vec![Ok(ChatReply::tool(ToolCall::new(
            "launchRocket",
            json!({}),
        )))]);
        let out = dispatcher(chat).dispatch("launch").await;
        assert_eq!(out.reply, UNKNOWN_TOOL_MESSAGE);
        assert!(out.effect.is_none());
    }

    #[tokio::test]
    async fn invalid_arguments_are_not_sure() {
        let chat = ScriptedChat::with(vec![Ok(ChatReply::tool(ToolCall::new(
            "setAlarm",
            json!({"label": "no time given"}),
        )))]);
        let out = dispatcher(chat).dispatch("alarm").await;
        assert_eq!(out.reply, UNKNOWN_TOOL_MESSAGE);
        assert!(out.effect.is_none());
    }
}
