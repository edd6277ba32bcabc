//! Gemini `generateContent` client.
//!
//! One [`GeminiClient`] is one chat session: it keeps the multi-turn
//! history (user text, model function calls, function responses) and sends
//! it with every request together with the persona instruction and the
//! declared tools. The same client also answers search-grounded queries,
//! which are single-turn and never touch the history.
//!
//! # Request flow
//!
//! ```text
//! send_message(text) ─▶ POST {base}/v1beta/models/{model}:generateContent
//!                        { systemInstruction, contents[history + user], tools }
//!                      ◀─ candidates[0].content.parts: text* | functionCall
//! record_tool_result  ─▶ functionResponse part merged into the next user turn
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::LlmConfig;
use crate::llm::error::LlmError;
use crate::llm::{
    ChatBackend, ChatReply, SearchBackend, SearchSource, SearchSummary, SessionBackends,
    SessionFactory, ToolCall,
};

// ── Configuration ──────────────────────────────────────────────

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Gemini API key.
    pub api_key: String,
    /// Base URL for the API (defaults to `https://generativelanguage.googleapis.com`).
    pub base_url: String,
    /// Model identifier (e.g. `"gemini-2.5-flash"`).
    pub model: String,
    /// Persona instruction sent with chat requests.
    pub system_instruction: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Most committed history entries kept between requests.
    pub max_history_entries: usize,
}

impl GeminiConfig {
    /// Create a new Gemini config.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: model.into(),
            system_instruction: None,
            request_timeout: Duration::from_secs(30),
            max_history_entries: 40,
        }
    }

    /// Build from the `[llm]` config section and a stored key.
    pub fn from_llm_config(llm: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self::new(api_key, llm.model.clone())
            .with_base_url(llm.base_url.clone())
            .with_system_instruction(llm.system_instruction.clone())
            .with_request_timeout(Duration::from_secs(llm.request_timeout_secs.max(1)))
            .with_max_history_entries(llm.max_history_entries)
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the persona instruction.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set how many history entries survive between requests.
    pub fn with_max_history_entries(mut self, max: usize) -> Self {
        self.max_history_entries = max;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

// ── Request Building ───────────────────────────────────────────

/// Build a chat request body.
///
/// `declarations` are `{name, description, parameters}` objects as exported
/// by the tool registry.
pub fn build_chat_request(
    system_instruction: Option<&str>,
    contents: &[Value],
    declarations: &[Value],
) -> Value {
    let mut body = json!({ "contents": contents });

    if let Some(instruction) = system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }

    if !declarations.is_empty() {
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }

    body
}

/// Build a search-grounded request body for `query`.
pub fn build_search_request(query: &str) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": query }] }],
        "tools": [{ "googleSearch": {} }],
    })
}

fn function_response_part(call: &ToolCall, result: &str) -> Value {
    json!({
        "functionResponse": {
            "name": call.name,
            "response": { "result": result },
        }
    })
}

/// Drop the oldest entries until at most `max` remain.
///
/// The kept history always starts at a user turn carrying no function
/// response, so a function call is never separated from its response.
/// When no such turn fits, the history is emptied.
pub fn trim_history(history: &mut Vec<Value>, max: usize) {
    if history.len() <= max {
        return;
    }
    let first_allowed = history.len() - max;
    let start = history
        .iter()
        .enumerate()
        .skip(first_allowed)
        .find(|(_, turn)| is_plain_user_turn(turn))
        .map_or(history.len(), |(i, _)| i);
    history.drain(..start);
}

fn is_plain_user_turn(turn: &Value) -> bool {
    turn["role"] == "user"
        && turn["parts"]
            .as_array()
            .is_some_and(|parts| parts.iter().all(|p| p.get("functionResponse").is_none()))
}

// ── Response Parsing ───────────────────────────────────────────

/// Parse a `generateContent` response into a reply.
///
/// Returns the reply plus the model content to append to the history, if the
/// response carried one. Text parts are joined; only the first function call
/// is kept.
///
/// # Errors
///
/// Returns [`LlmError::ResponseError`] when the prompt was blocked.
pub fn parse_chat_response(body: &Value) -> Result<(ChatReply, Option<Value>), LlmError> {
    if let Some(reason) = body
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(LlmError::ResponseError(format!("prompt blocked: {reason}")));
    }

    let Some(content) = body.pointer("/candidates/0/content") else {
        return Ok((ChatReply::default(), None));
    };

    let parts = content
        .get("parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut text = String::new();
    let mut tool_call = None;
    for part in parts {
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        }
        if tool_call.is_none()
            && let Some(call) = part.get("functionCall")
        {
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
            if !name.is_empty() {
                let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                tool_call = Some(ToolCall::new(name, args));
            }
        }
    }

    let text = if text.trim().is_empty() {
        None
    } else {
        Some(text)
    };

    let mut history_entry = content.clone();
    if let Some(entry) = history_entry.as_object_mut() {
        entry.entry("role").or_insert_with(|| json!("model"));
    }

    Ok((ChatReply { text, tool_call }, Some(history_entry)))
}

/// Parse a search-grounded response.
///
/// Grounding chunks without a web URI are skipped; a missing title falls
/// back to the URI.
pub fn parse_search_response(body: &Value) -> SearchSummary {
    let summary = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    let sources = body
        .pointer("/candidates/0/groundingMetadata/groundingChunks")
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| {
                    let web = chunk.get("web")?;
                    let uri = web.get("uri").and_then(Value::as_str)?;
                    let title = web
                        .get("title")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .unwrap_or(uri);
                    Some(SearchSource {
                        title: title.to_string(),
                        uri: uri.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    SearchSummary { summary, sources }
}

// ── Error Mapping ──────────────────────────────────────────────

/// Map an HTTP error status to an [`LlmError`].
///
/// Gemini reports an invalid key as `400 INVALID_ARGUMENT`, so a 400 whose
/// message mentions the API key is treated as an authentication failure.
pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    let detail = extract_error_message(body);

    match status.as_u16() {
        401 | 403 => LlmError::AuthError(detail),
        400 if detail.to_ascii_lowercase().contains("api key") => LlmError::AuthError(detail),
        429 => LlmError::RequestError(format!("rate limit exceeded: {detail}")),
        400 => LlmError::RequestError(detail),
        s if s >= 500 => LlmError::ProviderError(detail),
        _ => LlmError::RequestError(format!("HTTP {status}: {detail}")),
    }
}

/// Extract a human-readable error message from a Gemini error response.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

// ── Client ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Session {
    history: Vec<Value>,
    /// Function responses waiting to be sent with the next user turn.
    pending_responses: Vec<Value>,
}

/// Gemini chat session and search client.
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
    declarations: Vec<Value>,
    session: Mutex<Session>,
}

impl GeminiClient {
    /// Create a client with the given tool declarations.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::AuthError`] when the key is empty or malformed and
    /// [`LlmError::ConfigError`] when the HTTP client cannot be built.
    pub fn new(config: GeminiConfig, declarations: Vec<Value>) -> Result<Self, LlmError> {
        let key = config.api_key.trim();
        if key.is_empty() {
            return Err(LlmError::AuthError("API key is empty".into()));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(LlmError::AuthError("API key contains whitespace".into()));
        }
        if config.model.trim().is_empty() {
            return Err(LlmError::ConfigError("model name is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            declarations,
            session: Mutex::new(Session::default()),
        })
    }

    /// Number of committed history entries.
    pub fn history_len(&self) -> usize {
        self.lock_session().history.len()
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn post(&self, body: &Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Gemini request failed");
                LlmError::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".into());
            tracing::error!(status = %status, body = %body, "Gemini request returned error");
            return Err(map_http_error(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::ResponseError(format!("invalid JSON response: {e}")))
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("tools", &self.declarations.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn send_message(&self, text: &str) -> Result<ChatReply, LlmError> {
        let (user_turn, contents) = {
            let session = self.lock_session();
            let mut parts = session.pending_responses.clone();
            parts.push(json!({ "text": text }));
            let user_turn = json!({ "role": "user", "parts": parts });
            let mut contents = session.history.clone();
            contents.push(user_turn.clone());
            (user_turn, contents)
        };

        let body = build_chat_request(
            self.config.system_instruction.as_deref(),
            &contents,
            &self.declarations,
        );

        tracing::debug!(model = %self.config.model, turns = contents.len(), "sending chat request");
        let response = self.post(&body).await?;
        let (reply, model_turn) = parse_chat_response(&response)?;

        // Commit only after a successful round trip.
        let mut session = self.lock_session();
        session.pending_responses.clear();
        session.history.push(user_turn);
        if let Some(turn) = model_turn {
            session.history.push(turn);
        }
        let before = session.history.len();
        trim_history(&mut session.history, self.config.max_history_entries);
        if session.history.len() < before {
            tracing::debug!(
                dropped = before - session.history.len(),
                "oldest chat history dropped"
            );
        }

        tracing::debug!(
            has_text = reply.text.is_some(),
            tool = reply.tool_call.as_ref().map(|c| c.name.as_str()),
            "chat reply received"
        );
        Ok(reply)
    }

    fn record_tool_result(&self, call: &ToolCall, result: &str) {
        self.lock_session()
            .pending_responses
            .push(function_response_part(call, result));
    }
}

#[async_trait]
impl SearchBackend for GeminiClient {
    async fn search(&self, query: &str) -> Result<SearchSummary, LlmError> {
        tracing::debug!(model = %self.config.model, "sending search request");
        let response = self.post(&build_search_request(query)).await?;
        let summary = parse_search_response(&response);
        tracing::debug!(sources = summary.sources.len(), "search reply received");
        Ok(summary)
    }
}

/// Opens a [`GeminiClient`] per API key using the `[llm]` settings.
pub struct GeminiSessionFactory {
    llm: LlmConfig,
    declarations: Vec<Value>,
}

impl GeminiSessionFactory {
    /// Factory declaring `declarations` (from the tool registry) on every session.
    pub fn new(llm: LlmConfig, declarations: Vec<Value>) -> Self {
        Self { llm, declarations }
    }
}

impl SessionFactory for GeminiSessionFactory {
    fn connect(&self, api_key: &str) -> Result<SessionBackends, LlmError> {
        let config = GeminiConfig::from_llm_config(&self.llm, api_key.trim());
        let client = Arc::new(GeminiClient::new(config, self.declarations.clone())?);
        tracing::info!(model = %self.llm.model, "chat session created");
        Ok(SessionBackends {
            chat: client.clone(),
            search: client,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    // ── Config ─────────────────────────────────────────────────

    #[test]
    fn config_defaults_and_builders() {
        let config = GeminiConfig::new("key", "gemini-2.5-flash")
            .with_base_url("http://localhost:9000/")
            .with_system_instruction("  ");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert!(config.system_instruction.is_none());
        assert_eq!(
            config.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn config_from_llm_section() {
        let llm = LlmConfig::default();
        let config = GeminiConfig::from_llm_config(&llm, "abc");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert!(config.system_instruction.unwrap().contains("Reggie"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_history_entries, 40);
    }

    // ── History ────────────────────────────────────────────────

    fn user(text: &str) -> Value {
        json!({"role": "user", "parts": [{"text": text}]})
    }

    fn model(text: &str) -> Value {
        json!({"role": "model", "parts": [{"text": text}]})
    }

    fn call(name: &str) -> Value {
        json!({"role": "model", "parts": [{"functionCall": {"name": name, "args": {}}}]})
    }

    fn answered(name: &str, text: &str) -> Value {
        let call = ToolCall::new(name, json!({}));
        json!({"role": "user", "parts": [function_response_part(&call, "done"), {"text": text}]})
    }

    #[test]
    fn short_history_is_kept() {
        let mut history = vec![user("a"), model("b")];
        trim_history(&mut history, 4);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn oldest_exchanges_are_dropped() {
        let mut history = vec![user("1"), model("1"), user("2"), model("2"), user("3"), model("3")];
        trim_history(&mut history, 4);
        assert_eq!(history, vec![user("2"), model("2"), user("3"), model("3")]);
    }

    #[test]
    fn function_call_is_not_split_from_its_response() {
        let mut history = vec![
            user("1"),
            call("getCurrentTime"),
            answered("getCurrentTime", "2"),
            model("2"),
            user("3"),
            model("3"),
        ];
        // Keeping four entries would start at the function response.
        trim_history(&mut history, 4);
        assert_eq!(history, vec![user("3"), model("3")]);
    }

    #[test]
    fn zero_limit_empties_history() {
        let mut history = vec![user("1"), model("1")];
        trim_history(&mut history, 0);
        assert!(history.is_empty());
    }

    #[test]
    fn empty_or_malformed_key_is_rejected() {
        let err = GeminiClient::new(GeminiConfig::new("", "m"), vec![]).unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
        let err = GeminiClient::new(GeminiConfig::new("ab cd", "m"), vec![]).unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
        assert!(GeminiClient::new(GeminiConfig::new("abcd", "m"), vec![]).is_ok());
    }

    // ── Request Building ───────────────────────────────────────

    #[test]
    fn chat_request_includes_instruction_and_tools() {
        let decl = json!({"name": "getCurrentTime", "description": "d", "parameters": {"type": "OBJECT", "properties": {}}});
        let contents = vec![json!({"role": "user", "parts": [{"text": "hi"}]})];
        let body = build_chat_request(Some("persona"), &contents, &[decl]);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "persona");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "getCurrentTime"
        );
    }

    #[test]
    fn chat_request_omits_empty_tools() {
        let body = build_chat_request(None, &[], &[]);
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn search_request_uses_google_search_tool() {
        let body = build_search_request("weather in Paris");
        assert!(body["tools"][0]["googleSearch"].is_object());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "weather in Paris");
    }

    // ── Response Parsing ───────────────────────────────────────

    #[test]
    fn parses_text_reply() {
        let body = json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Good "}, {"text": "evening, Sir."}]}}]});
        let (reply, turn) = parse_chat_response(&body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("Good evening, Sir."));
        assert!(reply.tool_call.is_none());
        assert_eq!(turn.unwrap()["role"], "model");
    }

    #[test]
    fn keeps_only_first_function_call() {
        let body = json!({"candidates": [{"content": {"parts": [
            {"functionCall": {"name": "setTimer", "args": {"durationInSeconds": 300}}},
            {"functionCall": {"name": "getCurrentTime", "args": {}}}
        ]}}]});
        let (reply, turn) = parse_chat_response(&body).unwrap();
        let call = reply.tool_call.unwrap();
        assert_eq!(call.name, "setTimer");
        assert_eq!(call.args["durationInSeconds"], 300);
        assert!(reply.text.is_none());
        assert_eq!(turn.unwrap()["role"], "model");
    }

    #[test]
    fn thought_parts_are_not_reply_text() {
        let body = json!({"candidates": [{"content": {"parts": [
            {"text": "planning...", "thought": true},
            {"text": "Done."}
        ]}}]});
        let (reply, _) = parse_chat_response(&body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("Done."));
    }

    #[test]
    fn missing_candidates_is_an_empty_reply() {
        let (reply, turn) = parse_chat_response(&json!({})).unwrap();
        assert_eq!(reply, ChatReply::default());
        assert!(turn.is_none());
    }

    #[test]
    fn blocked_prompt_is_a_response_error() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = parse_chat_response(&body).unwrap_err();
        assert_eq!(err.code(), "RESPONSE_INVALID");
    }

    #[test]
    fn parses_grounding_sources() {
        let body = json!({"candidates": [{
            "content": {"parts": [{"text": "It is sunny."}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://a.example", "title": "A"}},
                {"retrievedContext": {"uri": "ignored"}},
                {"web": {"uri": "https://b.example"}}
            ]}
        }]});
        let summary = parse_search_response(&body);
        assert_eq!(summary.summary, "It is sunny.");
        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.sources[0].title, "A");
        assert_eq!(summary.sources[1].title, "https://b.example");
    }

    // ── Error Mapping ──────────────────────────────────────────

    #[test]
    fn invalid_key_400_is_auth_error() {
        let err = map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(err.code(), "AUTH_FAILED");
    }

    #[test]
    fn other_400_is_request_error() {
        let err = map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"Invalid JSON payload"}}"#,
        );
        assert_eq!(err.code(), "REQUEST_FAILED");
        assert_eq!(err.message(), "Invalid JSON payload");
    }

    #[test]
    fn http_error_403_and_429_and_500() {
        assert_eq!(
            map_http_error(reqwest::StatusCode::FORBIDDEN, "").code(),
            "AUTH_FAILED"
        );
        assert_eq!(
            map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "").code(),
            "REQUEST_FAILED"
        );
        let err = map_http_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.code(), "PROVIDER_ERROR");
        assert_eq!(err.message(), "no response body");
    }

    #[test]
    fn factory_rejects_blank_key() {
        let factory = GeminiSessionFactory::new(LlmConfig::default(), vec![]);
        assert!(factory.connect("   ").is_err());
        assert!(factory.connect(" key ").is_ok());
    }

    #[test]
    fn tool_result_is_queued_for_next_turn() {
        let client = GeminiClient::new(GeminiConfig::new("k", "m"), vec![]).unwrap();
        let call = ToolCall::new("getCurrentTime", json!({}));
        client.record_tool_result(&call, "Sir, the current time is 09:15.");
        let session = client.lock_session();
        assert_eq!(session.pending_responses.len(), 1);
        assert_eq!(
            session.pending_responses[0]["functionResponse"]["name"],
            "getCurrentTime"
        );
        assert!(session.history.is_empty());
    }
}
