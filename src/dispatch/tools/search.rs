//! `searchWeb`: search-grounded answers with their sources.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use super::required_str;
use crate::dispatch::registry::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput};
use crate::llm::SearchSummary;

/// Spoken when the search endpoint fails or returns nothing.
pub const SEARCH_FAILED_MESSAGE: &str =
    "My apologies, Sir. I encountered an issue while searching the web.";

/// Answers questions through the search-grounded endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchWebTool;

/// Summary followed by a markdown "Sources" list when there are sources.
pub fn render_search(result: &SearchSummary) -> String {
    let mut text = result.summary.trim().to_string();
    if !result.sources.is_empty() {
        let links: Vec<String> = result
            .sources
            .iter()
            .map(|s| format!("* [{}]({})", s.title, s.uri))
            .collect();
        text.push_str("\n\n**Sources:**\n");
        text.push_str(&links.join("\n"));
    }
    text
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "searchWeb"
    }

    fn description(&self) -> &str {
        "Searches the web to answer questions about current events, facts, or any topic requiring up-to-date information."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "query": {
                    "type": "STRING",
                    "description": "The search query to find information about."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let query = required_str(args, "query")?;

        match ctx.search.search(query).await {
            Ok(result) if !result.summary.trim().is_empty() => {
                Ok(ToolOutput::reply(render_search(&result)))
            }
            Ok(_) => {
                warn!(query, "search returned an empty summary");
                Ok(ToolOutput::reply(SEARCH_FAILED_MESSAGE))
            }
            Err(e) => {
                warn!(query, code = e.code(), error = %e, "web search failed");
                Ok(ToolOutput::reply(SEARCH_FAILED_MESSAGE))
            }
        }
    }
}
