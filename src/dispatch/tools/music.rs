//! `findMusic`: links to YouTube search results.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::required_str;
use crate::dispatch::registry::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput};

const YOUTUBE_SEARCH_URL: &str = "https://www.youtube.com/results?search_query=";

/// Produces a YouTube search link for a song, artist or album.
#[derive(Debug, Default, Clone, Copy)]
pub struct FindMusicTool;

#[async_trait]
impl Tool for FindMusicTool {
    fn name(&self) -> &str {
        "findMusic"
    }

    fn description(&self) -> &str {
        "Finds music on YouTube and provides a link to the search results."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "query": {
                    "type": "STRING",
                    "description": "The song title, artist, or album to search for. e.g., \"Bohemian Rhapsody by Queen\"."
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: &ToolArgs, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let query = required_str(args, "query")?;
        let url = format!("{YOUTUBE_SEARCH_URL}{}", urlencoding::encode(query));
        Ok(ToolOutput::reply(format!(
            "Of course, Sir. Here is what I found for \"{query}\":\n[Listen on YouTube]({url})"
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::dispatch::test_support::{args, context_at};
    use chrono::{Local, TimeZone};

    #[tokio::test]
    async fn embeds_encoded_search_link() {
        let (ctx, _) = context_at(Local.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let out = FindMusicTool
            .invoke(&args(json!({"query": "Bohemian Rhapsody & more"})), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out.confirmation,
            "Of course, Sir. Here is what I found for \"Bohemian Rhapsody & more\":\n\
             [Listen on YouTube](https://www.youtube.com/results?search_query=Bohemian%20Rhapsody%20%26%20more)"
        );
    }

    #[tokio::test]
    async fn empty_query_is_missing() {
        let (ctx, _) = context_at(Local.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let err = FindMusicTool
            .invoke(&args(json!({"query": ""})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("query"));
    }
}
