//! `getCurrentTime`.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::dispatch::registry::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput};

/// Reports the local time as `HH:MM`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "getCurrentTime"
    }

    fn description(&self) -> &str {
        "Gets the current local time."
    }

    fn schema(&self) -> Value {
        json!({ "type": "OBJECT", "properties": {}, "required": [] })
    }

    async fn invoke(&self, _args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let now = ctx.clock.now();
        Ok(ToolOutput::reply(format!(
            "Sir, the current time is {}.",
            now.format("%H:%M")
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
    async fn formats_two_digit_hours_and_minutes() {
        let (ctx, _) = context_at(Local.with_ymd_and_hms(2025, 6, 1, 9, 5, 59).unwrap());
        let out = CurrentTimeTool.invoke(&args(json!({})), &ctx).await.unwrap();
        assert_eq!(out.confirmation, "Sir, the current time is 09:05.");
        assert!(out.effect.is_none());
    }
}
