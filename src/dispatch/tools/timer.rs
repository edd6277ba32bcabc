//! `setTimer`: countdown timers.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{optional_str, required_positive_int};
use crate::dispatch::registry::{SideEffect, Tool, ToolArgs, ToolContext, ToolError, ToolOutput};
use crate::scheduler::TimerDraft;
use crate::scheduler::items::label_prefix;

/// Sets a timer for a number of seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetTimerTool;

#[async_trait]
impl Tool for SetTimerTool {
    fn name(&self) -> &str {
        "setTimer"
    }

    fn description(&self) -> &str {
        "Sets a timer for a specified duration."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "durationInSeconds": {
                    "type": "INTEGER",
                    "description": "The duration of the timer in seconds."
                },
                "label": {
                    "type": "STRING",
                    "description": "A label for the timer, e.g., \"pizza\"."
                }
            },
            "required": ["durationInSeconds"]
        })
    }

    async fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let duration_secs = required_positive_int(args, "durationInSeconds")?;
        let label = optional_str(args, "label").map(str::to_owned);

        let too_large = || ToolError::InvalidArgument {
            name: "durationInSeconds",
            reason: "duration too large".into(),
        };
        let delta = i64::try_from(duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(too_large)?;
        let end_time = ctx
            .clock
            .now()
            .checked_add_signed(delta)
            .ok_or_else(too_large)?;

        let confirmation = format!(
            "Okay Sir, I've set a {}timer for {duration_secs} seconds.",
            label_prefix(label.as_deref())
        );
        Ok(ToolOutput::with_effect(
            confirmation,
            SideEffect::InsertTimer(TimerDraft {
                label,
                duration_secs,
                end_time,
            }),
        ))
    }
}
