//! `openApplication`.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use super::required_str;
use crate::dispatch::registry::{Tool, ToolArgs, ToolContext, ToolError, ToolOutput};
use crate::launcher::lookup_app_uri;

/// Opens one of a fixed set of applications via its URI scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenApplicationTool;

fn unable(name: &str) -> String {
    format!("My apologies, Sir. I am unable to open {name} at this time.")
}

#[async_trait]
impl Tool for OpenApplicationTool {
    fn name(&self) -> &str {
        "openApplication"
    }

    fn description(&self) -> &str {
        "Opens an application on the user's computer."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "applicationName": {
                    "type": "STRING",
                    "description": "The name of the application to open. e.g., \"Calculator\", \"Spotify\", \"VS Code\"."
                }
            },
            "required": ["applicationName"]
        })
    }

    async fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let name = required_str(args, "applicationName")?;

        let Some(uri) = lookup_app_uri(name) else {
            return Ok(ToolOutput::reply(unable(name)));
        };

        match ctx.launcher.open(uri).await {
            Ok(()) => Ok(ToolOutput::reply(format!(
                "Certainly, Sir. Opening {name}."
            ))),
            Err(e) => {
                warn!(app = name, uri, error = %e, "application launch failed");
                Ok(ToolOutput::reply(unable(name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::dispatch::test_support::{args, context_at};
    use chrono::{Local, TimeZone};

    fn now() -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn known_app_is_launched() {
        let (ctx, launcher) = context_at(now());
        let out = OpenApplicationTool
            .invoke(&args(json!({"applicationName": "Spotify"})), &ctx)
            .await
            .unwrap();
        assert_eq!(out.confirmation, "Certainly, Sir. Opening Spotify.");
        assert_eq!(launcher.opened(), vec!["spotify:".to_string()]);
    }

    #[tokio::test]
    async fn unknown_app_is_not_launched() {
        let (ctx, launcher) = context_at(now());
        let out = OpenApplicationTool
            .invoke(&args(json!({"applicationName": "Photoshop"})), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out.confirmation,
            "My apologies, Sir. I am unable to open Photoshop at this time."
        );
        assert!(launcher.opened().is_empty());
    }

    #[tokio::test]
    async fn launcher_failure_reports_unable() {
        let (ctx, launcher) = context_at(now());
        launcher.fail_next();
        let out = OpenApplicationTool
            .invoke(&args(json!({"applicationName": "zoom"})), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out.confirmation,
            "My apologies, Sir. I am unable to open zoom at this time."
        );
    }
}
