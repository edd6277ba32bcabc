//! Application launching through platform URI handlers.

use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ReggieError, Result};

/// Applications that can be opened, keyed by lowercase name.
const APP_URIS: &[(&str, &str)] = &[
    ("calculator", "calculator:"),
    ("spotify", "spotify:"),
    ("slack", "slack:"),
    ("discord", "discord:"),
    ("zoom", "zoommtg:"),
    ("visual studio code", "vscode:"),
    ("vscode", "vscode:"),
    ("word", "ms-word:"),
    ("excel", "ms-excel:"),
    ("powerpoint", "ms-powerpoint:"),
    ("notepad", "notepad:"),
];

/// Launch URI for `name`, matched case-insensitively after trimming.
pub fn lookup_app_uri(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    APP_URIS
        .iter()
        .find(|(app, _)| *app == name)
        .map(|(_, uri)| *uri)
}

/// Names that [`lookup_app_uri`] recognises.
pub fn known_apps() -> impl Iterator<Item = &'static str> {
    APP_URIS.iter().map(|(app, _)| *app)
}

/// Asks the operating system to open a URI.
#[async_trait]
pub trait AppLauncher: Send + Sync {
    /// Open `uri` with its registered handler.
    async fn open(&self, uri: &str) -> Result<()>;
}

/// Launcher using the platform opener (`open`, `xdg-open` or `cmd /C start`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn command(uri: &str) -> tokio::process::Command {
        if cfg!(target_os = "macos") {
            let mut cmd = tokio::process::Command::new("open");
            cmd.arg(uri);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = tokio::process::Command::new("cmd");
            cmd.args(["/C", "start", "", uri]);
            cmd
        } else {
            let mut cmd = tokio::process::Command::new("xdg-open");
            cmd.arg(uri);
            cmd
        }
    }
}

#[async_trait]
impl AppLauncher for SystemLauncher {
    async fn open(&self, uri: &str) -> Result<()> {
        debug!(uri, "opening application URI");
        let status = Self::command(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ReggieError::Launch(format!("cannot run opener for {uri}: {e}")))?;

        if status.success() {
            info!(uri, "application opened");
            Ok(())
        } else {
            Err(ReggieError::Launch(format!(
                "opener exited with {status} for {uri}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup_app_uri("Spotify"), Some("spotify:"));
        assert_eq!(lookup_app_uri("  VS Code  "), None);
        assert_eq!(lookup_app_uri("Visual Studio Code"), Some("vscode:"));
        assert_eq!(lookup_app_uri("ZOOM"), Some("zoommtg:"));
    }

    #[test]
    fn unknown_app_has_no_uri() {
        assert_eq!(lookup_app_uri("photoshop"), None);
        assert_eq!(lookup_app_uri(""), None);
    }

    #[test]
    fn table_keys_are_lowercase() {
        for app in known_apps() {
            assert_eq!(app, app.to_lowercase());
        }
        assert_eq!(known_apps().count(), 11);
    }
}
