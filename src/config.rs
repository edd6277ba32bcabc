//! Configuration types for the assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "REGGIE_CONFIG";

/// Shortest allowed delay before a dropped capture stream is restarted.
pub const MIN_RESTART_DELAY_MS: u64 = 250;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReggieConfig {
    /// Wake phrase, prompt and segmentation settings.
    pub assistant: AssistantConfig,
    /// Speech capture settings.
    pub capture: CaptureConfig,
    /// Speech output settings.
    pub output: OutputConfig,
    /// Remote chat API settings.
    pub llm: LlmConfig,
    /// Scheduled item polling settings.
    pub scheduler: SchedulerConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Wake gate and utterance segmentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Wake phrase that arms command capture (case-insensitive).
    pub wake_phrase: String,
    /// Prompt spoken when the wake phrase is heard on its own.
    pub wake_prompt: String,
    /// Quiet period after the last final fragment before an utterance is
    /// considered complete.
    pub quiet_period_ms: u64,
    /// How long to wait for a command after the wake prompt has been spoken
    /// before treating the silence as "never mind".
    ///
    /// Set to 0 to keep waiting indefinitely.
    pub prompt_timeout_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "hey reggie".to_owned(),
            wake_prompt: "Yes, Sir?".to_owned(),
            quiet_period_ms: 1200,
            prompt_timeout_ms: 8000,
        }
    }
}

/// Speech capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// External recognizer command (program followed by arguments).
    ///
    /// The command must print `final: ...`, `interim: ...` or `error: ...`
    /// lines on stdout. Empty disables voice capture; text entry still works.
    pub command: Vec<String>,
    /// Recognition language passed to the recognizer as `REGGIE_LANG`.
    pub language: String,
    /// Delay before restarting a recognition stream that ended on its own.
    pub restart_delay_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            language: "en-US".to_owned(),
            restart_delay_ms: MIN_RESTART_DELAY_MS,
        }
    }
}

impl CaptureConfig {
    /// Restart delay, never shorter than [`MIN_RESTART_DELAY_MS`].
    pub fn effective_restart_delay_ms(&self) -> u64 {
        self.restart_delay_ms.max(MIN_RESTART_DELAY_MS)
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Text-to-speech program. `None` picks the platform default.
    pub command: Option<String>,
    /// Flag used to pass the selected voice to the program.
    pub voice_flag: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            command: None,
            voice_flag: "-v".to_owned(),
        }
    }
}

impl OutputConfig {
    /// The configured program, or the platform default speech program.
    pub fn effective_command(&self) -> String {
        match &self.command {
            Some(cmd) if !cmd.trim().is_empty() => cmd.clone(),
            _ => default_tts_command().to_owned(),
        }
    }
}

fn default_tts_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak-ng"
    }
}

/// Remote chat API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL.
    pub base_url: String,
    /// Model used for both chat and grounded search.
    pub model: String,
    /// Persona instruction sent with every chat request.
    pub system_instruction: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Most history entries (user and model turns) kept per chat session.
    /// Older exchanges are dropped whole.
    pub max_history_entries: usize,
}

/// Persona used when no custom instruction is configured.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Reggie, a witty and helpful AI assistant, inspired by Jarvis. Address the user as 'Sir'. Keep responses concise and helpful. You can manage timers, alarms, reminders, find music, open applications, search the web, and engage in general conversation on any topic.";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_owned(),
            model: "gemini-2.5-flash".to_owned(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_owned(),
            request_timeout_secs: 30,
            max_history_entries: 40,
        }
    }
}

/// Scheduled item polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Expiry poll period in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files. `None` logs to stderr.
    pub file_dir: Option<PathBuf>,
}

impl ReggieConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ReggieError::Config(e.to_string()))
    }

    /// Load from the default location, or defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_or_default() -> crate::error::Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReggieError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the config file path: `$REGGIE_CONFIG`, else
    /// `~/.config/reggie/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        config_dir().join("config.toml")
    }
}

/// Directory holding `config.toml` and `preferences.toml`.
pub fn config_dir() -> PathBuf {
    if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(config).join("reggie")
    } else if let Some(config) = dirs::config_dir() {
        config.join("reggie")
    } else {
        PathBuf::from("/tmp/reggie-config")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReggieConfig::default();
        assert_eq!(config.assistant.wake_phrase, "hey reggie");
        assert_eq!(config.assistant.wake_prompt, "Yes, Sir?");
        assert_eq!(config.assistant.quiet_period_ms, 1200);
        assert_eq!(config.scheduler.poll_interval_ms, 1000);
        assert!(config.capture.command.is_empty());
        assert!(config.llm.request_timeout_secs > 0);
        assert!(!config.llm.model.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ReggieConfig::default();
        config.assistant.wake_phrase = "hello jeeves".to_owned();
        config.capture.command = vec!["recognizer".to_owned(), "--stream".to_owned()];
        config.scheduler.poll_interval_ms = 250;

        config.save_to_file(&path).unwrap();
        let loaded = ReggieConfig::from_file(&path).unwrap();

        assert_eq!(loaded.assistant.wake_phrase, "hello jeeves");
        assert_eq!(loaded.capture.command, vec!["recognizer", "--stream"]);
        assert_eq!(loaded.scheduler.poll_interval_ms, 250);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ReggieConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = ReggieConfig::from_file(&path);
        assert!(matches!(result, Err(crate::error::ReggieError::Config(_))));
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: ReggieConfig = toml::from_str(
            r#"
[assistant]
quiet_period_ms = 900
"#,
        )
        .unwrap();
        assert_eq!(config.assistant.quiet_period_ms, 900);
        assert_eq!(config.assistant.wake_phrase, "hey reggie");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
    }

    #[test]
    fn restart_delay_is_clamped() {
        let config = CaptureConfig {
            restart_delay_ms: 10,
            ..CaptureConfig::default()
        };
        assert_eq!(config.effective_restart_delay_ms(), MIN_RESTART_DELAY_MS);

        let config = CaptureConfig {
            restart_delay_ms: 900,
            ..CaptureConfig::default()
        };
        assert_eq!(config.effective_restart_delay_ms(), 900);
    }

    #[test]
    fn output_command_falls_back_to_platform_default() {
        let config = OutputConfig {
            command: Some("   ".to_owned()),
            ..OutputConfig::default()
        };
        assert_eq!(config.effective_command(), default_tts_command());

        let config = OutputConfig {
            command: Some("piper-say".to_owned()),
            ..OutputConfig::default()
        };
        assert_eq!(config.effective_command(), "piper-say");
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = ReggieConfig::default_config_path();
        assert!(path.to_string_lossy().ends_with(".toml"));
    }
}
