//! Persisted user preferences: the API key and the selected voice.
//!
//! Stored as `preferences.toml` next to the config file. Loaded once at
//! startup and rewritten on every explicit change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReggieError, Result};

/// Preference values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Remote API key.
    pub api_key: Option<String>,
    /// Selected speech voice identifier.
    pub voice: Option<String>,
}

impl Preferences {
    /// The API key, if set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// The voice, if set and non-blank.
    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Preferences bound to the file they are saved in.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Default location: `preferences.toml` in the config directory.
    pub fn default_path() -> PathBuf {
        crate::config::config_dir().join("preferences.toml")
    }

    /// Load from `path`; a missing file yields empty preferences.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let prefs = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)
                .map_err(|e| ReggieError::Config(format!("parse {}: {e}", path.display())))?
        } else {
            Preferences::default()
        };
        Ok(Self { path, prefs })
    }

    /// Current values.
    pub fn get(&self) -> &Preferences {
        &self.prefs
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store and persist a new API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set_api_key(&mut self, key: &str) -> Result<()> {
        self.prefs.api_key = Some(key.trim().to_string());
        self.save()
    }

    /// Forget the API key (after it was rejected).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn clear_api_key(&mut self) -> Result<()> {
        self.prefs.api_key = None;
        self.save()
    }

    /// Store and persist the selected voice. Blank clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set_voice(&mut self, voice: &str) -> Result<()> {
        let voice = voice.trim();
        self.prefs.voice = if voice.is_empty() {
            None
        } else {
            Some(voice.to_string())
        };
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.prefs)
            .map_err(|e| ReggieError::Config(format!("serialize preferences: {e}")))?;

        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        // The file holds an API key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::load(dir.path().join("preferences.toml")).unwrap();
        assert_eq!(store.get(), &Preferences::default());
        assert!(store.get().api_key().is_none());
    }

    #[test]
    fn changes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reggie").join("preferences.toml");

        let mut store = PreferenceStore::load(&path).unwrap();
        store.set_api_key("  AIza-test  ").unwrap();
        store.set_voice("Daniel").unwrap();

        let reloaded = PreferenceStore::load(&path).unwrap();
        assert_eq!(reloaded.get().api_key(), Some("AIza-test"));
        assert_eq!(reloaded.get().voice(), Some("Daniel"));
    }

    #[test]
    fn clearing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");

        let mut store = PreferenceStore::load(&path).unwrap();
        store.set_api_key("key").unwrap();
        store.set_voice("Daniel").unwrap();
        store.clear_api_key().unwrap();
        store.set_voice("   ").unwrap();

        let reloaded = PreferenceStore::load(&path).unwrap();
        assert!(reloaded.get().api_key.is_none());
        assert!(reloaded.get().voice.is_none());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let prefs = Preferences {
            api_key: Some("   ".into()),
            voice: None,
        };
        assert!(prefs.api_key().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        let mut store = PreferenceStore::load(&path).unwrap();
        store.set_api_key("secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
