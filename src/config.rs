//! Configuration management for rill.
//!
//! Loads configuration from ${RILL_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config template with comments, embedded at compile time.
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("default_config.toml");

pub mod paths {
    //! Path resolution for rill configuration and data directories.
    //!
    //! RILL_HOME resolution order:
    //! 1. RILL_HOME environment variable (if set)
    //! 2. ~/.config/rill (default)

    use std::path::PathBuf;

    /// Returns the rill home directory.
    ///
    /// Checks RILL_HOME env var first, falls back to ~/.config/rill
    pub fn rill_home() -> PathBuf {
        if let Ok(home) = std::env::var("RILL_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("rill"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        rill_home().join("config.toml")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        rill_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat backend
    pub base_url: String,

    /// Session cookie attached to every request ("name=value")
    pub session_cookie: Option<String>,

    /// Timeout for non-streaming requests in seconds (0 disables)
    pub request_timeout_secs: u32,
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the default config template to the default path.
    ///
    /// Returns false (and leaves the file alone) if it already exists.
    pub fn init() -> Result<bool> {
        Self::init_at(&paths::config_path())
    }

    /// Writes the default config template to a specific path.
    pub fn init_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::write_config(path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(true)
    }

    /// Saves only the base_url field to the config file.
    ///
    /// Creates the file from the default template if it doesn't exist.
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_base_url(base_url: &str) -> Result<()> {
        Self::save_base_url_to(&paths::config_path(), base_url)
    }

    /// Saves only the base_url field to a specific config file path.
    pub fn save_base_url_to(path: &Path, base_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        url::Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;

        // Read existing file or use default template
        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            DEFAULT_CONFIG_TEMPLATE.to_string()
        };

        // Parse as editable document (preserves comments and formatting)
        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["base_url"] = value(base_url);

        Self::write_config(path, &doc.to_string())
    }

    /// Returns the effective session cookie, treating empty strings as unset.
    pub fn effective_session_cookie(&self) -> Option<&str> {
        self.session_cookie
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }

    fn write_config(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            session_cookie: None,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}
