//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, first match wins:
//! 1. `$SHELLX_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/shellx/config.toml`
//! 3. `~/.shellx/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use shellx::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! let presentation = config.presentation();
//! println!("mode: {}", presentation.mode);
//! println!("timeout: {:?}", config.timeout());
//! ```

pub mod schema;

pub use schema::ShellConfig;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::ui::present::{PresentationConfig, PresentationMode};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (defaults when no file exists)
    pub file: ShellConfig,
    /// Path to the config file (if loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds invalid values. A missing file is not an error.
    pub fn load() -> Result<Config, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ShellConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Config {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file.
    fn locate() -> Option<PathBuf> {
        // 1. Check $SHELLX_CONFIG
        if let Ok(path) = std::env::var("SHELLX_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/shellx/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("shellx/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.shellx/config.toml
        let path = dirs::home_dir()?.join(".shellx/config.toml");
        path.exists().then_some(path)
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Build the session's presentation config.
    pub fn presentation(&self) -> PresentationConfig {
        let mut config = PresentationConfig::default();
        let Some(section) = &self.file.presentation else {
            return config;
        };

        if let Some(mode) = section.mode.as_deref().and_then(|m| m.parse().ok()) {
            config.mode = mode;
        }
        if let Some(colors) = section.colors {
            config.colors = colors;
        }
        if let Some(max_width) = section.max_width {
            config.max_width = max_width;
        }
        if let Some(rows) = section.max_table_rows {
            config.max_table_rows = rows;
        }
        if let Some(limit) = section.truncate_strings {
            config.truncate_strings = limit;
        }
        if let Some(show) = section.show_timestamps {
            config.show_timestamps = show;
        }
        if let Some(pretty) = section.json_pretty_print {
            config.json_pretty_print = pretty;
        }
        config
    }

    /// Get the configured initial mode.
    ///
    /// Defaults to `default` if not configured.
    pub fn mode(&self) -> PresentationMode {
        self.presentation().mode
    }

    /// Get the Execute-stage deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.file
            .execution
            .as_ref()
            .and_then(|e| e.timeout_ms)
            .map(Duration::from_millis)
    }

    /// Get the definitions file to load at startup, with `~` expanded.
    pub fn definitions_path(&self) -> Option<PathBuf> {
        let raw = self.file.commands.as_ref()?.definitions.as_deref()?;
        Some(expand_home(raw))
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}
