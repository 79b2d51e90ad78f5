//! core::config::schema
//!
//! Configuration schema types.
//!
//! Located at (in order of precedence):
//! 1. `$SHELLX_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/shellx/config.toml`
//! 3. `~/.shellx/config.toml`
//!
//! # Validation
//!
//! Values are validated after parsing (mode names, positive limits).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::ui::present::PresentationMode;

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [presentation]
/// mode = "compact"
/// colors = false
/// max_table_rows = 20
///
/// [execution]
/// timeout_ms = 30000
///
/// [commands]
/// definitions = "~/.shellx/commands.json"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Presentation defaults
    pub presentation: Option<PresentationSection>,

    /// Execution limits
    pub execution: Option<ExecutionSection>,

    /// Extra command definitions
    pub commands: Option<CommandsSection>,
}

impl ShellConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(presentation) = &self.presentation {
            presentation.validate()?;
        }
        if let Some(execution) = &self.execution {
            execution.validate()?;
        }
        Ok(())
    }
}

/// `[presentation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PresentationSection {
    /// Initial mode: default, compact, detailed, json or minimal
    pub mode: Option<String>,

    /// ANSI colors
    pub colors: Option<bool>,

    pub max_width: Option<usize>,

    pub max_table_rows: Option<usize>,

    pub truncate_strings: Option<usize>,

    pub show_timestamps: Option<bool>,

    pub json_pretty_print: Option<bool>,
}

impl PresentationSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mode) = &self.mode {
            if mode.parse::<PresentationMode>().is_err() {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid mode '{}', must be one of: {}",
                    mode,
                    PresentationMode::names().join(", ")
                )));
            }
        }

        for (name, value) in [
            ("max_width", self.max_width),
            ("max_table_rows", self.max_table_rows),
            ("truncate_strings", self.truncate_strings),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSection {
    /// Deadline for the Execute stage, in milliseconds
    pub timeout_ms: Option<u64>,
}

impl ExecutionSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[commands]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsSection {
    /// JSON file of exported command definitions to load at startup
    pub definitions: Option<String>,
}
