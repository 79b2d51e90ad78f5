//! engine::validate
//!
//! Validation results and the default validator.
//!
//! The default validator walks the declared parameters in order and, for
//! each one, checks presence (if required), runs the parameter's own
//! validator, then checks declared choices. The first failure wins;
//! warnings from passing validators accumulate.

use serde::Serialize;

use super::command::ParameterDefinition;
use super::intent::CommandIntent;
use crate::core::value::Value;

/// Outcome of the Validate stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// The failure message, falling back to a generic one.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Validation failed")
    }
}

/// Default validation against declared parameters.
pub fn default_validate(intent: &CommandIntent, parameters: &[ParameterDefinition]) -> ValidationResult {
    let mut warnings = Vec::new();

    for param in parameters {
        let value = intent.option(&param.name);

        if param.required && value.map_or(true, |v| v.is_missing()) {
            return ValidationResult::fail(format!(
                "Required parameter '{}' is missing",
                param.name
            ));
        }

        if let Some(validate) = &param.validate {
            let result = validate(value.unwrap_or(&Value::Null));
            if !result.valid {
                return result;
            }
            warnings.extend(result.warnings);
        }

        if let Some(value) = value.filter(|_| !param.choices.is_empty()) {
            let text = value.to_string();
            if !param.choices.iter().any(|c| *c == text) {
                return ValidationResult::fail(format!(
                    "Invalid value '{}' for parameter '{}'. Valid options: {}",
                    text,
                    param.name,
                    param.choices.join(", ")
                ));
            }
        }
    }

    ValidationResult {
        valid: true,
        error: None,
        warnings,
    }
}
