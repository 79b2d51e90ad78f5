//! engine::intent
//!
//! Command-agnostic description of what the user asked for.

use std::collections::BTreeMap;

use serde::Serialize;

use super::parse::ParsedInput;
use crate::core::value::Value;

/// What to do, to which targets, with which options.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CommandIntent {
    pub action: String,
    pub targets: Vec<String>,
    pub options: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl CommandIntent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Truthiness of an option; absent options are false.
    pub fn flag(&self, name: &str) -> bool {
        self.option(name).is_some_and(Value::is_truthy)
    }

    /// String form of an option, if present and non-null.
    pub fn string(&self, name: &str) -> Option<String> {
        self.option(name)
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
    }
}

/// Default resolution: the command is the action, positionals are the
/// targets and options merge flags with parameters (parameters win).
pub fn default_intent(input: &ParsedInput) -> CommandIntent {
    let mut options = input.flags.clone();
    options.extend(
        input
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    CommandIntent {
        action: input.command.clone(),
        targets: input.args.clone(),
        options,
        metadata: None,
    }
}
