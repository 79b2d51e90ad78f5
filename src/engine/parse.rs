//! engine::parse
//!
//! Tokenizer and parameter binder.
//!
//! # Architecture
//!
//! Parsing is a pure function of the raw line and the command's declared
//! schema. The tokenizer splits on spaces and tabs, treating a quoted span
//! (single or double quotes) as part of one token; an unterminated quote is
//! closed at end of input. The binder then walks the tokens:
//!
//! ```text
//! --name            declared boolean      -> flags[name] = true
//! --name value      declared non-boolean  -> flags[name] = value (number flags coerced)
//! --name=value      declared non-boolean  -> flags[name] = value
//! -x                declared short        -> as its long form
//! -abc              otherwise             -> each declared boolean short set, others ignored
//! -5, value         positional
//! ```
//!
//! Positionals bind to parameters in declaration order; an `array` parameter
//! takes every remaining positional. Defaults fill whatever is left unset.
//!
//! # Invariants
//!
//! - A flag appears in [`ParsedInput::flags`] only if it is declared
//! - Unknown long flags never consume the following token
//! - Parsing never fails: bad numbers become `NaN`

use std::collections::BTreeMap;

use serde::Serialize;

use super::command::{CommandDefinition, FlagDefinition, FlagType, ParameterType};
use crate::core::value::{coerce_number, looks_numeric, Value};

/// The result of parsing one input line against a definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParsedInput {
    pub command: String,
    pub args: Vec<String>,
    pub flags: BTreeMap<String, Value>,
    pub parameters: BTreeMap<String, Value>,
    pub raw: String,
}

/// Split a line into tokens, honouring single and double quotes.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == ' ' || ch == '\t' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// The first token of a line, used to look up the definition.
pub fn command_name(input: &str) -> Option<String> {
    tokenize(input).into_iter().next()
}

fn flag_value(flag: &FlagDefinition, raw: &str) -> Value {
    match flag.kind {
        FlagType::Number => Value::Number(coerce_number(raw)),
        _ => Value::String(raw.to_string()),
    }
}

/// Parse a line against a command's declared flags and parameters.
pub fn parse(input: &str, def: &CommandDefinition) -> ParsedInput {
    let tokens = tokenize(input);
    let mut iter = tokens.into_iter();
    let command = iter.next().unwrap_or_default();
    let rest: Vec<String> = iter.collect();

    let mut flags = BTreeMap::new();
    let mut positional = Vec::new();

    let mut i = 0;
    while i < rest.len() {
        let token = &rest[i];

        if let Some(long) = token.strip_prefix("--").filter(|l| !l.is_empty()) {
            let (name, inline) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (long, None),
            };
            if let Some(flag) = def.find_flag(name) {
                if flag.is_boolean() {
                    flags.insert(flag.name.clone(), Value::Bool(true));
                } else if let Some(value) = inline {
                    flags.insert(flag.name.clone(), flag_value(flag, value));
                } else if let Some(value) = rest.get(i + 1) {
                    flags.insert(flag.name.clone(), flag_value(flag, value));
                    i += 1;
                }
            }
        } else if token.len() > 1 && token.starts_with('-') && !looks_numeric(token) {
            let cluster = &token[1..];
            match def.find_short_flag(cluster) {
                Some(flag) if flag.is_boolean() => {
                    flags.insert(flag.name.clone(), Value::Bool(true));
                }
                Some(flag) => {
                    if let Some(value) = rest.get(i + 1) {
                        flags.insert(flag.name.clone(), flag_value(flag, value));
                        i += 1;
                    }
                }
                None => {
                    for ch in cluster.chars() {
                        let mut buf = [0u8; 4];
                        let short = ch.encode_utf8(&mut buf);
                        if let Some(flag) = def.find_short_flag(short).filter(|f| f.is_boolean()) {
                            flags.insert(flag.name.clone(), Value::Bool(true));
                        }
                    }
                }
            }
        } else {
            positional.push(token.clone());
        }
        i += 1;
    }

    for flag in &def.flags {
        if let Some(default) = &flag.default {
            flags
                .entry(flag.name.clone())
                .or_insert_with(|| default.clone());
        }
    }

    let mut parameters = BTreeMap::new();
    for (index, param) in def.parameters.iter().enumerate() {
        if let Some(raw) = positional.get(index) {
            let mut value = match param.kind {
                ParameterType::Number => Value::Number(coerce_number(raw)),
                ParameterType::Boolean => Value::Bool(matches!(raw.as_str(), "true" | "1" | "yes")),
                ParameterType::Array => Value::from(positional[index..].to_vec()),
                ParameterType::String | ParameterType::Path | ParameterType::Choice => {
                    Value::String(raw.clone())
                }
            };
            if let Some(transform) = &param.transform {
                value = transform(value);
            }
            parameters.insert(param.name.clone(), value);
        } else if let Some(default) = &param.default {
            parameters.insert(param.name.clone(), default.clone());
        }
    }

    ParsedInput {
        command,
        args: positional,
        flags,
        parameters,
        raw: input.to_string(),
    }
}
