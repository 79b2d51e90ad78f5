//! core::output
//!
//! Structured, render-agnostic command output.
//!
//! # Architecture
//!
//! Execute produces a [`CommandOutput`]; only the presenter turns it into
//! text. The body is a closed set of tagged shapes ([`OutputBody`]) so the
//! presenter can match exhaustively, and the JSON form is always
//! `{"type": <tag>, "data": <shape>, "metadata"?, "children"?}`.
//!
//! # Invariants
//!
//! - A `composite` output has no data of its own (`"data": null`); its content
//!   is the ordered `children` list.
//! - Only composite outputs carry children.
//! - Metadata is attached after execution and merged field by field.
//!
//! # Example
//!
//! ```
//! use shellx::core::output::{merge_outputs, CommandOutput, KeyValuePair};
//!
//! let out = merge_outputs(vec![
//!     CommandOutput::success("done"),
//!     CommandOutput::key_value(vec![KeyValuePair::new("Count", 3)]),
//! ]);
//! assert!(out.is_composite());
//! assert_eq!(out.children.len(), 2);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::value::Value;

/// Column alignment for table output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Table body: headers plus rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Vec<Alignment>>,
}

/// Bullet style for list output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    #[default]
    Bullet,
    Dash,
    Arrow,
    Check,
    Number,
}

/// One list entry, possibly with nested children.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListItem {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ListItem>,
}

impl ListItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_children(mut self, children: Vec<ListItem>) -> Self {
        self.children = children;
        self
    }
}

impl From<&str> for ListItem {
    fn from(content: &str) -> Self {
        ListItem::new(content)
    }
}

impl From<String> for ListItem {
    fn from(content: String) -> Self {
        ListItem::new(content)
    }
}

/// List body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListData {
    pub items: Vec<ListItem>,
    pub ordered: bool,
    pub style: ListStyle,
}

/// Kind of a tree node, used for icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
    #[default]
    Node,
}

/// A tree node; the tree body is its root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::File)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Directory)
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn push(&mut self, child: TreeNode) {
        self.children.push(child);
    }
}

/// Formatting hint for a key-value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Bytes,
    Date,
    Duration,
}

/// One key-value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            format: None,
        }
    }

    pub fn formatted(key: impl Into<String>, value: impl Into<Value>, format: ValueFormat) -> Self {
        Self {
            format: Some(format),
            ..Self::new(key, value)
        }
    }
}

/// Key-value body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueData {
    pub pairs: Vec<KeyValuePair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

/// Progress body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub current: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Diff body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffData {
    pub before: String,
    pub after: String,
}

/// Error body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Success body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessData {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Warning and info body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub message: String,
}

/// The typed body of an output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputBody {
    Text(String),
    Table(TableData),
    List(ListData),
    Tree(TreeNode),
    KeyValue(KeyValueData),
    Progress(ProgressData),
    Diff(DiffData),
    Error(ErrorData),
    Success(SuccessData),
    Warning(MessageData),
    Info(MessageData),
    Composite,
}

impl OutputBody {
    /// The wire tag of this body.
    pub fn tag(&self) -> &'static str {
        match self {
            OutputBody::Text(_) => "text",
            OutputBody::Table(_) => "table",
            OutputBody::List(_) => "list",
            OutputBody::Tree(_) => "tree",
            OutputBody::KeyValue(_) => "keyValue",
            OutputBody::Progress(_) => "progress",
            OutputBody::Diff(_) => "diff",
            OutputBody::Error(_) => "error",
            OutputBody::Success(_) => "success",
            OutputBody::Warning(_) => "warning",
            OutputBody::Info(_) => "info",
            OutputBody::Composite => "composite",
        }
    }
}

/// Metadata attached to an output after execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Run duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl OutputMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: OutputMetadata) -> OutputMetadata {
        OutputMetadata {
            title: other.title.or(self.title),
            description: other.description.or(self.description),
            timestamp: other.timestamp.or(self.timestamp),
            duration: other.duration.or(self.duration),
            source: other.source.or(self.source),
            tags: if other.tags.is_empty() {
                self.tags
            } else {
                other.tags
            },
        }
    }
}

/// A command's result.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub body: OutputBody,
    pub metadata: Option<OutputMetadata>,
    pub children: Vec<CommandOutput>,
}

impl Serialize for CommandOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.body.tag())?;
        match &self.body {
            OutputBody::Text(text) => map.serialize_entry("data", text)?,
            OutputBody::Table(data) => map.serialize_entry("data", data)?,
            OutputBody::List(data) => map.serialize_entry("data", data)?,
            OutputBody::Tree(root) => map.serialize_entry("data", root)?,
            OutputBody::KeyValue(data) => map.serialize_entry("data", data)?,
            OutputBody::Progress(data) => map.serialize_entry("data", data)?,
            OutputBody::Diff(data) => map.serialize_entry("data", data)?,
            OutputBody::Error(data) => map.serialize_entry("data", data)?,
            OutputBody::Success(data) => map.serialize_entry("data", data)?,
            OutputBody::Warning(data) | OutputBody::Info(data) => {
                map.serialize_entry("data", data)?
            }
            OutputBody::Composite => map.serialize_entry("data", &Value::Null)?,
        }
        if let Some(metadata) = &self.metadata {
            map.serialize_entry("metadata", metadata)?;
        }
        if !self.children.is_empty() {
            map.serialize_entry("children", &self.children)?;
        }
        map.end()
    }
}

impl CommandOutput {
    fn from_body(body: OutputBody) -> Self {
        Self {
            body,
            metadata: None,
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_body(OutputBody::Text(content.into()))
    }

    pub fn table(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self::from_body(OutputBody::Table(TableData {
            headers,
            rows,
            alignment: None,
        }))
    }

    pub fn aligned_table(
        headers: Vec<String>,
        rows: Vec<Vec<Value>>,
        alignment: Vec<Alignment>,
    ) -> Self {
        Self::from_body(OutputBody::Table(TableData {
            headers,
            rows,
            alignment: Some(alignment),
        }))
    }

    /// Bulleted, unordered list. Accepts bare strings or full items.
    pub fn list<T: Into<ListItem>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::list_with(items, false, ListStyle::Bullet)
    }

    pub fn list_with<T: Into<ListItem>>(
        items: impl IntoIterator<Item = T>,
        ordered: bool,
        style: ListStyle,
    ) -> Self {
        Self::from_body(OutputBody::List(ListData {
            items: items.into_iter().map(Into::into).collect(),
            ordered,
            style,
        }))
    }

    pub fn tree(root: TreeNode) -> Self {
        Self::from_body(OutputBody::Tree(root))
    }

    pub fn key_value(pairs: Vec<KeyValuePair>) -> Self {
        Self::from_body(OutputBody::KeyValue(KeyValueData {
            pairs,
            separator: None,
        }))
    }

    pub fn progress(current: f64, total: f64, message: Option<String>) -> Self {
        Self::from_body(OutputBody::Progress(ProgressData {
            current,
            total,
            message,
            unit: None,
        }))
    }

    pub fn diff(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self::from_body(OutputBody::Diff(DiffData {
            before: before.into(),
            after: after.into(),
        }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::error_with(ErrorData::new(message))
    }

    pub fn error_with(data: ErrorData) -> Self {
        Self::from_body(OutputBody::Error(data))
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::from_body(OutputBody::Success(SuccessData {
            message: message.into(),
            details: None,
        }))
    }

    pub fn success_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::from_body(OutputBody::Success(SuccessData {
            message: message.into(),
            details: Some(details.into()),
        }))
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::from_body(OutputBody::Warning(MessageData {
            message: message.into(),
        }))
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::from_body(OutputBody::Info(MessageData {
            message: message.into(),
        }))
    }

    pub fn composite(children: Vec<CommandOutput>) -> Self {
        Self {
            body: OutputBody::Composite,
            metadata: None,
            children,
        }
    }

    /// Attach metadata, merging with any already present.
    pub fn with_metadata(mut self, metadata: OutputMetadata) -> Self {
        self.metadata = Some(match self.metadata.take() {
            Some(existing) => existing.merge(metadata),
            None => metadata,
        });
        self
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_metadata(OutputMetadata::titled(title))
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.with_metadata(OutputMetadata {
            description: Some(description.into()),
            ..OutputMetadata::default()
        })
    }

    pub fn tag(&self) -> &'static str {
        self.body.tag()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, OutputBody::Text(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self.body, OutputBody::Table(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.body, OutputBody::List(_))
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.body, OutputBody::Tree(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, OutputBody::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.body, OutputBody::Success(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.body, OutputBody::Composite)
    }

    /// True for a text output with no content.
    pub fn is_empty_text(&self) -> bool {
        matches!(&self.body, OutputBody::Text(t) if t.is_empty())
    }

    /// The error message if this is an error output.
    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            OutputBody::Error(data) => Some(&data.message),
            _ => None,
        }
    }

    /// Search this output and its descendants for an error.
    pub fn contains_error(&self) -> bool {
        self.is_error() || self.children.iter().any(CommandOutput::contains_error)
    }
}

/// Combine outputs: none becomes empty text, one passes through, more become a composite.
pub fn merge_outputs(mut outputs: Vec<CommandOutput>) -> CommandOutput {
    match outputs.len() {
        0 => CommandOutput::text(""),
        1 => outputs.remove(0),
        _ => CommandOutput::composite(outputs),
    }
}

/// Conversion of ad hoc values into an output.
pub trait IntoOutput {
    fn into_output(self) -> CommandOutput;
}

impl IntoOutput for CommandOutput {
    fn into_output(self) -> CommandOutput {
        self
    }
}

impl IntoOutput for &str {
    fn into_output(self) -> CommandOutput {
        CommandOutput::text(self)
    }
}

impl IntoOutput for String {
    fn into_output(self) -> CommandOutput {
        CommandOutput::text(self)
    }
}

impl<T: IntoOutput> IntoOutput for Option<T> {
    fn into_output(self) -> CommandOutput {
        match self {
            Some(inner) => inner.into_output(),
            None => CommandOutput::text(""),
        }
    }
}

impl IntoOutput for Value {
    fn into_output(self) -> CommandOutput {
        match self {
            Value::Null => CommandOutput::text(""),
            Value::String(s) => CommandOutput::text(s),
            Value::Array(items) if items.is_empty() => CommandOutput::text("(empty)"),
            Value::Array(items) => match items.first() {
                Some(Value::Object(first)) => {
                    let headers: Vec<String> = first.keys().cloned().collect();
                    let rows = items
                        .iter()
                        .map(|item| {
                            headers
                                .iter()
                                .map(|h| {
                                    item.as_object()
                                        .and_then(|fields| fields.get(h))
                                        .cloned()
                                        .unwrap_or(Value::Null)
                                })
                                .collect()
                        })
                        .collect();
                    CommandOutput::table(headers, rows)
                }
                _ => CommandOutput::list(items.iter().map(|v| v.to_string())),
            },
            Value::Object(fields) => CommandOutput::key_value(
                fields
                    .into_iter()
                    .map(|(key, value)| KeyValuePair::new(key, value))
                    .collect(),
            ),
            other => CommandOutput::text(other.to_string()),
        }
    }
}

/// Coerce an arbitrary value into an output.
pub fn to_output(value: impl IntoOutput) -> CommandOutput {
    value.into_output()
}
