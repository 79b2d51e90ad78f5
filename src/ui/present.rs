//! ui::present
//!
//! The presentation renderer: the only component that turns a
//! [`CommandOutput`] into user-visible text.
//!
//! # Architecture
//!
//! [`Presenter::render`] is a pure function of the output and the active
//! [`PresentationConfig`]; it returns the rendered block and never writes
//! anywhere itself. `json` mode serializes the whole output; every other
//! mode shares one recursive renderer keyed by the output's tag, with the
//! differences between modes confined to a few checks:
//!
//! | mode       | title spacer | details/suggestions | stack | duration |
//! |------------|--------------|---------------------|-------|----------|
//! | `default`  | yes          | yes                 | no    | no       |
//! | `compact`  | no           | yes                 | no    | no       |
//! | `detailed` | yes          | yes                 | yes   | yes      |
//! | `minimal`  | yes          | no                  | no    | no       |
//!
//! # Example
//!
//! ```
//! use shellx::core::output::CommandOutput;
//! use shellx::ui::present::{PresentationConfig, Presenter};
//!
//! let presenter = Presenter::new(PresentationConfig::plain());
//! assert_eq!(presenter.render(&CommandOutput::success("done")), "[OK] done");
//! ```

use std::fmt;
use std::str::FromStr;

use owo_colors::{OwoColorize, Style};
use serde::{Deserialize, Serialize};

use super::format::{
    column_widths, format_bytes, format_date, format_duration, pad_cell, progress_fill,
    progress_status, truncate, PROGRESS_WIDTH,
};
use crate::core::output::{
    Alignment, CommandOutput, DiffData, ErrorData, KeyValueData, KeyValuePair, ListData, ListItem,
    ListStyle, NodeKind, OutputBody, ProgressData, TableData, TreeNode, ValueFormat,
};
use crate::core::value::{coerce_number, Value};

/// Display policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    #[default]
    Default,
    Compact,
    Detailed,
    Json,
    Minimal,
}

impl PresentationMode {
    pub const ALL: [PresentationMode; 5] = [
        PresentationMode::Default,
        PresentationMode::Compact,
        PresentationMode::Detailed,
        PresentationMode::Json,
        PresentationMode::Minimal,
    ];

    /// Mode names in canonical order.
    pub fn names() -> &'static [&'static str] {
        &["default", "compact", "detailed", "json", "minimal"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationMode::Default => "default",
            PresentationMode::Compact => "compact",
            PresentationMode::Detailed => "detailed",
            PresentationMode::Json => "json",
            PresentationMode::Minimal => "minimal",
        }
    }
}

impl fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid presentation mode '{0}'")]
pub struct InvalidMode(pub String);

impl FromStr for PresentationMode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresentationMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| InvalidMode(s.to_string()))
    }
}

/// Session-wide presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationConfig {
    pub mode: PresentationMode,
    pub colors: bool,
    pub max_width: usize,
    pub max_table_rows: usize,
    pub truncate_strings: usize,
    pub show_timestamps: bool,
    pub json_pretty_print: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            mode: PresentationMode::Default,
            colors: true,
            max_width: 120,
            max_table_rows: 50,
            truncate_strings: 100,
            show_timestamps: false,
            json_pretty_print: true,
        }
    }
}

impl PresentationConfig {
    /// Defaults without ANSI colors.
    pub fn plain() -> Self {
        Self {
            colors: false,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: PresentationMode) -> Self {
        self.mode = mode;
        self
    }
}

fn bold() -> Style {
    Style::new().bold()
}

fn dim() -> Style {
    Style::new().dimmed()
}

fn green() -> Style {
    Style::new().green()
}

fn red() -> Style {
    Style::new().red()
}

fn yellow() -> Style {
    Style::new().yellow()
}

fn cyan() -> Style {
    Style::new().cyan()
}

fn directory() -> Style {
    Style::new().blue().bold()
}

fn named_style(name: &str) -> Option<Style> {
    let style = Style::new();
    Some(match name {
        "black" => style.black(),
        "red" => style.red(),
        "green" => style.green(),
        "yellow" => style.yellow(),
        "blue" => style.blue(),
        "magenta" => style.magenta(),
        "cyan" => style.cyan(),
        "white" => style.white(),
        "gray" | "grey" => style.bright_black(),
        "brightRed" => style.bright_red(),
        "brightGreen" => style.bright_green(),
        "brightYellow" => style.bright_yellow(),
        "brightBlue" => style.bright_blue(),
        "brightMagenta" => style.bright_magenta(),
        "brightCyan" => style.bright_cyan(),
        "brightWhite" => style.bright_white(),
        "bold" => style.bold(),
        "dim" => style.dimmed(),
        _ => return None,
    })
}

/// Renders outputs according to a [`PresentationConfig`].
#[derive(Debug, Clone, Default)]
pub struct Presenter {
    config: PresentationConfig,
}

impl Presenter {
    pub fn new(config: PresentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.config
    }

    pub fn mode(&self) -> PresentationMode {
        self.config.mode
    }

    /// The explicit mode switch; the only mutation of the config.
    pub fn set_mode(&mut self, mode: PresentationMode) {
        self.config.mode = mode;
    }

    /// Render `output` to text (no trailing newline).
    pub fn render(&self, output: &CommandOutput) -> String {
        if self.config.mode == PresentationMode::Json {
            return self.render_json(output);
        }
        let mut lines = Vec::new();
        self.render_into(output, &mut lines);
        lines.join("\n")
    }

    fn render_json(&self, output: &CommandOutput) -> String {
        let rendered = if self.config.json_pretty_print {
            serde_json::to_string_pretty(output)
        } else {
            serde_json::to_string(output)
        };
        rendered.unwrap_or_else(|err| format!("{{\"type\":\"error\",\"data\":{{\"message\":\"{}\"}}}}", err))
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.config.colors {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn render_into(&self, output: &CommandOutput, lines: &mut Vec<String>) {
        let metadata = output.metadata.as_ref();

        if let Some(title) = metadata.and_then(|m| m.title.as_deref()) {
            lines.push(self.paint(title, bold()));
            if let Some(description) = metadata.and_then(|m| m.description.as_deref()) {
                lines.push(self.paint(description, dim()));
            }
            if self.config.mode != PresentationMode::Compact {
                lines.push(String::new());
            }
        }

        match &output.body {
            OutputBody::Text(text) => self.render_text(text, lines),
            OutputBody::Table(table) => self.render_table(table, lines),
            OutputBody::List(list) => self.render_list(list, lines),
            OutputBody::Tree(root) => self.render_tree_node(root, "", true, lines),
            OutputBody::KeyValue(kv) => self.render_key_value(kv, lines),
            OutputBody::Progress(progress) => self.render_progress(progress, lines),
            OutputBody::Diff(diff) => self.render_diff(diff, lines),
            OutputBody::Error(error) => self.render_error(error, lines),
            OutputBody::Success(success) => {
                lines.push(self.paint(&format!("[OK] {}", success.message), green()));
                if let Some(details) = &success.details {
                    if self.config.mode != PresentationMode::Minimal {
                        lines.push(self.paint(details, dim()));
                    }
                }
            }
            OutputBody::Warning(data) => {
                lines.push(self.paint(&format!("[WARN] {}", data.message), yellow()))
            }
            OutputBody::Info(data) => lines.push(self.paint(&format!("[INFO] {}", data.message), cyan())),
            OutputBody::Composite => {
                for (index, child) in output.children.iter().enumerate() {
                    if index > 0 {
                        lines.push(String::new());
                    }
                    self.render_into(child, lines);
                }
            }
        }

        if self.config.show_timestamps {
            if let Some(timestamp) = metadata.and_then(|m| m.timestamp) {
                lines.push(self.paint(&timestamp.to_rfc3339(), dim()));
            }
        }

        if self.config.mode == PresentationMode::Detailed {
            if let Some(duration) = metadata.and_then(|m| m.duration) {
                lines.push(String::new());
                lines.push(self.paint(&format!("Completed in {}ms", duration), dim()));
            }
        }
    }

    fn render_text(&self, text: &str, lines: &mut Vec<String>) {
        lines.extend(text.split('\n').map(str::to_string));
    }

    fn render_table(&self, table: &TableData, lines: &mut Vec<String>) {
        if table.rows.is_empty() {
            lines.push(self.paint("(no data)", dim()));
            return;
        }

        let widths = column_widths(&table.headers, &table.rows, self.config.max_width);
        let align = |i: usize| {
            table
                .alignment
                .as_ref()
                .and_then(|a| a.get(i).copied())
                .unwrap_or(Alignment::Left)
        };

        let header = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| pad_cell(h, widths[i], align(i)))
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(self.paint(&header, bold()));

        let separator = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        lines.push(self.paint(&separator, dim()));

        let shown = table.rows.len().min(self.config.max_table_rows);
        for row in &table.rows[..shown] {
            let line = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = row.get(i).map(Value::to_string).unwrap_or_default();
                    pad_cell(&cell, *width, align(i))
                })
                .collect::<Vec<_>>()
                .join(" | ");
            lines.push(line);
        }

        let hidden = table.rows.len() - shown;
        if hidden > 0 {
            lines.push(self.paint(&format!("... and {} more rows", hidden), dim()));
        }
    }

    fn render_list(&self, list: &ListData, lines: &mut Vec<String>) {
        if list.items.is_empty() {
            lines.push(self.paint("(empty list)", dim()));
            return;
        }

        let numbered = list.ordered || list.style == ListStyle::Number;
        let bullet = match list.style {
            ListStyle::Bullet | ListStyle::Number => "*",
            ListStyle::Dash => "-",
            ListStyle::Arrow => ">",
            ListStyle::Check => "+",
        };

        for (index, item) in list.items.iter().enumerate() {
            let prefix = if numbered {
                format!("{}.", index + 1)
            } else {
                bullet.to_string()
            };
            self.render_list_item(item, &prefix, 0, lines);
        }
    }

    fn render_list_item(&self, item: &ListItem, prefix: &str, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let mut content = truncate(&item.content, self.config.truncate_strings);
        if let Some(style) = item.color.as_deref().and_then(named_style) {
            content = self.paint(&content, style);
        }
        let icon = item
            .icon
            .as_deref()
            .map(|i| format!("{} ", i))
            .unwrap_or_default();

        lines.push(format!("{}{} {}{}", indent, prefix, icon, content));
        for child in &item.children {
            self.render_list_item(child, "*", depth + 1, lines);
        }
    }

    fn render_tree_node(&self, node: &TreeNode, prefix: &str, is_last: bool, lines: &mut Vec<String>) {
        let connector = if is_last { "+-- " } else { "|-- " };
        let (icon, name) = match node.kind {
            NodeKind::Directory => ("[D] ", self.paint(&node.name, directory())),
            NodeKind::File => ("[F] ", node.name.clone()),
            NodeKind::Node => ("", node.name.clone()),
        };
        lines.push(format!("{}{}{}{}", prefix, connector, icon, name));

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "|   " });
        let count = node.children.len();
        for (index, child) in node.children.iter().enumerate() {
            self.render_tree_node(child, &child_prefix, index + 1 == count, lines);
        }
    }

    fn render_key_value(&self, kv: &KeyValueData, lines: &mut Vec<String>) {
        if kv.pairs.is_empty() {
            lines.push(self.paint("(no data)", dim()));
            return;
        }

        let separator = kv.separator.as_deref().unwrap_or(":");
        let key_width = kv
            .pairs
            .iter()
            .map(|p| p.key.chars().count())
            .max()
            .unwrap_or(0);

        for pair in &kv.pairs {
            let padded = format!("{:<width$}", pair.key, width = key_width);
            lines.push(format!(
                "{}{} {}",
                self.paint(&padded, bold()),
                separator,
                self.format_value(pair)
            ));
        }
    }

    fn format_value(&self, pair: &KeyValuePair) -> String {
        let value = &pair.value;
        if value.is_null() {
            return self.paint("(none)", dim());
        }
        match (pair.format, value) {
            (Some(ValueFormat::Bytes), Value::Number(n)) => format_bytes(*n),
            (Some(ValueFormat::Bytes), other) => format_bytes(coerce_number(&other.to_string())),
            (Some(ValueFormat::Date), other) => format_date(other),
            (Some(ValueFormat::Duration), other) => format_duration(other),
            (None, Value::Bool(true)) => self.paint("yes", green()),
            (None, Value::Bool(false)) => self.paint("no", red()),
            (None, Value::Array(items)) => truncate(
                &items.iter().map(Value::to_string).collect::<Vec<_>>().join(", "),
                self.config.truncate_strings,
            ),
            (None, other) => truncate(&other.to_string(), self.config.truncate_strings),
        }
    }

    fn render_progress(&self, progress: &ProgressData, lines: &mut Vec<String>) {
        let (filled, percent) = progress_fill(progress.current, progress.total);
        let bar = format!(
            "{}{}",
            self.paint(&"#".repeat(filled), green()),
            self.paint(&".".repeat(PROGRESS_WIDTH - filled), dim())
        );
        let status = progress_status(progress.current, progress.total, progress.unit.as_deref());
        let message = progress
            .message
            .as_deref()
            .map(|m| format!(" {}", m))
            .unwrap_or_default();
        lines.push(format!("[{}] {}% {}{}", bar, percent, status, message));
    }

    fn render_diff(&self, diff: &DiffData, lines: &mut Vec<String>) {
        lines.push(self.paint("--- before", dim()));
        lines.push(self.paint("+++ after", dim()));
        lines.push(String::new());

        let before: Vec<&str> = diff.before.split('\n').collect();
        let after: Vec<&str> = diff.after.split('\n').collect();
        for i in 0..before.len().max(after.len()) {
            match (before.get(i), after.get(i)) {
                (Some(b), Some(a)) if b == a => lines.push(format!("  {}", b)),
                (b, a) => {
                    if let Some(b) = b {
                        lines.push(self.paint(&format!("- {}", b), red()));
                    }
                    if let Some(a) = a {
                        lines.push(self.paint(&format!("+ {}", a), green()));
                    }
                }
            }
        }
    }

    fn render_error(&self, error: &ErrorData, lines: &mut Vec<String>) {
        let code = error
            .code
            .as_deref()
            .map(|c| format!(" [{}]", c))
            .unwrap_or_default();
        lines.push(self.paint(&format!("[ERROR]{}: {}", code, error.message), red()));

        let minimal = self.config.mode == PresentationMode::Minimal;
        if let Some(details) = error.details.as_deref().filter(|_| !minimal) {
            lines.push(self.paint(details, dim()));
        }
        if !error.suggestions.is_empty() && !minimal {
            lines.push(String::new());
            lines.push(self.paint("Suggestions:", cyan()));
            for suggestion in &error.suggestions {
                lines.push(format!("  * {}", suggestion));
            }
        }
        if let Some(stack) = error.stack.as_deref() {
            if self.config.mode == PresentationMode::Detailed {
                lines.push(String::new());
                lines.push(self.paint("Stack trace:", dim()));
                lines.extend(stack.lines().map(|l| self.paint(l, dim())));
            }
        }
    }
}
