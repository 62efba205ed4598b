//! Configuration for the [`ToolPipeline`](crate::pipeline::ToolPipeline).
//!
//! Everything has a sensible default: the tag-delimited format with its
//! standard markers, the `{{llm_tools_list}}` placeholder, and schema
//! injection into every message.
//!
//! # Examples
//!
//! ```
//! use toolshim::config::{PipelineConfig, ToolFormat};
//!
//! let config = PipelineConfig::new(ToolFormat::Markdown)
//!     .with_placeholder("<<TOOLS>>")
//!     .with_replace_schema_all(false);
//! assert_eq!(config.markers().start, "# Tool Use");
//! ```
//!
//! Configs can also be loaded from a JSON file; missing fields take their
//! defaults:
//!
//! ```json
//! { "format": "python", "markers": { "start": "<run>", "end": "</run>" } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::DEFAULT_SCHEMA_PLACEHOLDER;

// ── Format selection ──────────────────────────────────────────────

/// The textual encoding used for tool calls and schemas.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolFormat {
    /// `<tool_call><name>..</name><arg>..</arg></tool_call>`
    #[default]
    Xml,
    /// A `{"name": .., "arguments": {..}}` object inside a ```` ```json ```` fence.
    Json,
    /// `## Name:` / `### arg:` headings between `# Tool Use` and `# Tool End`.
    Markdown,
    /// `name(arg=value)` lines inside `<code>` tags.
    Python,
}

impl ToolFormat {
    pub const ALL: [ToolFormat; 4] = [
        ToolFormat::Xml,
        ToolFormat::Json,
        ToolFormat::Markdown,
        ToolFormat::Python,
    ];

    /// The start/end markers this format uses unless overridden.
    pub fn default_markers(self) -> Markers {
        match self {
            ToolFormat::Xml => Markers::new("<tool_call>", "</tool_call>"),
            ToolFormat::Json => Markers::new("```json", "```"),
            ToolFormat::Markdown => Markers::new("# Tool Use", "# Tool End"),
            ToolFormat::Python => Markers::new("<code>", "</code>"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolFormat::Xml => "xml",
            ToolFormat::Json => "json",
            ToolFormat::Markdown => "markdown",
            ToolFormat::Python => "python",
        }
    }
}

impl std::fmt::Display for ToolFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" | "tag" => Ok(ToolFormat::Xml),
            "json" => Ok(ToolFormat::Json),
            "markdown" | "md" => Ok(ToolFormat::Markdown),
            "python" | "py" | "codeact" => Ok(ToolFormat::Python),
            other => Err(format!(
                "unknown tool format '{other}', expected one of: xml, json, markdown, python"
            )),
        }
    }
}

// ── Markers ───────────────────────────────────────────────────────

/// The pair of strings delimiting one tool block in the text stream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Markers {
    pub start: String,
    pub end: String,
}

impl Markers {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Wrap `body` in the markers, one per line.
    pub fn wrap(&self, body: &str) -> String {
        format!("{}\n{body}\n{}", self.start, self.end)
    }
}

// ── Pipeline config ───────────────────────────────────────────────

/// Settings for a [`ToolPipeline`](crate::pipeline::ToolPipeline).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Encoding for calls and schemas. Default: [`ToolFormat::Xml`].
    pub format: ToolFormat,
    /// Marker override. `None` uses the format's defaults.
    pub markers: Option<Markers>,
    /// Token replaced by the rendered schemas. Default: `{{llm_tools_list}}`.
    pub schema_placeholder: String,
    /// Replace the placeholder in every message (`true`) or only in system
    /// messages (`false`). Default: `true`.
    pub replace_schema_all: bool,
    /// Indent width for JSON-rendered calls and schemas. Default: `4`.
    pub json_indent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            format: ToolFormat::default(),
            markers: None,
            schema_placeholder: DEFAULT_SCHEMA_PLACEHOLDER.to_string(),
            replace_schema_all: true,
            json_indent: 4,
        }
    }
}

impl PipelineConfig {
    pub fn new(format: ToolFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config file '{}': {e}", path.display()))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse config file '{}': {e}", path.display()))
    }

    /// Effective markers: the override, or the format's defaults.
    pub fn markers(&self) -> Markers {
        self.markers
            .clone()
            .unwrap_or_else(|| self.format.default_markers())
    }

    pub fn with_format(mut self, format: ToolFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_markers(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.markers = Some(Markers::new(start, end));
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.schema_placeholder = placeholder.into();
        self
    }

    pub fn with_replace_schema_all(mut self, all: bool) -> Self {
        self.replace_schema_all = all;
        self
    }

    pub fn with_json_indent(mut self, indent: usize) -> Self {
        self.json_indent = indent;
        self
    }
}
