//! Markdown-heading format.
//!
//! ```text
//! # Tool Use
//! ## Name: write_file
//! ### path: notes.txt
//! ### content: first line
//! second line
//! # Tool End
//! ```
//!
//! An argument runs from its `###` heading to the next heading or the end of
//! the block. Values are coerced with [`literal::coerce`](super::literal::coerce).

use serde_json::Map;
use tracing::warn;

use super::literal::coerce;
use super::pylit::{repr, str_form};
use super::{ParsedToolCall, ToolCallBuilder, ToolCallExtractor, ToolSchemaBuilder, decode_arguments};
use crate::config::{Markers, ToolFormat};
use crate::error::ToolError;
use crate::schema::ParameterSchema;
use crate::{ToolCall, ToolDef};

const NAME_PREFIX: &str = "## Name:";
const ARG_PREFIX: &str = "### ";

// ── Extractor ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct MarkdownExtractor {
    markers: Markers,
}

impl MarkdownExtractor {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new(ToolFormat::Markdown.default_markers())
    }
}

impl ToolCallExtractor for MarkdownExtractor {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn parse_block(&self, body: &str) -> Result<Vec<ParsedToolCall>, ToolError> {
        let mut lines = body.lines().skip_while(|line| line.trim().is_empty());

        let name = lines
            .next()
            .and_then(|line| line.trim_end().strip_prefix(NAME_PREFIX))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ToolError::Malformatted)?
            .to_string();

        let mut arguments = Map::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in lines {
            if let Some(header) = line.trim_start().strip_prefix(ARG_PREFIX) {
                let (key, first) = header.split_once(':').ok_or(ToolError::Malformatted)?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(ToolError::Malformatted);
                }
                if let Some((prev, parts)) = current.take() {
                    arguments.insert(prev, coerce(&parts.join("\n")));
                }
                if arguments.contains_key(key) {
                    return Err(ToolError::DuplicateArgument);
                }
                current = Some((key.to_string(), vec![first]));
            } else if let Some((_, parts)) = current.as_mut() {
                parts.push(line);
            } else if !line.trim().is_empty() {
                return Err(ToolError::Malformatted);
            }
        }
        if let Some((key, parts)) = current {
            arguments.insert(key, coerce(&parts.join("\n")));
        }

        Ok(vec![ParsedToolCall::new(name, arguments)])
    }
}

// ── Call builder ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct MarkdownCallBuilder {
    markers: Markers,
}

impl MarkdownCallBuilder {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for MarkdownCallBuilder {
    fn default() -> Self {
        Self::new(ToolFormat::Markdown.default_markers())
    }
}

impl ToolCallBuilder for MarkdownCallBuilder {
    fn build(&self, calls: &[ToolCall]) -> String {
        calls
            .iter()
            .map(|call| {
                let mut lines = vec![format!("{NAME_PREFIX} {}", call.function.name)];
                for (key, value) in decode_arguments(call) {
                    let mut text = str_form(&value);
                    if text
                        .split('\n')
                        .skip(1)
                        .any(|line| line.trim_start().starts_with(ARG_PREFIX))
                    {
                        warn!(
                            tool = %call.function.name,
                            argument = %key,
                            "Value would read back as extra arguments, writing it quoted"
                        );
                        text = repr(&value);
                    }
                    let mut parts = text.split('\n');
                    let first = parts.next().unwrap_or_default();
                    lines.push(format!("{ARG_PREFIX}{key}: {first}").trim_end().to_string());
                    lines.extend(parts.map(str::to_string));
                }
                self.markers.wrap(&lines.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Schema builder ────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct MarkdownSchemaBuilder {
    markers: Markers,
}

impl MarkdownSchemaBuilder {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for MarkdownSchemaBuilder {
    fn default() -> Self {
        Self::new(ToolFormat::Markdown.default_markers())
    }
}

impl ToolSchemaBuilder for MarkdownSchemaBuilder {
    fn build(&self, tools: &[ToolDef]) -> Vec<String> {
        tools
            .iter()
            .map(|tool| {
                let schema = ParameterSchema::of(tool);
                let mut lines = vec![
                    format!("{NAME_PREFIX} {}", tool.function.name),
                    format!("{ARG_PREFIX}Description: {}", tool.function.description),
                ];
                for (name, spec) in &schema.properties {
                    let requirement = if schema.is_required(name) {
                        "required"
                    } else {
                        "optional"
                    };
                    lines.push(format!(
                        "{ARG_PREFIX}{name} ({}, {requirement}): {}{}",
                        spec.type_label(),
                        spec.description,
                        spec.allowed_values_suffix(),
                    ));
                }
                self.markers.wrap(&lines.join("\n"))
            })
            .collect()
    }
}
