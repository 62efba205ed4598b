//! Python-call format.
//!
//! ```text
//! <code>
//! search(query='rust tracing', limit=5)
//! fs.read(path="notes.txt")
//! </code>
//! ```
//!
//! Each block holds one or more keyword-only calls, optionally wrapped in a
//! markdown fence. Values are literals parsed by [`pylit`](super::pylit),
//! so nested lists, dicts and tuples keep their structure. Tools are
//! documented to the model as Python function signatures.

use serde_json::Map;
use tracing::trace;

use super::pylit::{self, repr};
use super::{ParsedToolCall, ToolCallBuilder, ToolCallExtractor, ToolSchemaBuilder, decode_arguments};
use crate::config::{Markers, ToolFormat};
use crate::error::ToolError;
use crate::schema::ParameterSchema;
use crate::{ToolCall, ToolDef};

const FENCE: &str = "```";

/// Remove an optional markdown fence: an opening line starting with
/// ```` ``` ```` and a closing line that starts or ends with it.
fn strip_fence(body: &str) -> String {
    let mut lines: Vec<&str> = body.trim().lines().collect();
    if !lines.first().is_some_and(|l| l.trim_start().starts_with(FENCE)) {
        return lines.join("\n");
    }
    lines.remove(0);
    if let Some(last) = lines.pop() {
        let trimmed = last.trim();
        if !trimmed.starts_with(FENCE) {
            let code = trimmed.strip_suffix(FENCE).unwrap_or(last);
            lines.push(code);
        }
    }
    lines.join("\n")
}

// ── Extractor ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct PythonExtractor {
    markers: Markers,
}

impl PythonExtractor {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new(ToolFormat::Python.default_markers())
    }
}

impl ToolCallExtractor for PythonExtractor {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn parse_block(&self, body: &str) -> Result<Vec<ParsedToolCall>, ToolError> {
        let code = strip_fence(body);
        let exprs = pylit::parse_calls(&code).map_err(|e| {
            trace!(error = %e, "Python call block did not parse");
            ToolError::Malformatted
        })?;
        if exprs.is_empty() {
            return Err(ToolError::Malformatted);
        }

        let mut calls = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let mut arguments = Map::new();
            for (key, literal) in expr.keywords {
                if arguments.contains_key(&key) {
                    return Err(ToolError::DuplicateArgument);
                }
                let value = literal.into_value().map_err(|e| {
                    trace!(error = %e, argument = %key, "Unrepresentable argument value");
                    ToolError::Malformatted
                })?;
                arguments.insert(key, value);
            }
            calls.push(ParsedToolCall::new(expr.name, arguments));
        }
        Ok(calls)
    }
}

// ── Call builder ──────────────────────────────────────────────────

/// Renders every call into a single block, one call per line.
#[derive(Clone, Debug)]
pub struct PythonCallBuilder {
    markers: Markers,
}

impl PythonCallBuilder {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for PythonCallBuilder {
    fn default() -> Self {
        Self::new(ToolFormat::Python.default_markers())
    }
}

impl ToolCallBuilder for PythonCallBuilder {
    fn build(&self, calls: &[ToolCall]) -> String {
        if calls.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = calls
            .iter()
            .map(|call| {
                let args: Vec<String> = decode_arguments(call)
                    .iter()
                    .map(|(key, value)| format!("{key}={}", repr(value)))
                    .collect();
                format!("{}({})", call.function.name, args.join(", "))
            })
            .collect();
        self.markers.wrap(&lines.join("\n"))
    }
}

// ── Schema builder ────────────────────────────────────────────────

/// Documents each tool as a Python function stub:
///
/// ```text
/// def search(query: str, limit: int = None):
///     """Search the web"""
///     ...
/// ```
///
/// Required parameters come first so the signature stays valid Python.
#[derive(Clone, Copy, Debug, Default)]
pub struct PythonSignatureBuilder;

fn python_type(json_type: Option<&str>) -> &'static str {
    match json_type {
        Some("string") => "str",
        Some("integer") => "int",
        Some("number") => "float",
        Some("boolean") => "bool",
        Some("array") => "list",
        Some("object") => "dict",
        _ => "Any",
    }
}

impl ToolSchemaBuilder for PythonSignatureBuilder {
    fn build(&self, tools: &[ToolDef]) -> Vec<String> {
        tools
            .iter()
            .map(|tool| {
                let schema = ParameterSchema::of(tool);
                let (required, optional): (Vec<_>, Vec<_>) = schema
                    .properties
                    .iter()
                    .partition(|(name, _)| schema.is_required(name));
                let params: Vec<String> = required
                    .iter()
                    .map(|(name, spec)| format!("{name}: {}", python_type(spec.primary_type())))
                    .chain(optional.iter().map(|(name, spec)| {
                        format!("{name}: {} = None", python_type(spec.primary_type()))
                    }))
                    .collect();

                let mut lines = vec![format!("def {}({}):", tool.function.name, params.join(", "))];
                if !tool.function.description.is_empty() {
                    lines.push(format!("    \"\"\"{}\"\"\"", tool.function.description));
                }
                lines.push("    ...".to_string());
                lines.join("\n")
            })
            .collect()
    }
}
