//! Text encodings for tool calls, tool schemas and tool results.
//!
//! Four families of components, one trait each:
//!
//! | Trait | Direction |
//! |-------|-----------|
//! | [`ToolCallExtractor`] | model text → [`ParsedToolCall`]s |
//! | [`ToolCallBuilder`] | [`ToolCall`]s → model text |
//! | [`ToolSchemaBuilder`] | [`ToolDef`]s → documentation text |
//! | [`ToolResponseBuilder`] | tool-result [`Message`]s → model text |
//!
//! Each [`ToolFormat`] has one implementation per family in its own module.
//! The [`Extractor`], [`CallBuilder`] and [`SchemaBuilder`] enums pick one
//! by format so the choice can be made from configuration.
//!
//! Extraction is all-or-nothing: either every contiguous block parses and
//! the calls are returned with the leading text, or nothing is returned
//! except the raw text and the errors. See [`blocks`] for the shared rules.

pub mod blocks;
pub mod json;
pub mod literal;
pub mod markdown;
pub mod pylit;
pub mod python;
pub mod response;
pub mod xml;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::{Markers, PipelineConfig, ToolFormat};
use crate::error::ToolError;
use crate::{Message, ToolCall, ToolDef};

pub use json::{JsonCallBuilder, JsonExtractor, JsonSchemaBuilder};
pub use markdown::{MarkdownCallBuilder, MarkdownExtractor, MarkdownSchemaBuilder};
pub use python::{PythonCallBuilder, PythonExtractor, PythonSignatureBuilder};
pub use response::PlainResponseBuilder;
pub use xml::{XmlCallBuilder, XmlExtractor, XmlSchemaBuilder};

// ── Parsed calls ──────────────────────────────────────────────────

/// A tool call as read from model text: a name and typed arguments.
///
/// Equality compares the name and the argument map; argument order does
/// not matter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ParsedToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Arguments serialized as a compact JSON object string.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }

    /// Convert to the chat API shape under the given call id.
    pub fn into_tool_call(self, id: impl Into<String>) -> ToolCall {
        let arguments = self.arguments_json();
        ToolCall::new(id, self.name, arguments)
    }
}

/// Decode the JSON argument string of a chat API call for rendering.
///
/// Anything that is not a JSON object renders as no arguments.
pub(crate) fn decode_arguments(call: &ToolCall) -> Map<String, Value> {
    match serde_json::from_str::<Value>(&call.function.arguments) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(
                tool = %call.function.name,
                "Tool call arguments are not a JSON object, rendering without arguments"
            );
            Map::new()
        }
    }
}

/// Outcome of running an extractor over a model reply.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    /// Text preceding the tool blocks, or the whole reply on failure.
    pub text: String,
    pub calls: Vec<ParsedToolCall>,
    pub errors: Vec<ToolError>,
}

impl Extraction {
    /// Nothing to extract: the raw text passes through.
    pub fn passthrough(raw: &str) -> Self {
        Self {
            text: raw.to_string(),
            ..Default::default()
        }
    }

    /// Extraction failed: keep the raw text, drop every call.
    pub fn failed(raw: &str, errors: Vec<ToolError>) -> Self {
        Self {
            text: raw.to_string(),
            calls: Vec::new(),
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

// ── Traits ────────────────────────────────────────────────────────

/// Reads tool calls out of a model reply.
///
/// Implementors supply the block markers and the parser for one block's
/// interior; [`extract`](ToolCallExtractor::extract) applies the shared
/// balance, contiguity and all-or-nothing rules.
pub trait ToolCallExtractor: Send + Sync {
    fn markers(&self) -> &Markers;

    /// Parse the text between one start/end marker pair.
    fn parse_block(&self, body: &str) -> Result<Vec<ParsedToolCall>, ToolError>;

    fn extract(&self, raw: &str) -> Extraction {
        blocks::extract(raw, self.markers(), |body| self.parse_block(body))
    }
}

/// Renders chat API tool calls as text the model would have written.
pub trait ToolCallBuilder: Send + Sync {
    fn build(&self, calls: &[ToolCall]) -> String;
}

/// Renders tool definitions as documentation, one string per tool.
pub trait ToolSchemaBuilder: Send + Sync {
    fn build(&self, tools: &[ToolDef]) -> Vec<String>;
}

/// Renders a run of tool-result messages as text.
pub trait ToolResponseBuilder: Send + Sync {
    fn build(&self, results: &[Message]) -> String;
}

// ── Format dispatch ───────────────────────────────────────────────

/// An extractor for any [`ToolFormat`].
#[derive(Clone, Debug)]
pub enum Extractor {
    Xml(XmlExtractor),
    Json(JsonExtractor),
    Markdown(MarkdownExtractor),
    Python(PythonExtractor),
}

impl Extractor {
    pub fn new(format: ToolFormat, markers: Markers) -> Self {
        match format {
            ToolFormat::Xml => Extractor::Xml(XmlExtractor::new(markers)),
            ToolFormat::Json => Extractor::Json(JsonExtractor::new(markers)),
            ToolFormat::Markdown => Extractor::Markdown(MarkdownExtractor::new(markers)),
            ToolFormat::Python => Extractor::Python(PythonExtractor::new(markers)),
        }
    }

    pub fn for_config(config: &PipelineConfig) -> Self {
        Self::new(config.format, config.markers())
    }

    fn inner(&self) -> &dyn ToolCallExtractor {
        match self {
            Extractor::Xml(e) => e,
            Extractor::Json(e) => e,
            Extractor::Markdown(e) => e,
            Extractor::Python(e) => e,
        }
    }
}

impl ToolCallExtractor for Extractor {
    fn markers(&self) -> &Markers {
        self.inner().markers()
    }

    fn parse_block(&self, body: &str) -> Result<Vec<ParsedToolCall>, ToolError> {
        self.inner().parse_block(body)
    }
}

/// A call builder for any [`ToolFormat`].
#[derive(Clone, Debug)]
pub enum CallBuilder {
    Xml(XmlCallBuilder),
    Json(JsonCallBuilder),
    Markdown(MarkdownCallBuilder),
    Python(PythonCallBuilder),
}

impl CallBuilder {
    pub fn new(format: ToolFormat, markers: Markers) -> Self {
        match format {
            ToolFormat::Xml => CallBuilder::Xml(XmlCallBuilder::new(markers)),
            ToolFormat::Json => CallBuilder::Json(JsonCallBuilder::new(markers)),
            ToolFormat::Markdown => CallBuilder::Markdown(MarkdownCallBuilder::new(markers)),
            ToolFormat::Python => CallBuilder::Python(PythonCallBuilder::new(markers)),
        }
    }

    pub fn for_config(config: &PipelineConfig) -> Self {
        match Self::new(config.format, config.markers()) {
            CallBuilder::Json(b) => CallBuilder::Json(b.with_indent(config.json_indent)),
            other => other,
        }
    }
}

impl ToolCallBuilder for CallBuilder {
    fn build(&self, calls: &[ToolCall]) -> String {
        match self {
            CallBuilder::Xml(b) => b.build(calls),
            CallBuilder::Json(b) => b.build(calls),
            CallBuilder::Markdown(b) => b.build(calls),
            CallBuilder::Python(b) => b.build(calls),
        }
    }
}

/// A schema builder for any [`ToolFormat`].
///
/// The Python-call format documents tools as function signatures.
#[derive(Clone, Debug)]
pub enum SchemaBuilder {
    Xml(XmlSchemaBuilder),
    Json(JsonSchemaBuilder),
    Markdown(MarkdownSchemaBuilder),
    PythonSignature(PythonSignatureBuilder),
}

impl SchemaBuilder {
    pub fn new(format: ToolFormat, markers: Markers) -> Self {
        match format {
            ToolFormat::Xml => SchemaBuilder::Xml(XmlSchemaBuilder::new(markers)),
            ToolFormat::Json => SchemaBuilder::Json(JsonSchemaBuilder::default()),
            ToolFormat::Markdown => SchemaBuilder::Markdown(MarkdownSchemaBuilder::new(markers)),
            ToolFormat::Python => SchemaBuilder::PythonSignature(PythonSignatureBuilder),
        }
    }

    pub fn for_config(config: &PipelineConfig) -> Self {
        match Self::new(config.format, config.markers()) {
            SchemaBuilder::Json(_) => {
                SchemaBuilder::Json(JsonSchemaBuilder::default().with_indent(config.json_indent))
            }
            other => other,
        }
    }
}

impl ToolSchemaBuilder for SchemaBuilder {
    fn build(&self, tools: &[ToolDef]) -> Vec<String> {
        match self {
            SchemaBuilder::Xml(b) => b.build(tools),
            SchemaBuilder::Json(b) => b.build(tools),
            SchemaBuilder::Markdown(b) => b.build(tools),
            SchemaBuilder::PythonSignature(b) => b.build(tools),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn parsed_call_equality_ignores_argument_order() {
        let a = ParsedToolCall::new("t", args(json!({"x": 1, "y": 2})));
        let b = ParsedToolCall::new("t", args(json!({"y": 2, "x": 1})));
        assert_eq!(a, b);
        assert_ne!(a, ParsedToolCall::new("u", args(json!({"x": 1, "y": 2}))));
    }

    #[test]
    fn into_tool_call_keeps_argument_order() {
        let call = ParsedToolCall::new("t", args(json!({"b": 1, "a": "x"}))).into_tool_call("call_1");
        assert_eq!(call.id, "call_1");
        assert_eq!(call.function.arguments, r#"{"b":1,"a":"x"}"#);
    }

    #[test]
    fn decode_arguments_tolerates_garbage() {
        let call = ToolCall::new("c", "t", "not json");
        assert!(decode_arguments(&call).is_empty());
        let call = ToolCall::new("c", "t", "[1, 2]");
        assert!(decode_arguments(&call).is_empty());
        let call = ToolCall::new("c", "t", r#"{"k": true}"#);
        assert_eq!(decode_arguments(&call)["k"], json!(true));
    }

    #[test]
    fn dispatch_uses_format_markers() {
        for format in ToolFormat::ALL {
            let extractor = Extractor::new(format, format.default_markers());
            assert_eq!(extractor.markers(), &format.default_markers());
        }
    }

    #[test]
    fn every_format_round_trips_a_simple_call() {
        let call = ToolCall::new("c", "get_weather", r#"{"location": "London", "days": 3}"#);
        for format in ToolFormat::ALL {
            let config = PipelineConfig::new(format);
            let text = CallBuilder::for_config(&config).build(std::slice::from_ref(&call));
            let extraction = Extractor::for_config(&config).extract(&text);
            assert!(extraction.is_ok(), "{format}: {:?}", extraction.errors);
            assert_eq!(extraction.calls.len(), 1, "{format}");
            assert_eq!(extraction.calls[0].name, "get_weather");
            assert_eq!(extraction.calls[0].arguments["location"], json!("London"));
            assert_eq!(extraction.calls[0].arguments["days"], json!(3));
        }
    }

    #[test]
    fn python_format_documents_signatures() {
        let tool = ToolDef::new("ping", "Ping a host", json!({"type": "object", "properties": {}}));
        let schemas = SchemaBuilder::new(ToolFormat::Python, ToolFormat::Python.default_markers())
            .build(&[tool]);
        assert!(schemas[0].starts_with("def ping():"));
    }
}
