//! Tag-delimited format.
//!
//! ```text
//! <tool_call>
//! <name>get_weather</name>
//! <location>London</location>
//! <days>3</days>
//! </tool_call>
//! ```
//!
//! Argument values are XML-escaped text; the extractor unescapes them and
//! runs them through [`literal::coerce`](super::literal::coerce).

use serde_json::Map;

use super::literal::coerce;
use super::pylit::str_form;
use super::{ParsedToolCall, ToolCallBuilder, ToolCallExtractor, ToolSchemaBuilder, decode_arguments};
use crate::config::{Markers, ToolFormat};
use crate::error::ToolError;
use crate::schema::ParameterSchema;
use crate::{ToolCall, ToolDef};

// ── Escaping ──────────────────────────────────────────────────────

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Decode the five predefined entities in one pass. Unknown entities are
/// left as written.
pub fn unescape(text: &str) -> String {
    const ENTITIES: [(&str, char); 5] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&apos;", '\''),
    ];
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        let (before, from_amp) = rest.split_at(at);
        out.push_str(before);
        match ENTITIES
            .iter()
            .find(|(entity, _)| from_amp.starts_with(entity))
        {
            Some((entity, c)) => {
                out.push(*c);
                rest = from_amp.get(entity.len()..).unwrap_or_default();
            }
            None => {
                out.push('&');
                rest = from_amp.get(1..).unwrap_or_default();
            }
        }
    }
    out.push_str(rest);
    out
}

// ── Extractor ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct XmlExtractor {
    markers: Markers,
}

impl XmlExtractor {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for XmlExtractor {
    fn default() -> Self {
        Self::new(ToolFormat::Xml.default_markers())
    }
}

impl ToolCallExtractor for XmlExtractor {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn parse_block(&self, body: &str) -> Result<Vec<ParsedToolCall>, ToolError> {
        let elements = split_elements(body)?;
        let mut elements = elements.into_iter();

        let name = match elements.next() {
            Some(("name", content)) => unescape(content.trim()),
            _ => return Err(ToolError::Malformatted),
        };
        if name.is_empty() {
            return Err(ToolError::Malformatted);
        }

        let mut arguments = Map::new();
        for (tag, content) in elements {
            if arguments.contains_key(tag) {
                return Err(ToolError::DuplicateArgument);
            }
            arguments.insert(tag.to_string(), coerce(&unescape(content)));
        }
        Ok(vec![ParsedToolCall::new(name, arguments)])
    }
}

/// Split a block body into `(tag, content)` pairs. Only whitespace may
/// separate elements.
fn split_elements(body: &str) -> Result<Vec<(&str, &str)>, ToolError> {
    let mut elements = Vec::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let after_lt = rest.strip_prefix('<').ok_or(ToolError::Malformatted)?;
        let tag_len = after_lt
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after_lt.len());
        let (tag, after_tag) = after_lt.split_at(tag_len);
        if tag.is_empty() {
            return Err(ToolError::Malformatted);
        }
        let content_and_rest = after_tag.strip_prefix('>').ok_or(ToolError::Malformatted)?;
        let closing = format!("</{tag}>");
        let close_at = content_and_rest
            .find(&closing)
            .ok_or(ToolError::Malformatted)?;
        let (content, from_close) = content_and_rest.split_at(close_at);
        elements.push((tag, content));
        rest = from_close
            .get(closing.len()..)
            .unwrap_or_default()
            .trim_start();
    }
    if elements.is_empty() {
        return Err(ToolError::Malformatted);
    }
    Ok(elements)
}

// ── Call builder ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct XmlCallBuilder {
    markers: Markers,
}

impl XmlCallBuilder {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for XmlCallBuilder {
    fn default() -> Self {
        Self::new(ToolFormat::Xml.default_markers())
    }
}

impl ToolCallBuilder for XmlCallBuilder {
    fn build(&self, calls: &[ToolCall]) -> String {
        calls
            .iter()
            .map(|call| {
                let mut lines = vec![format!("<name>{}</name>", escape(&call.function.name))];
                for (key, value) in decode_arguments(call) {
                    lines.push(format!("<{key}>{}</{key}>", escape(&str_form(&value))));
                }
                self.markers.wrap(&lines.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Schema builder ────────────────────────────────────────────────

/// Documents each tool as the block the model should write, with argument
/// tags holding `Required (type): description`.
#[derive(Clone, Debug)]
pub struct XmlSchemaBuilder {
    markers: Markers,
}

impl XmlSchemaBuilder {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for XmlSchemaBuilder {
    fn default() -> Self {
        Self::new(ToolFormat::Xml.default_markers())
    }
}

impl ToolSchemaBuilder for XmlSchemaBuilder {
    fn build(&self, tools: &[ToolDef]) -> Vec<String> {
        tools
            .iter()
            .map(|tool| {
                let schema = ParameterSchema::of(tool);
                let mut lines = vec![
                    format!("<name>{}</name>", escape(&tool.function.name)),
                    format!("<description>{}</description>", escape(&tool.function.description)),
                ];
                for (name, spec) in &schema.properties {
                    let requirement = if schema.is_required(name) {
                        "Required"
                    } else {
                        "Optional"
                    };
                    let text = format!(
                        "{requirement} ({}): {}{}",
                        spec.type_label(),
                        spec.description,
                        spec.allowed_values_suffix(),
                    );
                    lines.push(format!("<{name}>{}</{name}>", escape(&text)));
                }
                self.markers.wrap(&lines.join("\n"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weather_scenario() {
        let raw = "Here:\n<tool_call>\n<name>get_weather</name>\n<location>London</location>\n</tool_call>";
        let out = XmlExtractor::default().extract(raw);
        assert!(out.is_ok());
        assert_eq!(out.text, "Here:");
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].name, "get_weather");
        assert_eq!(out.calls[0].arguments["location"], json!("London"));
    }

    #[test]
    fn values_are_unescaped_then_coerced() {
        let raw = "<tool_call><name>t</name><n> 7 </n><q>a &lt;b&gt; &amp;amp;</q><l>[1, 2]</l><b>TRUE</b></tool_call>";
        let out = XmlExtractor::default().extract(raw);
        let args = &out.calls[0].arguments;
        assert_eq!(args["n"], json!(7));
        assert_eq!(args["q"], json!("a <b> &amp;"));
        assert_eq!(args["l"], json!([1, 2]));
        assert_eq!(args["b"], json!(true));
    }

    #[test]
    fn duplicate_argument() {
        let raw = "<tool_call><name>t</name><a>1</a><a>2</a></tool_call>";
        let out = XmlExtractor::default().extract(raw);
        assert_eq!(out.errors, vec![ToolError::DuplicateArgument]);
        assert_eq!(out.text, raw);
    }

    #[test]
    fn structural_errors() {
        let extractor = XmlExtractor::default();
        for raw in [
            "<tool_call></tool_call>",
            "<tool_call><a>1</a><name>t</name></tool_call>",
            "<tool_call><name> </name></tool_call>",
            "<tool_call><name>t</name> stray <a>1</a></tool_call>",
            "<tool_call><name>t</name><a>1</tool_call>",
            "<tool_call><name>t</name><a-b>1</a-b></tool_call>",
        ] {
            let out = extractor.extract(raw);
            assert_eq!(out.errors, vec![ToolError::Malformatted], "{raw}");
            assert!(out.calls.is_empty());
        }
    }

    #[test]
    fn escape_round_trip() {
        let text = r#"<a href="x">Tom & 'Jerry'</a>"#;
        assert_eq!(unescape(&escape(text)), text);
        assert_eq!(unescape("&unknown; & done"), "&unknown; & done");
    }

    #[test]
    fn builder_renders_each_call_in_its_own_block() {
        let calls = vec![
            ToolCall::new("1", "a", r#"{"x": "1 < 2", "y": [1, "z"]}"#),
            ToolCall::new("2", "b", "{}"),
        ];
        let text = XmlCallBuilder::default().build(&calls);
        assert_eq!(
            text,
            "<tool_call>\n<name>a</name>\n<x>1 &lt; 2</x>\n<y>[1, &apos;z&apos;]</y>\n</tool_call>\n\
             <tool_call>\n<name>b</name>\n</tool_call>"
        );
        let back = XmlExtractor::default().extract(&text);
        assert_eq!(back.calls[0].arguments["x"], json!("1 < 2"));
        assert_eq!(back.calls[0].arguments["y"], json!([1, "z"]));
        assert_eq!(back.calls[1].name, "b");
    }

    #[test]
    fn builder_empty_input() {
        assert_eq!(XmlCallBuilder::default().build(&[]), "");
    }

    #[test]
    fn schema_lines() {
        let tool = ToolDef::new(
            "read",
            "Read a file",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Where"},
                    "mode": {"type": "string", "enum": ["r", "rb"]},
                    "lines": {"type": "array"}
                },
                "required": ["path"]
            }),
        );
        let schemas = XmlSchemaBuilder::default().build(&[tool]);
        assert_eq!(
            schemas[0],
            "<tool_call>\n<name>read</name>\n<description>Read a file</description>\n\
             <path>Required (string): Where</path>\n\
             <mode>Optional (string):  Allowed values: r, rb</mode>\n\
             <lines>Optional (array[any]): </lines>\n</tool_call>"
        );
    }

    #[test]
    fn schema_text_is_escaped() {
        let tool = ToolDef::new(
            "diff",
            "Compare <old> & <new>",
            json!({
                "type": "object",
                "properties": {
                    "range": {"type": "string", "description": "Lines a<b, e.g. \"1-5\""}
                }
            }),
        );
        let schema = &XmlSchemaBuilder::default().build(&[tool])[0];
        assert!(
            schema.contains("<description>Compare &lt;old&gt; &amp; &lt;new&gt;</description>"),
            "{schema}"
        );
        assert!(
            schema.contains("<range>Optional (string): Lines a&lt;b, e.g. &quot;1-5&quot;</range>"),
            "{schema}"
        );

        // The rendered schema is itself a well-formed call block.
        let out = XmlExtractor::default().extract(schema);
        assert!(out.is_ok(), "{:?}", out.errors);
        assert_eq!(out.calls[0].name, "diff");
        assert_eq!(
            out.calls[0].arguments["range"],
            json!("Optional (string): Lines a<b, e.g. \"1-5\"")
        );
    }

    #[test]
    fn deeply_nested_value_stays_text() {
        let deep = format!("{}{}", "[".repeat(10_000), "]".repeat(10_000));
        let raw = format!("<tool_call>\n<name>t</name>\n<a>{deep}</a>\n</tool_call>");
        let out = XmlExtractor::default().extract(&raw);
        assert!(out.is_ok(), "{:?}", out.errors);
        assert_eq!(out.calls[0].arguments["a"], json!(deep));
    }
}
