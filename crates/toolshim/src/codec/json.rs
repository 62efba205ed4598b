//! JSON-in-fence format.
//!
//! ````text
//! ```json
//! {
//!     "name": "get_weather",
//!     "arguments": {"location": "London"}
//! }
//! ```
//! ````
//!
//! A block holds one call object or an array of them. `serde_json` keeps the
//! last of two equal keys, so blocks are read through a strict seed that
//! flags duplicates at any depth.

use std::cell::Cell;
use std::fmt;

use serde::Serialize;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Value};

use super::{ParsedToolCall, ToolCallBuilder, ToolCallExtractor, ToolSchemaBuilder, decode_arguments};
use crate::config::{Markers, ToolFormat};
use crate::error::ToolError;
use crate::{ToolCall, ToolDef};

const DEFAULT_INDENT: usize = 4;

/// Pretty-print with `indent` spaces per level.
pub fn to_pretty<T: Serialize + ?Sized>(value: &T, indent: usize) -> String {
    let indent = " ".repeat(indent);
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    if value.serialize(&mut ser).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

// ── Strict parsing ────────────────────────────────────────────────

/// Deserializes any JSON value, setting the flag when an object repeats a key.
#[derive(Clone, Copy)]
struct StrictValue<'a> {
    duplicate: &'a Cell<bool>,
}

impl<'de> DeserializeSeed<'de> for StrictValue<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for StrictValue<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        self.deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(self)? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value_seed(self)?;
            if map.contains_key(&key) {
                self.duplicate.set(true);
            }
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}

/// Parse JSON text, rejecting repeated object keys.
pub fn parse_strict(text: &str) -> Result<Value, ToolError> {
    let duplicate = Cell::new(false);
    let mut de = serde_json::Deserializer::from_str(text);
    let value = StrictValue {
        duplicate: &duplicate,
    }
    .deserialize(&mut de)
    .map_err(|_| ToolError::Malformatted)?;
    de.end().map_err(|_| ToolError::Malformatted)?;
    if duplicate.get() {
        return Err(ToolError::DuplicateArgument);
    }
    Ok(value)
}

// ── Extractor ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct JsonExtractor {
    markers: Markers,
}

impl JsonExtractor {
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }
}

impl Default for JsonExtractor {
    fn default() -> Self {
        Self::new(ToolFormat::Json.default_markers())
    }
}

impl ToolCallExtractor for JsonExtractor {
    fn markers(&self) -> &Markers {
        &self.markers
    }

    fn parse_block(&self, body: &str) -> Result<Vec<ParsedToolCall>, ToolError> {
        match parse_strict(body.trim())? {
            Value::Object(obj) => Ok(vec![call_from_object(obj)?]),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(obj) => call_from_object(obj),
                    _ => Err(ToolError::Malformatted),
                })
                .collect(),
            _ => Err(ToolError::Malformatted),
        }
    }
}

fn call_from_object(mut obj: Map<String, Value>) -> Result<ParsedToolCall, ToolError> {
    let name = match obj.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => return Err(ToolError::Malformatted),
    };
    let arguments = match obj.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        // Chat API style: arguments as an encoded JSON object.
        Some(Value::String(encoded)) => match parse_strict(&encoded)? {
            Value::Object(map) => map,
            _ => return Err(ToolError::Malformatted),
        },
        Some(_) => return Err(ToolError::Malformatted),
    };
    Ok(ParsedToolCall::new(name, arguments))
}

// ── Call builder ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct JsonCallBuilder {
    markers: Markers,
    indent: usize,
}

impl JsonCallBuilder {
    pub fn new(markers: Markers) -> Self {
        Self {
            markers,
            indent: DEFAULT_INDENT,
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

impl Default for JsonCallBuilder {
    fn default() -> Self {
        Self::new(ToolFormat::Json.default_markers())
    }
}

impl ToolCallBuilder for JsonCallBuilder {
    fn build(&self, calls: &[ToolCall]) -> String {
        let mut objects: Vec<ParsedToolCall> = calls
            .iter()
            .map(|call| ParsedToolCall::new(call.function.name.clone(), decode_arguments(call)))
            .collect();
        let body = match objects.len() {
            1 => to_pretty(&objects.remove(0), self.indent),
            _ => to_pretty(&objects, self.indent),
        };
        // Backticks only occur inside strings; escaping them keeps a value
        // from closing the fence.
        self.markers.wrap(&body.replace('`', "\\u0060"))
    }
}

// ── Schema builder ────────────────────────────────────────────────

/// Renders each [`ToolDef`] as pretty-printed JSON, verbatim.
#[derive(Clone, Debug)]
pub struct JsonSchemaBuilder {
    indent: usize,
}

impl JsonSchemaBuilder {
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

impl Default for JsonSchemaBuilder {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
        }
    }
}

impl ToolSchemaBuilder for JsonSchemaBuilder {
    fn build(&self, tools: &[ToolDef]) -> Vec<String> {
        tools.iter().map(|tool| to_pretty(tool, self.indent)).collect()
    }
}
