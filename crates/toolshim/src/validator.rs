//! Argument validation for extracted tool calls.
//!
//! [`ToolValidator::validate`] checks one chat API tool call against the
//! tool definitions in play and returns human-readable violations. An empty
//! list means the call is acceptable.
//!
//! Structural problems (not a function call, unreadable arguments, unknown
//! tool) stop validation with a single message. Past that point every
//! problem is reported: missing required arguments, unknown arguments, type
//! mismatches and values outside an enum.
//!
//! [`ToolValidator::validate_strict`] additionally runs the full JSON Schema
//! through `jsonschema`, catching constraints the quick checks ignore
//! (`minimum`, `pattern`, nested shapes, ...).

use serde_json::{Map, Value};
use tracing::trace;

use crate::codec::pylit::{repr, str_form};
use crate::schema::ParameterSchema;
use crate::{ToolCall, ToolDef};

/// Stateless validator. Tool definitions are passed to every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToolValidator;

impl ToolValidator {
    /// Validate a tool call given as JSON in the chat API shape.
    pub fn validate(&self, call: &Value, tools: &[ToolDef]) -> Vec<String> {
        let (name, arguments) = match read_call(call) {
            Ok(parts) => parts,
            Err(violation) => return vec![violation],
        };
        match tools.iter().find(|t| t.function.name == name) {
            Some(tool) => check_arguments(&arguments, &tool.function.parameters),
            None => vec![not_found(&name)],
        }
    }

    /// Validate a typed [`ToolCall`].
    pub fn validate_call(&self, call: &ToolCall, tools: &[ToolDef]) -> Vec<String> {
        match serde_json::to_value(call) {
            Ok(value) => self.validate(&value, tools),
            Err(e) => vec![format!("Tool call could not be serialized: {e}.")],
        }
    }

    /// Like [`validate`](Self::validate) with schemas given as raw JSON.
    ///
    /// Each schema may be a full tool definition
    /// (`{"type": "function", "function": {...}}`) or just the function
    /// object (`{"name": ..., "parameters": ...}`).
    pub fn validate_value_schemas(&self, call: &Value, schemas: &[Value]) -> Vec<String> {
        let (name, arguments) = match read_call(call) {
            Ok(parts) => parts,
            Err(violation) => return vec![violation],
        };
        let function = schemas.iter().find_map(|schema| {
            let function = if schema.get("type").and_then(Value::as_str) == Some("function") {
                schema.get("function")?
            } else {
                schema
            };
            (function.get("name").and_then(Value::as_str) == Some(name.as_str())).then_some(function)
        });
        match function {
            Some(function) => {
                let empty = Value::Object(Map::new());
                let parameters = function.get("parameters").unwrap_or(&empty);
                check_arguments(&arguments, parameters)
            }
            None => vec![not_found(&name)],
        }
    }

    /// [`validate`](Self::validate), then full JSON Schema validation of the
    /// arguments. Schema errors are prefixed with the instance path.
    pub fn validate_strict(&self, call: &Value, tools: &[ToolDef]) -> Vec<String> {
        let mut violations = self.validate(call, tools);
        let Ok((name, arguments)) = read_call(call) else {
            return violations;
        };
        let Some(tool) = tools.iter().find(|t| t.function.name == name) else {
            return violations;
        };

        let validator = match jsonschema::validator_for(&tool.function.parameters) {
            Ok(v) => v,
            Err(e) => {
                trace!(tool = %name, error = %e, "Tool schema is not valid JSON Schema, skipping");
                return violations;
            }
        };
        let instance = Value::Object(arguments);
        for error in validator.iter_errors(&instance) {
            let path = error.instance_path().to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            violations.push(format!("Schema violation at '{path}': {error}."));
        }
        violations
    }
}

fn not_found(name: &str) -> String {
    format!("Tool '{name}' not found in schema.")
}

/// Pull the tool name and decoded arguments out of a call, or describe why
/// that is impossible.
fn read_call(call: &Value) -> Result<(String, Map<String, Value>), String> {
    if call.get("type").and_then(Value::as_str) != Some("function") {
        return Err("Tool call type must be 'function'.".into());
    }
    let Some(function) = call.get("function") else {
        return Err("Tool call missing 'function' field.".into());
    };
    let name = match function.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err("Tool call missing function name.".into()),
    };

    let arguments = match function.get("arguments") {
        None => Value::Object(Map::new()),
        Some(Value::String(encoded)) => serde_json::from_str(encoded)
            .map_err(|_| "Tool arguments are not valid JSON.".to_string())?,
        Some(other) => other.clone(),
    };
    match arguments {
        Value::Object(map) => Ok((name, map)),
        _ => Err("Tool arguments must be a dictionary.".into()),
    }
}

/// Missing, unknown, mistyped and out-of-enum arguments, all reported.
fn check_arguments(arguments: &Map<String, Value>, parameters: &Value) -> Vec<String> {
    let schema = ParameterSchema::from_value(parameters);
    let mut violations = Vec::new();

    for required in &schema.required {
        if !arguments.contains_key(required) {
            violations.push(format!("Missing required argument: '{required}'."));
        }
    }

    for (name, value) in arguments {
        let Some(spec) = schema.property(name) else {
            violations.push(format!("Unknown argument: '{name}'."));
            continue;
        };
        if let Some(expected) = spec.primary_type()
            && spec.types.len() == 1
            && !matches_type(expected, value)
        {
            violations.push(format!(
                "Argument '{name}' expected type '{expected}', got '{}'.",
                json_type_name(value)
            ));
        }
        if let Some(allowed) = &spec.enum_values
            && !allowed.is_empty()
            && !allowed.contains(value)
        {
            violations.push(format!(
                "Argument '{name}' value '{}' is not valid. Allowed: {}.",
                str_form(value),
                repr(&Value::Array(allowed.clone()))
            ));
        }
    }
    violations
}

/// Unknown type keywords match anything.
fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tools() -> Vec<ToolDef> {
        vec![ToolDef::new(
            "book_flight",
            "Book a flight",
            json!({
                "type": "object",
                "properties": {
                    "from": {"type": "string"},
                    "to": {"type": "string"},
                    "seats": {"type": "integer", "minimum": 1},
                    "class": {"type": "string", "enum": ["economy", "business"]},
                    "flexible": {"type": "boolean"}
                },
                "required": ["from", "to"]
            }),
        )]
    }

    fn call(arguments: Value) -> Value {
        json!({
            "id": "call_1",
            "type": "function",
            "function": {"name": "book_flight", "arguments": arguments.to_string()}
        })
    }

    #[test]
    fn valid_call() {
        let v = ToolValidator.validate(&call(json!({"from": "LHR", "to": "JFK", "seats": 2})), &tools());
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn reports_every_argument_problem() {
        let v = ToolValidator.validate(&call(json!({"seats": "two", "pets": true})), &tools());
        assert_eq!(
            v,
            vec![
                "Missing required argument: 'from'.",
                "Missing required argument: 'to'.",
                "Argument 'seats' expected type 'integer', got 'string'.",
                "Unknown argument: 'pets'.",
            ]
        );
    }

    #[test]
    fn enum_and_type_checks() {
        let v = ToolValidator.validate(
            &call(json!({"from": "a", "to": "b", "class": "first", "flexible": 1, "seats": 2.5})),
            &tools(),
        );
        assert!(v.contains(&"Argument 'class' value 'first' is not valid. Allowed: ['economy', 'business'].".to_string()));
        assert!(v.contains(&"Argument 'flexible' expected type 'boolean', got 'integer'.".to_string()));
        assert!(v.contains(&"Argument 'seats' expected type 'integer', got 'number'.".to_string()));
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn structural_failures_stop_early() {
        let validator = ToolValidator;
        assert_eq!(
            validator.validate(&json!({"type": "tool"}), &tools()),
            vec!["Tool call type must be 'function'."]
        );
        assert_eq!(
            validator.validate(&json!({"type": "function"}), &tools()),
            vec!["Tool call missing 'function' field."]
        );
        assert_eq!(
            validator.validate(&json!({"type": "function", "function": {"name": ""}}), &tools()),
            vec!["Tool call missing function name."]
        );
        assert_eq!(
            validator.validate(
                &json!({"type": "function", "function": {"name": "x", "arguments": "{bad"}}),
                &tools()
            ),
            vec!["Tool arguments are not valid JSON."]
        );
        assert_eq!(
            validator.validate(
                &json!({"type": "function", "function": {"name": "x", "arguments": "[1]"}}),
                &tools()
            ),
            vec!["Tool arguments must be a dictionary."]
        );
        assert_eq!(
            validator.validate(
                &json!({"type": "function", "function": {"name": "nope", "arguments": "{}"}}),
                &tools()
            ),
            vec!["Tool 'nope' not found in schema."]
        );
    }

    #[test]
    fn typed_call_and_raw_schemas() {
        let typed = ToolCall::new("c", "book_flight", r#"{"from": "a"}"#);
        assert_eq!(
            ToolValidator.validate_call(&typed, &tools()),
            vec!["Missing required argument: 'to'."]
        );

        let bare = serde_json::to_value(&tools()[0].function).unwrap();
        let v = ToolValidator.validate_value_schemas(&call(json!({"from": "a", "to": "b"})), &[bare]);
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn strict_mode_uses_full_schema() {
        let c = call(json!({"from": "a", "to": "b", "seats": 0}));
        assert!(ToolValidator.validate(&c, &tools()).is_empty());
        let strict = ToolValidator.validate_strict(&c, &tools());
        assert_eq!(strict.len(), 1, "{strict:?}");
        assert!(strict[0].starts_with("Schema violation at '/seats'"));
    }
}
