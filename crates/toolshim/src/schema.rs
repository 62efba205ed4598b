//! Read-only typed view of a tool's JSON parameter schema.
//!
//! Tool definitions carry their parameters as raw JSON Schema. Schema
//! builders and the validator only need a small part of it (property
//! names, types, descriptions, enums, nested shapes and the required list),
//! which [`ParameterSchema`] pulls out leniently: anything missing or oddly
//! shaped just reads as absent.

use serde_json::Value;

use crate::ToolDef;

/// The `properties` / `required` part of an object schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSchema {
    /// Properties in declaration order.
    pub properties: Vec<(String, PropertySpec)>,
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn from_value(parameters: &Value) -> Self {
        let required = parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            properties: read_properties(parameters),
            required,
        }
    }

    pub fn of(tool: &ToolDef) -> Self {
        Self::from_value(&tool.function.parameters)
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, spec)| spec)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// One property of an object schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertySpec {
    /// The `type` keyword. Union types (`["string", "null"]`) keep every member.
    pub types: Vec<String>,
    pub description: String,
    pub enum_values: Option<Vec<Value>>,
    pub items: Option<Box<PropertySpec>>,
    pub properties: Vec<(String, PropertySpec)>,
}

impl PropertySpec {
    pub fn from_value(spec: &Value) -> Self {
        let types = match spec.get("type") {
            Some(Value::String(t)) => vec![t.clone()],
            Some(Value::Array(ts)) => ts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            types,
            description: spec
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            enum_values: spec.get("enum").and_then(Value::as_array).cloned(),
            items: spec
                .get("items")
                .filter(|items| items.is_object())
                .map(|items| Box::new(PropertySpec::from_value(items))),
            properties: read_properties(spec),
        }
    }

    /// The primary declared type, `None` when the schema has none.
    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    /// Human-readable type: `string`, `array[integer]`, `object{a: string}`.
    ///
    /// A missing type reads as `string`; arrays and objects without a nested
    /// schema read as `array[any]` and `object{...}`.
    pub fn type_label(&self) -> String {
        if self.types.len() > 1 {
            return self.types.join(" | ");
        }
        match self.primary_type().unwrap_or("string") {
            "array" => match &self.items {
                Some(items) => format!("array[{}]", items.type_label()),
                None => "array[any]".to_string(),
            },
            "object" if self.properties.is_empty() => "object{...}".to_string(),
            "object" => {
                let fields: Vec<String> = self
                    .properties
                    .iter()
                    .map(|(name, spec)| format!("{name}: {}", spec.type_label()))
                    .collect();
                format!("object{{{}}}", fields.join(", "))
            }
            other => other.to_string(),
        }
    }

    /// ` Allowed values: a, b` when an enum is declared, empty otherwise.
    pub fn allowed_values_suffix(&self) -> String {
        match &self.enum_values {
            Some(values) if !values.is_empty() => {
                format!(" Allowed values: {}", format_enum(values))
            }
            _ => String::new(),
        }
    }
}

/// Enum members as a comma-separated list, strings unquoted.
pub fn format_enum(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_properties(schema: &Value) -> Vec<(String, PropertySpec)> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, spec)| (name.clone(), PropertySpec::from_value(spec)))
                .collect()
        })
        .unwrap_or_default()
}
