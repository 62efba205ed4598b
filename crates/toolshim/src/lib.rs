//! Text-format tool calling for models without native function calling.
//!
//! `toolshim` lets a plain text-completion model take part in an
//! OpenAI-style tool-calling conversation. Tool schemas, tool calls and tool
//! results are rendered into the prompt as text in one of four encodings, and
//! the model's reply is parsed back into structured tool calls.
//!
//! # Getting started
//!
//! ```
//! use toolshim::prelude::*;
//!
//! let pipeline = ToolPipeline::new(PipelineConfig::default());
//!
//! let reply = "Here:\n<tool_call>\n<name>get_weather</name>\n<location>London</location>\n</tool_call>";
//! let (response, errors) = pipeline.extract_response(reply);
//!
//! assert!(errors.is_empty());
//! assert_eq!(response.message.content.as_deref(), Some("Here:"));
//! assert_eq!(response.finish_reason, FinishReason::Tool);
//! ```
//!
//! # Where to find things
//!
//! - **Render a conversation for the model:** [`ToolPipeline::convert`](pipeline::ToolPipeline::convert)
//!   flattens tool schemas, assistant tool calls and tool results into plain
//!   message content.
//! - **Parse the model's reply:** [`ToolPipeline::extract_response`](pipeline::ToolPipeline::extract_response),
//!   or any [`ToolCallExtractor`](codec::ToolCallExtractor) directly.
//! - **Pick an encoding:** [`ToolFormat`](config::ToolFormat) selects the
//!   tag-delimited, JSON-fenced, Markdown-heading or Python-call format.
//!   The per-format code lives in [`codec::xml`], [`codec::json`],
//!   [`codec::markdown`] and [`codec::python`].
//! - **Check a call against its schema:** [`ToolValidator`](validator::ToolValidator).
//! - **Tell the model what went wrong:** [`reflection`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`codec`] | Extractors, call builders, schema builders, response builder, literal grammar |
//! | [`pipeline`] | Whole-conversation conversion and reply extraction |
//! | [`validator`] | Argument validation against tool schemas |
//! | [`schema`] | Typed read-only view of a tool's JSON parameter schema |
//! | [`config`] | [`PipelineConfig`](config::PipelineConfig), markers, format selection |
//! | [`error`] | [`ToolError`](error::ToolError) and [`ConvertError`](error::ConvertError) |
//! | [`reflection`] | Correction prompts for failed extractions and validations |
//!
//! Every component is synchronous and holds only immutable configuration,
//! so a single pipeline can be shared across threads freely.

pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod reflection;
pub mod schema;
pub mod validator;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default placeholder replaced by the rendered tool schemas.
pub const DEFAULT_SCHEMA_PLACEHOLDER: &str = "{{llm_tools_list}}";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use toolshim::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs {
///     location: String,
///     #[serde(default)]
///     unit: Option<String>,
/// }
///
/// let schema = json_schema_for::<WeatherArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"location".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request as consumed and produced by
/// [`ToolPipeline::convert`](pipeline::ToolPipeline::convert).
///
/// Only the fields the pipeline rewrites are typed. Everything else
/// (`model`, `temperature`, ...) is kept in `extra` and passed through.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced a tool-result message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: MessageRole, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, Some(content.into()))
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, Some(content.into()))
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::with_role(MessageRole::Assistant, None)
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(MessageRole::Tool, Some(content.into()))
        }
    }

    /// Attach the producing tool's name to a tool-result message.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Content as a string slice, empty when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition in the OpenAI function-calling format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Create a tool definition whose parameters are derived from `T`.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, json_schema_for::<T>())
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call in the chat API shape: arguments travel as a JSON string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let assist = Message::assistant_tool_calls(vec![ToolCall::new("c1", "t", "{}")]);
        assert_eq!(assist.role, MessageRole::Assistant);
        assert!(assist.content.is_none());
        assert_eq!(assist.text(), "");

        let tool = Message::tool_result("call-1", "result").with_name("search");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(tool.name.as_deref(), Some("search"));
    }

    #[test]
    fn chat_request_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "model": "local-7b",
            "temperature": 0.2,
            "messages": [{"role": "user", "content": "hi"}]
        });
        let req: ChatRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.extra["model"], "local-7b");

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["model"], "local-7b");
        assert!(back.get("tools").is_none());
        assert!(back.get("tool_choice").is_none());
    }

    #[test]
    fn message_ignores_finish_reason_field() {
        let raw = serde_json::json!({
            "role": "assistant",
            "content": "done",
            "finish_reason": "stop"
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.text(), "done");
    }

    #[test]
    fn tool_def_for_type_derives_parameters() {
        #[derive(Deserialize, JsonSchema)]
        #[allow(dead_code)]
        struct Args {
            path: String,
        }
        let def = ToolDef::for_type::<Args>("read", "Read a file");
        assert_eq!(def.name(), "read");
        assert_eq!(def.function.parameters["properties"]["path"]["type"], "string");
    }
}
