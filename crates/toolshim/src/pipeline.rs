//! Whole-conversation conversion between the chat API shape and plain text.
//!
//! [`ToolPipeline::convert`] flattens a request for a model without native
//! tool calling:
//!
//! 1. `tool_choice` is checked (`auto`, `none` or absent) and removed.
//! 2. Each run of `tool` messages becomes a `user` message holding the
//!    rendered results, merged with the user message right after it if any.
//! 3. The rendered tool schemas replace the placeholder in message content,
//!    and `tools` is removed.
//! 4. Assistant `tool_calls` are rendered inline after the message content.
//!
//! [`ToolPipeline::extract_response`] goes the other way: it parses a raw
//! reply into an assistant message with `tool_calls` and a finish reason.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::codec::{
    CallBuilder, Extraction, Extractor, PlainResponseBuilder, SchemaBuilder, ToolCallBuilder,
    ToolCallExtractor, ToolResponseBuilder, ToolSchemaBuilder,
};
use crate::config::PipelineConfig;
use crate::error::{ConvertError, ToolError};
use crate::{ChatRequest, Message, MessageRole, ToolDef};

/// Why the model stopped: it called tools or it just answered.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Tool,
    Stop,
}

/// An assistant turn recovered from raw model text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AssistantResponse {
    #[serde(flatten)]
    pub message: Message,
    pub finish_reason: FinishReason,
}

/// A short random call id: `call_` followed by 8 hex digits.
pub fn generate_call_id() -> String {
    let hex: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("call_{hex}")
}

/// Converts conversations to text form and model replies back.
///
/// Built from a [`PipelineConfig`] with [`new`](Self::new), or from any mix
/// of components with [`from_parts`](Self::from_parts). Holds no mutable
/// state; share it freely.
pub struct ToolPipeline {
    extractor: Box<dyn ToolCallExtractor>,
    call_builder: Box<dyn ToolCallBuilder>,
    response_builder: Box<dyn ToolResponseBuilder>,
    schema_builder: Box<dyn ToolSchemaBuilder>,
    schema_placeholder: String,
    replace_schema_all: bool,
}

impl ToolPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::from_parts(
            Extractor::for_config(&config),
            CallBuilder::for_config(&config),
            PlainResponseBuilder,
            SchemaBuilder::for_config(&config),
        )
        .with_placeholder(config.schema_placeholder)
        .with_replace_schema_all(config.replace_schema_all)
    }

    /// Assemble a pipeline from individual components, e.g. a Markdown
    /// extractor with JSON schemas.
    pub fn from_parts(
        extractor: impl ToolCallExtractor + 'static,
        call_builder: impl ToolCallBuilder + 'static,
        response_builder: impl ToolResponseBuilder + 'static,
        schema_builder: impl ToolSchemaBuilder + 'static,
    ) -> Self {
        Self {
            extractor: Box::new(extractor),
            call_builder: Box::new(call_builder),
            response_builder: Box::new(response_builder),
            schema_builder: Box::new(schema_builder),
            schema_placeholder: crate::DEFAULT_SCHEMA_PLACEHOLDER.to_string(),
            replace_schema_all: true,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.schema_placeholder = placeholder.into();
        self
    }

    pub fn with_replace_schema_all(mut self, all: bool) -> Self {
        self.replace_schema_all = all;
        self
    }

    // ── Structured → text ──

    /// Flatten a request. The input is left untouched.
    ///
    /// Assistant tool calls are rendered after the message's content,
    /// separated by a newline. Empty content counts as absent, so a message
    /// with `""` content becomes the rendered calls alone.
    pub fn convert(&self, request: &ChatRequest) -> Result<ChatRequest, ConvertError> {
        check_tool_choice(request.tool_choice.as_ref())?;

        let mut request = request.clone();
        request.tool_choice = None;
        let original_len = request.messages.len();
        request.messages = self.merge_tool_results(std::mem::take(&mut request.messages));

        let tool_count = request.tools.as_ref().map_or(0, Vec::len);
        if let Some(tools) = request.tools.take() {
            self.inject_schemas(&mut request.messages, &tools);
        }

        let mut inlined = 0;
        for message in &mut request.messages {
            let Some(calls) = message.tool_calls.take() else {
                continue;
            };
            if calls.is_empty() {
                continue;
            }
            inlined += calls.len();
            let built = self.call_builder.build(&calls);
            message.content = Some(match message.content.take().filter(|c| !c.is_empty()) {
                Some(content) => format!("{content}\n{built}"),
                None => built,
            });
        }

        debug!(
            messages_in = original_len,
            messages_out = request.messages.len(),
            tools = tool_count,
            tool_calls = inlined,
            "Converted chat request"
        );
        Ok(request)
    }

    /// [`convert`](Self::convert) over an untyped JSON request.
    pub fn convert_value(&self, request: &Value) -> Result<Value, ConvertError> {
        check_tool_choice(request.get("tool_choice"))?;
        if request.get("messages").is_none() {
            return Err(ConvertError::MissingMessages);
        }
        let typed: ChatRequest = serde_json::from_value(request.clone())?;
        let converted = self.convert(&typed)?;
        Ok(serde_json::to_value(converted)?)
    }

    /// Rendered documentation for `tools`, joined by blank lines.
    pub fn schema_text(&self, tools: &[ToolDef]) -> String {
        self.schema_builder.build(tools).join("\n\n")
    }

    fn inject_schemas(&self, messages: &mut [Message], tools: &[ToolDef]) {
        if self.schema_placeholder.is_empty() {
            return;
        }
        let schema_text = self.schema_text(tools);
        for message in messages {
            if !self.replace_schema_all && message.role != MessageRole::System {
                continue;
            }
            if let Some(content) = message.content.as_mut()
                && !content.is_empty()
            {
                *content = content.replace(&self.schema_placeholder, &schema_text);
            }
        }
    }

    /// Fold each run of tool results into a user message.
    fn merge_tool_results(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut merged = Vec::with_capacity(messages.len());
        let mut pending: Vec<Message> = Vec::new();

        for mut message in messages {
            if message.role == MessageRole::Tool {
                pending.push(message);
                continue;
            }
            if !pending.is_empty() {
                let results = self.response_builder.build(&pending);
                pending.clear();
                if message.role == MessageRole::User {
                    message.content = Some(match message.content.take().filter(|c| !c.is_empty()) {
                        Some(content) => format!("{results}\n{content}"),
                        None => results,
                    });
                    merged.push(message);
                    continue;
                }
                merged.push(Message::user(results));
            }
            merged.push(message);
        }
        if !pending.is_empty() {
            merged.push(Message::user(self.response_builder.build(&pending)));
        }
        merged
    }

    // ── Text → structured ──

    /// Run the extractor alone.
    pub fn extract(&self, raw: &str) -> Extraction {
        self.extractor.extract(raw)
    }

    /// Parse a raw reply into an assistant turn.
    ///
    /// On extraction errors the message content is the raw reply, there are
    /// no tool calls and the errors are returned alongside.
    pub fn extract_response(&self, raw: &str) -> (AssistantResponse, Vec<ToolError>) {
        let extraction = self.extractor.extract(raw);
        let calls: Vec<_> = extraction
            .calls
            .into_iter()
            .map(|call| call.into_tool_call(generate_call_id()))
            .collect();

        debug!(
            tool_calls = calls.len(),
            errors = extraction.errors.len(),
            "Extracted assistant response"
        );

        let finish_reason = if calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::Tool
        };
        let mut message = Message::assistant_text(extraction.text);
        if !calls.is_empty() {
            message.tool_calls = Some(calls);
        }
        (
            AssistantResponse {
                message,
                finish_reason,
            },
            extraction.errors,
        )
    }
}

fn check_tool_choice(choice: Option<&Value>) -> Result<(), ConvertError> {
    match choice {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(s)) if s == "auto" || s == "none" => Ok(()),
        Some(Value::String(s)) => Err(ConvertError::UnsupportedToolChoice(s.clone())),
        Some(other) => Err(ConvertError::UnsupportedToolChoice(other.to_string())),
    }
}
