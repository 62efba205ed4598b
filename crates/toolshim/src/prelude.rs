//! Convenience re-exports for common `toolshim` types.
//!
//! Meant to be glob-imported:
//!
//! ```
//! use toolshim::prelude::*;
//! ```
//!
//! This pulls in the pipeline, its configuration, the chat types and the
//! codec traits. The concrete per-format extractors and builders are left
//! out; import those from [`codec`](crate::codec) when mixing components.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatRequest, Message, MessageRole, ToolCall, ToolDef, json_schema_for};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::config::{Markers, PipelineConfig, ToolFormat};
pub use crate::error::{ConvertError, ToolError};
pub use crate::pipeline::{AssistantResponse, FinishReason, ToolPipeline};

// ── Codec ───────────────────────────────────────────────────────────
pub use crate::codec::{
    CallBuilder, Extraction, Extractor, ParsedToolCall, SchemaBuilder, ToolCallBuilder,
    ToolCallExtractor, ToolResponseBuilder, ToolSchemaBuilder,
};

// ── Validation ──────────────────────────────────────────────────────
pub use crate::reflection::{format_extraction_failure, format_validation_failure};
pub use crate::validator::ToolValidator;
