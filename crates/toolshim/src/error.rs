//! Error types.
//!
//! Two very different kinds of failure exist:
//!
//! - [`ToolError`] describes malformed model output. It is plain data,
//!   returned next to an empty call list so the caller can show the model
//!   what it sent and let it try again.
//! - [`ConvertError`] describes a bad request handed to the pipeline by the
//!   integrating program. It aborts the conversion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a tool-call extraction failed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolError {
    /// More end markers than start markers.
    StartMissing,
    /// More start markers than end markers.
    EndMissing,
    /// A block could not be parsed into a call.
    Malformatted,
    /// The same argument name appears twice in one call.
    DuplicateArgument,
}

impl ToolError {
    /// Stable identifier, matching the serialized form.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::StartMissing => "START_MISSING",
            ToolError::EndMissing => "END_MISSING",
            ToolError::Malformatted => "MALFORMATTED",
            ToolError::DuplicateArgument => "DUPLICATE_ARGUMENT",
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A request the pipeline refuses to convert.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(
        "unsupported parameter: 'tool_choice' set to '{0}'; only 'auto' and 'none' are supported"
    )]
    UnsupportedToolChoice(String),

    #[error("chat request must contain a 'messages' key")]
    MissingMessages,

    #[error("invalid chat request: {0}")]
    InvalidRequest(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_serializes_as_code() {
        let json = serde_json::to_string(&ToolError::DuplicateArgument).unwrap();
        assert_eq!(json, "\"DUPLICATE_ARGUMENT\"");
        assert_eq!(ToolError::EndMissing.to_string(), "END_MISSING");
    }

    #[test]
    fn convert_error_messages() {
        let err = ConvertError::UnsupportedToolChoice("required".into());
        assert!(err.to_string().contains("'required'"));
        assert!(ConvertError::MissingMessages.to_string().contains("messages"));
    }
}
