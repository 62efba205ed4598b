//! Correction prompts for failed tool calls.
//!
//! When extraction or validation fails, the model needs to see what went
//! wrong and what a correct call looks like. These helpers render that as
//! plain text ready to be sent back as the next user turn.

use crate::ToolCall;
use crate::codec::{CallBuilder, ToolCallBuilder};
use crate::config::{Markers, ToolFormat};
use crate::error::ToolError;

const ARGS_PREVIEW_CHARS: usize = 200;

/// Explain extraction errors and show the expected block layout.
pub fn format_extraction_failure(format: ToolFormat, markers: &Markers, errors: &[ToolError]) -> String {
    let mut seen: Vec<ToolError> = Vec::new();
    for error in errors {
        if !seen.contains(error) {
            seen.push(*error);
        }
    }
    let codes: Vec<&str> = seen.iter().map(ToolError::code).collect();

    let mut msg = format!("Your tool call could not be read ({}).\n", codes.join(", "));
    if !seen.is_empty() {
        msg.push_str("\nWhat went wrong:\n");
        for error in &seen {
            msg.push_str(&format!("  - {}\n", explain(*error, format, markers)));
        }
    }

    let example = CallBuilder::new(format, markers.clone()).build(&[ToolCall::new(
        "example",
        "tool_name",
        r#"{"argument": "value"}"#,
    )]);
    msg.push_str("\nNo tools were run. Write the call again using this layout:\n");
    msg.push_str(&example);
    msg
}

fn explain(error: ToolError, format: ToolFormat, markers: &Markers) -> String {
    match error {
        ToolError::StartMissing => format!(
            "A closing `{}` appeared without a matching `{}`.",
            markers.end, markers.start
        ),
        ToolError::EndMissing => format!(
            "`{}` was opened but never closed with `{}`.",
            markers.start, markers.end
        ),
        ToolError::DuplicateArgument => {
            "The same argument was given more than once in one call. Give each argument once."
                .into()
        }
        ToolError::Malformatted => match format {
            ToolFormat::Xml => "Start the block with <name>tool_name</name> and put each argument in \
                its own <argument>value</argument> tag, with nothing else inside the block."
                .into(),
            ToolFormat::Json => "The block must hold one JSON object with \"name\" and \"arguments\" \
                keys, or an array of such objects."
                .into(),
            ToolFormat::Markdown => "The first line must be `## Name: tool_name` and each argument \
                must start on its own `### argument: value` line."
                .into(),
            ToolFormat::Python => "Write one call per line as tool_name(argument=value), using \
                keyword arguments and literal values only."
                .into(),
        },
    }
}

/// Explain why a call was rejected by the validator.
pub fn format_validation_failure(tool_name: &str, arguments: &str, violations: &[String]) -> String {
    let mut msg = format!("Tool call to '{tool_name}' was rejected:\n");
    for violation in violations {
        msg.push_str(&format!("  - {violation}\n"));
    }

    let preview: String = arguments.chars().take(ARGS_PREVIEW_CHARS).collect();
    msg.push_str(&format!("\nArguments used: {preview}"));
    if arguments.chars().count() > ARGS_PREVIEW_CHARS {
        msg.push_str("...");
    }
    msg.push_str("\n\nFix the arguments and call the tool again.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_failure_lists_each_kind_once() {
        let markers = ToolFormat::Xml.default_markers();
        let msg = format_extraction_failure(
            ToolFormat::Xml,
            &markers,
            &[ToolError::Malformatted, ToolError::Malformatted, ToolError::DuplicateArgument],
        );
        assert!(msg.contains("(MALFORMATTED, DUPLICATE_ARGUMENT)"));
        assert_eq!(msg.matches("<name>tool_name</name> and").count(), 1);
        assert!(msg.ends_with("<tool_call>\n<name>tool_name</name>\n<argument>value</argument>\n</tool_call>"));
    }

    #[test]
    fn extraction_failure_names_markers() {
        let markers = Markers::new("<run>", "</run>");
        let msg = format_extraction_failure(ToolFormat::Python, &markers, &[ToolError::EndMissing]);
        assert!(msg.contains("`<run>` was opened but never closed with `</run>`"));
        assert!(msg.ends_with("<run>\ntool_name(argument='value')\n</run>"));
    }

    #[test]
    fn validation_failure() {
        let msg = format_validation_failure(
            "book",
            r#"{"seats": "two"}"#,
            &["Missing required argument: 'to'.".into()],
        );
        assert!(msg.contains("'book' was rejected"));
        assert!(msg.contains("  - Missing required argument: 'to'."));
        assert!(msg.contains(r#"Arguments used: {"seats": "two"}"#));
    }

    #[test]
    fn validation_failure_truncates_arguments() {
        let long = "x".repeat(500);
        let msg = format_validation_failure("t", &long, &[]);
        assert!(msg.contains(&format!("{}...", "x".repeat(200))));
    }
}
