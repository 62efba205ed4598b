//! Tool results rendered back into the conversation.

use super::ToolResponseBuilder;
use crate::Message;

/// Joins the content of each tool-result message with newlines, unescaped.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainResponseBuilder;

impl ToolResponseBuilder for PlainResponseBuilder {
    fn build(&self, results: &[Message]) -> String {
        results
            .iter()
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_in_order() {
        let results = vec![
            Message::tool_result("1", "sunny, 21C"),
            Message::tool_result("2", "<b>raw</b>"),
        ];
        assert_eq!(PlainResponseBuilder.build(&results), "sunny, 21C\n<b>raw</b>");
        assert_eq!(PlainResponseBuilder.build(&[]), "");
    }
}
