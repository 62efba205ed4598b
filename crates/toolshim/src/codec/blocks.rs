//! Block discovery shared by every extractor.
//!
//! A reply is scanned for `start … end` marker pairs. The rules, in order:
//!
//! 1. **Balance.** Marker counts must match. No markers at all means there
//!    is no tool call. More starts than ends is [`ToolError::EndMissing`],
//!    more ends than starts is [`ToolError::StartMissing`].
//! 2. **Discovery.** Non-overlapping spans are found left to right.
//! 3. **Contiguity.** Only the leading run of spans separated by nothing but
//!    whitespace is kept. Text before the first span becomes the message
//!    text; everything after the run is ignored.
//! 4. **All-or-nothing.** If any kept block fails to parse, no calls are
//!    returned and the text is the raw reply.

use std::ops::Range;

use tracing::{debug, trace};

use super::{Extraction, ParsedToolCall};
use crate::config::Markers;
use crate::error::ToolError;

/// One `start … end` occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    /// Byte range covering both markers.
    pub outer: Range<usize>,
    /// Byte range between the markers.
    pub inner: Range<usize>,
}

/// Count start and end markers.
///
/// When one marker contains the other (```` ```json ```` and ```` ``` ````),
/// occurrences inside the longer marker are not counted for the shorter.
pub fn count_markers(raw: &str, markers: &Markers) -> (usize, usize) {
    let (start, end) = (markers.start.as_str(), markers.end.as_str());
    let mut starts = raw.matches(start).count();
    let mut ends = raw.matches(end).count();
    if start != end {
        if start.contains(end) {
            ends = ends.saturating_sub(starts * start.matches(end).count());
        } else if end.contains(start) {
            starts = starts.saturating_sub(ends * end.matches(start).count());
        }
    }
    (starts, ends)
}

/// Find non-overlapping spans in order.
#[allow(clippy::string_slice)] // offsets come from str::find on the same string
pub fn find_spans(raw: &str, markers: &Markers) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(found) = raw[cursor..].find(&markers.start) {
        let open = cursor + found;
        let body = open + markers.start.len();
        let Some(close) = raw[body..].find(&markers.end) else {
            break;
        };
        let close = body + close;
        let after = close + markers.end.len();
        spans.push(Span {
            outer: open..after,
            inner: body..close,
        });
        cursor = after;
    }
    spans
}

/// The leading run of spans separated only by whitespace.
#[allow(clippy::string_slice)] // span offsets are char boundaries
pub fn contiguous_prefix<'s>(raw: &str, spans: &'s [Span]) -> &'s [Span] {
    let mut kept = spans.len().min(1);
    for pair in spans.windows(2) {
        if !raw[pair[0].outer.end..pair[1].outer.start].trim().is_empty() {
            break;
        }
        kept += 1;
    }
    &spans[..kept]
}

/// Run the shared extraction rules with `parse` handling each block body.
#[allow(clippy::string_slice)] // span offsets are char boundaries
pub fn extract<F>(raw: &str, markers: &Markers, parse: F) -> Extraction
where
    F: Fn(&str) -> Result<Vec<ParsedToolCall>, ToolError>,
{
    if markers.start.is_empty() || markers.end.is_empty() {
        return Extraction::passthrough(raw);
    }

    let (starts, ends) = count_markers(raw, markers);
    if starts == 0 && ends == 0 {
        return Extraction::passthrough(raw);
    }
    if starts > ends {
        debug!(starts, ends, "Tool block end marker missing");
        return Extraction::failed(raw, vec![ToolError::EndMissing]);
    }
    if ends > starts {
        debug!(starts, ends, "Tool block start marker missing");
        return Extraction::failed(raw, vec![ToolError::StartMissing]);
    }

    let spans = find_spans(raw, markers);
    let kept = contiguous_prefix(raw, &spans);
    let Some(first) = kept.first() else {
        debug!("Markers balanced but no block found");
        return Extraction::passthrough(raw);
    };
    if kept.len() < spans.len() {
        debug!(
            kept = kept.len(),
            dropped = spans.len() - kept.len(),
            "Ignoring tool blocks after non-contiguous text"
        );
    }

    let mut calls = Vec::new();
    let mut errors = Vec::new();
    for (index, span) in kept.iter().enumerate() {
        match parse(&raw[span.inner.clone()]) {
            Ok(parsed) => calls.extend(parsed),
            Err(err) => {
                trace!(block = index, error = %err, "Tool block rejected");
                errors.push(err);
            }
        }
    }

    if !errors.is_empty() {
        debug!(errors = errors.len(), blocks = kept.len(), "Tool extraction failed");
        return Extraction::failed(raw, errors);
    }

    debug!(calls = calls.len(), blocks = kept.len(), "Extracted tool calls");
    Extraction {
        text: raw[..first.outer.start].trim().to_string(),
        calls,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn tags() -> Markers {
        Markers::new("<t>", "</t>")
    }

    /// Each block body is a bare name; "bad" fails, "dup" is a duplicate.
    fn parse_name(body: &str) -> Result<Vec<ParsedToolCall>, ToolError> {
        match body.trim() {
            "" | "bad" => Err(ToolError::Malformatted),
            "dup" => Err(ToolError::DuplicateArgument),
            name => Ok(vec![ParsedToolCall::new(name, Map::new())]),
        }
    }

    fn names(extraction: &Extraction) -> Vec<&str> {
        extraction.calls.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn no_markers_passes_text_through() {
        let out = extract("just talking", &tags(), parse_name);
        assert_eq!(out, Extraction::passthrough("just talking"));
    }

    #[test]
    fn unbalanced_markers() {
        let out = extract("<t>a</t><t>b", &tags(), parse_name);
        assert_eq!(out.errors, vec![ToolError::EndMissing]);
        assert_eq!(out.text, "<t>a</t><t>b");
        assert!(out.calls.is_empty());

        let out = extract("a</t>", &tags(), parse_name);
        assert_eq!(out.errors, vec![ToolError::StartMissing]);
    }

    #[test]
    fn leading_text_is_trimmed() {
        let out = extract("  Sure.\n<t>a</t>\n<t>b</t>  ", &tags(), parse_name);
        assert!(out.is_ok());
        assert_eq!(out.text, "Sure.");
        assert_eq!(names(&out), vec!["a", "b"]);
    }

    #[test]
    fn stray_text_ends_the_run() {
        let out = extract("<t>a</t> <t>b</t> stray <t>c</t>", &tags(), parse_name);
        assert_eq!(names(&out), vec!["a", "b"]);
        assert_eq!(out.text, "");
    }

    #[test]
    fn blocks_after_the_run_are_not_parsed() {
        let out = extract("<t>a</t> stray <t>bad</t>", &tags(), parse_name);
        assert!(out.is_ok());
        assert_eq!(names(&out), vec!["a"]);
    }

    #[test]
    fn one_bad_block_discards_all() {
        let raw = "Hi <t>a</t><t>bad</t><t>dup</t>";
        let out = extract(raw, &tags(), parse_name);
        assert_eq!(out.text, raw);
        assert!(out.calls.is_empty());
        assert_eq!(
            out.errors,
            vec![ToolError::Malformatted, ToolError::DuplicateArgument]
        );
    }

    #[test]
    fn end_before_start_yields_nothing() {
        let out = extract("</t> text <t>", &tags(), parse_name);
        assert_eq!(out, Extraction::passthrough("</t> text <t>"));
    }

    #[test]
    fn end_marker_inside_start_marker() {
        let fence = Markers::new("```json", "```");
        assert_eq!(count_markers("```json\n{}\n```", &fence), (1, 1));
        assert_eq!(count_markers("```json\n{}\n", &fence), (1, 0));
        assert_eq!(count_markers("```python\nx\n```", &fence), (0, 2));

        let out = extract("```json\na\n```\n```json\nb\n```", &fence, parse_name);
        assert_eq!(names(&out), vec!["a", "b"]);
    }

    #[test]
    fn span_offsets() {
        let spans = find_spans("x<t>ab</t>", &tags());
        assert_eq!(spans, vec![Span { outer: 1..10, inner: 4..6 }]);
    }

    #[test]
    fn empty_markers_never_match() {
        let out = extract("anything", &Markers::new("", ""), parse_name);
        assert_eq!(out.text, "anything");
        assert!(out.is_ok());
    }
}
