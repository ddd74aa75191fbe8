//! Stored content format detection.
//!
//! Notes written before the structured format existed hold raw Markdown,
//! newer ones hold the editor's JSON tree. Both arrive in the same string
//! field, so loading has to sniff which one it got.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

use super::parser::parse;
use super::types::{Node, kind};

/// Shape of a stored content string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    /// A serialized structured document (`{"type":"doc","content":[...]}`)
    Json,
    /// Anything else, treated as Markdown source
    Markdown,
}

/// Classify stored content.
///
/// Content is JSON only when it parses as an object whose `type` is `doc`
/// and whose `content` is an array. A JSON array, a non-doc object or
/// text that merely starts with `{` is Markdown.
pub fn detect_format(content: &str) -> ContentFormat {
    let trimmed = content.trim_start();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return ContentFormat::Markdown;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map))
            if map.get("type").and_then(Value::as_str) == Some(kind::DOC)
                && map.get("content").is_some_and(Value::is_array) =>
        {
            ContentFormat::Json
        }
        _ => ContentFormat::Markdown,
    }
}

/// Decode stored content into a structured document, whatever its format.
pub fn decode_content(content: &str) -> Node {
    match detect_format(content) {
        ContentFormat::Json => match serde_json::from_str::<Node>(content.trim_start()) {
            Ok(doc) => doc,
            Err(err) => {
                debug!("JSON content did not fit the node shape ({err}); reading as Markdown");
                parse(content)
            }
        },
        ContentFormat::Markdown => parse(content),
    }
}

/// Serialize a document for storage. Saved notes are always JSON.
pub fn encode_content(doc: &Node) -> Result<String> {
    Ok(serde_json::to_string(doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_structured_doc() {
        let raw = r#"{"type":"doc","content":[{"type":"paragraph"}]}"#;
        assert_eq!(detect_format(raw), ContentFormat::Json);
        assert_eq!(detect_format(&format!("  \n{raw}")), ContentFormat::Json);
    }

    #[test]
    fn test_plain_markdown() {
        assert_eq!(detect_format("# Title\n\nbody"), ContentFormat::Markdown);
        assert_eq!(detect_format(""), ContentFormat::Markdown);
    }

    #[test]
    fn test_json_that_is_not_a_doc_is_markdown() {
        assert_eq!(detect_format("[1, 2, 3]"), ContentFormat::Markdown);
        assert_eq!(detect_format(r#"{"type":"paragraph","content":[]}"#), ContentFormat::Markdown);
        assert_eq!(detect_format(r#"{"type":"doc"}"#), ContentFormat::Markdown);
        assert_eq!(detect_format(r#"{"type":"doc","content":"x"}"#), ContentFormat::Markdown);
    }

    #[test]
    fn test_brace_prefixed_text_is_markdown() {
        assert_eq!(detect_format("{not json at all"), ContentFormat::Markdown);
    }

    #[test]
    fn test_decode_both_formats() {
        let from_json = decode_content(r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"hi"}]}]}"#);
        let from_markdown = decode_content("hi");
        assert_eq!(from_json, from_markdown);
    }

    #[test]
    fn test_encoded_content_detects_as_json() {
        let doc = parse("# Saved\n\nbody");
        let stored = encode_content(&doc).unwrap();
        assert_eq!(detect_format(&stored), ContentFormat::Json);
        assert_eq!(decode_content(&stored), doc);
    }
}
