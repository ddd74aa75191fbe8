//! Core document types.
//!
//! The structured tree mirrors the JSON shape rich-text engines exchange
//! (`{"type": "doc", "content": [...]}`), so unknown node types survive a
//! load/save cycle untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type names understood by the core.
pub mod kind {
    pub const DOC: &str = "doc";
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING: &str = "heading";
    pub const TEXT: &str = "text";
    pub const HARD_BREAK: &str = "hardBreak";
    pub const BULLET_LIST: &str = "bulletList";
    pub const ORDERED_LIST: &str = "orderedList";
    pub const TASK_LIST: &str = "taskList";
    pub const LIST_ITEM: &str = "listItem";
    pub const TASK_ITEM: &str = "taskItem";
    pub const CODE_BLOCK: &str = "codeBlock";
    pub const BLOCKQUOTE: &str = "blockquote";
    pub const HORIZONTAL_RULE: &str = "horizontalRule";
    pub const IMAGE: &str = "image";
    pub const TABLE: &str = "table";
    pub const TABLE_ROW: &str = "tableRow";
    pub const TABLE_HEADER: &str = "tableHeader";
    pub const TABLE_CELL: &str = "tableCell";
}

/// Mark type names understood by the core.
pub mod mark {
    pub const LINK: &str = "link";
    pub const BOLD: &str = "bold";
    pub const ITALIC: &str = "italic";
    pub const STRIKE: &str = "strike";
    pub const UNDERLINE: &str = "underline";
    pub const CODE: &str = "code";
}

/// Nodes with no content that still occupy one position.
const LEAF_KINDS: &[&str] = &[kind::HARD_BREAK, kind::HORIZONTAL_RULE, kind::IMAGE];

/// Nodes whose children are inline content.
const TEXTBLOCK_KINDS: &[&str] = &[kind::PARAGRAPH, kind::HEADING, kind::CODE_BLOCK];

/// An inline formatting mark on a text node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    /// Mark type (`bold`, `italic`, `link`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Mark attributes (`href` for links)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

impl Mark {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attrs: None,
        }
    }

    pub fn link(href: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert("href".to_string(), Value::String(href.to_string()));
        Self {
            kind: mark::LINK.to_string(),
            attrs: Some(attrs),
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.attrs.as_ref()?.get("href")?.as_str()
    }

    /// Sort key giving marks a stable outer-to-inner nesting order.
    pub(crate) fn rank(&self) -> u8 {
        match self.kind.as_str() {
            mark::LINK => 0,
            mark::BOLD => 1,
            mark::ITALIC => 2,
            mark::STRIKE => 3,
            mark::UNDERLINE => 4,
            mark::CODE => 6,
            _ => 5,
        }
    }
}

/// A node of the structured document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node type (`doc`, `paragraph`, `text`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific attributes (heading level, code language, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    /// Child nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
    /// Text of a `text` node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks of a `text` node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl Node {
    /// Create a bare node of the given type.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attrs: None,
            content: Vec::new(),
            text: None,
            marks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: Vec<Self>) -> Self {
        self.content = content;
        self
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn doc(content: Vec<Self>) -> Self {
        Self::new(kind::DOC).with_content(content)
    }

    /// The document a freshly mounted editor shows.
    pub fn empty_doc() -> Self {
        Self::doc(vec![Self::paragraph(Vec::new())])
    }

    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::new(kind::TEXT)
        }
    }

    pub fn marked_text(text: &str, marks: Vec<Mark>) -> Self {
        Self {
            marks,
            ..Self::text(text)
        }
    }

    pub fn hard_break() -> Self {
        Self::new(kind::HARD_BREAK)
    }

    pub fn paragraph(inlines: Vec<Self>) -> Self {
        Self::new(kind::PARAGRAPH).with_content(inlines)
    }

    /// A paragraph holding one plain text run (or nothing, for empty text).
    pub fn plain_paragraph(text: &str) -> Self {
        if text.is_empty() {
            Self::paragraph(Vec::new())
        } else {
            Self::paragraph(vec![Self::text(text)])
        }
    }

    pub fn heading(level: u8, inlines: Vec<Self>) -> Self {
        Self::new(kind::HEADING)
            .with_attr("level", level)
            .with_content(inlines)
    }

    pub fn code_block(language: Option<&str>, code: &str) -> Self {
        let language = language.map_or(Value::Null, |l| Value::String(l.to_string()));
        let node = Self::new(kind::CODE_BLOCK).with_attr("language", language);
        if code.is_empty() {
            node
        } else {
            node.with_content(vec![Self::text(code)])
        }
    }

    pub fn blockquote(blocks: Vec<Self>) -> Self {
        Self::new(kind::BLOCKQUOTE).with_content(blocks)
    }

    pub fn horizontal_rule() -> Self {
        Self::new(kind::HORIZONTAL_RULE)
    }

    pub fn bullet_list(items: Vec<Self>) -> Self {
        Self::new(kind::BULLET_LIST).with_content(items)
    }

    pub fn ordered_list(start: u64, items: Vec<Self>) -> Self {
        Self::new(kind::ORDERED_LIST)
            .with_attr("start", start)
            .with_content(items)
    }

    pub fn task_list(items: Vec<Self>) -> Self {
        Self::new(kind::TASK_LIST).with_content(items)
    }

    pub fn list_item(blocks: Vec<Self>) -> Self {
        Self::new(kind::LIST_ITEM).with_content(blocks)
    }

    pub fn task_item(checked: bool, blocks: Vec<Self>) -> Self {
        Self::new(kind::TASK_ITEM)
            .with_attr("checked", checked)
            .with_content(blocks)
    }

    pub fn table(rows: Vec<Self>) -> Self {
        Self::new(kind::TABLE).with_content(rows)
    }

    pub fn table_row(cells: Vec<Self>) -> Self {
        Self::new(kind::TABLE_ROW).with_content(cells)
    }

    /// A header or body cell holding one paragraph.
    pub fn table_cell(header: bool, paragraph: Self) -> Self {
        let kind = if header {
            kind::TABLE_HEADER
        } else {
            kind::TABLE_CELL
        };
        Self::new(kind)
            .with_attr("colspan", 1)
            .with_attr("rowspan", 1)
            .with_attr("colwidth", Value::Null)
            .with_content(vec![paragraph])
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn is_text(&self) -> bool {
        self.is(kind::TEXT)
    }

    /// True for content-less nodes such as `horizontalRule` and `hardBreak`.
    pub fn is_leaf(&self) -> bool {
        LEAF_KINDS.contains(&self.kind.as_str())
    }

    /// True for blocks whose children are inline text.
    pub fn is_textblock(&self) -> bool {
        TEXTBLOCK_KINDS.contains(&self.kind.as_str())
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref()?.get(key)
    }

    pub fn attr_u64(&self, key: &str) -> Option<u64> {
        self.attr(key)?.as_u64()
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key)?.as_str()
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key)?.as_bool()
    }

    pub fn has_mark(&self, kind: &str) -> bool {
        self.marks.iter().any(|m| m.kind == kind)
    }

    /// Text of an inline run; hard breaks become newlines.
    pub fn inline_text(&self) -> String {
        let mut out = String::new();
        for child in &self.content {
            if let Some(text) = &child.text {
                out.push_str(text);
            } else if child.is(kind::HARD_BREAK) {
                out.push('\n');
            } else {
                out.push_str(&child.inline_text());
            }
        }
        out
    }

    /// Plain text of the whole subtree, one line per text block.
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        collect_plain_lines(self, &mut lines);
        lines.join("\n")
    }

    /// Canonical form used when comparing trees.
    ///
    /// Adjacent text runs with identical marks are merged, empty text runs
    /// are dropped and marks are put in nesting order.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut node = self.clone();
        normalize_in_place(&mut node);
        node
    }
}

fn collect_plain_lines(node: &Node, lines: &mut Vec<String>) {
    if node.is_textblock() {
        lines.push(node.inline_text());
        return;
    }
    if let Some(text) = &node.text {
        lines.push(text.clone());
        return;
    }
    for child in &node.content {
        collect_plain_lines(child, lines);
    }
}

fn normalize_in_place(node: &mut Node) {
    node.marks.sort_by_key(Mark::rank);
    for child in &mut node.content {
        normalize_in_place(child);
    }

    let mut merged: Vec<Node> = Vec::with_capacity(node.content.len());
    for child in std::mem::take(&mut node.content) {
        if child.is_text() && child.text.as_deref().is_none_or(str::is_empty) {
            continue;
        }
        if let Some(last) = merged.last_mut()
            && last.is_text()
            && child.is_text()
            && last.marks == child.marks
        {
            let tail = child.text.unwrap_or_default();
            last.text.get_or_insert_with(String::new).push_str(&tail);
            continue;
        }
        merged.push(child);
    }
    node.content = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_doc_serializes_like_engine_json() {
        let json = serde_json::to_string(&Node::empty_doc()).unwrap();
        assert_eq!(json, r#"{"type":"doc","content":[{"type":"paragraph"}]}"#);
    }

    #[test]
    fn test_unknown_node_types_survive_json_round_trip() {
        let raw = r#"{"type":"doc","content":[{"type":"mention","attrs":{"id":"7"}}]}"#;
        let node: Node = serde_json::from_str(raw).unwrap();
        assert_eq!(node.content[0].kind, "mention");
        assert_eq!(serde_json::to_string(&node).unwrap(), raw);
    }

    #[test]
    fn test_heading_level_attr() {
        let heading = Node::heading(2, vec![Node::text("Title")]);
        assert_eq!(heading.attr_u64("level"), Some(2));
        assert!(heading.is_textblock());
    }

    #[test]
    fn test_inline_text_maps_hard_break_to_newline() {
        let para = Node::paragraph(vec![
            Node::text("one"),
            Node::hard_break(),
            Node::text("two"),
        ]);
        assert_eq!(para.inline_text(), "one\ntwo");
    }

    #[test]
    fn test_plain_text_joins_blocks_with_newlines() {
        let doc = Node::doc(vec![
            Node::heading(1, vec![Node::text("Title")]),
            Node::bullet_list(vec![Node::list_item(vec![Node::plain_paragraph("item")])]),
            Node::horizontal_rule(),
            Node::plain_paragraph("tail"),
        ]);
        assert_eq!(doc.plain_text(), "Title\nitem\ntail");
    }

    #[test]
    fn test_normalized_merges_equal_runs_and_sorts_marks() {
        let para = Node::paragraph(vec![
            Node::marked_text("a", vec![Mark::new(mark::ITALIC), Mark::new(mark::BOLD)]),
            Node::marked_text("b", vec![Mark::new(mark::BOLD), Mark::new(mark::ITALIC)]),
            Node::text(""),
            Node::text("c"),
        ]);
        let normalized = para.normalized();
        assert_eq!(normalized.content.len(), 2);
        assert_eq!(normalized.content[0].text.as_deref(), Some("ab"));
        assert_eq!(normalized.content[0].marks[0].kind, mark::BOLD);
    }

    #[test]
    fn test_link_mark_href() {
        assert_eq!(Mark::link("https://x.dev").href(), Some("https://x.dev"));
        assert_eq!(Mark::new(mark::BOLD).href(), None);
    }
}
