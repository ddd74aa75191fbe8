//! Markdown table detection and promotion.
//!
//! Users type pipe tables as ordinary paragraphs. An explicit command finds
//! the run of table-like blocks around the cursor, parses it and swaps the
//! whole run for a structured table in one edit. Anything short of a clean
//! parse leaves the document untouched.

mod parse;

pub use parse::{ParsedTable, is_separator, is_table_block, is_table_line, parse_table};

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::document::{self, Node, Textblock, kind, textblocks};
use crate::editor::{EditorError, EditorHandle};
use crate::error::Result;

/// Why a table command declined.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableParseError {
    #[error("Cursor is not inside a text block")]
    NoCursorBlock,

    #[error("Block under the cursor is not a table row")]
    NotTableLike,

    #[error("No separator row (| --- |) found")]
    NoSeparator,

    #[error("Separator row has no header above it")]
    SeparatorFirst,

    #[error("Header row has no cells")]
    EmptyHeader,

    #[error("Editor schema has no table nodes")]
    NoTableSchema,

    #[error("Document already holds a table")]
    AlreadyTable,

    #[error("Pasted text is not a Markdown table")]
    NotPastedTable,
}

static PASTE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\|.+\|\s*$").expect("valid paste row pattern"));

static PASTE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\|(?:\s*-+\s*\|)+\s*$").expect("valid paste separator pattern"));

/// Contiguous table-like blocks around the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRun {
    /// From the start of the first block to the end of the last
    pub range: Range<usize>,
    pub lines: Vec<String>,
}

impl TableRun {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Find the maximal run of table-like blocks containing `cursor`.
///
/// Blocks are taken in document order across container boundaries. The
/// run stops at any non-text block and at text already inside a table.
pub fn find_run(doc: &Node, cursor: usize) -> std::result::Result<TableRun, TableParseError> {
    let blocks: Vec<Textblock> = textblocks(doc);
    let joins = |b: &Textblock| !b.is_inside(kind::TABLE) && is_table_block(&b.text);

    let at = blocks
        .iter()
        .position(|b| b.contains(cursor))
        .ok_or(TableParseError::NoCursorBlock)?;
    if !joins(&blocks[at]) {
        return Err(TableParseError::NotTableLike);
    }

    let mut first = at;
    while first > 0 && !blocks[first].after_gap && joins(&blocks[first - 1]) {
        first -= 1;
    }
    let mut last = at;
    while last + 1 < blocks.len() && !blocks[last + 1].after_gap && joins(&blocks[last + 1]) {
        last += 1;
    }

    Ok(TableRun {
        range: blocks[first].range.start..blocks[last].range.end,
        lines: blocks[first..=last].iter().map(|b| b.text.clone()).collect(),
    })
}

fn ensure_table_capable(handle: &EditorHandle) -> Result<()> {
    if !handle.is_ready() {
        return Err(EditorError::NotMounted.into());
    }
    if !handle.is_editable() {
        return Err(EditorError::ReadOnly.into());
    }
    if !handle.supports_node(kind::TABLE) {
        return Err(TableParseError::NoTableSchema.into());
    }
    Ok(())
}

/// Promote the table-like run around the cursor into a table node.
///
/// Returns the parsed table on success. Every failure leaves the document
/// as it was.
pub fn promote_at_cursor(handle: &mut EditorHandle) -> Result<ParsedTable> {
    ensure_table_capable(handle)?;
    let doc = handle.get_structured().ok_or(EditorError::NotMounted)?;
    let cursor = handle.selection_head().ok_or(EditorError::NotMounted)?;

    let run = find_run(&doc, cursor).inspect_err(|e| debug!("Table promotion declined: {e}"))?;
    let parsed = parse_table(&run.text()).inspect_err(|e| debug!("Table promotion declined: {e}"))?;

    debug!(
        columns = parsed.columns(),
        rows = parsed.rows.len(),
        "Promoting {} blocks to a table",
        run.lines.len()
    );
    handle.replace_range(run.range, vec![parsed.to_node()])?;
    Ok(parsed)
}

/// Treat the whole document as one table and replace it with the result.
pub fn promote_document(handle: &mut EditorHandle) -> Result<ParsedTable> {
    ensure_table_capable(handle)?;
    let doc = handle.get_structured().ok_or(EditorError::NotMounted)?;
    if textblocks(&doc).iter().any(|b| b.is_inside(kind::TABLE)) {
        debug!("Whole-document conversion declined: table already present");
        return Err(TableParseError::AlreadyTable.into());
    }

    let text = textblocks(&doc)
        .into_iter()
        .map(|b| b.text)
        .collect::<Vec<_>>()
        .join("\n");
    let parsed = parse_table(&text).inspect_err(|e| debug!("Whole-document conversion declined: {e}"))?;

    let size = document::content_size(&doc);
    handle.replace_range(0..size, vec![parsed.to_node()])?;
    Ok(parsed)
}

/// Whether pasted plain text holds a Markdown table.
pub fn looks_like_pasted_table(text: &str) -> bool {
    PASTE_ROW.is_match(text) && PASTE_SEPARATOR.is_match(text)
}

/// Insert pasted Markdown as structured blocks.
///
/// The blocks go right after the top-level block holding the cursor.
/// Declines (so the host pastes plain text instead) unless the text
/// looks like a table.
pub fn paste_markdown_table(handle: &mut EditorHandle, text: &str) -> Result<()> {
    if !looks_like_pasted_table(text) {
        return Err(TableParseError::NotPastedTable.into());
    }
    ensure_table_capable(handle)?;
    let doc = handle.get_structured().ok_or(EditorError::NotMounted)?;
    let cursor = handle.selection_head().ok_or(EditorError::NotMounted)?;

    let mut at = 0;
    for block in &doc.content {
        let end = at + document::node_size(block);
        if cursor <= end {
            at = end;
            break;
        }
        at = end;
    }

    let parsed = document::parse(text);
    debug!(blocks = parsed.content.len(), "Pasting Markdown table");
    handle.replace_range(at..at, parsed.content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::MemoryEngine;
    use crate::error::SyncError;

    fn paragraphs(lines: &[&str]) -> Node {
        Node::doc(lines.iter().map(|l| Node::plain_paragraph(l)).collect())
    }

    fn mounted(doc: Node) -> (EditorHandle, MemoryEngine) {
        let engine = MemoryEngine::new();
        let mut handle = EditorHandle::new();
        handle.mount(Box::new(engine.clone()));
        handle.set_structured(doc).unwrap();
        (handle, engine)
    }

    #[test]
    fn test_run_expands_both_ways() {
        let doc = paragraphs(&["intro", "| a | b |", "| --- | --- |", "| 1 | 2 |", "outro"]);
        let blocks = textblocks(&doc);
        let run = find_run(&doc, blocks[2].range.start + 1).unwrap();
        assert_eq!(run.lines.len(), 3);
        assert_eq!(run.range, blocks[1].range.start..blocks[3].range.end);
    }

    #[test]
    fn test_run_crosses_containers() {
        let doc = Node::doc(vec![
            Node::blockquote(vec![Node::plain_paragraph("| a |")]),
            Node::plain_paragraph("| --- |"),
        ]);
        let blocks = textblocks(&doc);
        let run = find_run(&doc, blocks[1].range.start + 1).unwrap();
        assert_eq!(run.lines, vec!["| a |", "| --- |"]);
    }

    #[test]
    fn test_run_stops_at_rule() {
        let doc = Node::doc(vec![
            Node::plain_paragraph("| a |"),
            Node::horizontal_rule(),
            Node::plain_paragraph("| --- |"),
            Node::plain_paragraph("| v |"),
        ]);
        let blocks = textblocks(&doc);
        let run = find_run(&doc, blocks[2].range.start + 1).unwrap();
        assert_eq!(run.lines, vec!["| --- |", "| v |"]);
        assert_eq!(run.range, blocks[1].range.start..blocks[2].range.end);
    }

    #[test]
    fn test_promotion_keeps_rule_between_rows() {
        let (mut handle, engine) = mounted(Node::doc(vec![
            Node::plain_paragraph("| a |"),
            Node::horizontal_rule(),
            Node::plain_paragraph("| --- |"),
            Node::plain_paragraph("| v |"),
        ]));
        let original = handle.get_structured().unwrap();
        engine.select_block(2);

        // the run after the rule starts with its separator
        let err = promote_at_cursor(&mut handle).unwrap_err();
        assert!(matches!(err, SyncError::Parse(TableParseError::SeparatorFirst)));
        assert_eq!(handle.get_structured().unwrap(), original);
    }

    #[test]
    fn test_promotion_keeps_existing_table() {
        let existing = parse_table("| x |\n| --- |\n| 1 |").unwrap().to_node();
        let (mut handle, engine) = mounted(Node::doc(vec![
            Node::plain_paragraph("| a |"),
            existing,
            Node::plain_paragraph("| --- |"),
        ]));
        let original = handle.get_structured().unwrap();
        let below = textblocks(&original).len() - 1;
        engine.select_block(below);

        let err = promote_at_cursor(&mut handle).unwrap_err();
        assert!(err.is_decline());
        let doc = handle.get_structured().unwrap();
        assert_eq!(doc, original);
        assert!(doc.content[1].is(kind::TABLE));
    }

    #[test]
    fn test_cursor_outside_table_text_declines() {
        let doc = paragraphs(&["intro", "| a |", "| --- |"]);
        assert_eq!(find_run(&doc, 1), Err(TableParseError::NotTableLike));
    }

    #[test]
    fn test_promote_replaces_run() {
        let (mut handle, engine) = mounted(paragraphs(&[
            "before",
            "| Name | Age |",
            "| --- | --- |",
            "| Alice | 30 |",
            "| Bob | 25 |",
            "after",
        ]));
        engine.select_block(1);

        let parsed = promote_at_cursor(&mut handle).unwrap();
        assert_eq!(parsed.header, vec!["Name", "Age"]);
        assert_eq!(parsed.rows, vec![vec!["Alice", "30"], vec!["Bob", "25"]]);

        let doc = handle.get_structured().unwrap();
        let kinds: Vec<_> = doc.content.iter().map(|n| n.kind.as_str()).collect();
        assert_eq!(kinds, vec![kind::PARAGRAPH, kind::TABLE, kind::PARAGRAPH]);
        assert_eq!(doc.content[2].plain_text(), "after");
    }

    #[test]
    fn test_missing_separator_leaves_document_alone() {
        let original = paragraphs(&["| Name | Age |", "| Alice | 30 |"]);
        let (mut handle, engine) = mounted(original.clone());
        engine.select_block(0);

        let err = promote_at_cursor(&mut handle).unwrap_err();
        assert!(matches!(err, SyncError::Parse(TableParseError::NoSeparator)));
        assert!(err.is_decline());
        assert_eq!(handle.get_structured().unwrap(), original);
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let (mut handle, engine) = mounted(paragraphs(&["| h |", "| --- |", "| v |"]));
        engine.select_block(0);
        promote_at_cursor(&mut handle).unwrap();
        let once = handle.get_structured().unwrap();

        engine.select_block(0);
        assert!(promote_at_cursor(&mut handle).is_err());
        assert_eq!(handle.get_structured().unwrap(), once);
    }

    #[test]
    fn test_no_table_schema_declines() {
        let engine = MemoryEngine::new().without_node(kind::TABLE);
        let mut handle = EditorHandle::new();
        handle.mount(Box::new(engine.clone()));
        handle.set_structured(paragraphs(&["| h |", "| --- |"])).unwrap();
        engine.select_block(0);
        assert!(matches!(
            promote_at_cursor(&mut handle),
            Err(SyncError::Parse(TableParseError::NoTableSchema))
        ));
    }

    #[test]
    fn test_read_only_declines() {
        let (mut handle, engine) = mounted(paragraphs(&["| h |", "| --- |"]));
        handle.set_editable(false).unwrap();
        engine.select_block(0);
        let err = promote_at_cursor(&mut handle).unwrap_err();
        assert!(err.is_decline());
    }

    #[test]
    fn test_promote_document() {
        let (mut handle, _engine) = mounted(paragraphs(&["| x | y |", "|---|---|", "| 1 | 2 |"]));
        let parsed = promote_document(&mut handle).unwrap();
        assert_eq!(parsed.rows, vec![vec!["1", "2"]]);
        let doc = handle.get_structured().unwrap();
        assert_eq!(doc.content.len(), 1);
        assert!(doc.content[0].is(kind::TABLE));

        assert!(matches!(
            promote_document(&mut handle),
            Err(SyncError::Parse(TableParseError::AlreadyTable))
        ));
    }

    #[test]
    fn test_paste_detection() {
        assert!(looks_like_pasted_table("| a | b |\n|---|---|\n| 1 | 2 |"));
        assert!(!looks_like_pasted_table("| a | b |\n| 1 | 2 |"));
        assert!(!looks_like_pasted_table("just words"));
    }

    #[test]
    fn test_paste_inserts_after_cursor_block() {
        let (mut handle, engine) = mounted(paragraphs(&["first", "second"]));
        engine.select_block(0);
        paste_markdown_table(&mut handle, "| a |\n|---|\n| 1 |").unwrap();

        let doc = handle.get_structured().unwrap();
        let kinds: Vec<_> = doc.content.iter().map(|n| n.kind.as_str()).collect();
        assert_eq!(kinds, vec![kind::PARAGRAPH, kind::TABLE, kind::PARAGRAPH]);
    }

    #[test]
    fn test_paste_inside_list_lands_after_the_list() {
        let list = Node::bullet_list(vec![
            Node::list_item(vec![Node::plain_paragraph("one")]),
            Node::list_item(vec![Node::plain_paragraph("two")]),
        ]);
        let (mut handle, engine) = mounted(Node::doc(vec![list.clone(), Node::plain_paragraph("after")]));
        engine.select_block(0);
        paste_markdown_table(&mut handle, "| a |\n|---|\n| 1 |").unwrap();

        let doc = handle.get_structured().unwrap();
        let kinds: Vec<_> = doc.content.iter().map(|n| n.kind.as_str()).collect();
        assert_eq!(kinds, vec![kind::BULLET_LIST, kind::TABLE, kind::PARAGRAPH]);
        assert_eq!(doc.content[0], list);
    }

    #[test]
    fn test_plain_paste_declines() {
        let (mut handle, _engine) = mounted(paragraphs(&["first"]));
        let err = paste_markdown_table(&mut handle, "no table here").unwrap_err();
        assert!(matches!(err, SyncError::Parse(TableParseError::NotPastedTable)));
    }
}
