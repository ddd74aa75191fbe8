//! Linear positions over the structured tree.
//!
//! Positions follow the usual rich-text engine convention: entering or
//! leaving a non-leaf node costs one position, each text character costs
//! one, and content-less leaves (rules, breaks) cost one. Position 0 is the
//! start of the document's content.

use std::ops::Range;

use thiserror::Error;

use super::types::{Node, kind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("Range {start}..{end} lies outside the document (size {size})")]
    OutOfBounds { start: usize, end: usize, size: usize },

    #[error("Position {0} is not on a block boundary")]
    NotBlockBoundary(usize),

    #[error("Range {start}..{end} is not inside a single text block")]
    NotInsideTextblock { start: usize, end: usize },
}

/// A text-bearing block and where it sits in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Textblock {
    /// Position before the block's opening token to position after its closing token
    pub range: Range<usize>,
    /// Inline text of the block
    pub text: String,
    /// Types of the enclosing nodes below the document, outermost first
    pub ancestors: Vec<String>,
    /// A non-text block (a rule, an image) sits between this block and the
    /// previous text block
    pub after_gap: bool,
}

impl Textblock {
    /// Whether any enclosing node has the given type.
    pub fn is_inside(&self, kind: &str) -> bool {
        self.ancestors.iter().any(|k| k == kind)
    }

    /// Whether a cursor position falls inside this block's content.
    pub const fn contains(&self, pos: usize) -> bool {
        self.range.start < pos && pos < self.range.end
    }
}

/// Number of positions a node occupies.
pub fn node_size(node: &Node) -> usize {
    if let Some(text) = &node.text {
        return text.chars().count();
    }
    if node.is_leaf() {
        return 1;
    }
    content_size(node) + 2
}

/// Number of positions occupied by a node's children.
pub fn content_size(node: &Node) -> usize {
    node.content.iter().map(node_size).sum()
}

/// Every text-bearing block in document order, at any depth.
pub fn textblocks(doc: &Node) -> Vec<Textblock> {
    let mut out = Vec::new();
    let mut ancestors = Vec::new();
    let mut gap = false;
    collect_textblocks(doc, 0, &mut ancestors, &mut gap, &mut out);
    out
}

fn collect_textblocks(
    node: &Node,
    content_start: usize,
    ancestors: &mut Vec<String>,
    gap: &mut bool,
    out: &mut Vec<Textblock>,
) {
    let mut pos = content_start;
    for child in &node.content {
        let size = node_size(child);
        if child.is_textblock() {
            out.push(Textblock {
                range: pos..pos + size,
                text: child.inline_text(),
                ancestors: ancestors.clone(),
                after_gap: std::mem::take(gap),
            });
        } else if child.is_leaf() {
            *gap = true;
        } else if !child.is_text() {
            ancestors.push(child.kind.clone());
            collect_textblocks(child, pos + 1, ancestors, gap, out);
            ancestors.pop();
        }
        pos += size;
    }
}

/// Replace every block inside `range` with `nodes`.
///
/// `range.start` must sit on a block boundary; the replacement is inserted
/// there, at whatever depth that boundary lives. Blocks only partly covered
/// by the range are descended into, and containers left empty are removed.
/// An empty range inserts without removing anything.
///
/// When `nodes` are all inline (text, breaks, images) the range must
/// instead lie inside one text block, and the nodes are spliced into its
/// text. On error the input document is not touched.
pub fn replace_range(doc: &Node, range: Range<usize>, nodes: Vec<Node>) -> Result<Node, PositionError> {
    let size = content_size(doc);
    if range.start > range.end || range.end > size {
        return Err(PositionError::OutOfBounds {
            start: range.start,
            end: range.end,
            size,
        });
    }

    let inline = !nodes.is_empty() && nodes.iter().all(is_inline);
    let mut updated = doc.clone();
    let mut pending = Some(nodes);
    if inline {
        splice_in(&mut updated, 0, &range, &mut pending);
        if pending.is_some() {
            return Err(PositionError::NotInsideTextblock {
                start: range.start,
                end: range.end,
            });
        }
        return Ok(updated);
    }

    replace_in(&mut updated, 0, &range, &mut pending);
    if pending.is_some() {
        return Err(PositionError::NotBlockBoundary(range.start));
    }
    Ok(updated)
}

fn is_inline(node: &Node) -> bool {
    node.is_text() || node.is(kind::HARD_BREAK) || node.is(kind::IMAGE)
}

/// Find the text block holding `range` and splice the pending nodes in.
fn splice_in(node: &mut Node, content_start: usize, range: &Range<usize>, pending: &mut Option<Vec<Node>>) {
    let mut pos = content_start;
    for child in &mut node.content {
        let end = pos + node_size(child);
        if pos < range.start && range.end < end {
            if child.is_textblock() {
                if let Some(nodes) = pending.take() {
                    splice_inline(child, range.start - pos - 1..range.end - pos - 1, nodes);
                }
            } else if !child.is_text() && !child.is_leaf() {
                splice_in(child, pos + 1, range, pending);
            }
            return;
        }
        pos = end;
    }
}

/// Replace `offsets` (relative to the block's content) with `nodes`,
/// splitting text runs at the edges.
fn splice_inline(block: &mut Node, offsets: Range<usize>, nodes: Vec<Node>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut pos = 0;
    for child in std::mem::take(&mut block.content) {
        let end = pos + node_size(&child);
        if end <= offsets.start {
            before.push(child);
        } else if pos >= offsets.end {
            after.push(child);
        } else if let Some(text) = child.text.as_deref() {
            if pos < offsets.start {
                let head: String = text.chars().take(offsets.start - pos).collect();
                before.push(Node::marked_text(&head, child.marks.clone()));
            }
            if end > offsets.end {
                let tail: String = text.chars().skip(offsets.end - pos).collect();
                after.push(Node::marked_text(&tail, child.marks.clone()));
            }
        }
        pos = end;
    }
    before.extend(nodes);
    before.extend(after);
    block.content = before;
    *block = block.normalized();
}

fn replace_in(
    node: &mut Node,
    content_start: usize,
    range: &Range<usize>,
    pending: &mut Option<Vec<Node>>,
) {
    let mut pos = content_start;
    let mut kept = Vec::with_capacity(node.content.len());

    for mut child in std::mem::take(&mut node.content) {
        let size = node_size(&child);
        let end = pos + size;
        let covered = range.start <= pos && end <= range.end && !range.is_empty();

        if pos == range.start
            && (covered || range.is_empty())
            && let Some(nodes) = pending.take()
        {
            kept.extend(nodes);
        }

        if covered {
            pos = end;
            continue;
        }

        let overlaps = pos < range.end && range.start < end;
        let touches_inside = range.is_empty() && pos < range.start && range.start < end;
        if (overlaps || touches_inside) && !child.is_text() && !child.is_leaf() && !child.is_textblock() {
            replace_in(&mut child, pos + 1, range, pending);
            if child.content.is_empty() {
                pos = end;
                continue;
            }
        }
        kept.push(child);
        pos = end;
    }

    if pos == range.start
        && let Some(nodes) = pending.take()
    {
        kept.extend(nodes);
    }
    node.content = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str) -> Node {
        Node::plain_paragraph(text)
    }

    #[test]
    fn test_node_sizes() {
        assert_eq!(node_size(&Node::text("abc")), 3);
        assert_eq!(node_size(&Node::horizontal_rule()), 1);
        assert_eq!(node_size(&para("abc")), 5);
        assert_eq!(node_size(&para("")), 2);
    }

    #[test]
    fn test_textblocks_cross_container_boundaries() {
        let doc = Node::doc(vec![
            para("one"),
            Node::blockquote(vec![para("two")]),
            para("three"),
        ]);
        let blocks = textblocks(&doc);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].range, 0..5);
        // blockquote opens at 5, paragraph inside starts at 6
        assert_eq!(blocks[1].range, 6..11);
        assert_eq!(blocks[2].range, 12..19);
        assert_eq!(blocks[2].text, "three");
        assert!(blocks[1].is_inside(crate::document::kind::BLOCKQUOTE));
        assert!(blocks[2].ancestors.is_empty());
        assert!(blocks.iter().all(|b| !b.after_gap));
    }

    #[test]
    fn test_rule_between_blocks_marks_a_gap() {
        let doc = Node::doc(vec![para("one"), Node::horizontal_rule(), para("two"), para("three")]);
        let gaps: Vec<_> = textblocks(&doc).iter().map(|b| b.after_gap).collect();
        assert_eq!(gaps, vec![false, true, false]);
    }

    #[test]
    fn test_replace_range_swaps_top_level_blocks() {
        let doc = Node::doc(vec![para("a"), para("b"), para("c")]);
        // blocks: a=0..3, b=3..6, c=6..9
        let out = replace_range(&doc, 3..9, vec![Node::horizontal_rule()]).unwrap();
        assert_eq!(out.content.len(), 2);
        assert!(out.content[1].is(crate::document::kind::HORIZONTAL_RULE));
    }

    #[test]
    fn test_replace_range_drops_emptied_containers() {
        let doc = Node::doc(vec![
            para("keep"),
            Node::blockquote(vec![para("x")]),
            para("y"),
        ]);
        let blocks = textblocks(&doc);
        let range = blocks[1].range.start..blocks[2].range.end;
        let out = replace_range(&doc, range, vec![para("new")]).unwrap();
        // the replacement lands inside the blockquote where the range started
        assert_eq!(out.content.len(), 2);
        assert_eq!(out.content[1].content[0].inline_text(), "new");
    }

    #[test]
    fn test_replace_range_rejects_mid_block_start() {
        let doc = Node::doc(vec![para("abc")]);
        let err = replace_range(&doc, 1..5, vec![para("x")]).unwrap_err();
        assert_eq!(err, PositionError::NotBlockBoundary(1));
    }

    #[test]
    fn test_empty_range_inserts_after_block() {
        let doc = Node::doc(vec![para("a"), para("b")]);
        let out = replace_range(&doc, 3..3, vec![para("mid")]).unwrap();
        let texts: Vec<_> = out.content.iter().map(Node::inline_text).collect();
        assert_eq!(texts, vec!["a", "mid", "b"]);
    }

    #[test]
    fn test_empty_range_at_document_end_appends() {
        let doc = Node::doc(vec![para("a")]);
        let out = replace_range(&doc, 3..3, vec![para("z")]).unwrap();
        assert_eq!(out.content.len(), 2);
    }

    #[test]
    fn test_inline_nodes_splice_into_text() {
        let doc = Node::doc(vec![para("a"), para("hello @wor")]);
        // second paragraph opens at 3, its text starts at 4
        let link = Node::marked_text("World", vec![crate::document::Mark::link("/notes/2")]);
        let out = replace_range(&doc, 10..14, vec![link.clone()]).unwrap();
        let inlines = &out.content[1].content;
        assert_eq!(inlines.len(), 2);
        assert_eq!(inlines[0].text.as_deref(), Some("hello "));
        assert_eq!(inlines[1], link);
        assert_eq!(out.content[0], doc.content[0]);
    }

    #[test]
    fn test_inline_insert_inside_list_item() {
        let doc = Node::doc(vec![Node::bullet_list(vec![Node::list_item(vec![para("ab")])])]);
        let block = &textblocks(&doc)[0];
        let at = block.range.start + 2;
        let out = replace_range(&doc, at..at, vec![Node::text("X")]).unwrap();
        assert_eq!(out.content[0].content[0].content[0].inline_text(), "aXb");
    }

    #[test]
    fn test_inline_nodes_need_a_text_block() {
        let doc = Node::doc(vec![para("a"), para("b")]);
        assert_eq!(
            replace_range(&doc, 3..3, vec![Node::text("x")]),
            Err(PositionError::NotInsideTextblock { start: 3, end: 3 })
        );
    }

    #[test]
    fn test_out_of_bounds_range() {
        let doc = Node::doc(vec![para("a")]);
        assert!(matches!(
            replace_range(&doc, 0..10, Vec::new()),
            Err(PositionError::OutOfBounds { .. })
        ));
    }
}
