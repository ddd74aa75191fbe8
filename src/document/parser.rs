//! Markdown parsing with comrak.

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{Arena, Options, parse_document};

use super::types::{Mark, Node, kind, mark};

/// Parse markdown source into a structured document.
///
/// # Example
///
/// ```
/// use notesync::document::{Node, parse};
///
/// let doc = parse("# Hello\n\nWorld");
/// assert_eq!(doc.content.len(), 2);
/// assert!(doc.content[0].is("heading"));
/// ```
pub fn parse(source: &str) -> Node {
    let arena = Arena::new();
    let options = create_options();
    let root = parse_document(&arena, source, &options);

    let mut blocks = Vec::new();
    for child in root.children() {
        process_block(child, &mut blocks);
    }
    if blocks.is_empty() {
        blocks.push(Node::paragraph(Vec::new()));
    }
    Node::doc(blocks).normalized()
}

fn create_options() -> Options {
    let mut options = Options::default();

    // GFM extensions the editor schema has nodes for
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.tasklist = true;

    options
}

fn process_block<'a>(node: &'a AstNode<'a>, out: &mut Vec<Node>) {
    match &node.data.borrow().value {
        NodeValue::Paragraph => {
            out.push(Node::paragraph(collect_inlines(node)));
        }

        NodeValue::Heading(heading) => {
            out.push(Node::heading(heading.level, collect_inlines(node)));
        }

        NodeValue::CodeBlock(code_block) => {
            let language = code_block
                .info
                .split_whitespace()
                .next()
                .filter(|s| !s.is_empty());
            let literal = code_block
                .literal
                .strip_suffix('\n')
                .unwrap_or(&code_block.literal);
            out.push(Node::code_block(language, literal));
        }

        NodeValue::List(list) => {
            let items: Vec<Node> = node.children().filter_map(process_item).collect();
            let is_task = node
                .children()
                .any(|child| matches!(child.data.borrow().value, NodeValue::TaskItem(_)));
            let list_node = if is_task {
                Node::task_list(items)
            } else {
                match list.list_type {
                    ListType::Bullet => Node::bullet_list(items),
                    ListType::Ordered => Node::ordered_list(list.start as u64, items),
                }
            };
            out.push(list_node);
        }

        NodeValue::BlockQuote => {
            out.push(Node::blockquote(collect_blocks(node)));
        }

        NodeValue::ThematicBreak => {
            out.push(Node::horizontal_rule());
        }

        NodeValue::Table(_) => {
            let rows = node
                .children()
                .filter_map(|row| {
                    let NodeValue::TableRow(header) = row.data.borrow().value else {
                        return None;
                    };
                    let cells = row
                        .children()
                        .filter(|cell| matches!(cell.data.borrow().value, NodeValue::TableCell))
                        .map(|cell| Node::table_cell(header, Node::paragraph(collect_inlines(cell))))
                        .collect();
                    Some(Node::table_row(cells))
                })
                .collect();
            out.push(Node::table(rows));
        }

        NodeValue::HtmlBlock(html) => {
            out.push(Node::plain_paragraph(html.literal.trim_end()));
        }

        _ => {
            // Process children for unhandled nodes
            for child in node.children() {
                process_block(child, out);
            }
        }
    }
}

fn process_item<'a>(node: &'a AstNode<'a>) -> Option<Node> {
    match &node.data.borrow().value {
        NodeValue::Item(_) => Some(Node::list_item(collect_blocks(node))),
        NodeValue::TaskItem(symbol) => Some(Node::task_item(symbol.is_some(), collect_blocks(node))),
        _ => None,
    }
}

fn collect_blocks<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    let mut blocks = Vec::new();
    for child in node.children() {
        process_block(child, &mut blocks);
    }
    blocks
}

/// Inline state that outlives a single AST node.
///
/// Underline arrives as sibling `<u>` / `</u>` HTML tags rather than as a
/// wrapping node.
#[derive(Debug, Default)]
struct InlineState {
    underline: bool,
}

fn collect_inlines<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    let mut inlines = Vec::new();
    let mut state = InlineState::default();
    for child in node.children() {
        collect_inlines_recursive(child, &[], &mut state, &mut inlines);
    }
    inlines
}

fn collect_inlines_recursive<'a>(
    node: &'a AstNode<'a>,
    marks: &[Mark],
    state: &mut InlineState,
    out: &mut Vec<Node>,
) {
    let with = |extra: Mark| {
        let mut next = marks.to_vec();
        next.push(extra);
        next
    };

    match &node.data.borrow().value {
        NodeValue::Text(t) => {
            out.push(Node::marked_text(t, current_marks(marks, state)));
        }
        NodeValue::Code(code) => {
            let mut code_marks = current_marks(marks, state);
            code_marks.push(Mark::new(mark::CODE));
            out.push(Node::marked_text(&code.literal, code_marks));
        }
        NodeValue::Emph => {
            let next = with(Mark::new(mark::ITALIC));
            for child in node.children() {
                collect_inlines_recursive(child, &next, state, out);
            }
        }
        NodeValue::Strong => {
            let next = with(Mark::new(mark::BOLD));
            for child in node.children() {
                collect_inlines_recursive(child, &next, state, out);
            }
        }
        NodeValue::Strikethrough => {
            let next = with(Mark::new(mark::STRIKE));
            for child in node.children() {
                collect_inlines_recursive(child, &next, state, out);
            }
        }
        NodeValue::Link(link) => {
            let next = with(Mark::link(&link.url));
            for child in node.children() {
                collect_inlines_recursive(child, &next, state, out);
            }
        }
        NodeValue::Image(image) => {
            let mut alt = String::new();
            extract_text_recursive(node, &mut alt);
            out.push(
                Node::new(kind::IMAGE)
                    .with_attr("src", image.url.clone())
                    .with_attr("alt", alt),
            );
        }
        NodeValue::HtmlInline(html) => match html.trim().to_ascii_lowercase().as_str() {
            "<u>" => state.underline = true,
            "</u>" => state.underline = false,
            "<br>" | "<br/>" | "<br />" => out.push(Node::hard_break()),
            _ => out.push(Node::marked_text(html, current_marks(marks, state))),
        },
        NodeValue::SoftBreak => {
            out.push(Node::marked_text(" ", current_marks(marks, state)));
        }
        NodeValue::LineBreak => {
            out.push(Node::hard_break());
        }
        _ => {
            for child in node.children() {
                collect_inlines_recursive(child, marks, state, out);
            }
        }
    }
}

fn current_marks(marks: &[Mark], state: &InlineState) -> Vec<Mark> {
    let mut all = marks.to_vec();
    if state.underline {
        all.push(Mark::new(mark::UNDERLINE));
    }
    all
}

fn extract_text_recursive<'a>(node: &'a AstNode<'a>, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => {
            text.push_str(t);
        }
        NodeValue::Code(c) => {
            text.push_str(&c.literal);
        }
        NodeValue::SoftBreak | NodeValue::LineBreak => {
            text.push(' ');
        }
        _ => {
            for child in node.children() {
                extract_text_recursive(child, text);
            }
        }
    }
}
