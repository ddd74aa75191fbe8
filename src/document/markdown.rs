//! Structured tree to Markdown conversion.
//!
//! Block mapping: paragraphs become lines, headings `#` prefixes, lists
//! `-` / `1.` / `- [ ]` lines nested by indentation, code blocks fences with
//! a language tag, blockquotes `>` prefixes, rules `---` and tables pipe
//! rows with a `---` separator after the header. Inline marks nest as marker
//! pairs in a fixed outer-to-inner order (link, bold, italic, strike,
//! underline, code). Hard breaks are `\` line ends, or `<br>` where the
//! block has to stay on one line (headings, table cells).

use crate::error::{Result, SyncError};

use super::types::{Mark, Node, kind, mark};

/// Characters escaped in running text.
const ESCAPED: &[char] = &[
    '\\', '`', '*', '_', '[', ']', '<', '>', '#', '~', '|', '&',
];

/// Serialize a document node by node.
///
/// # Errors
/// Returns [`SyncError::Serialization`] when the tree holds a block or inline
/// node this converter has no mapping for.
pub fn to_markdown(doc: &Node) -> Result<String> {
    let blocks = doc
        .content
        .iter()
        .map(block_to_markdown)
        .collect::<Result<Vec<_>>>()?;
    Ok(blocks.join("\n\n"))
}

fn block_to_markdown(node: &Node) -> Result<String> {
    match node.kind.as_str() {
        kind::PARAGRAPH => Ok(escape_line_starts(&inline_to_markdown(&node.content, false)?)),
        kind::HEADING => {
            let level = node.attr_u64("level").unwrap_or(1).clamp(1, 6);
            let hashes = "#".repeat(usize::try_from(level).unwrap_or(1));
            let text = inline_to_markdown(&node.content, true)?;
            Ok(format!("{hashes} {}", protect_leading_whitespace(&text)))
        }
        kind::CODE_BLOCK => Ok(code_block_to_markdown(node)),
        kind::BLOCKQUOTE => {
            let inner = to_markdown(node)?;
            Ok(prefix_lines(&inner, "> ", ">"))
        }
        kind::HORIZONTAL_RULE => Ok("---".to_string()),
        kind::BULLET_LIST | kind::ORDERED_LIST | kind::TASK_LIST => list_to_markdown(node),
        kind::TABLE => table_to_markdown(node),
        other => Err(SyncError::Serialization {
            node_type: other.to_string(),
        }),
    }
}

fn code_block_to_markdown(node: &Node) -> String {
    let code = node.inline_text();
    let longest_run = longest_char_run(&code, '`');
    let fence = "`".repeat(longest_run.max(2) + 1);
    let language = node.attr_str("language").unwrap_or("");
    if code.is_empty() {
        format!("{fence}{language}\n{fence}")
    } else {
        format!("{fence}{language}\n{code}\n{fence}")
    }
}

fn list_to_markdown(list: &Node) -> Result<String> {
    let start = list.attr_u64("start").unwrap_or(1);
    let mut items = Vec::with_capacity(list.content.len());

    for (index, item) in list.content.iter().enumerate() {
        let (marker, indent) = match list.kind.as_str() {
            kind::ORDERED_LIST => {
                let marker = format!("{}. ", start + index as u64);
                let width = marker.len();
                (marker, width)
            }
            kind::TASK_LIST => {
                let checked = item.attr_bool("checked").unwrap_or(false);
                let marker = if checked { "- [x] " } else { "- [ ] " };
                (marker.to_string(), 2)
            }
            _ => ("- ".to_string(), 2),
        };

        let body = list_item_body(item)?;
        if body.is_empty() {
            items.push(marker.trim_end().to_string());
            continue;
        }
        let pad = " ".repeat(indent);
        let mut lines = body.lines();
        let mut rendered = format!("{marker}{}", lines.next().unwrap_or_default());
        for line in lines {
            rendered.push('\n');
            if !line.is_empty() {
                rendered.push_str(&pad);
                rendered.push_str(line);
            }
        }
        items.push(rendered);
    }
    Ok(items.join("\n"))
}

fn list_item_body(item: &Node) -> Result<String> {
    let mut body = String::new();
    for (index, block) in item.content.iter().enumerate() {
        if index > 0 {
            let nested_list = matches!(
                block.kind.as_str(),
                kind::BULLET_LIST | kind::ORDERED_LIST | kind::TASK_LIST
            );
            body.push_str(if nested_list { "\n" } else { "\n\n" });
        }
        body.push_str(&block_to_markdown(block)?);
    }
    Ok(body)
}

fn table_to_markdown(table: &Node) -> Result<String> {
    let mut lines = Vec::with_capacity(table.content.len() + 1);
    for (index, row) in table.content.iter().enumerate() {
        let cells = row
            .content
            .iter()
            .map(cell_to_markdown)
            .collect::<Result<Vec<_>>>()?;
        lines.push(format!("| {} |", cells.join(" | ")));
        if index == 0 {
            let separator = vec!["---"; cells.len().max(1)];
            lines.push(format!("| {} |", separator.join(" | ")));
        }
    }
    Ok(lines.join("\n"))
}

fn cell_to_markdown(cell: &Node) -> Result<String> {
    let parts = cell
        .content
        .iter()
        .map(|block| {
            if block.is_textblock() {
                inline_to_markdown(&block.content, true)
            } else {
                Ok(escape_text(&block.plain_text()))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(" "))
}

/// Serialize inline content, opening and closing markers as marks change.
fn inline_to_markdown(nodes: &[Node], single_line: bool) -> Result<String> {
    let holder = Node::paragraph(nodes.to_vec()).normalized();
    let mut out = String::new();
    let mut open: Vec<Mark> = Vec::new();
    let mut trailing = String::new();

    for node in &holder.content {
        if node.is(kind::HARD_BREAK) {
            close_marks(&mut out, &mut open, 0);
            out.push_str(&trailing);
            trailing.clear();
            out.push_str(if single_line { "<br>" } else { "\\\n" });
            continue;
        }
        if node.is(kind::IMAGE) {
            close_marks(&mut out, &mut open, 0);
            out.push_str(&trailing);
            trailing.clear();
            let alt = node.attr_str("alt").unwrap_or("");
            let src = node.attr_str("src").unwrap_or("");
            out.push_str(&format!("![{}]({src})", escape_text(alt)));
            continue;
        }
        let Some(text) = node.text.as_deref() else {
            return Err(SyncError::Serialization {
                node_type: node.kind.clone(),
            });
        };

        let is_code = node.has_mark(mark::CODE);
        let wanted: Vec<Mark> = node
            .marks
            .iter()
            .filter(|m| m.kind != mark::CODE && is_known_mark(m))
            .cloned()
            .collect();
        let keep = open
            .iter()
            .zip(&wanted)
            .take_while(|(a, b)| a == b)
            .count();

        close_marks(&mut out, &mut open, keep);
        out.push_str(&trailing);
        trailing.clear();

        let (lead, core, trail) = split_outer_whitespace(text);
        if core.is_empty() {
            trailing.push_str(text);
            continue;
        }
        out.push_str(lead);
        for m in &wanted[keep..] {
            out.push_str(open_marker(m));
            open.push(m.clone());
        }
        if is_code {
            out.push_str(&code_span(core));
        } else {
            out.push_str(&escape_text(core));
        }
        trailing.push_str(trail);
    }

    close_marks(&mut out, &mut open, 0);
    out.push_str(&trailing);
    Ok(out)
}

fn is_known_mark(m: &Mark) -> bool {
    matches!(
        m.kind.as_str(),
        mark::LINK | mark::BOLD | mark::ITALIC | mark::STRIKE | mark::UNDERLINE
    )
}

fn open_marker(m: &Mark) -> &'static str {
    match m.kind.as_str() {
        mark::LINK => "[",
        mark::BOLD => "**",
        mark::ITALIC => "*",
        mark::STRIKE => "~~",
        mark::UNDERLINE => "<u>",
        _ => "",
    }
}

fn close_marks(out: &mut String, open: &mut Vec<Mark>, keep: usize) {
    while open.len() > keep {
        let Some(m) = open.pop() else { break };
        match m.kind.as_str() {
            mark::LINK => {
                out.push_str("](");
                out.push_str(m.href().unwrap_or(""));
                out.push(')');
            }
            mark::BOLD => out.push_str("**"),
            mark::ITALIC => out.push('*'),
            mark::STRIKE => out.push_str("~~"),
            mark::UNDERLINE => out.push_str("</u>"),
            _ => {}
        }
    }
}

fn code_span(code: &str) -> String {
    let ticks = "`".repeat(longest_char_run(code, '`') + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{ticks} {code} {ticks}")
    } else {
        format!("{ticks}{code}{ticks}")
    }
}

fn split_outer_whitespace(text: &str) -> (&str, &str, &str) {
    let trimmed_start = text.trim_start();
    let lead = &text[..text.len() - trimmed_start.len()];
    let core = trimmed_start.trim_end();
    let trail = &trimmed_start[core.len()..];
    (lead, core, trail)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ESCAPED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Leading blanks are dropped (or read as indentation) by the parser, so
/// they go out as character references.
fn protect_leading_whitespace(line: &str) -> String {
    let rest = line.trim_start_matches([' ', '\t']);
    let mut out = String::with_capacity(line.len() + 8);
    for ch in line[..line.len() - rest.len()].chars() {
        out.push_str(if ch == '\t' { "&#9;" } else { "&#32;" });
    }
    out.push_str(rest);
    out
}

/// Escape characters that would turn a line into a list item, rule or
/// indented code.
fn escape_line_starts(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with([' ', '\t']) {
                return protect_leading_whitespace(line);
            }
            if line.starts_with(['-', '+', '=']) {
                return format!("\\{line}");
            }
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            if digits > 0 && line[digits..].starts_with(['.', ')']) {
                return format!("{}\\{}", &line[..digits], &line[digits..]);
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix_lines(text: &str, prefix: &str, empty_prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                empty_prefix.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn longest_char_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold(text: &str) -> Node {
        Node::marked_text(text, vec![Mark::new(mark::BOLD)])
    }

    #[test]
    fn test_heading_levels() {
        let doc = Node::doc(vec![
            Node::heading(1, vec![Node::text("One")]),
            Node::heading(3, vec![Node::text("Three")]),
        ]);
        assert_eq!(to_markdown(&doc).unwrap(), "# One\n\n### Three");
    }

    #[test]
    fn test_marks_nest_as_marker_pairs() {
        let doc = Node::doc(vec![Node::paragraph(vec![
            Node::text("plain "),
            bold("bold"),
            Node::text(" "),
            Node::marked_text("both", vec![Mark::new(mark::BOLD), Mark::new(mark::ITALIC)]),
            Node::text(" "),
            Node::marked_text("gone", vec![Mark::new(mark::STRIKE)]),
            Node::text(" "),
            Node::marked_text("under", vec![Mark::new(mark::UNDERLINE)]),
            Node::text(" "),
            Node::marked_text("x + 1", vec![Mark::new(mark::CODE)]),
            Node::text(" "),
            Node::marked_text("site", vec![Mark::link("https://example.com")]),
        ])]);
        assert_eq!(
            to_markdown(&doc).unwrap(),
            "plain **bold** ***both*** ~~gone~~ <u>under</u> `x + 1` [site](https://example.com)"
        );
    }

    #[test]
    fn test_shared_marks_stay_open_across_runs() {
        let doc = Node::doc(vec![Node::paragraph(vec![
            bold("a "),
            Node::marked_text("b", vec![Mark::new(mark::BOLD), Mark::new(mark::ITALIC)]),
        ])]);
        assert_eq!(to_markdown(&doc).unwrap(), "**a *b***");
    }

    #[test]
    fn test_whitespace_moves_outside_markers() {
        let doc = Node::doc(vec![Node::paragraph(vec![
            bold(" padded "),
            Node::text("tail"),
        ])]);
        assert_eq!(to_markdown(&doc).unwrap(), "&#32;**padded** tail");
    }

    #[test]
    fn test_leading_blanks_become_references() {
        let doc = Node::doc(vec![
            Node::plain_paragraph(" - not a list"),
            Node::plain_paragraph("    four spaces"),
        ]);
        assert_eq!(
            to_markdown(&doc).unwrap(),
            "&#32;- not a list\n\n&#32;&#32;&#32;&#32;four spaces"
        );
    }

    #[test]
    fn test_heading_break_stays_on_one_line() {
        let doc = Node::doc(vec![Node::heading(
            2,
            vec![Node::text("a"), Node::hard_break(), Node::text("b")],
        )]);
        assert_eq!(to_markdown(&doc).unwrap(), "## a<br>b");
    }

    #[test]
    fn test_nested_lists_indent_by_depth() {
        let doc = Node::doc(vec![Node::bullet_list(vec![
            Node::list_item(vec![
                Node::plain_paragraph("one"),
                Node::bullet_list(vec![Node::list_item(vec![Node::plain_paragraph("nested")])]),
            ]),
            Node::list_item(vec![Node::plain_paragraph("two")]),
        ])]);
        assert_eq!(to_markdown(&doc).unwrap(), "- one\n  - nested\n- two");
    }

    #[test]
    fn test_ordered_and_task_lists() {
        let doc = Node::doc(vec![
            Node::ordered_list(
                1,
                vec![
                    Node::list_item(vec![Node::plain_paragraph("first")]),
                    Node::list_item(vec![Node::plain_paragraph("second")]),
                ],
            ),
            Node::task_list(vec![
                Node::task_item(false, vec![Node::plain_paragraph("todo")]),
                Node::task_item(true, vec![Node::plain_paragraph("done")]),
            ]),
        ]);
        assert_eq!(
            to_markdown(&doc).unwrap(),
            "1. first\n2. second\n\n- [ ] todo\n- [x] done"
        );
    }

    #[test]
    fn test_code_block_with_language() {
        let doc = Node::doc(vec![Node::code_block(Some("rust"), "fn main() {}")]);
        assert_eq!(to_markdown(&doc).unwrap(), "```rust\nfn main() {}\n```");
    }

    #[test]
    fn test_code_block_fence_grows_past_inner_backticks() {
        let doc = Node::doc(vec![Node::code_block(None, "```\ninner\n```")]);
        assert!(to_markdown(&doc).unwrap().starts_with("````\n"));
    }

    #[test]
    fn test_blockquote_and_rule() {
        let doc = Node::doc(vec![
            Node::blockquote(vec![Node::plain_paragraph("a"), Node::plain_paragraph("b")]),
            Node::horizontal_rule(),
        ]);
        assert_eq!(to_markdown(&doc).unwrap(), "> a\n>\n> b\n\n---");
    }

    #[test]
    fn test_table_gets_separator_after_header() {
        let doc = Node::doc(vec![Node::table(vec![
            Node::table_row(vec![
                Node::table_cell(true, Node::plain_paragraph("Name")),
                Node::table_cell(true, Node::plain_paragraph("Age")),
            ]),
            Node::table_row(vec![
                Node::table_cell(false, Node::plain_paragraph("Alice")),
                Node::table_cell(false, Node::plain_paragraph("30")),
            ]),
        ])]);
        assert_eq!(
            to_markdown(&doc).unwrap(),
            "| Name | Age |\n| --- | --- |\n| Alice | 30 |"
        );
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let doc = Node::doc(vec![
            Node::plain_paragraph("2*3 | a_b"),
            Node::plain_paragraph("- not a list"),
            Node::plain_paragraph("1. not ordered"),
        ]);
        assert_eq!(
            to_markdown(&doc).unwrap(),
            "2\\*3 \\| a\\_b\n\n\\- not a list\n\n1\\. not ordered"
        );
    }

    #[test]
    fn test_unknown_block_is_a_serialization_failure() {
        let doc = Node::doc(vec![Node::new("mention")]);
        let err = to_markdown(&doc).unwrap_err();
        assert!(matches!(err, SyncError::Serialization { node_type } if node_type == "mention"));
    }
}
