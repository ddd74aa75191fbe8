//! Pipe-table line classification and parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::Node;

use super::TableParseError;

static PIPE_ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\|.*\|$").expect("valid pipe row pattern"));

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|?\s*:?-{3,}").expect("valid separator pattern"));

/// Whether one trimmed line looks like part of a pipe table.
pub fn is_table_line(line: &str) -> bool {
    let line = line.trim();
    PIPE_ROW.is_match(line) || is_separator(line)
}

/// Whether a line is a header/body separator (`| --- | :--- |`).
pub fn is_separator(line: &str) -> bool {
    SEPARATOR.is_match(line.trim())
}

/// Whether a block's text is table-like: at least one non-empty line, and
/// every non-empty line classifies.
pub fn is_table_block(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    lines.peek().is_some() && lines.all(is_table_line)
}

/// A parsed pipe table. Rows are padded to a common width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn columns(&self) -> usize {
        self.header.len()
    }

    /// Build a table node: one header row, then the body rows, every cell a
    /// single plain paragraph.
    pub fn to_node(&self) -> Node {
        let header = Node::table_row(
            self.header
                .iter()
                .map(|cell| Node::table_cell(true, Node::plain_paragraph(cell)))
                .collect(),
        );
        let body = self.rows.iter().map(|row| {
            Node::table_row(
                row.iter()
                    .map(|cell| Node::table_cell(false, Node::plain_paragraph(cell)))
                    .collect(),
            )
        });
        Node::table(std::iter::once(header).chain(body).collect())
    }
}

/// Parse pipe-table text.
///
/// Blank lines are dropped. The first separator line splits the header
/// (the line right before it) from the body (every line after it); lines
/// above the header are ignored. Short rows are padded with empty cells
/// to the widest row.
pub fn parse_table(text: &str) -> Result<ParsedTable, TableParseError> {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let separator = lines
        .iter()
        .position(|l| is_separator(l))
        .ok_or(TableParseError::NoSeparator)?;
    if separator == 0 {
        return Err(TableParseError::SeparatorFirst);
    }

    let mut header = split_row(lines[separator - 1]);
    if header.iter().all(String::is_empty) {
        return Err(TableParseError::EmptyHeader);
    }
    let mut rows: Vec<Vec<String>> = lines[separator + 1..].iter().map(|l| split_row(l)).collect();

    let width = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
    header.resize(width, String::new());
    for row in &mut rows {
        row.resize(width, String::new());
    }

    Ok(ParsedTable { header, rows })
}

/// Split one row on `|`, dropping a single leading and trailing pipe.
fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}
