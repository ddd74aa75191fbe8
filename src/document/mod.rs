//! Note content model.
//!
//! This module handles:
//! - The structured tree the editor works on
//! - Parsing Markdown into that tree with comrak
//! - Serializing the tree back to Markdown
//! - Sniffing which of the two a stored note holds

mod format;
mod markdown;
mod parser;
mod position;
mod types;

pub use format::{ContentFormat, decode_content, detect_format, encode_content};
pub use markdown::to_markdown;
pub use parser::parse;
pub use position::{PositionError, Textblock, content_size, node_size, replace_range, textblocks};
pub use types::{Mark, Node, kind, mark};

/// Characters of visible text, ignoring markup.
pub fn visible_text(doc: &Node) -> String {
    doc.plain_text()
}
