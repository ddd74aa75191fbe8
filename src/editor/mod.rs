//! Rich-text engine boundary.
//!
//! The core never talks to a concrete editor library. It drives a
//! [`RichTextEngine`] through an [`EditorHandle`] that owns the mount
//! lifecycle and exposes the document as JSON or Markdown.

mod engine;
mod handle;
mod memory;

pub use engine::{Content, EditorError, MarkdownSerializer, RichTextEngine, SetContentOptions, UpdateListener};
pub use handle::{EditorHandle, markdown_with_fallback};
pub use memory::MemoryEngine;
