//! Capability interface of the rich-text engine the core drives.

use std::ops::Range;

use thiserror::Error;

use crate::document::{Node, PositionError};

/// Callback invoked after every user edit.
pub type UpdateListener = Box<dyn FnMut()>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("No editor is mounted")]
    NotMounted,

    #[error(transparent)]
    Range(#[from] PositionError),

    #[error("Editor schema has no `{0}` node")]
    UnsupportedSchema(String),

    #[error("Editor is read-only")]
    ReadOnly,
}

/// Payload for [`RichTextEngine::set_content`].
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Structured(Node),
    Markdown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetContentOptions {
    /// Fire update listeners as if the user had made the change
    pub emit_update: bool,
}

impl SetContentOptions {
    /// Options for programmatic loads that must not look like edits.
    pub const fn silent() -> Self {
        Self { emit_update: false }
    }
}

/// Serializer extension an engine can be fitted with.
pub trait MarkdownSerializer {
    /// `None` means the extension could not handle this document.
    fn serialize(&self, doc: &Node) -> Option<String>;
}

/// What the core needs from a rich-text engine.
///
/// Positions passed to and returned from the engine use the linear
/// coordinate space of [`crate::document::node_size`].
pub trait RichTextEngine {
    /// Snapshot of the current document.
    fn get_json(&self) -> Node;

    /// Replace the whole document.
    fn set_content(&mut self, content: Content, options: SetContentOptions) -> Result<(), EditorError>;

    fn set_editable(&mut self, editable: bool);

    fn is_editable(&self) -> bool;

    /// Register a listener fired after each user edit.
    fn on_update(&mut self, listener: UpdateListener);

    /// Drop every registered update listener.
    fn clear_listeners(&mut self);

    /// Markdown from the engine's own serializer extension, if it has one.
    fn serialize_markdown(&self, _doc: &Node) -> Option<String> {
        None
    }

    /// Cursor position (the head of the selection).
    fn selection_head(&self) -> usize;

    /// Whether the engine's schema has the given node type.
    fn supports_node(&self, _kind: &str) -> bool {
        true
    }

    /// Replace the blocks covering `range` as a single user edit.
    ///
    /// Fires update listeners and leaves the editor focused.
    fn replace_range(&mut self, range: Range<usize>, nodes: Vec<Node>) -> Result<(), EditorError>;
}
