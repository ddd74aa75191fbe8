use std::ops::Range;

use tracing::{debug, warn};

use crate::document::{self, Node};

use super::engine::{Content, EditorError, RichTextEngine, SetContentOptions, UpdateListener};

/// The editing session's grip on a mounted engine.
///
/// Owned by whatever component mounts the editor; dropping or unmounting it
/// ends the session. Every adapter operation on an unmounted handle is a
/// no-op.
#[derive(Default)]
pub struct EditorHandle {
    engine: Option<Box<dyn RichTextEngine>>,
}

impl std::fmt::Debug for EditorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorHandle")
            .field("mounted", &self.is_ready())
            .finish()
    }
}

impl EditorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an engine, replacing (and detaching) any previous one.
    pub fn mount(&mut self, engine: Box<dyn RichTextEngine>) {
        if let Some(mut old) = self.engine.replace(engine) {
            old.clear_listeners();
        }
        debug!("Editor mounted");
    }

    /// Detach the engine, handing it back to the caller.
    pub fn unmount(&mut self) -> Option<Box<dyn RichTextEngine>> {
        let mut engine = self.engine.take()?;
        engine.clear_listeners();
        debug!("Editor unmounted");
        Some(engine)
    }

    pub const fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    pub fn on_update(&mut self, listener: UpdateListener) -> Result<(), EditorError> {
        self.engine_mut()?.on_update(listener);
        Ok(())
    }

    /// Snapshot of the current document.
    pub fn get_structured(&self) -> Option<Node> {
        self.engine.as_ref().map(|engine| engine.get_json())
    }

    /// Current document as Markdown.
    ///
    /// Tries the engine's serializer extension, then the built-in
    /// serializer, then plain text; the last step cannot fail.
    pub fn get_markdown(&self) -> Option<String> {
        let engine = self.engine.as_ref()?;
        let doc = engine.get_json();
        if let Some(markdown) = engine.serialize_markdown(&doc) {
            return Some(markdown);
        }
        Some(markdown_with_fallback(&doc))
    }

    /// Load a structured document without raising an update.
    pub fn set_structured(&mut self, doc: Node) -> Result<(), EditorError> {
        self.engine_mut()?
            .set_content(Content::Structured(doc), SetContentOptions::silent())
    }

    /// Load Markdown without raising an update.
    pub fn set_markdown(&mut self, markdown: &str) -> Result<(), EditorError> {
        self.engine_mut()?
            .set_content(Content::Markdown(markdown.to_string()), SetContentOptions::silent())
    }

    /// Reset to an empty document through the load path.
    pub fn clear(&mut self) -> Result<(), EditorError> {
        self.set_structured(Node::empty_doc())
    }

    pub fn set_editable(&mut self, editable: bool) -> Result<(), EditorError> {
        self.engine_mut()?.set_editable(editable);
        Ok(())
    }

    /// False when nothing is mounted.
    pub fn is_editable(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_editable())
    }

    pub fn selection_head(&self) -> Option<usize> {
        self.engine.as_ref().map(|engine| engine.selection_head())
    }

    pub fn supports_node(&self, kind: &str) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.supports_node(kind))
    }

    /// Replace a block range as a user edit.
    pub fn replace_range(&mut self, range: Range<usize>, nodes: Vec<Node>) -> Result<(), EditorError> {
        self.engine_mut()?.replace_range(range, nodes)
    }

    fn engine_mut(&mut self) -> Result<&mut Box<dyn RichTextEngine>, EditorError> {
        self.engine.as_mut().ok_or(EditorError::NotMounted)
    }
}

/// Built-in serializer with plain-text fallback.
pub fn markdown_with_fallback(doc: &Node) -> String {
    match document::to_markdown(doc) {
        Ok(markdown) => markdown,
        Err(err) => {
            warn!("Markdown serialization degraded to plain text: {err}");
            doc.plain_text()
        }
    }
}
