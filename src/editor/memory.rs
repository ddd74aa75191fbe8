//! In-process rich-text engine.
//!
//! Backs the CLI and the test suite. Clones share one document, so a caller
//! can keep a clone to play the part of the user typing while the session
//! owns the mounted copy.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use crate::document::{self, Node, content_size, textblocks};

use super::engine::{Content, EditorError, MarkdownSerializer, RichTextEngine, SetContentOptions, UpdateListener};

struct State {
    doc: Node,
    editable: bool,
    head: usize,
    listeners: Vec<UpdateListener>,
    missing_nodes: Vec<String>,
    serializer: Option<Box<dyn MarkdownSerializer>>,
}

#[derive(Clone)]
pub struct MemoryEngine {
    state: Rc<RefCell<State>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryEngine")
            .field("editable", &state.editable)
            .field("head", &state.head)
            .field("listeners", &state.listeners.len())
            .finish_non_exhaustive()
    }
}

impl MemoryEngine {
    /// An editable engine showing an empty document.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                doc: Node::empty_doc(),
                editable: true,
                head: 1,
                listeners: Vec::new(),
                missing_nodes: Vec::new(),
                serializer: None,
            })),
        }
    }

    /// Remove a node type from the schema.
    #[must_use]
    pub fn without_node(self, kind: &str) -> Self {
        self.state.borrow_mut().missing_nodes.push(kind.to_string());
        self
    }

    /// Install a native Markdown serializer extension.
    #[must_use]
    pub fn with_serializer(self, serializer: Box<dyn MarkdownSerializer>) -> Self {
        self.state.borrow_mut().serializer = Some(serializer);
        self
    }

    /// Move the cursor, clamped to the document.
    pub fn set_selection(&self, pos: usize) {
        let mut state = self.state.borrow_mut();
        state.head = pos.min(content_size(&state.doc));
    }

    /// Put the cursor inside the `index`-th text block.
    pub fn select_block(&self, index: usize) {
        let blocks = textblocks(&self.state.borrow().doc);
        if let Some(block) = blocks.get(index) {
            self.set_selection(block.range.start + 1);
        }
    }

    /// Append a paragraph as a user edit.
    ///
    /// Returns `false` without touching the document when read-only.
    pub fn type_paragraph(&self, text: &str) -> bool {
        self.edit(|doc| {
            if doc.content.len() == 1 && doc.content[0].is(document::kind::PARAGRAPH) && doc.content[0].content.is_empty() {
                doc.content.clear();
            }
            doc.content.push(Node::plain_paragraph(text));
        })
    }

    /// Apply an arbitrary change as a user edit.
    pub fn edit(&self, change: impl FnOnce(&mut Node)) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if !state.editable {
                return false;
            }
            change(&mut state.doc);
            state.head = state.head.min(content_size(&state.doc));
        }
        self.emit();
        true
    }

    fn emit(&self) {
        // listeners may read the engine, so none of the state stays borrowed
        let mut listeners = std::mem::take(&mut self.state.borrow_mut().listeners);
        for listener in &mut listeners {
            listener();
        }
        let mut state = self.state.borrow_mut();
        listeners.append(&mut state.listeners);
        state.listeners = listeners;
    }
}

impl RichTextEngine for MemoryEngine {
    fn get_json(&self) -> Node {
        self.state.borrow().doc.clone()
    }

    fn set_content(&mut self, content: Content, options: SetContentOptions) -> Result<(), EditorError> {
        let doc = match content {
            Content::Structured(doc) => doc,
            Content::Markdown(text) => document::parse(&text),
        };
        {
            let mut state = self.state.borrow_mut();
            state.doc = doc;
            state.head = 1.min(content_size(&state.doc));
        }
        if options.emit_update {
            self.emit();
        }
        Ok(())
    }

    fn set_editable(&mut self, editable: bool) {
        self.state.borrow_mut().editable = editable;
    }

    fn is_editable(&self) -> bool {
        self.state.borrow().editable
    }

    fn on_update(&mut self, listener: UpdateListener) {
        self.state.borrow_mut().listeners.push(listener);
    }

    fn clear_listeners(&mut self) {
        self.state.borrow_mut().listeners.clear();
    }

    fn serialize_markdown(&self, doc: &Node) -> Option<String> {
        self.state.borrow().serializer.as_ref()?.serialize(doc)
    }

    fn selection_head(&self) -> usize {
        self.state.borrow().head
    }

    fn supports_node(&self, kind: &str) -> bool {
        !self.state.borrow().missing_nodes.iter().any(|k| k == kind)
    }

    fn replace_range(&mut self, range: Range<usize>, nodes: Vec<Node>) -> Result<(), EditorError> {
        {
            let mut state = self.state.borrow_mut();
            if !state.editable {
                return Err(EditorError::ReadOnly);
            }
            let inserted: usize = nodes.iter().map(document::node_size).sum();
            let updated = document::replace_range(&state.doc, range.clone(), nodes)?;
            state.doc = updated;
            // cursor ends up just inside the end of the inserted content
            state.head = (range.start + inserted).saturating_sub(1).min(content_size(&state.doc));
        }
        self.emit();
        Ok(())
    }
}
