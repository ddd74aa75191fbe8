//! `@` mentions that link one note to another.
//!
//! Typing `@` followed by a query offers notes whose titles match. Picking
//! one replaces the `@query` text with the note's title, carrying a link
//! mark to `/notes/{id}`; the store later reports those links as the
//! note's internal links.

use std::ops::Range;

use tracing::debug;

use crate::document::{Mark, Node};
use crate::editor::{EditorError, EditorHandle};
use crate::error::Result;
use crate::store::NoteId;
use crate::tree::FolderTree;

/// Most suggestions offered at once.
pub const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: NoteId,
    pub title: String,
}

/// Notes whose title contains `query`, case-insensitively.
pub fn suggestions(tree: &FolderTree, query: &str) -> Vec<Suggestion> {
    tree.notes_matching(query, MAX_SUGGESTIONS)
        .into_iter()
        .map(|note| Suggestion {
            id: note.id,
            title: note.title.clone(),
        })
        .collect()
}

/// The title as linked text.
pub fn note_link(id: NoteId, title: &str) -> Node {
    Node::marked_text(title, vec![Mark::link(&id.href())])
}

/// Replace `range` (usually the typed `@query`) with a link to the note.
pub fn insert_note_link(handle: &mut EditorHandle, range: Range<usize>, id: NoteId, title: &str) -> Result<()> {
    if !handle.is_editable() {
        return Err(EditorError::ReadOnly.into());
    }
    debug!(%id, ?range, "Inserting note link");
    handle.replace_range(range, vec![note_link(id, title)])?;
    Ok(())
}
