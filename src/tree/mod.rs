//! Local mirror of the folder/note tree.
//!
//! Nodes live in flat id-keyed maps with parent and child links by id, so a
//! mutation touches only the node itself and its parent's child list.
//! Every mutation goes to the store first; the mirror changes only after
//! the store accepted it. Deletes are followed by a full reload so the
//! server's cascade decides what disappeared.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::store::{
    CreateFolderRequest, CreateNoteRequest, Folder, FolderId, FolderStore, Note, NoteId, NoteStore, UpdateFolderRequest,
    UpdateNoteRequest,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub id: FolderId,
    pub name: String,
    pub color: String,
    pub parent: Option<FolderId>,
    pub children: Vec<FolderId>,
    pub notes: Vec<NoteId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEntry {
    pub id: NoteId,
    pub folder_id: FolderId,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&Note> for NoteEntry {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            folder_id: note.folder_id,
            title: note.title.clone(),
            updated_at: note.updated_at,
        }
    }
}

/// What a visible tree row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeItem {
    Folder(FolderId),
    Note(NoteId),
}

/// One line of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub item: TreeItem,
    pub depth: usize,
    pub label: String,
    /// Only meaningful for folders
    pub expanded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    root: Option<FolderId>,
    folders: HashMap<FolderId, FolderEntry>,
    notes: HashMap<NoteId, NoteEntry>,
}

impl FolderTree {
    /// Fetch the whole tree from the store.
    pub fn load<S: FolderStore + ?Sized>(store: &S) -> Result<Self> {
        let listing = store.list_folders()?;
        let root = match listing.iter().find(|f| f.is_root) {
            Some(root) => root.id,
            None => store.root_folder_id()?,
        };
        let tree = Self::from_listing(root, &listing);
        debug!(folders = tree.folders.len(), notes = tree.notes.len(), "Tree loaded");
        Ok(tree)
    }

    /// Build the arena from a flat folder listing.
    pub fn from_listing(root: FolderId, listing: &[Folder]) -> Self {
        let mut folders: HashMap<FolderId, FolderEntry> = listing
            .iter()
            .map(|f| {
                (
                    f.id,
                    FolderEntry {
                        id: f.id,
                        name: f.name.clone(),
                        color: f.color.clone(),
                        parent: f.parent_folder_id,
                        children: Vec::new(),
                        notes: f.notes.iter().map(|n| n.id).collect(),
                    },
                )
            })
            .collect();
        for folder in listing {
            if let Some(parent) = folder.parent_folder_id
                && let Some(entry) = folders.get_mut(&parent)
            {
                entry.children.push(folder.id);
            }
        }
        let notes = listing
            .iter()
            .flat_map(|f| f.notes.iter())
            .map(|n| (n.id, NoteEntry::from(n)))
            .collect();
        Self {
            root: Some(root),
            folders,
            notes,
        }
    }

    /// Replace the mirror with a fresh copy from the store.
    pub fn reload<S: FolderStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        *self = Self::load(store)?;
        Ok(())
    }

    pub const fn root(&self) -> Option<FolderId> {
        self.root
    }

    pub fn folder(&self, id: FolderId) -> Option<&FolderEntry> {
        self.folders.get(&id)
    }

    pub fn note(&self, id: NoteId) -> Option<&NoteEntry> {
        self.notes.get(&id)
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Notes whose title contains `query`, ignoring case, in id order.
    pub fn notes_matching(&self, query: &str, limit: usize) -> Vec<&NoteEntry> {
        let needle = query.to_lowercase();
        let mut found: Vec<&NoteEntry> = self
            .notes
            .values()
            .filter(|note| note.title.to_lowercase().contains(&needle))
            .collect();
        found.sort_by_key(|note| note.id);
        found.truncate(limit);
        found
    }

    /// Ids from `id` up to the root, inclusive.
    pub fn ancestors(&self, id: FolderId) -> Vec<FolderId> {
        let mut out = Vec::new();
        let mut current = Some(id);
        while let Some(folder_id) = current {
            let Some(folder) = self.folders.get(&folder_id) else {
                break;
            };
            if out.contains(&folder_id) {
                break;
            }
            out.push(folder_id);
            current = folder.parent;
        }
        out
    }

    fn resolve_parent(&self, parent: Option<FolderId>) -> Result<FolderId> {
        parent.or(self.root).ok_or(SyncError::Consistency {
            what: "root folder",
            id: 0,
        })
    }

    fn missing_folder(id: FolderId) -> SyncError {
        warn!(%id, "Folder missing from tree mirror");
        SyncError::Consistency {
            what: "folder",
            id: id.0,
        }
    }

    fn missing_note(id: NoteId) -> SyncError {
        warn!(%id, "Note missing from tree mirror");
        SyncError::Consistency { what: "note", id: id.0 }
    }

    /// Create a folder under `parent`, or at the top level for `None`.
    pub fn create_folder<S: FolderStore + ?Sized>(
        &mut self,
        store: &S,
        name: &str,
        color: &str,
        parent: Option<FolderId>,
    ) -> Result<FolderId> {
        let parent = self.resolve_parent(parent)?;
        let created = store.create_folder(&CreateFolderRequest {
            name: name.to_string(),
            color: color.to_string(),
            parent_folder_id: Some(parent),
        })?;

        let parent_entry = self.folders.get_mut(&parent).ok_or_else(|| Self::missing_folder(parent))?;
        parent_entry.children.push(created.id);
        self.folders.insert(
            created.id,
            FolderEntry {
                id: created.id,
                name: created.name,
                color: created.color,
                parent: Some(parent),
                children: Vec::new(),
                notes: Vec::new(),
            },
        );
        debug!(id = %created.id, %parent, "Folder created");
        Ok(created.id)
    }

    /// Rename a folder, keeping its color.
    pub fn rename_folder<S: FolderStore + ?Sized>(&mut self, store: &S, id: FolderId, name: &str) -> Result<()> {
        let color = self.folders.get(&id).ok_or_else(|| Self::missing_folder(id))?.color.clone();
        let updated = store.update_folder(&UpdateFolderRequest {
            id,
            name: name.to_string(),
            color,
        })?;

        let entry = self.folders.get_mut(&id).ok_or_else(|| Self::missing_folder(id))?;
        entry.name = updated.name;
        entry.color = updated.color;
        Ok(())
    }

    /// Delete a folder and everything under it, then reload.
    pub fn delete_folder<S: FolderStore + ?Sized>(&mut self, store: &S, id: FolderId) -> Result<()> {
        store.delete_folder(id)?;
        self.reload(store)?;
        if self.folders.contains_key(&id) {
            return Err(Self::missing_folder_removal(id));
        }
        Ok(())
    }

    fn missing_folder_removal(id: FolderId) -> SyncError {
        warn!(%id, "Deleted folder still present after reload");
        SyncError::Consistency {
            what: "deleted folder",
            id: id.0,
        }
    }

    /// Create an empty note in `folder`, or at the top level for `None`.
    pub fn create_note<S: NoteStore + ?Sized>(
        &mut self,
        store: &S,
        folder: Option<FolderId>,
        title: &str,
    ) -> Result<NoteId> {
        let folder_id = self.resolve_parent(folder)?;
        let created = store.create_note(&CreateNoteRequest {
            folder_id,
            title: title.to_string(),
            content: String::new(),
        })?;

        let folder = self.folders.get_mut(&folder_id).ok_or_else(|| Self::missing_folder(folder_id))?;
        folder.notes.push(created.id);
        self.notes.insert(created.id, NoteEntry::from(&created));
        debug!(id = %created.id, folder = %folder_id, "Note created");
        Ok(created.id)
    }

    /// Rename a note. The update call must carry the content, so the note
    /// is fetched first.
    pub fn rename_note<S: NoteStore + ?Sized>(&mut self, store: &S, id: NoteId, title: &str) -> Result<()> {
        let current = store.get_note(id)?;
        store.update_note(&UpdateNoteRequest {
            id,
            title: title.to_string(),
            content: current.content,
        })?;

        let entry = self.notes.get_mut(&id).ok_or_else(|| Self::missing_note(id))?;
        entry.title = title.to_string();
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Delete a note, then reload.
    pub fn delete_note<S: NoteStore + FolderStore + ?Sized>(&mut self, store: &S, id: NoteId) -> Result<()> {
        NoteStore::delete_note(store, id)?;
        self.reload(store)
    }

    /// Flatten the tree for display.
    ///
    /// The root itself is never emitted; its children sit at depth 0.
    /// Within a folder, subfolders come before notes. Collapsed folders
    /// hide their contents.
    pub fn visible_rows(&self, expanded: &HashSet<FolderId>) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if let Some(root) = self.root {
            self.push_rows(root, 0, expanded, &mut rows);
        }
        rows
    }

    fn push_rows(&self, folder_id: FolderId, depth: usize, expanded: &HashSet<FolderId>, rows: &mut Vec<TreeRow>) {
        let Some(folder) = self.folders.get(&folder_id) else {
            return;
        };
        for child_id in &folder.children {
            let Some(child) = self.folders.get(child_id) else {
                continue;
            };
            let is_open = expanded.contains(child_id);
            rows.push(TreeRow {
                item: TreeItem::Folder(*child_id),
                depth,
                label: child.name.clone(),
                expanded: is_open,
            });
            if is_open {
                self.push_rows(*child_id, depth + 1, expanded, rows);
            }
        }
        for note_id in &folder.notes {
            if let Some(note) = self.notes.get(note_id) {
                rows.push(TreeRow {
                    item: TreeItem::Note(*note_id),
                    depth,
                    label: note.title.clone(),
                    expanded: false,
                });
            }
        }
    }
}
