use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::types::{
    CreateFolderRequest, CreateNoteRequest, Folder, FolderId, Note, NoteDetail, NoteId, NoteMetrics, NoteQuery,
    UpdateFolderRequest, UpdateNoteRequest, extract_links,
};
use super::{FolderStore, NoteStore, StoreError, StoreResult};

/// Store calls, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetNote,
    ListNotes,
    CreateNote,
    UpdateNote,
    DeleteNote,
    ExportPdf,
    ExportZip,
    ListFolders,
    CreateFolder,
    UpdateFolder,
    DeleteFolder,
    RootFolder,
}

#[derive(Debug, Clone)]
struct StoredNote {
    folder_id: FolderId,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredFolder {
    name: String,
    color: String,
    parent: Option<FolderId>,
}

#[derive(Debug)]
struct State {
    next_id: i64,
    root: FolderId,
    folders: BTreeMap<FolderId, StoredFolder>,
    notes: BTreeMap<NoteId, StoredNote>,
    failing: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
    updates: Vec<UpdateNoteRequest>,
}

/// In-memory store with the server's semantics.
///
/// Ids come from one counter and are never reused, deleting a folder takes
/// its whole subtree with it and the root folder cannot be deleted.
/// Uses `RefCell` since the core is single-threaded.
#[derive(Debug)]
pub struct MemoryStore {
    state: RefCell<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store holding only the root folder.
    pub fn new() -> Self {
        let root = FolderId(1);
        let mut folders = BTreeMap::new();
        folders.insert(
            root,
            StoredFolder {
                name: "Root".to_string(),
                color: String::new(),
                parent: None,
            },
        );
        Self {
            state: RefCell::new(State {
                next_id: 2,
                root,
                folders,
                notes: BTreeMap::new(),
                failing: HashSet::new(),
                calls: HashMap::new(),
                updates: Vec::new(),
            }),
        }
    }

    /// Make every call of `op` fail as unavailable until [`Self::recover`].
    pub fn fail(&self, op: Operation) {
        self.state.borrow_mut().failing.insert(op);
    }

    pub fn recover(&self, op: Operation) {
        self.state.borrow_mut().failing.remove(&op);
    }

    /// How many times `op` was called, failed calls included.
    pub fn calls(&self, op: Operation) -> usize {
        self.state.borrow().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every successful `update_note` request, oldest first.
    pub fn updates(&self) -> Vec<UpdateNoteRequest> {
        self.state.borrow().updates.clone()
    }

    /// Stored content of a note, bypassing call accounting.
    pub fn content_of(&self, id: NoteId) -> Option<String> {
        self.state.borrow().notes.get(&id).map(|n| n.content.clone())
    }

    /// Seed a note directly, as if it had been written earlier.
    pub fn insert_note(&self, folder_id: FolderId, title: &str, content: &str) -> NoteId {
        let mut state = self.state.borrow_mut();
        let id = NoteId(state.allocate());
        let now = Utc::now();
        state.notes.insert(
            id,
            StoredNote {
                folder_id,
                title: title.to_string(),
                content: content.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn begin(&self, op: Operation) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        *state.calls.entry(op).or_insert(0) += 1;
        if state.failing.contains(&op) {
            return Err(StoreError::Unavailable(format!("{op:?} failed")));
        }
        Ok(())
    }
}

impl State {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn note(&self, id: NoteId) -> StoreResult<&StoredNote> {
        self.notes.get(&id).ok_or(StoreError::NotFound { what: "note", id: id.0 })
    }

    fn folder(&self, id: FolderId) -> StoreResult<&StoredFolder> {
        self.folders
            .get(&id)
            .ok_or(StoreError::NotFound { what: "folder", id: id.0 })
    }

    fn note_view(id: NoteId, note: &StoredNote) -> Note {
        Note {
            id,
            folder_id: note.folder_id,
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
            metrics: NoteMetrics::measure(&note.content),
        }
    }

    fn folder_view(&self, id: FolderId, folder: &StoredFolder) -> Folder {
        Folder {
            id,
            name: folder.name.clone(),
            color: folder.color.clone(),
            parent_folder_id: folder.parent,
            is_root: id == self.root,
            notes: self
                .notes
                .iter()
                .filter(|(_, n)| n.folder_id == id)
                .map(|(nid, n)| Self::note_view(*nid, n))
                .collect(),
        }
    }

    /// `id` and every folder below it.
    fn subtree(&self, id: FolderId) -> Vec<FolderId> {
        let mut out = vec![id];
        let mut idx = 0;
        while idx < out.len() {
            let parent = out[idx];
            out.extend(
                self.folders
                    .iter()
                    .filter(|(_, f)| f.parent == Some(parent))
                    .map(|(fid, _)| *fid),
            );
            idx += 1;
        }
        out
    }
}

impl NoteStore for MemoryStore {
    fn get_note(&self, id: NoteId) -> StoreResult<NoteDetail> {
        self.begin(Operation::GetNote)?;
        let state = self.state.borrow();
        let note = state.note(id)?;
        let (internal_links, external_links) = extract_links(&note.content);
        Ok(NoteDetail {
            id,
            title: note.title.clone(),
            content: note.content.clone(),
            metrics: NoteMetrics::measure(&note.content),
            internal_links,
            external_links,
        })
    }

    fn list_notes(&self, query: &NoteQuery) -> StoreResult<Vec<Note>> {
        self.begin(Operation::ListNotes)?;
        let state = self.state.borrow();
        let needle = query.search.as_deref().map(str::to_lowercase);
        Ok(state
            .notes
            .iter()
            .filter(|(_, n)| query.folder_id.is_none_or(|f| n.folder_id == f))
            .filter(|(_, n)| {
                needle.as_deref().is_none_or(|needle| {
                    n.title.to_lowercase().contains(needle) || n.content.to_lowercase().contains(needle)
                })
            })
            .map(|(id, n)| State::note_view(*id, n))
            .collect())
    }

    fn create_note(&self, request: &CreateNoteRequest) -> StoreResult<Note> {
        self.begin(Operation::CreateNote)?;
        let mut state = self.state.borrow_mut();
        state.folder(request.folder_id)?;
        let id = NoteId(state.allocate());
        let now = Utc::now();
        let note = StoredNote {
            folder_id: request.folder_id,
            title: request.title.clone(),
            content: request.content.clone(),
            created_at: now,
            updated_at: now,
        };
        let view = State::note_view(id, &note);
        state.notes.insert(id, note);
        Ok(view)
    }

    fn update_note(&self, request: &UpdateNoteRequest) -> StoreResult<()> {
        self.begin(Operation::UpdateNote)?;
        let mut state = self.state.borrow_mut();
        let note = state
            .notes
            .get_mut(&request.id)
            .ok_or(StoreError::NotFound { what: "note", id: request.id.0 })?;
        note.title.clone_from(&request.title);
        note.content.clone_from(&request.content);
        note.updated_at = Utc::now();
        state.updates.push(request.clone());
        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> StoreResult<()> {
        self.begin(Operation::DeleteNote)?;
        let mut state = self.state.borrow_mut();
        state
            .notes
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { what: "note", id: id.0 })
    }

    fn export_pdf(&self, id: NoteId) -> StoreResult<Vec<u8>> {
        self.begin(Operation::ExportPdf)?;
        self.state.borrow().note(id)?;
        Err(StoreError::Unsupported("PDF export"))
    }

    fn export_zip(&self) -> StoreResult<Vec<u8>> {
        self.begin(Operation::ExportZip)?;
        Err(StoreError::Unsupported("ZIP export"))
    }
}

impl FolderStore for MemoryStore {
    fn list_folders(&self) -> StoreResult<Vec<Folder>> {
        self.begin(Operation::ListFolders)?;
        let state = self.state.borrow();
        Ok(state
            .folders
            .iter()
            .map(|(id, f)| state.folder_view(*id, f))
            .collect())
    }

    fn create_folder(&self, request: &CreateFolderRequest) -> StoreResult<Folder> {
        self.begin(Operation::CreateFolder)?;
        let mut state = self.state.borrow_mut();
        let parent = request.parent_folder_id.unwrap_or(state.root);
        state.folder(parent)?;
        let id = FolderId(state.allocate());
        let folder = StoredFolder {
            name: request.name.clone(),
            color: request.color.clone(),
            parent: Some(parent),
        };
        let view = state.folder_view(id, &folder);
        state.folders.insert(id, folder);
        Ok(view)
    }

    fn update_folder(&self, request: &UpdateFolderRequest) -> StoreResult<Folder> {
        self.begin(Operation::UpdateFolder)?;
        let mut state = self.state.borrow_mut();
        let folder = state
            .folders
            .get_mut(&request.id)
            .ok_or(StoreError::NotFound { what: "folder", id: request.id.0 })?;
        folder.name.clone_from(&request.name);
        folder.color.clone_from(&request.color);
        let folder = folder.clone();
        Ok(state.folder_view(request.id, &folder))
    }

    fn delete_folder(&self, id: FolderId) -> StoreResult<()> {
        self.begin(Operation::DeleteFolder)?;
        let mut state = self.state.borrow_mut();
        state.folder(id)?;
        if id == state.root {
            return Err(StoreError::Rejected {
                status: 400,
                message: "The root folder cannot be deleted".to_string(),
            });
        }
        let doomed = state.subtree(id);
        state.folders.retain(|fid, _| !doomed.contains(fid));
        state.notes.retain(|_, n| !doomed.contains(&n.folder_id));
        Ok(())
    }

    fn root_folder_id(&self) -> StoreResult<FolderId> {
        self.begin(Operation::RootFolder)?;
        Ok(self.state.borrow().root)
    }
}
