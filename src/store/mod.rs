//! Remote note and folder storage.
//!
//! The core reaches the server only through these traits. Each call stands
//! for one request; a returned error means the server state is unknown to
//! have changed.

mod memory;
mod types;

pub use memory::{MemoryStore, Operation};
pub use types::{
    CreateFolderRequest, CreateNoteRequest, Folder, FolderId, Note, NoteDetail, NoteId, NoteMetrics, NoteQuery,
    UpdateFolderRequest, UpdateNoteRequest, extract_links,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    /// The server answered with a problem response.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never got an answer.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store does not support {0}")]
    Unsupported(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait NoteStore {
    fn get_note(&self, id: NoteId) -> StoreResult<NoteDetail>;

    fn list_notes(&self, query: &NoteQuery) -> StoreResult<Vec<Note>>;

    fn create_note(&self, request: &CreateNoteRequest) -> StoreResult<Note>;

    fn update_note(&self, request: &UpdateNoteRequest) -> StoreResult<()>;

    fn delete_note(&self, id: NoteId) -> StoreResult<()>;

    /// Rendered PDF of one note.
    fn export_pdf(&self, id: NoteId) -> StoreResult<Vec<u8>>;

    /// Archive of every note.
    fn export_zip(&self) -> StoreResult<Vec<u8>>;
}

pub trait FolderStore {
    /// Every folder, the root included.
    fn list_folders(&self) -> StoreResult<Vec<Folder>>;

    fn create_folder(&self, request: &CreateFolderRequest) -> StoreResult<Folder>;

    fn update_folder(&self, request: &UpdateFolderRequest) -> StoreResult<Folder>;

    /// Delete a folder along with everything below it.
    fn delete_folder(&self, id: FolderId) -> StoreResult<()>;

    fn root_folder_id(&self) -> StoreResult<FolderId>;
}

/// Both halves of the remote API.
pub trait Store: NoteStore + FolderStore {}

impl<T: NoteStore + FolderStore> Store for T {}
