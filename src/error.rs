//! Error taxonomy shared by the synchronization core.

use thiserror::Error;

use crate::editor::EditorError;
use crate::store::StoreError;
use crate::table::TableParseError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A store call was rejected or never completed.
    #[error("Network failure: {0}")]
    Network(#[from] StoreError),

    /// The document could not be converted to Markdown.
    #[error("Cannot serialize node `{node_type}` to Markdown")]
    Serialization { node_type: String },

    /// Table detection found nothing it could promote.
    #[error("Table parse failed: {0}")]
    Parse(#[from] TableParseError),

    /// A successful remote mutation left the local mirror out of step.
    #[error("Tree mirror is missing {what} {id} after a successful store call")]
    Consistency { what: &'static str, id: i64 },

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Errors that happened talking to the store.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// A table command quietly declining rather than failing.
    pub const fn is_decline(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Editor(EditorError::ReadOnly))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
