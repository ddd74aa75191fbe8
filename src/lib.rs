// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. store::StoreError)
    clippy::module_name_repetitions
)]

//! # Notesync
//!
//! The content-sync core of a note editor.
//!
//! Notesync keeps a rich-text editor, a remote note store and a local
//! folder tree in step:
//! - Notes load from either legacy Markdown or a structured JSON tree
//! - Edits are saved after a quiet period, always to the note they were made in
//! - Pipe-table text can be promoted to a real table on command
//! - `@` mentions link notes to each other
//! - Folder and note changes reach the store before the local tree
//!
//! ## Architecture
//!
//! The session follows The Elm Architecture (TEA) pattern:
//! - **Session**: all state for one mounted editor
//! - **Message**: commands, clock ticks and editor updates
//! - **Update**: applies a message and reports notifications
//!
//! ## Modules
//!
//! - [`app`]: The editing session and its event loop
//! - [`document`]: Structured tree, Markdown conversion, format detection
//! - [`editor`]: Rich-text engine boundary and mount handle
//! - [`autosave`]: Debounced saving and the status indicator
//! - [`table`]: Markdown table detection and promotion
//! - [`mention`]: Note-to-note links
//! - [`store`]: Remote note and folder storage
//! - [`tree`]: Local folder/note mirror
//! - [`config`]: Saved flags

pub mod app;
pub mod autosave;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod mention;
pub mod store;
pub mod table;
pub mod tree;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{Message, Notification, Session};
    pub use crate::document::Node;
    pub use crate::editor::{EditorHandle, RichTextEngine};
    pub use crate::error::{Result, SyncError};
}
