use std::ops::Range;

use tracing::trace;

use crate::autosave::Clock;
use crate::store::{FolderId, NoteId, Store};

use super::model::Session;

/// All possible events and actions in a session.
///
/// These represent user commands, clock ticks and engine notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Time passed; fire due timers
    Tick,
    /// The engine reported a change
    EditorUpdated,
    /// Save pending edits now
    Flush,

    // Notes
    SelectNote(NoteId),
    CloseNote,
    SetEditable(bool),

    // Tables
    /// Promote the pipe-table run around the cursor
    PromoteTable,
    /// Replace the document with the table it spells out
    ConvertDocumentToTable,
    /// Plain text arriving from the clipboard
    Paste(String),

    /// Link a note over the typed `@query`, or at the cursor
    InsertMention {
        note: NoteId,
        range: Option<Range<usize>>,
    },

    // Export
    ExportPdf(NoteId),
    ExportZip,

    // Tree
    ReloadTree,
    ToggleFolder(FolderId),
    CreateFolder {
        name: String,
        color: String,
        parent: Option<FolderId>,
    },
    RenameFolder {
        id: FolderId,
        name: String,
    },
    DeleteFolder(FolderId),
    CreateNote {
        folder: Option<FolderId>,
        title: String,
    },
    RenameNote {
        id: NoteId,
        title: String,
    },
    DeleteNote(NoteId),
}

/// What an update produced beyond state changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Done,
    /// The paste was not a table; insert it as plain text
    PastePlain(String),
    Exported(Vec<u8>),
}

impl<S: Store, C: Clock> Session<S, C> {
    /// Apply one message.
    ///
    /// Failures of explicit actions are already surfaced as blocking
    /// notifications, so they are not returned here.
    pub fn update(&mut self, msg: Message) -> Outcome {
        match msg {
            Message::Tick => self.tick(),
            Message::EditorUpdated => self.absorb_edits(),
            Message::Flush => {
                let _ = self.flush_pending();
            }
            Message::SelectNote(id) => {
                let _ = self.select_note(id);
            }
            Message::CloseNote => {
                let _ = self.close_note();
            }
            Message::SetEditable(editable) => {
                let _ = self.set_editable(editable);
            }
            Message::PromoteTable => {
                self.promote_table();
            }
            Message::ConvertDocumentToTable => {
                self.convert_document_to_table();
            }
            Message::Paste(text) => {
                if !self.paste(&text) {
                    return Outcome::PastePlain(text);
                }
            }
            Message::InsertMention { note, range } => {
                let _ = self.insert_mention(range, note);
            }
            Message::ExportPdf(id) => {
                if let Ok(bytes) = self.export_pdf(id) {
                    return Outcome::Exported(bytes);
                }
            }
            Message::ExportZip => {
                if let Ok(bytes) = self.export_zip() {
                    return Outcome::Exported(bytes);
                }
            }
            Message::ReloadTree => {
                let _ = self.load_tree();
            }
            Message::ToggleFolder(id) => self.toggle_folder(id),
            Message::CreateFolder { name, color, parent } => {
                let _ = self.create_folder(&name, &color, parent);
            }
            Message::RenameFolder { id, name } => {
                let _ = self.rename_folder(id, &name);
            }
            Message::DeleteFolder(id) => {
                let _ = self.delete_folder(id);
            }
            Message::CreateNote { folder, title } => {
                let _ = self.create_note(folder, &title);
            }
            Message::RenameNote { id, title } => {
                let _ = self.rename_note(id, &title);
            }
            Message::DeleteNote(id) => {
                let _ = self.delete_note(id);
            }
        }
        Outcome::Done
    }

    /// Absorb queued edits, fire due timers and expire the toast.
    pub fn tick(&mut self) {
        self.absorb_edits();
        let now = self.clock.now_ms();
        let events = self.autosave.poll(now);
        if !events.is_empty() {
            trace!(count = events.len(), now, "Autosave events");
        }
        self.handle_autosave_events(events);
        self.expire_toast(now);
    }

    /// Expand or collapse a folder in the tree view.
    pub fn toggle_folder(&mut self, id: FolderId) {
        if self.tree.folder(id).is_none() {
            return;
        }
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
    }

    /// When the next tick has something to do.
    pub fn next_deadline(&self) -> Option<u64> {
        self.autosave.next_deadline()
    }
}
