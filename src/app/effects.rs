use std::ops::Range;

use tracing::{debug, warn};

use crate::autosave::{AutosaveEvent, Clock, SaveTicket};
use crate::document;
use crate::editor::EditorError;
use crate::error::SyncError;
use crate::mention::{self, Suggestion};
use crate::store::{FolderId, NoteDetail, NoteId, Store, UpdateNoteRequest};
use crate::table::{self, ParsedTable};

use super::model::{CurrentNote, Notification, Session, ToastLevel};

impl<S: Store, C: Clock> Session<S, C> {
    /// Fetch the folder tree. Failure leaves the previous mirror in place.
    pub fn load_tree(&mut self) -> Result<(), SyncError> {
        match self.tree.reload(&self.store) {
            Ok(()) => {
                self.notify(Notification::TreeReloaded);
                Ok(())
            }
            Err(err) => {
                self.block(format!("Could not load folders: {err}"));
                Err(err)
            }
        }
    }

    /// Feed queued editor updates to the autosave engine.
    pub(super) fn absorb_edits(&mut self) {
        let count = self.take_update_count();
        if count == 0 {
            return;
        }
        let note_id = self.current_note_id();
        let editable = self.editor.is_editable();
        let now = self.clock.now_ms();
        for _ in 0..count {
            self.autosave.on_edit(note_id, editable, now);
        }
    }

    pub(super) fn handle_autosave_events(&mut self, events: Vec<AutosaveEvent>) {
        for event in events {
            match event {
                AutosaveEvent::StatusChanged(status) => self.notify(Notification::StatusChanged(status)),
                AutosaveEvent::Save(ticket) => {
                    // failures stay dirty and show as the Error status
                    let _ = self.perform_save(ticket);
                }
            }
        }
    }

    /// Save whatever is pending right now.
    ///
    /// On failure the edits stay dirty so the next flush retries them.
    pub fn flush_pending(&mut self) -> Result<(), SyncError> {
        self.absorb_edits();
        let Some(ticket) = self.autosave.flush() else {
            return Ok(());
        };
        self.notify(Notification::StatusChanged(self.autosave.status()));
        self.perform_save(ticket)
    }

    /// Flush ahead of an action that goes on regardless of the outcome.
    fn flush_before(&mut self, action: &str) {
        if let Err(err) = self.flush_pending() {
            debug!("Continuing with {action} after a failed save: {err}");
        }
    }

    /// Flush ahead of replacing the editor content. Refuses while edits
    /// are still unsaved.
    fn flush_before_switch(&mut self) -> Result<(), SyncError> {
        self.flush_pending()
            .inspect_err(|err| self.block(format!("Could not save changes: {err}")))
    }

    /// Write the editor's document to the note the ticket was armed for.
    pub(super) fn perform_save(&mut self, ticket: SaveTicket) -> Result<(), SyncError> {
        let target = match &self.current {
            Some(current) if current.id == ticket.note_id => current.title.clone(),
            _ => {
                // the editor no longer holds this note's content
                warn!(note_id = %ticket.note_id, "Save target is not the open note; dropping");
                self.finish_save(ticket, false);
                return Ok(());
            }
        };
        let Some(doc) = self.editor.get_structured() else {
            warn!(note_id = %ticket.note_id, "No editor mounted at save time");
            self.finish_save(ticket, false);
            return Err(EditorError::NotMounted.into());
        };
        let content = match document::encode_content(&doc) {
            Ok(content) => content,
            Err(err) => {
                warn!(note_id = %ticket.note_id, "Could not encode document: {err}");
                self.finish_save(ticket, false);
                return Err(err);
            }
        };

        let request = UpdateNoteRequest {
            id: ticket.note_id,
            title: target,
            content,
        };
        match self.store.update_note(&request) {
            Ok(()) => {
                self.finish_save(ticket, true);
                self.refresh_after_save(ticket.note_id);
                Ok(())
            }
            Err(err) => {
                warn!(note_id = %ticket.note_id, "Autosave failed: {err}");
                self.finish_save(ticket, false);
                Err(err.into())
            }
        }
    }

    fn finish_save(&mut self, ticket: SaveTicket, ok: bool) {
        let now = self.clock.now_ms();
        if let Some(status) = self.autosave.complete(ticket, ok, now) {
            self.notify(Notification::StatusChanged(status));
        }
    }

    /// Pull server-computed metrics and the tree timestamp after a save.
    fn refresh_after_save(&mut self, note_id: NoteId) {
        match self.store.get_note(note_id) {
            Ok(detail) => {
                if self.current_note_id() == Some(note_id) {
                    self.apply_detail(&detail);
                }
            }
            Err(err) => debug!(%note_id, "Metrics refresh failed: {err}"),
        }
        match self.tree.reload(&self.store) {
            Ok(()) => self.notify(Notification::TreeReloaded),
            Err(err) => debug!("Tree refresh after save failed: {err}"),
        }
    }

    fn apply_detail(&mut self, detail: &NoteDetail) {
        self.current = Some(CurrentNote {
            id: detail.id,
            title: detail.title.clone(),
            internal_links: detail.internal_links.clone(),
            external_links: detail.external_links.clone(),
        });
        self.metrics = Some(detail.metrics);
        self.notify(Notification::MetricsChanged(detail.metrics));
    }

    /// Open a note in the editor.
    ///
    /// Pending edits are saved against the note they were made in before
    /// anything else happens. If that save or the fetch fails the open note
    /// stays put.
    pub fn select_note(&mut self, id: NoteId) -> Result<(), SyncError> {
        self.flush_before_switch()?;

        let detail = match self.store.get_note(id) {
            Ok(detail) => detail,
            Err(err) => {
                self.block(format!("Could not open note: {err}"));
                return Err(err.into());
            }
        };

        self.autosave.begin_load();
        let loaded = self.editor.set_structured(document::decode_content(&detail.content));
        self.drain_updates_ignored();
        self.autosave.finish_load();
        loaded?;

        debug!(%id, "Note loaded");
        self.apply_detail(&detail);
        self.notify(Notification::NoteSelected(id));
        Ok(())
    }

    /// Close the open note and empty the editor.
    ///
    /// Declines, keeping the note open, when its edits cannot be saved.
    pub fn close_note(&mut self) -> Result<(), SyncError> {
        self.flush_before_switch()?;
        self.discard_note();
        Ok(())
    }

    /// Empty the editor without saving. For notes that no longer exist.
    fn discard_note(&mut self) {
        self.autosave.begin_load();
        if let Err(err) = self.editor.clear() {
            debug!("Nothing to clear: {err}");
        }
        self.drain_updates_ignored();
        self.autosave.finish_load();
        self.current = None;
        self.metrics = None;
    }

    pub fn set_editable(&mut self, editable: bool) -> Result<(), SyncError> {
        self.absorb_edits();
        self.editor.set_editable(editable)?;
        self.show_toast(
            ToastLevel::Info,
            if editable { "Editing enabled" } else { "Read-only" },
        );
        Ok(())
    }

    /// Turn the pipe-table run under the cursor into a table.
    ///
    /// Returns `None` when the command declined; declines are silent.
    pub fn promote_table(&mut self) -> Option<ParsedTable> {
        self.absorb_edits();
        let result = table::promote_at_cursor(&mut self.editor);
        self.after_table_command(result)
    }

    /// Treat the whole document as one Markdown table.
    pub fn convert_document_to_table(&mut self) -> Option<ParsedTable> {
        self.absorb_edits();
        let result = table::promote_document(&mut self.editor);
        self.after_table_command(result)
    }

    /// Offer pasted text to the table detector.
    ///
    /// `false` means the host should insert the text itself.
    pub fn paste(&mut self, text: &str) -> bool {
        if !table::looks_like_pasted_table(text) {
            return false;
        }
        self.absorb_edits();
        let result = table::paste_markdown_table(&mut self.editor, text);
        self.after_table_command(result).is_some()
    }

    fn after_table_command<T>(&mut self, result: Result<T, SyncError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.absorb_edits();
                Some(value)
            }
            Err(err) if err.is_decline() => {
                debug!("Table command declined: {err}");
                None
            }
            Err(err) => {
                warn!("Table command failed: {err}");
                None
            }
        }
    }

    /// Notes to offer for an `@` query.
    pub fn mention_suggestions(&self, query: &str) -> Vec<Suggestion> {
        mention::suggestions(&self.tree, query)
    }

    /// Link a note over `range`, or at the cursor when there is none.
    pub fn insert_mention(&mut self, range: Option<Range<usize>>, note: NoteId) -> Result<(), SyncError> {
        self.absorb_edits();
        let title = match self.tree.note(note) {
            Some(entry) => entry.title.clone(),
            None => return Err(SyncError::Consistency { what: "note", id: note.0 }),
        };
        let range = match range {
            Some(range) => range,
            None => {
                let head = self.editor.selection_head().ok_or(EditorError::NotMounted)?;
                head..head
            }
        };
        mention::insert_note_link(&mut self.editor, range, note, &title)
            .inspect_err(|err| debug!("Mention not inserted: {err}"))?;
        self.absorb_edits();
        Ok(())
    }

    pub fn export_pdf(&mut self, id: NoteId) -> Result<Vec<u8>, SyncError> {
        self.flush_before("export");
        match self.store.export_pdf(id) {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                self.block(format!("Export failed: {err}"));
                Err(err.into())
            }
        }
    }

    pub fn export_zip(&mut self) -> Result<Vec<u8>, SyncError> {
        self.flush_before("export");
        match self.store.export_zip() {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                self.block(format!("Export failed: {err}"));
                Err(err.into())
            }
        }
    }

    pub fn create_folder(&mut self, name: &str, color: &str, parent: Option<FolderId>) -> Result<FolderId, SyncError> {
        let result = self.tree.create_folder(&self.store, name, color, parent);
        let id = self.surface(result, "Could not create folder")?;
        if let Some(parent) = parent {
            self.expanded.insert(parent);
        }
        Ok(id)
    }

    pub fn rename_folder(&mut self, id: FolderId, name: &str) -> Result<(), SyncError> {
        let result = self.tree.rename_folder(&self.store, id, name);
        self.surface(result, "Could not rename folder")
    }

    pub fn delete_folder(&mut self, id: FolderId) -> Result<(), SyncError> {
        self.flush_before("folder delete");
        let result = self.tree.delete_folder(&self.store, id);
        self.surface(result, "Could not delete folder")?;
        self.expanded.retain(|folder| self.tree.folder(*folder).is_some());
        self.notify(Notification::TreeReloaded);
        if let Some(current) = self.current_note_id()
            && self.tree.note(current).is_none()
        {
            self.discard_note();
        }
        Ok(())
    }

    pub fn create_note(&mut self, folder: Option<FolderId>, title: &str) -> Result<NoteId, SyncError> {
        let result = self.tree.create_note(&self.store, folder, title);
        self.surface(result, "Could not create note")
    }

    pub fn rename_note(&mut self, id: NoteId, title: &str) -> Result<(), SyncError> {
        // the rename carries stored content, so unsaved edits go first
        self.flush_before("rename");
        let result = self.tree.rename_note(&self.store, id, title);
        self.surface(result, "Could not rename note")?;
        if let Some(current) = self.current.as_mut()
            && current.id == id
        {
            current.title = title.to_string();
        }
        Ok(())
    }

    pub fn delete_note(&mut self, id: NoteId) -> Result<(), SyncError> {
        self.flush_before("note delete");
        let result = self.tree.delete_note(&self.store, id);
        self.surface(result, "Could not delete note")?;
        self.notify(Notification::TreeReloaded);
        if self.current_note_id() == Some(id) {
            self.discard_note();
        }
        Ok(())
    }

    fn surface<T>(&mut self, result: Result<T, SyncError>, what: &str) -> Result<T, SyncError> {
        result.inspect_err(|err| self.block(format!("{what}: {err}")))
    }
}
