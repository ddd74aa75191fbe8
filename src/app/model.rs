use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::warn;

use crate::autosave::{Autosave, AutosaveConfig, Clock, SaveStatus};
use crate::editor::{EditorError, EditorHandle, RichTextEngine};
use crate::store::{FolderId, NoteId, NoteMetrics, Store};
use crate::tree::{FolderTree, TreeRow};

/// How long a toast stays up.
const TOAST_MS: u64 = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at_ms: u64,
}

/// Events for whatever renders the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    StatusChanged(SaveStatus),
    MetricsChanged(NoteMetrics),
    NoteSelected(NoteId),
    /// The tree mirror was refreshed from the store
    TreeReloaded,
    /// An explicit action failed and the user has to acknowledge it
    Blocking(String),
}

/// The note open in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentNote {
    pub id: NoteId,
    pub title: String,
    pub internal_links: Vec<NoteId>,
    pub external_links: Vec<String>,
}

/// An editing session: one mounted editor, one note at a time, one tree
/// mirror, all owned here and passed around explicitly.
pub struct Session<S: Store, C: Clock> {
    pub(super) store: S,
    pub(super) clock: C,
    pub(super) editor: EditorHandle,
    pub(super) autosave: Autosave,
    pub(super) tree: FolderTree,
    pub(super) expanded: HashSet<FolderId>,
    pub(super) current: Option<CurrentNote>,
    pub(super) metrics: Option<NoteMetrics>,
    toast: Option<Toast>,
    outbox: Vec<Notification>,
    updates_tx: Sender<()>,
    updates_rx: Receiver<()>,
}

impl<S: Store, C: Clock> std::fmt::Debug for Session<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("editor", &self.editor)
            .field("autosave", &self.autosave)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<S: Store, C: Clock> Session<S, C> {
    pub fn new(store: S, clock: C, config: AutosaveConfig) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel();
        Self {
            store,
            clock,
            editor: EditorHandle::new(),
            autosave: Autosave::new(config),
            tree: FolderTree::default(),
            expanded: HashSet::new(),
            current: None,
            metrics: None,
            toast: None,
            outbox: Vec::new(),
            updates_tx,
            updates_rx,
        }
    }

    /// Attach the rich-text engine and start listening to its edits.
    pub fn mount(&mut self, engine: Box<dyn RichTextEngine>) -> Result<(), EditorError> {
        self.editor.mount(engine);
        let tx = self.updates_tx.clone();
        self.editor.on_update(Box::new(move || {
            // the receiver lives as long as the session
            let _ = tx.send(());
        }))
    }

    /// Detach the engine. Pending edits are saved first.
    pub fn unmount(&mut self) -> Option<Box<dyn RichTextEngine>> {
        if let Err(err) = self.flush_pending() {
            warn!("Unsaved edits lost on unmount: {err}");
        }
        self.drain_updates_ignored();
        self.editor.unmount()
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn editor(&self) -> &EditorHandle {
        &self.editor
    }

    pub const fn editor_mut(&mut self) -> &mut EditorHandle {
        &mut self.editor
    }

    pub const fn tree(&self) -> &FolderTree {
        &self.tree
    }

    pub const fn status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub const fn autosave(&self) -> &Autosave {
        &self.autosave
    }

    pub const fn metrics(&self) -> Option<NoteMetrics> {
        self.metrics
    }

    pub const fn current_note(&self) -> Option<&CurrentNote> {
        self.current.as_ref()
    }

    pub fn current_note_id(&self) -> Option<NoteId> {
        self.current.as_ref().map(|note| note.id)
    }

    /// Rows for the tree view under the current expansion state.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        self.tree.visible_rows(&self.expanded)
    }

    pub fn is_expanded(&self, id: FolderId) -> bool {
        self.expanded.contains(&id)
    }

    /// Everything emitted since the last call.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub(super) fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    pub(super) fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at_ms: self.clock.now_ms().saturating_add(TOAST_MS),
        });
    }

    /// Surface a failed explicit action.
    pub(super) fn block(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.show_toast(ToastLevel::Error, message.clone());
        self.notify(Notification::Blocking(message));
    }

    pub(super) fn expire_toast(&mut self, now_ms: u64) -> bool {
        if self.toast.as_ref().is_some_and(|toast| toast.expires_at_ms <= now_ms) {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast.as_ref().map(|toast| (toast.message.as_str(), toast.level))
    }

    /// Number of editor updates queued since the last drain.
    pub(super) fn take_update_count(&mut self) -> usize {
        self.updates_rx.try_iter().count()
    }

    /// Throw away queued updates; used around programmatic loads.
    pub(super) fn drain_updates_ignored(&mut self) {
        let _ = self.take_update_count();
    }
}
