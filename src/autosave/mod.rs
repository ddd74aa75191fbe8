//! Debounced autosave.
//!
//! [`Autosave`] decides *when* to save and tracks the status indicator; the
//! session performs the store call and reports back. Every transition takes
//! the current time as an argument, so tests drive it with a
//! [`ManualClock`] instead of real timers.

mod clock;
mod status;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use status::{Activity, SaveStatus, StatusEvent};
pub use timer::{CancelToken, Scheduler};

use tracing::{debug, trace, warn};

use crate::config::ConfigFlags;
use crate::store::NoteId;

/// Default quiet period before an edit is saved.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
/// Default time `Saved`/`Error` stays on screen.
pub const DEFAULT_COOLDOWN_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub cooldown_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

impl From<&ConfigFlags> for AutosaveConfig {
    fn from(flags: &ConfigFlags) -> Self {
        let defaults = Self::default();
        Self {
            debounce_ms: flags.debounce_ms.unwrap_or(defaults.debounce_ms),
            cooldown_ms: flags.cooldown_ms.unwrap_or(defaults.cooldown_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Save the note whose id was captured when the timer was armed
    Debounce(NoteId),
    Cooldown,
}

/// A save the session must perform now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    pub request: u64,
    pub note_id: NoteId,
    generation: u64,
}

/// Something the session has to act on after a clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveEvent {
    Save(SaveTicket),
    StatusChanged(SaveStatus),
}

#[derive(Debug)]
pub struct Autosave {
    config: AutosaveConfig,
    status: SaveStatus,
    activity: Activity,
    timers: Scheduler<TimerKind>,
    debounce: Option<CancelToken>,
    cooldown: Option<CancelToken>,
    /// Note the unsaved edits belong to, captured when the timer was armed
    dirty_note: Option<NoteId>,
    /// Bumped on every accepted edit
    generation: u64,
    next_request: u64,
    latest_request: Option<u64>,
    in_flight: Vec<u64>,
}

impl Autosave {
    pub fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            status: SaveStatus::Idle,
            activity: Activity::Clean,
            timers: Scheduler::new(),
            debounce: None,
            cooldown: None,
            dirty_note: None,
            generation: 0,
            next_request: 0,
            latest_request: None,
            in_flight: Vec::new(),
        }
    }

    pub const fn config(&self) -> AutosaveConfig {
        self.config
    }

    pub const fn status(&self) -> SaveStatus {
        self.status
    }

    pub const fn activity(&self) -> Activity {
        self.activity
    }

    /// Whether an armed debounce timer is waiting to fire.
    pub const fn is_pending(&self) -> bool {
        self.debounce.is_some()
    }

    /// Whether there are edits no successful save has covered.
    pub fn is_dirty(&self) -> bool {
        self.activity == Activity::Dirty
    }

    /// Requests dispatched and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// When the next timer comes due.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_due()
    }

    /// Content is about to be injected; updates until [`Self::finish_load`]
    /// are not edits.
    ///
    /// Callers flush first. Whatever is still unsaved afterwards is dropped.
    pub fn begin_load(&mut self) {
        if let Some(token) = self.debounce.take() {
            self.timers.cancel(token);
        }
        if self.activity == Activity::Dirty {
            warn!(note = ?self.dirty_note, "Discarding unsaved edits on load");
        }
        self.dirty_note = None;
        self.activity = Activity::Loading;
    }

    pub fn finish_load(&mut self) {
        self.activity = Activity::Clean;
    }

    /// Record an editor update.
    ///
    /// Arms (or re-arms) the debounce timer for `note_id` and returns `true`,
    /// unless a load is in progress, the editor is read-only or no note is
    /// selected.
    pub fn on_edit(&mut self, note_id: Option<NoteId>, editable: bool, now_ms: u64) -> bool {
        if self.activity == Activity::Loading {
            trace!("Update during load ignored");
            return false;
        }
        let Some(note_id) = note_id else {
            return false;
        };
        if !editable {
            trace!("Update while read-only ignored");
            return false;
        }

        self.generation += 1;
        self.activity = Activity::Dirty;
        self.dirty_note = Some(note_id);
        if let Some(token) = self.debounce.take() {
            self.timers.cancel(token);
            trace!(%note_id, "Debounce reset");
        } else {
            trace!(%note_id, "Debounce armed");
        }
        self.debounce = Some(
            self.timers
                .schedule(TimerKind::Debounce(note_id), now_ms, self.config.debounce_ms),
        );
        true
    }

    /// Fire whatever timers have come due.
    pub fn poll(&mut self, now_ms: u64) -> Vec<AutosaveEvent> {
        let mut events = Vec::new();
        for (token, kind) in self.timers.take_due(now_ms) {
            match kind {
                TimerKind::Debounce(note_id) => {
                    if self.debounce == Some(token) {
                        self.debounce = None;
                    }
                    if self.activity == Activity::Dirty {
                        let ticket = self.dispatch(note_id);
                        events.push(AutosaveEvent::StatusChanged(self.status));
                        events.push(AutosaveEvent::Save(ticket));
                    } else {
                        trace!(%note_id, "Debounce fired with nothing to save");
                    }
                }
                TimerKind::Cooldown => {
                    if self.cooldown == Some(token) {
                        self.cooldown = None;
                        if self.set_status(StatusEvent::CooldownElapsed) {
                            events.push(AutosaveEvent::StatusChanged(self.status));
                        }
                    }
                }
            }
        }
        events
    }

    /// Save pending edits right now, bound to the note they were made in.
    ///
    /// Covers both an armed timer and edits left dirty by a failed save.
    pub fn flush(&mut self) -> Option<SaveTicket> {
        if let Some(token) = self.debounce.take() {
            self.timers.cancel(token);
        }
        if self.activity != Activity::Dirty {
            return None;
        }
        let note_id = self.dirty_note?;
        debug!(%note_id, "Flushing pending save");
        Some(self.dispatch(note_id))
    }

    fn dispatch(&mut self, note_id: NoteId) -> SaveTicket {
        self.next_request += 1;
        let ticket = SaveTicket {
            request: self.next_request,
            note_id,
            generation: self.generation,
        };
        self.in_flight.push(ticket.request);
        self.latest_request = Some(ticket.request);
        if let Some(token) = self.cooldown.take() {
            self.timers.cancel(token);
        }
        self.set_status(StatusEvent::Dispatched);
        debug!(%note_id, request = ticket.request, "Save dispatched");
        ticket
    }

    /// Report how a dispatched save ended.
    ///
    /// Returns the new status when it changed. Only the most recent request
    /// moves the indicator; an older one finishing late is ignored apart
    /// from clearing the dirty flag when nothing was edited since.
    pub fn complete(&mut self, ticket: SaveTicket, ok: bool, now_ms: u64) -> Option<SaveStatus> {
        self.in_flight.retain(|r| *r != ticket.request);

        if ok
            && ticket.generation == self.generation
            && self.activity == Activity::Dirty
            && self.dirty_note == Some(ticket.note_id)
        {
            self.activity = Activity::Clean;
        }

        if self.latest_request != Some(ticket.request) {
            debug!(request = ticket.request, "Superseded save finished");
            return None;
        }

        let event = if ok {
            debug!(note_id = %ticket.note_id, "Save succeeded");
            StatusEvent::Succeeded
        } else {
            warn!(note_id = %ticket.note_id, "Save failed; edits stay pending");
            StatusEvent::Failed
        };
        if !self.set_status(event) {
            return None;
        }
        self.cooldown = Some(
            self.timers
                .schedule(TimerKind::Cooldown, now_ms, self.config.cooldown_ms),
        );
        Some(self.status)
    }

    fn set_status(&mut self, event: StatusEvent) -> bool {
        let next = self.status.next(event);
        let changed = next != self.status;
        self.status = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NoteId = NoteId(1);
    const B: NoteId = NoteId(2);

    fn autosave() -> Autosave {
        Autosave::new(AutosaveConfig {
            debounce_ms: 100,
            cooldown_ms: 50,
        })
    }

    fn saves(events: &[AutosaveEvent]) -> Vec<SaveTicket> {
        events
            .iter()
            .filter_map(|e| match e {
                AutosaveEvent::Save(ticket) => Some(*ticket),
                AutosaveEvent::StatusChanged(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_edits_within_window_coalesce() {
        let mut autosave = autosave();
        for t in [0, 30, 60, 90] {
            assert!(autosave.on_edit(Some(A), true, t));
        }
        assert!(saves(&autosave.poll(189)).is_empty());
        let fired = saves(&autosave.poll(190));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].note_id, A);
        assert!(saves(&autosave.poll(1_000)).is_empty());
    }

    #[test]
    fn test_spaced_edits_each_save() {
        let mut autosave = autosave();
        autosave.on_edit(Some(A), true, 0);
        let first = saves(&autosave.poll(100));
        autosave.complete(first[0], true, 100);
        autosave.on_edit(Some(A), true, 300);
        let second = saves(&autosave.poll(400));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_load_suppresses_scheduling() {
        let mut autosave = autosave();
        autosave.begin_load();
        assert!(!autosave.on_edit(Some(A), true, 0));
        autosave.finish_load();
        assert!(!autosave.is_pending());
        assert!(autosave.poll(1_000).is_empty());
    }

    #[test]
    fn test_read_only_never_arms() {
        let mut autosave = autosave();
        assert!(!autosave.on_edit(Some(A), false, 0));
        assert!(!autosave.is_dirty());
    }

    #[test]
    fn test_status_cycle_with_cooldown() {
        let mut autosave = autosave();
        autosave.on_edit(Some(A), true, 0);
        let events = autosave.poll(100);
        assert_eq!(autosave.status(), SaveStatus::Saving);
        assert!(events.contains(&AutosaveEvent::StatusChanged(SaveStatus::Saving)));

        let ticket = saves(&events)[0];
        assert_eq!(autosave.complete(ticket, true, 110), Some(SaveStatus::Saved));
        assert!(!autosave.is_dirty());
        assert_eq!(
            autosave.poll(160),
            vec![AutosaveEvent::StatusChanged(SaveStatus::Idle)]
        );
    }

    #[test]
    fn test_failure_keeps_edits_dirty_without_retry_loop() {
        let mut autosave = autosave();
        autosave.on_edit(Some(A), true, 0);
        let ticket = saves(&autosave.poll(100))[0];
        assert_eq!(autosave.complete(ticket, false, 100), Some(SaveStatus::Error));
        assert!(autosave.is_dirty());

        // cooldown returns to idle but nothing re-dispatches on its own
        let later = autosave.poll(10_000);
        assert!(saves(&later).is_empty());
        assert_eq!(autosave.status(), SaveStatus::Idle);

        // an explicit flush retries against the same note
        let retry = autosave.flush().unwrap();
        assert_eq!(retry.note_id, A);
    }

    #[test]
    fn test_flush_uses_id_captured_at_arm_time() {
        let mut autosave = autosave();
        autosave.on_edit(Some(A), true, 0);
        let ticket = autosave.flush().unwrap();
        assert_eq!(ticket.note_id, A);
        assert!(!autosave.is_pending());

        autosave.complete(ticket, true, 5);
        autosave.begin_load();
        autosave.finish_load();
        autosave.on_edit(Some(B), true, 10);
        assert_eq!(autosave.flush().unwrap().note_id, B);
    }

    #[test]
    fn test_flush_with_nothing_pending() {
        let mut autosave = autosave();
        assert_eq!(autosave.flush(), None);
    }

    #[test]
    fn test_edit_during_flight_keeps_note_dirty() {
        let mut autosave = autosave();
        autosave.on_edit(Some(A), true, 0);
        let ticket = saves(&autosave.poll(100))[0];
        autosave.on_edit(Some(A), true, 120);
        autosave.complete(ticket, true, 130);
        assert!(autosave.is_dirty());
        assert!(autosave.is_pending());
    }

    #[test]
    fn test_stale_completion_does_not_move_status() {
        let mut autosave = autosave();
        autosave.on_edit(Some(A), true, 0);
        let older = saves(&autosave.poll(100))[0];
        autosave.on_edit(Some(A), true, 110);
        let newer = saves(&autosave.poll(210))[0];

        assert_eq!(autosave.complete(older, false, 220), None);
        assert_eq!(autosave.status(), SaveStatus::Saving);
        assert_eq!(autosave.complete(newer, true, 230), Some(SaveStatus::Saved));
        assert_eq!(autosave.in_flight(), 0);
    }

    #[test]
    fn test_config_from_flags() {
        let flags = ConfigFlags {
            debounce_ms: Some(250),
            ..ConfigFlags::default()
        };
        let config = AutosaveConfig::from(&flags);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.cooldown_ms, DEFAULT_COOLDOWN_MS);
    }
}
