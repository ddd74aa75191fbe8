//! Save status and edit activity.

use std::fmt;

/// What the status indicator shows. One slot, not a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Inputs to the status transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A save request left for the store
    Dispatched,
    Succeeded,
    Failed,
    /// The post-save display period ran out
    CooldownElapsed,
}

impl SaveStatus {
    /// Apply one event.
    ///
    /// | from            | event           | to     |
    /// |-----------------|-----------------|--------|
    /// | any             | Dispatched      | Saving |
    /// | Saving          | Succeeded       | Saved  |
    /// | Saving          | Failed          | Error  |
    /// | Saved, Error    | CooldownElapsed | Idle   |
    ///
    /// Every other pair leaves the status alone.
    #[must_use]
    pub const fn next(self, event: StatusEvent) -> Self {
        match (self, event) {
            (_, StatusEvent::Dispatched) => Self::Saving,
            (Self::Saving, StatusEvent::Succeeded) => Self::Saved,
            (Self::Saving, StatusEvent::Failed) => Self::Error,
            (Self::Saved | Self::Error, StatusEvent::CooldownElapsed) => Self::Idle,
            (status, _) => status,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Saving => "Saving...",
            Self::Saved => "Saved",
            Self::Error => "Save failed",
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Relationship between the editor contents and the last good save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    /// A note is being injected; updates are not user edits
    Loading,
    /// Nothing to save
    #[default]
    Clean,
    /// Edited since the last successful save
    Dirty,
}
