//! The editing session.
//!
//! This module follows The Elm Architecture (TEA):
//! - [`Session`]: the complete session state, owned by whoever mounts the editor
//! - [`Message`]: all commands and events a session reacts to
//! - [`Session::update`]: applies a message, touching the store where needed
//! - [`Session::run`]: event loop driven by a message channel and the clock
//!
//! Engine updates reach the session through a channel and are turned into
//! autosave edits on the next message or tick, never inside the engine's
//! own callback.

mod effects;
mod event_loop;
mod model;
mod update;

pub use event_loop::Surface;
pub use model::{CurrentNote, Notification, Session, ToastLevel};
pub use update::{Message, Outcome};
