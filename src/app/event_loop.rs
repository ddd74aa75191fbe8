use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::app::{Message, Notification, Outcome, Session};
use crate::autosave::Clock;
use crate::store::Store;

/// Longest wait when no timer is armed.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Receives what the loop produces.
pub trait Surface {
    fn notify(&mut self, notification: &Notification);

    fn outcome(&mut self, _outcome: Outcome) {}
}

impl<S: Store, C: Clock> Session<S, C> {
    /// Drive the session from a message channel until it disconnects.
    ///
    /// The loop sleeps until the next autosave deadline or message, ticks,
    /// and hands notifications to `surface`. Pending edits are flushed on
    /// the way out.
    pub fn run(&mut self, rx: &Receiver<Message>, surface: &mut impl Surface) {
        loop {
            let timeout = self.wait_time();
            match rx.recv_timeout(timeout) {
                Ok(msg) => {
                    debug!(?msg, "Message");
                    let outcome = self.update(msg);
                    if outcome != Outcome::Done {
                        surface.outcome(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.tick();
            self.deliver(surface);
        }
        if let Err(err) = self.flush_pending() {
            warn!("Final save failed: {err}");
        }
        self.deliver(surface);
    }

    fn wait_time(&self) -> Duration {
        self.next_deadline().map_or(IDLE_POLL, |deadline| {
            let now = self.clock.now_ms();
            Duration::from_millis(deadline.saturating_sub(now)).min(IDLE_POLL)
        })
    }

    fn deliver(&mut self, surface: &mut impl Surface) {
        for notification in self.take_notifications() {
            surface.notify(&notification);
        }
    }
}
