//! Cancellable one-shot timers driven by an external clock.
//!
//! Nothing here sleeps. The owner passes `now_ms` in and collects whatever
//! has come due.

/// Handle returned by [`Scheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelToken(u64);

#[derive(Debug)]
struct Timer<T> {
    token: CancelToken,
    due_ms: u64,
    payload: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    next_token: u64,
    timers: Vec<Timer<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub const fn new() -> Self {
        Self {
            next_token: 0,
            timers: Vec::new(),
        }
    }

    /// Fire `payload` once `delay_ms` has elapsed after `now_ms`.
    pub fn schedule(&mut self, payload: T, now_ms: u64, delay_ms: u64) -> CancelToken {
        self.next_token += 1;
        let token = CancelToken(self.next_token);
        self.timers.push(Timer {
            token,
            due_ms: now_ms.saturating_add(delay_ms),
            payload,
        });
        token
    }

    /// Drop a pending timer. Returns its payload if it had not fired yet.
    pub fn cancel(&mut self, token: CancelToken) -> Option<T> {
        let idx = self.timers.iter().position(|t| t.token == token)?;
        Some(self.timers.remove(idx).payload)
    }

    pub fn is_pending(&self, token: CancelToken) -> bool {
        self.timers.iter().any(|t| t.token == token)
    }

    /// Remove and return every timer due at `now_ms`, earliest first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<(CancelToken, T)> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|t| t.due_ms <= now_ms);
        self.timers = pending;
        due.sort_by_key(|t| (t.due_ms, t.token.0));
        due.into_iter().map(|t| (t.token, t.payload)).collect()
    }

    /// When the next timer comes due, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_ms).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
