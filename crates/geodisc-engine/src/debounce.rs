//! Cancellable single-shot timer for free-text edits.
//!
//! Scheduling replaces any pending deadline, so only the latest edit can
//! fire. The owner drives time: it sleeps until [`Debouncer::deadline`] and
//! then calls [`Debouncer::poll`].

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arms (or re-arms) the timer relative to `now`.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        if self.deadline.is_some() {
            tracing::debug!("debounce timer restarted");
        }
        let deadline = now + self.window;
        self.deadline = Some(deadline);
        deadline
    }

    /// Disarms the timer. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fires (and disarms) the timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
