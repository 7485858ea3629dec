//! Cluster expand/collapse state machine.
//!
//! Two orthogonal regions:
//!
//! - expansion: `idle` or `expanded(key)`, at most one key at a time;
//! - settle: nothing, or `closing(key, deadline)` carrying the leg positions
//!   captured at collapse time so the exit can retrace them.
//!
//! Rendering is a projection of [`InteractionState`]
//! (see [`crate::grouping::project_markers`]). Timers are owned by the
//! caller: it reads [`InteractionMachine::settle_timer`] and feeds back
//! [`InteractionEvent::TimerElapsed`] with the id it was given.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::grouping::SpiderLeg;

/// A cluster collapsing back toward its centroid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosingGroup {
    pub key: String,
    /// Identifies the settle timer armed for this closing.
    pub timer_id: u64,
    #[serde(skip)]
    pub deadline: Instant,
    pub legs: Vec<SpiderLeg>,
}

/// Snapshot of interaction state shared by the list and the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionState {
    expanded: Option<String>,
    closing: Option<ClosingGroup>,
    active_item: Option<String>,
}

impl InteractionState {
    #[must_use]
    pub fn expanded_group_key(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    #[must_use]
    pub fn closing_group_key(&self) -> Option<&str> {
        self.closing.as_ref().map(|c| c.key.as_str())
    }

    #[must_use]
    pub fn closing(&self) -> Option<&ClosingGroup> {
        self.closing.as_ref()
    }

    /// Record highlighted in both the list and the map.
    #[must_use]
    pub fn active_item_id(&self) -> Option<&str> {
        self.active_item.as_deref()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.expanded.is_none() && self.closing.is_none()
    }
}

/// Discrete inputs to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    /// A cluster badge (or spider centre) was clicked.
    Activate { key: String },
    /// A click on the map that hit no marker or cluster.
    BackgroundClick,
    /// A settle timer fired.
    TimerElapsed { timer_id: u64 },
    /// A single record was picked from the list or the map.
    SelectItem { id: String },
}

#[derive(Debug, Clone)]
pub struct InteractionMachine {
    state: InteractionState,
    settle: Duration,
    next_timer_id: u64,
}

impl InteractionMachine {
    #[must_use]
    pub fn new(settle: Duration) -> Self {
        Self {
            state: InteractionState::default(),
            settle,
            next_timer_id: 1,
        }
    }

    #[must_use]
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// The armed settle timer as `(timer_id, deadline)`, if any.
    #[must_use]
    pub fn settle_timer(&self) -> Option<(u64, Instant)> {
        self.state
            .closing
            .as_ref()
            .map(|c| (c.timer_id, c.deadline))
    }

    /// Applies one event. `capture` returns the current leg positions of the
    /// group being collapsed. Returns `true` if the state changed.
    pub fn handle<F>(&mut self, event: InteractionEvent, now: Instant, capture: F) -> bool
    where
        F: FnOnce(&str) -> Vec<SpiderLeg>,
    {
        match event {
            InteractionEvent::Activate { key } => self.activate(&key, now, capture),
            InteractionEvent::BackgroundClick => self.background_click(now, capture),
            InteractionEvent::TimerElapsed { timer_id } => self.timer_elapsed(timer_id),
            InteractionEvent::SelectItem { id } => self.select_item(&id),
        }
    }

    /// Toggles `key`: collapses it if it is the expanded group, otherwise
    /// expands it immediately, collapsing whatever was expanded before.
    pub fn activate<F>(&mut self, key: &str, now: Instant, capture: F) -> bool
    where
        F: FnOnce(&str) -> Vec<SpiderLeg>,
    {
        match self.state.expanded.take() {
            Some(current) if current == key => {
                tracing::debug!(key, "collapsing expanded group");
                self.begin_closing(current, now, capture);
            }
            Some(previous) => {
                tracing::debug!(from = %previous, to = key, "switching expanded group");
                // Replaces any earlier exit still settling.
                self.begin_closing(previous, now, capture);
                self.state.expanded = Some(key.to_string());
            }
            None => {
                if self.state.closing_group_key() == Some(key) {
                    self.state.closing = None;
                }
                tracing::debug!(key, "expanding group");
                self.state.expanded = Some(key.to_string());
            }
        }
        true
    }

    /// Collapses any expanded group and dismisses the active item.
    pub fn background_click<F>(&mut self, now: Instant, capture: F) -> bool
    where
        F: FnOnce(&str) -> Vec<SpiderLeg>,
    {
        let mut changed = self.state.active_item.take().is_some();
        if let Some(current) = self.state.expanded.take() {
            self.begin_closing(current, now, capture);
            changed = true;
        }
        changed
    }

    /// Clears the closing group only if `timer_id` is the one armed for it.
    pub fn timer_elapsed(&mut self, timer_id: u64) -> bool {
        match &self.state.closing {
            Some(closing) if closing.timer_id == timer_id => {
                tracing::debug!(key = %closing.key, "closing group settled");
                self.state.closing = None;
                true
            }
            _ => false,
        }
    }

    pub fn select_item(&mut self, id: &str) -> bool {
        if self.state.active_item.as_deref() == Some(id) {
            return false;
        }
        self.state.active_item = Some(id.to_string());
        true
    }

    /// Drops all group state after a full data refresh. The active item is
    /// kept only if `still_present` says it survived the refresh.
    pub fn reset_groups(&mut self, still_present: impl Fn(&str) -> bool) {
        self.state.expanded = None;
        self.state.closing = None;
        if let Some(id) = &self.state.active_item {
            if !still_present(id) {
                self.state.active_item = None;
            }
        }
    }

    fn begin_closing<F>(&mut self, key: String, now: Instant, capture: F)
    where
        F: FnOnce(&str) -> Vec<SpiderLeg>,
    {
        let legs = capture(&key);
        let timer_id = self.next_timer_id;
        self.next_timer_id += 1;
        self.state.closing = Some(ClosingGroup {
            key,
            timer_id,
            deadline: now + self.settle,
            legs,
        });
    }
}
