//! Filter criteria ownership, debounced commits and the generation guard.
//!
//! Every committed criteria change advances the generation. A response is
//! applied only if its ticket carries the current generation, so the latest
//! issued fetch wins regardless of completion order.

use std::time::Duration;

use geodisc_core::{Coordinate, SearchQuery, TypeSelector};
use serde::Serialize;
use tokio::time::Instant;

use crate::criteria::FilterCriteria;
use crate::debounce::Debouncer;

/// Issuance order of committed criteria changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic counter deciding which responses are still wanted.
#[derive(Debug, Clone, Default)]
pub struct GenerationGuard {
    current: Generation,
}

impl GenerationGuard {
    #[must_use]
    pub fn current(&self) -> Generation {
        self.current
    }

    /// Starts a new generation, superseding every earlier one.
    pub fn advance(&mut self) -> Generation {
        self.current = Generation(self.current.0 + 1);
        self.current
    }

    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.current
    }
}

/// How a response is merged into the result arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Page 0 after a criteria change: replaces both arrays.
    Replace,
    /// "Load more": appends to the arrays of the requested kinds.
    Append,
}

/// Travels with a backend call and comes back with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: Generation,
    pub mode: FetchMode,
    /// Kinds the call was issued for.
    pub selector: TypeSelector,
}

/// A backend call the owner must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub ticket: FetchTicket,
    pub query: SearchQuery,
}

#[derive(Debug, Clone)]
pub struct FilterPipeline {
    criteria: FilterCriteria,
    committed: FilterCriteria,
    debouncer: Debouncer,
    guard: GenerationGuard,
    replace_in_flight: Option<Generation>,
    page_size: usize,
}

impl FilterPipeline {
    #[must_use]
    pub fn new(page_size: usize, debounce: Duration) -> Self {
        Self {
            criteria: FilterCriteria::default(),
            committed: FilterCriteria::default(),
            debouncer: Debouncer::new(debounce),
            guard: GenerationGuard::default(),
            replace_in_flight: None,
            page_size,
        }
    }

    /// Live criteria, including uncommitted free text.
    #[must_use]
    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Criteria of the last committed fetch.
    #[must_use]
    pub fn committed(&self) -> &FilterCriteria {
        &self.committed
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.guard.current()
    }

    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.guard.is_current(generation)
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn is_replace_in_flight(&self) -> bool {
        self.replace_in_flight.is_some()
    }

    #[must_use]
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Records a text edit and (re)arms the debounce timer. Never fetches.
    pub fn set_free_text(&mut self, text: &str, now: Instant) {
        self.criteria.free_text = text.to_string();
        self.debouncer.schedule(now);
    }

    /// Commits pending free text once the debounce window has passed.
    ///
    /// Returns `None` if the timer has not fired, or if the text is back to
    /// what was last committed.
    pub fn poll_debounce(&mut self, now: Instant) -> Option<SearchRequest> {
        if !self.debouncer.poll(now) {
            return None;
        }
        if !self.criteria.differs_server_side(&self.committed) {
            tracing::debug!("debounced text unchanged; no fetch");
            return None;
        }
        Some(self.commit())
    }

    pub fn set_type_selector(&mut self, selector: TypeSelector) -> Option<SearchRequest> {
        if self.criteria.type_selector == selector {
            return None;
        }
        self.criteria.type_selector = selector;
        Some(self.commit())
    }

    pub fn set_category(&mut self, slug: Option<String>) -> Option<SearchRequest> {
        if self.criteria.category_slug == slug {
            return None;
        }
        self.criteria.category_slug = slug;
        Some(self.commit())
    }

    pub fn set_featured_only(&mut self, featured_only: bool) -> Option<SearchRequest> {
        if self.criteria.featured_only == featured_only {
            return None;
        }
        self.criteria.featured_only = featured_only;
        Some(self.commit())
    }

    /// Client-side narrowing only; never fetches.
    pub fn set_proximity_anchor(&mut self, anchor: Option<Coordinate>) {
        self.criteria.proximity_anchor = anchor;
    }

    /// Client-side narrowing only; never fetches.
    pub fn set_proximity_radius(&mut self, radius_meters: Option<f64>) {
        self.criteria.proximity_radius_meters = radius_meters;
    }

    /// Restores default criteria and fetches page 0.
    pub fn reset(&mut self) -> SearchRequest {
        self.criteria = FilterCriteria::default();
        self.commit()
    }

    /// Fetches page 0 for the live criteria unconditionally.
    pub fn commit(&mut self) -> SearchRequest {
        if self.debouncer.cancel() {
            tracing::debug!("pending debounce superseded by commit");
        }
        let generation = self.guard.advance();
        self.committed = self.criteria.clone();
        self.replace_in_flight = Some(generation);
        let selector = self.committed.type_selector;

        tracing::info!(
            generation = generation.value(),
            free_text = %self.committed.free_text.trim(),
            selector = selector.as_str(),
            category = ?self.committed.category_slug,
            featured_only = self.committed.featured_only,
            "criteria committed"
        );

        SearchRequest {
            ticket: FetchTicket {
                generation,
                mode: FetchMode::Replace,
                selector,
            },
            query: self.committed.to_query(selector, self.page_size, 0, 0),
        }
    }

    /// Decides whether a page-0 response may be applied.
    pub fn accept_replace(&mut self, generation: Generation) -> bool {
        if !self.guard.is_current(generation) {
            tracing::debug!(
                generation = generation.value(),
                current = self.guard.current().value(),
                "discarding stale page-0 response"
            );
            return false;
        }
        self.replace_in_flight = None;
        true
    }
}
