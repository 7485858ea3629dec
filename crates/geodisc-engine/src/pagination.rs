//! Per-kind cursors and the "load more" gate.
//!
//! Cursors advance by the number of records actually returned, never by the
//! requested page size. Exhaustion sticks until the cursors are reset by a
//! criteria change.

use geodisc_core::{EntityKind, PageInfo, SearchPage, TypeSelector};
use serde::Serialize;

use crate::aggregate::ResultStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaginationCursor {
    pub next_offset: usize,
    pub exhausted: bool,
}

impl PaginationCursor {
    /// Moves past `returned` records.
    ///
    /// With a backend hint, `has_more == false` (or an empty page) exhausts
    /// the cursor; without one, a short page does.
    pub fn advance(&mut self, returned: usize, requested: usize, has_more: Option<bool>) {
        self.next_offset += returned;
        let exhausted = match has_more {
            Some(more) => !more || returned == 0,
            None => returned < requested,
        };
        if exhausted {
            self.exhausted = true;
        }
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }
}

/// One cursor per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cursors {
    pub places: PaginationCursor,
    pub happenings: PaginationCursor,
}

impl Cursors {
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> PaginationCursor {
        match kind {
            EntityKind::Place => self.places,
            EntityKind::Happening => self.happenings,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut PaginationCursor {
        match kind {
            EntityKind::Place => &mut self.places,
            EntityKind::Happening => &mut self.happenings,
        }
    }

    /// Whether every kind relevant to `selector` is exhausted.
    #[must_use]
    pub fn all_exhausted(&self, selector: TypeSelector) -> bool {
        EntityKind::ALL
            .iter()
            .filter(|kind| selector.includes(**kind))
            .all(|kind| self.get(*kind).exhausted)
    }
}

/// Outcome of a "load more" trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreDecision {
    /// Fetch these kinds from the current cursors.
    Issue(TypeSelector),
    /// A load-more call is outstanding; one follow-up is queued.
    Deferred,
    /// Every relevant kind is exhausted.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct PaginationCoordinator {
    cursors: Cursors,
    in_flight: bool,
    pending: bool,
    page_size: usize,
}

impl PaginationCoordinator {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            cursors: Cursors::default(),
            in_flight: false,
            pending: false,
            page_size,
        }
    }

    #[must_use]
    pub fn cursors(&self) -> Cursors {
        self.cursors
    }

    /// Whether a load-more call is outstanding, current or stale.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Back to offset 0 for a new criteria generation.
    ///
    /// An outstanding load-more call stays tracked until it resolves so a
    /// second one is never issued alongside it; its result will be stale.
    pub fn reset(&mut self) {
        self.cursors = Cursors::default();
        self.pending = false;
    }

    /// Records page 0 for the kinds selected by `selector`.
    pub fn apply_first_page(&mut self, selector: TypeSelector, page: &SearchPage) {
        for kind in EntityKind::ALL {
            if selector.includes(kind) {
                let hint = page.page_info.map(|info| info.has_more(kind));
                self.cursors
                    .get_mut(kind)
                    .advance(page.count(kind), self.page_size, hint);
                log_hint_mismatch(kind, self.cursors.get(kind), page.page_info);
            }
        }
    }

    /// Gate for a load-more trigger under the current `selector`.
    pub fn plan_more(&mut self, selector: TypeSelector) -> MoreDecision {
        if self.in_flight {
            if !self.pending {
                tracing::debug!("load-more already in flight; queueing one follow-up");
            }
            self.pending = true;
            return MoreDecision::Deferred;
        }

        let wanted = |kind| selector.includes(kind) && !self.cursors.get(kind).exhausted;
        match TypeSelector::covering(wanted(EntityKind::Place), wanted(EntityKind::Happening)) {
            Some(narrowed) => {
                self.in_flight = true;
                MoreDecision::Issue(narrowed)
            }
            None => MoreDecision::Exhausted,
        }
    }

    /// Marks the outstanding call resolved, whatever its generation.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Appends a load-more page for the kinds in `selector` and advances
    /// their cursors. Returns the number of records appended.
    pub fn apply_more(
        &mut self,
        selector: TypeSelector,
        mut page: SearchPage,
        store: &mut ResultStore,
    ) -> usize {
        let mut appended = 0;
        for kind in EntityKind::ALL {
            if selector.includes(kind) {
                let added = store.append(kind, &mut page);
                let hint = page.page_info.map(|info| info.has_more(kind));
                self.cursors
                    .get_mut(kind)
                    .advance(added, self.page_size, hint);
                log_hint_mismatch(kind, self.cursors.get(kind), page.page_info);
                appended += added;
            }
        }
        appended
    }

    /// Exhausts the kinds in `selector` after an unusable response.
    pub fn exhaust(&mut self, selector: TypeSelector) {
        for kind in EntityKind::ALL {
            if selector.includes(kind) {
                self.cursors.get_mut(kind).mark_exhausted();
            }
        }
    }

    /// Drops a queued follow-up without issuing it.
    pub fn clear_pending(&mut self) {
        self.pending = false;
    }

    /// Takes the queued follow-up, if any.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

fn log_hint_mismatch(kind: EntityKind, cursor: PaginationCursor, info: Option<PageInfo>) {
    if let Some(info) = info {
        let hinted = info.next_offset(kind);
        if hinted != cursor.next_offset {
            tracing::debug!(
                %kind,
                hinted,
                next_offset = cursor.next_offset,
                "backend next offset differs from returned count"
            );
        }
    }
}
