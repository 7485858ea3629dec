//! The discovery session: one owner for criteria, results, cursors and
//! interaction state.
//!
//! The session performs no I/O. Operations that need the backend return a
//! [`SearchRequest`]; the owner runs it and hands the outcome back through
//! [`DiscoverySession::on_response`]. Time is passed in explicitly.

use geodisc_core::{
    BackendError, CategoryCatalog, Coordinate, EntityKind, SearchPage, TypeSelector,
};
use serde::Serialize;
use tokio::time::Instant;

use crate::aggregate::{marker_points, unify, DiscoverableItem, ResultStore};
use crate::backend::GeolocationError;
use crate::config::EngineConfig;
use crate::criteria::{step_radius, FilterCriteria, RadiusStep};
use crate::error::SessionError;
use crate::geo::{BoundingBox, Geofence};
use crate::grouping::{
    group_markers, project_markers, spider_legs, PositionGroup, RenderedMarker, SpiderLeg,
};
use crate::interaction::{InteractionMachine, InteractionState};
use crate::pagination::{Cursors, MoreDecision, PaginationCoordinator};
use crate::pipeline::{FetchMode, FetchTicket, FilterPipeline, SearchRequest};

/// Segments used for the proximity ring in snapshots.
pub const OVERLAY_SEGMENTS: usize = 64;

/// A record that passed the geofence, with its distance from the anchor
/// when proximity mode is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleItem {
    pub item: DiscoverableItem,
    pub distance_meters: Option<f64>,
}

/// Which failed call a retry re-issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryTarget {
    Search,
    FetchMore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// A page-0 fetch is outstanding.
    pub loading: bool,
    /// A load-more fetch is outstanding.
    pub loading_more: bool,
    /// Free text is waiting for the debounce window.
    pub search_pending: bool,
    /// A geolocation reading is outstanding.
    pub locating: bool,
    /// The last fetch failed transiently and can be retried.
    pub retry: Option<RetryTarget>,
    /// The last geolocation request was denied or failed.
    pub proximity_unavailable: bool,
}

impl SessionStatus {
    /// Nothing is loading, debouncing or locating.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading && !self.loading_more && !self.search_pending && !self.locating
    }
}

/// Everything the presentation layer reads, in one serializable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub criteria: FilterCriteria,
    pub visible_items: Vec<VisibleItem>,
    pub visible_count: usize,
    pub total_loaded: usize,
    pub marker_groups: Vec<PositionGroup>,
    pub rendered_markers: Vec<RenderedMarker>,
    pub proximity_overlay: Option<Vec<Coordinate>>,
    pub interaction: InteractionState,
    pub status: SessionStatus,
    pub cursors: Cursors,
    pub zoom: f64,
    /// Commands processed by the driver when this snapshot was taken.
    pub commands_applied: u64,
    /// Why the most recent command was rejected, if it was.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoverySession {
    config: EngineConfig,
    catalog: CategoryCatalog,
    pipeline: FilterPipeline,
    pager: PaginationCoordinator,
    store: ResultStore,
    interaction: InteractionMachine,
    bounds: Option<BoundingBox>,
    zoom: f64,
    retry: Option<RetryTarget>,
    locating: bool,
    proximity_unavailable: bool,
    items: Vec<DiscoverableItem>,
    groups: Vec<PositionGroup>,
    visible: Vec<VisibleItem>,
}

impl DiscoverySession {
    #[must_use]
    pub fn new(config: EngineConfig, catalog: CategoryCatalog) -> Self {
        Self {
            pipeline: FilterPipeline::new(config.page_size, config.debounce),
            pager: PaginationCoordinator::new(config.page_size),
            store: ResultStore::new(),
            interaction: InteractionMachine::new(config.settle),
            bounds: None,
            zoom: config.initial_zoom,
            retry: None,
            locating: false,
            proximity_unavailable: false,
            items: Vec::new(),
            groups: Vec::new(),
            visible: Vec::new(),
            config,
            catalog,
        }
    }

    /// Fetches page 0 for the current criteria (initial load or manual refresh).
    pub fn refresh(&mut self) -> SearchRequest {
        let request = self.pipeline.commit();
        self.committed(request)
    }

    /// Records a free-text edit. The fetch happens after the debounce window.
    pub fn set_free_text(&mut self, text: &str, now: Instant) {
        self.pipeline.set_free_text(text, now);
    }

    pub fn poll_debounce(&mut self, now: Instant) -> Option<SearchRequest> {
        let request = self.pipeline.poll_debounce(now)?;
        Some(self.committed(request))
    }

    #[must_use]
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.pipeline.debounce_deadline()
    }

    pub fn set_type_selector(&mut self, selector: TypeSelector) -> Option<SearchRequest> {
        let request = self.pipeline.set_type_selector(selector)?;
        Some(self.committed(request))
    }

    /// Narrows to one catalog category, or clears the category with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownCategory`] if `slug` is not in the catalog.
    pub fn set_category(
        &mut self,
        slug: Option<&str>,
    ) -> Result<Option<SearchRequest>, SessionError> {
        if let Some(slug) = slug {
            if self.catalog.find_by_slug(slug).is_none() {
                return Err(SessionError::UnknownCategory(slug.to_string()));
            }
        }
        Ok(self
            .pipeline
            .set_category(slug.map(str::to_string))
            .map(|request| self.committed(request)))
    }

    pub fn set_featured_only(&mut self, featured_only: bool) -> Option<SearchRequest> {
        let request = self.pipeline.set_featured_only(featured_only)?;
        Some(self.committed(request))
    }

    /// Sets or clears the proximity anchor. Narrows client-side only.
    pub fn set_proximity_anchor(&mut self, anchor: Option<Coordinate>) {
        if anchor.is_some() {
            self.proximity_unavailable = false;
        }
        self.pipeline.set_proximity_anchor(anchor);
        self.refilter();
    }

    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRadius`] unless `meters` is finite and positive.
    pub fn set_radius(&mut self, meters: f64) -> Result<(), SessionError> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(SessionError::InvalidRadius(meters));
        }
        self.pipeline.set_proximity_radius(Some(meters));
        self.refilter();
        Ok(())
    }

    /// Moves the radius one step up or down and returns the new value.
    pub fn step_radius(&mut self, step: RadiusStep) -> f64 {
        let next = step_radius(self.radius_meters(), step);
        self.pipeline.set_proximity_radius(Some(next));
        self.refilter();
        next
    }

    /// Viewport bounds, used only while no proximity anchor is set.
    pub fn set_bounds(&mut self, bounds: Option<BoundingBox>) {
        self.bounds = bounds;
        self.refilter();
    }

    /// # Errors
    ///
    /// Returns [`SessionError::InvalidZoom`] for negative or non-finite zoom.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), SessionError> {
        if !zoom.is_finite() || zoom < 0.0 {
            return Err(SessionError::InvalidZoom(zoom));
        }
        self.zoom = zoom;
        Ok(())
    }

    /// Restores default criteria and fetches page 0.
    pub fn reset(&mut self) -> SearchRequest {
        self.proximity_unavailable = false;
        let request = self.pipeline.reset();
        let request = self.committed(request);
        self.refilter();
        request
    }

    pub fn begin_locating(&mut self) {
        self.locating = true;
    }

    /// Applies a geolocation reading. Failures leave the anchor as it was.
    pub fn on_geolocation(&mut self, reading: Result<Coordinate, GeolocationError>) {
        self.locating = false;
        match reading {
            Ok(position) => {
                tracing::info!(%position, "proximity anchor set from geolocation");
                self.set_proximity_anchor(Some(position));
            }
            Err(error) => {
                tracing::warn!(error = %error, "geolocation failed; proximity unavailable");
                self.proximity_unavailable = true;
            }
        }
    }

    /// "Load more" for every relevant kind that is not exhausted.
    ///
    /// No-op while page 0 is loading, while a page-0 retry is outstanding,
    /// or when everything is exhausted. Triggers during an outstanding
    /// load-more call collapse into one follow-up.
    pub fn fetch_more(&mut self) -> Option<SearchRequest> {
        if self.pipeline.is_replace_in_flight() {
            tracing::debug!("page 0 in flight; ignoring load-more trigger");
            return None;
        }
        if self.retry == Some(RetryTarget::Search) {
            tracing::debug!("page 0 failed; load-more waits for a retry");
            return None;
        }

        let committed = self.pipeline.committed();
        match self.pager.plan_more(committed.type_selector) {
            MoreDecision::Issue(selector) => {
                let cursors = self.pager.cursors();
                let query = committed.to_query(
                    selector,
                    self.pipeline.page_size(),
                    cursors.places.next_offset,
                    cursors.happenings.next_offset,
                );
                let generation = self.pipeline.generation();
                tracing::info!(
                    generation = generation.value(),
                    selector = selector.as_str(),
                    places_offset = query.places_offset,
                    happenings_offset = query.happenings_offset,
                    "requesting next page"
                );
                if self.retry == Some(RetryTarget::FetchMore) {
                    self.retry = None;
                }
                Some(SearchRequest {
                    ticket: FetchTicket {
                        generation,
                        mode: FetchMode::Append,
                        selector,
                    },
                    query,
                })
            }
            MoreDecision::Deferred => None,
            MoreDecision::Exhausted => {
                tracing::debug!("all relevant kinds exhausted; nothing to load");
                None
            }
        }
    }

    /// Re-issues the call that last failed transiently, if any.
    pub fn retry(&mut self) -> Option<SearchRequest> {
        match self.retry.take()? {
            RetryTarget::Search => {
                tracing::info!("retrying page 0");
                Some(self.refresh())
            }
            RetryTarget::FetchMore => {
                tracing::info!("retrying load-more");
                self.retry = Some(RetryTarget::FetchMore);
                self.fetch_more()
            }
        }
    }

    /// Applies the outcome of a backend call issued with `ticket`.
    ///
    /// Returns a follow-up request when a queued load-more trigger is due.
    pub fn on_response(
        &mut self,
        ticket: FetchTicket,
        result: Result<SearchPage, BackendError>,
    ) -> Option<SearchRequest> {
        match ticket.mode {
            FetchMode::Replace => {
                self.on_first_page(ticket, result);
                None
            }
            FetchMode::Append => self.on_next_page(ticket, result),
        }
    }

    fn on_first_page(&mut self, ticket: FetchTicket, result: Result<SearchPage, BackendError>) {
        if !self.pipeline.accept_replace(ticket.generation) {
            return;
        }
        match result {
            Ok(page) => {
                tracing::info!(
                    generation = ticket.generation.value(),
                    places = page.places.len(),
                    happenings = page.happenings.len(),
                    "page 0 applied"
                );
                self.pager.apply_first_page(ticket.selector, &page);
                self.store.replace(page);
                self.retry = None;
            }
            Err(BackendError::Malformed { message }) => {
                tracing::warn!(
                    generation = ticket.generation.value(),
                    error = %message,
                    "malformed page 0; treating as empty"
                );
                self.store.clear();
                self.pager.exhaust(ticket.selector);
                self.retry = None;
            }
            Err(BackendError::Transient { message }) => {
                tracing::warn!(
                    generation = ticket.generation.value(),
                    error = %message,
                    "page 0 failed; keeping loaded results"
                );
                self.retry = Some(RetryTarget::Search);
                return;
            }
        }
        self.rebuild();
        let items = &self.items;
        self.interaction
            .reset_groups(|id| items.iter().any(|item| item.id() == id));
    }

    fn on_next_page(
        &mut self,
        ticket: FetchTicket,
        result: Result<SearchPage, BackendError>,
    ) -> Option<SearchRequest> {
        self.pager.finish();

        if !self.pipeline.is_current(ticket.generation) {
            tracing::debug!(
                generation = ticket.generation.value(),
                current = self.pipeline.generation().value(),
                "discarding stale load-more response"
            );
        } else {
            match result {
                Ok(page) => {
                    let appended = self.pager.apply_more(ticket.selector, page, &mut self.store);
                    let cursors = self.pager.cursors();
                    tracing::info!(
                        generation = ticket.generation.value(),
                        returned = appended,
                        places_offset = cursors.places.next_offset,
                        happenings_offset = cursors.happenings.next_offset,
                        "next page appended"
                    );
                    self.rebuild();
                }
                Err(BackendError::Malformed { message }) => {
                    tracing::warn!(
                        generation = ticket.generation.value(),
                        error = %message,
                        "malformed load-more page; marking kinds exhausted"
                    );
                    self.pager.exhaust(ticket.selector);
                }
                Err(BackendError::Transient { message }) => {
                    tracing::warn!(
                        generation = ticket.generation.value(),
                        error = %message,
                        "load-more failed; retry available"
                    );
                    self.retry = Some(RetryTarget::FetchMore);
                    self.pager.clear_pending();
                    return None;
                }
            }
        }

        if self.pager.take_pending() {
            tracing::debug!("issuing queued load-more");
            return self.fetch_more();
        }
        None
    }

    fn committed(&mut self, request: SearchRequest) -> SearchRequest {
        self.pager.reset();
        self.retry = None;
        request
    }

    /// Toggles expansion of the group `key`. Activating a single-member
    /// group selects its record instead.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGroup`] if no current group has `key`.
    pub fn activate_group(&mut self, key: &str, now: Instant) -> Result<(), SessionError> {
        let group = self
            .groups
            .iter()
            .find(|g| g.key == key)
            .ok_or_else(|| SessionError::UnknownGroup(key.to_string()))?;

        if !group.is_cluster() {
            let id = group.members[0].id.clone();
            self.interaction.select_item(&id);
            return Ok(());
        }

        let groups = &self.groups;
        let zoom = self.zoom;
        self.interaction
            .activate(key, now, |k| capture_legs(groups, k, zoom));
        Ok(())
    }

    /// Highlights one record in both the list and the map.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownItem`] if no loaded record has `id`.
    pub fn select_item(&mut self, id: &str) -> Result<(), SessionError> {
        if !self.items.iter().any(|item| item.id() == id) {
            return Err(SessionError::UnknownItem(id.to_string()));
        }
        self.interaction.select_item(id);
        Ok(())
    }

    pub fn background_click(&mut self, now: Instant) {
        let groups = &self.groups;
        let zoom = self.zoom;
        self.interaction
            .background_click(now, |k| capture_legs(groups, k, zoom));
    }

    /// The armed settle timer as `(timer_id, deadline)`.
    #[must_use]
    pub fn settle_timer(&self) -> Option<(u64, Instant)> {
        self.interaction.settle_timer()
    }

    pub fn settle_elapsed(&mut self, timer_id: u64) -> bool {
        self.interaction.timer_elapsed(timer_id)
    }

    /// Records passing the geofence, nearest first in proximity mode.
    #[must_use]
    pub fn visible_items(&self) -> &[VisibleItem] {
        &self.visible
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Clustered markers for every loaded record with coordinates,
    /// regardless of the geofence.
    #[must_use]
    pub fn marker_groups(&self) -> &[PositionGroup] {
        &self.groups
    }

    #[must_use]
    pub fn unified_items(&self) -> &[DiscoverableItem] {
        &self.items
    }

    #[must_use]
    pub fn interaction(&self) -> &InteractionState {
        self.interaction.state()
    }

    #[must_use]
    pub fn rendered_markers(&self) -> Vec<RenderedMarker> {
        project_markers(&self.groups, self.interaction.state(), self.zoom)
    }

    #[must_use]
    pub fn geofence(&self) -> Geofence {
        Geofence::resolve(
            self.pipeline
                .criteria()
                .proximity(self.config.default_radius_meters),
            self.bounds,
        )
    }

    /// Ring matching the proximity predicate, when an anchor is set.
    #[must_use]
    pub fn proximity_overlay(&self, segments: usize) -> Option<Vec<Coordinate>> {
        self.pipeline
            .criteria()
            .proximity(self.config.default_radius_meters)
            .map(|p| p.overlay(segments))
    }

    #[must_use]
    pub fn radius_meters(&self) -> f64 {
        self.pipeline
            .criteria()
            .proximity_radius_meters
            .unwrap_or(self.config.default_radius_meters)
    }

    #[must_use]
    pub fn criteria(&self) -> &FilterCriteria {
        self.pipeline.criteria()
    }

    #[must_use]
    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn cursors(&self) -> Cursors {
        self.pager.cursors()
    }

    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Loaded record count for `kind`, before geofencing.
    #[must_use]
    pub fn loaded(&self, kind: EntityKind) -> usize {
        self.store.count(kind)
    }

    /// Whether every kind under the committed selector is exhausted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pager
            .cursors()
            .all_exhausted(self.pipeline.committed().type_selector)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            loading: self.pipeline.is_replace_in_flight(),
            loading_more: self.pager.is_in_flight(),
            search_pending: self.pipeline.debounce_deadline().is_some(),
            locating: self.locating,
            retry: self.retry,
            proximity_unavailable: self.proximity_unavailable,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.pipeline.generation().value(),
            criteria: self.pipeline.criteria().clone(),
            visible_items: self.visible.clone(),
            visible_count: self.visible.len(),
            total_loaded: self.store.len(),
            marker_groups: self.groups.clone(),
            rendered_markers: self.rendered_markers(),
            proximity_overlay: self.proximity_overlay(OVERLAY_SEGMENTS),
            interaction: self.interaction.state().clone(),
            status: self.status(),
            cursors: self.pager.cursors(),
            zoom: self.zoom,
            commands_applied: 0,
            last_error: None,
        }
    }

    fn rebuild(&mut self) {
        self.items = unify(&self.store);
        self.groups = group_markers(&marker_points(&self.items));
        self.refilter();
    }

    fn refilter(&mut self) {
        let fence = self.geofence();
        let mut visible: Vec<VisibleItem> = self
            .items
            .iter()
            .filter(|item| fence.admits(item.coordinates()))
            .map(|item| VisibleItem {
                item: item.clone(),
                distance_meters: fence.distance_to(item.coordinates()),
            })
            .collect();
        if fence.is_proximity() {
            visible.sort_by(|a, b| {
                let a = a.distance_meters.unwrap_or(f64::INFINITY);
                let b = b.distance_meters.unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            });
        }
        self.visible = visible;
    }
}

fn capture_legs(groups: &[PositionGroup], key: &str, zoom: f64) -> Vec<SpiderLeg> {
    groups
        .iter()
        .find(|g| g.key == key)
        .map(|g| spider_legs(g, zoom))
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
