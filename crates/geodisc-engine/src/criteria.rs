use geodisc_core::{Coordinate, SearchQuery, TypeSelector};
use serde::Serialize;

use crate::geo::Proximity;

/// Radius choices offered by the step control, in meters.
pub const RADIUS_STEPS_METERS: [f64; 5] = [500.0, 1_000.0, 2_000.0, 5_000.0, 10_000.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusStep {
    Up,
    Down,
}

/// Next radius in [`RADIUS_STEPS_METERS`] from `current`, clamped at the ends.
///
/// A radius between two steps moves to the neighbouring step in the given
/// direction.
#[must_use]
pub fn step_radius(current: f64, step: RadiusStep) -> f64 {
    match step {
        RadiusStep::Up => RADIUS_STEPS_METERS
            .iter()
            .copied()
            .find(|r| *r > current)
            .unwrap_or(RADIUS_STEPS_METERS[RADIUS_STEPS_METERS.len() - 1]),
        RadiusStep::Down => RADIUS_STEPS_METERS
            .iter()
            .rev()
            .copied()
            .find(|r| *r < current)
            .unwrap_or(RADIUS_STEPS_METERS[0]),
    }
}

/// The user's current search and narrowing choices.
///
/// The text, type, category and featured fields go to the backend; the
/// proximity fields only narrow results client-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterCriteria {
    pub free_text: String,
    pub type_selector: TypeSelector,
    pub category_slug: Option<String>,
    pub featured_only: bool,
    pub proximity_anchor: Option<Coordinate>,
    pub proximity_radius_meters: Option<f64>,
}

impl FilterCriteria {
    /// The proximity fence, using `default_radius` when no radius is set.
    #[must_use]
    pub fn proximity(&self, default_radius: f64) -> Option<Proximity> {
        self.proximity_anchor.map(|anchor| Proximity {
            anchor,
            radius_meters: self.proximity_radius_meters.unwrap_or(default_radius),
        })
    }

    /// Builds a backend query for the server-side fields.
    #[must_use]
    pub fn to_query(
        &self,
        type_selector: TypeSelector,
        page_size: usize,
        places_offset: usize,
        happenings_offset: usize,
    ) -> SearchQuery {
        SearchQuery {
            free_text: self.free_text.trim().to_string(),
            type_selector,
            category_slug: self.category_slug.clone(),
            featured_only: self.featured_only,
            page_size,
            places_offset,
            happenings_offset,
        }
    }

    /// Whether the backend-facing fields differ from `other`.
    #[must_use]
    pub fn differs_server_side(&self, other: &FilterCriteria) -> bool {
        self.free_text.trim() != other.free_text.trim()
            || self.type_selector != other.type_selector
            || self.category_slug != other.category_slug
            || self.featured_only != other.featured_only
    }
}
