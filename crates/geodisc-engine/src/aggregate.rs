//! Result aggregation: the per-kind result arrays and their unified view.

use geodisc_core::{CategoryBadge, Coordinate, EntityKind, Happening, Place, SearchPage};
use serde::Serialize;

use crate::grouping::MarkerPoint;

/// A search record tagged with its entity kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiscoverableItem {
    Place(Place),
    Happening(Happening),
}

impl DiscoverableItem {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            DiscoverableItem::Place(_) => EntityKind::Place,
            DiscoverableItem::Happening(_) => EntityKind::Happening,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            DiscoverableItem::Place(p) => &p.id,
            DiscoverableItem::Happening(h) => &h.id,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            DiscoverableItem::Place(p) => &p.display_name,
            DiscoverableItem::Happening(h) => &h.display_name,
        }
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        match self {
            DiscoverableItem::Place(p) => &p.slug,
            DiscoverableItem::Happening(h) => &h.slug,
        }
    }

    #[must_use]
    pub fn category(&self) -> &CategoryBadge {
        match self {
            DiscoverableItem::Place(p) => &p.category,
            DiscoverableItem::Happening(h) => &h.category,
        }
    }

    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinate> {
        match self {
            DiscoverableItem::Place(p) => p.coordinates,
            DiscoverableItem::Happening(h) => h.coordinates,
        }
    }

    #[must_use]
    pub fn address_text(&self) -> &str {
        match self {
            DiscoverableItem::Place(p) => &p.address_text,
            DiscoverableItem::Happening(h) => &h.address_text,
        }
    }

    #[must_use]
    pub fn featured(&self) -> bool {
        match self {
            DiscoverableItem::Place(p) => p.featured,
            DiscoverableItem::Happening(h) => h.featured,
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            DiscoverableItem::Place(p) => &p.description,
            DiscoverableItem::Happening(h) => &h.description,
        }
    }

    /// Marker for the map, or `None` when the record has no coordinates.
    #[must_use]
    pub fn marker(&self) -> Option<MarkerPoint> {
        let c = self.coordinates()?;
        Some(MarkerPoint {
            id: self.id().to_string(),
            kind: self.kind(),
            lat: c.lat,
            lng: c.lng,
            name: self.display_name().to_string(),
            slug: self.slug().to_string(),
            category_icon: self.category().icon.clone(),
        })
    }
}

/// The two result arrays for the current criteria.
///
/// Only page-0 completions replace them and only incremental completions
/// append to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    places: Vec<Place>,
    happenings: Vec<Happening>,
}

impl ResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards everything and keeps only the records of `page`.
    pub fn replace(&mut self, page: SearchPage) {
        self.places = page.places;
        self.happenings = page.happenings;
    }

    /// Appends the records of `kind` from `page`, returning how many were added.
    pub fn append(&mut self, kind: EntityKind, page: &mut SearchPage) -> usize {
        match kind {
            EntityKind::Place => {
                let added = page.places.len();
                self.places.append(&mut page.places);
                added
            }
            EntityKind::Happening => {
                let added = page.happenings.len();
                self.happenings.append(&mut page.happenings);
                added
            }
        }
    }

    pub fn clear(&mut self) {
        self.places.clear();
        self.happenings.clear();
    }

    #[must_use]
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    #[must_use]
    pub fn happenings(&self) -> &[Happening] {
        &self.happenings
    }

    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Place => self.places.len(),
            EntityKind::Happening => self.happenings.len(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.places.len() + self.happenings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tags every record with its kind and concatenates places then happenings.
#[must_use]
pub fn unify(store: &ResultStore) -> Vec<DiscoverableItem> {
    store
        .places()
        .iter()
        .cloned()
        .map(DiscoverableItem::Place)
        .chain(
            store
                .happenings()
                .iter()
                .cloned()
                .map(DiscoverableItem::Happening),
        )
        .collect()
}

/// Markers for every record that has coordinates, in list order.
#[must_use]
pub fn marker_points(items: &[DiscoverableItem]) -> Vec<MarkerPoint> {
    items.iter().filter_map(DiscoverableItem::marker).collect()
}
