//! Wire and domain types shared by the engine, the HTTP client and the CLI.
//!
//! Field names follow the backend's camelCase JSON. Records are deserialized
//! leniently: optional fields default instead of failing the whole page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

/// The category fields embedded in each record (not the full catalog entry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBadge {
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

/// The two concrete entity kinds served by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Place,
    Happening,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Place, EntityKind::Happening];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Place => write!(f, "place"),
            EntityKind::Happening => write!(f, "happening"),
        }
    }
}

/// Which entity streams a search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeSelector {
    #[default]
    All,
    Places,
    Happenings,
}

impl TypeSelector {
    /// Returns `true` if results of `kind` are relevant under this selector.
    #[must_use]
    pub fn includes(self, kind: EntityKind) -> bool {
        match self {
            TypeSelector::All => true,
            TypeSelector::Places => kind == EntityKind::Place,
            TypeSelector::Happenings => kind == EntityKind::Happening,
        }
    }

    /// The narrowest selector covering exactly `kinds`, or `None` when empty.
    #[must_use]
    pub fn covering(places: bool, happenings: bool) -> Option<Self> {
        match (places, happenings) {
            (true, true) => Some(TypeSelector::All),
            (true, false) => Some(TypeSelector::Places),
            (false, true) => Some(TypeSelector::Happenings),
            (false, false) => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TypeSelector::All => "all",
            TypeSelector::Places => "places",
            TypeSelector::Happenings => "happenings",
        }
    }
}

impl std::str::FromStr for TypeSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TypeSelector::All),
            "places" => Ok(TypeSelector::Places),
            "happenings" => Ok(TypeSelector::Happenings),
            other => Err(format!(
                "unknown type selector '{other}'; expected all, places or happenings"
            )),
        }
    }
}

/// A venue or point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub category: CategoryBadge,
    /// `None` keeps the record in list results but off the map.
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
    #[serde(default)]
    pub address_text: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub description: String,
}

/// A dated event, optionally attached to a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Happening {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub category: CategoryBadge,
    #[serde(default)]
    pub coordinates: Option<Coordinate>,
    #[serde(default)]
    pub address_text: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Parameters of one call to the backend search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub free_text: String,
    pub type_selector: TypeSelector,
    pub category_slug: Option<String>,
    pub featured_only: bool,
    pub page_size: usize,
    pub places_offset: usize,
    pub happenings_offset: usize,
}

/// Pagination hints returned alongside a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub places_has_more: bool,
    pub happenings_has_more: bool,
    pub next_places_offset: usize,
    pub next_happenings_offset: usize,
}

impl PageInfo {
    #[must_use]
    pub fn has_more(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Place => self.places_has_more,
            EntityKind::Happening => self.happenings_has_more,
        }
    }

    #[must_use]
    pub fn next_offset(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Place => self.next_places_offset,
            EntityKind::Happening => self.next_happenings_offset,
        }
    }
}

/// One page of search results for both entity streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub happenings: Vec<Happening>,
    #[serde(default)]
    pub page_info: Option<PageInfo>,
}

impl SearchPage {
    /// Number of records of `kind` in this page.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Place => self.places.len(),
            EntityKind::Happening => self.happenings.len(),
        }
    }
}
