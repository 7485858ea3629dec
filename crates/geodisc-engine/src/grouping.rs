//! Co-location grouping of map markers and the spiderfy layout.
//!
//! Markers are grouped by their coordinates rounded to five decimal places
//! (~1.1 m). Two points whose rounded keys differ never share a group, even
//! when they are closer than the rounding step. Grouping is recomputed in
//! full from the current marker list; groups carry no identity across passes
//! beyond their key string.

use std::collections::HashMap;
use std::f64::consts::PI;

use geodisc_core::{Coordinate, EntityKind};
use serde::Serialize;

use crate::interaction::InteractionState;

/// Scale factor for five-decimal rounding.
const KEY_SCALE: f64 = 100_000.0;

/// Web-mercator tile size in pixels at zoom 0.
const TILE_SIZE_PX: f64 = 256.0;

/// A map marker derived 1:1 from a record that has coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerPoint {
    pub id: String,
    pub kind: EntityKind,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub slug: String,
    pub category_icon: String,
}

impl MarkerPoint {
    #[must_use]
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Markers sharing one rounded coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionGroup {
    pub key: String,
    pub centroid: Coordinate,
    pub members: Vec<MarkerPoint>,
}

impl PositionGroup {
    /// A group of one always renders as a plain marker.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.members.len() > 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn round5(value: f64) -> f64 {
    // `+ 0.0` folds -0.0 into 0.0 so both render as the same key.
    (value * KEY_SCALE).round() / KEY_SCALE + 0.0
}

/// Grouping key for a coordinate: both axes rounded to five decimals.
#[must_use]
pub fn group_key(lat: f64, lng: f64) -> String {
    format!("{:.5},{:.5}", round5(lat), round5(lng))
}

/// Groups markers by rounded coordinate, preserving first-seen group order
/// and source order within each group.
#[must_use]
pub fn group_markers(markers: &[MarkerPoint]) -> Vec<PositionGroup> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(markers.len());
    let mut groups: Vec<PositionGroup> = Vec::new();

    for marker in markers {
        let key = group_key(marker.lat, marker.lng);
        if let Some(&slot) = index.get(&key) {
            groups[slot].members.push(marker.clone());
        } else {
            index.insert(key.clone(), groups.len());
            groups.push(PositionGroup {
                key,
                centroid: marker.position(),
                members: vec![marker.clone()],
            });
        }
    }

    for group in &mut groups {
        group.centroid = centroid(&group.members);
    }

    groups
}

#[allow(clippy::cast_precision_loss)]
fn centroid(members: &[MarkerPoint]) -> Coordinate {
    let n = members.len() as f64;
    let (lat_sum, lng_sum) = members
        .iter()
        .fold((0.0, 0.0), |(lat, lng), m| (lat + m.lat, lng + m.lng));
    Coordinate::new(lat_sum / n, lng_sum / n)
}

/// Spider radius in pixels for a group of `n` members.
#[must_use]
pub fn expansion_radius_px(n: usize) -> f64 {
    match n {
        0..=3 => 18.0,
        4..=6 => 22.0,
        _ => 26.0,
    }
}

/// Degrees spanned by one screen pixel at `zoom`.
#[must_use]
pub fn degrees_per_pixel(zoom: f64) -> f64 {
    360.0 / (TILE_SIZE_PX * 2f64.powf(zoom))
}

/// One member of an expanded group placed around the centroid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiderLeg {
    pub id: String,
    pub position: Coordinate,
}

/// `(Δlat, Δlng)` offsets for `n` members at `zoom`, member 0 first.
///
/// Member `i` sits at angle `2πi/n − π/2` on a circle whose pixel radius
/// depends on `n`, converted to degrees for the current zoom.
#[must_use]
pub fn spider_offsets(n: usize, zoom: f64) -> Vec<(f64, f64)> {
    if n == 0 {
        return Vec::new();
    }
    let r = expansion_radius_px(n) * degrees_per_pixel(zoom);
    #[allow(clippy::cast_precision_loss)]
    let n_f = n as f64;
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let theta = 2.0 * PI * (i as f64) / n_f - PI / 2.0;
            (r * theta.cos(), r * theta.sin())
        })
        .collect()
}

/// Positions of every member of `group` when expanded at `zoom`.
///
/// Recomputed on every call; the pixel-to-degree ratio changes with zoom.
#[must_use]
pub fn spider_legs(group: &PositionGroup, zoom: f64) -> Vec<SpiderLeg> {
    spider_offsets(group.members.len(), zoom)
        .into_iter()
        .zip(&group.members)
        .map(|((d_lat, d_lng), member)| SpiderLeg {
            id: member.id.clone(),
            position: Coordinate::new(group.centroid.lat + d_lat, group.centroid.lng + d_lng),
        })
        .collect()
}

/// What the presentation layer draws for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "render", rename_all = "snake_case")]
pub enum RenderedMarker {
    /// A lone record.
    Single { marker: MarkerPoint, active: bool },
    /// A collapsed cluster badge.
    Cluster {
        key: String,
        centroid: Coordinate,
        count: usize,
    },
    /// An expanded cluster with its members fanned out.
    Spider {
        key: String,
        centroid: Coordinate,
        legs: Vec<SpiderLeg>,
        active_id: Option<String>,
    },
    /// Members of a collapsing cluster, at the offsets they were expanded to.
    Exiting {
        key: String,
        centroid: Coordinate,
        legs: Vec<SpiderLeg>,
    },
}

/// Projects groups and interaction state into drawable markers.
///
/// Pure: the same inputs always yield the same output.
#[must_use]
pub fn project_markers(
    groups: &[PositionGroup],
    interaction: &InteractionState,
    zoom: f64,
) -> Vec<RenderedMarker> {
    let active = interaction.active_item_id();
    let mut out = Vec::with_capacity(groups.len());

    for group in groups {
        if !group.is_cluster() {
            let marker = group.members[0].clone();
            let is_active = active == Some(marker.id.as_str());
            out.push(RenderedMarker::Single {
                marker,
                active: is_active,
            });
            continue;
        }

        if interaction.expanded_group_key() == Some(group.key.as_str()) {
            out.push(RenderedMarker::Spider {
                key: group.key.clone(),
                centroid: group.centroid,
                legs: spider_legs(group, zoom),
                active_id: active
                    .filter(|id| group.members.iter().any(|m| m.id == *id))
                    .map(str::to_string),
            });
            continue;
        }

        out.push(RenderedMarker::Cluster {
            key: group.key.clone(),
            centroid: group.centroid,
            count: group.members.len(),
        });

        if let Some(closing) = interaction
            .closing()
            .filter(|closing| closing.key == group.key)
        {
            out.push(RenderedMarker::Exiting {
                key: group.key.clone(),
                centroid: group.centroid,
                legs: closing.legs.clone(),
            });
        }
    }

    out
}
