//! Geofence predicates: great-circle proximity and viewport containment.
//!
//! Both the proximity predicate and the circle overlay use the same spherical
//! model ([`EARTH_RADIUS_M`]) so the drawn ring and the filtered set agree.

use std::f64::consts::PI;

use geodisc_core::Coordinate;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Slack on the proximity boundary. Round-tripping a point through
/// [`destination`] and [`haversine_meters`] drifts by nanometres.
pub const BOUNDARY_TOLERANCE_M: f64 = 1e-6;

/// Great-circle distance between two coordinates in meters (Haversine).
#[must_use]
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Point reached by travelling `distance_m` from `origin` along the initial
/// bearing `bearing_rad` (0 = north, clockwise).
#[must_use]
pub fn destination(origin: Coordinate, bearing_rad: f64, distance_m: f64) -> Coordinate {
    let delta = distance_m / EARTH_RADIUS_M;
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lng.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * bearing_rad.cos()).asin();
    let lambda2 = lambda1
        + (bearing_rad.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    Coordinate::new(phi2.to_degrees(), normalize_lng(lambda2.to_degrees()))
}

fn normalize_lng(lng: f64) -> f64 {
    (lng + 540.0).rem_euclid(360.0) - 180.0
}

/// Closed ring approximating the proximity circle, first vertex due north.
///
/// Returns `segments + 1` points (the ring repeats its first vertex). At
/// least three segments are always produced.
#[must_use]
pub fn circle_polygon(anchor: Coordinate, radius_m: f64, segments: usize) -> Vec<Coordinate> {
    let segments = segments.max(3);
    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        #[allow(clippy::cast_precision_loss)]
        let bearing = 2.0 * PI * (i as f64) / (segments as f64);
        ring.push(destination(anchor, bearing, radius_m));
    }
    ring.push(ring[0]);
    ring
}

/// Axis-aligned viewport rectangle. No antimeridian wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Builds a box, swapping edges given in the wrong order.
    #[must_use]
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south: south.min(north),
            west: west.min(east),
            north: south.max(north),
            east: west.max(east),
        }
    }

    /// Inclusive containment on all four edges.
    #[must_use]
    pub fn contains(&self, c: Coordinate) -> bool {
        self.south <= c.lat && c.lat <= self.north && self.west <= c.lng && c.lng <= self.east
    }

    /// Smallest box covering every point, or `None` for an empty input.
    pub fn covering<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for p in iter {
            bbox.south = bbox.south.min(p.lat);
            bbox.north = bbox.north.max(p.lat);
            bbox.west = bbox.west.min(p.lng);
            bbox.east = bbox.east.max(p.lng);
        }
        Some(bbox)
    }
}

/// A circular geofence around an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proximity {
    pub anchor: Coordinate,
    pub radius_meters: f64,
}

impl Proximity {
    #[must_use]
    pub fn distance_to(&self, c: Coordinate) -> f64 {
        haversine_meters(self.anchor, c)
    }

    /// Inclusive of the radius, within [`BOUNDARY_TOLERANCE_M`].
    #[must_use]
    pub fn contains(&self, c: Coordinate) -> bool {
        self.distance_to(c) <= self.radius_meters + BOUNDARY_TOLERANCE_M
    }

    /// Ring for the map overlay, computed on the same sphere as [`Self::contains`].
    #[must_use]
    pub fn overlay(&self, segments: usize) -> Vec<Coordinate> {
        circle_polygon(self.anchor, self.radius_meters, segments)
    }
}

/// The active visibility mode. Proximity and bounds are never combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geofence {
    Proximity(Proximity),
    Bounds(BoundingBox),
    Unrestricted,
}

impl Geofence {
    /// Picks the mode: a proximity fence always wins over known bounds.
    #[must_use]
    pub fn resolve(proximity: Option<Proximity>, bounds: Option<BoundingBox>) -> Self {
        match (proximity, bounds) {
            (Some(p), _) => Geofence::Proximity(p),
            (None, Some(b)) => Geofence::Bounds(b),
            (None, None) => Geofence::Unrestricted,
        }
    }

    /// Decides whether a record is visible.
    ///
    /// Records without coordinates only pass an unrestricted fence.
    #[must_use]
    pub fn admits(&self, coordinates: Option<Coordinate>) -> bool {
        match (self, coordinates) {
            (Geofence::Unrestricted, _) => true,
            (_, None) => false,
            (Geofence::Proximity(p), Some(c)) => p.contains(c),
            (Geofence::Bounds(b), Some(c)) => b.contains(c),
        }
    }

    /// Distance from the proximity anchor, when a proximity fence is active.
    #[must_use]
    pub fn distance_to(&self, coordinates: Option<Coordinate>) -> Option<f64> {
        match (self, coordinates) {
            (Geofence::Proximity(p), Some(c)) => Some(p.distance_to(c)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_proximity(&self) -> bool {
        matches!(self, Geofence::Proximity(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHOR: Coordinate = Coordinate::new(-3.993_13, -79.204_22);

    #[test]
    fn haversine_is_zero_for_same_point() {
        assert!(haversine_meters(ANCHOR, ANCHOR).abs() < 1e-9);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_meters(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        // 2πR / 360
        assert!((d - 111_194.93).abs() < 0.1, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let other = Coordinate::new(-4.005_51, -79.205_23);
        let ab = haversine_meters(ANCHOR, other);
        let ba = haversine_meters(other, ANCHOR);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn destination_round_trips_through_haversine() {
        for (bearing, distance) in [(0.0, 200.0), (1.3, 999.0), (3.0, 1001.0), (5.5, 5000.0)] {
            let p = destination(ANCHOR, bearing, distance);
            let d = haversine_meters(ANCHOR, p);
            assert!((d - distance).abs() < 1e-6, "bearing {bearing}: {d} vs {distance}");
        }
    }

    #[test]
    fn proximity_keeps_points_within_radius() {
        let fence = Proximity {
            anchor: ANCHOR,
            radius_meters: 1000.0,
        };
        let kept: Vec<f64> = [200.0, 999.0, 1001.0, 5000.0]
            .into_iter()
            .filter(|d| fence.contains(destination(ANCHOR, 0.7, *d)))
            .collect();
        assert_eq!(kept, vec![200.0, 999.0]);
    }

    #[test]
    fn circle_overlay_vertices_sit_on_the_radius() {
        let fence = Proximity {
            anchor: ANCHOR,
            radius_meters: 1500.0,
        };
        let ring = fence.overlay(32);
        assert_eq!(ring.len(), 33);
        assert_eq!(ring.first(), ring.last());
        for vertex in &ring {
            assert!((fence.distance_to(*vertex) - 1500.0).abs() < 1e-6);
            assert!(fence.contains(*vertex));
        }
    }

    #[test]
    fn every_overlay_vertex_is_admitted_by_the_fence() {
        for radius in [500.0, 1000.0, 2000.0, 5000.0, 10_000.0] {
            let fence = Proximity {
                anchor: ANCHOR,
                radius_meters: radius,
            };
            let outside = fence
                .overlay(64)
                .into_iter()
                .filter(|v| !fence.contains(*v))
                .count();
            assert_eq!(outside, 0, "radius {radius}");
        }
    }

    #[test]
    fn boundary_tolerance_does_not_admit_a_metre_beyond() {
        let fence = Proximity {
            anchor: ANCHOR,
            radius_meters: 1000.0,
        };
        assert!(!fence.contains(destination(ANCHOR, 1.3, 1000.001)));
    }

    #[test]
    fn circle_polygon_enforces_minimum_segments() {
        assert_eq!(circle_polygon(ANCHOR, 100.0, 1).len(), 4);
    }

    #[test]
    fn bounding_box_containment_is_inclusive() {
        let bbox = BoundingBox::new(-4.0, -79.3, -3.9, -79.1);
        assert!(bbox.contains(Coordinate::new(-4.0, -79.3)));
        assert!(bbox.contains(Coordinate::new(-3.9, -79.1)));
        assert!(bbox.contains(Coordinate::new(-3.95, -79.2)));
        assert!(!bbox.contains(Coordinate::new(-3.89, -79.2)));
        assert!(!bbox.contains(Coordinate::new(-3.95, -79.0)));
    }

    #[test]
    fn bounding_box_new_orders_edges() {
        let bbox = BoundingBox::new(-3.9, -79.1, -4.0, -79.3);
        assert_eq!(bbox, BoundingBox::new(-4.0, -79.3, -3.9, -79.1));
        assert!(bbox.south < bbox.north && bbox.west < bbox.east);
    }

    #[test]
    fn bounding_box_covering_points() {
        let bbox = BoundingBox::covering([
            Coordinate::new(-4.0, -79.2),
            Coordinate::new(-3.9, -79.3),
            Coordinate::new(-3.95, -79.1),
        ])
        .unwrap();
        assert_eq!(bbox, BoundingBox::new(-4.0, -79.3, -3.9, -79.1));
        assert!(BoundingBox::covering(Vec::new()).is_none());
    }

    #[test]
    fn resolve_prefers_proximity_over_bounds() {
        let prox = Proximity {
            anchor: ANCHOR,
            radius_meters: 10.0,
        };
        let bbox = BoundingBox::new(-90.0, -180.0, 90.0, 180.0);
        assert_eq!(
            Geofence::resolve(Some(prox), Some(bbox)),
            Geofence::resolve(Some(prox), None)
        );
        assert_eq!(Geofence::resolve(None, Some(bbox)), Geofence::Bounds(bbox));
        assert_eq!(Geofence::resolve(None, None), Geofence::Unrestricted);
    }

    #[test]
    fn admits_requires_coordinates_when_fenced() {
        let bbox = BoundingBox::new(-90.0, -180.0, 90.0, 180.0);
        assert!(Geofence::Unrestricted.admits(None));
        assert!(!Geofence::Bounds(bbox).admits(None));
        assert!(Geofence::Bounds(bbox).admits(Some(ANCHOR)));
    }

    #[test]
    fn distance_only_reported_in_proximity_mode() {
        let prox = Geofence::Proximity(Proximity {
            anchor: ANCHOR,
            radius_meters: 10.0,
        });
        assert_eq!(prox.distance_to(Some(ANCHOR)), Some(0.0));
        assert_eq!(Geofence::Unrestricted.distance_to(Some(ANCHOR)), None);
    }
}
