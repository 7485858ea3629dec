use chrono::{TimeZone, Utc};
use geodisc_core::{Category, CategoryBadge, Happening, Place};

use super::*;
use crate::geo::destination;

const ANCHOR: Coordinate = Coordinate::new(-3.993_13, -79.204_22);

fn catalog() -> CategoryCatalog {
    CategoryCatalog::new(vec![
        Category {
            id: "1".to_string(),
            name: "Parques".to_string(),
            slug: "parques".to_string(),
            icon: "tree".to_string(),
        },
        Category {
            id: "2".to_string(),
            name: "Museos".to_string(),
            slug: "museos".to_string(),
            icon: "museum".to_string(),
        },
    ])
}

fn session() -> DiscoverySession {
    DiscoverySession::new(EngineConfig::default(), catalog())
}

fn place(id: &str, coordinates: Option<Coordinate>) -> Place {
    Place {
        id: id.to_string(),
        display_name: format!("Place {id}"),
        slug: id.to_string(),
        category: CategoryBadge {
            name: "Parques".to_string(),
            icon: "tree".to_string(),
        },
        coordinates,
        address_text: String::new(),
        featured: false,
        description: String::new(),
    }
}

fn happening(id: &str, coordinates: Option<Coordinate>) -> Happening {
    Happening {
        id: id.to_string(),
        display_name: format!("Happening {id}"),
        slug: id.to_string(),
        category: CategoryBadge::default(),
        coordinates,
        address_text: String::new(),
        featured: false,
        description: String::new(),
        start_date: Utc.with_ymd_and_hms(2026, 11, 1, 18, 0, 0).unwrap(),
        end_date: None,
    }
}

fn places(prefix: &str, n: usize) -> Vec<Place> {
    (0..n).map(|i| place(&format!("{prefix}{i}"), None)).collect()
}

fn happenings(prefix: &str, n: usize) -> Vec<Happening> {
    (0..n)
        .map(|i| happening(&format!("{prefix}{i}"), None))
        .collect()
}

fn page(places: Vec<Place>, happenings: Vec<Happening>) -> SearchPage {
    SearchPage {
        places,
        happenings,
        page_info: None,
    }
}

fn ids(session: &DiscoverySession) -> Vec<String> {
    session
        .unified_items()
        .iter()
        .map(|item| item.id().to_string())
        .collect()
}

fn load(session: &mut DiscoverySession, first: SearchPage) {
    let request = session.refresh();
    assert!(session.on_response(request.ticket, Ok(first)).is_none());
}

fn transient() -> BackendError {
    BackendError::Transient {
        message: "503 Service Unavailable".to_string(),
    }
}

#[test]
fn stale_page_zero_never_overwrites_newer_results() {
    let mut s = session();
    let a = s.set_category(Some("parques")).unwrap().unwrap();
    let b = s.set_category(Some("museos")).unwrap().unwrap();
    assert!(b.ticket.generation > a.ticket.generation);

    s.on_response(b.ticket, Ok(page(vec![place("museo", None)], Vec::new())));
    s.on_response(a.ticket, Ok(page(vec![place("parque", None)], Vec::new())));

    assert_eq!(ids(&s), vec!["museo"]);
    assert!(!s.status().loading);
}

#[test]
fn page_zero_replaces_both_arrays() {
    let mut s = session();
    load(&mut s, page(places("p", 3), happenings("h", 2)));
    assert_eq!(s.unified_items().len(), 5);

    let request = s.set_featured_only(true).unwrap();
    s.on_response(request.ticket, Ok(page(places("f", 1), Vec::new())));
    assert_eq!(ids(&s), vec!["f0"]);
    assert_eq!(s.loaded(EntityKind::Happening), 0);
}

#[test]
fn unknown_category_is_rejected_without_fetch() {
    let mut s = session();
    let before = s.snapshot().generation;
    assert_eq!(
        s.set_category(Some("bares")),
        Err(SessionError::UnknownCategory("bares".to_string()))
    );
    assert_eq!(s.snapshot().generation, before);
    assert!(s.set_category(None).unwrap().is_none());
}

#[test]
fn debounced_text_commits_once() {
    let mut s = session();
    let start = Instant::now();
    s.set_free_text("caf", start);
    s.set_free_text("cafe", start + std::time::Duration::from_millis(100));
    assert!(s.status().search_pending);
    assert!(s.poll_debounce(start + std::time::Duration::from_millis(500)).is_none());

    let deadline = s.debounce_deadline().unwrap();
    let request = s.poll_debounce(deadline).unwrap();
    assert_eq!(request.query.free_text, "cafe");
    assert!(!s.status().search_pending);
    assert!(s.status().loading);
}

#[test]
fn reset_restores_defaults_and_refetches() {
    let mut s = session();
    s.set_featured_only(true);
    s.set_proximity_anchor(Some(ANCHOR));
    let request = s.reset();
    assert!(!request.query.featured_only);
    assert_eq!(request.query.places_offset, 0);
    assert_eq!(s.criteria(), &FilterCriteria::default());
    assert!(s.proximity_overlay(8).is_none());
}

#[test]
fn proximity_keeps_items_within_radius_nearest_first() {
    let mut s = session();
    let at = |d: f64| Some(destination(ANCHOR, 1.0, d));
    load(
        &mut s,
        page(
            vec![
                place("far", at(5_000.0)),
                place("edge", at(999.0)),
                place("just-out", at(1_001.0)),
                place("near", at(200.0)),
                place("nowhere", None),
            ],
            Vec::new(),
        ),
    );
    s.set_proximity_anchor(Some(ANCHOR));
    s.set_radius(1_000.0).unwrap();

    let visible: Vec<&str> = s.visible_items().iter().map(|v| v.item.id()).collect();
    assert_eq!(visible, vec!["near", "edge"]);
    assert_eq!(s.visible_count(), 2);
    let d = s.visible_items()[0].distance_meters.unwrap();
    assert!((d - 200.0).abs() < 0.5, "got {d}");

    // Markers ignore the geofence.
    assert_eq!(s.marker_groups().len(), 4);
}

#[test]
fn proximity_ignores_bounds() {
    let mut s = session();
    load(
        &mut s,
        page(
            vec![
                place("inside", Some(destination(ANCHOR, 0.0, 300.0))),
                place("outside", Some(Coordinate::new(-4.5, -79.9))),
            ],
            Vec::new(),
        ),
    );
    s.set_proximity_anchor(Some(ANCHOR));
    let without_bounds = s.visible_items().to_vec();

    s.set_bounds(Some(BoundingBox::new(-5.0, -80.0, -4.4, -79.8)));
    assert_eq!(s.visible_items(), without_bounds.as_slice());

    s.set_proximity_anchor(None);
    let visible: Vec<&str> = s.visible_items().iter().map(|v| v.item.id()).collect();
    assert_eq!(visible, vec!["outside"]);
    assert!(s.visible_items()[0].distance_meters.is_none());
}

#[test]
fn items_without_coordinates_only_pass_without_fence() {
    let mut s = session();
    load(&mut s, page(vec![place("x", None)], Vec::new()));
    assert_eq!(s.visible_count(), 1);
    assert!(s.marker_groups().is_empty());

    s.set_bounds(Some(BoundingBox::new(-90.0, -180.0, 90.0, 180.0)));
    assert_eq!(s.visible_count(), 0);
}

#[test]
fn radius_changes_narrow_without_fetching() {
    let mut s = session();
    load(
        &mut s,
        page(
            vec![place("a", Some(destination(ANCHOR, 0.0, 1_500.0)))],
            Vec::new(),
        ),
    );
    let generation = s.snapshot().generation;
    s.set_proximity_anchor(Some(ANCHOR));
    assert_eq!(s.visible_count(), 0);

    let radius = s.step_radius(RadiusStep::Up);
    assert!((radius - 2_000.0).abs() < f64::EPSILON);
    assert_eq!(s.visible_count(), 1);
    assert_eq!(s.snapshot().generation, generation);
    assert!(!s.status().loading);

    assert_eq!(s.set_radius(0.0), Err(SessionError::InvalidRadius(0.0)));
}

#[test]
fn geolocation_failure_leaves_anchor_unset() {
    let mut s = session();
    s.set_bounds(Some(BoundingBox::new(-5.0, -80.0, -3.0, -79.0)));
    s.begin_locating();
    assert!(s.status().locating);

    s.on_geolocation(Err(GeolocationError::Denied));
    let status = s.status();
    assert!(!status.locating);
    assert!(status.proximity_unavailable);
    assert!(s.criteria().proximity_anchor.is_none());
    assert!(matches!(s.geofence(), Geofence::Bounds(_)));

    s.on_geolocation(Ok(ANCHOR));
    assert!(!s.status().proximity_unavailable);
    assert_eq!(s.criteria().proximity_anchor, Some(ANCHOR));
    assert!(s.geofence().is_proximity());
}

#[test]
fn overlay_follows_radius() {
    let mut s = session();
    s.set_proximity_anchor(Some(ANCHOR));
    s.set_radius(2_000.0).unwrap();
    let ring = s.proximity_overlay(16).unwrap();
    assert_eq!(ring.len(), 17);
    for vertex in &ring {
        let d = crate::geo::haversine_meters(ANCHOR, *vertex);
        assert!((d - 2_000.0).abs() < 0.01, "got {d}");
    }
}

#[test]
fn fetch_more_requests_only_places_after_short_happenings_page() {
    let mut s = session();
    load(&mut s, page(places("p", 60), happenings("h", 45)));
    let cursors = s.cursors();
    assert!(!cursors.places.exhausted);
    assert!(cursors.happenings.exhausted);

    let request = s.fetch_more().unwrap();
    assert_eq!(request.ticket.mode, FetchMode::Append);
    assert_eq!(request.query.type_selector, TypeSelector::Places);
    assert_eq!(request.query.places_offset, 60);
    assert_eq!(request.query.page_size, 60);
}

#[test]
fn fetch_more_appends_and_advances_by_returned_count() {
    let mut s = session();
    load(&mut s, page(places("p", 60), Vec::new()));

    let mut offsets = vec![s.cursors().places.next_offset];
    for (round, n) in [60, 60, 12].into_iter().enumerate() {
        let request = s.fetch_more().unwrap();
        assert_eq!(request.query.places_offset, *offsets.last().unwrap());
        let more = page(places(&format!("r{round}-"), n), Vec::new());
        assert!(s.on_response(request.ticket, Ok(more)).is_none());
        offsets.push(s.cursors().places.next_offset);
    }

    assert_eq!(offsets, vec![60, 120, 180, 192]);
    assert_eq!(s.loaded(EntityKind::Place), 192);
    assert!(s.is_exhausted());
    assert!(s.fetch_more().is_none());
}

#[test]
fn fetch_more_is_noop_while_page_zero_in_flight() {
    let mut s = session();
    let _request = s.refresh();
    assert!(s.fetch_more().is_none());
    assert!(!s.status().loading_more);
}

#[test]
fn rapid_triggers_collapse_into_one_follow_up() {
    let mut s = session();
    load(&mut s, page(places("p", 60), Vec::new()));

    let first = s.fetch_more().unwrap();
    assert!(s.fetch_more().is_none());
    assert!(s.fetch_more().is_none());
    assert!(s.status().loading_more);

    let follow_up = s
        .on_response(first.ticket, Ok(page(places("q", 60), Vec::new())))
        .unwrap();
    assert_eq!(follow_up.query.places_offset, 120);
    assert!(s
        .on_response(follow_up.ticket, Ok(page(places("r", 60), Vec::new())))
        .is_none());
    assert!(!s.status().loading_more);
}

#[test]
fn load_more_in_flight_across_criteria_change_is_discarded() {
    let mut s = session();
    load(&mut s, page(places("old", 60), Vec::new()));
    let stale = s.fetch_more().unwrap();

    let fresh = s.set_type_selector(TypeSelector::Places).unwrap();
    s.on_response(fresh.ticket, Ok(page(places("new", 60), Vec::new())));
    assert!(s
        .on_response(stale.ticket, Ok(page(places("stale", 60), Vec::new())))
        .is_none());

    assert_eq!(s.loaded(EntityKind::Place), 60);
    assert!(ids(&s).iter().all(|id| id.starts_with("new")));
    assert_eq!(s.cursors().places.next_offset, 60);
}

#[test]
fn trigger_during_stale_load_more_runs_after_it_resolves() {
    let mut s = session();
    load(&mut s, page(places("old", 60), Vec::new()));
    let stale = s.fetch_more().unwrap();

    let fresh = s.set_featured_only(true).unwrap();
    s.on_response(fresh.ticket, Ok(page(places("new", 60), Vec::new())));
    assert!(s.fetch_more().is_none());

    let follow_up = s.on_response(stale.ticket, Err(transient())).unwrap();
    assert_eq!(follow_up.ticket.generation, fresh.ticket.generation);
    assert_eq!(follow_up.query.places_offset, 60);
    assert!(follow_up.query.featured_only);
    assert!(s.status().retry.is_none());
}

#[test]
fn transient_page_zero_keeps_results_and_offers_retry() {
    let mut s = session();
    load(&mut s, page(places("p", 60), Vec::new()));

    let request = s.set_featured_only(true).unwrap();
    s.on_response(request.ticket, Err(transient()));
    assert_eq!(s.loaded(EntityKind::Place), 60);
    assert_eq!(s.status().retry, Some(RetryTarget::Search));
    assert!(s.fetch_more().is_none());

    let again = s.retry().unwrap();
    assert_eq!(again.ticket.mode, FetchMode::Replace);
    assert!(again.query.featured_only);
    assert!(s.status().retry.is_none());
    s.on_response(again.ticket, Ok(page(places("f", 2), Vec::new())));
    assert_eq!(s.loaded(EntityKind::Place), 2);
}

#[test]
fn transient_load_more_can_be_retried_from_same_offset() {
    let mut s = session();
    load(&mut s, page(places("p", 60), happenings("h", 60)));
    let request = s.fetch_more().unwrap();
    assert!(s.on_response(request.ticket, Err(transient())).is_none());
    assert_eq!(s.status().retry, Some(RetryTarget::FetchMore));
    assert_eq!(s.loaded(EntityKind::Place), 60);

    let again = s.retry().unwrap();
    assert_eq!(again.query.places_offset, 60);
    assert_eq!(again.query.happenings_offset, 60);
    assert_eq!(again.query.type_selector, TypeSelector::All);
    assert!(s.status().retry.is_none());
}

#[test]
fn malformed_page_zero_is_empty_and_final() {
    let mut s = session();
    load(&mut s, page(places("p", 10), Vec::new()));
    let request = s.refresh();
    s.on_response(
        request.ticket,
        Err(BackendError::Malformed {
            message: "expected value at line 1".to_string(),
        }),
    );
    assert!(s.unified_items().is_empty());
    assert!(s.is_exhausted());
    assert!(s.fetch_more().is_none());
    assert!(s.status().retry.is_none());
}

#[test]
fn malformed_load_more_exhausts_requested_kinds() {
    let mut s = session();
    load(&mut s, page(places("p", 60), happenings("h", 60)));
    let request = s.fetch_more().unwrap();
    s.on_response(
        request.ticket,
        Err(BackendError::Malformed {
            message: "missing field".to_string(),
        }),
    );
    assert!(s.is_exhausted());
    assert_eq!(s.unified_items().len(), 120);
}

fn clustered_session() -> DiscoverySession {
    let mut s = session();
    let x = Coordinate::new(-4.005_51, -79.205_23);
    let y = Coordinate::new(-4.1, -79.3);
    load(
        &mut s,
        page(
            vec![
                place("x1", Some(x)),
                place("x2", Some(x)),
                place("y1", Some(y)),
                place("y2", Some(y)),
                place("solo", Some(Coordinate::new(-3.9, -79.1))),
            ],
            Vec::new(),
        ),
    );
    s
}

#[test]
fn expanding_another_group_closes_the_first() {
    let mut s = clustered_session();
    let now = Instant::now();
    let x = s.marker_groups()[0].key.clone();
    let y = s.marker_groups()[1].key.clone();

    s.activate_group(&x, now).unwrap();
    s.activate_group(&y, now).unwrap();
    assert_eq!(s.interaction().expanded_group_key(), Some(y.as_str()));
    assert_eq!(s.interaction().closing_group_key(), Some(x.as_str()));
    let closing = s.interaction().closing().unwrap();
    assert_eq!(closing.legs.len(), 2);

    let (timer_id, _) = s.settle_timer().unwrap();
    assert!(s.settle_elapsed(timer_id));
    assert_eq!(s.interaction().closing_group_key(), None);
    assert_eq!(s.interaction().expanded_group_key(), Some(y.as_str()));
}

#[test]
fn activating_single_member_group_selects_its_item() {
    let mut s = clustered_session();
    let solo = s.marker_groups()[2].key.clone();
    s.activate_group(&solo, Instant::now()).unwrap();
    assert_eq!(s.interaction().active_item_id(), Some("solo"));
    assert!(s.interaction().is_idle());
}

#[test]
fn unknown_group_and_item_are_rejected() {
    let mut s = clustered_session();
    assert_eq!(
        s.activate_group("0.00000,0.00000", Instant::now()),
        Err(SessionError::UnknownGroup("0.00000,0.00000".to_string()))
    );
    assert_eq!(
        s.select_item("ghost"),
        Err(SessionError::UnknownItem("ghost".to_string()))
    );
}

#[test]
fn background_click_collapses_and_clears_active_item() {
    let mut s = clustered_session();
    let now = Instant::now();
    let x = s.marker_groups()[0].key.clone();
    s.activate_group(&x, now).unwrap();
    s.select_item("x1").unwrap();

    s.background_click(now);
    assert_eq!(s.interaction().expanded_group_key(), None);
    assert_eq!(s.interaction().closing_group_key(), Some(x.as_str()));
    assert_eq!(s.interaction().active_item_id(), None);
}

#[test]
fn full_refresh_drops_group_state_but_keeps_surviving_selection() {
    let mut s = clustered_session();
    let x = s.marker_groups()[0].key.clone();
    s.activate_group(&x, Instant::now()).unwrap();
    s.select_item("solo").unwrap();

    let request = s.refresh();
    s.on_response(
        request.ticket,
        Ok(page(
            vec![place("solo", Some(Coordinate::new(-3.9, -79.1)))],
            Vec::new(),
        )),
    );
    assert!(s.interaction().is_idle());
    assert_eq!(s.interaction().active_item_id(), Some("solo"));
}

#[test]
fn rendered_markers_follow_zoom() {
    let mut s = clustered_session();
    let x = s.marker_groups()[0].key.clone();
    s.activate_group(&x, Instant::now()).unwrap();

    let spread = |s: &DiscoverySession| -> f64 {
        s.rendered_markers()
            .into_iter()
            .find_map(|m| match m {
                RenderedMarker::Spider { centroid, legs, .. } => {
                    Some((legs[0].position.lng - centroid.lng).abs())
                }
                _ => None,
            })
            .unwrap()
    };
    let wide = spread(&s);
    s.set_zoom(16.0).unwrap();
    let tight = spread(&s);
    assert!((wide / tight - 4.0).abs() < 1e-9);
    assert!(s.set_zoom(f64::NAN).is_err());
}

#[test]
fn snapshot_reflects_session() {
    let mut s = clustered_session();
    s.set_proximity_anchor(Some(ANCHOR));
    s.set_radius(50_000.0).unwrap();
    let snapshot = s.snapshot();
    assert_eq!(snapshot.visible_count, 5);
    assert_eq!(snapshot.total_loaded, 5);
    assert_eq!(snapshot.marker_groups.len(), 3);
    assert_eq!(snapshot.rendered_markers.len(), 3);
    assert_eq!(
        snapshot.proximity_overlay.map(|ring| ring.len()),
        Some(OVERLAY_SEGMENTS + 1)
    );
    assert!(snapshot.status.is_settled());
}
