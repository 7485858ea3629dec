//! Plain-text rendering of discovery snapshots.

use geodisc_core::{CategoryCatalog, EntityKind};
use geodisc_engine::{DiscoverableItem, RenderedMarker, RetryTarget, Snapshot, VisibleItem};

const NAME_WIDTH: usize = 40;

/// `850 m` below one kilometer, `1.2 km` above.
pub(crate) fn fmt_distance(meters: Option<f64>) -> String {
    match meters {
        None => "\u{2014}".to_string(),
        Some(m) if m < 1_000.0 => format!("{m:.0} m"),
        Some(m) => format!("{:.1} km", m / 1_000.0),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        format!("{}...", s.chars().take(width).collect::<String>())
    } else {
        s.to_string()
    }
}

fn kind_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Place => "place",
        EntityKind::Happening => "happening",
    }
}

fn when(item: &DiscoverableItem) -> String {
    match item {
        DiscoverableItem::Place(_) => String::new(),
        DiscoverableItem::Happening(h) => h.start_date.format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn item_line(visible: &VisibleItem, active: Option<&str>) -> String {
    let item = &visible.item;
    let marker = if active == Some(item.id()) { "*" } else { " " };
    let featured = if item.featured() { "\u{2605}" } else { " " };
    format!(
        "{marker}{featured} {:<11}{:<10}{:<42}{}",
        kind_label(item.kind()),
        fmt_distance(visible.distance_meters),
        truncate(item.display_name(), NAME_WIDTH),
        when(item),
    )
    .trim_end()
    .to_string()
}

fn marker_lines(marker: &RenderedMarker) -> Vec<String> {
    match marker {
        RenderedMarker::Single { marker, active } => vec![format!(
            "  {:<26}{:.5},{:.5}{}",
            marker.id,
            marker.lat,
            marker.lng,
            if *active { "  (active)" } else { "" }
        )],
        RenderedMarker::Cluster {
            key,
            centroid,
            count,
        } => vec![format!(
            "  {key:<26}{:.5},{:.5}  cluster of {count}",
            centroid.lat, centroid.lng
        )],
        RenderedMarker::Spider {
            key,
            centroid,
            legs,
            active_id,
        } => {
            let mut lines = vec![format!(
                "  {key:<26}{:.5},{:.5}  expanded",
                centroid.lat, centroid.lng
            )];
            for leg in legs {
                let flag = if active_id.as_deref() == Some(leg.id.as_str()) {
                    "  (active)"
                } else {
                    ""
                };
                lines.push(format!(
                    "    {:<24}{:.6},{:.6}{flag}",
                    leg.id, leg.position.lat, leg.position.lng
                ));
            }
            lines
        }
        RenderedMarker::Exiting { key, centroid, .. } => vec![format!(
            "  {key:<26}{:.5},{:.5}  collapsing",
            centroid.lat, centroid.lng
        )],
    }
}

/// Renders the visible list, the marker layer and any status notices.
pub(crate) fn render(snapshot: &Snapshot) -> String {
    let mut lines = Vec::new();

    if let Some(target) = snapshot.status.retry {
        let what = match target {
            RetryTarget::Search => "search",
            RetryTarget::FetchMore => "loading more results",
        };
        lines.push(format!("warning: {what} failed; results may be incomplete"));
    }
    if snapshot.status.proximity_unavailable {
        lines.push("warning: location unavailable; proximity filter is off".to_string());
    }

    let mut summary = format!(
        "{} visible of {} loaded",
        snapshot.visible_count, snapshot.total_loaded
    );
    if let Some(anchor) = snapshot.criteria.proximity_anchor {
        let radius = snapshot.criteria.proximity_radius_meters;
        summary.push_str(&format!(
            " within {} of {:.5},{:.5}",
            fmt_distance(radius),
            anchor.lat,
            anchor.lng
        ));
    }
    lines.push(summary);

    if snapshot.visible_items.is_empty() {
        lines.push("no results".to_string());
    } else {
        lines.push(String::new());
        lines.push(format!(
            "   {:<11}{:<10}{:<42}WHEN",
            "TYPE", "DISTANCE", "NAME"
        ));
        let active = snapshot.interaction.active_item_id();
        for visible in &snapshot.visible_items {
            lines.push(item_line(visible, active));
        }
    }

    if !snapshot.rendered_markers.is_empty() {
        lines.push(String::new());
        lines.push(format!("  {:<26}POSITION", "MARKER"));
        for marker in &snapshot.rendered_markers {
            lines.extend(marker_lines(marker));
        }
    }

    let more: Vec<&str> = EntityKind::ALL
        .iter()
        .filter(|kind| {
            snapshot.criteria.type_selector.includes(**kind)
                && !snapshot.cursors.get(**kind).exhausted
        })
        .map(|kind| kind_label(*kind))
        .collect();
    if !more.is_empty() && snapshot.total_loaded > 0 {
        lines.push(String::new());
        lines.push(format!(
            "more {} available; pass --pages to load them",
            more.join(" and ")
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Renders the category catalog as a table.
pub(crate) fn render_categories(catalog: &CategoryCatalog) -> String {
    if catalog.is_empty() {
        return "no categories\n".to_string();
    }
    let mut out = format!("{:<8}{:<24}{:<28}ICON\n", "ID", "SLUG", "NAME");
    for category in &catalog.categories {
        let icon = if category.icon.is_empty() {
            "\u{2014}"
        } else {
            category.icon.as_str()
        };
        out.push_str(&format!(
            "{:<8}{:<24}{:<28}{icon}\n",
            category.id, category.slug, category.name
        ));
    }
    out
}
