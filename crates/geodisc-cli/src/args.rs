//! Value parsers for coordinate-shaped CLI arguments.

use geodisc_core::Coordinate;
use geodisc_engine::BoundingBox;

fn parse_numbers<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!(
            "expected {N} comma-separated numbers for {what}, got '{s}'"
        ));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(&parts) {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("'{part}' is not a number"))?;
        if !value.is_finite() {
            return Err(format!("'{part}' is not a finite number"));
        }
        *slot = value;
    }
    Ok(out)
}

/// Parses `LAT,LNG`.
pub(crate) fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let [lat, lng] = parse_numbers::<2>(s, "LAT,LNG")?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("coordinate out of range: {lat},{lng}"));
    }
    Ok(Coordinate::new(lat, lng))
}

/// Parses `SOUTH,WEST,NORTH,EAST`.
pub(crate) fn parse_bounds(s: &str) -> Result<BoundingBox, String> {
    let [south, west, north, east] = parse_numbers::<4>(s, "SOUTH,WEST,NORTH,EAST")?;
    Ok(BoundingBox::new(south, west, north, east))
}
