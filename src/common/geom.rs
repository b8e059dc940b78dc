use geo::{Coord, Rect};

/// Mean Earth radius in meters.
pub(crate) const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator).
pub(crate) const METERS_PER_DEGREE: f64 = 111_320.0;

/// Square feet per square meter.
pub(crate) const SQFT_PER_M2: f64 = 10.7639;

/// Haversine great-circle distance between two lon/lat coordinates, in meters.
pub(crate) fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d_lat = (b.y - a.y).to_radians();
    let d_lon = (b.x - a.x).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.y.to_radians().cos() * b.y.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Approximate area of a closed lon/lat ring in square meters.
///
/// Shoelace over degrees, scaled by the meters-per-degree factor and corrected
/// for longitude compression at the ring's first vertex. Adequate at building
/// scale; not a geodesic area.
pub(crate) fn ring_area_m2(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for pair in ring.windows(2) {
        area += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
    }
    (area / 2.0).abs() * METERS_PER_DEGREE * METERS_PER_DEGREE * ring[0].y.to_radians().cos()
}

/// Axis-aligned bounding box of a set of lon/lat vertices.
pub(crate) fn ring_bbox(ring: &[Coord<f64>]) -> Option<Rect<f64>> {
    let first = ring.first()?;
    let mut min = *first;
    let mut max = *first;
    for c in &ring[1..] {
        min.x = min.x.min(c.x);
        min.y = min.y.min(c.y);
        max.x = max.x.max(c.x);
        max.y = max.y.max(c.y);
    }
    Some(Rect::new(min, max))
}

/// Area of a bounding box in square degrees.
#[inline]
pub(crate) fn bbox_area_deg(bbox: &Rect<f64>) -> f64 {
    bbox.width() * bbox.height()
}

/// Cover `bbox` with a row-major list of tiles no larger than `max_size`
/// degrees on either axis. Edge tiles are clipped to the bbox.
pub(crate) fn generate_tiles(bbox: &Rect<f64>, max_size: f64) -> Vec<Rect<f64>> {
    let mut tiles = Vec::new();
    let mut lat = bbox.min().y;
    while lat < bbox.max().y {
        let next_lat = (lat + max_size).min(bbox.max().y);
        let mut lon = bbox.min().x;
        while lon < bbox.max().x {
            let next_lon = (lon + max_size).min(bbox.max().x);
            tiles.push(Rect::new(
                Coord { x: lon, y: lat },
                Coord { x: next_lon, y: next_lat },
            ));
            lon = next_lon;
        }
        lat = next_lat;
    }
    tiles
}

/// Split a bounding box into its four equal quadrants.
pub(crate) fn quadrants(bbox: &Rect<f64>) -> [Rect<f64>; 4] {
    let center = bbox.center();
    [
        Rect::new(bbox.min(), center),
        Rect::new(Coord { x: center.x, y: bbox.min().y }, Coord { x: bbox.max().x, y: center.y }),
        Rect::new(Coord { x: bbox.min().x, y: center.y }, Coord { x: center.x, y: bbox.max().y }),
        Rect::new(center, bbox.max()),
    ]
}
