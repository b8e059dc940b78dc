use geo::{Coord, Rect};

use crate::common::geom::{SQFT_PER_M2, ring_area_m2, ring_bbox};
use crate::overpass::RawFeature;
use crate::taxonomy;

/// A building's demand contribution: residents or jobs, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingUse {
    Residents(u64),
    Jobs(u64),
}

/// A building that qualifies for the neighborhood/demand stages: it carries a
/// taxonomy-listed `building` tag and a non-degenerate footprint.
#[derive(Debug, Clone)]
pub struct BuildingFeature {
    pub id: u64,
    pub bbox: Rect<f64>,
    pub center: Coord<f64>,
    pub usage: BuildingUse,
}

/// Derive a qualified building from a raw feature, or `None` if the feature
/// has no taxonomy-listed building tag or a degenerate outline.
pub fn derive(feature: &RawFeature) -> Option<BuildingFeature> {
    let tag = feature.tag("building")?;
    let ring = feature.closed_ring()?;
    let bbox = ring_bbox(&ring)?;

    let area_m2 = ring_area_m2(&ring);
    let levels = feature
        .tag("building:levels")
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.max(1.0))
        .unwrap_or(1.0);
    let floor_sqft = area_m2 * levels * SQFT_PER_M2;

    let usage = if let Some(per_resident) = taxonomy::sqft_per_resident(tag) {
        BuildingUse::Residents((floor_sqft / per_resident).floor() as u64)
    } else if let Some(per_job) = taxonomy::sqft_per_job(tag) {
        let mut jobs = (floor_sqft / per_job).floor() as u64;
        // Terminal buildings serve far more traffic than their floor area suggests.
        if feature.tag("aeroway") == Some("terminal") {
            jobs *= 20;
        }
        BuildingUse::Jobs(jobs)
    } else {
        return None;
    };

    Some(BuildingFeature { id: feature.id, bbox, center: bbox.center(), usage })
}
