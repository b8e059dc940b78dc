//! Nearest-center spatial join from buildings to neighborhoods.
//!
//! Rasterizes the region into a coarse lookup grid, assigns each grid cell to
//! the nearest neighborhood center within a fixed search radius (an
//! approximate Voronoi partition), then aggregates building residents and
//! jobs per neighborhood.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use geo::Coord;
use rstar::{AABB, RTree, RTreeObject};
use serde::Serialize;

use crate::buildings::{self, BuildingUse};
use crate::config::Region;
use crate::overpass::RawFeature;

/// Lookup-grid resolution in degrees; deliberately coarser than the building grid.
pub(crate) const LOOKUP_RESOLUTION_DEG: f64 = 0.002;

/// Search envelope half-width around a lookup cell, in degrees.
pub(crate) const SEARCH_RADIUS_DEG: f64 = 0.05;

const PLACE_ALLOWLIST: &[&str] = &["quarter", "neighbourhood", "suburb", "hamlet", "village"];

/// Internal per-neighborhood aggregation record.
#[derive(Debug, Clone)]
pub struct NeighborhoodMeta {
    pub raw_id: u64,
    pub name: Option<String>,
    pub total_population: u64,
    pub total_jobs: u64,
    pub percent_of_total_population: f64,
    pub percent_of_total_jobs: f64,
}

/// One neighborhood as written to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodPoint {
    /// Final assigned id: the raw feature id, or `AIR_Terminal_<n>` for
    /// airport terminals.
    pub id: String,
    /// `[lon, lat]` of the representative center.
    pub location: [f64; 2],
    pub jobs: u64,
    pub residents: u64,
    /// Ids of the demand connections this neighborhood participates in.
    pub pop_ids: Vec<u32>,
}

/// Result of the spatial join for one region.
pub struct Assignment {
    /// Aggregation records in ascending raw-id order.
    pub metas: Vec<NeighborhoodMeta>,
    /// Representative center per raw id.
    pub centers: AHashMap<u64, Coord<f64>>,
    /// Sink records keyed by raw id; `pop_ids` filled by demand synthesis.
    pub finals: BTreeMap<u64, NeighborhoodPoint>,
    pub total_population: u64,
    pub total_jobs: u64,
    /// Population of accepted buildings that landed outside every
    /// neighborhood's reach.
    pub unassigned_population: u64,
}

struct CenterEntry {
    id: u64,
    center: [f64; 2],
}

impl RTreeObject for CenterEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.center)
    }
}

/// Nearest candidate by squared planar lon/lat distance (not geodesic —
/// acceptable at lookup-grid scale). Exact ties resolve to the lowest raw id,
/// independent of candidate iteration order.
fn nearest_center<'a>(
    lon: f64,
    lat: f64,
    candidates: impl Iterator<Item = &'a CenterEntry>,
) -> Option<u64> {
    let mut nearest: Option<(f64, u64)> = None;
    for entry in candidates {
        let d_lon = lon - entry.center[0];
        let d_lat = lat - entry.center[1];
        let dist_sq = d_lon * d_lon + d_lat * d_lat;
        let better = match nearest {
            None => true,
            Some((best_sq, best_id)) => {
                dist_sq < best_sq || (dist_sq == best_sq && entry.id < best_id)
            }
        };
        if better {
            nearest = Some((dist_sq, entry.id));
        }
    }
    nearest.map(|(_, id)| id)
}

fn is_neighborhood(feature: &RawFeature) -> bool {
    if let Some(place) = feature.tag("place") {
        if PLACE_ALLOWLIST.contains(&place) {
            return true;
        }
    }
    feature.tag("aeroway") == Some("terminal")
}

fn is_terminal(feature: &RawFeature) -> bool {
    feature.tag("aeroway") == Some("terminal")
}

/// Assign buildings to their nearest neighborhood and aggregate totals.
///
/// `terminal_counter` is run-scoped state owned by the orchestrator: every
/// terminal across all of a run's regions draws a unique synthetic id from it.
pub fn assign(
    region: &Region,
    building_features: &[RawFeature],
    places: &[RawFeature],
    terminal_counter: &mut u32,
    verbose: u8,
) -> Assignment {
    // Filter places to the allow-listed categories; the BTreeMap both
    // dedupes overlapping-tile repeats and fixes ascending raw-id order.
    let mut candidates: BTreeMap<u64, &RawFeature> = BTreeMap::new();
    for place in places {
        if is_neighborhood(place) {
            candidates.entry(place.id).or_insert(place);
        }
    }

    // Representative centers; places with neither a coordinate nor reported
    // bounds cannot participate.
    let mut centers: AHashMap<u64, Coord<f64>> = AHashMap::with_capacity(candidates.len());
    candidates.retain(|id, place| match place.center() {
        Some(center) => {
            centers.insert(*id, center);
            true
        }
        None => false,
    });

    if verbose > 0 {
        eprintln!("[neighborhoods] {} centers in {}", centers.len(), region.code);
    }

    let tree = RTree::bulk_load(
        candidates
            .keys()
            .map(|id| CenterEntry { id: *id, center: [centers[id].x, centers[id].y] })
            .collect(),
    );

    // Coarse lookup raster over the region bbox.
    let bbox = region.bbox_rect();
    let cols = ((bbox.width() / LOOKUP_RESOLUTION_DEG).ceil() as usize).max(1);
    let rows = ((bbox.height() / LOOKUP_RESOLUTION_DEG).ceil() as usize).max(1);
    let mut lookup: Vec<Option<u64>> = vec![None; cols * rows];

    for (idx, slot) in lookup.iter_mut().enumerate() {
        let col = idx % cols;
        let row = idx / cols;
        let lon = bbox.min().x + col as f64 * LOOKUP_RESOLUTION_DEG;
        let lat = bbox.min().y + row as f64 * LOOKUP_RESOLUTION_DEG;

        let envelope = AABB::from_corners(
            [lon - SEARCH_RADIUS_DEG, lat - SEARCH_RADIUS_DEG],
            [lon + SEARCH_RADIUS_DEG, lat + SEARCH_RADIUS_DEG],
        );

        *slot = nearest_center(lon, lat, tree.locate_in_envelope_intersecting(&envelope));
    }

    // Aggregate accepted buildings into their cell's neighborhood.
    let mut metas: BTreeMap<u64, NeighborhoodMeta> = candidates
        .iter()
        .map(|(id, place)| {
            (*id, NeighborhoodMeta {
                raw_id: *id,
                name: place.tag("name").map(str::to_string),
                total_population: 0,
                total_jobs: 0,
                percent_of_total_population: 0.0,
                percent_of_total_jobs: 0.0,
            })
        })
        .collect();

    let mut seen: AHashSet<u64> = AHashSet::new();
    let mut unassigned_population = 0u64;
    for feature in building_features {
        let Some(building) = buildings::derive(feature) else { continue };
        if !seen.insert(building.id) {
            continue;
        }

        let col = ((building.center.x - bbox.min().x) / LOOKUP_RESOLUTION_DEG).floor();
        let row = ((building.center.y - bbox.min().y) / LOOKUP_RESOLUTION_DEG).floor();
        let assigned = (col >= 0.0 && row >= 0.0 && (col as usize) < cols && (row as usize) < rows)
            .then(|| lookup[row as usize * cols + col as usize])
            .flatten()
            .and_then(|id| metas.get_mut(&id));

        match (assigned, building.usage) {
            (Some(meta), BuildingUse::Residents(pop)) => meta.total_population += pop,
            (Some(meta), BuildingUse::Jobs(jobs)) => meta.total_jobs += jobs,
            (None, BuildingUse::Residents(pop)) => unassigned_population += pop,
            (None, BuildingUse::Jobs(_)) => {}
        }
    }

    let total_population: u64 = metas.values().map(|m| m.total_population).sum();
    let total_jobs: u64 = metas.values().map(|m| m.total_jobs).sum();

    for meta in metas.values_mut() {
        meta.percent_of_total_population = if total_population > 0 {
            meta.total_population as f64 / total_population as f64
        } else {
            0.0
        };
        meta.percent_of_total_jobs = if total_jobs > 0 {
            meta.total_jobs as f64 / total_jobs as f64
        } else {
            0.0
        };
    }

    // Final ids: terminals are renamed from the run-scoped counter so two
    // terminals sharing a cell with an ordinary neighborhood stay distinct.
    let finals: BTreeMap<u64, NeighborhoodPoint> = metas
        .iter()
        .map(|(id, meta)| {
            let final_id = if is_terminal(candidates[id]) {
                let n = *terminal_counter;
                *terminal_counter += 1;
                format!("AIR_Terminal_{n}")
            } else {
                id.to_string()
            };
            (*id, NeighborhoodPoint {
                id: final_id,
                location: [centers[id].x, centers[id].y],
                jobs: meta.total_jobs,
                residents: meta.total_population,
                pop_ids: Vec::new(),
            })
        })
        .collect();

    Assignment {
        metas: metas.into_values().collect(),
        centers,
        finals,
        total_population,
        total_jobs,
        unassigned_population,
    }
}
