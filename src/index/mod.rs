//! Grid-indexed building footprints.
//!
//! Buckets every building footprint into a uniform grid targeting ~100 m
//! cells, then compresses each building to an axis-aligned rectangle record.
//! Outline precision is deliberately discarded for index compactness.

use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::Result;
use geo::{Coord, Rect};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::common::geom::{haversine_m, ring_bbox};
use crate::config::PerfConfig;
use crate::overpass::RawFeature;
use crate::workers;

/// Physical target edge length of one grid cell.
pub(crate) const CELL_SIZE_M: f64 = 100.0;

/// One building compressed to its index record: bounding box, foundation
/// depth, and a 5-point axis-aligned rectangle ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactBuilding {
    /// `[min_lon, min_lat, max_lon, max_lat]`.
    pub b: [f64; 4],
    /// Foundation depth in underground levels (at least 1).
    pub f: u32,
    /// Single closed rectangle ring, polygon-style nesting.
    pub p: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub count: usize,
    pub max_depth: u32,
}

/// The per-region spatial index handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingIndex {
    /// Cell height in degrees of latitude.
    pub cs: f64,
    /// Region-wide bbox over all building vertices.
    pub bbox: [f64; 4],
    /// `[cols, rows]`.
    pub grid: [u32; 2],
    /// Flattened cell records: `[col, row, building_index...]`, sorted by
    /// (col, row). Building indices are positions in `buildings`.
    pub cells: Vec<Vec<u32>>,
    /// Compact records in stable insertion order.
    pub buildings: Vec<CompactBuilding>,
    pub stats: IndexStats,
}

impl BuildingIndex {
    fn empty() -> Self {
        Self {
            cs: 0.0,
            bbox: [0.0; 4],
            grid: [0, 0],
            cells: Vec::new(),
            buildings: Vec::new(),
            stats: IndexStats { count: 0, max_depth: 1 },
        }
    }
}

/// Grid geometry shared by all workers.
#[derive(Debug, Clone, Copy)]
struct GridLayout {
    origin: Coord<f64>,
    cell_width: f64,
    cell_height: f64,
    cols: u32,
    rows: u32,
}

impl GridLayout {
    fn cell_of(&self, point: Coord<f64>) -> (u32, u32) {
        let col = ((point.x - self.origin.x) / self.cell_width).floor() as u32;
        let row = ((point.y - self.origin.y) / self.cell_height).floor() as u32;
        (col.min(self.cols - 1), row.min(self.rows - 1))
    }
}

/// Per-building worker output.
struct BuildingRecord {
    id: u64,
    bbox: Rect<f64>,
    col: u32,
    row: u32,
    depth: u32,
}

/// Build the spatial index over one region's raw building features.
pub fn build_index(
    buildings: &[RawFeature],
    perf: &PerfConfig,
    verbose: u8,
) -> Result<BuildingIndex> {
    // Region-wide bbox over every vertex, including buildings later skipped
    // as degenerate.
    let Some(bbox) = region_bbox(buildings) else {
        return Ok(BuildingIndex::empty());
    };

    let width_m = haversine_m(bbox.min(), Coord { x: bbox.max().x, y: bbox.min().y });
    let height_m = haversine_m(bbox.min(), Coord { x: bbox.min().x, y: bbox.max().y });
    let cols = ((width_m / CELL_SIZE_M).ceil() as u32).max(1);
    let rows = ((height_m / CELL_SIZE_M).ceil() as u32).max(1);
    let grid = GridLayout {
        origin: bbox.min(),
        cell_width: bbox.width() / cols as f64,
        cell_height: bbox.height() / rows as f64,
        cols,
        rows,
    };

    if verbose > 0 {
        eprintln!("[index] {} buildings, grid {}x{}", buildings.len(), cols, rows);
    }

    // Stateless batch-in/batch-out workers; the indexed collect keeps batch
    // order, so the merged list preserves input order.
    let pool = workers::build_pool(perf.worker_threads)?;
    let batch = perf.batch_sizes.buildings.max(1);
    let records: Vec<BuildingRecord> = pool.install(|| {
        buildings
            .par_chunks(batch)
            .flat_map_iter(|chunk| process_batch(chunk, &grid))
            .collect()
    });
    drop(pool);

    // Merge into one id-keyed map. Tiled acquisition can return the same
    // feature from overlapping tiles; the first occurrence wins and defines
    // the positional index.
    let mut seen: AHashMap<u64, u32> = AHashMap::with_capacity(records.len());
    let mut ordered: Vec<BuildingRecord> = Vec::with_capacity(records.len());
    for record in records {
        if !seen.contains_key(&record.id) {
            seen.insert(record.id, ordered.len() as u32);
            ordered.push(record);
        }
    }

    // Re-bucket into cell -> building-position lists, sorted for a
    // deterministic byte-identical serialization.
    let mut cells: BTreeMap<(u32, u32), Vec<u32>> = BTreeMap::new();
    for (position, record) in ordered.iter().enumerate() {
        cells.entry((record.col, record.row)).or_default().push(position as u32);
    }

    let mut max_depth = 1;
    let compact: Vec<CompactBuilding> = ordered
        .iter()
        .map(|record| {
            max_depth = max_depth.max(record.depth);
            compress(record)
        })
        .collect();

    Ok(BuildingIndex {
        cs: grid.cell_height,
        bbox: [bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y],
        grid: [cols, rows],
        cells: cells
            .into_iter()
            .map(|((col, row), members)| {
                let mut cell = vec![col, row];
                cell.extend(members);
                cell
            })
            .collect(),
        stats: IndexStats { count: compact.len(), max_depth },
        buildings: compact,
    })
}

fn region_bbox(buildings: &[RawFeature]) -> Option<Rect<f64>> {
    let mut min = Coord { x: f64::INFINITY, y: f64::INFINITY };
    let mut max = Coord { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY };
    let mut any = false;
    for feature in buildings {
        for point in &feature.geometry {
            any = true;
            min.x = min.x.min(point.lon);
            min.y = min.y.min(point.lat);
            max.x = max.x.max(point.lon);
            max.y = max.y.max(point.lat);
        }
    }
    any.then(|| Rect::new(min, max))
}

/// Pure batch worker: footprint bbox, cell assignment, and foundation depth
/// per building. Degenerate rings are skipped, never an error.
fn process_batch(chunk: &[RawFeature], grid: &GridLayout) -> Vec<BuildingRecord> {
    chunk
        .iter()
        .filter_map(|feature| {
            let ring = feature.closed_ring()?;
            let bbox = ring_bbox(&ring)?;
            let (col, row) = grid.cell_of(bbox.center());
            let depth = feature
                .tag("building:levels:underground")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(1);
            Some(BuildingRecord { id: feature.id, bbox, col, row, depth })
        })
        .collect()
}

fn compress(record: &BuildingRecord) -> CompactBuilding {
    let (min, max) = (record.bbox.min(), record.bbox.max());
    CompactBuilding {
        b: [min.x, min.y, max.x, max.y],
        f: record.depth,
        p: vec![vec![
            [min.x, min.y],
            [max.x, min.y],
            [max.x, max.y],
            [min.x, max.y],
            [min.x, min.y],
        ]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overpass::{FeatureKind, GeomPoint};

    fn building(id: u64, lon: f64, lat: f64, size: f64, tags: &[(&str, &str)]) -> RawFeature {
        RawFeature {
            id,
            kind: FeatureKind::Way,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            geometry: vec![
                GeomPoint { lon, lat },
                GeomPoint { lon: lon + size, lat },
                GeomPoint { lon: lon + size, lat: lat + size },
                GeomPoint { lon, lat: lat + size },
                GeomPoint { lon, lat },
            ],
            bounds: None,
            lon: None,
            lat: None,
        }
    }

    fn perf() -> PerfConfig {
        PerfConfig { worker_threads: 1, ..PerfConfig::default() }
    }

    #[test]
    fn empty_input_yields_empty_index() {
        let index = build_index(&[], &perf(), 0).unwrap();
        assert_eq!(index.stats.count, 0);
        assert_eq!(index.grid, [0, 0]);
        assert!(index.cells.is_empty());
    }

    #[test]
    fn buildings_keep_insertion_order_and_cells_hold_positions() {
        let features = vec![
            building(10, 13.40, 52.50, 0.0005, &[("building", "house")]),
            building(11, 13.45, 52.52, 0.0005, &[("building", "retail")]),
            building(12, 13.40, 52.50, 0.0005, &[("building", "house")]),
        ];
        let index = build_index(&features, &perf(), 0).unwrap();

        assert_eq!(index.stats.count, 3);
        assert_eq!(index.buildings.len(), 3);
        // First building's record comes first, positions are dense.
        assert_eq!(index.buildings[0].b[0], 13.40);
        let mut positions: Vec<u32> =
            index.cells.iter().flat_map(|cell| cell[2..].iter().copied()).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_ids_from_overlapping_tiles_collapse() {
        let features = vec![
            building(10, 13.40, 52.50, 0.0005, &[("building", "house")]),
            building(10, 13.40, 52.50, 0.0005, &[("building", "house")]),
        ];
        let index = build_index(&features, &perf(), 0).unwrap();
        assert_eq!(index.stats.count, 1);
    }

    #[test]
    fn degenerate_rings_are_skipped_not_fatal() {
        let mut broken = building(10, 13.40, 52.50, 0.0005, &[("building", "house")]);
        broken.geometry.truncate(2);
        let ok = building(11, 13.41, 52.51, 0.0005, &[("building", "house")]);

        let index = build_index(&[broken, ok], &perf(), 0).unwrap();
        assert_eq!(index.stats.count, 1);
    }

    #[test]
    fn underground_levels_drive_max_depth() {
        let features = vec![
            building(10, 13.40, 52.50, 0.0005, &[("building", "house")]),
            building(
                11,
                13.41,
                52.51,
                0.0005,
                &[("building", "retail"), ("building:levels:underground", "3")],
            ),
        ];
        let index = build_index(&features, &perf(), 0).unwrap();
        assert_eq!(index.stats.max_depth, 3);
        assert_eq!(index.buildings[0].f, 1);
        assert_eq!(index.buildings[1].f, 3);
    }

    #[test]
    fn compact_ring_is_closed_rectangle() {
        let features = vec![building(10, 13.40, 52.50, 0.001, &[("building", "house")])];
        let index = build_index(&features, &perf(), 0).unwrap();

        let b = &index.buildings[0];
        assert_eq!(b.p.len(), 1);
        assert_eq!(b.p[0].len(), 5);
        assert_eq!(b.p[0][0], b.p[0][4]);
        assert_eq!(b.p[0][0], [b.b[0], b.b[1]]);
        assert_eq!(b.p[0][2], [b.b[2], b.b[3]]);
    }

    #[test]
    fn grid_targets_physical_cell_size() {
        // ~2.2 km x ~1.1 km of footprints: expect tens of 100 m cells.
        let features = vec![
            building(10, 13.40, 52.50, 0.0005, &[("building", "house")]),
            building(11, 13.43, 52.51, 0.0005, &[("building", "house")]),
        ];
        let index = build_index(&features, &perf(), 0).unwrap();
        let [cols, rows] = index.grid;
        assert!(cols >= 15 && cols <= 30, "cols {cols}");
        assert!(rows >= 8 && rows <= 16, "rows {rows}");
    }

    #[test]
    fn rebuild_is_deterministic() {
        let features: Vec<RawFeature> = (0..50)
            .map(|i| {
                building(
                    100 + i,
                    13.40 + (i as f64) * 0.001,
                    52.50 + (i as f64 % 7.0) * 0.002,
                    0.0005,
                    &[("building", "apartments")],
                )
            })
            .collect();

        let a = build_index(&features, &perf(), 0).unwrap();
        let b = build_index(&features, &PerfConfig { worker_threads: 4, ..PerfConfig::default() }, 0)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }
}
