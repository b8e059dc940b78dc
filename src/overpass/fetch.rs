use std::thread;
use std::time::Duration;

use geo::Rect;
use rand::Rng;

use crate::common::geom::{bbox_area_deg, generate_tiles, quadrants};
use crate::config::PerfConfig;
use crate::overpass::{QueryKind, QueryService, RawFeature};

/// Subdivision stops at this depth regardless of tile area.
const MAX_SPLIT_DEPTH: u32 = 3;

/// Tiles smaller than this (square degrees) are leaves and never subdivided.
const LEAF_AREA_DEG: f64 = 0.01;

/// Empty or failing tiles larger than this are split into quadrants.
const SPLIT_AREA_DEG: f64 = 0.1;

/// Upper bound on the random jitter added between top-level tile requests.
const JITTER_MS: u64 = 500;

/// Fault-tolerant tiled acquisition against a [`QueryService`].
///
/// `fetch` never fails: network-level trouble degrades to sparser output,
/// bottoming out at an empty result.
pub struct TileFetcher<'a> {
    service: &'a dyn QueryService,
    perf: &'a PerfConfig,
    verbose: u8,
}

impl<'a> TileFetcher<'a> {
    pub fn new(service: &'a dyn QueryService, perf: &'a PerfConfig, verbose: u8) -> Self {
        Self { service, perf, verbose }
    }

    /// Acquire every feature of `kind` inside `bbox`.
    ///
    /// Tries one optimistic whole-bbox query (single attempt) when the area
    /// is small enough, then falls back to uniform tiling with adaptive
    /// per-tile refinement.
    pub fn fetch(&self, kind: QueryKind, bbox: &Rect<f64>) -> Vec<RawFeature> {
        let area = bbox_area_deg(bbox);
        if self.perf.try_full_bbox_first && area <= self.perf.full_bbox_area_max {
            match self.service.query(kind, bbox, 1) {
                Ok(features) if !features.is_empty() => return features,
                Ok(_) => {
                    if self.verbose > 0 {
                        eprintln!("[fetch:{}] whole-bbox query empty, tiling", kind.label());
                    }
                }
                Err(err) => {
                    if self.verbose > 0 {
                        eprintln!("[fetch:{}] whole-bbox query failed ({err:#}), tiling", kind.label());
                    }
                }
            }
        }
        self.fetch_tiled(kind, bbox)
    }

    fn fetch_tiled(&self, kind: QueryKind, bbox: &Rect<f64>) -> Vec<RawFeature> {
        let tiles = generate_tiles(bbox, kind.tile_size(&self.perf.tile_sizes));
        if self.verbose > 0 {
            eprintln!("[fetch:{}] {} tiles", kind.label(), tiles.len());
        }

        let mut all = Vec::new();
        for (i, tile) in tiles.iter().enumerate() {
            all.extend(self.fetch_tile_adaptive(kind, tile));
            if i + 1 < tiles.len() {
                self.pause(true);
            }
        }
        all
    }

    /// Adaptive refinement of one tile: an explicit depth-first worklist
    /// instead of recursion, so pathological inputs cannot exhaust the stack.
    fn fetch_tile_adaptive(&self, kind: QueryKind, tile: &Rect<f64>) -> Vec<RawFeature> {
        let mut features = Vec::new();
        let mut worklist: Vec<(Rect<f64>, u32)> = vec![(*tile, 0)];
        let mut first = true;

        while let Some((tile, depth)) = worklist.pop() {
            if !first {
                self.pause(false);
            }
            first = false;

            let area = bbox_area_deg(&tile);

            // Leaves tolerate failure: an exhausted retry budget yields an
            // empty sub-result, never an error.
            if depth >= MAX_SPLIT_DEPTH || area < LEAF_AREA_DEG {
                if let Ok(batch) = self.service.query(kind, &tile, self.perf.retry.max_attempts) {
                    features.extend(batch);
                }
                continue;
            }

            match self.service.query(kind, &tile, self.perf.retry.max_attempts) {
                Ok(batch) if batch.is_empty() && area > SPLIT_AREA_DEG => {
                    self.push_quadrants(&mut worklist, &tile, depth);
                }
                Ok(batch) => features.extend(batch),
                Err(err) => {
                    if area > SPLIT_AREA_DEG {
                        if self.verbose > 1 {
                            eprintln!("[fetch:{}] tile failed ({err:#}), splitting", kind.label());
                        }
                        self.push_quadrants(&mut worklist, &tile, depth);
                    }
                }
            }
        }
        features
    }

    fn push_quadrants(&self, worklist: &mut Vec<(Rect<f64>, u32)>, tile: &Rect<f64>, depth: u32) {
        // Reversed so the depth-first pop order matches quadrant order.
        for quad in quadrants(tile).into_iter().rev() {
            worklist.push((quad, depth + 1));
        }
    }

    fn pause(&self, jitter: bool) {
        let mut delay = self.perf.request_delay_ms;
        if jitter {
            delay += rand::rng().random_range(0..JITTER_MS);
        }
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
    }
}
