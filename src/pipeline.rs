//! Per-region orchestration of the acquisition and transform phases.
//!
//! Regions download with bounded concurrency; the compute-heavy transform
//! phase processes one region fully before starting the next, so a region's
//! working set is the peak-memory bound.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::common::fs::{ensure_dir_exists, read_json_gz, recreate_dir, write_json_gz};
use crate::config::{Config, Region};
use crate::demand::{self, DemandData, DemandStats};
use crate::index;
use crate::neighborhoods;
use crate::overpass::{OverpassClient, QueryKind, RawFeature, TileFetcher};
use crate::roads::{self, RoadCollection};

/// Per-region summary of the transform phase.
#[derive(Debug, Clone)]
pub struct RegionStats {
    pub region: String,
    pub population: u64,
    pub jobs: u64,
    pub neighborhoods: usize,
    pub connections: usize,
    pub buildings: usize,
    pub movement: u64,
}

/// Accumulated run-wide totals.
#[derive(Debug, Clone, Default)]
pub struct RunTotals {
    pub population: u64,
    pub jobs: u64,
    pub neighborhoods: usize,
    pub connections: usize,
    pub buildings: usize,
    pub movement: u64,
}

impl RunTotals {
    fn add(&mut self, stats: &RegionStats) {
        self.population += stats.population;
        self.jobs += stats.jobs;
        self.neighborhoods += stats.neighborhoods;
        self.connections += stats.connections;
        self.buildings += stats.buildings;
        self.movement += stats.movement;
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    raw_dir: PathBuf,
    out_dir: PathBuf,
    verbose: u8,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, raw_dir: &Path, out_dir: &Path, verbose: u8) -> Self {
        Self {
            config,
            raw_dir: raw_dir.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            verbose,
        }
    }

    /// Acquisition phase: fetch and store raw artifacts for every region,
    /// with at most `max_concurrent_downloads` regions in flight.
    pub fn download_all(&self) -> Result<()> {
        ensure_dir_exists(&self.raw_dir)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.perf.max_concurrent_downloads.max(1))
            .build()
            .context("Failed to build download pool")?;

        pool.install(|| {
            self.config
                .regions
                .par_iter()
                .map(|region| self.download_region(region))
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(())
    }

    /// One region's acquisition: the three categories fetch strictly
    /// sequentially with a pause between datasets, out of courtesy to the
    /// shared query service.
    fn download_region(&self, region: &Region) -> Result<()> {
        let dir = self.raw_dir.join(&region.code);
        ensure_dir_exists(&dir)?;

        let client = OverpassClient::new(&self.config.endpoint, self.config.perf.retry.clone())?;
        let fetcher = TileFetcher::new(&client, &self.config.perf, self.verbose);
        let bbox = region.bbox_rect();

        if self.verbose > 0 {
            eprintln!("[download] region={} -> {}", region.code, dir.display());
        }

        let road_features = fetcher.fetch(QueryKind::Roads, &bbox);
        self.dataset_pause();
        let buildings = fetcher.fetch(QueryKind::Buildings, &bbox);
        self.dataset_pause();
        let places = fetcher.fetch(QueryKind::Places, &bbox);

        if self.verbose > 0 {
            eprintln!(
                "[download] region={} roads={} buildings={} places={}",
                region.code,
                road_features.len(),
                buildings.len(),
                places.len()
            );
        }

        write_json_gz(
            &dir.join("roads.geojson.gz"),
            &roads::process(&road_features, &self.config.locale),
        )?;
        write_json_gz(&dir.join("buildings.json.gz"), &buildings)?;
        write_json_gz(&dir.join("places.json.gz"), &places)?;
        Ok(())
    }

    /// Transform phase: one region at a time, sharing the run-scoped
    /// terminal counter across regions.
    pub fn process_all(&self) -> Result<RunTotals> {
        ensure_dir_exists(&self.out_dir)?;

        let mut terminal_counter = 0u32;
        let mut totals = RunTotals::default();
        for region in &self.config.regions {
            let stats = self.process_region(region, &mut terminal_counter)?;
            if self.verbose > 0 {
                eprintln!(
                    "[process] region={} buildings={} neighborhoods={} connections={}",
                    stats.region, stats.buildings, stats.neighborhoods, stats.connections
                );
            }
            totals.add(&stats);
        }
        Ok(totals)
    }

    fn process_region(&self, region: &Region, terminal_counter: &mut u32) -> Result<RegionStats> {
        let raw_dir = self.raw_dir.join(&region.code);
        let out_dir = self.out_dir.join(&region.code);
        recreate_dir(&out_dir)?;

        // Raw buildings/places are required inputs; their absence is a
        // structural failure, reported with region and category.
        let buildings: Vec<RawFeature> = read_json_gz(&raw_dir.join("buildings.json.gz"))
            .with_context(|| format!("Region {}: buildings artifact unavailable", region.code))?;
        let places: Vec<RawFeature> = read_json_gz(&raw_dir.join("places.json.gz"))
            .with_context(|| format!("Region {}: places artifact unavailable", region.code))?;

        let index = index::build_index(&buildings, &self.config.perf, self.verbose)?;
        write_json_gz(&out_dir.join("buildings_index.json.gz"), &index)?;

        // Roads pass straight through; a region without road data degrades
        // to an empty collection rather than failing.
        let raw_roads = raw_dir.join("roads.geojson.gz");
        let out_roads = out_dir.join("roads.geojson.gz");
        if raw_roads.exists() {
            fs::copy(&raw_roads, &out_roads)
                .with_context(|| format!("Region {}: copying roads artifact", region.code))?;
        } else {
            write_json_gz(&out_roads, &RoadCollection::empty())?;
        }

        let assignment =
            neighborhoods::assign(region, &buildings, &places, terminal_counter, self.verbose);
        let mut finals = assignment.finals;
        let connections = demand::synthesize(
            &assignment.metas,
            &assignment.centers,
            &mut finals,
            &self.config.perf,
            self.verbose,
        )?;

        let movement: u64 = connections.iter().map(|c| c.size).sum();
        let stats = RegionStats {
            region: region.name.clone(),
            population: assignment.total_population,
            jobs: assignment.total_jobs,
            neighborhoods: finals.len(),
            connections: connections.len(),
            buildings: index.stats.count,
            movement,
        };

        let data = DemandData {
            stats: DemandStats {
                total_population: assignment.total_population,
                total_jobs: assignment.total_jobs,
                neighborhoods: finals.len(),
                connections: connections.len(),
                avg_connection_size: if connections.is_empty() {
                    0
                } else {
                    (movement as f64 / connections.len() as f64).round() as u64
                },
                total_movement: movement,
            },
            points: finals.into_values().collect(),
            pops: connections,
        };
        write_json_gz(&out_dir.join("demand_data.json.gz"), &data)?;

        Ok(stats)
    }

    fn dataset_pause(&self) {
        let delay = self.config.perf.dataset_delay_ms;
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
    }
}
