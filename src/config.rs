use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use geo::{Coord, Rect};
use serde::Deserialize;

/// Default public interpreter endpoint for the query service.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// A named, bounded geographic area processed independently.
#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    /// Short unique identifier, used as the per-region directory name.
    pub code: String,
    pub name: String,
    /// `[min_lon, min_lat, max_lon, max_lat]` in degrees.
    pub bbox: [f64; 4],
    /// Approximate population, carried through for downstream consumers.
    pub population: u64,
}

impl Region {
    /// The region's bounding box as a rectangle in lon/lat degrees.
    pub fn bbox_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.bbox[0], y: self.bbox[1] },
            Coord { x: self.bbox[2], y: self.bbox[3] },
        )
    }
}

/// Retry policy for individual network calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay_ms: 2000 }
    }
}

/// Batch sizes for the CPU-bound transform stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSizes {
    /// Buildings per indexing worker batch.
    pub buildings: usize,
    /// Demand origins per synthesis worker batch.
    pub demand: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self { buildings: 50_000, demand: 100 }
    }
}

/// Maximum tile edge length in degrees, per feature category.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TileSizes {
    pub roads: f64,
    pub buildings: f64,
    pub places: f64,
}

impl Default for TileSizes {
    fn default() -> Self {
        Self { roads: 0.5, buildings: 0.25, places: 0.5 }
    }
}

/// Pacing and sizing knobs. Every field has a default, so a minimal
/// configuration file is just the region list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    /// Pause between consecutive tile requests, before jitter.
    pub request_delay_ms: u64,
    /// Pause between the road/building/place datasets of one region.
    pub dataset_delay_ms: u64,
    /// Regions downloading concurrently.
    pub max_concurrent_downloads: usize,
    /// Worker sizing mode: `> 0` a fixed count, `-1` every hardware thread,
    /// anything else all but one hardware thread.
    pub worker_threads: i32,
    /// Whether to attempt a single whole-bbox query before tiling.
    pub try_full_bbox_first: bool,
    /// Largest bbox area (square degrees) eligible for the whole-bbox attempt.
    pub full_bbox_area_max: f64,
    pub retry: RetryConfig,
    pub batch_sizes: BatchSizes,
    pub tile_sizes: TileSizes,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 300,
            dataset_delay_ms: 1000,
            max_concurrent_downloads: 2,
            worker_threads: 0,
            try_full_bbox_first: true,
            full_bbox_area_max: 1.5,
            retry: RetryConfig::default(),
            batch_sizes: BatchSizes::default(),
            tile_sizes: TileSizes::default(),
        }
    }
}

/// Top-level run configuration: the region list plus tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub regions: Vec<Region>,
    /// Preferred locale for street-name resolution.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Query service endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub perf: PerfConfig,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Config {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config {}", path.display()))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        if config.regions.is_empty() {
            anyhow::bail!("Config {} lists no regions", path.display());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let json = r#"{
            "regions": [
                {"code": "BER", "name": "Berlin", "bbox": [13.0884, 52.3383, 13.7611, 52.6755], "population": 3769000}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.locale, "en");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.perf.request_delay_ms, 300);
        assert_eq!(config.perf.max_concurrent_downloads, 2);
        assert_eq!(config.perf.retry.max_attempts, 4);
        assert_eq!(config.perf.batch_sizes.buildings, 50_000);
        assert_eq!(config.perf.tile_sizes.buildings, 0.25);
        assert!(config.perf.try_full_bbox_first);
    }

    #[test]
    fn overrides_apply() {
        let json = r#"{
            "regions": [{"code": "X", "name": "X", "bbox": [0.0, 0.0, 1.0, 1.0], "population": 1}],
            "perf": {"worker_threads": 3, "retry": {"max_attempts": 2}}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.perf.worker_threads, 3);
        assert_eq!(config.perf.retry.max_attempts, 2);
        // Untouched nested fields keep their defaults.
        assert_eq!(config.perf.retry.base_delay_ms, 2000);
    }

    #[test]
    fn region_bbox_rect_orientation() {
        let region = Region {
            code: "BER".into(),
            name: "Berlin".into(),
            bbox: [13.0884, 52.3383, 13.7611, 52.6755],
            population: 3_769_000,
        };
        let rect = region.bbox_rect();
        assert_eq!(rect.min().x, 13.0884);
        assert_eq!(rect.max().y, 52.6755);
    }
}
