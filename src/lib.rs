#![doc = "Demandmap public API"]
mod buildings;
pub mod cli;
pub mod commands;
mod common;
mod config;
pub mod demand;
pub mod index;
pub mod neighborhoods;
pub mod overpass;
mod pipeline;
mod roads;
mod taxonomy;
mod workers;

#[doc(inline)]
pub use config::{Config, PerfConfig, Region, RetryConfig};

#[doc(inline)]
pub use buildings::{BuildingFeature, BuildingUse};

#[doc(inline)]
pub use index::{BuildingIndex, build_index};

#[doc(inline)]
pub use overpass::{OverpassClient, QueryKind, QueryService, RawFeature, TileFetcher};

#[doc(inline)]
pub use pipeline::{Pipeline, RegionStats, RunTotals};

#[doc(inline)]
pub use roads::RoadCollection;
