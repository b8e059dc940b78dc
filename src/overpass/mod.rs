//! Acquisition layer: query templates, the interpreter client, and the
//! adaptive tiled fetcher.

mod client;
mod feature;
mod fetch;
mod query;

pub use client::{OverpassClient, QueryService};
pub use feature::{Bounds, FeatureKind, FeatureSet, GeomPoint, RawFeature};
pub use fetch::TileFetcher;
pub use query::QueryKind;
