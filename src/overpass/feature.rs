use std::collections::HashMap;

use geo::Coord;
use serde::{Deserialize, Serialize};

/// Element kind as reported by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Node,
    Way,
    Relation,
}

/// A single lon/lat vertex of a way geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeomPoint {
    pub lon: f64,
    pub lat: f64,
}

impl From<GeomPoint> for Coord<f64> {
    fn from(p: GeomPoint) -> Self {
        Coord { x: p.lon, y: p.lat }
    }
}

/// Reported bounding box of a way or relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub minlon: f64,
    pub minlat: f64,
    pub maxlon: f64,
    pub maxlat: f64,
}

impl Bounds {
    /// Midpoint of the reported bounds. An intentional approximation of the
    /// feature's representative point, not a true centroid.
    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: (self.minlon + self.maxlon) / 2.0,
            y: (self.minlat + self.maxlat) / 2.0,
        }
    }
}

/// One raw feature as returned by the query service. Unknown fields are
/// ignored; absent collections deserialize as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeature {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub geometry: Vec<GeomPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
}

impl RawFeature {
    /// Trimmed tag value, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// Representative coordinate: a node's own position, otherwise the
    /// midpoint of the reported bounds.
    pub fn center(&self) -> Option<Coord<f64>> {
        match self.kind {
            FeatureKind::Node => match (self.lon, self.lat) {
                (Some(lon), Some(lat)) => Some(Coord { x: lon, y: lat }),
                _ => None,
            },
            FeatureKind::Way | FeatureKind::Relation => self.bounds.map(|b| b.center()),
        }
    }

    /// The feature's outline as a closed ring, or `None` for degenerate
    /// geometries with fewer than 3 vertices.
    pub fn closed_ring(&self) -> Option<Vec<Coord<f64>>> {
        if self.geometry.len() < 3 {
            return None;
        }
        let mut ring: Vec<Coord<f64>> = self.geometry.iter().copied().map(Into::into).collect();
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        Some(ring)
    }
}

/// The interpreter's response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub elements: Vec<RawFeature>,
}
