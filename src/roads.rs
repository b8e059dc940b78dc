//! Reshaping of raw highway features for the sink: coarse road classes and a
//! resolved display name, as a GeoJSON FeatureCollection.

use serde::Serialize;

use crate::overpass::RawFeature;

#[derive(Debug, Clone, Serialize)]
pub struct RoadCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<RoadFeature>,
}

impl RoadCollection {
    pub fn new(features: Vec<RoadFeature>) -> Self {
        Self { kind: "FeatureCollection", features }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoadFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub properties: RoadProperties,
    pub geometry: LineStringGeometry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadProperties {
    pub road_class: &'static str,
    pub structure: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineStringGeometry {
    pub coordinates: Vec<[f64; 2]>,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Coarse class for a `highway` tag value; `None` drops the feature.
fn road_class(highway: &str) -> Option<&'static str> {
    match highway {
        "motorway" => Some("highway"),
        "trunk" | "primary" => Some("major"),
        "secondary" | "tertiary" | "residential" => Some("minor"),
        _ => None,
    }
}

/// Display name: locale-preferred name, then generic name, then reference
/// tag, then empty. An explicit `noname=yes` always yields empty.
fn street_name(feature: &RawFeature, locale: &str) -> String {
    if feature.tag("noname") == Some("yes") {
        return String::new();
    }
    feature
        .tag(&format!("name:{locale}"))
        .or_else(|| feature.tag("name"))
        .or_else(|| feature.tag("ref"))
        .unwrap_or("")
        .to_string()
}

/// Reshape raw highway features into the sink's road collection.
pub fn process(features: &[RawFeature], locale: &str) -> RoadCollection {
    let reshaped = features
        .iter()
        .filter_map(|feature| {
            let class = road_class(feature.tag("highway")?)?;
            Some(RoadFeature {
                kind: "Feature",
                properties: RoadProperties {
                    road_class: class,
                    structure: "normal",
                    name: street_name(feature, locale),
                },
                geometry: LineStringGeometry {
                    coordinates: feature.geometry.iter().map(|p| [p.lon, p.lat]).collect(),
                    kind: "LineString",
                },
            })
        })
        .collect();
    RoadCollection::new(reshaped)
}
