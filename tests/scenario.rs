// End-to-end transform over a miniature region: one residential and one
// retail footprint sharing a single neighborhood.

use demandmap::overpass::{FeatureKind, GeomPoint, RawFeature};
use demandmap::{PerfConfig, Region, build_index, demand, neighborhoods};

const LAT: f64 = 52.5;
const LON: f64 = 13.4;

fn perf() -> PerfConfig {
    PerfConfig { worker_threads: 1, ..PerfConfig::default() }
}

fn region() -> Region {
    Region {
        code: "TST".into(),
        name: "Testville".into(),
        bbox: [LON - 0.05, LAT - 0.05, LON + 0.05, LAT + 0.05],
        population: 1000,
    }
}

/// A roughly square footprint of `area_m2` square meters centered near the
/// shared centroid.
fn footprint(id: u64, area_m2: f64, offset_lon: f64, tags: &[(&str, &str)]) -> RawFeature {
    let side_m = area_m2.sqrt();
    let side_lat = side_m / 111_320.0;
    let side_lon = side_m / (111_320.0 * LAT.to_radians().cos());
    let (lon, lat) = (LON + offset_lon, LAT);
    RawFeature {
        id,
        kind: FeatureKind::Way,
        tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        geometry: vec![
            GeomPoint { lon, lat },
            GeomPoint { lon: lon + side_lon, lat },
            GeomPoint { lon: lon + side_lon, lat: lat + side_lat },
            GeomPoint { lon, lat: lat + side_lat },
            GeomPoint { lon, lat },
        ],
        bounds: None,
        lon: None,
        lat: None,
    }
}

fn fixtures() -> (Vec<RawFeature>, Vec<RawFeature>) {
    let buildings = vec![
        footprint(100, 1000.0, 0.0, &[("building", "residential")]),
        footprint(101, 500.0, 0.001, &[("building", "retail")]),
    ];
    let places = vec![RawFeature {
        id: 500,
        kind: FeatureKind::Node,
        tags: [
            ("place".to_string(), "suburb".to_string()),
            ("name".to_string(), "Center".to_string()),
        ]
        .into_iter()
        .collect(),
        geometry: vec![],
        bounds: None,
        lon: Some(LON + 0.0005),
        lat: Some(LAT + 0.0002),
    }];
    (buildings, places)
}

#[test]
fn index_counts_both_footprints() {
    let (buildings, _) = fixtures();
    let index = build_index(&buildings, &perf(), 0).unwrap();

    assert_eq!(index.stats.count, 2);
    assert_eq!(index.stats.max_depth, 1);
    assert_eq!(index.buildings.len(), 2);

    // Every cell member is a valid position into the building list.
    for cell in &index.cells {
        assert!(cell.len() >= 3);
        for position in &cell[2..] {
            assert!((*position as usize) < index.buildings.len());
        }
    }
}

#[test]
fn single_neighborhood_attracts_both_uses() {
    let (buildings, places) = fixtures();
    let mut counter = 0;
    let out = neighborhoods::assign(&region(), &buildings, &places, &mut counter, 0);

    assert_eq!(out.metas.len(), 1);
    let meta = &out.metas[0];
    assert!(meta.total_population > 0, "residential footprint must yield residents");
    assert!(meta.total_jobs > 0, "retail footprint must yield jobs");

    // Assigned totals account for the whole accepted population.
    assert_eq!(out.total_population, meta.total_population);
    assert_eq!(out.unassigned_population, 0);
    assert_eq!(meta.percent_of_total_population, 1.0);
    assert_eq!(meta.percent_of_total_jobs, 1.0);

    let point = &out.finals[&500];
    assert_eq!(point.id, "500");
    assert_eq!(point.residents, meta.total_population);
    assert_eq!(point.jobs, meta.total_jobs);
}

#[test]
fn lone_neighborhood_produces_no_connections() {
    let (buildings, places) = fixtures();
    let mut counter = 0;
    let out = neighborhoods::assign(&region(), &buildings, &places, &mut counter, 0);

    let mut finals = out.finals;
    let connections =
        demand::synthesize(&out.metas, &out.centers, &mut finals, &perf(), 0).unwrap();

    // A single neighborhood cannot commute to itself.
    assert!(connections.is_empty());
    assert!(finals[&500].pop_ids.is_empty());
}

#[test]
fn residential_population_matches_formula_floor() {
    let (buildings, places) = fixtures();
    let mut counter = 0;
    let out = neighborhoods::assign(&region(), &buildings, &places, &mut counter, 0);

    // ~1000 m2 at one level: floor(1000 * 10.7639 / 600) = 17, give or take
    // the planar-area approximation.
    let residents = out.metas[0].total_population;
    assert!((16..=18).contains(&residents), "got {residents}");

    // ~500 m2 of retail: floor(500 * 10.7639 / 300) = 17.
    let jobs = out.metas[0].total_jobs;
    assert!((16..=18).contains(&jobs), "got {jobs}");
}
