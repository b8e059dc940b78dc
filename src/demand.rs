//! Gravity-model commute-flow synthesis between neighborhoods.
//!
//! Flow between an origin and a destination grows with origin residents and
//! destination jobs and decays with the square of the inter-center distance.
//! The exact constants are policy; the monotonicity is the contract.

use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{Context, Result};
use geo::Coord;
use rayon::prelude::*;
use serde::Serialize;

use crate::common::geom::haversine_m;
use crate::config::PerfConfig;
use crate::neighborhoods::{NeighborhoodMeta, NeighborhoodPoint};
use crate::workers;

/// Gravity coefficient applied to the residents x jobs product.
pub(crate) const GRAVITY_SCALE: f64 = 0.01;

/// Distance floor in kilometers, so adjacent centers don't blow up the model.
pub(crate) const MIN_DISTANCE_KM: f64 = 0.5;

/// One surviving commute flow between a residence- and a job-neighborhood.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandConnection {
    /// Final id of the residence-side neighborhood.
    pub residence_id: String,
    /// Final id of the job-side neighborhood.
    pub job_id: String,
    pub size: u64,
    pub id: u32,
}

/// A flow candidate still keyed by raw feature ids.
struct RawConnection {
    residence: u64,
    job: u64,
    size: u64,
}

/// Summary block of the demand dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandStats {
    pub total_population: u64,
    pub total_jobs: u64,
    pub neighborhoods: usize,
    pub connections: usize,
    pub avg_connection_size: u64,
    pub total_movement: u64,
}

/// The per-region demand dataset handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct DemandData {
    pub points: Vec<NeighborhoodPoint>,
    pub pops: Vec<DemandConnection>,
    pub stats: DemandStats,
}

/// Integer gravity flow for one origin/destination pair.
pub(crate) fn gravity_flow(residents: u64, jobs: u64, distance_m: f64) -> u64 {
    let d_km = (distance_m / 1000.0).max(MIN_DISTANCE_KM);
    (GRAVITY_SCALE * residents as f64 * jobs as f64 / (d_km * d_km)).floor() as u64
}

/// Compute all pairwise flows, prune zero-size ones, assign dense ids, and
/// rewrite endpoints to the final neighborhood ids.
///
/// Unlike the fetch layer, a single worker failure here is fatal to the run:
/// a missing center is a structural defect, not environmental flakiness.
pub fn synthesize(
    metas: &[NeighborhoodMeta],
    centers: &AHashMap<u64, Coord<f64>>,
    finals: &mut BTreeMap<u64, NeighborhoodPoint>,
    perf: &PerfConfig,
    verbose: u8,
) -> Result<Vec<DemandConnection>> {
    // Origins are partitioned into batches across the pool; every worker sees
    // the full destination set and the shared center mapping, and owns
    // nothing mutable.
    let pool = workers::build_pool(perf.worker_threads)?;
    let batch = perf.batch_sizes.demand.max(1);
    let batches: Vec<Vec<RawConnection>> = pool.install(|| {
        metas
            .par_chunks(batch)
            .map(|origins| flows_for_origins(origins, metas, centers))
            .collect::<Result<Vec<_>>>()
    })?;
    drop(pool);

    // Prune and assign dense ids in iteration order, recording each survivor
    // against both endpoint neighborhoods.
    let mut connections = Vec::new();
    for raw in batches.into_iter().flatten() {
        if raw.size == 0 {
            continue;
        }
        let id = connections.len() as u32;

        let residence = finals
            .get_mut(&raw.residence)
            .with_context(|| format!("No neighborhood record for residence {}", raw.residence))?;
        residence.pop_ids.push(id);
        let residence_id = residence.id.clone();

        let job = finals
            .get_mut(&raw.job)
            .with_context(|| format!("No neighborhood record for job {}", raw.job))?;
        job.pop_ids.push(id);
        let job_id = job.id.clone();

        connections.push(DemandConnection { residence_id, job_id, size: raw.size, id });
    }

    if verbose > 0 {
        eprintln!("[demand] {} neighborhoods -> {} connections", metas.len(), connections.len());
    }
    Ok(connections)
}

/// Pure worker: flows from one origin batch to every destination.
fn flows_for_origins(
    origins: &[NeighborhoodMeta],
    destinations: &[NeighborhoodMeta],
    centers: &AHashMap<u64, Coord<f64>>,
) -> Result<Vec<RawConnection>> {
    let mut flows = Vec::new();
    for origin in origins {
        let from = *centers
            .get(&origin.raw_id)
            .with_context(|| format!("Missing center for neighborhood {}", origin.raw_id))?;
        for dest in destinations {
            if dest.raw_id == origin.raw_id {
                continue;
            }
            let to = *centers
                .get(&dest.raw_id)
                .with_context(|| format!("Missing center for neighborhood {}", dest.raw_id))?;
            flows.push(RawConnection {
                residence: origin.raw_id,
                job: dest.raw_id,
                size: gravity_flow(origin.total_population, dest.total_jobs, haversine_m(from, to)),
            });
        }
    }
    Ok(flows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(raw_id: u64, population: u64, jobs: u64) -> NeighborhoodMeta {
        NeighborhoodMeta {
            raw_id,
            name: None,
            total_population: population,
            total_jobs: jobs,
            percent_of_total_population: 0.0,
            percent_of_total_jobs: 0.0,
        }
    }

    fn point(id: &str, lon: f64, lat: f64) -> NeighborhoodPoint {
        NeighborhoodPoint {
            id: id.to_string(),
            location: [lon, lat],
            jobs: 0,
            residents: 0,
            pop_ids: Vec::new(),
        }
    }

    fn setup(
        metas: &[NeighborhoodMeta],
        coords: &[(u64, f64, f64)],
    ) -> (AHashMap<u64, Coord<f64>>, BTreeMap<u64, NeighborhoodPoint>) {
        let centers = coords
            .iter()
            .map(|(id, lon, lat)| (*id, Coord { x: *lon, y: *lat }))
            .collect();
        let finals = metas
            .iter()
            .map(|m| (m.raw_id, point(&m.raw_id.to_string(), 0.0, 0.0)))
            .collect();
        (centers, finals)
    }

    #[test]
    fn gravity_is_monotone() {
        let base = gravity_flow(1000, 1000, 2000.0);
        assert!(gravity_flow(2000, 1000, 2000.0) >= base);
        assert!(gravity_flow(1000, 2000, 2000.0) >= base);
        assert!(gravity_flow(1000, 1000, 4000.0) <= base);
        assert!(base > 0);
    }

    #[test]
    fn gravity_distance_floor_caps_nearby_flows() {
        // Below the floor, distance no longer changes the result.
        assert_eq!(gravity_flow(500, 500, 100.0), gravity_flow(500, 500, 400.0));
    }

    #[test]
    fn zero_mass_means_zero_flow() {
        assert_eq!(gravity_flow(0, 5000, 1000.0), 0);
        assert_eq!(gravity_flow(5000, 0, 1000.0), 0);
    }

    #[test]
    fn single_neighborhood_yields_no_connections() {
        let metas = vec![meta(1, 500, 300)];
        let (centers, mut finals) = setup(&metas, &[(1, 13.0, 52.0)]);

        let connections =
            synthesize(&metas, &centers, &mut finals, &PerfConfig::default(), 0).unwrap();
        assert!(connections.is_empty());
        assert!(finals[&1].pop_ids.is_empty());
    }

    #[test]
    fn connections_have_dense_ids_and_no_self_pairs() {
        let metas = vec![meta(1, 1000, 10), meta(2, 800, 500), meta(3, 0, 900)];
        let (centers, mut finals) =
            setup(&metas, &[(1, 13.0, 52.0), (2, 13.01, 52.0), (3, 13.02, 52.0)]);

        let connections =
            synthesize(&metas, &centers, &mut finals, &PerfConfig::default(), 0).unwrap();

        assert!(!connections.is_empty());
        for (i, c) in connections.iter().enumerate() {
            assert_eq!(c.id, i as u32, "ids must be dense from 0");
            assert!(c.size > 0, "zero-size connections must be pruned");
            assert_ne!(c.residence_id, c.job_id, "self-pairs are excluded");
        }
        // Neighborhood 3 has no residents: it can only appear on the job side.
        assert!(connections.iter().all(|c| c.residence_id != "3"));
        assert!(connections.iter().any(|c| c.job_id == "3"));
    }

    #[test]
    fn endpoints_are_rewritten_to_final_ids() {
        let metas = vec![meta(5, 1000, 0), meta(7, 0, 1000)];
        let centers: AHashMap<u64, Coord<f64>> = [
            (5, Coord { x: 13.0, y: 52.0 }),
            (7, Coord { x: 13.01, y: 52.0 }),
        ]
        .into_iter()
        .collect();
        let mut finals: BTreeMap<u64, NeighborhoodPoint> = [
            (5, point("5", 13.0, 52.0)),
            (7, point("AIR_Terminal_0", 13.01, 52.0)),
        ]
        .into_iter()
        .collect();

        let connections =
            synthesize(&metas, &centers, &mut finals, &PerfConfig::default(), 0).unwrap();

        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].residence_id, "5");
        assert_eq!(connections[0].job_id, "AIR_Terminal_0");
        assert_eq!(finals[&5].pop_ids, vec![0]);
        assert_eq!(finals[&7].pop_ids, vec![0]);
    }

    #[test]
    fn missing_center_is_fatal() {
        let metas = vec![meta(1, 1000, 10), meta(2, 800, 500)];
        let (centers, mut finals) = setup(&metas, &[(1, 13.0, 52.0)]); // 2 missing

        let err = synthesize(&metas, &centers, &mut finals, &PerfConfig::default(), 0);
        assert!(err.is_err());
    }
}
