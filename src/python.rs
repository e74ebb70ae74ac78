use std::time::Instant;

use clap::ValueEnum;
use lazy_static::lazy_static;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::cache::NetworkCache;
use crate::config::{default_copyrights, DEFAULT_MAX_SNAP_DISTANCE_M, DEFAULT_MAX_VISITED_NODES};
use crate::engine::Hints;
use crate::graph::RoadNetwork;
use crate::isochrone;
use crate::isoline::{HullIsolineBuilder, HullType};
use crate::profile::VehicleProfile;
use crate::query::RawQuery;
use crate::response::IsochroneResponse;

const NETWORK_CACHE_SIZE: usize = 8;

lazy_static! {
    static ref NETWORK_CACHE: NetworkCache = NetworkCache::new(NETWORK_CACHE_SIZE);
}

/// Calculates an isochrone around (lat, lon) and returns the JSON response
#[pyfunction]
#[pyo3(signature = (
    osm_path,
    lat,
    lon,
    buckets = 1,
    time_limit = 600,
    distance_limit = -1.0,
    vehicle = "car",
    result = "polygon",
    reverse_flow = false,
    pointlist_ext_header = None,
    hull_type = "convex"
))]
#[allow(clippy::too_many_arguments)]
fn calc_isochrones(
    osm_path: &str,
    lat: f64,
    lon: f64,
    buckets: i64,
    time_limit: i64,
    distance_limit: f64,
    vehicle: &str,
    result: &str,
    reverse_flow: bool,
    pointlist_ext_header: Option<String>,
    hull_type: &str,
) -> PyResult<String> {
    let hull = HullType::from_str(hull_type, true)
        .map_err(|_| PyValueError::new_err(format!("Invalid hull type: {hull_type}")))?;
    let network = NETWORK_CACHE
        .get_or_load(osm_path, || {
            RoadNetwork::from_osm_file(osm_path, &VehicleProfile::ALL, DEFAULT_MAX_SNAP_DISTANCE_M)
        })
        .map_err(|err| PyValueError::new_err(err.to_string()))?;

    let raw = RawQuery {
        vehicle: Some(vehicle.to_string()),
        buckets: Some(buckets.to_string()),
        reverse_flow: Some(reverse_flow.to_string()),
        point: Some(format!("{lat},{lon}")),
        result: Some(result.to_string()),
        pointlist_ext_header,
        time_limit: Some(time_limit.to_string()),
        distance_limit: Some(distance_limit.to_string()),
    };

    let started = Instant::now();
    let (_, outcome) = isochrone::process(
        &raw,
        &Hints::default(),
        network.as_ref(),
        &HullIsolineBuilder::new(hull),
        DEFAULT_MAX_VISITED_NODES,
    )
    .map_err(|err| PyValueError::new_err(err.to_string()))?;

    let response = IsochroneResponse::new(outcome.payload, &default_copyrights(), started.elapsed());
    serde_json::to_string(&response).map_err(|err| PyRuntimeError::new_err(err.to_string()))
}

/// Python module for isochrones over OpenStreetMap road networks
#[pymodule]
fn osm_isochrone(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(calc_isochrones, m)?)?;
    Ok(())
}
