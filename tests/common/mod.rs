use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use serde_json::Value;
use tower::ServiceExt;

use osm_isochrone::api::{build_router, AppState};
use osm_isochrone::config::ServiceConfig;
use osm_isochrone::profile::VehicleProfile;
use osm_isochrone::RoadNetwork;

pub const GRID_SIZE: usize = 11;
pub const CENTER_LAT: f64 = 48.1;
pub const CENTER_LON: f64 = 11.5;
const SPACING_DEG: f64 = 0.001;

/// Residential streets on a square grid centred on (48.1, 11.5), one node every 0.001 degrees.
pub fn grid_xml() -> String {
    let half = (GRID_SIZE / 2) as f64;
    let id = |row: usize, col: usize| row * GRID_SIZE + col + 1;

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><osm version="0.6">"#);
    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            xml.push_str(&format!(
                r#"<node id="{}" lat="{:.6}" lon="{:.6}"/>"#,
                id(row, col),
                CENTER_LAT + (row as f64 - half) * SPACING_DEG,
                CENTER_LON + (col as f64 - half) * SPACING_DEG,
            ));
        }
    }

    let mut way_id = 1;
    let mut push_way = |refs: Vec<usize>| {
        xml.push_str(&format!(r#"<way id="{way_id}">"#));
        for node in refs {
            xml.push_str(&format!(r#"<nd ref="{node}"/>"#));
        }
        xml.push_str(r#"<tag k="highway" v="residential"/></way>"#);
        way_id += 1;
    };
    for row in 0..GRID_SIZE {
        push_way((0..GRID_SIZE).map(|col| id(row, col)).collect());
    }
    for col in 0..GRID_SIZE {
        push_way((0..GRID_SIZE).map(|row| id(row, col)).collect());
    }

    xml.push_str("</osm>");
    xml
}

/// A single northbound one-way street of `nodes` nodes along longitude 11.5.
pub fn one_way_street_xml(nodes: usize) -> String {
    let mut xml = String::from("<osm>");
    for i in 0..nodes {
        xml.push_str(&format!(
            r#"<node id="{}" lat="{:.6}" lon="11.500000"/>"#,
            i + 1,
            CENTER_LAT + i as f64 * SPACING_DEG
        ));
    }
    xml.push_str(r#"<way id="1">"#);
    for i in 0..nodes {
        xml.push_str(&format!(r#"<nd ref="{}"/>"#, i + 1));
    }
    xml.push_str(r#"<tag k="highway" v="residential"/><tag k="oneway" v="yes"/></way></osm>"#);
    xml
}

pub fn grid_network() -> RoadNetwork {
    network_from(&grid_xml())
}

pub fn network_from(xml: &str) -> RoadNetwork {
    RoadNetwork::from_osm_xml(xml, &VehicleProfile::ALL, 1_000.0).unwrap()
}

pub fn app_with(network: RoadNetwork) -> axum::Router {
    let state = AppState::new(network, ServiceConfig::default());
    build_router(Arc::new(state))
}

pub async fn get(uri: &str) -> Response<Body> {
    get_from(app_with(grid_network()), uri).await
}

pub async fn get_from(app: axum::Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
