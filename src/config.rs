use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::engine::Hints;
use crate::error::GraphError;
use crate::graph::RoadNetwork;
use crate::isoline::{HullIsolineBuilder, HullType};
use crate::profile::VehicleProfile;
use crate::query::RawQuery;

pub const DEFAULT_MAX_VISITED_NODES: usize = 1_000_000;
pub const DEFAULT_MAX_SNAP_DISTANCE_M: f64 = 1_000.0;

pub fn default_copyrights() -> Vec<String> {
    vec![
        "osm_isochrone".to_string(),
        "OpenStreetMap contributors".to_string(),
    ]
}

#[derive(Parser, Debug)]
#[command(name = "osm-isochrone", version, about = "Isochrones over an OpenStreetMap road network")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "OSM_ISOCHRONE_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve GET /isochrone over HTTP
    Serve(ServeArgs),
    /// Answer a single query and print the JSON response
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// OSM XML file holding the road network
    #[arg(long, env = "OSM_ISOCHRONE_OSM")]
    pub osm: PathBuf,

    #[arg(
        long,
        env = "OSM_ISOCHRONE_PROFILES",
        value_delimiter = ',',
        default_value = "car,bike,foot"
    )]
    pub profiles: Vec<VehicleProfile>,

    /// Query points farther than this from any usable road are rejected (meters)
    #[arg(long, env = "OSM_ISOCHRONE_MAX_SNAP_DISTANCE", default_value_t = DEFAULT_MAX_SNAP_DISTANCE_M)]
    pub max_snap_distance: f64,

    /// Polygon searches expanding more than a fifth of this many nodes are refused
    #[arg(long, env = "OSM_ISOCHRONE_MAX_VISITED_NODES", default_value_t = DEFAULT_MAX_VISITED_NODES)]
    pub max_visited_nodes: usize,

    #[arg(long, env = "OSM_ISOCHRONE_HULL", value_enum, default_value_t = HullType::Convex)]
    pub hull: HullType,

    /// Attribution reported in every response (repeatable or comma separated)
    #[arg(
        long = "copyright",
        env = "OSM_ISOCHRONE_COPYRIGHT",
        value_delimiter = ',',
        default_values_t = default_copyrights()
    )]
    pub copyrights: Vec<String>,
}

impl NetworkArgs {
    pub fn load_network(&self) -> Result<RoadNetwork, GraphError> {
        RoadNetwork::from_osm_file(&self.osm, &self.profiles, self.max_snap_distance)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_visited_nodes: self.max_visited_nodes,
            copyrights: self.copyrights.clone(),
            hull: self.hull,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[arg(long, env = "OSM_ISOCHRONE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "OSM_ISOCHRONE_PORT", default_value_t = 8989)]
    pub port: u16,
}

impl ServeArgs {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Query parameters are kept as text so they pass the same validation as HTTP requests.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    /// "lat,lon"
    #[arg(long)]
    pub point: String,

    #[arg(long)]
    pub vehicle: Option<String>,

    #[arg(long)]
    pub buckets: Option<String>,

    #[arg(long)]
    pub result: Option<String>,

    #[arg(long)]
    pub reverse_flow: Option<String>,

    #[arg(long)]
    pub time_limit: Option<String>,

    #[arg(long)]
    pub distance_limit: Option<String>,

    #[arg(long)]
    pub pointlist_ext_header: Option<String>,

    /// fastest or shortest
    #[arg(long)]
    pub weighting: Option<String>,

    #[arg(long)]
    pub pretty: bool,
}

impl QueryArgs {
    pub fn raw_query(&self) -> RawQuery {
        RawQuery {
            vehicle: self.vehicle.clone(),
            buckets: self.buckets.clone(),
            reverse_flow: self.reverse_flow.clone(),
            point: Some(self.point.clone()),
            result: self.result.clone(),
            pointlist_ext_header: self.pointlist_ext_header.clone(),
            time_limit: self.time_limit.clone(),
            distance_limit: self.distance_limit.clone(),
        }
    }

    pub fn hints(&self) -> Hints {
        let mut pairs = Vec::new();
        if let Some(weighting) = &self.weighting {
            pairs.push(("weighting".to_string(), weighting.clone()));
        }
        Hints::from_pairs(pairs)
    }
}

/// Settings fixed at startup and shared read-only by every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub max_visited_nodes: usize,
    pub copyrights: Vec<String>,
    pub hull: HullType,
}

impl ServiceConfig {
    pub fn isoline_builder(&self) -> HullIsolineBuilder {
        HullIsolineBuilder::new(self.hull)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            max_visited_nodes: DEFAULT_MAX_VISITED_NODES,
            copyrights: default_copyrights(),
            hull: HullType::default(),
        }
    }
}
