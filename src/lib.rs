//! Isochrone queries over an OpenStreetMap road network.
//!
//! [`isochrone::process`] validates a raw query, runs a bounded reachability
//! search and shapes the answer either as nested polygons or as a point list.
//! The road network, search and isoline extraction sit behind the traits in
//! [`engine`]; [`graph::RoadNetwork`] and [`isoline::HullIsolineBuilder`] are
//! the implementations served by the `osm-isochrone` binary.

pub mod api;
pub mod cache;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod isochrone;
pub mod isoline;
pub mod profile;
pub mod query;
pub mod response;
pub mod search;
pub mod spatial_index;
pub mod utils;
pub mod weighting;

#[cfg(feature = "python")]
mod python;

pub use error::{GraphError, IsochroneError};
pub use graph::RoadNetwork;
pub use isochrone::{process, IsochroneOutcome, Payload};
pub use query::{Query, RawQuery, ResultMode};
pub use response::IsochroneResponse;
