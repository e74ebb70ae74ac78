//! Contracts between the isochrone core and the services it drives.
//!
//! The core never touches a road graph directly. It resolves profiles, snaps
//! points, builds weightings, runs searches and extracts isolines through the
//! traits below, so a real network and a test fake are interchangeable.

use geo::{Coord, LineString};

use crate::error::IsochroneError;

pub type NodeId = usize;
pub type EdgeId = usize;

/// Reachable points collected for one budget threshold.
pub type Bucket = Vec<Coord<f64>>;

/// A WGS84 position as given by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

/// The single active bound of a search. Distance wins when both are supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Time { seconds: u64 },
    Distance { meters: f64 },
}

impl Limit {
    pub fn from_params(time_limit_seconds: u64, distance_limit_meters: f64) -> Self {
        if distance_limit_meters > 0.0 {
            Limit::Distance {
                meters: distance_limit_meters,
            }
        } else {
            Limit::Time {
                seconds: time_limit_seconds,
            }
        }
    }

    /// The bound in its own unit: seconds or meters.
    pub fn bound(&self) -> f64 {
        match *self {
            Limit::Time { seconds } => seconds as f64,
            Limit::Distance { meters } => meters,
        }
    }

    /// Where a label sits relative to this bound, in the bound's unit.
    pub fn measure(&self, label: &ReachabilityLabel) -> f64 {
        self.measure_raw(label.time_ms, label.distance_m)
    }

    pub fn measure_raw(&self, time_ms: u64, distance_m: f64) -> f64 {
        match self {
            Limit::Time { .. } => time_ms as f64 / 1000.0,
            Limit::Distance { .. } => distance_m,
        }
    }
}

/// Routing hints taken verbatim from the request's query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hints {
    pairs: Vec<(String, String)>,
}

impl Hints {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Hints { pairs }
    }

    /// First value supplied for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The query point snapped onto the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    pub closest_node: NodeId,
    pub snapped: Coord<f64>,
    pub query_distance_m: f64,
}

/// How a label was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predecessor {
    pub node_id: NodeId,
    pub coordinate: Coord<f64>,
    pub edge_id: EdgeId,
}

/// One visited node as emitted by a search. `predecessor` is `None` only for the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachabilityLabel {
    pub node_id: NodeId,
    pub coordinate: Coord<f64>,
    pub time_ms: u64,
    pub distance_m: f64,
    pub predecessor: Option<Predecessor>,
}

/// Vehicle profiles known to the service.
pub trait ProfileRegistry {
    type Profile;

    fn has_profile(&self, name: &str) -> bool;

    fn resolve_profile(&self, name: &str) -> Option<Self::Profile>;
}

/// Snaps coordinates onto the part of the graph a profile may use.
pub trait LocationIndex: ProfileRegistry {
    fn find_closest(&self, point: GeoPoint, profile: &Self::Profile) -> Option<ResolvedLocation>;
}

/// Builds the cost model a search runs with.
pub trait WeightingFactory: ProfileRegistry {
    type Weighting;

    fn build_weighting(
        &self,
        hints: &Hints,
        profile: &Self::Profile,
    ) -> Result<Self::Weighting, IsochroneError>;
}

/// Starts a bounded reachability search from a resolved location.
pub trait ReachabilitySearch: LocationIndex + WeightingFactory {
    type Handle<'a>: SearchHandle
    where
        Self: 'a;

    fn run<'a>(
        &'a self,
        location: &ResolvedLocation,
        weighting: Self::Weighting,
        reverse_flow: bool,
        limit: Limit,
    ) -> Self::Handle<'a>;
}

/// Results of one search. The search itself happens on the first accessor call.
pub trait SearchHandle {
    /// Every label of the search in settlement order, origin first.
    fn labeled_reachability(&mut self, node: NodeId) -> Vec<ReachabilityLabel>;

    /// `bucket_count + 1` point sets; the last one holds the frontier just past the bound.
    fn bucketed_gps(&mut self, node: NodeId, bucket_count: usize) -> Vec<Bucket>;

    fn visited_node_count(&self) -> usize;
}

/// Turns bucketed points into closed boundary rings, one per level.
pub trait IsolineExtractor {
    fn extract(&self, buckets: &[Bucket], levels: usize) -> Vec<LineString<f64>>;
}
