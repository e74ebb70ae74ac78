//! The road network backing the service: OSM XML parsed with quick-xml into a
//! directed petgraph graph, plus the nearest-node index used for snapping.

use geo::Coord;
use petgraph::graph::{DiGraph, NodeIndex};
use rstar::primitives::Line;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::engine::{GeoPoint, LocationIndex, ProfileRegistry, ResolvedLocation};
use crate::error::GraphError;
use crate::profile::{AccessMask, VehicleProfile};
use crate::spatial_index::{IndexedSegment, SpatialIndex};
use crate::utils::{calculate_distance, coord_distance, project_onto_segment};

const FALLBACK_SPEED_KPH: f64 = 50.0;
const MPH_TO_KPH: f64 = 1.60934;
// Slightly under one degree of latitude, so the planar search radius never falls short.
const METERS_PER_DEGREE: f64 = 111_000.0;

#[derive(Debug, Deserialize)]
pub struct XmlData {
    #[serde(rename = "node", default)]
    pub nodes: Vec<XmlNode>,
    #[serde(rename = "way", default)]
    pub ways: Vec<XmlWay>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct XmlNode {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "@lat")]
    pub lat: f64,
    #[serde(rename = "@lon")]
    pub lon: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct XmlWay {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "nd", default)]
    pub nodes: Vec<XmlNodeRef>,
    #[serde(rename = "tag", default)]
    pub tags: Vec<XmlTag>,
}

impl XmlWay {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct XmlNodeRef {
    #[serde(rename = "@ref")]
    pub node_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct XmlTag {
    #[serde(rename = "@k")]
    pub key: String,
    #[serde(rename = "@v")]
    pub value: String,
}

pub fn parse_xml(xml_data: &str) -> Result<XmlData, quick_xml::DeError> {
    quick_xml::de::from_str(xml_data)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadNode {
    pub osm_id: i64,
    pub lat: f64,
    pub lon: f64,
}

impl RoadNode {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// One direction of one way segment. Both directions share `segment_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadEdge {
    pub segment_id: usize,
    pub length_m: f64,
    pub road_speed_kph: f64,
    pub against_oneway: bool,
    pub access: AccessMask,
}

impl RoadEdge {
    pub fn traversable_by(&self, profile: VehicleProfile) -> bool {
        self.access.allows(profile) && !(self.against_oneway && profile.respects_oneway())
    }
}

pub type RoadGraph = DiGraph<RoadNode, RoadEdge>;

/// Read-only road network shared by every request.
pub struct RoadNetwork {
    graph: RoadGraph,
    index: SpatialIndex,
    profiles: Vec<VehicleProfile>,
    max_snap_distance_m: f64,
}

impl RoadNetwork {
    pub fn from_osm_file(
        path: impl AsRef<Path>,
        profiles: &[VehicleProfile],
        max_snap_distance_m: f64,
    ) -> Result<Self, GraphError> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_osm_xml(&xml, profiles, max_snap_distance_m)
    }

    pub fn from_osm_xml(
        xml: &str,
        profiles: &[VehicleProfile],
        max_snap_distance_m: f64,
    ) -> Result<Self, GraphError> {
        let parsed = parse_xml(xml)?;
        let graph = create_graph(parsed.nodes, parsed.ways);
        if graph.edge_count() == 0 {
            return Err(GraphError::Empty);
        }
        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "road network loaded"
        );
        Ok(Self::new(graph, profiles, max_snap_distance_m))
    }

    pub fn new(graph: RoadGraph, profiles: &[VehicleProfile], max_snap_distance_m: f64) -> Self {
        let mut indexed = HashSet::new();
        let segments = graph
            .raw_edges()
            .iter()
            .filter(|edge| indexed.insert(edge.weight.segment_id))
            .map(|edge| {
                let (source, target) = (edge.source(), edge.target());
                IndexedSegment {
                    line: Line::new(
                        [graph[source].lon, graph[source].lat],
                        [graph[target].lon, graph[target].lat],
                    ),
                    source,
                    target,
                    segment_id: edge.weight.segment_id,
                }
            })
            .collect::<Vec<_>>();
        let index = SpatialIndex::build(segments);
        tracing::debug!(segments = index.len(), "segment index built");
        let mut unique = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if !unique.contains(profile) {
                unique.push(*profile);
            }
        }
        RoadNetwork {
            graph,
            index,
            profiles: unique,
            max_snap_distance_m,
        }
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn profiles(&self) -> &[VehicleProfile] {
        &self.profiles
    }

    pub fn node_coord(&self, node: NodeIndex) -> Coord<f64> {
        self.graph[node].coord()
    }

    /// Whether `profile` may use the segment in at least one direction.
    fn is_traversable(&self, segment: &IndexedSegment, profile: VehicleProfile) -> bool {
        self.graph
            .edges_connecting(segment.source, segment.target)
            .chain(self.graph.edges_connecting(segment.target, segment.source))
            .any(|edge| {
                edge.weight().segment_id == segment.segment_id
                    && edge.weight().traversable_by(profile)
            })
    }
}

impl ProfileRegistry for RoadNetwork {
    type Profile = VehicleProfile;

    fn has_profile(&self, name: &str) -> bool {
        self.resolve_profile(name).is_some()
    }

    fn resolve_profile(&self, name: &str) -> Option<VehicleProfile> {
        name.parse::<VehicleProfile>()
            .ok()
            .filter(|profile| self.profiles.contains(profile))
    }
}

impl LocationIndex for RoadNetwork {
    /// Projects the point onto the nearest segment the profile may use and
    /// resolves to whichever end of that segment lies closer to the projection.
    fn find_closest(&self, point: GeoPoint, profile: &VehicleProfile) -> Option<ResolvedLocation> {
        // Longitude degrees shrink towards the poles; widen the planar radius to match.
        let lat_scale = point.lat.to_radians().cos().abs().max(0.01);
        let radius_deg = self.max_snap_distance_m / (METERS_PER_DEGREE * lat_scale);
        let query = Coord {
            x: point.lon,
            y: point.lat,
        };

        self.index
            .nearest_within(point.lon, point.lat, radius_deg)
            .filter(|segment| self.is_traversable(segment, *profile))
            .map(|segment| {
                let from = self.node_coord(segment.source);
                let to = self.node_coord(segment.target);
                let snapped = project_onto_segment(query, from, to);
                let closest = if coord_distance(snapped, from) <= coord_distance(snapped, to) {
                    segment.source
                } else {
                    segment.target
                };
                (closest, snapped, coord_distance(query, snapped))
            })
            .filter(|(_, _, distance)| *distance <= self.max_snap_distance_m)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(node, snapped, distance)| ResolvedLocation {
                closest_node: node.index(),
                snapped,
                query_distance_m: distance,
            })
    }
}

// Whether a way is one way, and whether its one-way direction runs against its node order
fn oneway_direction(way: &XmlWay) -> (bool, bool) {
    match way.tag("oneway") {
        Some("yes") | Some("true") | Some("1") => (true, false),
        Some("-1") | Some("reverse") => (true, true),
        Some(_) => (false, false),
        None => (way.tag("junction") == Some("roundabout"), false),
    }
}

fn access_mask(way: &XmlWay) -> AccessMask {
    let mut mask = AccessMask::default();
    for profile in VehicleProfile::ALL {
        if profile.admits(|key| way.tag(key)) {
            mask.allow(profile);
        }
    }
    mask
}

fn road_speed(way: &XmlWay) -> f64 {
    way.tag("maxspeed")
        .and_then(clean_maxspeed)
        .unwrap_or_else(|| way.tag("highway").map_or(FALLBACK_SPEED_KPH, highway_speed))
}

fn highway_speed(highway: &str) -> f64 {
    match highway {
        "motorway" => 110.0,
        "motorway_link" => 60.0,
        "trunk" => 90.0,
        "trunk_link" => 50.0,
        "primary" => 70.0,
        "secondary" => 60.0,
        "primary_link" | "secondary_link" => 40.0,
        "tertiary" | "unclassified" | "residential" => 50.0,
        "tertiary_link" => 30.0,
        "service" => 20.0,
        "living_street" | "track" => 10.0,
        _ => FALLBACK_SPEED_KPH,
    }
}

fn clean_maxspeed(maxspeed: &str) -> Option<f64> {
    let lower = maxspeed.to_lowercase();
    let numeric = lower.trim_end_matches("mph").trim_end_matches("km/h").trim();
    let speed = numeric.parse::<f64>().ok().filter(|s| *s > 0.0)?;
    if lower.contains("mph") {
        Some(speed * MPH_TO_KPH)
    } else {
        Some(speed)
    }
}

/// Builds the directed graph. Only nodes used by routable ways are kept, and
/// segments that reference a missing node are skipped.
pub fn create_graph(nodes: Vec<XmlNode>, ways: Vec<XmlWay>) -> RoadGraph {
    let mut graph = RoadGraph::new();
    let positions: HashMap<i64, XmlNode> = nodes.into_iter().map(|n| (n.id, n)).collect();
    let mut node_index_map: HashMap<i64, NodeIndex> = HashMap::new();
    let mut next_segment = 0usize;

    for way in ways {
        let access = access_mask(&way);
        if access.is_empty() {
            continue;
        }
        let (is_one_way, is_reversed) = oneway_direction(&way);
        let speed = road_speed(&way);

        for window in way.nodes.windows(2) {
            let [start_ref, end_ref] = window else {
                continue;
            };
            let (Some(start), Some(end)) = (
                positions.get(&start_ref.node_id),
                positions.get(&end_ref.node_id),
            ) else {
                tracing::debug!(way = way.id, "skipping segment with unknown node");
                continue;
            };

            let mut index_of = |node: &XmlNode| {
                *node_index_map.entry(node.id).or_insert_with(|| {
                    graph.add_node(RoadNode {
                        osm_id: node.id,
                        lat: node.lat,
                        lon: node.lon,
                    })
                })
            };
            let (start_index, end_index) = (index_of(start), index_of(end));

            let edge = RoadEdge {
                segment_id: next_segment,
                length_m: calculate_distance(start.lat, start.lon, end.lat, end.lon),
                road_speed_kph: speed,
                against_oneway: false,
                access,
            };
            next_segment += 1;

            graph.add_edge(
                start_index,
                end_index,
                RoadEdge {
                    against_oneway: is_one_way && is_reversed,
                    ..edge
                },
            );
            graph.add_edge(
                end_index,
                start_index,
                RoadEdge {
                    against_oneway: is_one_way && !is_reversed,
                    ..edge
                },
            );
        }
    }

    graph
}
