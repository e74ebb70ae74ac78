//! Bounded Dijkstra over the road network, labelling every node it reaches.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use geo::Coord;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::engine::{
    Bucket, Limit, NodeId, Predecessor, ReachabilityLabel, ReachabilitySearch, ResolvedLocation,
    SearchHandle,
};
use crate::graph::RoadNetwork;
use crate::weighting::Weighting;

/// Search cost ordered with `total_cmp`, so it can sit in a `BinaryHeap`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Best known way to reach a node that is not settled yet.
#[derive(Debug, Clone, Copy)]
struct Tentative {
    weight: f64,
    time_ms: u64,
    distance_m: f64,
    predecessor: Option<Predecessor>,
}

/// One isochrone search. Runs on the first call to an accessor and keeps its labels.
pub struct IsochroneSearch<'a> {
    network: &'a RoadNetwork,
    weighting: Weighting,
    reverse_flow: bool,
    limit: Limit,
    searched_from: Option<NodeIndex>,
    labels: Vec<ReachabilityLabel>,
    visited_nodes: usize,
}

impl<'a> IsochroneSearch<'a> {
    pub fn new(
        network: &'a RoadNetwork,
        weighting: Weighting,
        reverse_flow: bool,
        limit: Limit,
    ) -> Self {
        IsochroneSearch {
            network,
            weighting,
            reverse_flow,
            limit,
            searched_from: None,
            labels: Vec::new(),
            visited_nodes: 0,
        }
    }

    fn ensure_searched(&mut self, from: NodeId) {
        let from = NodeIndex::new(from);
        if self.searched_from == Some(from) {
            return;
        }
        self.search(from);
        self.searched_from = Some(from);
    }

    fn search(&mut self, from: NodeIndex) {
        let graph = self.network.graph();
        let direction = if self.reverse_flow {
            Direction::Incoming
        } else {
            Direction::Outgoing
        };
        let bound = self.limit.bound();

        let mut labels = Vec::new();
        let mut visited_nodes = 0;
        let mut settled: HashSet<NodeIndex> = HashSet::new();
        let mut tentative: HashMap<NodeIndex, Tentative> = HashMap::new();
        // Min-heap of (cost, node); ties settle the lower node index first.
        let mut heap: BinaryHeap<Reverse<(Cost, NodeIndex)>> = BinaryHeap::new();

        if graph.node_weight(from).is_some() {
            tentative.insert(
                from,
                Tentative {
                    weight: 0.0,
                    time_ms: 0,
                    distance_m: 0.0,
                    predecessor: None,
                },
            );
            heap.push(Reverse((Cost(0.0), from)));
        }

        while let Some(Reverse((_, node))) = heap.pop() {
            if !settled.insert(node) {
                continue;
            }
            let Some(entry) = tentative.get(&node).copied() else {
                continue;
            };
            labels.push(ReachabilityLabel {
                node_id: node.index(),
                coordinate: self.network.node_coord(node),
                time_ms: entry.time_ms,
                distance_m: entry.distance_m,
                predecessor: entry.predecessor,
            });

            // Labels past the bound stay in the result as frontier but are not expanded.
            if self.limit.measure_raw(entry.time_ms, entry.distance_m) > bound {
                continue;
            }
            visited_nodes += 1;

            for edge in graph.edges_directed(node, direction) {
                let road = edge.weight();
                let Some(cost) = self.weighting.edge_weight(road) else {
                    continue;
                };
                let next = if self.reverse_flow {
                    edge.source()
                } else {
                    edge.target()
                };
                if settled.contains(&next) {
                    continue;
                }
                let weight = entry.weight + cost;
                if tentative.get(&next).is_some_and(|known| known.weight <= weight) {
                    continue;
                }
                tentative.insert(
                    next,
                    Tentative {
                        weight,
                        time_ms: entry.time_ms + self.weighting.edge_time_ms(road),
                        distance_m: entry.distance_m + road.length_m,
                        predecessor: Some(Predecessor {
                            node_id: node.index(),
                            coordinate: self.network.node_coord(node),
                            edge_id: road.segment_id,
                        }),
                    },
                );
                heap.push(Reverse((Cost(weight), next)));
            }
        }

        tracing::debug!(
            from = from.index(),
            labels = labels.len(),
            visited_nodes,
            reverse_flow = self.reverse_flow,
            "isochrone search finished"
        );
        self.labels = labels;
        self.visited_nodes = visited_nodes;
    }
}

impl SearchHandle for IsochroneSearch<'_> {
    fn labeled_reachability(&mut self, node: NodeId) -> Vec<ReachabilityLabel> {
        self.ensure_searched(node);
        self.labels.clone()
    }

    fn bucketed_gps(&mut self, node: NodeId, bucket_count: usize) -> Vec<Bucket> {
        self.ensure_searched(node);

        let bucket_size = self.limit.bound() / bucket_count.max(1) as f64;
        let mut buckets: Vec<Bucket> = vec![Vec::new(); bucket_count + 1];
        let mut push = |value: f64, coord: Coord<f64>| {
            let index = if bucket_size > 0.0 {
                (value / bucket_size).floor() as usize
            } else if value <= 0.0 {
                0
            } else {
                return;
            };
            if let Some(bucket) = buckets.get_mut(index) {
                bucket.push(coord);
            }
        };

        let measured: HashMap<NodeId, f64> = self
            .labels
            .iter()
            .map(|label| (label.node_id, self.limit.measure(label)))
            .collect();

        for label in &self.labels {
            let value = self.limit.measure(label);
            push(value, label.coordinate);

            // The middle of the road towards the predecessor adds detail on long edges.
            if let Some(prev) = &label.predecessor {
                if let Some(prev_value) = measured.get(&prev.node_id) {
                    let middle = Coord {
                        x: (prev.coordinate.x + label.coordinate.x) / 2.0,
                        y: (prev.coordinate.y + label.coordinate.y) / 2.0,
                    };
                    push((prev_value + value) / 2.0, middle);
                }
            }
        }

        buckets
    }

    fn visited_node_count(&self) -> usize {
        self.visited_nodes
    }
}

impl ReachabilitySearch for RoadNetwork {
    type Handle<'a> = IsochroneSearch<'a>;

    fn run<'a>(
        &'a self,
        location: &ResolvedLocation,
        weighting: Weighting,
        reverse_flow: bool,
        limit: Limit,
    ) -> IsochroneSearch<'a> {
        tracing::trace!(node = location.closest_node, ?limit, reverse_flow, "starting search");
        IsochroneSearch::new(self, weighting, reverse_flow, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::VehicleProfile;
    use crate::weighting::WeightingKind;

    // A straight residential street heading north, one node every 0.001 degrees (~111 m).
    fn street(nodes: usize, oneway: bool) -> RoadNetwork {
        let mut xml = String::from("<osm>");
        for i in 0..nodes {
            xml.push_str(&format!(
                r#"<node id="{}" lat="{:.4}" lon="11.5"/>"#,
                i + 1,
                48.1 + 0.001 * i as f64
            ));
        }
        xml.push_str(r#"<way id="1">"#);
        for i in 0..nodes {
            xml.push_str(&format!(r#"<nd ref="{}"/>"#, i + 1));
        }
        xml.push_str(r#"<tag k="highway" v="residential"/>"#);
        if oneway {
            xml.push_str(r#"<tag k="oneway" v="yes"/>"#);
        }
        xml.push_str("</way></osm>");
        RoadNetwork::from_osm_xml(&xml, &VehicleProfile::ALL, 1_000.0).unwrap()
    }

    fn car() -> Weighting {
        Weighting::new(VehicleProfile::Car, WeightingKind::Fastest)
    }

    #[test]
    fn heap_pops_cheapest_then_lowest_node() {
        let mut heap: BinaryHeap<Reverse<(Cost, NodeIndex)>> = BinaryHeap::new();
        for (cost, node) in [(8.5, 1), (0.25, 7), (8.5, 0), (f64::INFINITY, 2)] {
            heap.push(Reverse((Cost(cost), NodeIndex::new(node))));
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse((_, node))| node.index())
            .collect();
        assert_eq!(order, vec![7, 0, 1, 2]);
    }

    #[test]
    fn labels_follow_settlement_order_and_keep_the_frontier() {
        let network = street(6, false);
        let mut search = IsochroneSearch::new(&network, car(), false, Limit::Time { seconds: 20 });
        let labels = search.labeled_reachability(0);

        let nodes: Vec<_> = labels.iter().map(|l| l.node_id).collect();
        assert_eq!(nodes, vec![0, 1, 2, 3]);
        assert_eq!(search.visited_node_count(), 3);

        assert!(labels[0].predecessor.is_none());
        assert_eq!(labels[0].time_ms, 0);
        let third = labels[3].predecessor.unwrap();
        assert_eq!(third.node_id, 2);
        assert!(labels[3].time_ms > 20_000);
        assert!((labels[2].distance_m - 222.4).abs() < 0.5);
    }

    #[test]
    fn distance_limit_bounds_by_meters() {
        let network = street(6, false);
        let mut search =
            IsochroneSearch::new(&network, car(), false, Limit::Distance { meters: 150.0 });
        let labels = search.labeled_reachability(0);
        assert_eq!(labels.len(), 3);
        assert_eq!(search.visited_node_count(), 2);
    }

    #[test]
    fn buckets_split_by_budget_with_sentinel() {
        let network = street(6, false);
        let mut search = IsochroneSearch::new(&network, car(), false, Limit::Time { seconds: 20 });
        let buckets = search.bucketed_gps(0, 2);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].len(), 3);
        assert_eq!(buckets[1].len(), 2);
        assert_eq!(buckets[2].len(), 2);
    }

    #[test]
    fn oneway_is_respected_forward_and_reversed_by_flow() {
        let network = street(4, true);
        let limit = Limit::Time { seconds: 600 };

        let mut forward = IsochroneSearch::new(&network, car(), false, limit);
        assert_eq!(forward.labeled_reachability(3).len(), 1);

        let mut reverse = IsochroneSearch::new(&network, car(), true, limit);
        let nodes: Vec<_> = reverse
            .labeled_reachability(3)
            .iter()
            .map(|l| l.node_id)
            .collect();
        assert_eq!(nodes, vec![3, 2, 1, 0]);
    }

    #[test]
    fn foot_ignores_oneway() {
        let network = street(4, true);
        let foot = Weighting::new(VehicleProfile::Foot, WeightingKind::Fastest);
        let mut search = IsochroneSearch::new(&network, foot, false, Limit::Time { seconds: 600 });
        assert_eq!(search.labeled_reachability(3).len(), 4);
    }

    #[test]
    fn search_runs_once_per_origin() {
        let network = street(6, false);
        let mut search = IsochroneSearch::new(&network, car(), false, Limit::Time { seconds: 20 });
        let first = search.labeled_reachability(0);
        let buckets = search.bucketed_gps(0, 1);
        assert_eq!(search.labeled_reachability(0), first);
        assert_eq!(buckets.iter().map(Vec::len).sum::<usize>(), 7);
    }
}
