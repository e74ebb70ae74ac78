//! Isochrone query orchestration: validate, search, partition into buckets and
//! shape the result as polygons or as a point list.

use geo::LineString;
use serde_json::Value;

use crate::columns::ColumnSet;
use crate::engine::{
    Bucket, Hints, IsolineExtractor, ReachabilitySearch, ResolvedLocation, SearchHandle,
};
use crate::error::IsochroneError;
use crate::query::{Query, RawQuery, ResultMode};

/// One boundary ring. `bucket` grows with distance from the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub bucket: usize,
    pub boundary: LineString<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointList {
    pub header: Vec<&'static str>,
    pub items: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Polygons(Vec<PolygonFeature>),
    PointList(PointList),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneOutcome {
    pub payload: Payload,
    pub visited_nodes: usize,
}

/// A finished (or pending) search anchored at the snapped query point.
pub struct Reachability<H> {
    pub origin: ResolvedLocation,
    handle: H,
}

impl<H: SearchHandle> Reachability<H> {
    pub fn visited_node_count(&self) -> usize {
        self.handle.visited_node_count()
    }
}

/// Validates `raw` and answers it. Nothing is searched when validation fails.
pub fn process<B, X>(
    raw: &RawQuery,
    hints: &Hints,
    network: &B,
    extractor: &X,
    max_visited_nodes: usize,
) -> Result<(Query, IsochroneOutcome), IsochroneError>
where
    B: ReachabilitySearch + ?Sized,
    X: IsolineExtractor + ?Sized,
{
    let query = Query::validate(raw, network)?;
    let outcome = calculate_isochrone(&query, hints, network, extractor, max_visited_nodes)?;
    Ok((query, outcome))
}

pub fn calculate_isochrone<B, X>(
    query: &Query,
    hints: &Hints,
    network: &B,
    extractor: &X,
    max_visited_nodes: usize,
) -> Result<IsochroneOutcome, IsochroneError>
where
    B: ReachabilitySearch + ?Sized,
    X: IsolineExtractor + ?Sized,
{
    let mut reachability = search(query, hints, network)?;

    let payload = match query.result_mode {
        ResultMode::Polygon => {
            let buckets = partition(&mut reachability, query.bucket_count, max_visited_nodes)?;
            Payload::Polygons(shape_polygons(&buckets, extractor))
        }
        ResultMode::PointList => {
            Payload::PointList(shape_point_list(&mut reachability, &query.columns))
        }
    };

    Ok(IsochroneOutcome {
        payload,
        visited_nodes: reachability.visited_node_count(),
    })
}

/// Snaps the query point and starts a search bounded by the query's active limit.
pub fn search<'a, B>(
    query: &Query,
    hints: &Hints,
    network: &'a B,
) -> Result<Reachability<B::Handle<'a>>, IsochroneError>
where
    B: ReachabilitySearch + ?Sized,
{
    let profile = network.resolve_profile(&query.vehicle).ok_or_else(|| {
        IsochroneError::invalid(format!("unsupported vehicle: {}", query.vehicle))
    })?;

    let origin = network
        .find_closest(query.point, &profile)
        .ok_or(IsochroneError::PointNotFound {
            lat: query.point.lat,
            lon: query.point.lon,
        })?;
    tracing::debug!(
        node = origin.closest_node,
        snap_distance_m = origin.query_distance_m,
        "snapped query point"
    );

    let weighting = network.build_weighting(hints, &profile)?;
    let handle = network.run(&origin, weighting, query.reverse_flow, query.limit);

    Ok(Reachability { origin, handle })
}

/// Collects `bucket_count + 1` buckets and rejects searches that are too costly or
/// buckets too sparse to outline.
pub fn partition<H: SearchHandle>(
    reachability: &mut Reachability<H>,
    bucket_count: usize,
    max_visited_nodes: usize,
) -> Result<Vec<Bucket>, IsochroneError> {
    let buckets = reachability
        .handle
        .bucketed_gps(reachability.origin.closest_node, bucket_count);

    // The search exposes no early abort, so the cost check can only happen afterwards.
    let visited = reachability.visited_node_count();
    if visited > max_visited_nodes / 5 {
        return Err(IsochroneError::SearchTooExpensive { visited });
    }

    if let Some(bucket) = buckets.iter().position(|b| b.len() < 2) {
        return Err(IsochroneError::InsufficientBucketPoints { bucket });
    }

    Ok(buckets)
}

/// Outlines every bucket but the outer sentinel. The `bucket` property follows
/// the extractor's emission order.
pub fn shape_polygons<X>(buckets: &[Bucket], extractor: &X) -> Vec<PolygonFeature>
where
    X: IsolineExtractor + ?Sized,
{
    let levels = buckets.len().saturating_sub(1);
    extractor
        .extract(buckets, levels)
        .into_iter()
        .enumerate()
        .map(|(bucket, mut boundary)| {
            boundary.close();
            PolygonFeature { bucket, boundary }
        })
        .collect()
}

/// One row per label, in search order, holding exactly the selected columns.
pub fn shape_point_list<H: SearchHandle>(
    reachability: &mut Reachability<H>,
    columns: &ColumnSet,
) -> PointList {
    let labels = reachability
        .handle
        .labeled_reachability(reachability.origin.closest_node);

    PointList {
        header: columns.names(),
        items: labels.iter().map(|label| columns.project(label)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        GeoPoint, Limit, LocationIndex, NodeId, Predecessor, ProfileRegistry,
        ReachabilityLabel, WeightingFactory,
    };
    use geo::Coord;
    use std::cell::RefCell;

    const ORIGIN_NODE: NodeId = 42;
    const MAX_VISITED: usize = 1_000_000;

    struct FakeNetwork {
        snaps: bool,
        buckets: Vec<Bucket>,
        labels: Vec<ReachabilityLabel>,
        visited: usize,
        runs: RefCell<Vec<(String, bool, Limit)>>,
    }

    impl FakeNetwork {
        fn new() -> Self {
            FakeNetwork {
                snaps: true,
                buckets: (0..4).map(ring_points).collect(),
                labels: labels(),
                visited: 1_000,
                runs: RefCell::new(Vec::new()),
            }
        }
    }

    fn ring_points(level: usize) -> Bucket {
        let r = 0.001 * (level + 1) as f64;
        vec![
            Coord { x: 11.5 - r, y: 48.1 },
            Coord { x: 11.5, y: 48.1 + r },
            Coord { x: 11.5 + r, y: 48.1 },
            Coord { x: 11.5, y: 48.1 - r },
        ]
    }

    fn labels() -> Vec<ReachabilityLabel> {
        let origin = Coord { x: 11.5, y: 48.1 };
        let mut out = vec![ReachabilityLabel {
            node_id: ORIGIN_NODE,
            coordinate: origin,
            time_ms: 0,
            distance_m: 0.0,
            predecessor: None,
        }];
        for (i, node) in [43, 44, 45].into_iter().enumerate() {
            out.push(ReachabilityLabel {
                node_id: node,
                coordinate: Coord {
                    x: 11.5 + 0.001 * (i + 1) as f64,
                    y: 48.1,
                },
                time_ms: 5_000 * (i as u64 + 1),
                distance_m: 70.0 * (i + 1) as f64,
                predecessor: Some(Predecessor {
                    node_id: ORIGIN_NODE,
                    coordinate: origin,
                    edge_id: 100 + i,
                }),
            });
        }
        out
    }

    impl ProfileRegistry for FakeNetwork {
        type Profile = String;

        fn has_profile(&self, name: &str) -> bool {
            name == "car"
        }

        fn resolve_profile(&self, name: &str) -> Option<String> {
            self.has_profile(name).then(|| name.to_string())
        }
    }

    impl LocationIndex for FakeNetwork {
        fn find_closest(&self, point: GeoPoint, _profile: &String) -> Option<ResolvedLocation> {
            self.snaps.then_some(ResolvedLocation {
                closest_node: ORIGIN_NODE,
                snapped: Coord {
                    x: point.lon,
                    y: point.lat,
                },
                query_distance_m: 0.0,
            })
        }
    }

    impl WeightingFactory for FakeNetwork {
        type Weighting = String;

        fn build_weighting(&self, hints: &Hints, _profile: &String) -> Result<String, IsochroneError> {
            match hints.get("weighting") {
                Some("broken") => Err(IsochroneError::invalid("weighting not supported: broken")),
                other => Ok(other.unwrap_or("fastest").to_string()),
            }
        }
    }

    struct FakeHandle<'a> {
        network: &'a FakeNetwork,
    }

    impl SearchHandle for FakeHandle<'_> {
        fn labeled_reachability(&mut self, node: NodeId) -> Vec<ReachabilityLabel> {
            assert_eq!(node, ORIGIN_NODE);
            self.network.labels.clone()
        }

        fn bucketed_gps(&mut self, node: NodeId, _bucket_count: usize) -> Vec<Bucket> {
            assert_eq!(node, ORIGIN_NODE);
            self.network.buckets.clone()
        }

        fn visited_node_count(&self) -> usize {
            self.network.visited
        }
    }

    impl ReachabilitySearch for FakeNetwork {
        type Handle<'a> = FakeHandle<'a>;

        fn run<'a>(
            &'a self,
            _location: &ResolvedLocation,
            weighting: String,
            reverse_flow: bool,
            limit: Limit,
        ) -> FakeHandle<'a> {
            self.runs.borrow_mut().push((weighting, reverse_flow, limit));
            FakeHandle { network: self }
        }
    }

    /// Emits the points of each level as an open ring.
    struct OpenRings;

    impl IsolineExtractor for OpenRings {
        fn extract(&self, buckets: &[Bucket], levels: usize) -> Vec<LineString<f64>> {
            buckets[..levels]
                .iter()
                .map(|b| LineString::from(b.clone()))
                .collect()
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> RawQuery {
        let mut raw = RawQuery {
            point: Some("48.1,11.5".into()),
            ..RawQuery::default()
        };
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "buckets" => raw.buckets = value,
                "result" => raw.result = value,
                "pointlist_ext_header" => raw.pointlist_ext_header = value,
                "time_limit" => raw.time_limit = value,
                "distance_limit" => raw.distance_limit = value,
                "reverse_flow" => raw.reverse_flow = value,
                "point" => raw.point = value,
                "vehicle" => raw.vehicle = value,
                other => panic!("unexpected key {other}"),
            }
        }
        raw
    }

    fn run(network: &FakeNetwork, pairs: &[(&str, &str)]) -> Result<IsochroneOutcome, IsochroneError> {
        process(&raw(pairs), &Hints::default(), network, &OpenRings, MAX_VISITED)
            .map(|(_, outcome)| outcome)
    }

    #[test]
    fn three_buckets_give_three_closed_polygons() {
        let network = FakeNetwork::new();
        let outcome = run(&network, &[("buckets", "3"), ("result", "polygon")]).unwrap();

        let Payload::Polygons(features) = outcome.payload else {
            panic!("expected polygons");
        };
        assert_eq!(features.len(), 3);
        for (i, feature) in features.iter().enumerate() {
            assert_eq!(feature.bucket, i);
            assert!(feature.boundary.0.len() >= 2);
            assert!(feature.boundary.is_closed());
        }
        assert_eq!(outcome.visited_nodes, 1_000);
    }

    #[test]
    fn bucket_out_of_range_never_searches() {
        let network = FakeNetwork::new();
        let err = run(&network, &[("buckets", "21")]).unwrap_err();
        assert!(matches!(err, IsochroneError::InvalidParameter(_)));
        assert!(network.runs.borrow().is_empty());
    }

    #[test]
    fn sparse_bucket_fails_whole_request() {
        let mut network = FakeNetwork::new();
        network.buckets[1].truncate(1);
        let err = run(&network, &[("buckets", "3")]).unwrap_err();
        assert_eq!(err, IsochroneError::InsufficientBucketPoints { bucket: 1 });
    }

    #[test]
    fn sparse_sentinel_bucket_fails_too() {
        let mut network = FakeNetwork::new();
        network.buckets[3].clear();
        let err = run(&network, &[("buckets", "3")]).unwrap_err();
        assert_eq!(err, IsochroneError::InsufficientBucketPoints { bucket: 3 });
    }

    #[test]
    fn visited_node_guard_applies_to_polygons() {
        let mut network = FakeNetwork::new();
        network.visited = MAX_VISITED / 5;
        assert!(run(&network, &[]).is_ok());

        network.visited = MAX_VISITED / 5 + 1;
        let err = run(&network, &[]).unwrap_err();
        assert_eq!(
            err,
            IsochroneError::SearchTooExpensive {
                visited: MAX_VISITED / 5 + 1
            }
        );
    }

    #[test]
    fn visited_node_guard_skips_point_lists() {
        let mut network = FakeNetwork::new();
        network.visited = MAX_VISITED;
        assert!(run(&network, &[("result", "pointlist")]).is_ok());
    }

    #[test]
    fn point_list_defaults_to_four_columns() {
        let network = FakeNetwork::new();
        let outcome = run(&network, &[("result", "pointlist")]).unwrap();
        let Payload::PointList(list) = outcome.payload else {
            panic!("expected point list");
        };
        assert_eq!(list.header, vec!["longitude", "latitude", "time", "distance"]);
        assert_eq!(list.items.len(), 4);
        assert!(list.items.iter().all(|row| row.len() == 4));
        assert_eq!(list.items[2][2], Value::from(10_000u64));
    }

    #[test]
    fn point_list_keeps_search_order_and_extension() {
        let network = FakeNetwork::new();
        let outcome = run(
            &network,
            &[("result", "pointlist"), ("pointlist_ext_header", "node_id,edge_id")],
        )
        .unwrap();
        let Payload::PointList(list) = outcome.payload else {
            panic!("expected point list");
        };
        assert_eq!(
            list.header,
            vec!["longitude", "latitude", "time", "distance", "node_id", "edge_id"]
        );
        assert!(list.items.iter().all(|row| row.len() == 6));
        let nodes: Vec<_> = list.items.iter().map(|row| row[4].clone()).collect();
        assert_eq!(nodes, vec![Value::from(42), Value::from(43), Value::from(44), Value::from(45)]);
        assert_eq!(list.items[0][5], Value::Null);
    }

    #[test]
    fn unknown_column_yields_no_rows() {
        let network = FakeNetwork::new();
        let err = run(
            &network,
            &[("result", "pointlist"), ("pointlist_ext_header", "node_id,bogus")],
        )
        .unwrap_err();
        assert_eq!(err, IsochroneError::UnknownColumn("bogus".into()));
        assert!(network.runs.borrow().is_empty());
    }

    #[test]
    fn unsnappable_point() {
        let mut network = FakeNetwork::new();
        network.snaps = false;
        let err = run(&network, &[]).unwrap_err();
        assert_eq!(err, IsochroneError::PointNotFound { lat: 48.1, lon: 11.5 });
    }

    #[test]
    fn active_limit_and_direction_reach_the_search() {
        let network = FakeNetwork::new();
        run(
            &network,
            &[("time_limit", "300"), ("distance_limit", "2000"), ("reverse_flow", "true")],
        )
        .unwrap();
        run(&network, &[("time_limit", "300")]).unwrap();

        let runs = network.runs.borrow();
        assert!(runs[0].1);
        assert_eq!(runs[0].2, Limit::Distance { meters: 2000.0 });
        assert!(!runs[1].1);
        assert_eq!(runs[1].2, Limit::Time { seconds: 300 });
    }

    #[test]
    fn weighting_failures_propagate() {
        let network = FakeNetwork::new();
        let hints = Hints::from_pairs(vec![("weighting".into(), "broken".into())]);
        let err = process(&raw(&[]), &hints, &network, &OpenRings, MAX_VISITED).unwrap_err();
        assert!(matches!(err, IsochroneError::InvalidParameter(_)));
        assert!(network.runs.borrow().is_empty());
    }

    #[test]
    fn hints_reach_the_weighting_factory() {
        let network = FakeNetwork::new();
        let hints = Hints::from_pairs(vec![("weighting".into(), "shortest".into())]);
        process(&raw(&[]), &hints, &network, &OpenRings, MAX_VISITED).unwrap();
        assert_eq!(network.runs.borrow()[0].0, "shortest");
    }
}
