use petgraph::graph::NodeIndex;
use rstar::primitives::Line;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// One road segment with `[lon, lat]` ends. Both directed edges of the segment share it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedSegment {
    pub line: Line<[f64; 2]>,
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub segment_id: usize,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.line.envelope()
    }
}

impl PointDistance for IndexedSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.line.distance_2(point)
    }
}

/// Nearest-segment lookup over the road network.
pub struct SpatialIndex {
    tree: RTree<IndexedSegment>,
}

impl SpatialIndex {
    pub fn build(segments: impl IntoIterator<Item = IndexedSegment>) -> Self {
        SpatialIndex {
            tree: RTree::bulk_load(segments.into_iter().collect()),
        }
    }

    /// Segments within `radius_deg` (planar degrees) of the point, nearest first.
    pub fn nearest_within(
        &self,
        lon: f64,
        lat: f64,
        radius_deg: f64,
    ) -> impl Iterator<Item = &IndexedSegment> + '_ {
        let max_2 = radius_deg * radius_deg;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[lon, lat])
            .take_while(move |(_, d2)| *d2 <= max_2)
            .map(|(segment, _)| segment)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }
}
