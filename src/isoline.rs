use geo::{ConcaveHull, ConvexHull, KNearestConcaveHull, LineString, MultiPoint, Polygon};

use crate::engine::{Bucket, IsolineExtractor};

const MIN_CONCAVE_POINTS: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HullType {
    FastConcave,
    Concave,
    #[default]
    Convex,
}

/// Shapes each level as the hull of every point reachable up to that level.
#[derive(Debug, Copy, Clone, Default)]
pub struct HullIsolineBuilder {
    hull_type: HullType,
}

impl HullIsolineBuilder {
    pub fn new(hull_type: HullType) -> Self {
        HullIsolineBuilder { hull_type }
    }

    fn hull(&self, points: MultiPoint<f64>) -> Polygon<f64> {
        if points.0.len() < MIN_CONCAVE_POINTS {
            return points.convex_hull();
        }
        match self.hull_type {
            HullType::FastConcave => points.concave_hull(2.0),
            HullType::Concave => points.k_nearest_concave_hull(3),
            HullType::Convex => points.convex_hull(),
        }
    }
}

impl IsolineExtractor for HullIsolineBuilder {
    fn extract(&self, buckets: &[Bucket], levels: usize) -> Vec<LineString<f64>> {
        let mut reachable = Vec::new();
        buckets
            .iter()
            .take(levels)
            .map(|bucket| {
                reachable.extend(bucket.iter().copied());
                let hull = self.hull(MultiPoint::from(reachable.clone()));
                let (mut exterior, _) = hull.into_inner();
                exterior.close();
                exterior
            })
            .collect()
    }
}
