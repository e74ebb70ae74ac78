use std::str::FromStr;

use crate::engine::{Hints, WeightingFactory};
use crate::error::IsochroneError;
use crate::graph::{RoadEdge, RoadNetwork};
use crate::profile::VehicleProfile;
use crate::utils::calculate_travel_time_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightingKind {
    #[default]
    Fastest,
    Shortest,
}

impl FromStr for WeightingKind {
    type Err = IsochroneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(WeightingKind::Fastest),
            "shortest" => Ok(WeightingKind::Shortest),
            other => Err(IsochroneError::invalid(format!(
                "weighting not supported: {other}"
            ))),
        }
    }
}

/// Cost model for one search: which profile travels, and what it minimises.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weighting {
    pub profile: VehicleProfile,
    pub kind: WeightingKind,
}

impl Weighting {
    pub fn new(profile: VehicleProfile, kind: WeightingKind) -> Self {
        Weighting { profile, kind }
    }

    pub fn edge_time_ms(&self, edge: &RoadEdge) -> u64 {
        calculate_travel_time_ms(edge.length_m, self.profile.speed_kph(edge.road_speed_kph))
    }

    /// Cost of traversing `edge` in its own direction; `None` when the profile may not.
    pub fn edge_weight(&self, edge: &RoadEdge) -> Option<f64> {
        if !edge.traversable_by(self.profile) {
            return None;
        }
        Some(match self.kind {
            WeightingKind::Fastest => self.edge_time_ms(edge) as f64,
            WeightingKind::Shortest => edge.length_m,
        })
    }
}

impl WeightingFactory for RoadNetwork {
    type Weighting = Weighting;

    fn build_weighting(
        &self,
        hints: &Hints,
        profile: &VehicleProfile,
    ) -> Result<Weighting, IsochroneError> {
        let kind = match hints.get("weighting") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => WeightingKind::default(),
        };
        Ok(Weighting::new(*profile, kind))
    }
}
