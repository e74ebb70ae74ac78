use std::fmt;
use std::str::FromStr;

/// Vehicle profiles the reference network can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleProfile {
    Car,
    Bike,
    Foot,
}

const BIKE_MAX_SPEED_KPH: f64 = 18.0;
const FOOT_SPEED_KPH: f64 = 5.0;

impl VehicleProfile {
    pub const ALL: [VehicleProfile; 3] = [VehicleProfile::Car, VehicleProfile::Bike, VehicleProfile::Foot];

    pub fn name(&self) -> &'static str {
        match self {
            VehicleProfile::Car => "car",
            VehicleProfile::Bike => "bike",
            VehicleProfile::Foot => "foot",
        }
    }

    /// Bit of this profile in [`AccessMask`].
    fn bit(&self) -> u8 {
        match self {
            VehicleProfile::Car => 0b001,
            VehicleProfile::Bike => 0b010,
            VehicleProfile::Foot => 0b100,
        }
    }

    // Highway values each profile never travels on
    fn excluded_highways(&self) -> &'static [&'static str] {
        match self {
            VehicleProfile::Car => &[
                "abandoned", "bridleway", "bus_guideway", "construction", "corridor", "cycleway",
                "elevator", "escalator", "footway", "no", "path", "pedestrian", "planned",
                "platform", "proposed", "raceway", "razed", "steps", "track",
            ],
            VehicleProfile::Bike => &[
                "abandoned", "bus_guideway", "construction", "corridor", "elevator", "escalator",
                "footway", "motor", "motorway", "motorway_link", "no", "planned", "platform",
                "proposed", "raceway", "razed", "steps",
            ],
            VehicleProfile::Foot => &[
                "abandoned", "bus_guideway", "construction", "cycleway", "motor", "motorway",
                "motorway_link", "no", "planned", "platform", "proposed", "raceway", "razed",
            ],
        }
    }

    // Mode specific access keys; a "no" on any of them closes the way
    fn access_keys(&self) -> &'static [&'static str] {
        match self {
            VehicleProfile::Car => &["motor_vehicle", "motorcar"],
            VehicleProfile::Bike => &["bicycle"],
            VehicleProfile::Foot => &["foot"],
        }
    }

    /// Whether a way with these tags is part of this profile's network.
    pub fn admits<'a>(&self, mut tag: impl FnMut(&str) -> Option<&'a str>) -> bool {
        let Some(highway) = tag("highway") else {
            return false;
        };
        if self.excluded_highways().contains(&highway) {
            return false;
        }
        if tag("area") == Some("yes") {
            return false;
        }
        if matches!(tag("access"), Some("no") | Some("private")) {
            return false;
        }
        if *self == VehicleProfile::Car
            && matches!(
                tag("service"),
                Some("emergency_access") | Some("parking") | Some("parking_aisle") | Some("private")
            )
        {
            return false;
        }
        self.access_keys().iter().all(|key| tag(key) != Some("no"))
    }

    /// Speed this profile travels at on a road signed or classified for `road_speed_kph`.
    pub fn speed_kph(&self, road_speed_kph: f64) -> f64 {
        match self {
            VehicleProfile::Car => road_speed_kph,
            VehicleProfile::Bike => road_speed_kph.min(BIKE_MAX_SPEED_KPH),
            VehicleProfile::Foot => FOOT_SPEED_KPH,
        }
    }

    pub fn respects_oneway(&self) -> bool {
        !matches!(self, VehicleProfile::Foot)
    }
}

impl fmt::Display for VehicleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VehicleProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleProfile::Car),
            "bike" => Ok(VehicleProfile::Bike),
            "foot" => Ok(VehicleProfile::Foot),
            other => Err(format!("unknown vehicle profile: {other}")),
        }
    }
}

/// Set of profiles allowed on an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessMask(u8);

impl AccessMask {
    pub fn allow(&mut self, profile: VehicleProfile) {
        self.0 |= profile.bit();
    }

    pub fn allows(&self, profile: VehicleProfile) -> bool {
        self.0 & profile.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
