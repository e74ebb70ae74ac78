use geo::{Coord, LineString};
use geojson::{Geometry, Value};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn calculate_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (dlat / 2.0).sin().powi(2) + (dlon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

pub fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    calculate_distance(a.y, a.x, b.y, b.x)
}

/// Closest point to `point` on the segment `a`-`b`, in an equirectangular frame around `point`.
pub fn project_onto_segment(point: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    let scale = point.y.to_radians().cos();
    let (ax, ay) = ((a.x - point.x) * scale, a.y - point.y);
    let (dx, dy) = ((b.x - a.x) * scale, b.y - a.y);

    let len_2 = dx * dx + dy * dy;
    let t = if len_2 > 0.0 {
        (-(ax * dx + ay * dy) / len_2).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Coord {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
    }
}

/// Travel time in milliseconds, rounded to the nearest millisecond.
pub fn calculate_travel_time_ms(length_m: f64, speed_kph: f64) -> u64 {
    let speed_m_per_s = speed_kph / 3.6;
    (length_m / speed_m_per_s * 1000.0).round() as u64
}

/// GeoJSON polygon whose exterior is `ring`, positions as `[lon, lat]`.
pub fn ring_to_geojson(ring: &LineString<f64>) -> Geometry {
    let exterior = ring
        .0
        .iter()
        .map(|coord| vec![coord.x, coord.y])
        .collect::<Vec<_>>();

    Geometry::new(Value::Polygon(vec![exterior]))
}
