//! Parameter validation for isochrone requests.

use serde::Deserialize;

use crate::columns::ColumnSet;
use crate::engine::{GeoPoint, Limit, ProfileRegistry};
use crate::error::IsochroneError;

pub const MIN_BUCKETS: usize = 1;
pub const MAX_BUCKETS: usize = 20;

const DEFAULT_VEHICLE: &str = "car";
const DEFAULT_TIME_LIMIT_SECONDS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    Polygon,
    PointList,
}

impl ResultMode {
    pub fn parse(value: &str) -> Result<Self, IsochroneError> {
        if value.eq_ignore_ascii_case("polygon") {
            Ok(ResultMode::Polygon)
        } else if value.eq_ignore_ascii_case("pointlist") {
            Ok(ResultMode::PointList)
        } else {
            Err(IsochroneError::invalid(format!(
                "unsupported result type: {value}"
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultMode::Polygon => "polygon",
            ResultMode::PointList => "pointlist",
        }
    }
}

/// Query parameters exactly as they arrive; everything is parsed during validation
/// so malformed numbers surface as `InvalidParameter` rather than transport errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuery {
    pub vehicle: Option<String>,
    pub buckets: Option<String>,
    pub reverse_flow: Option<String>,
    pub point: Option<String>,
    pub result: Option<String>,
    pub pointlist_ext_header: Option<String>,
    pub time_limit: Option<String>,
    pub distance_limit: Option<String>,
}

/// A validated isochrone request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub vehicle: String,
    pub bucket_count: usize,
    pub reverse_flow: bool,
    pub point: GeoPoint,
    pub result_mode: ResultMode,
    pub columns: ColumnSet,
    pub limit: Limit,
}

impl Query {
    pub fn validate<R>(raw: &RawQuery, registry: &R) -> Result<Query, IsochroneError>
    where
        R: ProfileRegistry + ?Sized,
    {
        let bucket_count = match raw.buckets.as_deref() {
            None => MIN_BUCKETS,
            Some(value) => usize::try_from(parse_number::<i64>("buckets", value)?).unwrap_or(0),
        };
        if !(MIN_BUCKETS..=MAX_BUCKETS).contains(&bucket_count) {
            return Err(IsochroneError::invalid(format!(
                "bucket count out of range: has to be in [{MIN_BUCKETS}, {MAX_BUCKETS}]"
            )));
        }

        let point = match raw.point.as_deref() {
            Some(value) if !value.trim().is_empty() => parse_point(value)?,
            _ => return Err(IsochroneError::invalid("missing point")),
        };

        let vehicle = raw
            .vehicle
            .as_deref()
            .unwrap_or(DEFAULT_VEHICLE)
            .trim()
            .to_lowercase();
        if !registry.has_profile(&vehicle) {
            return Err(IsochroneError::invalid(format!(
                "unsupported vehicle: {vehicle}"
            )));
        }

        let result_mode = ResultMode::parse(raw.result.as_deref().unwrap_or("polygon"))?;

        let reverse_flow = match raw.reverse_flow.as_deref() {
            None => false,
            Some(value) => parse_bool("reverse_flow", value)?,
        };

        let time_limit = match raw.time_limit.as_deref() {
            None => DEFAULT_TIME_LIMIT_SECONDS,
            Some(value) => parse_number::<i64>("time_limit", value)?,
        };
        let time_limit = u64::try_from(time_limit)
            .map_err(|_| IsochroneError::invalid("time_limit must not be negative"))?;

        let distance_limit = match raw.distance_limit.as_deref() {
            None => -1.0,
            Some(value) => parse_number::<f64>("distance_limit", value)?,
        };
        if distance_limit.is_nan() {
            return Err(IsochroneError::invalid("distance_limit is not a number"));
        }

        let columns = ColumnSet::with_extension(raw.pointlist_ext_header.as_deref())?;

        Ok(Query {
            vehicle,
            bucket_count,
            reverse_flow,
            point,
            result_mode,
            columns,
            limit: Limit::from_params(time_limit, distance_limit),
        })
    }
}

/// Parses `"lat,lon"`.
pub fn parse_point(value: &str) -> Result<GeoPoint, IsochroneError> {
    let invalid = || IsochroneError::invalid(format!("invalid point: {value}"));
    let (lat, lon) = value.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid());
    }
    Ok(GeoPoint::new(lat, lon))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, IsochroneError> {
    value
        .trim()
        .parse()
        .map_err(|_| IsochroneError::invalid(format!("{name} is not a number: {value}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, IsochroneError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(IsochroneError::invalid(format!(
            "{name} is not a boolean: {value}"
        ))),
    }
}
