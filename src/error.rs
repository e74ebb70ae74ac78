use thiserror::Error;

/// Failures of a single isochrone request. Every variant is the caller's to fix;
/// none of them is retried and none of them outlives the request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IsochroneError {
    #[error("{0}")]
    InvalidParameter(String),

    #[error("Point not found: {lat},{lon}")]
    PointNotFound { lat: f64, lon: f64 },

    #[error(
        "Server side reset: too many junction nodes would have to be explored ({visited}). \
         Try a smaller 'buckets' count or a larger 'time_limit'"
    )]
    SearchTooExpensive { visited: usize },

    #[error(
        "Too few points found for bucket {bucket}. Please try a different 'point', \
         a smaller 'buckets' count or a larger 'time_limit'"
    )]
    InsufficientBucketPoints { bucket: usize },

    #[error("Unknown property {0}")]
    UnknownColumn(String),
}

impl IsochroneError {
    pub fn invalid(message: impl Into<String>) -> Self {
        IsochroneError::InvalidParameter(message.into())
    }

    /// Stable machine-readable code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            IsochroneError::InvalidParameter(_) => "invalid_parameter",
            IsochroneError::PointNotFound { .. } => "point_not_found",
            IsochroneError::SearchTooExpensive { .. } => "search_too_expensive",
            IsochroneError::InsufficientBucketPoints { .. } => "insufficient_bucket_points",
            IsochroneError::UnknownColumn(_) => "unknown_column",
        }
    }
}

/// Failures while loading the road network backing the service.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read OSM file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse OSM XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("OSM data contains no routable ways")]
    Empty,
}
