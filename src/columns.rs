use std::str::FromStr;

use serde_json::Value;

use crate::engine::ReachabilityLabel;
use crate::error::IsochroneError;

/// A field of a point-list row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Longitude,
    Latitude,
    Time,
    Distance,
    NodeId,
    EdgeId,
    PrevLongitude,
    PrevLatitude,
    PrevNodeId,
}

impl Column {
    pub const DEFAULTS: [Column; 4] = [
        Column::Longitude,
        Column::Latitude,
        Column::Time,
        Column::Distance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Longitude => "longitude",
            Column::Latitude => "latitude",
            Column::Time => "time",
            Column::Distance => "distance",
            Column::NodeId => "node_id",
            Column::EdgeId => "edge_id",
            Column::PrevLongitude => "prev_longitude",
            Column::PrevLatitude => "prev_latitude",
            Column::PrevNodeId => "prev_node_id",
        }
    }

    /// Value of this column for one label. Time is in milliseconds, distance in meters.
    pub fn project(&self, label: &ReachabilityLabel) -> Value {
        let prev = label.predecessor.as_ref();
        match self {
            Column::Longitude => Value::from(label.coordinate.x),
            Column::Latitude => Value::from(label.coordinate.y),
            Column::Time => Value::from(label.time_ms),
            Column::Distance => Value::from(label.distance_m),
            Column::NodeId => Value::from(label.node_id),
            Column::EdgeId => prev.map_or(Value::Null, |p| Value::from(p.edge_id)),
            Column::PrevLongitude => prev.map_or(Value::Null, |p| Value::from(p.coordinate.x)),
            Column::PrevLatitude => prev.map_or(Value::Null, |p| Value::from(p.coordinate.y)),
            Column::PrevNodeId => prev.map_or(Value::Null, |p| Value::from(p.node_id)),
        }
    }
}

impl FromStr for Column {
    type Err = IsochroneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "longitude" => Ok(Column::Longitude),
            "latitude" => Ok(Column::Latitude),
            "time" => Ok(Column::Time),
            "distance" => Ok(Column::Distance),
            "node_id" => Ok(Column::NodeId),
            "edge_id" => Ok(Column::EdgeId),
            "prev_longitude" => Ok(Column::PrevLongitude),
            "prev_latitude" => Ok(Column::PrevLatitude),
            "prev_node_id" => Ok(Column::PrevNodeId),
            other => Err(IsochroneError::UnknownColumn(other.to_string())),
        }
    }
}

/// Ordered, duplicate-free selection of columns. The four defaults always come first.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl Default for ColumnSet {
    fn default() -> Self {
        ColumnSet {
            columns: Column::DEFAULTS.to_vec(),
        }
    }
}

impl ColumnSet {
    /// Defaults followed by the comma separated extension. Blank entries are skipped,
    /// repeated ones keep their first position, and any unknown name rejects the whole set.
    pub fn with_extension(extension: Option<&str>) -> Result<Self, IsochroneError> {
        let mut set = ColumnSet::default();
        let Some(extension) = extension else {
            return Ok(set);
        };
        for name in extension.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let column: Column = name.parse()?;
            if !set.columns.contains(&column) {
                set.columns.push(column);
            }
        }
        Ok(set)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(Column::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn project(&self, label: &ReachabilityLabel) -> Vec<Value> {
        self.columns.iter().map(|c| c.project(label)).collect()
    }
}
