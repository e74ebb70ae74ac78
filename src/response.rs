//! JSON envelope shared by every isochrone answer.

use std::time::Duration;

use geojson::{Feature, JsonObject};
use serde::Serialize;
use serde_json::Value;

use crate::isochrone::{Payload, PolygonFeature};
use crate::utils::ring_to_geojson;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Info {
    pub copyrights: Vec<String>,
    /// Milliseconds from request start until the payload was shaped.
    pub took: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Polygons {
        polygons: Vec<Feature>,
    },
    PointList {
        header: Vec<&'static str>,
        items: Vec<Vec<Value>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct IsochroneResponse {
    #[serde(flatten)]
    pub body: ResponseBody,
    pub info: Info,
}

impl IsochroneResponse {
    pub fn new(payload: Payload, copyrights: &[String], took: Duration) -> Self {
        let body = match payload {
            Payload::Polygons(features) => ResponseBody::Polygons {
                polygons: features.iter().map(polygon_feature).collect(),
            },
            Payload::PointList(list) => ResponseBody::PointList {
                header: list.header,
                items: list.items,
            },
        };
        IsochroneResponse {
            body,
            info: Info {
                copyrights: copyrights.to_vec(),
                took: took_millis(took),
            },
        }
    }

    pub fn took(&self) -> u64 {
        self.info.took
    }
}

pub fn took_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn polygon_feature(feature: &PolygonFeature) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("bucket".to_string(), Value::from(feature.bucket));

    Feature {
        bbox: None,
        geometry: Some(ring_to_geojson(&feature.boundary)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
