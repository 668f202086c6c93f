//! GeoJSON geometries accepted as GeoProperty values.
//!
//! Coordinates follow GeoJSON axis order: `[longitude, latitude]`.

use serde::{Deserialize, Serialize};

/// A `[longitude, latitude]` position.
pub type Position = [f64; 2];

/// The GeoJSON geometry kinds NGSI-LD brokers accept for GeoProperty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPoint(Vec<Position>),
}

impl Geometry {
    /// Point from the everyday (latitude, longitude) order.
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self::Point([lon, lat])
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::LineString(_) => "LineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPoint(_) => "MultiPoint",
        }
    }
}
