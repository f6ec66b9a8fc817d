use serde::{Deserialize, Serialize};

use crate::{domain::GeoPoint, error::TrackingError};

/// Body of an OSRM-compatible `route/v1/driving` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteGeometryEnvelope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGeometryEnvelope {
    pub geometry: LineStringGeometry,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// GeoJSON line string; coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineStringGeometry {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub coordinates: Vec<Vec<f64>>,
}

pub const ROUTE_OK: &str = "Ok";

impl RouteResponse {
    /// Points of the first route with the wire axis order swapped into lat/lng.
    pub fn into_points(self) -> Result<Vec<GeoPoint>, TrackingError> {
        if self.code != ROUTE_OK {
            let detail = self.message.unwrap_or_default();
            return Err(TrackingError::fetch(format!(
                "provider status {} {detail}",
                self.code
            )));
        }

        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| TrackingError::fetch("provider returned no routes"))?;

        route
            .geometry
            .coordinates
            .into_iter()
            .map(|pair| match pair.as_slice() {
                [lng, lat, ..] => Ok(GeoPoint::new(*lat, *lng)),
                _ => Err(TrackingError::fetch("malformed coordinate pair")),
            })
            .collect()
    }
}
