use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

/// Movement below this many degrees on both axes (~11 m) is treated as GPS noise.
pub const COORDINATE_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            label: None,
        }
    }

    pub fn labeled(lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            label: Some(label.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Labels do not take part in the comparison.
    pub fn approx_eq(&self, other: &GeoPoint) -> bool {
        (self.lat - other.lat).abs() <= COORDINATE_EPSILON
            && (self.lng - other.lng).abs() <= COORDINATE_EPSILON
    }

    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint::new(
            self.lat + (other.lat - self.lat) * t,
            self.lng + (other.lng - self.lng) * t,
        )
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

impl FromStr for GeoPoint {
    type Err = TrackingError;

    /// Parses `"lat,lng"`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = raw
            .split_once(',')
            .ok_or(TrackingError::InvalidCoordinates)?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| TrackingError::InvalidCoordinates)?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| TrackingError::InvalidCoordinates)?;
        let point = GeoPoint::new(lat, lng);
        if !point.is_valid() {
            return Err(TrackingError::InvalidCoordinates);
        }
        Ok(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Three or more points from the routing provider.
    Resolved,
    /// Two points: the fallback segment between origin and destination.
    StraightLine,
}

/// An ordered path with at least two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GeoPoint>", into = "Vec<GeoPoint>")]
pub struct Route {
    points: Vec<GeoPoint>,
}

impl Route {
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, TrackingError> {
        if points.len() < 2 {
            return Err(TrackingError::RouteTooShort {
                points: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn straight_line(origin: &GeoPoint, destination: &GeoPoint) -> Self {
        Self {
            points: vec![origin.clone(), destination.clone()],
        }
    }

    pub fn kind(&self) -> RouteKind {
        if self.points.len() >= 3 {
            RouteKind::Resolved
        } else {
            RouteKind::StraightLine
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> &GeoPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &GeoPoint {
        &self.points[self.points.len() - 1]
    }

    /// True when the route starts at `origin` and ends at `destination`, within noise.
    pub fn connects(&self, origin: &GeoPoint, destination: &GeoPoint) -> bool {
        self.first().approx_eq(origin) && self.last().approx_eq(destination)
    }
}

impl TryFrom<Vec<GeoPoint>> for Route {
    type Error = TrackingError;

    fn try_from(points: Vec<GeoPoint>) -> Result<Self, Self::Error> {
        Route::new(points)
    }
}

impl From<Route> for Vec<GeoPoint> {
    fn from(route: Route) -> Self {
        route.points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

impl RouteTarget {
    pub fn new(origin: GeoPoint, destination: GeoPoint) -> Self {
        Self {
            origin,
            destination,
        }
    }

    pub fn approx_eq(&self, other: &RouteTarget) -> bool {
        self.origin.approx_eq(&other.origin) && self.destination.approx_eq(&other.destination)
    }

    pub fn straight_line(&self) -> Route {
        Route::straight_line(&self.origin, &self.destination)
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryPhase {
    #[default]
    #[serde(alias = "not-started")]
    Idle,
    InTransit,
    Delivered,
    Returned,
}

impl DeliveryPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryPhase::Idle => "idle",
            DeliveryPhase::InTransit => "in-transit",
            DeliveryPhase::Delivered => "delivered",
            DeliveryPhase::Returned => "returned",
        }
    }
}

impl fmt::Display for DeliveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryPhase {
    type Err = TrackingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "idle" | "not-started" => Ok(DeliveryPhase::Idle),
            "in-transit" => Ok(DeliveryPhase::InTransit),
            "delivered" => Ok(DeliveryPhase::Delivered),
            "returned" => Ok(DeliveryPhase::Returned),
            other => Err(TrackingError::UnknownPhase(other.to_string())),
        }
    }
}

/// Phase signal supplied by the booking feature for one tracked entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInput {
    pub phase: DeliveryPhase,
    #[serde(default)]
    pub origin: Option<GeoPoint>,
    #[serde(default)]
    pub destination: Option<GeoPoint>,
    #[serde(default)]
    pub original_location: Option<GeoPoint>,
}

impl TrackingInput {
    pub fn new(
        phase: DeliveryPhase,
        origin: Option<GeoPoint>,
        destination: Option<GeoPoint>,
    ) -> Self {
        Self {
            phase,
            origin,
            destination,
            original_location: None,
        }
    }

    pub fn with_original_location(mut self, location: GeoPoint) -> Self {
        self.original_location = Some(location);
        self
    }

    pub fn valid_origin(&self) -> Option<&GeoPoint> {
        self.origin.as_ref().filter(|p| p.is_valid())
    }

    pub fn valid_destination(&self) -> Option<&GeoPoint> {
        self.destination.as_ref().filter(|p| p.is_valid())
    }

    /// Both endpoints, when both are present and valid.
    pub fn target(&self) -> Option<RouteTarget> {
        Some(RouteTarget::new(
            self.valid_origin()?.clone(),
            self.valid_destination()?.clone(),
        ))
    }
}
