use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::GeoPoint, error::TrackingError, protocol::RouteResponse};
use thiserror::Error;
use url::Url;

pub const DEFAULT_OSRM_BASE_URL: &str = "https://router.project-osrm.org";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Ordered driving path between the two points, in lat/lng order.
    async fn driving_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Vec<GeoPoint>, TrackingError>;
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("invalid routing base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("routing base url '{0}' cannot carry path segments")]
    CannotBeABase(String),
    #[error("failed to build http client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OSRM_BASE_URL.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Client for an OSRM-compatible `route/v1/driving` endpoint.
pub struct OsrmRoutingProvider {
    http: Client,
    base_url: Url,
}

impl OsrmRoutingProvider {
    pub fn new(config: OsrmConfig) -> Result<Self, RoutingError> {
        let base_url =
            Url::parse(config.base_url.trim()).map_err(|source| RoutingError::InvalidBaseUrl {
                url: config.base_url.clone(),
                source,
            })?;
        if base_url.cannot_be_a_base() {
            return Err(RoutingError::CannotBeABase(config.base_url));
        }

        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn route_url(&self, origin: &GeoPoint, destination: &GeoPoint) -> Url {
        let mut url = self.base_url.clone();
        let coordinates = format!(
            "{},{};{},{}",
            origin.lng, origin.lat, destination.lng, destination.lat
        );
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["route", "v1", "driving", coordinates.as_str()]);
        }
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");
        url
    }
}

#[async_trait]
impl RoutingProvider for OsrmRoutingProvider {
    async fn driving_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Vec<GeoPoint>, TrackingError> {
        let url = self.route_url(origin, destination);
        let response = self.http.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                TrackingError::fetch("request timed out")
            } else {
                TrackingError::fetch(format!("request failed: {err}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackingError::fetch(format!("http status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| TrackingError::fetch(format!("failed to read body: {err}")))?;
        let decoded: RouteResponse = serde_json::from_slice(&body)
            .map_err(|err| TrackingError::fetch(format!("malformed payload: {err}")))?;
        decoded.into_points()
    }
}
