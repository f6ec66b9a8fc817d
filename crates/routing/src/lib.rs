mod provider;
mod resolver;

pub use provider::{
    OsrmConfig, OsrmRoutingProvider, RoutingError, RoutingProvider, DEFAULT_OSRM_BASE_URL,
};
pub use resolver::{Resolution, RouteCacheEntry, RouteResolver, MIN_PROVIDER_POINTS};
