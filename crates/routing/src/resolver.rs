use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{GeoPoint, Route, RouteTarget},
    error::TrackingError,
};
use tracing::{debug, info, warn};

use crate::provider::RoutingProvider;

/// Fewer points than this from the provider is treated as no route at all.
pub const MIN_PROVIDER_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteCacheEntry {
    pub last_destination: GeoPoint,
    pub route: Route,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Fetched {
        target: RouteTarget,
        route: Route,
    },
    Cached {
        target: RouteTarget,
        route: Route,
    },
    /// Provider failed; the caller should draw the straight line for `target`.
    Fallback {
        target: RouteTarget,
        reason: TrackingError,
    },
    /// Coalesced into the fetch already in flight.
    Pending,
    /// Invalid or identical endpoints. No request was made.
    Skipped,
    /// The resolver was reset while the fetch was in flight.
    Superseded,
}

impl Resolution {
    pub fn route(&self) -> Option<&Route> {
        match self {
            Resolution::Fetched { route, .. } | Resolution::Cached { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn into_route(self) -> Option<Route> {
        match self {
            Resolution::Fetched { route, .. } | Resolution::Cached { route, .. } => Some(route),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&RouteTarget> {
        match self {
            Resolution::Fetched { target, .. }
            | Resolution::Cached { target, .. }
            | Resolution::Fallback { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The provider route when there is one, otherwise the straight line for a failed fetch.
    pub fn route_or_fallback(&self) -> Option<Route> {
        match self {
            Resolution::Fetched { route, .. } | Resolution::Cached { route, .. } => {
                Some(route.clone())
            }
            Resolution::Fallback { target, .. } => Some(target.straight_line()),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    cache: Option<RouteCacheEntry>,
    desired: Option<RouteTarget>,
    in_flight: bool,
}

enum Settle {
    Done(Resolution),
    Refetch(RouteTarget),
}

/// Releases the in-flight flag when the owning future is dropped mid-fetch.
/// A settled fetch releases it in `RouteResolver::settle` and disarms this.
struct InFlightGuard<'a> {
    state: &'a Mutex<ResolverState>,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .in_flight = false;
        }
    }
}

/// Route lookups for one tracked entity: validation, last-destination cache,
/// single-flight fetches and a stale-response guard.
pub struct RouteResolver {
    provider: Arc<dyn RoutingProvider>,
    state: Mutex<ResolverState>,
}

impl RouteResolver {
    pub fn new(provider: Arc<dyn RoutingProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(ResolverState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_loading(&self) -> bool {
        self.state().in_flight
    }

    pub fn cached(&self) -> Option<RouteCacheEntry> {
        self.state().cache.clone()
    }

    /// Drops the cached route so the next resolve goes to the provider.
    pub fn invalidate(&self) {
        self.state().cache = None;
    }

    /// Forgets the cache and the desired target. A fetch still in flight will
    /// settle as [`Resolution::Superseded`].
    pub fn reset(&self) {
        let mut state = self.state();
        state.cache = None;
        state.desired = None;
    }

    pub async fn resolve(&self, origin: &GeoPoint, destination: &GeoPoint) -> Resolution {
        if !origin.is_valid() || !destination.is_valid() {
            debug!("routing: skip invalid coordinates origin={origin} destination={destination}");
            return Resolution::Skipped;
        }
        if origin.approx_eq(destination) {
            debug!("routing: skip identical endpoints at={origin}");
            return Resolution::Skipped;
        }

        let requested = RouteTarget::new(origin.clone(), destination.clone());
        {
            let mut state = self.state();
            if let Some(entry) = state
                .cache
                .as_ref()
                .filter(|entry| entry.last_destination.approx_eq(destination))
            {
                debug!("routing: cache hit destination={destination}");
                return Resolution::Cached {
                    target: requested,
                    route: entry.route.clone(),
                };
            }

            state.desired = Some(requested.clone());
            if state.in_flight {
                debug!("routing: coalesced into in-flight fetch target={requested}");
                return Resolution::Pending;
            }
            state.in_flight = true;
        }

        let in_flight = InFlightGuard {
            state: &self.state,
            armed: true,
        };
        let mut target = requested;
        loop {
            let fetched = self
                .provider
                .driving_route(&target.origin, &target.destination)
                .await;

            match self.settle(&target, fetched) {
                Settle::Done(resolution) => {
                    in_flight.disarm();
                    return resolution;
                }
                Settle::Refetch(next) => {
                    debug!("routing: discarded stale route target={target} next={next}");
                    target = next;
                }
            }
        }
    }

    /// Settles one fetch. Whenever this returns `Settle::Done` the in-flight
    /// flag is already released under the same lock, so a resolve arriving
    /// right after becomes the next owner instead of coalescing into a fetch
    /// that is over.
    fn settle(
        &self,
        target: &RouteTarget,
        fetched: Result<Vec<GeoPoint>, TrackingError>,
    ) -> Settle {
        let mut state = self.state();
        match state.desired.clone() {
            None => {
                state.in_flight = false;
                debug!("routing: resolver reset during fetch target={target}");
                return Settle::Done(Resolution::Superseded);
            }
            Some(desired) if !desired.approx_eq(target) => {
                return Settle::Refetch(desired);
            }
            Some(_) => {
                state.desired = None;
                state.in_flight = false;
            }
        }

        let route = fetched.and_then(|points| {
            if points.len() < MIN_PROVIDER_POINTS {
                return Err(TrackingError::InsufficientRouteFallback {
                    points: points.len(),
                });
            }
            Route::new(points)
        });

        match route {
            Ok(route) => {
                info!(
                    "routing: resolved target={target} points={}",
                    route.len()
                );
                state.cache = Some(RouteCacheEntry {
                    last_destination: target.destination.clone(),
                    route: route.clone(),
                });
                Settle::Done(Resolution::Fetched {
                    target: target.clone(),
                    route,
                })
            }
            Err(reason) => {
                warn!("routing: falling back to straight line target={target} reason={reason}");
                Settle::Done(Resolution::Fallback {
                    target: target.clone(),
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
