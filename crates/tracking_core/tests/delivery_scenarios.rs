use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use map_surface::{MarkerIcon, RecordingMapSurface};
use routing::{RouteResolver, RoutingProvider};
use shared::{
    domain::{DeliveryPhase, GeoPoint, Route, RouteKind, TrackingInput},
    error::TrackingError,
};
use tokio::time::Instant;
use tracking_core::{
    animation::{interpolate_position, remaining_route},
    AnimationState, TrackingConfig, TrackingSession,
};

struct FixedProvider {
    points: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl RoutingProvider for FixedProvider {
    async fn driving_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<Vec<GeoPoint>, TrackingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.points == 0 {
            return Err(TrackingError::fetch("connection reset"));
        }
        Ok((0..self.points)
            .map(|i| origin.lerp(destination, i as f64 / (self.points - 1) as f64))
            .collect())
    }
}

fn kathmandu_origin() -> GeoPoint {
    GeoPoint::new(27.7172, 85.3240)
}

fn kathmandu_destination() -> GeoPoint {
    GeoPoint::new(27.7200, 85.3300)
}

#[tokio::test]
async fn fifty_point_route_is_half_done_after_fifteen_seconds() {
    let provider = Arc::new(FixedProvider {
        points: 50,
        calls: AtomicUsize::new(0),
    });
    let resolver = RouteResolver::new(provider);
    let route = resolver
        .resolve(&kathmandu_origin(), &kathmandu_destination())
        .await
        .into_route()
        .expect("route");

    let mut state = AnimationState::new(route, Duration::from_millis(30_000), Instant::now());
    state.sample(Duration::from_millis(15_000));

    assert_eq!(state.progress, 0.5);
    assert_eq!(state.remaining_route.len(), 25);
}

#[tokio::test]
async fn failed_request_resolves_to_null_and_straight_segment() {
    let provider = Arc::new(FixedProvider {
        points: 0,
        calls: AtomicUsize::new(0),
    });
    let resolver = RouteResolver::new(provider.clone());

    let resolution = resolver
        .resolve(&kathmandu_origin(), &kathmandu_destination())
        .await;
    let fallback = resolution.route_or_fallback().expect("fallback");

    assert!(resolution.into_route().is_none());
    assert_eq!(fallback.kind(), RouteKind::StraightLine);
    assert_eq!(fallback.points(), &[kathmandu_origin(), kathmandu_destination()]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn remaining_route_never_grows_and_end_is_exact() {
    let points: Vec<GeoPoint> = (0..37)
        .map(|i| GeoPoint::new(27.7 + i as f64 * 0.0003, 85.3 + (i % 5) as f64 * 0.0002))
        .collect();
    let route = Route::new(points).expect("route");

    let mut previous = route.len();
    for step in 0..=1000 {
        let progress = step as f64 / 1000.0;
        let remaining = remaining_route(&route, progress).len();
        assert!(remaining <= previous);
        previous = remaining;
    }
    assert_eq!(interpolate_position(&route, 1.0), *route.last());
}

#[tokio::test(start_paused = true)]
async fn full_delivery_lifecycle_ends_with_arrival_marker() {
    let provider = Arc::new(FixedProvider {
        points: 40,
        calls: AtomicUsize::new(0),
    });
    let mut session = TrackingSession::new(
        provider.clone(),
        RecordingMapSurface::new(),
        TrackingConfig {
            animation_duration: Duration::from_secs(3),
            tick_interval: Duration::from_millis(100),
            ..TrackingConfig::default()
        },
    );

    let input = |phase| TrackingInput::new(phase, Some(kathmandu_origin()), Some(kathmandu_destination()));

    session.update(input(DeliveryPhase::Idle));
    session.update(input(DeliveryPhase::InTransit));
    while !session.status().complete {
        session.process_next().await;
    }
    session.update(input(DeliveryPhase::Delivered));

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        session.surface().live_markers(),
        vec![(kathmandu_destination(), MarkerIcon::Arrived)]
    );
    assert!(session.surface().live_polylines().is_empty());
}
