use std::{sync::Arc, time::Duration};

use map_surface::MapSurface;
use routing::{Resolution, RouteResolver, RoutingProvider};
use serde::Serialize;
use shared::domain::{DeliveryPhase, GeoPoint, RouteKind, RouteTarget, TrackingInput};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::{
    animation::{AnimationDriver, AnimationFrame},
    presentation::{project, LayerSlot, LayerSpec, TrackedRoute},
    render::LayerRenderer,
};

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Wall-clock length of one playback, independent of route length.
    pub animation_duration: Duration,
    pub tick_interval: Duration,
    pub arrival_zoom: u8,
    pub fit_padding: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            animation_duration: Duration::from_secs(30),
            tick_interval: Duration::from_millis(16),
            arrival_zoom: 16,
            fit_padding: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    RouteSettled(Resolution),
    Frame(AnimationFrame),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub phase: DeliveryPhase,
    pub loading: bool,
    pub lifecycle: Option<u64>,
    pub progress: Option<f64>,
    pub route_kind: Option<RouteKind>,
    pub route_points: usize,
    pub complete: bool,
}

/// Presentation state machine for one tracked entity. Phase and coordinates
/// come in through [`TrackingSession::update`]; route fetches and animation
/// ticks come back as [`SessionEvent`]s. Every map mutation happens on the
/// task that owns the session.
pub struct TrackingSession<M: MapSurface> {
    config: TrackingConfig,
    resolver: Arc<RouteResolver>,
    driver: AnimationDriver,
    renderer: LayerRenderer<M>,
    input: TrackingInput,
    route: Option<TrackedRoute>,
    pending: Option<RouteTarget>,
    frame: Option<AnimationFrame>,
    view_pending: bool,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    frames_tx: UnboundedSender<AnimationFrame>,
    frames_rx: UnboundedReceiver<AnimationFrame>,
}

impl<M: MapSurface> TrackingSession<M> {
    pub fn new(provider: Arc<dyn RoutingProvider>, surface: M, config: TrackingConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        Self {
            driver: AnimationDriver::new(config.tick_interval),
            config,
            resolver: Arc::new(RouteResolver::new(provider)),
            renderer: LayerRenderer::new(surface),
            input: TrackingInput::default(),
            route: None,
            pending: None,
            frame: None,
            view_pending: true,
            events_tx,
            events_rx,
            frames_tx,
            frames_rx,
        }
    }

    pub fn input(&self) -> &TrackingInput {
        &self.input
    }

    pub fn route(&self) -> Option<&TrackedRoute> {
        self.route.as_ref()
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn surface(&self) -> &M {
        self.renderer.surface()
    }

    pub fn is_animating(&self) -> bool {
        self.driver.is_running()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.input.phase,
            loading: self.pending.is_some() || self.resolver.is_loading(),
            lifecycle: self.driver.lifecycle(),
            progress: self.frame.as_ref().map(|frame| frame.progress),
            route_kind: self.route.as_ref().map(|tracked| tracked.route.kind()),
            route_points: self
                .route
                .as_ref()
                .map(|tracked| tracked.route.len())
                .unwrap_or(0),
            complete: self.frame.as_ref().is_some_and(|frame| frame.complete),
        }
    }

    /// Applies a new phase signal. Must be called inside a tokio runtime.
    pub fn update(&mut self, input: TrackingInput) {
        let previous = std::mem::replace(&mut self.input, input);
        let phase_changed = previous.phase != self.input.phase;
        if phase_changed {
            info!(
                "tracking: phase {} -> {}",
                previous.phase, self.input.phase
            );
            self.view_pending = true;
        }

        match self.input.phase {
            DeliveryPhase::Idle | DeliveryPhase::Delivered => {
                self.stop_animation();
                self.pending = None;
            }
            DeliveryPhase::InTransit => self.follow_transit(phase_changed),
            DeliveryPhase::Returned => {
                self.stop_animation();
                self.pending = None;
                self.route = None;
                self.resolver.reset();
            }
        }

        self.render();
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::RouteSettled(resolution) => self.apply_resolution(resolution),
            SessionEvent::Frame(frame) => self.apply_frame(frame),
        }
    }

    /// Waits for the next fetch result or animation frame.
    pub async fn next_event(&mut self) -> SessionEvent {
        tokio::select! {
            biased;
            Some(event) = self.events_rx.recv() => event,
            Some(frame) = self.frames_rx.recv() => SessionEvent::Frame(frame),
        }
    }

    /// Handles one pending event, waiting for it if necessary.
    pub async fn process_next(&mut self) {
        let event = self.next_event().await;
        self.handle_event(event);
    }

    /// Drives the session until `inputs` closes, then tears down and hands the
    /// surface back.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<TrackingInput>) -> M {
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.update(input),
                    None => break,
                },
                event = self.next_event() => self.handle_event(event),
            }
        }

        self.teardown();
        self.renderer.into_surface()
    }

    /// Stops animation, forgets routes and removes every layer. Idempotent.
    pub fn teardown(&mut self) {
        self.stop_animation();
        self.pending = None;
        self.route = None;
        self.resolver.reset();
        self.renderer.clear();
        debug!("tracking: teardown");
    }

    fn follow_transit(&mut self, phase_changed: bool) {
        let Some(target) = self.input.target() else {
            debug!("tracking: in transit without valid endpoints");
            self.stop_animation();
            self.pending = None;
            return;
        };

        let route_matches = self
            .route
            .as_ref()
            .is_some_and(|tracked| tracked.target.approx_eq(&target));
        let awaiting = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.approx_eq(&target));

        if route_matches {
            // A coordinate dropout stops the driver but keeps the route.
            if phase_changed || self.driver.lifecycle().is_none() {
                self.start_animation();
            }
            return;
        }
        if phase_changed {
            self.begin_lifecycle(target);
            return;
        }
        if awaiting {
            return;
        }

        info!("tracking: endpoints moved, restarting target={target}");
        self.begin_lifecycle(target);
    }

    fn begin_lifecycle(&mut self, target: RouteTarget) {
        self.stop_animation();

        let origin_moved = self
            .route
            .take()
            .map(|tracked| !tracked.target.origin.approx_eq(&target.origin))
            .unwrap_or(true);
        if origin_moved {
            self.resolver.invalidate();
        }

        self.request_route(target);
    }

    fn request_route(&mut self, target: RouteTarget) {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.approx_eq(&target))
        {
            return;
        }

        if target.origin.approx_eq(&target.destination) {
            self.pending = None;
            self.route = Some(TrackedRoute {
                route: target.straight_line(),
                target,
            });
            self.start_animation();
            return;
        }

        info!("tracking: requesting route target={target}");
        self.pending = Some(target.clone());
        let resolver = Arc::clone(&self.resolver);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let resolution = resolver
                .resolve(&target.origin, &target.destination)
                .await;
            let _ = events.send(SessionEvent::RouteSettled(resolution));
        });
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        let Some(target) = resolution.target().cloned() else {
            debug!("tracking: unsettled resolution {resolution:?}");
            return;
        };

        let current = self.input.target();
        let is_current = self.input.phase == DeliveryPhase::InTransit
            && current.as_ref().is_some_and(|current| current.approx_eq(&target));
        if !is_current {
            debug!("tracking: discarded stale route target={target}");
            return;
        }
        if self
            .route
            .as_ref()
            .is_some_and(|tracked| tracked.target.approx_eq(&target))
        {
            return;
        }

        let Some(route) = resolution.route_or_fallback() else {
            return;
        };
        info!(
            "tracking: route ready kind={:?} points={} target={target}",
            route.kind(),
            route.len()
        );
        self.pending = None;
        self.route = Some(TrackedRoute { target, route });
        self.start_animation();
        self.render();
    }

    fn apply_frame(&mut self, frame: AnimationFrame) {
        if self.input.phase != DeliveryPhase::InTransit
            || self.driver.lifecycle() != Some(frame.lifecycle)
        {
            debug!("tracking: dropped frame lifecycle={}", frame.lifecycle);
            return;
        }

        if frame.complete {
            info!("tracking: animation complete lifecycle={}", frame.lifecycle);
        }
        self.frame = Some(frame);
        self.render();
    }

    fn start_animation(&mut self) {
        let Some(tracked) = self.route.as_ref() else {
            return;
        };
        self.frame = None;
        self.view_pending = true;
        self.driver.start(
            tracked.route.clone(),
            self.config.animation_duration,
            self.frames_tx.clone(),
        );
    }

    fn stop_animation(&mut self) {
        self.driver.stop();
        self.frame = None;
    }

    fn render(&mut self) {
        let desired = project(&self.input, self.route.as_ref(), self.frame.as_ref());
        self.renderer.apply(desired);
        if self.view_pending {
            self.refresh_view();
        }
    }

    fn refresh_view(&mut self) {
        let focus = match self.input.phase {
            DeliveryPhase::Delivered => self.marker_point(LayerSlot::ArrivedMarker),
            DeliveryPhase::Returned => self.marker_point(LayerSlot::ReturnedMarker),
            DeliveryPhase::Idle | DeliveryPhase::InTransit => None,
        };
        if let Some(center) = focus {
            self.renderer.set_view(&center, self.config.arrival_zoom);
            self.view_pending = false;
            return;
        }

        let bounds = match self.input.phase {
            DeliveryPhase::Idle => self.input.target().map(|target| {
                match self
                    .route
                    .as_ref()
                    .filter(|tracked| tracked.target.approx_eq(&target))
                {
                    Some(tracked) => tracked.route.points().to_vec(),
                    None => target.straight_line().points().to_vec(),
                }
            }),
            DeliveryPhase::InTransit if self.frame.is_some() => self
                .route
                .as_ref()
                .map(|tracked| tracked.route.points().to_vec()),
            _ => None,
        };
        if let Some(points) = bounds {
            self.renderer.fit_bounds(&points, self.config.fit_padding);
            self.view_pending = false;
        }
    }

    fn marker_point(&self, slot: LayerSlot) -> Option<GeoPoint> {
        match self.renderer.drawn().get(slot) {
            Some(LayerSpec::Marker { point, .. }) => Some(point.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
