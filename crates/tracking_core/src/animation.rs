use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use serde::Serialize;
use shared::domain::{GeoPoint, Route};
use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::debug;

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// `min(elapsed / duration, 1)`. A zero duration is complete immediately.
pub fn progress_at(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

/// Planar interpolation between the two route points bracketing `progress`.
pub fn interpolate_position(route: &Route, progress: f64) -> GeoPoint {
    let progress = progress.clamp(0.0, 1.0);
    if progress >= 1.0 {
        return route.last().clone();
    }

    let points = route.points();
    let last = points.len() - 1;
    let index = progress * last as f64;
    let lower = (index.floor() as usize).min(last);
    let upper = (lower + 1).min(last);
    let t = index - lower as f64;
    points[lower].lerp(&points[upper], t)
}

/// Route left after dropping the first `floor(progress * len)` points. Empty
/// once fewer than two points would remain.
pub fn remaining_route(route: &Route, progress: f64) -> Vec<GeoPoint> {
    let points = route.points();
    let dropped = ((progress.clamp(0.0, 1.0) * points.len() as f64).floor() as usize)
        .min(points.len());
    let rest = &points[dropped..];
    if rest.len() < 2 {
        return Vec::new();
    }
    rest.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationFrame {
    pub lifecycle: u64,
    pub progress: f64,
    pub position: GeoPoint,
    pub remaining_route: Vec<GeoPoint>,
    pub complete: bool,
}

/// Progress of one animation lifecycle. Progress never moves backwards.
#[derive(Debug, Clone)]
pub struct AnimationState {
    pub started_at: Instant,
    pub duration: Duration,
    pub progress: f64,
    pub current_position: GeoPoint,
    pub remaining_route: Vec<GeoPoint>,
    route: Route,
}

impl AnimationState {
    pub fn new(route: Route, duration: Duration, started_at: Instant) -> Self {
        Self {
            started_at,
            duration,
            progress: 0.0,
            current_position: route.first().clone(),
            remaining_route: route.points().to_vec(),
            route,
        }
    }

    pub fn sample(&mut self, elapsed: Duration) {
        let progress = progress_at(elapsed, self.duration).max(self.progress);
        self.progress = progress;
        self.current_position = interpolate_position(&self.route, progress);
        self.remaining_route = remaining_route(&self.route, progress);
    }

    pub fn advance(&mut self, now: Instant) {
        self.sample(now.saturating_duration_since(self.started_at));
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn frame(&self, lifecycle: u64) -> AnimationFrame {
        AnimationFrame {
            lifecycle,
            progress: self.progress,
            position: self.current_position.clone(),
            remaining_route: self.remaining_route.clone(),
            complete: self.is_complete(),
        }
    }
}

type FrameOutlet = Arc<Mutex<Option<UnboundedSender<AnimationFrame>>>>;

struct ActiveAnimation {
    lifecycle: u64,
    outlet: FrameOutlet,
    task: JoinHandle<()>,
}

/// Plays one route at a time. Every `start` opens a new lifecycle and every
/// emitted frame carries its lifecycle id.
pub struct AnimationDriver {
    tick_interval: Duration,
    next_lifecycle: u64,
    active: Option<ActiveAnimation>,
}

impl AnimationDriver {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tick_interval: tick_interval.max(MIN_TICK_INTERVAL),
            next_lifecycle: 0,
            active: None,
        }
    }

    /// Must be called inside a tokio runtime.
    pub fn start(
        &mut self,
        route: Route,
        duration: Duration,
        frames: UnboundedSender<AnimationFrame>,
    ) -> u64 {
        self.stop();

        self.next_lifecycle += 1;
        let lifecycle = self.next_lifecycle;
        let outlet: FrameOutlet = Arc::new(Mutex::new(Some(frames)));
        debug!(
            "animation: start lifecycle={lifecycle} points={} duration_ms={}",
            route.len(),
            duration.as_millis()
        );
        let task = tokio::spawn(run_animation(
            lifecycle,
            route,
            duration,
            self.tick_interval,
            Arc::clone(&outlet),
        ));

        self.active = Some(ActiveAnimation {
            lifecycle,
            outlet,
            task,
        });
        lifecycle
    }

    /// Returns whether a lifecycle was active. Once this returns no frame of
    /// that lifecycle is sent anymore.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active
            .outlet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        active.task.abort();
        debug!("animation: stop lifecycle={}", active.lifecycle);
        true
    }

    /// Lifecycle of the current run, also after it completed, until `stop`.
    pub fn lifecycle(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.lifecycle)
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl Drop for AnimationDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_animation(
    lifecycle: u64,
    route: Route,
    duration: Duration,
    tick_interval: Duration,
    outlet: FrameOutlet,
) {
    let mut state = AnimationState::new(route, duration, Instant::now());
    let mut ticks = time::interval(tick_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;
        state.advance(Instant::now());
        let frame = state.frame(lifecycle);
        let complete = frame.complete;

        {
            let outlet = outlet.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(sender) = outlet.as_ref() else {
                return;
            };
            if sender.send(frame).is_err() {
                return;
            }
        }

        if complete {
            debug!("animation: complete lifecycle={lifecycle}");
            return;
        }
    }
}

#[cfg(test)]
#[path = "tests/animation_tests.rs"]
mod tests;
