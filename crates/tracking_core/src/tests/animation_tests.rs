use super::*;

use tokio::sync::mpsc;

fn line(points: usize) -> Route {
    let from = GeoPoint::new(27.7172, 85.3240);
    let to = GeoPoint::new(27.7200, 85.3300);
    Route::new(
        (0..points)
            .map(|i| from.lerp(&to, i as f64 / (points - 1) as f64))
            .collect(),
    )
    .expect("route")
}

#[test]
fn progress_is_clamped_to_unit_interval() {
    let duration = Duration::from_millis(30_000);
    assert_eq!(progress_at(Duration::ZERO, duration), 0.0);
    assert_eq!(progress_at(Duration::from_millis(15_000), duration), 0.5);
    assert_eq!(progress_at(Duration::from_millis(90_000), duration), 1.0);
    assert_eq!(progress_at(Duration::from_millis(5), Duration::ZERO), 1.0);
}

#[test]
fn half_way_through_fifty_points_leaves_twenty_five() {
    let route = line(50);
    let mut state = AnimationState::new(route, Duration::from_millis(30_000), Instant::now());

    state.sample(Duration::from_millis(15_000));

    assert_eq!(state.progress, 0.5);
    assert_eq!(state.remaining_route.len(), 25);
}

#[test]
fn interpolates_between_bracket_points() {
    let route = Route::new(vec![
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(1.0, 2.0),
        GeoPoint::new(2.0, 2.0),
    ])
    .expect("route");

    assert_eq!(interpolate_position(&route, 0.0), GeoPoint::new(0.0, 0.0));
    assert_eq!(interpolate_position(&route, 0.25), GeoPoint::new(0.5, 1.0));
    assert_eq!(interpolate_position(&route, 0.5), GeoPoint::new(1.0, 2.0));
    assert_eq!(interpolate_position(&route, 0.75), GeoPoint::new(1.5, 2.0));
}

#[test]
fn final_progress_snaps_to_last_point() {
    let route = Route::new(vec![
        GeoPoint::labeled(27.7172, 85.3240, "depot"),
        GeoPoint::new(27.7181, 85.3263),
        GeoPoint::labeled(27.7200, 85.3300, "customer"),
    ])
    .expect("route");

    assert_eq!(interpolate_position(&route, 1.0), route.last().clone());
    assert_eq!(interpolate_position(&route, 7.0), route.last().clone());
}

#[test]
fn remaining_route_shrinks_and_empties() {
    let route = line(10);
    let mut previous = usize::MAX;
    for step in 0..=100 {
        let remaining = remaining_route(&route, step as f64 / 100.0).len();
        assert!(remaining <= previous, "grew at step {step}");
        assert!(remaining == 0 || remaining >= 2);
        previous = remaining;
    }
    assert!(remaining_route(&route, 0.95).is_empty());
    assert!(remaining_route(&route, 1.0).is_empty());
    assert_eq!(remaining_route(&route, 0.0).len(), 10);
}

#[test]
fn sampled_progress_never_decreases() {
    let mut state = AnimationState::new(line(20), Duration::from_secs(10), Instant::now());
    let mut last = 0.0;
    for elapsed_ms in [0, 1_500, 900, 4_000, 3_999, 12_000, 2_000] {
        state.sample(Duration::from_millis(elapsed_ms));
        assert!(state.progress >= last);
        assert!((0.0..=1.0).contains(&state.progress));
        last = state.progress;
    }
    assert!(state.is_complete());
}

#[tokio::test(start_paused = true)]
async fn driver_completes_once_at_final_point() {
    let route = line(12);
    let last = route.last().clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut driver = AnimationDriver::new(Duration::from_millis(100));

    let lifecycle = driver.start(route, Duration::from_secs(2), tx);

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        let done = frame.complete;
        frames.push(frame);
        if done {
            break;
        }
    }

    let completed: Vec<_> = frames.iter().filter(|frame| frame.complete).collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].position, last);
    assert!(completed[0].remaining_route.is_empty());
    assert!(frames.iter().all(|frame| frame.lifecycle == lifecycle));
    assert!(frames
        .windows(2)
        .all(|pair| pair[0].progress <= pair[1].progress));

    time::sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
    assert!(!driver.is_running());
    assert_eq!(driver.lifecycle(), Some(lifecycle));
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_silences_frames() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut driver = AnimationDriver::new(Duration::from_millis(50));

    assert!(!driver.stop());
    driver.start(line(8), Duration::from_secs(10), tx);
    let first = rx.recv().await.expect("first frame");
    assert_eq!(first.progress, 0.0);

    assert!(driver.stop());
    assert!(!driver.stop());
    assert!(!driver.stop());
    while rx.try_recv().is_ok() {}

    time::sleep(Duration::from_secs(3)).await;
    assert!(rx.recv().await.is_none());
    assert_eq!(driver.lifecycle(), None);
}

#[tokio::test(start_paused = true)]
async fn restarting_stops_the_previous_lifecycle() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut driver = AnimationDriver::new(Duration::from_millis(50));

    let first = driver.start(line(8), Duration::from_secs(10), tx.clone());
    rx.recv().await.expect("frame");
    let second = driver.start(line(4), Duration::from_secs(1), tx);
    assert!(second > first);

    time::sleep(Duration::from_millis(200)).await;
    let mut seen_second = false;
    while let Ok(frame) = rx.try_recv() {
        if frame.lifecycle == second {
            seen_second = true;
        } else {
            assert!(!seen_second, "old lifecycle emitted after restart");
        }
    }
    assert!(seen_second);
}

#[tokio::test(start_paused = true)]
async fn zero_duration_completes_on_first_tick() {
    let route = line(3);
    let last = route.last().clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut driver = AnimationDriver::default();

    driver.start(route, Duration::ZERO, tx);
    let frame = rx.recv().await.expect("frame");

    assert!(frame.complete);
    assert_eq!(frame.progress, 1.0);
    assert_eq!(frame.position, last);
}
