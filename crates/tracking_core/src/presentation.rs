//! Pure projection from the delivery phase and animation output to the map
//! layers that should be visible. Nothing here touches a map surface.

use std::collections::{btree_map, BTreeMap};

use map_surface::{MarkerIcon, PolylineStyle};
use shared::domain::{DeliveryPhase, GeoPoint, Route, RouteKind, RouteTarget, TrackingInput};

use crate::animation::AnimationFrame;

/// A route together with the endpoints it was resolved for. Provider routes
/// snap to the road network, so the endpoints are kept separately.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRoute {
    pub target: RouteTarget,
    pub route: Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerSlot {
    RouteLine,
    CurrentMarker,
    DestinationMarker,
    AnimatedMarker,
    ArrivedMarker,
    ReturnedMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpec {
    Marker {
        point: GeoPoint,
        icon: MarkerIcon,
    },
    Polyline {
        points: Vec<GeoPoint>,
        style: PolylineStyle,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSet {
    layers: BTreeMap<LayerSlot, LayerSpec>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: LayerSlot, spec: LayerSpec) {
        self.layers.insert(slot, spec);
    }

    pub fn get(&self, slot: LayerSlot) -> Option<&LayerSpec> {
        self.layers.get(&slot)
    }

    pub fn slots(&self) -> Vec<LayerSlot> {
        self.layers.keys().copied().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, LayerSlot, LayerSpec> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn marker(&mut self, slot: LayerSlot, point: &GeoPoint, icon: MarkerIcon) {
        self.insert(
            slot,
            LayerSpec::Marker {
                point: point.clone(),
                icon,
            },
        );
    }

    fn polyline(&mut self, points: Vec<GeoPoint>, kind: RouteKind) {
        let style = match kind {
            RouteKind::Resolved => PolylineStyle::route(),
            RouteKind::StraightLine => PolylineStyle::straight_line(),
        };
        self.insert(LayerSlot::RouteLine, LayerSpec::Polyline { points, style });
    }
}

pub fn project(
    input: &TrackingInput,
    route: Option<&TrackedRoute>,
    frame: Option<&AnimationFrame>,
) -> LayerSet {
    let mut layers = LayerSet::new();

    match input.phase {
        DeliveryPhase::Idle => {
            if let Some(origin) = input.valid_origin() {
                layers.marker(LayerSlot::CurrentMarker, origin, MarkerIcon::Vehicle);
            }
            if let Some(destination) = input.valid_destination() {
                layers.marker(LayerSlot::DestinationMarker, destination, MarkerIcon::Pin);
            }
            if let Some(target) = input
                .target()
                .filter(|target| !target.origin.approx_eq(&target.destination))
            {
                match route.filter(|tracked| tracked.target.approx_eq(&target)) {
                    Some(tracked) => {
                        layers.polyline(tracked.route.points().to_vec(), tracked.route.kind())
                    }
                    None => {
                        let line = target.straight_line();
                        layers.polyline(line.points().to_vec(), RouteKind::StraightLine);
                    }
                }
            }
        }
        DeliveryPhase::InTransit => {
            if let Some(frame) = frame {
                layers.marker(
                    LayerSlot::AnimatedMarker,
                    &frame.position,
                    MarkerIcon::VehicleInMotion,
                );
                if frame.remaining_route.len() >= 2 {
                    let kind = route
                        .map(|tracked| tracked.route.kind())
                        .unwrap_or(RouteKind::StraightLine);
                    layers.polyline(frame.remaining_route.clone(), kind);
                }
            }
        }
        DeliveryPhase::Delivered => {
            if let Some(destination) = input.valid_destination() {
                layers.marker(LayerSlot::ArrivedMarker, destination, MarkerIcon::Arrived);
            }
        }
        DeliveryPhase::Returned => {
            let location = input
                .original_location
                .as_ref()
                .filter(|point| point.is_valid())
                .or(input.valid_origin());
            if let Some(location) = location {
                layers.marker(LayerSlot::ReturnedMarker, location, MarkerIcon::Returned);
            }
        }
    }

    layers
}

#[cfg(test)]
#[path = "tests/presentation_tests.rs"]
mod tests;
