use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::domain::GeoPoint;
use tracing::info;

macro_rules! handle_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

handle_newtype!(MarkerHandle);
handle_newtype!(PolylineHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerIcon {
    /// Parked vehicle at its current position.
    Vehicle,
    /// Destination pin.
    Pin,
    /// Vehicle moving along the route.
    VehicleInMotion,
    Arrived,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineStyle {
    pub color: String,
    pub weight: f32,
    pub opacity: f32,
    pub dashed: bool,
}

impl PolylineStyle {
    pub fn route() -> Self {
        Self {
            color: "#2563eb".into(),
            weight: 5.0,
            opacity: 0.8,
            dashed: false,
        }
    }

    pub fn straight_line() -> Self {
        Self {
            color: "#64748b".into(),
            weight: 3.0,
            opacity: 0.7,
            dashed: true,
        }
    }
}

/// Drawing capability the tracking engine issues commands to. All calls come
/// from the single session loop that owns the surface.
pub trait MapSurface {
    fn create_marker(&mut self, point: &GeoPoint, icon: MarkerIcon) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn create_polyline(&mut self, points: &[GeoPoint], style: &PolylineStyle) -> PolylineHandle;
    fn remove_polyline(&mut self, handle: PolylineHandle);
    fn set_view(&mut self, center: &GeoPoint, zoom: u8);
    fn fit_bounds(&mut self, points: &[GeoPoint], padding: u32);
}

impl<T: MapSurface + ?Sized> MapSurface for Box<T> {
    fn create_marker(&mut self, point: &GeoPoint, icon: MarkerIcon) -> MarkerHandle {
        (**self).create_marker(point, icon)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        (**self).remove_marker(handle)
    }

    fn create_polyline(&mut self, points: &[GeoPoint], style: &PolylineStyle) -> PolylineHandle {
        (**self).create_polyline(points, style)
    }

    fn remove_polyline(&mut self, handle: PolylineHandle) {
        (**self).remove_polyline(handle)
    }

    fn set_view(&mut self, center: &GeoPoint, zoom: u8) {
        (**self).set_view(center, zoom)
    }

    fn fit_bounds(&mut self, points: &[GeoPoint], padding: u32) {
        (**self).fit_bounds(points, padding)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    CreateMarker {
        handle: MarkerHandle,
        point: GeoPoint,
        icon: MarkerIcon,
    },
    RemoveMarker(MarkerHandle),
    CreatePolyline {
        handle: PolylineHandle,
        points: Vec<GeoPoint>,
        style: PolylineStyle,
    },
    RemovePolyline(PolylineHandle),
    SetView {
        center: GeoPoint,
        zoom: u8,
    },
    FitBounds {
        points: Vec<GeoPoint>,
        padding: u32,
    },
}

/// In-memory surface that keeps a command log and the set of live layers.
#[derive(Debug, Default)]
pub struct RecordingMapSurface {
    next_handle: u64,
    commands: Vec<MapCommand>,
    markers: BTreeMap<MarkerHandle, (GeoPoint, MarkerIcon)>,
    polylines: BTreeMap<PolylineHandle, Vec<GeoPoint>>,
}

impl RecordingMapSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[MapCommand] {
        &self.commands
    }

    pub fn live_markers(&self) -> Vec<(GeoPoint, MarkerIcon)> {
        self.markers.values().cloned().collect()
    }

    pub fn live_polylines(&self) -> Vec<Vec<GeoPoint>> {
        self.polylines.values().cloned().collect()
    }

    pub fn markers_with_icon(&self, icon: MarkerIcon) -> Vec<GeoPoint> {
        self.markers
            .values()
            .filter(|(_, marker_icon)| *marker_icon == icon)
            .map(|(point, _)| point.clone())
            .collect()
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapSurface for RecordingMapSurface {
    fn create_marker(&mut self, point: &GeoPoint, icon: MarkerIcon) -> MarkerHandle {
        let handle = MarkerHandle(self.allocate());
        self.markers.insert(handle, (point.clone(), icon));
        self.commands.push(MapCommand::CreateMarker {
            handle,
            point: point.clone(),
            icon,
        });
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.markers.remove(&handle);
        self.commands.push(MapCommand::RemoveMarker(handle));
    }

    fn create_polyline(&mut self, points: &[GeoPoint], style: &PolylineStyle) -> PolylineHandle {
        let handle = PolylineHandle(self.allocate());
        self.polylines.insert(handle, points.to_vec());
        self.commands.push(MapCommand::CreatePolyline {
            handle,
            points: points.to_vec(),
            style: style.clone(),
        });
        handle
    }

    fn remove_polyline(&mut self, handle: PolylineHandle) {
        self.polylines.remove(&handle);
        self.commands.push(MapCommand::RemovePolyline(handle));
    }

    fn set_view(&mut self, center: &GeoPoint, zoom: u8) {
        self.commands.push(MapCommand::SetView {
            center: center.clone(),
            zoom,
        });
    }

    fn fit_bounds(&mut self, points: &[GeoPoint], padding: u32) {
        self.commands.push(MapCommand::FitBounds {
            points: points.to_vec(),
            padding,
        });
    }
}

/// Surface that only logs what it would draw. Used by the CLI.
#[derive(Debug, Default)]
pub struct TracingMapSurface {
    next_handle: u64,
}

impl TracingMapSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapSurface for TracingMapSurface {
    fn create_marker(&mut self, point: &GeoPoint, icon: MarkerIcon) -> MarkerHandle {
        self.next_handle += 1;
        info!("map: create_marker handle={} icon={icon:?} at={point}", self.next_handle);
        MarkerHandle(self.next_handle)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        info!("map: remove_marker handle={}", handle.0);
    }

    fn create_polyline(&mut self, points: &[GeoPoint], style: &PolylineStyle) -> PolylineHandle {
        self.next_handle += 1;
        info!(
            "map: create_polyline handle={} points={} dashed={}",
            self.next_handle,
            points.len(),
            style.dashed
        );
        PolylineHandle(self.next_handle)
    }

    fn remove_polyline(&mut self, handle: PolylineHandle) {
        info!("map: remove_polyline handle={}", handle.0);
    }

    fn set_view(&mut self, center: &GeoPoint, zoom: u8) {
        info!("map: set_view center={center} zoom={zoom}");
    }

    fn fit_bounds(&mut self, points: &[GeoPoint], padding: u32) {
        info!("map: fit_bounds points={} padding={padding}", points.len());
    }
}
