use std::collections::BTreeMap;

use map_surface::{MapSurface, MarkerHandle, PolylineHandle};
use shared::domain::GeoPoint;

use crate::presentation::{LayerSet, LayerSlot, LayerSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum LayerChange {
    Remove(LayerSlot),
    Add(LayerSlot, LayerSpec),
}

/// Changes turning `drawn` into `desired`. All removals come before adds.
pub fn diff(drawn: &LayerSet, desired: &LayerSet) -> Vec<LayerChange> {
    let mut removals = Vec::new();
    let mut adds = Vec::new();

    for (slot, spec) in drawn.iter() {
        if desired.get(*slot) != Some(spec) {
            removals.push(LayerChange::Remove(*slot));
        }
    }
    for (slot, spec) in desired.iter() {
        if drawn.get(*slot) != Some(spec) {
            adds.push(LayerChange::Add(*slot, spec.clone()));
        }
    }

    removals.extend(adds);
    removals
}

#[derive(Debug, Clone, Copy)]
enum DrawnHandle {
    Marker(MarkerHandle),
    Polyline(PolylineHandle),
}

/// Owns the map surface and the handles of everything currently drawn on it.
pub struct LayerRenderer<M: MapSurface> {
    surface: M,
    drawn: LayerSet,
    handles: BTreeMap<LayerSlot, DrawnHandle>,
}

impl<M: MapSurface> LayerRenderer<M> {
    pub fn new(surface: M) -> Self {
        Self {
            surface,
            drawn: LayerSet::new(),
            handles: BTreeMap::new(),
        }
    }

    pub fn drawn(&self) -> &LayerSet {
        &self.drawn
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn into_surface(mut self) -> M {
        self.clear();
        self.surface
    }

    /// Returns the applied changes.
    pub fn apply(&mut self, desired: LayerSet) -> Vec<LayerChange> {
        let changes = diff(&self.drawn, &desired);
        for change in &changes {
            match change {
                LayerChange::Remove(slot) => self.remove(*slot),
                LayerChange::Add(slot, spec) => self.add(*slot, spec),
            }
        }
        self.drawn = desired;
        changes
    }

    pub fn clear(&mut self) {
        self.apply(LayerSet::new());
    }

    pub fn set_view(&mut self, center: &GeoPoint, zoom: u8) {
        self.surface.set_view(center, zoom);
    }

    pub fn fit_bounds(&mut self, points: &[GeoPoint], padding: u32) {
        if points.len() >= 2 {
            self.surface.fit_bounds(points, padding);
        }
    }

    fn add(&mut self, slot: LayerSlot, spec: &LayerSpec) {
        let handle = match spec {
            LayerSpec::Marker { point, icon } => {
                DrawnHandle::Marker(self.surface.create_marker(point, *icon))
            }
            LayerSpec::Polyline { points, style } => {
                DrawnHandle::Polyline(self.surface.create_polyline(points, style))
            }
        };
        self.handles.insert(slot, handle);
    }

    fn remove(&mut self, slot: LayerSlot) {
        match self.handles.remove(&slot) {
            Some(DrawnHandle::Marker(handle)) => self.surface.remove_marker(handle),
            Some(DrawnHandle::Polyline(handle)) => self.surface.remove_polyline(handle),
            None => {}
        }
    }
}
