use std::collections::{BTreeMap, BTreeSet};

use foundation::{LngLat, LngLatBounds};
use serde_json::Value;

use crate::error::MapError;
use crate::handle::MapHandle;
use crate::model::{Basemap, CameraState, LayerDef, SourceDef, SourceSet};
use crate::ops::StyleOp;

/// In-memory map that records every call and keeps observable state.
///
/// It enforces the same preconditions a MapLibre map does: no duplicate ids,
/// layers need an existing source, sources in use cannot be removed.
#[derive(Debug, Default)]
pub struct MemoryMap {
    style: Option<Basemap>,
    sources: SourceSet,
    // Live order, bottom first, with current paint/layout/filter/zoom range.
    layers: Vec<LayerDef>,
    camera: CameraState,
    hover: BTreeSet<String>,
    click: BTreeSet<String>,
    calls: Vec<StyleOp>,
    removed: bool,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(camera: CameraState) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    pub fn style(&self) -> Option<&Basemap> {
        self.style.as_ref()
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn layers(&self) -> &[LayerDef] {
        &self.layers
    }

    pub fn layer(&self, id: &str) -> Option<&LayerDef> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn hover_layers(&self) -> Vec<&str> {
        self.hover.iter().map(String::as_str).collect()
    }

    pub fn click_layers(&self) -> Vec<&str> {
        self.click.iter().map(String::as_str).collect()
    }

    /// Calls received since construction or the last [`MemoryMap::take_calls`].
    pub fn calls(&self) -> &[StyleOp] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<StyleOp> {
        std::mem::take(&mut self.calls)
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Drops a layer without going through the handle, as if the map lost it.
    pub fn force_remove_layer(&mut self, id: &str) {
        self.layers.retain(|l| l.id != id);
        self.hover.remove(id);
        self.click.remove(id);
    }

    fn record(&mut self, op: StyleOp) -> Result<(), MapError> {
        self.calls.push(op);
        if self.removed {
            return Err(MapError::Removed);
        }
        Ok(())
    }

    fn index_of(&self, id: &str) -> Result<usize, MapError> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| MapError::LayerNotFound(id.to_string()))
    }

    fn layer_mut(&mut self, id: &str) -> Result<&mut LayerDef, MapError> {
        let i = self.index_of(id)?;
        Ok(&mut self.layers[i])
    }

    fn insert_index(&self, before: Option<&str>) -> Result<usize, MapError> {
        match before {
            Some(b) => self.index_of(b),
            None => Ok(self.layers.len()),
        }
    }
}

fn set_or_reset(map: &mut BTreeMap<String, Value>, name: &str, value: Option<&Value>) {
    match value {
        Some(v) => {
            map.insert(name.to_string(), v.clone());
        }
        None => {
            map.remove(name);
        }
    }
}

impl MapHandle for MemoryMap {
    fn set_style(&mut self, basemap: &Basemap) -> Result<(), MapError> {
        self.record(StyleOp::SetStyle {
            basemap: basemap.clone(),
        })?;
        self.style = Some(basemap.clone());
        self.sources = SourceSet::new();
        self.layers.clear();
        self.hover.clear();
        self.click.clear();
        Ok(())
    }

    fn add_source(&mut self, id: &str, source: &SourceDef) -> Result<(), MapError> {
        self.record(StyleOp::AddSource {
            id: id.to_string(),
            source: source.clone(),
        })?;
        if self.sources.contains(id) {
            return Err(MapError::SourceExists(id.to_string()));
        }
        self.sources.insert(id, source.clone());
        Ok(())
    }

    fn update_source(&mut self, id: &str, source: &SourceDef) -> Result<(), MapError> {
        self.record(StyleOp::UpdateSource {
            id: id.to_string(),
            source: source.clone(),
        })?;
        if !self.sources.contains(id) {
            return Err(MapError::SourceNotFound(id.to_string()));
        }
        self.sources.insert(id, source.clone());
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        self.record(StyleOp::RemoveSource { id: id.to_string() })?;
        if let Some(user) = self.layers.iter().find(|l| l.source.as_deref() == Some(id)) {
            return Err(MapError::SourceInUse {
                source_id: id.to_string(),
                layer: user.id.clone(),
            });
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MapError::SourceNotFound(id.to_string()))
    }

    fn add_layer(&mut self, layer: &LayerDef, before: Option<&str>) -> Result<(), MapError> {
        self.record(StyleOp::AddLayer {
            layer: layer.clone(),
            before: before.map(str::to_string),
        })?;
        if self.index_of(&layer.id).is_ok() {
            return Err(MapError::LayerExists(layer.id.clone()));
        }
        if let Some(src) = &layer.source
            && !self.sources.contains(src)
        {
            return Err(MapError::SourceNotFound(src.clone()));
        }
        let at = self.insert_index(before)?;
        self.layers.insert(at, layer.clone());
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), MapError> {
        self.record(StyleOp::MoveLayer {
            id: id.to_string(),
            before: before.map(str::to_string),
        })?;
        let from = self.index_of(id)?;
        if before == Some(id) {
            return Ok(());
        }
        if let Some(b) = before {
            self.index_of(b)?;
        }
        let layer = self.layers.remove(from);
        let at = self.insert_index(before)?;
        self.layers.insert(at, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        self.record(StyleOp::RemoveLayer { id: id.to_string() })?;
        let i = self.index_of(id)?;
        self.layers.remove(i);
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), MapError> {
        self.record(StyleOp::SetPaintProperty {
            layer: layer.to_string(),
            name: name.to_string(),
            value: value.cloned(),
        })?;
        set_or_reset(&mut self.layer_mut(layer)?.paint, name, value);
        Ok(())
    }

    fn set_layout_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), MapError> {
        self.record(StyleOp::SetLayoutProperty {
            layer: layer.to_string(),
            name: name.to_string(),
            value: value.cloned(),
        })?;
        set_or_reset(&mut self.layer_mut(layer)?.layout, name, value);
        Ok(())
    }

    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<(), MapError> {
        self.record(StyleOp::SetFilter {
            layer: layer.to_string(),
            filter: filter.cloned(),
        })?;
        self.layer_mut(layer)?.filter = filter.cloned();
        Ok(())
    }

    fn set_zoom_range(
        &mut self,
        layer: &str,
        minzoom: Option<f64>,
        maxzoom: Option<f64>,
    ) -> Result<(), MapError> {
        self.record(StyleOp::SetZoomRange {
            layer: layer.to_string(),
            minzoom,
            maxzoom,
        })?;
        let l = self.layer_mut(layer)?;
        l.minzoom = minzoom;
        l.maxzoom = maxzoom;
        Ok(())
    }

    fn bind_hover(&mut self, layer: &str) -> Result<(), MapError> {
        self.record(StyleOp::BindHover {
            layer: layer.to_string(),
        })?;
        self.index_of(layer)?;
        self.hover.insert(layer.to_string());
        Ok(())
    }

    fn unbind_hover(&mut self, layer: &str) -> Result<(), MapError> {
        self.record(StyleOp::UnbindHover {
            layer: layer.to_string(),
        })?;
        self.hover.remove(layer);
        Ok(())
    }

    fn bind_click(&mut self, layer: &str) -> Result<(), MapError> {
        self.record(StyleOp::BindClick {
            layer: layer.to_string(),
        })?;
        self.index_of(layer)?;
        self.click.insert(layer.to_string());
        Ok(())
    }

    fn unbind_click(&mut self, layer: &str) -> Result<(), MapError> {
        self.record(StyleOp::UnbindClick {
            layer: layer.to_string(),
        })?;
        self.click.remove(layer);
        Ok(())
    }

    fn set_center(&mut self, center: LngLat) -> Result<(), MapError> {
        self.record(StyleOp::SetCenter { center })?;
        self.camera.center = center;
        Ok(())
    }

    fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError> {
        self.record(StyleOp::SetZoom { zoom })?;
        self.camera.zoom = zoom;
        Ok(())
    }

    fn set_bearing(&mut self, bearing: f64) -> Result<(), MapError> {
        self.record(StyleOp::SetBearing { bearing })?;
        self.camera.bearing = bearing;
        Ok(())
    }

    fn set_pitch(&mut self, pitch: f64) -> Result<(), MapError> {
        self.record(StyleOp::SetPitch { pitch })?;
        self.camera.pitch = pitch;
        Ok(())
    }

    fn set_max_bounds(&mut self, bounds: Option<LngLatBounds>) -> Result<(), MapError> {
        self.record(StyleOp::SetMaxBounds { bounds })?;
        self.camera.max_bounds = bounds;
        Ok(())
    }

    fn fly_to(
        &mut self,
        center: LngLat,
        zoom: f64,
        bearing: f64,
        pitch: f64,
    ) -> Result<(), MapError> {
        self.record(StyleOp::FlyTo {
            center,
            zoom,
            bearing,
            pitch,
        })?;
        self.camera.center = center;
        self.camera.zoom = zoom;
        self.camera.bearing = bearing;
        self.camera.pitch = pitch;
        Ok(())
    }

    fn remove(&mut self) {
        self.removed = true;
        self.sources = SourceSet::new();
        self.layers.clear();
        self.hover.clear();
        self.click.clear();
    }
}
