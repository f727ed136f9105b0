use foundation::{LngLat, LngLatBounds};
use serde_json::Value;

use crate::error::MapError;
use crate::model::{Basemap, LayerDef, SourceDef};
use crate::ops::StyleOp;

/// A live map instance.
///
/// One method per map call. Implementations are not re-entrant: the caller
/// applies one update to completion before starting the next.
pub trait MapHandle {
    /// Replaces the whole style. User sources and layers are discarded.
    fn set_style(&mut self, basemap: &Basemap) -> Result<(), MapError>;

    fn add_source(&mut self, id: &str, source: &SourceDef) -> Result<(), MapError>;
    /// Replaces a source's data without removing it.
    fn update_source(&mut self, id: &str, source: &SourceDef) -> Result<(), MapError>;
    fn remove_source(&mut self, id: &str) -> Result<(), MapError>;

    fn add_layer(&mut self, layer: &LayerDef, before: Option<&str>) -> Result<(), MapError>;
    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), MapError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), MapError>;

    fn set_paint_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), MapError>;
    fn set_layout_property(
        &mut self,
        layer: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), MapError>;
    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<(), MapError>;
    fn set_zoom_range(
        &mut self,
        layer: &str,
        minzoom: Option<f64>,
        maxzoom: Option<f64>,
    ) -> Result<(), MapError>;

    /// Starts reporting pointer-move hits on `layer`.
    fn bind_hover(&mut self, layer: &str) -> Result<(), MapError>;
    fn unbind_hover(&mut self, layer: &str) -> Result<(), MapError>;
    fn bind_click(&mut self, layer: &str) -> Result<(), MapError>;
    fn unbind_click(&mut self, layer: &str) -> Result<(), MapError>;

    fn set_center(&mut self, center: LngLat) -> Result<(), MapError>;
    fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError>;
    fn set_bearing(&mut self, bearing: f64) -> Result<(), MapError>;
    fn set_pitch(&mut self, pitch: f64) -> Result<(), MapError>;
    fn set_max_bounds(&mut self, bounds: Option<LngLatBounds>) -> Result<(), MapError>;
    fn fly_to(
        &mut self,
        center: LngLat,
        zoom: f64,
        bearing: f64,
        pitch: f64,
    ) -> Result<(), MapError>;

    /// Tears the map down. No calls are valid afterwards.
    fn remove(&mut self);
}

/// Dispatches one op to the matching handle call.
pub fn execute<M: MapHandle + ?Sized>(map: &mut M, op: &StyleOp) -> Result<(), MapError> {
    match op {
        StyleOp::SetStyle { basemap } => map.set_style(basemap),
        StyleOp::AddSource { id, source } => map.add_source(id, source),
        StyleOp::UpdateSource { id, source } => map.update_source(id, source),
        StyleOp::RemoveSource { id } => map.remove_source(id),
        StyleOp::AddLayer { layer, before } => map.add_layer(layer, before.as_deref()),
        StyleOp::MoveLayer { id, before } => map.move_layer(id, before.as_deref()),
        StyleOp::RemoveLayer { id } => map.remove_layer(id),
        StyleOp::SetPaintProperty { layer, name, value } => {
            map.set_paint_property(layer, name, value.as_ref())
        }
        StyleOp::SetLayoutProperty { layer, name, value } => {
            map.set_layout_property(layer, name, value.as_ref())
        }
        StyleOp::SetFilter { layer, filter } => map.set_filter(layer, filter.as_ref()),
        StyleOp::SetZoomRange {
            layer,
            minzoom,
            maxzoom,
        } => map.set_zoom_range(layer, *minzoom, *maxzoom),
        StyleOp::BindHover { layer } => map.bind_hover(layer),
        StyleOp::UnbindHover { layer } => map.unbind_hover(layer),
        StyleOp::BindClick { layer } => map.bind_click(layer),
        StyleOp::UnbindClick { layer } => map.unbind_click(layer),
        StyleOp::SetCenter { center } => map.set_center(*center),
        StyleOp::SetZoom { zoom } => map.set_zoom(*zoom),
        StyleOp::SetBearing { bearing } => map.set_bearing(*bearing),
        StyleOp::SetPitch { pitch } => map.set_pitch(*pitch),
        StyleOp::SetMaxBounds { bounds } => map.set_max_bounds(*bounds),
        StyleOp::FlyTo {
            center,
            zoom,
            bearing,
            pitch,
        } => map.fly_to(*center, *zoom, *bearing, *pitch),
    }
}
