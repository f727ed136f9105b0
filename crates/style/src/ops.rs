use std::fmt;

use foundation::{LngLat, LngLatBounds};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Basemap, LayerDef, SourceDef};

/// One call against the live map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StyleOp {
    SetStyle {
        basemap: Basemap,
    },
    AddSource {
        id: String,
        source: SourceDef,
    },
    /// Replace a source's data in place, keeping renderer-side caches.
    UpdateSource {
        id: String,
        source: SourceDef,
    },
    RemoveSource {
        id: String,
    },
    /// Insert below `before`, or on top when `None`.
    AddLayer {
        layer: LayerDef,
        before: Option<String>,
    },
    MoveLayer {
        id: String,
        before: Option<String>,
    },
    RemoveLayer {
        id: String,
    },
    /// `value: None` resets the property to its style default.
    SetPaintProperty {
        layer: String,
        name: String,
        value: Option<Value>,
    },
    SetLayoutProperty {
        layer: String,
        name: String,
        value: Option<Value>,
    },
    SetFilter {
        layer: String,
        filter: Option<Value>,
    },
    SetZoomRange {
        layer: String,
        minzoom: Option<f64>,
        maxzoom: Option<f64>,
    },
    BindHover {
        layer: String,
    },
    UnbindHover {
        layer: String,
    },
    BindClick {
        layer: String,
    },
    UnbindClick {
        layer: String,
    },
    SetCenter {
        center: LngLat,
    },
    SetZoom {
        zoom: f64,
    },
    SetBearing {
        bearing: f64,
    },
    SetPitch {
        pitch: f64,
    },
    SetMaxBounds {
        bounds: Option<LngLatBounds>,
    },
    FlyTo {
        center: LngLat,
        zoom: f64,
        bearing: f64,
        pitch: f64,
    },
}

impl StyleOp {
    pub fn kind(&self) -> &'static str {
        match self {
            StyleOp::SetStyle { .. } => "set_style",
            StyleOp::AddSource { .. } => "add_source",
            StyleOp::UpdateSource { .. } => "update_source",
            StyleOp::RemoveSource { .. } => "remove_source",
            StyleOp::AddLayer { .. } => "add_layer",
            StyleOp::MoveLayer { .. } => "move_layer",
            StyleOp::RemoveLayer { .. } => "remove_layer",
            StyleOp::SetPaintProperty { .. } => "set_paint_property",
            StyleOp::SetLayoutProperty { .. } => "set_layout_property",
            StyleOp::SetFilter { .. } => "set_filter",
            StyleOp::SetZoomRange { .. } => "set_zoom_range",
            StyleOp::BindHover { .. } => "bind_hover",
            StyleOp::UnbindHover { .. } => "unbind_hover",
            StyleOp::BindClick { .. } => "bind_click",
            StyleOp::UnbindClick { .. } => "unbind_click",
            StyleOp::SetCenter { .. } => "set_center",
            StyleOp::SetZoom { .. } => "set_zoom",
            StyleOp::SetBearing { .. } => "set_bearing",
            StyleOp::SetPitch { .. } => "set_pitch",
            StyleOp::SetMaxBounds { .. } => "set_max_bounds",
            StyleOp::FlyTo { .. } => "fly_to",
        }
    }

    pub fn is_source_op(&self) -> bool {
        matches!(
            self,
            StyleOp::AddSource { .. } | StyleOp::UpdateSource { .. } | StyleOp::RemoveSource { .. }
        )
    }

    /// Adds, moves and removals of layers.
    pub fn is_layer_structure_op(&self) -> bool {
        matches!(
            self,
            StyleOp::AddLayer { .. } | StyleOp::MoveLayer { .. } | StyleOp::RemoveLayer { .. }
        )
    }
}

fn opt_id(before: &Option<String>) -> &str {
    before.as_deref().unwrap_or("<top>")
}

fn opt_json(v: &Option<Value>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "<default>".to_string(),
    }
}

impl fmt::Display for StyleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleOp::SetStyle { basemap } => match basemap {
                Basemap::Url(url) => write!(f, "set_style {url}"),
                Basemap::Inline(_) => write!(f, "set_style <inline>"),
            },
            StyleOp::AddSource { id, source } => write!(f, "add_source {id} ({})", source.kind),
            StyleOp::UpdateSource { id, source } => {
                write!(f, "update_source {id} ({})", source.kind)
            }
            StyleOp::RemoveSource { id } => write!(f, "remove_source {id}"),
            StyleOp::AddLayer { layer, before } => {
                write!(f, "add_layer {} before {}", layer.id, opt_id(before))
            }
            StyleOp::MoveLayer { id, before } => write!(f, "move_layer {id} before {}", opt_id(before)),
            StyleOp::RemoveLayer { id } => write!(f, "remove_layer {id}"),
            StyleOp::SetPaintProperty { layer, name, value } => {
                write!(f, "set_paint_property {layer} {name} = {}", opt_json(value))
            }
            StyleOp::SetLayoutProperty { layer, name, value } => {
                write!(f, "set_layout_property {layer} {name} = {}", opt_json(value))
            }
            StyleOp::SetFilter { layer, filter } => {
                write!(f, "set_filter {layer} = {}", opt_json(filter))
            }
            StyleOp::SetZoomRange {
                layer,
                minzoom,
                maxzoom,
            } => write!(f, "set_zoom_range {layer} {minzoom:?}..{maxzoom:?}"),
            StyleOp::BindHover { layer } => write!(f, "bind_hover {layer}"),
            StyleOp::UnbindHover { layer } => write!(f, "unbind_hover {layer}"),
            StyleOp::BindClick { layer } => write!(f, "bind_click {layer}"),
            StyleOp::UnbindClick { layer } => write!(f, "unbind_click {layer}"),
            StyleOp::SetCenter { center } => write!(f, "set_center [{}, {}]", center.lng, center.lat),
            StyleOp::SetZoom { zoom } => write!(f, "set_zoom {zoom}"),
            StyleOp::SetBearing { bearing } => write!(f, "set_bearing {bearing}"),
            StyleOp::SetPitch { pitch } => write!(f, "set_pitch {pitch}"),
            StyleOp::SetMaxBounds { bounds } => match bounds {
                Some(b) => write!(
                    f,
                    "set_max_bounds [[{}, {}], [{}, {}]]",
                    b.sw.lng, b.sw.lat, b.ne.lng, b.ne.lat
                ),
                None => write!(f, "set_max_bounds <none>"),
            },
            StyleOp::FlyTo {
                center,
                zoom,
                bearing,
                pitch,
            } => write!(
                f,
                "fly_to [{}, {}] zoom {zoom} bearing {bearing} pitch {pitch}",
                center.lng, center.lat
            ),
        }
    }
}
