use std::collections::BTreeSet;

use foundation::{LngLat, LngLatBounds};
use hover::ScreenPoint;
use serde::Serialize;
use serde_json::{Value, json};
use style::{Basemap, LayerDef, MapError, MapHandle, SourceDef};
use tracing::debug;
use wasm_bindgen::{JsCast, JsValue};

use crate::js;

/// MapLibre's default `maxzoom` for layers.
const MAX_ZOOM: f64 = 24.0;

/// How a source is refreshed in place.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceUpdate {
    SetData(Value),
    SetTiles(Value),
    SetUrl(String),
    Unsupported,
}

impl SourceUpdate {
    pub fn for_source(source: &SourceDef) -> Self {
        if source.is_geojson() {
            return SourceUpdate::SetData(source.data.clone().unwrap_or(Value::Null));
        }
        if let Some(tiles) = source.extra.get("tiles") {
            return SourceUpdate::SetTiles(tiles.clone());
        }
        match source.extra.get("url") {
            Some(Value::String(url)) => SourceUpdate::SetUrl(url.clone()),
            _ => SourceUpdate::Unsupported,
        }
    }
}

/// A `maplibregl.Map` driven through [`MapHandle`].
///
/// Hover and click bindings are kept here rather than as JS listeners: the
/// page forwards pointer events and clicks, and only bound layers are queried.
pub struct JsMap {
    map: js::Map,
    hover: BTreeSet<String>,
    click: BTreeSet<String>,
}

impl JsMap {
    pub fn new(map: js::Map) -> Self {
        Self {
            map,
            hover: BTreeSet::new(),
            click: BTreeSet::new(),
        }
    }

    pub fn raw(&self) -> &js::Map {
        &self.map
    }

    /// Layers whose features are queried on pointer moves.
    pub fn hover_layers(&self) -> Vec<&str> {
        self.hover.iter().map(String::as_str).collect()
    }

    /// Layers the page should forward clicks for.
    pub fn click_layers(&self) -> Vec<&str> {
        self.click.iter().map(String::as_str).collect()
    }

    /// Screen position of `p`, or NaN when the map cannot project it.
    pub fn project(&self, p: LngLat) -> ScreenPoint {
        let Ok(arg) = to_js(&[p.lng, p.lat]) else {
            return ScreenPoint::new(f64::NAN, f64::NAN);
        };
        let point = self.map.project(&arg);
        let coord = |k: &str| {
            js_sys::Reflect::get(&point, &JsValue::from_str(k))
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::NAN)
        };
        ScreenPoint::new(coord("x"), coord("y"))
    }

    /// Rendered features of `layers` within the box, as JSON.
    pub fn query_rendered_features(
        &self,
        min: ScreenPoint,
        max: ScreenPoint,
        layers: &[&str],
    ) -> Result<Vec<Value>, MapError> {
        let bbox = to_js(&[[min.x, min.y], [max.x, max.y]])?;
        let options = to_js(&json!({ "layers": layers }))?;
        let features = self
            .map
            .query_rendered_features(&bbox, &options)
            .map_err(js_error)?;
        from_js(&features)
    }

    pub fn set_cursor(&self, cursor: &str) {
        let canvas = self.map.get_canvas();
        if let Err(err) = canvas.style().set_property("cursor", cursor) {
            debug!(cursor, error = %js_error(err), "canvas cursor not set");
        }
    }

    fn require_layer(&self, id: &str) -> Result<(), MapError> {
        if self.map.get_layer(id).is_undefined() {
            return Err(MapError::LayerNotFound(id.to_string()));
        }
        Ok(())
    }
}

pub fn js_error(err: JsValue) -> MapError {
    let message = match err.dyn_ref::<js_sys::Error>() {
        Some(e) => String::from(e.message()),
        None => err.as_string().unwrap_or_else(|| format!("{err:?}")),
    };
    MapError::Backend(message)
}

pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, MapError> {
    let text = serde_json::to_string(value).map_err(|e| MapError::Backend(e.to_string()))?;
    js_sys::JSON::parse(&text).map_err(js_error)
}

pub fn from_js<T: serde::de::DeserializeOwned>(value: &JsValue) -> Result<T, MapError> {
    let text: String = js_sys::JSON::stringify(value).map_err(js_error)?.into();
    serde_json::from_str(&text).map_err(|e| MapError::Backend(e.to_string()))
}

fn optional(value: Option<&Value>) -> Result<JsValue, MapError> {
    match value {
        Some(v) => to_js(v),
        None => Ok(JsValue::NULL),
    }
}

fn style_options() -> Value {
    json!({ "diff": false })
}

fn before_arg(before: Option<&str>) -> JsValue {
    before.map(JsValue::from_str).unwrap_or(JsValue::UNDEFINED)
}

impl MapHandle for JsMap {
    fn set_style(&mut self, basemap: &Basemap) -> Result<(), MapError> {
        let style = match basemap {
            Basemap::Url(url) => JsValue::from_str(url),
            Basemap::Inline(doc) => to_js(doc)?,
        };
        // A diffed style change fires no `style.load`, so the widget would
        // never replay its sources and layers.
        let options = to_js(&style_options())?;
        self.hover.clear();
        self.click.clear();
        self.map.set_style(&style, &options).map_err(js_error)
    }

    fn add_source(&mut self, id: &str, source: &SourceDef) -> Result<(), MapError> {
        if !self.map.get_source(id).is_undefined() {
            return Err(MapError::SourceExists(id.to_string()));
        }
        let def = to_js(&source.to_style_json())?;
        self.map.add_source(id, &def).map_err(js_error)
    }

    fn update_source(&mut self, id: &str, source: &SourceDef) -> Result<(), MapError> {
        let found = self.map.get_source(id);
        if found.is_undefined() {
            return Err(MapError::SourceNotFound(id.to_string()));
        }
        let live: js::Source = found.unchecked_into();
        let result = match SourceUpdate::for_source(source) {
            SourceUpdate::SetData(data) => live.set_data(&to_js(&data)?),
            SourceUpdate::SetTiles(tiles) => live.set_tiles(&to_js(&tiles)?),
            SourceUpdate::SetUrl(url) => live.set_url(&url),
            SourceUpdate::Unsupported => {
                return Err(MapError::Backend(format!(
                    "source '{id}' of type '{}' cannot be updated in place",
                    source.kind
                )));
            }
        };
        result.map_err(js_error)
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        self.map.remove_source(id).map_err(js_error)
    }

    fn add_layer(&mut self, layer: &LayerDef, before: Option<&str>) -> Result<(), MapError> {
        if !self.map.get_layer(&layer.id).is_undefined() {
            return Err(MapError::LayerExists(layer.id.clone()));
        }
        let def = to_js(&layer.to_style_json())?;
        self.map.add_layer(&def, &before_arg(before)).map_err(js_error)
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), MapError> {
        self.require_layer(id)?;
        self.map.move_layer(id, &before_arg(before)).map_err(js_error)
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        self.require_layer(id)?;
        self.hover.remove(id);
        self.click.remove(id);
        self.map.remove_layer(id).map_err(js_error)
    }

    fn set_paint_property(&mut self, layer: &str, name: &str, value: Option<&Value>) -> Result<(), MapError> {
        self.map
            .set_paint_property(layer, name, &optional(value)?)
            .map_err(js_error)
    }

    fn set_layout_property(&mut self, layer: &str, name: &str, value: Option<&Value>) -> Result<(), MapError> {
        self.map
            .set_layout_property(layer, name, &optional(value)?)
            .map_err(js_error)
    }

    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<(), MapError> {
        self.map.set_filter(layer, &optional(filter)?).map_err(js_error)
    }

    fn set_zoom_range(&mut self, layer: &str, minzoom: Option<f64>, maxzoom: Option<f64>) -> Result<(), MapError> {
        self.map
            .set_layer_zoom_range(layer, minzoom.unwrap_or(0.0), maxzoom.unwrap_or(MAX_ZOOM))
            .map_err(js_error)
    }

    fn bind_hover(&mut self, layer: &str) -> Result<(), MapError> {
        self.require_layer(layer)?;
        self.hover.insert(layer.to_string());
        Ok(())
    }

    fn unbind_hover(&mut self, layer: &str) -> Result<(), MapError> {
        self.hover.remove(layer);
        Ok(())
    }

    fn bind_click(&mut self, layer: &str) -> Result<(), MapError> {
        self.require_layer(layer)?;
        self.click.insert(layer.to_string());
        Ok(())
    }

    fn unbind_click(&mut self, layer: &str) -> Result<(), MapError> {
        self.click.remove(layer);
        Ok(())
    }

    fn set_center(&mut self, center: LngLat) -> Result<(), MapError> {
        self.map.set_center(&to_js(&center)?).map_err(js_error)
    }

    fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError> {
        self.map.set_zoom(zoom).map_err(js_error)
    }

    fn set_bearing(&mut self, bearing: f64) -> Result<(), MapError> {
        self.map.set_bearing(bearing).map_err(js_error)
    }

    fn set_pitch(&mut self, pitch: f64) -> Result<(), MapError> {
        self.map.set_pitch(pitch).map_err(js_error)
    }

    fn set_max_bounds(&mut self, bounds: Option<LngLatBounds>) -> Result<(), MapError> {
        let arg = match bounds {
            Some(b) => to_js(&b)?,
            None => JsValue::NULL,
        };
        self.map.set_max_bounds(&arg).map_err(js_error)
    }

    fn fly_to(&mut self, center: LngLat, zoom: f64, bearing: f64, pitch: f64) -> Result<(), MapError> {
        let options = to_js(&json!({
            "center": center,
            "zoom": zoom,
            "bearing": bearing,
            "pitch": pitch,
        }))?;
        self.map.fly_to(&options).map_err(js_error)
    }

    fn remove(&mut self) {
        self.hover.clear();
        self.click.clear();
        self.map.remove();
    }
}
