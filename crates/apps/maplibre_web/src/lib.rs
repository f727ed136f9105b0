use console_error_panic_hook::set_once;
use hover::{HOVER_FUZZ_PX, HoverCandidate, PopupAction, ScreenPoint, query_box};
use legend::render_svg;
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;
use widget::{MapWidget, PropUpdate, WidgetProps};

pub mod js;
mod map;

pub use map::{JsMap, SourceUpdate, from_js, js_error, to_js};

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    Ok(())
}

/// The widget bound to a live `maplibregl.Map`.
///
/// The page owns the map and forwards its events: `style.load`, `zoom`,
/// `mousemove`, `mouseleave`, `dblclick` and layer clicks.
#[wasm_bindgen]
pub struct WebWidget {
    inner: MapWidget<JsMap>,
    popup: Option<js::Popup>,
}

#[wasm_bindgen]
impl WebWidget {
    #[wasm_bindgen(constructor)]
    pub fn new(map: js::Map, props_json: &str) -> Result<WebWidget, JsValue> {
        let value: Value = serde_json::from_str(props_json).map_err(js_err)?;
        let props = WidgetProps::from_value(value).map_err(js_err)?;
        let inner = MapWidget::mount(props, JsMap::new(map)).map_err(js_err)?;
        Ok(WebWidget { inner, popup: None })
    }

    /// Applies one update, or an array of updates in order.
    pub fn update(&mut self, updates_json: &str) -> Result<(), JsValue> {
        let value: Value = serde_json::from_str(updates_json).map_err(js_err)?;
        let updates: Vec<PropUpdate> = match value {
            Value::Array(_) => serde_json::from_value(value).map_err(js_err)?,
            other => vec![serde_json::from_value(other).map_err(js_err)?],
        };
        self.inner.update_many(updates).map_err(js_err)?;
        Ok(())
    }

    pub fn style_loaded(&mut self) -> Result<(), JsValue> {
        self.hide_popup();
        self.inner.on_style_loaded().map_err(js_err)?;
        Ok(())
    }

    pub fn zoom_changed(&mut self, zoom: f64) {
        self.inner.on_zoom(zoom);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        let point = ScreenPoint::new(x, y);
        let candidates = self.candidates_near(point).map_err(js_err)?;
        let action = self.inner.on_pointer_move(point, &candidates);
        self.show(action)
    }

    pub fn pointer_leave(&mut self) -> Result<(), JsValue> {
        let action = self.inner.on_pointer_leave();
        self.show(action)
    }

    pub fn double_click(&mut self) {
        self.inner.on_double_click();
    }

    /// `features_json` is the array of clicked features.
    pub fn layer_click(&mut self, layer_id: &str, features_json: &str) -> Result<bool, JsValue> {
        let features: Vec<Value> = serde_json::from_str(features_json).map_err(js_err)?;
        Ok(self.inner.on_layer_click(layer_id, &features))
    }

    /// Layers whose clicks should be forwarded, as a JSON array.
    pub fn click_layers_json(&self) -> String {
        json!(self.inner.map().click_layers()).to_string()
    }

    pub fn toggle_layer(&mut self, id: &str) -> Result<bool, JsValue> {
        let toggled = self.inner.toggle_layer(id).map_err(js_err)?;
        Ok(toggled.is_some())
    }

    pub fn legend_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.legend()).map_err(js_err)
    }

    /// SVG for the `"map"` or `"risk"` colorbar at the live zoom.
    pub fn colorbar_svg(&self, which: &str, width: f64) -> Option<String> {
        let active = self.inner.active_colorbars();
        let colorbar = match which {
            "map" => active.map,
            "risk" => active.risk,
            _ => None,
        }?;
        let id = format!("{}-colorbar-{which}", self.inner.props().id.as_deref().unwrap_or("map"));
        Some(render_svg(colorbar, width, &id))
    }

    /// Host events since the last call, as a JSON array.
    pub fn drain_events_json(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.events_mut().drain()).map_err(js_err)
    }

    /// Removes the popup and the map.
    pub fn unmount(mut self) {
        self.hide_popup();
        let _ = self.inner.unmount();
    }
}

impl WebWidget {
    fn candidates_near(&self, point: ScreenPoint) -> Result<Vec<HoverCandidate>, style::MapError> {
        let map = self.inner.map();
        let layers = map.hover_layers();
        if layers.is_empty() {
            return Ok(Vec::new());
        }
        let b = query_box(point, HOVER_FUZZ_PX);
        let features = map.query_rendered_features(b.min, b.max, &layers)?;
        Ok(features
            .iter()
            .filter_map(|f| HoverCandidate::from_feature(f, |p| map.project(p)))
            .collect())
    }

    fn show(&mut self, action: PopupAction) -> Result<(), JsValue> {
        match action {
            PopupAction::Show { lnglat, html, .. } => {
                let popup = match self.popup.take() {
                    Some(p) => p,
                    None => js::Popup::new(&to_js(&json!({"closeButton": false, "closeOnClick": false})).map_err(js_err)?),
                };
                popup.set_lng_lat(&to_js(&lnglat).map_err(js_err)?);
                popup.set_html(&html);
                popup.add_to(self.inner.map().raw());
                self.popup = Some(popup);
                self.inner.map().set_cursor("pointer");
            }
            PopupAction::Hide => self.hide_popup(),
            PopupAction::Keep => {}
        }
        Ok(())
    }

    fn hide_popup(&mut self) {
        if let Some(popup) = self.popup.take() {
            popup.remove();
        }
        self.inner.map().set_cursor("");
    }
}
