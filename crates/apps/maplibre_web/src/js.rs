//! Bindings to the parts of MapLibre GL JS the widget calls.

use wasm_bindgen::prelude::*;

#[wasm_bindgen(js_namespace = maplibregl)]
extern "C" {
    /// `maplibregl.Map`
    pub type Map;

    #[wasm_bindgen(method, catch, js_name = setStyle)]
    pub fn set_style(this: &Map, style: &JsValue, options: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = addSource)]
    pub fn add_source(this: &Map, id: &str, source: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = removeSource)]
    pub fn remove_source(this: &Map, id: &str) -> Result<(), JsValue>;
    #[wasm_bindgen(method, js_name = getSource)]
    pub fn get_source(this: &Map, id: &str) -> JsValue;

    #[wasm_bindgen(method, catch, js_name = addLayer)]
    pub fn add_layer(this: &Map, layer: &JsValue, before: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = moveLayer)]
    pub fn move_layer(this: &Map, id: &str, before: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = removeLayer)]
    pub fn remove_layer(this: &Map, id: &str) -> Result<(), JsValue>;
    #[wasm_bindgen(method, js_name = getLayer)]
    pub fn get_layer(this: &Map, id: &str) -> JsValue;

    #[wasm_bindgen(method, catch, js_name = setPaintProperty)]
    pub fn set_paint_property(this: &Map, layer: &str, name: &str, value: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setLayoutProperty)]
    pub fn set_layout_property(this: &Map, layer: &str, name: &str, value: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setFilter)]
    pub fn set_filter(this: &Map, layer: &str, filter: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setLayerZoomRange)]
    pub fn set_layer_zoom_range(this: &Map, layer: &str, minzoom: f64, maxzoom: f64) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setCenter)]
    pub fn set_center(this: &Map, center: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setZoom)]
    pub fn set_zoom(this: &Map, zoom: f64) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setBearing)]
    pub fn set_bearing(this: &Map, bearing: f64) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setPitch)]
    pub fn set_pitch(this: &Map, pitch: f64) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setMaxBounds)]
    pub fn set_max_bounds(this: &Map, bounds: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = flyTo)]
    pub fn fly_to(this: &Map, options: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = queryRenderedFeatures)]
    pub fn query_rendered_features(this: &Map, geometry: &JsValue, options: &JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method)]
    pub fn project(this: &Map, lnglat: &JsValue) -> JsValue;
    #[wasm_bindgen(method, js_name = getCanvas)]
    pub fn get_canvas(this: &Map) -> web_sys::HtmlCanvasElement;

    #[wasm_bindgen(method)]
    pub fn remove(this: &Map);

    /// `maplibregl.Popup`
    pub type Popup;

    #[wasm_bindgen(constructor)]
    pub fn new(options: &JsValue) -> Popup;
    #[wasm_bindgen(method, js_name = setLngLat)]
    pub fn set_lng_lat(this: &Popup, lnglat: &JsValue);
    #[wasm_bindgen(method, js_name = setHTML)]
    pub fn set_html(this: &Popup, html: &str);
    #[wasm_bindgen(method, js_name = addTo)]
    pub fn add_to(this: &Popup, map: &Map);
    #[wasm_bindgen(method)]
    pub fn remove(this: &Popup);
}

#[wasm_bindgen]
extern "C" {
    /// Any source exposing the update methods below; MapLibre checks nothing.
    pub type Source;

    #[wasm_bindgen(method, catch, js_name = setData)]
    pub fn set_data(this: &Source, data: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setTiles)]
    pub fn set_tiles(this: &Source, tiles: &JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(method, catch, js_name = setUrl)]
    pub fn set_url(this: &Source, url: &str) -> Result<(), JsValue>;
}
