use std::collections::BTreeMap;

use foundation::{LngLat, LngLatBounds};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub type SourceId = String;
pub type LayerId = String;

/// Layer type that may omit `source`.
pub const BACKGROUND_LAYER_TYPE: &str = "background";

/// A named data provider, e.g. a GeoJSON feature collection.
///
/// Keys other than `type` and `data` (`url`, `tiles`, `cluster`, ...) are kept
/// verbatim and passed to the map untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceDef {
    pub fn geojson(data: Value) -> Self {
        Self {
            kind: "geojson".to_string(),
            data: Some(data),
            extra: BTreeMap::new(),
        }
    }

    pub fn is_geojson(&self) -> bool {
        self.kind == "geojson"
    }

    /// Style-spec JSON for this source.
    pub fn to_style_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Source id → definition. Ordered for deterministic diffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceSet(BTreeMap<SourceId, SourceDef>);

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<SourceId>, def: SourceDef) -> Option<SourceDef> {
        self.0.insert(id.into(), def)
    }

    pub fn remove(&mut self, id: &str) -> Option<SourceDef> {
        self.0.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&SourceDef> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceDef)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(SourceId, SourceDef)> for SourceSet {
    fn from_iter<T: IntoIterator<Item = (SourceId, SourceDef)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A rendering rule applied to one source's features.
///
/// `display_name`, `hover_html` and `send_click` are widget-level keys; the
/// rest follows the map style specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDef {
    pub id: LayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceId>,
    #[serde(
        rename = "source-layer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_layer: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paint: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layout: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_html: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub send_click: bool,
}

impl LayerDef {
    pub fn new(id: impl Into<LayerId>, kind: impl Into<String>, source: impl Into<SourceId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            kind: kind.into(),
            source: Some(source.into()),
            source_layer: None,
            paint: BTreeMap::new(),
            layout: BTreeMap::new(),
            filter: None,
            minzoom: None,
            maxzoom: None,
            hover_html: None,
            send_click: false,
        }
    }

    pub fn with_paint(mut self, name: impl Into<String>, value: Value) -> Self {
        self.paint.insert(name.into(), value);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_hover_html(mut self, template: impl Into<String>) -> Self {
        self.hover_html = Some(template.into());
        self
    }

    /// Style-spec JSON for this layer, without the widget-level keys.
    pub fn to_style_json(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut v {
            map.remove("display_name");
            map.remove("hover_html");
            map.remove("send_click");
        }
        v
    }
}

/// Ordered layer definitions. Order is z-order: first is drawn at the bottom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerList(Vec<LayerDef>);

impl LayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: LayerDef) {
        self.0.push(layer);
    }

    pub fn get(&self, id: &str) -> Option<&LayerDef> {
        self.0.iter().find(|l| l.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|l| l.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayerDef> {
        self.0.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|l| l.id.as_str())
    }

    pub fn as_slice(&self) -> &[LayerDef] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<LayerDef>> for LayerList {
    fn from(layers: Vec<LayerDef>) -> Self {
        Self(layers)
    }
}

impl<'a> IntoIterator for &'a LayerList {
    type Item = &'a LayerDef;
    type IntoIter = std::slice::Iter<'a, LayerDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub center: LngLat,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bounds: Option<LngLatBounds>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            center: LngLat::new(0.0, 0.0),
            zoom: 2.0,
            bearing: 0.0,
            pitch: 0.0,
            max_bounds: None,
        }
    }
}

/// Background style document: a URL to fetch or an inline style JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Basemap {
    Url(String),
    Inline(Value),
}

impl Basemap {
    /// A style with no sources and no layers.
    pub fn empty() -> Self {
        Basemap::Inline(json!({
            "version": 8,
            "name": "Empty",
            "sources": {},
            "layers": []
        }))
    }
}

impl Default for Basemap {
    fn default() -> Self {
        Self::empty()
    }
}

/// The part of the widget state reconciled against the map style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleState {
    pub basemap: Basemap,
    pub sources: SourceSet,
    pub layers: LayerList,
    /// Legacy single hover layer; paired with `hover_html`.
    pub hover_layer: Option<LayerId>,
    /// Legacy global hover template, superseded by per-layer `hover_html`.
    pub hover_html: Option<String>,
}

impl StyleState {
    /// Nothing but a basemap, as right after a style load.
    pub fn empty(basemap: Basemap) -> Self {
        Self {
            basemap,
            ..Self::default()
        }
    }

    /// Hover template in effect for `layer`, if any.
    pub fn hover_template<'a>(&'a self, layer: &'a LayerDef) -> Option<&'a str> {
        if let Some(t) = layer.hover_html.as_deref()
            && !t.is_empty()
        {
            return Some(t);
        }
        match (&self.hover_layer, &self.hover_html) {
            (Some(id), Some(t)) if *id == layer.id && !t.is_empty() => Some(t.as_str()),
            _ => None,
        }
    }

    /// Hover-enabled layers with their templates, in layer order.
    pub fn hover_layers(&self) -> Vec<(&str, &str)> {
        self.layers
            .iter()
            .filter_map(|l| self.hover_template(l).map(|t| (l.id.as_str(), t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Basemap, LayerDef, LayerList, SourceDef, SourceSet, StyleState};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn layer_parses_style_and_widget_keys() {
        let layer: LayerDef = serde_json::from_value(json!({
            "id": "points",
            "display_name": "Point layer",
            "type": "circle",
            "source": "my-points",
            "paint": {"circle-radius": 8, "circle-color": "#007cbf"},
            "hover_html": "<b>{name}</b>"
        }))
        .unwrap();
        assert_eq!(layer.kind, "circle");
        assert_eq!(layer.paint["circle-radius"], json!(8));
        assert!(!layer.send_click);

        let style = layer.to_style_json();
        assert_eq!(style.get("display_name"), None);
        assert_eq!(style.get("hover_html"), None);
        assert_eq!(style["source"], json!("my-points"));
    }

    #[test]
    fn source_keeps_extra_keys() {
        let src: SourceDef = serde_json::from_value(json!({
            "type": "vector",
            "url": "https://example.com/tiles.json"
        }))
        .unwrap();
        assert_eq!(src.data, None);
        assert_eq!(src.extra["url"], json!("https://example.com/tiles.json"));
        assert_eq!(
            src.to_style_json(),
            json!({"type": "vector", "url": "https://example.com/tiles.json"})
        );
    }

    #[test]
    fn basemap_is_untagged() {
        let url: Basemap = serde_json::from_value(json!("https://demotiles.maplibre.org/style.json")).unwrap();
        assert!(matches!(url, Basemap::Url(_)));
        let inline: Basemap = serde_json::from_value(json!({"version": 8})).unwrap();
        assert!(matches!(inline, Basemap::Inline(_)));
    }

    #[test]
    fn legacy_hover_template_applies_to_hover_layer_only() {
        let mut sources = SourceSet::new();
        sources.insert("s", SourceDef::geojson(json!({"type": "FeatureCollection", "features": []})));
        let state = StyleState {
            sources,
            layers: LayerList::from(vec![
                LayerDef::new("a", "circle", "s"),
                LayerDef::new("b", "circle", "s").with_hover_html("{b}"),
                LayerDef::new("c", "circle", "s").with_hover_html(""),
            ]),
            hover_layer: Some("a".to_string()),
            hover_html: Some("{legacy}".to_string()),
            ..StyleState::default()
        };
        assert_eq!(state.hover_layers(), vec![("a", "{legacy}"), ("b", "{b}")]);
    }
}
