use std::fmt;
use std::str::FromStr;

use foundation::{LngLat, LngLatBounds};
use legend::ColorbarConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use style::{Basemap, CameraState, LayerList, Patch, SourceSet, StyleError, StyleState, validate};

use crate::error::WidgetError;

/// Every option the widget recognizes. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidgetProps {
    pub id: Option<String>,
    pub basemap: Basemap,
    pub center: LngLat,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
    pub max_bounds: Option<LngLatBounds>,
    pub sources: SourceSet,
    pub layers: LayerList,
    pub hover_layer: Option<String>,
    pub hover_html: Option<String>,
    pub colorbar_map: Option<Value>,
    pub colorbar_risk: Option<Value>,
    /// Container CSS, passed through.
    pub style: Option<Value>,
    /// Shown in the legend corner.
    pub version: Option<String>,
}

impl Default for WidgetProps {
    fn default() -> Self {
        let camera = CameraState::default();
        Self {
            id: None,
            basemap: Basemap::empty(),
            center: camera.center,
            zoom: camera.zoom,
            bearing: camera.bearing,
            pitch: camera.pitch,
            max_bounds: camera.max_bounds,
            sources: SourceSet::new(),
            layers: LayerList::new(),
            hover_layer: None,
            hover_html: None,
            colorbar_map: None,
            colorbar_risk: None,
            style: None,
            version: None,
        }
    }
}

impl WidgetProps {
    pub fn from_value(value: Value) -> Result<Self, WidgetError> {
        serde_json::from_value(value).map_err(|e| StyleError::decode("widget props", e).into())
    }

    pub fn camera(&self) -> CameraState {
        CameraState {
            center: self.center,
            zoom: self.zoom,
            bearing: self.bearing,
            pitch: self.pitch,
            max_bounds: self.max_bounds,
        }
    }

    pub fn style_state(&self) -> StyleState {
        StyleState {
            basemap: self.basemap.clone(),
            sources: self.sources.clone(),
            layers: self.layers.clone(),
            hover_layer: self.hover_layer.clone(),
            hover_html: self.hover_html.clone(),
        }
    }

    /// Parsed `colorbar_map` and `colorbar_risk`.
    pub fn colorbars(&self) -> Result<(Option<ColorbarConfig>, Option<ColorbarConfig>), WidgetError> {
        Ok((
            parse_colorbar(PropName::ColorbarMap, self.colorbar_map.as_ref())?,
            parse_colorbar(PropName::ColorbarRisk, self.colorbar_risk.as_ref())?,
        ))
    }

    /// Checks layer/source references and colorbar shapes.
    pub fn validate(&self) -> Result<(), WidgetError> {
        validate(&self.style_state())?;
        self.colorbars()?;
        Ok(())
    }

    /// Copy of `self` with `update` applied. `self` is left untouched.
    pub fn updated(&self, update: &PropUpdate) -> Result<Self, WidgetError> {
        let prop = update.prop;
        let mut doc = serde_json::to_value(self).map_err(|e| StyleError::decode("widget props", e))?;
        let Value::Object(fields) = &mut doc else {
            return Err(StyleError::decode("widget props", "not an object").into());
        };
        let slot = fields.entry(prop.as_str()).or_insert(Value::Null);
        match &update.change {
            PropChange::Replace(value) => *slot = value.clone(),
            PropChange::Patch(patch) => patch
                .apply(slot)
                .map_err(|inner| WidgetError::Patch { prop, inner })?,
        }
        serde_json::from_value(doc).map_err(|e| StyleError::decode(prop.as_str(), e).into())
    }
}

fn parse_colorbar(prop: PropName, value: Option<&Value>) -> Result<Option<ColorbarConfig>, WidgetError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => ColorbarConfig::from_value(v)
            .map(Some)
            .map_err(|inner| WidgetError::Colorbar { prop, inner }),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropName {
    Id,
    Basemap,
    Center,
    Zoom,
    Bearing,
    Pitch,
    MaxBounds,
    Sources,
    Layers,
    HoverLayer,
    HoverHtml,
    ColorbarMap,
    ColorbarRisk,
    Style,
    Version,
}

impl PropName {
    pub const ALL: [PropName; 15] = [
        PropName::Id,
        PropName::Basemap,
        PropName::Center,
        PropName::Zoom,
        PropName::Bearing,
        PropName::Pitch,
        PropName::MaxBounds,
        PropName::Sources,
        PropName::Layers,
        PropName::HoverLayer,
        PropName::HoverHtml,
        PropName::ColorbarMap,
        PropName::ColorbarRisk,
        PropName::Style,
        PropName::Version,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PropName::Id => "id",
            PropName::Basemap => "basemap",
            PropName::Center => "center",
            PropName::Zoom => "zoom",
            PropName::Bearing => "bearing",
            PropName::Pitch => "pitch",
            PropName::MaxBounds => "max_bounds",
            PropName::Sources => "sources",
            PropName::Layers => "layers",
            PropName::HoverLayer => "hover_layer",
            PropName::HoverHtml => "hover_html",
            PropName::ColorbarMap => "colorbar_map",
            PropName::ColorbarRisk => "colorbar_risk",
            PropName::Style => "style",
            PropName::Version => "version",
        }
    }

    /// Props whose change never touches the map style.
    pub fn is_camera(self) -> bool {
        matches!(
            self,
            PropName::Center | PropName::Zoom | PropName::Bearing | PropName::Pitch | PropName::MaxBounds
        )
    }
}

impl fmt::Display for PropName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown widget property '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropChange {
    Replace(Value),
    Patch(Patch),
}

/// One property update from the host: `{"prop": "layers", "patch": [...]}` or
/// `{"prop": "zoom", "replace": 9}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropUpdate {
    pub prop: PropName,
    #[serde(flatten)]
    pub change: PropChange,
}

impl PropUpdate {
    pub fn replace(prop: PropName, value: Value) -> Self {
        Self {
            prop,
            change: PropChange::Replace(value),
        }
    }

    pub fn patch(prop: PropName, patch: Patch) -> Self {
        Self {
            prop,
            change: PropChange::Patch(patch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PropName, PropUpdate, WidgetProps};
    use crate::error::WidgetError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use style::{Patch, path};

    #[test]
    fn defaults_match_an_empty_map() {
        let props = WidgetProps::from_value(json!({})).unwrap();
        assert_eq!(props.zoom, 2.0);
        assert_eq!(props.camera(), style::CameraState::default());
        assert!(props.layers.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = WidgetProps::from_value(json!({"zoom": 3, "zooom": 4})).unwrap_err();
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn replace_and_patch_leave_the_original() {
        let props = WidgetProps::from_value(json!({
            "sources": {"s": {"type": "geojson", "data": {"type": "FeatureCollection", "features": []}}},
            "layers": [{"id": "a", "type": "circle", "source": "s", "paint": {"circle-radius": 4}}]
        }))
        .unwrap();

        let zoomed = props.updated(&PropUpdate::replace(PropName::Zoom, json!(9))).unwrap();
        assert_eq!(zoomed.zoom, 9.0);
        assert_eq!(props.zoom, 2.0);

        let patched = props
            .updated(&PropUpdate::patch(
                PropName::Layers,
                Patch::new().set(path![0usize, "paint", "circle-radius"], json!(8)),
            ))
            .unwrap();
        assert_eq!(patched.layers.as_slice()[0].paint["circle-radius"], json!(8));
        assert_eq!(props.layers.as_slice()[0].paint["circle-radius"], json!(4));
    }

    #[test]
    fn bad_patch_names_the_prop() {
        let err = WidgetProps::default()
            .updated(&PropUpdate::patch(
                PropName::Layers,
                Patch::new().set(path![3usize, "paint"], json!({})),
            ))
            .unwrap_err();
        assert!(matches!(err, WidgetError::Patch { prop: PropName::Layers, .. }));
    }

    #[test]
    fn update_wire_format() {
        let u: PropUpdate = serde_json::from_value(json!({
            "prop": "sources",
            "patch": [{"path": ["s", "data"], "op": "set", "value": null}]
        }))
        .unwrap();
        assert_eq!(u.prop, PropName::Sources);
        assert_eq!("colorbar_map".parse::<PropName>(), Ok(PropName::ColorbarMap));
        assert!("nope".parse::<PropName>().is_err());
    }

    #[test]
    fn malformed_colorbar_is_a_configuration_error() {
        let props = WidgetProps::from_value(json!({"colorbar_risk": {"title": "Risk"}})).unwrap();
        let err = props.validate().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(matches!(err, WidgetError::Colorbar { prop: PropName::ColorbarRisk, .. }));
    }
}
