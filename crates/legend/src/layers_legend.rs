use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use style::{LayerDef, LayerList};

pub const FALLBACK_SWATCH_COLOR: &str = "#ccc";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Swatch {
    Circle,
    Fill,
    Line,
    Other,
}

impl Swatch {
    pub fn for_layer_type(kind: &str) -> Self {
        match kind {
            "circle" => Swatch::Circle,
            "fill" => Swatch::Fill,
            "line" => Swatch::Line,
            _ => Swatch::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub layer_id: String,
    pub label: String,
    pub swatch: Swatch,
    pub color: String,
    pub visible: bool,
}

/// Only layers with a non-empty `display_name` appear in the legend.
pub fn legend_layers(layers: &LayerList) -> impl Iterator<Item = &LayerDef> {
    layers
        .iter()
        .filter(|l| l.display_name.as_deref().is_some_and(|n| !n.is_empty()))
}

pub fn legend_entries(layers: &LayerList, visibility: &LayerVisibility) -> Vec<LegendEntry> {
    legend_layers(layers)
        .map(|l| {
            let swatch = Swatch::for_layer_type(&l.kind);
            let color = match swatch {
                Swatch::Other => FALLBACK_SWATCH_COLOR.to_string(),
                _ => swatch_color(l),
            };
            LegendEntry {
                layer_id: l.id.clone(),
                label: l.display_name.clone().unwrap_or_default(),
                swatch,
                color,
                visible: visibility.is_visible(&l.id),
            }
        })
        .collect()
}

// First colour paint property that is set; expressions get the fallback.
fn swatch_color(layer: &LayerDef) -> String {
    let set = ["circle-color", "fill-color", "line-color"]
        .iter()
        .find_map(|k| layer.paint.get(*k).filter(|v| is_set(v)));
    match set {
        Some(Value::String(s)) => s.clone(),
        _ => FALLBACK_SWATCH_COLOR.to_string(),
    }
}

fn is_set(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Which legend layers the user has switched off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerVisibility {
    legend_ids: Vec<String>,
    hidden: BTreeSet<String>,
}

impl LayerVisibility {
    pub fn new(layers: &LayerList) -> Self {
        Self {
            legend_ids: legend_layers(layers).map(|l| l.id.clone()).collect(),
            hidden: BTreeSet::new(),
        }
    }

    /// Resets to all-visible when the set or order of legend layers changed.
    /// Returns whether it reset.
    pub fn sync(&mut self, layers: &LayerList) -> bool {
        let ids: Vec<String> = legend_layers(layers).map(|l| l.id.clone()).collect();
        if ids == self.legend_ids {
            return false;
        }
        self.legend_ids = ids;
        self.hidden.clear();
        true
    }

    /// Flips `id`. Returns the new visibility, or `None` for layers that are
    /// not in the legend.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        if !self.legend_ids.iter().any(|l| l == id) {
            return None;
        }
        if self.hidden.remove(id) {
            Some(true)
        } else {
            self.hidden.insert(id.to_string());
            Some(false)
        }
    }

    pub fn is_visible(&self, id: &str) -> bool {
        !self.hidden.contains(id)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &str> {
        self.hidden.iter().map(String::as_str)
    }

    pub fn legend_ids(&self) -> &[String] {
        &self.legend_ids
    }
}

/// Layout `visibility` value for a legend state.
pub fn visibility_value(visible: bool) -> &'static str {
    if visible { "visible" } else { "none" }
}
