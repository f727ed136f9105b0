use foundation::display_number;
use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColorbarError {
    #[error("colorbar config must be an object, got {found}")]
    NotAnObject { found: String },
    #[error("colorbar has no stops")]
    MissingStops,
    #[error("colorbar stop key {key:?} is not a number")]
    BadStopKey { key: String },
    #[error("colorbar stop {key:?} must be a pair of colour strings")]
    BadStopColors { key: String },
    #[error("colorbar label {key:?} needs a numeric position and a text")]
    BadLabel { key: String },
    #[error("colorbar {field} must be a string")]
    NotAString { field: &'static str },
    #[error("colorbar for zoom {zoom}: {inner}")]
    AtZoom { zoom: f64, inner: Box<ColorbarError> },
}

/// One gradient segment boundary: `low` is drawn on its left, `high` on its right.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorStop {
    pub value: f64,
    pub low: String,
    pub high: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatColorbar {
    /// Ascending by `value`, never empty once parsed.
    pub stops: Vec<ColorStop>,
    pub title: Option<String>,
    /// `(position, text)`, position a fraction of the bar in `0..=1`.
    pub labels: Vec<(f64, String)>,
    pub format: Option<String>,
}

impl FlatColorbar {
    pub fn from_value(value: &Value) -> Result<Self, ColorbarError> {
        let obj = as_object(value)?;

        let stops_obj = match obj.get("stops") {
            Some(Value::Object(m)) if !m.is_empty() => m,
            _ => return Err(ColorbarError::MissingStops),
        };
        let mut stops = stops_obj
            .iter()
            .map(|(key, colors)| parse_stop(key, colors))
            .collect::<Result<Vec<_>, _>>()?;
        stops.sort_by(|a, b| a.value.total_cmp(&b.value));

        let mut labels = match obj.get("labels") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(m)) => m
                .iter()
                .map(|(key, text)| parse_label(key, text))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ColorbarError::BadLabel {
                    key: "labels".to_string(),
                });
            }
        };
        labels.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(Self {
            stops,
            title: optional_string(obj, "title")?,
            labels,
            format: optional_string(obj, "format")?,
        })
    }

    pub fn to_value(&self) -> Value {
        let stops: Map<String, Value> = self
            .stops
            .iter()
            .map(|s| (display_number(s.value), json!([s.low, s.high])))
            .collect();
        let mut out = json!({ "stops": stops });
        if let Some(title) = &self.title {
            out["title"] = json!(title);
        }
        if !self.labels.is_empty() {
            let labels: Map<String, Value> = self
                .labels
                .iter()
                .map(|(p, t)| (display_number(*p), json!(t)))
                .collect();
            out["labels"] = Value::Object(labels);
        }
        if let Some(format) = &self.format {
            out["format"] = json!(format);
        }
        out
    }

    /// Value range covered by the stops.
    pub fn domain(&self) -> Option<(f64, f64)> {
        Some((self.stops.first()?.value, self.stops.last()?.value))
    }

    /// Colour drawn at `value`, as `#rrggbb`.
    ///
    /// Between two stops the colour runs from the left stop's `high` to the
    /// right stop's `low`. Returns `None` for colours that are not hex.
    pub fn color_at(&self, value: f64) -> Option<String> {
        let first = self.stops.first()?;
        if value.is_nan() || value < first.value {
            return Rgb::parse(&first.low).map(Rgb::to_hex);
        }
        let i = self.stops.iter().rposition(|s| s.value <= value)?;
        let left = &self.stops[i];
        let Some(right) = self.stops.get(i + 1) else {
            return Rgb::parse(&left.high).map(Rgb::to_hex);
        };
        let t = (value - left.value) / (right.value - left.value);
        let a = Rgb::parse(&left.high)?;
        let b = Rgb::parse(&right.low)?;
        Some(a.lerp(b, t).to_hex())
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ColorbarError> {
    value.as_object().ok_or_else(|| ColorbarError::NotAnObject {
        found: json_kind(value).to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_key(key: &str) -> Option<f64> {
    key.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn parse_stop(key: &str, colors: &Value) -> Result<ColorStop, ColorbarError> {
    let value = parse_key(key).ok_or_else(|| ColorbarError::BadStopKey {
        key: key.to_string(),
    })?;
    match colors.as_array().map(Vec::as_slice) {
        Some([Value::String(low), Value::String(high)]) => Ok(ColorStop {
            value,
            low: low.clone(),
            high: high.clone(),
        }),
        _ => Err(ColorbarError::BadStopColors {
            key: key.to_string(),
        }),
    }
}

fn parse_label(key: &str, text: &Value) -> Result<(f64, String), ColorbarError> {
    let bad = || ColorbarError::BadLabel {
        key: key.to_string(),
    };
    let pos = parse_key(key).ok_or_else(bad)?;
    let text = match text {
        Value::String(s) => s.clone(),
        Value::Number(n) => display_number(n.as_f64().ok_or_else(bad)?),
        _ => return Err(bad()),
    };
    Ok((pos, text))
}

fn optional_string(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ColorbarError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ColorbarError::NotAString { field }),
    }
}

/// A colorbar definition, optionally switching with the zoom level.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorbarConfig {
    Flat(FlatColorbar),
    /// Ascending zoom thresholds.
    ZoomIndexed(Vec<(f64, FlatColorbar)>),
}

impl ColorbarConfig {
    /// An object whose keys all parse as numbers is zoom-indexed; anything
    /// else must be a flat colorbar.
    pub fn from_value(value: &Value) -> Result<Self, ColorbarError> {
        let obj = as_object(value)?;
        let zoom_indexed = !obj.is_empty() && obj.keys().all(|k| parse_key(k).is_some());
        if !zoom_indexed {
            return FlatColorbar::from_value(value).map(ColorbarConfig::Flat);
        }

        let mut entries = Vec::with_capacity(obj.len());
        for (key, inner) in obj {
            let zoom = parse_key(key).unwrap_or_default();
            let flat = FlatColorbar::from_value(inner).map_err(|e| ColorbarError::AtZoom {
                zoom,
                inner: Box::new(e),
            })?;
            entries.push((zoom, flat));
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(ColorbarConfig::ZoomIndexed(entries))
    }

    /// Colorbar in effect at `zoom`: the greatest threshold not above it, or
    /// the lowest threshold when `zoom` is below all of them (or NaN).
    ///
    /// `None` only for an empty zoom-indexed config.
    pub fn select(&self, zoom: f64) -> Option<&FlatColorbar> {
        match self {
            ColorbarConfig::Flat(flat) => Some(flat),
            ColorbarConfig::ZoomIndexed(entries) => {
                let mut chosen = entries.first();
                for entry in entries {
                    if zoom >= entry.0 {
                        chosen = Some(entry);
                    } else {
                        break;
                    }
                }
                chosen.map(|(_, c)| c)
            }
        }
    }
}

/// Free-function form of [`ColorbarConfig::select`].
pub fn select(config: &ColorbarConfig, zoom: f64) -> Option<&FlatColorbar> {
    config.select(zoom)
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Rgb(f64, f64, f64);

impl Rgb {
    fn parse(s: &str) -> Option<Rgb> {
        let hex = s.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |h: &str| u8::from_str_radix(h, 16).ok().map(f64::from);
        match hex.len() {
            3 | 4 => {
                let c = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17.0);
                Some(Rgb(c(0)?, c(1)?, c(2)?))
            }
            6 | 8 => Some(Rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            _ => None,
        }
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb(
            self.0 + (other.0 - self.0) * t,
            self.1 + (other.1 - self.1) * t,
            self.2 + (other.2 - self.2) * t,
        )
    }

    fn to_hex(self) -> String {
        let c = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        format!("#{:02x}{:02x}{:02x}", c(self.0), c(self.1), c(self.2))
    }
}
