use foundation::{display_number, format_number};
use serde::Serialize;

use crate::colorbar::FlatColorbar;

pub const BAR_HEIGHT: f64 = 24.0;
pub const TITLE_HEIGHT: f64 = 24.0;
pub const LABEL_HEIGHT: f64 = 24.0;
pub const TITLE_FONT_SIZE: f64 = 14.0;
pub const LABEL_FONT_SIZE: f64 = 12.0;

/// Minimum horizontal room per auto-generated label.
const MIN_LABEL_SPACING: f64 = 60.0;
/// Labels this close to an edge are aligned to it.
const LABEL_ALIGN_BUFFER: f64 = 0.05;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn for_fraction(p: f64) -> Self {
        if p <= LABEL_ALIGN_BUFFER {
            TextAnchor::Start
        } else if p >= 1.0 - LABEL_ALIGN_BUFFER {
            TextAnchor::End
        } else {
            TextAnchor::Middle
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientStop {
    /// Percent of the bar width.
    pub offset: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlacement {
    pub fraction: f64,
    pub x: f64,
    pub text: String,
    pub anchor: TextAnchor,
}

/// Geometry of a rendered colorbar strip: title on top, bar, labels below.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorbarLayout {
    pub width: f64,
    pub height: f64,
    pub gradient: Vec<GradientStop>,
    pub labels: Vec<LabelPlacement>,
    pub title: Option<String>,
}

impl ColorbarLayout {
    pub fn compute(colorbar: &FlatColorbar, width: f64) -> Self {
        let width = if width.is_finite() { width.max(0.0) } else { 0.0 };
        let fraction = fraction_fn(colorbar);

        let gradient = colorbar
            .stops
            .iter()
            .flat_map(|s| {
                let offset = fraction(s.value) * 100.0;
                [
                    GradientStop {
                        offset,
                        color: s.low.clone(),
                    },
                    GradientStop {
                        offset,
                        color: s.high.clone(),
                    },
                ]
            })
            .collect();

        let raw: Vec<(f64, String)> = if colorbar.labels.is_empty() {
            auto_labels(colorbar, width, &fraction)
        } else {
            colorbar.labels.clone()
        };
        let labels = raw
            .into_iter()
            .map(|(pos, text)| {
                let p = pos.clamp(0.0, 1.0);
                LabelPlacement {
                    fraction: p,
                    x: p * width,
                    text,
                    anchor: TextAnchor::for_fraction(p),
                }
            })
            .collect();

        Self {
            width,
            height: TITLE_HEIGHT + BAR_HEIGHT + LABEL_HEIGHT,
            gradient,
            labels,
            title: colorbar.title.clone(),
        }
    }

    /// Vertical centre of the label row.
    pub fn label_y(&self) -> f64 {
        TITLE_HEIGHT + BAR_HEIGHT + LABEL_HEIGHT / 2.0
    }

    pub fn title_y(&self) -> f64 {
        TITLE_HEIGHT / 2.0
    }
}

// Linear map from the stop domain onto 0..=1. A single-valued domain maps
// everything to the middle.
fn fraction_fn(colorbar: &FlatColorbar) -> impl Fn(f64) -> f64 {
    let (lo, hi) = colorbar.domain().unwrap_or((0.0, 1.0));
    move |v| {
        if hi > lo { (v - lo) / (hi - lo) } else { 0.5 }
    }
}

fn auto_labels(colorbar: &FlatColorbar, width: f64, fraction: &impl Fn(f64) -> f64) -> Vec<(f64, String)> {
    let n = colorbar.stops.len();
    let max_labels = ((width / MIN_LABEL_SPACING).floor() as usize).max(2);
    let step = n.div_ceil(max_labels).max(1);
    colorbar
        .stops
        .iter()
        .enumerate()
        .filter(|(i, _)| i % step == 0 || *i == n - 1)
        .map(|(_, s)| {
            let p = (fraction(s.value) * 1e4).round() / 1e4;
            let text = match &colorbar.format {
                Some(spec) => format_number(s.value, spec),
                None => display_number(s.value),
            };
            (p, text)
        })
        .collect()
}
