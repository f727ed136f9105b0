use foundation::display_number;

use crate::colorbar::FlatColorbar;
use crate::layout::{BAR_HEIGHT, ColorbarLayout, LABEL_FONT_SIZE, TITLE_FONT_SIZE, TITLE_HEIGHT};

const TEXT_FILL: &str = "#222";
const BAR_STROKE: &str = "#444";

/// Standalone SVG document for `colorbar` drawn `width` pixels wide.
///
/// `gradient_id` must be unique within the page the SVG is inlined into.
pub fn render_svg(colorbar: &FlatColorbar, width: f64, gradient_id: &str) -> String {
    let layout = ColorbarLayout::compute(colorbar, width);
    let n = display_number;
    let id = escape(gradient_id);

    let mut out = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" style="display:block">"#,
        n(layout.width.max(1.0)),
        n(layout.height)
    );

    out.push_str(&format!(
        r#"<defs><linearGradient id="{id}" x1="0%" x2="100%" y1="0%" y2="0%">"#
    ));
    for stop in &layout.gradient {
        out.push_str(&format!(
            r#"<stop offset="{}%" stop-color="{}"/>"#,
            n(stop.offset),
            escape(&stop.color)
        ));
    }
    out.push_str("</linearGradient></defs>");

    out.push_str(&format!(
        r#"<rect x="0" y="{}" width="{}" height="{}" style="fill:url(#{id});stroke:{BAR_STROKE};stroke-width:1"/>"#,
        n(TITLE_HEIGHT),
        n(layout.width),
        n(BAR_HEIGHT)
    ));

    for label in &layout.labels {
        out.push_str(&text_element(
            label.x,
            layout.label_y(),
            label.anchor.as_str(),
            LABEL_FONT_SIZE,
            &label.text,
        ));
    }
    if let Some(title) = &layout.title {
        out.push_str(&text_element(
            layout.width / 2.0,
            layout.title_y(),
            "middle",
            TITLE_FONT_SIZE,
            title,
        ));
    }

    out.push_str("</svg>");
    out
}

fn text_element(x: f64, y: f64, anchor: &str, size: f64, text: &str) -> String {
    format!(
        r#"<text x="{}" y="{}" text-anchor="{anchor}" font-size="{}" fill="{TEXT_FILL}" dominant-baseline="middle">{}</text>"#,
        display_number(x),
        display_number(y),
        display_number(size),
        escape(text)
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
