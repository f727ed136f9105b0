//! Hover popup templates.
//!
//! Placeholders are `{key}` or `{key:spec}` where `key` is made of ASCII word
//! characters and `spec` follows [`foundation::numfmt`]. Text in braces that
//! does not match is copied verbatim.
//!
//! Field policy, fixed for every template:
//! - missing key, `null`: empty
//! - number: `spec` applied, or default display
//! - non-number with a `spec`: empty
//! - string as is, bool as `true`/`false`, arrays and objects as compact JSON
//!
//! The output is inserted into the popup as HTML and is not sanitized.
//! Templates are operator configuration; feature properties are trusted to the
//! same degree as the data source they come from.

use foundation::{display_number, format_number};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub key: &'a str,
    pub spec: Option<&'a str>,
}

/// The feature under the pointer, as seen by the template.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverContext {
    pub layer_id: String,
    pub feature_properties: Map<String, Value>,
}

impl HoverContext {
    pub fn render(&self, template: &str) -> String {
        render(template, &self.feature_properties)
    }
}

/// Interpolates `properties` into `template`.
pub fn render(template: &str, properties: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match parse_placeholder(tail) {
            Some((ph, consumed)) => {
                out.push_str(&render_field(ph, properties));
                rest = &tail[consumed..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Placeholders of `template` in order of appearance.
pub fn placeholders(template: &str) -> Vec<Placeholder<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let tail = &rest[open..];
        match parse_placeholder(tail) {
            Some((ph, consumed)) => {
                out.push(ph);
                rest = &tail[consumed..];
            }
            None => rest = &tail[1..],
        }
    }
    out
}

/// Keys used by `template` that `properties` lacks.
pub fn missing_keys<'a>(template: &'a str, properties: &Map<String, Value>) -> Vec<&'a str> {
    placeholders(template)
        .into_iter()
        .map(|ph| ph.key)
        .filter(|k| !properties.contains_key(*k))
        .collect()
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_spec_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b',' | b'+' | b'-' | b'%')
}

// `s` starts at '{'. Returns the placeholder and the bytes it spans.
fn parse_placeholder(s: &str) -> Option<(Placeholder<'_>, usize)> {
    let body = s.get(1..)?;
    let bytes = body.as_bytes();

    let key_len = bytes.iter().take_while(|b| is_key_byte(**b)).count();
    if key_len == 0 {
        return None;
    }
    let key = &body[..key_len];

    let mut end = key_len;
    let mut spec = None;
    if bytes.get(end) == Some(&b':') {
        let start = end + 1;
        let spec_len = bytes[start..]
            .iter()
            .take_while(|b| is_spec_byte(**b))
            .count();
        if spec_len == 0 {
            return None;
        }
        spec = Some(&body[start..start + spec_len]);
        end = start + spec_len;
    }

    if bytes.get(end) != Some(&b'}') {
        return None;
    }
    Some((Placeholder { key, spec }, end + 2))
}

fn render_field(ph: Placeholder<'_>, properties: &Map<String, Value>) -> String {
    let Some(value) = properties.get(ph.key) else {
        debug!(key = ph.key, "hover template field missing");
        return String::new();
    };
    match (value, ph.spec) {
        (Value::Null, _) => String::new(),
        (Value::Number(n), Some(spec)) => format_number(n.as_f64().unwrap_or(f64::NAN), spec),
        (Value::Number(n), None) => {
            if n.is_f64() {
                display_number(n.as_f64().unwrap_or(f64::NAN))
            } else {
                n.to_string()
            }
        }
        (_, Some(spec)) => {
            debug!(key = ph.key, spec, "numeric format applied to non-number");
            String::new()
        }
        (Value::String(s), None) => s.clone(),
        (Value::Bool(b), None) => b.to_string(),
        (other, None) => other.to_string(),
    }
}
