//! Numeric format specs.
//!
//! Grammar: `[sign][0][width][,][.precision][type]`
//! - `sign`: `+` always, `-` negatives only (default), ` ` space for positives.
//! - `0`: pad with zeros after the sign instead of spaces before it.
//! - `,`: group the integer part by thousands.
//! - `type`: `f` fixed, `e`/`E` exponential, `g`/`G` significant digits,
//!   `d` integer, `%` percent. A bare precision behaves like `g`.
//!
//! Exponents are written the way browsers print them: explicit sign, no zero
//! padding (`1e+3`, `4.2e-1`).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatSpecError {
    #[error("unexpected character {ch:?} at offset {offset} in format spec {spec:?}")]
    UnexpectedChar {
        spec: String,
        ch: char,
        offset: usize,
    },
    #[error("missing precision digits after '.' in format spec {spec:?}")]
    MissingPrecision { spec: String },
    #[error("{field} above {limit} in format spec {spec:?}")]
    TooLarge {
        spec: String,
        field: &'static str,
        limit: usize,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sign {
    Negative,
    Always,
    Space,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FormatKind {
    Fixed,
    Exponent { upper: bool },
    General { upper: bool },
    Integer,
    Percent,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub sign: Sign,
    pub zero_pad: bool,
    pub width: usize,
    pub grouping: bool,
    pub precision: Option<usize>,
    pub kind: Option<FormatKind>,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            sign: Sign::Negative,
            zero_pad: false,
            width: 0,
            grouping: false,
            precision: None,
            kind: None,
        }
    }
}

const DEFAULT_PRECISION: usize = 6;

/// Largest accepted precision, the `toFixed` limit.
pub const MAX_PRECISION: usize = 100;
/// Largest accepted field width.
pub const MAX_WIDTH: usize = 100;

/// Reads decimal digits from `chars[*i..]`. `None` when the number exceeds
/// `limit`.
fn read_digits(chars: &[char], i: &mut usize, limit: usize) -> Option<usize> {
    let mut n = 0usize;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        n = n.checked_mul(10)?.checked_add(d as usize)?;
        if n > limit {
            return None;
        }
        *i += 1;
    }
    Some(n)
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<Self, FormatSpecError> {
        let mut out = FormatSpec::default();
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;

        match chars.first() {
            Some('+') => {
                out.sign = Sign::Always;
                i += 1;
            }
            Some('-') => i += 1,
            Some(' ') => {
                out.sign = Sign::Space;
                i += 1;
            }
            _ => {}
        }

        if chars.get(i) == Some(&'0') {
            out.zero_pad = true;
            i += 1;
        }

        out.width = read_digits(&chars, &mut i, MAX_WIDTH).ok_or_else(|| FormatSpecError::TooLarge {
            spec: spec.to_string(),
            field: "width",
            limit: MAX_WIDTH,
        })?;

        if chars.get(i) == Some(&',') {
            out.grouping = true;
            i += 1;
        }

        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            let p = read_digits(&chars, &mut i, MAX_PRECISION).ok_or_else(|| FormatSpecError::TooLarge {
                spec: spec.to_string(),
                field: "precision",
                limit: MAX_PRECISION,
            })?;
            if i == start {
                return Err(FormatSpecError::MissingPrecision {
                    spec: spec.to_string(),
                });
            }
            out.precision = Some(p);
        }

        if let Some(&c) = chars.get(i) {
            out.kind = Some(match c {
                'f' | 'F' => FormatKind::Fixed,
                'e' => FormatKind::Exponent { upper: false },
                'E' => FormatKind::Exponent { upper: true },
                'g' => FormatKind::General { upper: false },
                'G' => FormatKind::General { upper: true },
                'd' => FormatKind::Integer,
                '%' => FormatKind::Percent,
                _ => {
                    return Err(FormatSpecError::UnexpectedChar {
                        spec: spec.to_string(),
                        ch: c,
                        offset: i,
                    });
                }
            });
            i += 1;
        }

        if let Some(&c) = chars.get(i) {
            return Err(FormatSpecError::UnexpectedChar {
                spec: spec.to_string(),
                ch: c,
                offset: i,
            });
        }

        Ok(out)
    }

    pub fn apply(&self, value: f64) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        let negative = value < 0.0;
        let abs = value.abs();
        let precision = self.precision.unwrap_or(DEFAULT_PRECISION).min(MAX_PRECISION);
        let width = self.width.min(MAX_WIDTH);

        let body = if abs.is_infinite() {
            "inf".to_string()
        } else {
            let body = match self.kind {
                None if self.precision.is_none() => display_number(abs),
                None => general(abs, precision, false),
                Some(FormatKind::Fixed) => format!("{abs:.precision$}"),
                Some(FormatKind::Exponent { upper }) => exponential(abs, precision, upper),
                Some(FormatKind::General { upper }) => general(abs, precision, upper),
                Some(FormatKind::Integer) => format!("{abs:.0}"),
                Some(FormatKind::Percent) => format!("{:.precision$}%", abs * 100.0),
            };
            if self.grouping { group_thousands(&body) } else { body }
        };

        let prefix = match (negative, self.sign) {
            (true, _) => "-",
            (false, Sign::Always) => "+",
            (false, Sign::Space) => " ",
            (false, Sign::Negative) => "",
        };

        let len = prefix.chars().count() + body.chars().count();
        if len >= width {
            return format!("{prefix}{body}");
        }
        let pad = width - len;
        if self.zero_pad && abs.is_finite() {
            format!("{prefix}{}{body}", "0".repeat(pad))
        } else {
            format!("{}{prefix}{body}", " ".repeat(pad))
        }
    }
}

/// Formats `value` with `spec`, falling back to [`display_number`] when the
/// spec does not parse.
pub fn format_number(value: f64, spec: &str) -> String {
    match FormatSpec::parse(spec) {
        Ok(s) => s.apply(value),
        Err(_) => display_number(value),
    }
}

/// Default display for numbers: integral values without a fraction, others
/// in their shortest round-trip form.
pub fn display_number(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    format!("{value}")
}

fn exponential(abs: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, abs);
    let (mantissa, exp) = split_exponent(&raw);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{e}{sign}{}", exp.unsigned_abs())
}

fn general(abs: f64, precision: usize, upper: bool) -> String {
    let precision = precision.max(1);
    if abs == 0.0 {
        return "0".to_string();
    }
    let raw = format!("{:.*e}", precision - 1, abs);
    let (_, exp) = split_exponent(&raw);
    if exp < -4 || exp >= precision as i32 {
        let s = exponential(abs, precision - 1, upper);
        let marker = if upper { 'E' } else { 'e' };
        match s.split_once(marker) {
            Some((m, rest)) => format!("{}{marker}{rest}", trim_fraction(m)),
            None => s,
        }
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, abs)).to_string()
    }
}

fn split_exponent(raw: &str) -> (&str, i32) {
    match raw.split_once('e') {
        Some((m, e)) => (m, e.parse().unwrap_or(0)),
        None => (raw, 0),
    }
}

fn trim_fraction(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.')
}

fn group_thousands(body: &str) -> String {
    let split = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    let (int, rest) = body.split_at(split);
    let mut out = String::with_capacity(body.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push_str(rest);
    out
}
