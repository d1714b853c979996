//! Purpose: Render float cells through a caller-supplied printf-style format string.
//! Exports: `FloatFormat`, `DEFAULT_FLOAT_FORMAT`.
//! Role: Parsed once when a session is built; each opened table keeps a clone.
//! Invariants: A format holds exactly one conversion out of `f F e E g G`.
//! Invariants: Output matches C printf for finite values (correctly rounded decimal).
use std::fmt::Write as _;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_FLOAT_FORMAT: &str = "%f";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Style {
    Fixed,
    Exponent,
    General,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Conversion {
    left_align: bool,
    plus_sign: bool,
    space_sign: bool,
    zero_pad: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    style: Style,
    upper: bool,
}

impl Conversion {
    // `%f`
    fn plain() -> Self {
        Self {
            left_align: false,
            plus_sign: false,
            space_sign: false,
            zero_pad: false,
            alternate: false,
            width: 0,
            precision: None,
            style: Style::Fixed,
            upper: false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FloatFormat {
    prefix: String,
    suffix: String,
    conversion: Conversion,
}

impl Default for FloatFormat {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            conversion: Conversion::plain(),
        }
    }
}

fn format_error(source: &str, message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("invalid float format `{source}`: {}", message.into()))
        .with_hint("Use a single printf-style conversion such as %f, %.3f, %12.4e or %g.")
}

impl FloatFormat {
    pub fn parse(source: &str) -> Result<Self, Error> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut conversion = None;
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '%' {
                if conversion.is_some() {
                    suffix.push(ch);
                } else {
                    prefix.push(ch);
                }
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                if conversion.is_some() {
                    suffix.push('%');
                } else {
                    prefix.push('%');
                }
                continue;
            }
            if conversion.is_some() {
                return Err(format_error(source, "more than one conversion"));
            }

            let mut spec = Conversion::plain();

            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => spec.left_align = true,
                    '+' => spec.plus_sign = true,
                    ' ' => spec.space_sign = true,
                    '0' => spec.zero_pad = true,
                    '#' => spec.alternate = true,
                    _ => break,
                }
                chars.next();
            }

            spec.width = read_number(&mut chars);
            if chars.peek() == Some(&'.') {
                chars.next();
                spec.precision = Some(read_number(&mut chars));
            }
            while matches!(chars.peek(), Some('L' | 'l' | 'h' | 'q')) {
                chars.next();
            }

            let (style, upper) = match chars.next() {
                Some('f') => (Style::Fixed, false),
                Some('F') => (Style::Fixed, true),
                Some('e') => (Style::Exponent, false),
                Some('E') => (Style::Exponent, true),
                Some('g') => (Style::General, false),
                Some('G') => (Style::General, true),
                Some(other) => {
                    return Err(format_error(
                        source,
                        format!("unsupported conversion `{other}`"),
                    ));
                }
                None => return Err(format_error(source, "unterminated conversion")),
            };
            spec.style = style;
            spec.upper = upper;
            conversion = Some(spec);
        }

        let conversion = conversion.ok_or_else(|| format_error(source, "no conversion"))?;
        Ok(Self {
            prefix,
            suffix,
            conversion,
        })
    }

    pub fn render(&self, value: f64) -> String {
        let mut out = String::new();
        self.render_into(&mut out, value);
        out
    }

    pub fn render_into(&self, out: &mut String, value: f64) {
        let spec = &self.conversion;
        out.push_str(&self.prefix);

        let sign = if value.is_sign_negative() && !value.is_nan() {
            "-"
        } else if spec.plus_sign {
            "+"
        } else if spec.space_sign {
            " "
        } else {
            ""
        };

        let body = if value.is_finite() {
            let magnitude = value.abs();
            let precision = spec.precision.unwrap_or(6);
            match spec.style {
                Style::Fixed => fixed(magnitude, precision, spec.alternate),
                Style::Exponent => exponent(magnitude, precision, spec.alternate),
                Style::General => general(magnitude, precision, spec.alternate),
            }
        } else if value.is_nan() {
            "nan".to_string()
        } else {
            "inf".to_string()
        };
        let body = if spec.upper {
            body.to_ascii_uppercase()
        } else {
            body
        };

        let len = sign.len() + body.len();
        let pad = spec.width.saturating_sub(len);
        if spec.left_align {
            out.push_str(sign);
            out.push_str(&body);
            out.extend(std::iter::repeat_n(' ', pad));
        } else if spec.zero_pad && value.is_finite() {
            out.push_str(sign);
            out.extend(std::iter::repeat_n('0', pad));
            out.push_str(&body);
        } else {
            out.extend(std::iter::repeat_n(' ', pad));
            out.push_str(sign);
            out.push_str(&body);
        }

        out.push_str(&self.suffix);
    }
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> usize {
    let mut value = 0usize;
    while let Some(digit) = chars.peek().and_then(|ch| ch.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(digit as usize);
        chars.next();
    }
    value
}

fn fixed(magnitude: f64, precision: usize, alternate: bool) -> String {
    let mut text = format!("{magnitude:.precision$}");
    if alternate && precision == 0 {
        text.push('.');
    }
    text
}

// Rust renders `1.5e0`; printf wants at least two exponent digits and a sign.
fn exponent(magnitude: f64, precision: usize, alternate: bool) -> String {
    let (mantissa, exp) = split_exponent(magnitude, precision);
    let mut text = mantissa;
    if alternate && precision == 0 {
        text.push('.');
    }
    push_exponent(&mut text, exp);
    text
}

fn general(magnitude: f64, precision: usize, alternate: bool) -> String {
    let precision = precision.max(1);
    let (_, exp) = split_exponent(magnitude, precision - 1);
    if exp >= -4 && exp < precision as i32 {
        let decimals = (precision as i32 - 1 - exp) as usize;
        let mut text = format!("{magnitude:.decimals$}");
        if !alternate {
            strip_fraction_zeros(&mut text);
        } else if decimals == 0 {
            text.push('.');
        }
        text
    } else {
        let (mut mantissa, exp) = split_exponent(magnitude, precision - 1);
        if !alternate {
            strip_fraction_zeros(&mut mantissa);
        } else if precision == 1 {
            mantissa.push('.');
        }
        push_exponent(&mut mantissa, exp);
        mantissa
    }
}

fn split_exponent(magnitude: f64, precision: usize) -> (String, i32) {
    let text = format!("{magnitude:.precision$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn push_exponent(text: &mut String, exp: i32) {
    let sign = if exp < 0 { '-' } else { '+' };
    let _ = write!(text, "e{sign}{:02}", exp.unsigned_abs());
}

fn strip_fraction_zeros(text: &mut String) {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
}
