//! CSS Color values and parsing
//!
//! [CSS Color Level 4](https://www.w3.org/TR/css-color-4/)

use serde::Serialize;

use crate::parser::ComponentValue;
use crate::tokenizer::CSSToken;

/// [§ 4 Color syntax](https://www.w3.org/TR/css-color-4/#color-syntax)
/// sRGB color represented as RGBA components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ColorValue {
    /// "the red color channel" (0-255)
    pub r: u8,
    /// "the green color channel" (0-255)
    pub g: u8,
    /// "the blue color channel" (0-255)
    pub b: u8,
    /// "the alpha channel" (0-255, 255 = fully opaque)
    pub a: u8,
}

/// [§ 6.1 Named Colors](https://www.w3.org/TR/css-color-4/#named-colors)
///
/// The CSS 2 basic keywords plus the extended names common in book styles.
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("aqua", [0, 255, 255]),
    ("black", [0, 0, 0]),
    ("blue", [0, 0, 255]),
    ("brown", [165, 42, 42]),
    ("crimson", [220, 20, 60]),
    ("cyan", [0, 255, 255]),
    ("darkblue", [0, 0, 139]),
    ("darkgray", [169, 169, 169]),
    ("darkgreen", [0, 100, 0]),
    ("darkgrey", [169, 169, 169]),
    ("darkred", [139, 0, 0]),
    ("dimgray", [105, 105, 105]),
    ("fuchsia", [255, 0, 255]),
    ("gold", [255, 215, 0]),
    ("gray", [128, 128, 128]),
    ("green", [0, 128, 0]),
    ("grey", [128, 128, 128]),
    ("ivory", [255, 255, 240]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("lime", [0, 255, 0]),
    ("magenta", [255, 0, 255]),
    ("maroon", [128, 0, 0]),
    ("navy", [0, 0, 128]),
    ("olive", [128, 128, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("red", [255, 0, 0]),
    ("silver", [192, 192, 192]),
    ("teal", [0, 128, 128]),
    ("white", [255, 255, 255]),
    ("whitesmoke", [245, 245, 245]),
    ("yellow", [255, 255, 0]),
];

impl ColorValue {
    /// Black (#000000)
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// White (#ffffff)
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// "transparent", the initial `background-color`.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Opaque color from channels.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// [§ 4.2 The RGB hexadecimal notations](https://www.w3.org/TR/css-color-4/#hex-notation)
    /// "The syntax of a <hex-color> is a <hash-token> token whose value consists of
    /// 3, 4, 6, or 8 hexadecimal digits."
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok();
        let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            // "The three-digit RGB notation (#RGB) is converted into six-digit form
            // (#RRGGBB) by replicating digits, not by adding zeros."
            3 | 4 => Some(Self {
                r: digit(0)? * 17,
                g: digit(1)? * 17,
                b: digit(2)? * 17,
                a: if hex.len() == 4 { digit(3)? * 17 } else { 255 },
            }),
            6 | 8 => Some(Self {
                r: pair(0)?,
                g: pair(2)?,
                b: pair(4)?,
                a: if hex.len() == 8 { pair(6)? } else { 255 },
            }),
            _ => None,
        }
    }

    /// [§ 6.1 Named Colors](https://www.w3.org/TR/css-color-4/#named-colors)
    #[must_use]
    pub fn from_named(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower == "transparent" {
            return Some(Self::TRANSPARENT);
        }
        NAMED_COLORS
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, [r, g, b])| Self::rgb(*r, *g, *b))
    }

    /// Convert to hex string notation (#RRGGBB or #RRGGBBAA if alpha != 255)
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Parse a color from a property value, taking the first component that is one.
#[must_use]
pub fn parse_color_value(values: &[ComponentValue]) -> Option<ColorValue> {
    values.iter().find_map(parse_single_color)
}

/// Parse a single component value as a color.
#[must_use]
pub fn parse_single_color(v: &ComponentValue) -> Option<ColorValue> {
    match v {
        ComponentValue::Token(CSSToken::Hash { value, .. }) => ColorValue::from_hex(value),
        ComponentValue::Token(CSSToken::Ident(name)) => ColorValue::from_named(name),
        ComponentValue::Function { name, value } => match name.to_ascii_lowercase().as_str() {
            "rgb" | "rgba" => parse_rgb_function(value),
            "hsl" | "hsla" => parse_hsl_function(value),
            _ => None,
        },
        ComponentValue::Block { .. } | ComponentValue::Token(_) => None,
    }
}

/// Numeric arguments of a color function; commas, whitespace and the `/`
/// before alpha are all separators.
fn color_args(args: &[ComponentValue]) -> Vec<(f64, bool)> {
    args.iter()
        .filter_map(|arg| match arg {
            ComponentValue::Token(CSSToken::Number { value, .. }) => Some((*value, false)),
            ComponentValue::Token(CSSToken::Percentage(value)) => Some((*value, true)),
            // Hue angles.
            ComponentValue::Token(CSSToken::Dimension { value, unit, .. })
                if unit.eq_ignore_ascii_case("deg") =>
            {
                Some((*value, false))
            }
            _ => None,
        })
        .collect()
}

fn channel(arg: (f64, bool)) -> u8 {
    let v = if arg.1 { arg.0 * 255.0 / 100.0 } else { arg.0 };
    v.round().clamp(0.0, 255.0) as u8
}

fn alpha(arg: Option<&(f64, bool)>) -> u8 {
    arg.map_or(255, |&(v, pct)| {
        let v = if pct { v / 100.0 } else { v };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    })
}

/// [§ 4.1 The RGB Functions](https://www.w3.org/TR/css-color-4/#rgb-functions)
///
/// "Values outside these ranges are not invalid, but are clamped to the
/// ranges defined here at parsed-value time."
fn parse_rgb_function(args: &[ComponentValue]) -> Option<ColorValue> {
    let vals = color_args(args);
    if vals.len() < 3 {
        return None;
    }
    Some(ColorValue {
        r: channel(vals[0]),
        g: channel(vals[1]),
        b: channel(vals[2]),
        a: alpha(vals.get(3)),
    })
}

/// [§ 7.1 The HSL Notation](https://www.w3.org/TR/css-color-4/#the-hsl-notation)
fn parse_hsl_function(args: &[ComponentValue]) -> Option<ColorValue> {
    let vals = color_args(args);
    if vals.len() < 3 {
        return None;
    }
    let h = vals[0].0.rem_euclid(360.0) / 60.0;
    let s = (vals[1].0 / 100.0).clamp(0.0, 1.0);
    let l = (vals[2].0 / 100.0).clamp(0.0, 1.0);
    let c = (1.0 - 2.0f64.mul_add(l, -1.0).abs()) * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Some(ColorValue {
        r: to_u8(r),
        g: to_u8(g),
        b: to_u8(b),
        a: alpha(vals.get(3)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_value;

    #[test]
    fn test_hex_forms() {
        assert_eq!(ColorValue::from_hex("#f00"), Some(ColorValue::rgb(255, 0, 0)));
        assert_eq!(ColorValue::from_hex("0000ff"), Some(ColorValue::rgb(0, 0, 255)));
        assert_eq!(ColorValue::from_hex("#ff000080").map(|c| c.a), Some(128));
        assert_eq!(ColorValue::from_hex("#ggg"), None);
    }

    #[test]
    fn test_named_and_functions() {
        assert_eq!(
            parse_color_value(&parse_value("Blue")),
            Some(ColorValue::rgb(0, 0, 255))
        );
        assert_eq!(
            parse_color_value(&parse_value("rgb(0, 128, 0)")),
            Some(ColorValue::rgb(0, 128, 0))
        );
        assert_eq!(
            parse_color_value(&parse_value("hsl(0, 100%, 50%)")),
            Some(ColorValue::rgb(255, 0, 0))
        );
    }
}
