//! CSS Length values and parsing
//!
//! [CSS Values and Units Level 4](https://www.w3.org/TR/css-values-4/)
//!
//! Specified lengths ([`LengthValue`]) are resolved to computed lengths
//! ([`LengthPercentage`]) while the declaration is applied: font-relative and
//! viewport units become pixels, percentages stay until layout knows the
//! containing block.

use serde::Serialize;

use crate::parser::ComponentValue;
use crate::tokenizer::CSSToken;

/// User agent default font size.
/// [§ 3.5 font-size](https://www.w3.org/TR/css-fonts-4/#font-size-prop)
pub const DEFAULT_FONT_SIZE_PX: f32 = 16.0;

/// [§ 6.1 Absolute lengths](https://www.w3.org/TR/css-values-4/#absolute-lengths)
///
/// Pixels per absolute unit, or `None` for relative and unknown units.
#[must_use]
pub fn absolute_unit_px(unit: &str) -> Option<f64> {
    // "1in = 2.54cm = 96px", "1pt = 1/72th of 1in", "1pc = 1/6th of 1in"
    Some(match unit.to_ascii_lowercase().as_str() {
        "px" => 1.0,
        "in" => 96.0,
        "cm" => 96.0 / 2.54,
        "mm" => 96.0 / 25.4,
        "q" => 96.0 / 101.6,
        "pt" => 96.0 / 72.0,
        "pc" => 16.0,
        _ => return None,
    })
}

/// [§ 4.1 Lengths](https://www.w3.org/TR/css-values-4/#lengths)
/// "Lengths refer to distance measurements and are denoted by `<length>` in the
/// property definitions."
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LengthValue {
    /// Absolute length, already converted to px.
    Px(f64),
    /// [§ 5.1.1 Font-relative lengths](https://www.w3.org/TR/css-values-4/#font-relative-lengths)
    /// "Equal to the computed value of the font-size property of the element"
    Em(f64),
    /// "Equal to the computed value of font-size on the root element."
    Rem(f64),
    /// [§ 5.1.2 Viewport-percentage lengths](https://www.w3.org/TR/css-values-4/#viewport-relative-lengths)
    /// "1vw = 1% of viewport width"
    Vw(f64),
    /// "1vh = 1% of viewport height"
    Vh(f64),
    /// [§ 4.3 Percentages](https://www.w3.org/TR/css-values-4/#percentages)
    Percent(f64),
}

/// Inputs needed to turn a [`LengthValue`] into a [`LengthPercentage`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveContext {
    /// Font size that `em` refers to.
    pub font_size: f32,
    /// Root element font size, for `rem`.
    pub root_font_size: f32,
    /// Viewport width in px.
    pub viewport_width: f32,
    /// Viewport height in px.
    pub viewport_height: f32,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE_PX,
            root_font_size: DEFAULT_FONT_SIZE_PX,
            viewport_width: 0.0,
            viewport_height: 0.0,
        }
    }
}

impl LengthValue {
    /// Resolve everything but percentages.
    #[must_use]
    pub fn compute(self, ctx: &ResolveContext) -> LengthPercentage {
        let px = match self {
            Self::Px(px) => px,
            Self::Em(em) => em * f64::from(ctx.font_size),
            Self::Rem(rem) => rem * f64::from(ctx.root_font_size),
            Self::Vw(vw) => vw * f64::from(ctx.viewport_width) / 100.0,
            Self::Vh(vh) => vh * f64::from(ctx.viewport_height) / 100.0,
            Self::Percent(pct) => return LengthPercentage::Percent(pct as f32),
        };
        LengthPercentage::Px(px as f32)
    }
}

/// A computed `<length-percentage>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LengthPercentage {
    /// Absolute length in px.
    Px(f32),
    /// Percentage of a layout-time basis.
    Percent(f32),
}

impl Default for LengthPercentage {
    fn default() -> Self {
        Self::Px(0.0)
    }
}

impl LengthPercentage {
    /// Zero length.
    pub const ZERO: Self = Self::Px(0.0);

    /// [§ 4.3 Percentages](https://www.w3.org/TR/css-values-4/#percentages)
    ///
    /// "Percentages are always relative to another quantity." NaN and
    /// infinite results collapse to zero.
    #[must_use]
    pub fn resolve(self, basis: f32) -> f32 {
        let value = match self {
            Self::Px(px) => px,
            Self::Percent(pct) => pct * basis / 100.0,
        };
        if value.is_finite() { value } else { 0.0 }
    }

    /// True for a percentage.
    #[must_use]
    pub const fn is_percent(self) -> bool {
        matches!(self, Self::Percent(_))
    }
}

/// [§ 4.4 Automatic values](https://www.w3.org/TR/CSS2/cascade.html#value-def-auto)
///
/// "Some properties can take the keyword 'auto' as a value. This keyword
/// allows the user agent to compute the value based on other properties."
///
/// [§ 10.3.3 Block-level, non-replaced elements in normal flow](https://www.w3.org/TR/CSS2/visudet.html#blockwidth)
///
/// "If both 'margin-left' and 'margin-right' are 'auto', their used values
/// are equal. This horizontally centers the element with respect to the
/// edges of the containing block."
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub enum AutoLength {
    /// The value is 'auto' and will be resolved during layout.
    #[default]
    Auto,
    /// A computed length or percentage.
    Length(LengthPercentage),
}

impl AutoLength {
    /// Check if the value is 'auto'.
    #[must_use]
    pub const fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// The resolved length, or `None` for 'auto'.
    #[must_use]
    pub fn resolve(self, basis: f32) -> Option<f32> {
        match self {
            Self::Auto => None,
            Self::Length(len) => Some(len.resolve(basis)),
        }
    }
}

/// [§ 4.1 Lengths](https://www.w3.org/TR/css-values-4/#lengths)
/// Parse a single component value as a `<length-percentage>`.
///
/// "For zero lengths the unit identifier is optional."
#[must_use]
pub fn parse_single_length(v: &ComponentValue) -> Option<LengthValue> {
    match v {
        ComponentValue::Token(CSSToken::Dimension { value, unit, .. }) => {
            if let Some(factor) = absolute_unit_px(unit) {
                return Some(LengthValue::Px(value * factor));
            }
            match unit.to_ascii_lowercase().as_str() {
                "em" => Some(LengthValue::Em(*value)),
                // Approximated as half an em, as most user agents do without font metrics.
                "ex" | "ch" => Some(LengthValue::Em(value * 0.5)),
                "rem" => Some(LengthValue::Rem(*value)),
                "vw" => Some(LengthValue::Vw(*value)),
                "vh" => Some(LengthValue::Vh(*value)),
                _ => None,
            }
        }
        ComponentValue::Token(CSSToken::Percentage(value)) => Some(LengthValue::Percent(*value)),
        ComponentValue::Token(CSSToken::Number { value, .. }) if *value == 0.0 => {
            Some(LengthValue::Px(0.0))
        }
        _ => None,
    }
}

/// Parse a single component value as 'auto' or a length.
#[must_use]
pub fn parse_single_auto_length(v: &ComponentValue) -> Option<Option<LengthValue>> {
    if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("auto")) {
        return Some(None);
    }
    parse_single_length(v).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_value;

    #[test]
    fn test_absolute_units_convert_to_px() {
        let value = parse_value("72pt");
        let Some(LengthValue::Px(px)) = parse_single_length(&value[0]) else {
            panic!("expected px");
        };
        assert!((px - 96.0).abs() < 1e-9);
        let value = parse_value("1in");
        assert_eq!(parse_single_length(&value[0]), Some(LengthValue::Px(96.0)));
    }

    #[test]
    fn test_compute_relative_units() {
        let ctx = ResolveContext {
            font_size: 20.0,
            root_font_size: 10.0,
            viewport_width: 800.0,
            viewport_height: 600.0,
        };
        assert_eq!(LengthValue::Em(2.0).compute(&ctx), LengthPercentage::Px(40.0));
        assert_eq!(LengthValue::Rem(2.0).compute(&ctx), LengthPercentage::Px(20.0));
        assert_eq!(LengthValue::Vh(10.0).compute(&ctx), LengthPercentage::Px(60.0));
        assert_eq!(
            LengthValue::Percent(50.0).compute(&ctx),
            LengthPercentage::Percent(50.0)
        );
    }

    #[test]
    fn test_percent_resolution_clamps_non_finite() {
        assert_eq!(LengthPercentage::Percent(50.0).resolve(300.0), 150.0);
        assert_eq!(LengthPercentage::Percent(50.0).resolve(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_unitless_zero_is_a_length() {
        let value = parse_value("0");
        assert_eq!(parse_single_length(&value[0]), Some(LengthValue::Px(0.0)));
        let value = parse_value("3");
        assert_eq!(parse_single_length(&value[0]), None);
    }
}
