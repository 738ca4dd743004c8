//! CSS Computed Style
//!
//! [§ 4.4 Computed Values](https://www.w3.org/TR/css-cascade-4/#computed)
//! "The computed value is the result of resolving the specified value..."
//!
//! A [`ComputedStyle`] starts as a copy of the parent's inherited properties
//! and receives the winning declarations in ascending cascade order, so the
//! last one applied wins. Font-relative and viewport units are resolved as
//! each declaration is applied; percentages wait for layout.

use serde::Serialize;
use thiserror::Error;

use crate::counters::CounterStyle;
use crate::expr::{Content, parse_content};
use crate::parser::ComponentValue;
use crate::tokenizer::CSSToken;

use super::display::{DisplayValue, ParsedDisplay, parse_display_value};
use super::keywords::{
    BorderStyle, BoxSizing, BreakInside, BreakValue, Clear, ColumnFill, Float, FontStyle,
    Hyphens, TextAlign, WhiteSpace,
};
use super::values::{
    AutoLength, ColorValue, DEFAULT_FONT_SIZE_PX, LengthPercentage, ResolveContext, parse_single_auto_length, parse_single_color, parse_single_length,
};
use super::writing_mode::{Direction, LogicalSide, PhysicalSide, WritingMode};

/// A declaration that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    /// "Unknown properties are dropped."
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    /// The value does not match the property's grammar.
    #[error("invalid value for '{property}': {value}")]
    InvalidValue {
        /// Property name.
        property: String,
        /// Value as written.
        value: String,
    },
}

/// [§ 4.2 'line-height'](https://www.w3.org/TR/css-inline-3/#line-height-property)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum LineHeight {
    /// "Tells user agents to set the used value to a 'reasonable' value based
    /// on the font of the element." 1.2 here.
    #[default]
    Normal,
    /// Multiplier of the element's font size; inherited as a number.
    Number(f32),
    /// Absolute height.
    Px(f32),
}

impl LineHeight {
    /// Used line height for a font size.
    #[must_use]
    pub fn resolve(self, font_size: f32) -> f32 {
        match self {
            Self::Normal => font_size * 1.2,
            Self::Number(n) => font_size * n,
            Self::Px(px) => px,
        }
    }
}

/// Computed styles for an element or pseudo-element.
///
/// Physical per-side arrays are indexed by [`PhysicalSide::index`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedStyle {
    /// [§ 2 'display'](https://www.w3.org/TR/css-display-3/#the-display-properties)
    pub display: DisplayValue,
    /// "The element and its descendants generate no boxes or text runs."
    pub display_none: bool,
    /// [§ 9.5.1 'float'](https://www.w3.org/TR/CSS2/visuren.html#float-position)
    pub float: Float,
    /// [§ 9.5.2 'clear'](https://www.w3.org/TR/CSS2/visuren.html#flow-control)
    pub clear: Clear,

    /// [§ 2 'writing-mode'](https://www.w3.org/TR/css-writing-modes-4/#block-flow)
    pub writing_mode: WritingMode,
    /// [§ 2.1 'direction'](https://www.w3.org/TR/css-writing-modes-4/#direction)
    pub direction: Direction,

    /// [§ 10.2 'width'](https://www.w3.org/TR/CSS2/visudet.html#the-width-property)
    pub width: AutoLength,
    /// [§ 10.5 'height'](https://www.w3.org/TR/CSS2/visudet.html#the-height-property)
    pub height: AutoLength,
    /// 'min-width', initial 0.
    pub min_width: LengthPercentage,
    /// 'max-width', `None` for "none".
    pub max_width: Option<LengthPercentage>,
    /// 'min-height', initial 0.
    pub min_height: LengthPercentage,
    /// 'max-height', `None` for "none".
    pub max_height: Option<LengthPercentage>,
    /// [§ 4.1 'box-sizing'](https://www.w3.org/TR/css-sizing-3/#box-sizing)
    pub box_sizing: BoxSizing,

    /// Margins, `[top, right, bottom, left]`.
    pub margin: [AutoLength; 4],
    /// Padding, `[top, right, bottom, left]`.
    pub padding: [LengthPercentage; 4],
    /// Specified border widths in px.
    pub border_width: [f32; 4],
    /// Border styles.
    pub border_style: [BorderStyle; 4],
    /// Border colors; `None` is `currentColor`.
    pub border_color: [Option<ColorValue>; 4],

    /// Computed font size in px.
    pub font_size: f32,
    /// First family of 'font-family'.
    pub font_family: String,
    /// Numeric weight, 100-900.
    pub font_weight: u16,
    /// 'font-style'
    pub font_style: FontStyle,
    /// 'line-height'
    pub line_height: LineHeight,
    /// 'color'
    pub color: ColorValue,
    /// 'background-color'
    pub background_color: ColorValue,

    /// 'white-space'
    pub white_space: WhiteSpace,
    /// 'text-align'
    pub text_align: TextAlign,
    /// 'text-indent'
    pub text_indent: LengthPercentage,
    /// 'hyphens'
    pub hyphens: Hyphens,

    /// [CSS Fragmentation § 3.1](https://www.w3.org/TR/css-break-3/#break-between)
    pub break_before: BreakValue,
    /// 'break-after'
    pub break_after: BreakValue,
    /// 'break-inside'
    pub break_inside: BreakInside,
    /// [§ 3.3 'orphans'](https://www.w3.org/TR/css-break-3/#widows-orphans):
    /// "minimum number of lines in a block container that must be left at the
    /// bottom of a fragment".
    pub orphans: u32,
    /// 'widows': minimum lines at the top of a fragment.
    pub widows: u32,

    /// [CSS Multi-column § 3](https://www.w3.org/TR/css-multicol-1/#the-number-and-width-of-columns)
    pub column_count: Option<u32>,
    /// 'column-width' in px, `None` for auto.
    pub column_width: Option<f32>,
    /// 'column-gap' in px ("normal" is 1em).
    pub column_gap: f32,
    /// 'column-fill'
    pub column_fill: ColumnFill,

    /// [CSS Regions § 2.1 'flow-into'](https://www.w3.org/TR/css-regions-1/#the-flow-into-property)
    pub flow_into: Option<String>,
    /// [CSS Regions § 2.2 'flow-from'](https://www.w3.org/TR/css-regions-1/#the-flow-from-property)
    pub flow_from: Option<String>,

    /// 'counter-reset' pairs.
    pub counter_reset: Vec<(String, i32)>,
    /// 'counter-increment' pairs.
    pub counter_increment: Vec<(String, i32)>,
    /// 'counter-set' pairs.
    pub counter_set: Vec<(String, i32)>,
    /// 'list-style-type'
    pub list_style_type: CounterStyle,
    /// 'content'
    pub content: Content,
    /// [CSS Paged Media § 5 'page'](https://www.w3.org/TR/css-page-3/#using-named-pages)
    pub page: Option<String>,
}

impl Default for ComputedStyle {
    /// Initial values of every property.
    fn default() -> Self {
        Self {
            display: DisplayValue::default(),
            display_none: false,
            float: Float::None,
            clear: Clear::None,
            writing_mode: WritingMode::HorizontalTb,
            direction: Direction::Ltr,
            width: AutoLength::Auto,
            height: AutoLength::Auto,
            min_width: LengthPercentage::ZERO,
            max_width: None,
            min_height: LengthPercentage::ZERO,
            max_height: None,
            box_sizing: BoxSizing::ContentBox,
            margin: [AutoLength::Length(LengthPercentage::ZERO); 4],
            padding: [LengthPercentage::ZERO; 4],
            // "Initial: medium"
            border_width: [3.0; 4],
            border_style: [BorderStyle::None; 4],
            border_color: [None; 4],
            font_size: DEFAULT_FONT_SIZE_PX,
            font_family: "serif".to_string(),
            font_weight: 400,
            font_style: FontStyle::Normal,
            line_height: LineHeight::Normal,
            color: ColorValue::BLACK,
            background_color: ColorValue::TRANSPARENT,
            white_space: WhiteSpace::Normal,
            text_align: TextAlign::Start,
            text_indent: LengthPercentage::ZERO,
            hyphens: Hyphens::Manual,
            break_before: BreakValue::Auto,
            break_after: BreakValue::Auto,
            break_inside: BreakInside::Auto,
            orphans: 2,
            widows: 2,
            column_count: None,
            column_width: None,
            column_gap: DEFAULT_FONT_SIZE_PX,
            column_fill: ColumnFill::Balance,
            flow_into: None,
            flow_from: None,
            counter_reset: Vec::new(),
            counter_increment: Vec::new(),
            counter_set: Vec::new(),
            list_style_type: CounterStyle::Disc,
            content: Content::Normal,
            page: None,
        }
    }
}

/// Properties applied before all others, because other values depend on them.
const EARLY_PROPERTIES: &[&str] = &["font-size", "font", "writing-mode", "direction"];

/// Recognized properties that have no effect on pagination.
const IGNORED_PROPERTIES: &[&str] = &[
    "border-radius",
    "box-shadow",
    "cursor",
    "font-variant",
    "letter-spacing",
    "list-style-image",
    "list-style-position",
    "opacity",
    "outline",
    "overflow",
    "quotes",
    "text-decoration",
    "text-rendering",
    "text-transform",
    "vertical-align",
    "visibility",
    "word-spacing",
    "z-index",
];

/// Prefixes under which engines shipped the properties paginated books use.
const VENDOR_PREFIXES: &[&str] = &["-epubx-", "-adapt-", "-webkit-", "-moz-"];

/// Drop a vendor prefix from a property name.
#[must_use]
pub fn unprefixed(name: &str) -> &str {
    VENDOR_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

fn components(values: &[ComponentValue]) -> Vec<&ComponentValue> {
    values.iter().filter(|v| !v.is_whitespace()).collect()
}

fn single_keyword(values: &[ComponentValue]) -> Option<String> {
    match components(values).as_slice() {
        [value] => value.as_ident().map(str::to_ascii_lowercase),
        _ => None,
    }
}

fn single<'a>(parts: &[&'a ComponentValue]) -> Option<&'a ComponentValue> {
    match parts {
        [value] => Some(*value),
        _ => None,
    }
}

fn keyword<T: std::str::FromStr>(values: &[ComponentValue]) -> Option<T> {
    single_keyword(values)?.parse().ok()
}

fn integer(value: &ComponentValue) -> Option<i32> {
    match value {
        ComponentValue::Token(CSSToken::Number {
            value,
            integer: true,
        }) => Some(*value as i32),
        _ => None,
    }
}

/// Expand 1 to 4 values into `[top, right, bottom, left]`.
///
/// "If there is only one component value, it applies to all sides. If there
/// are two values, the top and bottom are set to the first value and the right
/// and left are set to the second. If there are three values, the top is set
/// to the first value, the left and right are set to the second, and the bottom
/// is set to the third. If there are four values, they apply to the top, right,
/// bottom, and left, respectively."
fn expand_sides<T: Copy>(values: &[T]) -> Option<[T; 4]> {
    match *values {
        [a] => Some([a, a, a, a]),
        [a, b] => Some([a, b, a, b]),
        [a, b, c] => Some([a, b, c, b]),
        [a, b, c, d] => Some([a, b, c, d]),
        _ => None,
    }
}

impl ComputedStyle {
    /// The style an element starts from: inherited properties copied from
    /// `parent`, everything else at its initial value.
    ///
    /// [§ 7.2 Inheritance](https://www.w3.org/TR/css-cascade-4/#inheriting)
    #[must_use]
    pub fn inherit_from(parent: &Self) -> Self {
        Self {
            writing_mode: parent.writing_mode,
            direction: parent.direction,
            font_size: parent.font_size,
            font_family: parent.font_family.clone(),
            font_weight: parent.font_weight,
            font_style: parent.font_style,
            line_height: parent.line_height,
            color: parent.color,
            white_space: parent.white_space,
            text_align: parent.text_align,
            text_indent: parent.text_indent,
            hyphens: parent.hyphens,
            orphans: parent.orphans,
            widows: parent.widows,
            list_style_type: parent.list_style_type,
            ..Self::default()
        }
    }

    /// Whether a property must be applied in the first pass.
    #[must_use]
    pub fn is_early_property(name: &str) -> bool {
        EARLY_PROPERTIES.contains(&unprefixed(name))
    }

    /// Used line height in px.
    #[must_use]
    pub fn line_height_px(&self) -> f32 {
        self.line_height.resolve(self.font_size)
    }

    /// Used border width of a side: zero when the style is `none`/`hidden`.
    #[must_use]
    pub fn border_used(&self, side: PhysicalSide) -> f32 {
        if self.border_style[side.index()].is_visible() {
            self.border_width[side.index()].max(0.0)
        } else {
            0.0
        }
    }

    /// The element is taken out of the flow as a float or footnote.
    #[must_use]
    pub const fn is_out_of_flow(&self) -> bool {
        !matches!(self.float, Float::None)
    }

    /// Physical side a flow-relative side maps to for this element.
    #[must_use]
    pub const fn physical(&self, side: LogicalSide) -> PhysicalSide {
        self.writing_mode.physical(self.direction, side)
    }

    /// Apply one declaration.
    ///
    /// `parent` supplies `inherit` and the basis of `em` in `font-size`; `ctx`
    /// supplies the root font size and viewport for `rem`/`vw`/`vh`.
    ///
    /// # Errors
    ///
    /// [`StyleError`] for unknown properties and values that do not parse; the
    /// caller logs and drops the declaration.
    pub fn apply_declaration(
        &mut self,
        name: &str,
        value: &[ComponentValue],
        parent: &Self,
        ctx: &ResolveContext,
    ) -> Result<(), StyleError> {
        let property = unprefixed(name);
        let invalid = || StyleError::InvalidValue {
            property: name.to_string(),
            value: value.iter().map(ToString::to_string).collect(),
        };

        // [§ 7.3 Explicit Defaulting](https://www.w3.org/TR/css-cascade-4/#defaulting-keywords)
        if let Some(keyword) = single_keyword(value)
            && matches!(keyword.as_str(), "inherit" | "initial" | "unset")
        {
            let initial = Self::default();
            let inherits =
                keyword == "inherit" || (keyword == "unset" && Self::is_inherited(property));
            let source = if inherits { parent } else { &initial };
            return if self.copy_property(property, source) {
                Ok(())
            } else {
                Err(StyleError::UnknownProperty(name.to_string()))
            };
        }

        let own = ResolveContext {
            font_size: self.font_size,
            ..*ctx
        };
        let length = |v: &ComponentValue| parse_single_length(v).map(|l| l.compute(&own));
        let non_negative = |v: &ComponentValue| length(v).filter(|l| l.resolve(100.0) >= 0.0);
        let auto_length = |v: &ComponentValue| {
            parse_single_auto_length(v).map(|l| l.map_or(AutoLength::Auto, |l| AutoLength::Length(l.compute(&own))))
        };
        let parts = components(value);

        match property {
            "display" => match parse_display_value(value).ok_or_else(invalid)? {
                ParsedDisplay::None => self.display_none = true,
                ParsedDisplay::Box(display) => {
                    self.display = display;
                    self.display_none = false;
                }
            },
            "float" => {
                let kw = single_keyword(value).ok_or_else(invalid)?;
                // Flow-relative values map through the inline direction.
                self.float = match kw.as_str() {
                    "inline-start" | "start" => self.line_left_or_right(true),
                    "inline-end" | "end" => self.line_left_or_right(false),
                    _ => kw.parse().map_err(|_| invalid())?,
                };
            }
            "clear" => self.clear = keyword(value).ok_or_else(invalid)?,
            "writing-mode" => {
                self.writing_mode = match single_keyword(value).ok_or_else(invalid)?.as_str() {
                    // SVG 1.1 aliases.
                    "lr-tb" | "lr" | "horizontal-tb" => WritingMode::HorizontalTb,
                    "tb-rl" | "tb" | "vertical-rl" => WritingMode::VerticalRl,
                    "tb-lr" | "vertical-lr" => WritingMode::VerticalLr,
                    _ => return Err(invalid()),
                };
            }
            "direction" => self.direction = keyword(value).ok_or_else(invalid)?,
            "box-sizing" => self.box_sizing = keyword(value).ok_or_else(invalid)?,

            "width" | "height" | "inline-size" | "block-size" => {
                let v = single(&parts).ok_or_else(invalid)?;
                let size = auto_length(v)
                    .filter(|l| l.resolve(100.0).is_none_or(|px| px >= 0.0))
                    .ok_or_else(invalid)?;
                if self.is_width_property(property) {
                    self.width = size;
                } else {
                    self.height = size;
                }
            }
            "min-width" | "min-height" | "min-inline-size" | "min-block-size" => {
                let v = single(&parts).ok_or_else(invalid)?;
                let size = if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("auto")) {
                    LengthPercentage::ZERO
                } else {
                    non_negative(v).ok_or_else(invalid)?
                };
                if self.is_width_property(property) {
                    self.min_width = size;
                } else {
                    self.min_height = size;
                }
            }
            "max-width" | "max-height" | "max-inline-size" | "max-block-size" => {
                let v = single(&parts).ok_or_else(invalid)?;
                let size = if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("none")) {
                    None
                } else {
                    Some(non_negative(v).ok_or_else(invalid)?)
                };
                if self.is_width_property(property) {
                    self.max_width = size;
                } else {
                    self.max_height = size;
                }
            }

            "margin" => {
                let values: Option<Vec<AutoLength>> = parts.iter().map(|v| auto_length(*v)).collect();
                self.margin = values.as_deref().and_then(expand_sides).ok_or_else(invalid)?;
            }
            "padding" => {
                let values: Option<Vec<LengthPercentage>> =
                    parts.iter().map(|v| non_negative(*v)).collect();
                self.padding = values.as_deref().and_then(expand_sides).ok_or_else(invalid)?;
            }
            "margin-block" | "margin-inline" | "padding-block" | "padding-inline" => {
                let block = property.ends_with("block");
                let (start, end) = if block {
                    (LogicalSide::BlockStart, LogicalSide::BlockEnd)
                } else {
                    (LogicalSide::InlineStart, LogicalSide::InlineEnd)
                };
                let sides = [self.physical(start), self.physical(end)];
                let (first, second) = match parts.as_slice() {
                    [a] => (*a, *a),
                    [a, b] => (*a, *b),
                    _ => return Err(invalid()),
                };
                for (side, v) in sides.into_iter().zip([first, second]) {
                    if property.starts_with("margin") {
                        self.margin[side.index()] = auto_length(v).ok_or_else(invalid)?;
                    } else {
                        self.padding[side.index()] = non_negative(v).ok_or_else(invalid)?;
                    }
                }
            }
            _ if property.starts_with("margin-") || property.starts_with("padding-") => {
                let (kind, side_name) = property.split_once('-').ok_or_else(invalid)?;
                let side = self
                    .side_from_name(side_name)
                    .ok_or_else(|| StyleError::UnknownProperty(name.to_string()))?;
                let v = single(&parts).ok_or_else(invalid)?;
                if kind == "margin" {
                    self.margin[side.index()] = auto_length(v).ok_or_else(invalid)?;
                } else {
                    self.padding[side.index()] = non_negative(v).ok_or_else(invalid)?;
                }
            }

            "border" => {
                let (width, style, color) = self.parse_border_side(&parts).ok_or_else(invalid)?;
                self.border_width = [width; 4];
                self.border_style = [style; 4];
                self.border_color = [color; 4];
            }
            "border-width" => {
                let values: Option<Vec<f32>> = parts.iter().map(|v| border_width(v, &own)).collect();
                self.border_width = values.as_deref().and_then(expand_sides).ok_or_else(invalid)?;
            }
            "border-style" => {
                let values: Option<Vec<BorderStyle>> = parts
                    .iter()
                    .map(|v| v.as_ident().and_then(|i| i.parse().ok()))
                    .collect();
                self.border_style = values.as_deref().and_then(expand_sides).ok_or_else(invalid)?;
            }
            "border-color" => {
                let values: Option<Vec<Option<ColorValue>>> =
                    parts.iter().map(|v| parse_single_color(v).map(Some)).collect();
                self.border_color = values.as_deref().and_then(expand_sides).ok_or_else(invalid)?;
            }
            _ if property.starts_with("border-") => {
                // border-<side>, border-<side>-width|style|color
                let rest = &property["border-".len()..];
                let (side_name, part) = match rest.rsplit_once('-') {
                    Some((side, part @ ("width" | "style" | "color"))) => (side, Some(part)),
                    _ => (rest, None),
                };
                let side = self
                    .side_from_name(side_name)
                    .ok_or_else(|| StyleError::UnknownProperty(name.to_string()))?;
                let i = side.index();
                match part {
                    None => {
                        let (width, style, color) =
                            self.parse_border_side(&parts).ok_or_else(invalid)?;
                        self.border_width[i] = width;
                        self.border_style[i] = style;
                        self.border_color[i] = color;
                    }
                    Some("width") => {
                        let v = single(&parts).ok_or_else(invalid)?;
                        self.border_width[i] = border_width(v, &own).ok_or_else(invalid)?;
                    }
                    Some("style") => self.border_style[i] = keyword(value).ok_or_else(invalid)?,
                    _ => {
                        let v = single(&parts).ok_or_else(invalid)?;
                        self.border_color[i] = Some(parse_single_color(v).ok_or_else(invalid)?);
                    }
                }
            }

            "font-size" => self.font_size = font_size(&parts, parent, ctx).ok_or_else(invalid)?,
            "font-family" => self.font_family = font_family(value).ok_or_else(invalid)?,
            "font-weight" => {
                let v = single(&parts).ok_or_else(invalid)?;
                self.font_weight = font_weight(v, parent.font_weight).ok_or_else(invalid)?;
            }
            "font-style" => self.font_style = keyword(value).ok_or_else(invalid)?,
            "font" => self.apply_font_shorthand(&parts, parent, ctx).ok_or_else(invalid)?,
            "line-height" => {
                let v = single(&parts).ok_or_else(invalid)?;
                self.line_height = line_height(v, &own).ok_or_else(invalid)?;
            }
            "color" => {
                let v = single(&parts).ok_or_else(invalid)?;
                self.color = if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("currentcolor")) {
                    parent.color
                } else {
                    parse_single_color(v).ok_or_else(invalid)?
                };
            }
            "background-color" | "background" => {
                self.background_color = parts
                    .iter()
                    .find_map(|v| parse_single_color(v))
                    .or_else(|| single_keyword(value).filter(|k| k == "none").map(|_| ColorValue::TRANSPARENT))
                    .ok_or_else(invalid)?;
            }

            "white-space" => self.white_space = keyword(value).ok_or_else(invalid)?,
            "text-align" => {
                self.text_align = match single_keyword(value).ok_or_else(invalid)?.as_str() {
                    "-epubx-start" | "start" => TextAlign::Start,
                    "-epubx-end" | "end" => TextAlign::End,
                    other => other.parse().map_err(|_| invalid())?,
                };
            }
            "text-indent" => {
                let v = single(&parts).ok_or_else(invalid)?;
                self.text_indent = length(v).ok_or_else(invalid)?;
            }
            "hyphens" => self.hyphens = keyword(value).ok_or_else(invalid)?,

            "break-before" | "break-after" => {
                let parsed: BreakValue = keyword(value).ok_or_else(invalid)?;
                if property == "break-before" {
                    self.break_before = parsed;
                } else {
                    self.break_after = parsed;
                }
            }
            "page-break-before" | "page-break-after" => {
                let parsed = single_keyword(value)
                    .and_then(|k| BreakValue::from_legacy(&k))
                    .ok_or_else(invalid)?;
                if property == "page-break-before" {
                    self.break_before = parsed;
                } else {
                    self.break_after = parsed;
                }
            }
            "break-inside" => self.break_inside = keyword(value).ok_or_else(invalid)?,
            "page-break-inside" => {
                self.break_inside = match single_keyword(value).ok_or_else(invalid)?.as_str() {
                    "avoid" => BreakInside::Avoid,
                    "auto" => BreakInside::Auto,
                    _ => return Err(invalid()),
                };
            }
            "orphans" | "widows" => {
                let v = single(&parts).ok_or_else(invalid)?;
                // "Negative values and zero are invalid."
                let n = integer(v).filter(|n| *n >= 1).ok_or_else(invalid)? as u32;
                if property == "orphans" {
                    self.orphans = n;
                } else {
                    self.widows = n;
                }
            }

            "column-count" => {
                self.column_count = match parts.as_slice() {
                    [v] if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("auto")) => None,
                    [v] => Some(integer(v).filter(|n| *n >= 1).ok_or_else(invalid)? as u32),
                    _ => return Err(invalid()),
                };
            }
            "column-width" => {
                self.column_width = match parts.as_slice() {
                    [v] if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("auto")) => None,
                    [v] => match length(v) {
                        Some(LengthPercentage::Px(px)) if px > 0.0 => Some(px),
                        _ => return Err(invalid()),
                    },
                    _ => return Err(invalid()),
                };
            }
            "columns" => {
                let mut count = None;
                let mut width = None;
                for v in &parts {
                    if let Some(n) = integer(*v) {
                        count = Some(u32::try_from(n.max(1)).unwrap_or(1));
                    } else if let Some(LengthPercentage::Px(px)) = length(*v) {
                        width = Some(px);
                    } else if !v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("auto")) {
                        return Err(invalid());
                    }
                }
                self.column_count = count;
                self.column_width = width;
            }
            "column-gap" | "gap" => {
                self.column_gap = match parts.as_slice() {
                    [v] if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("normal")) => {
                        self.font_size
                    }
                    [v] => match length(v) {
                        Some(LengthPercentage::Px(px)) if px >= 0.0 => px,
                        _ => return Err(invalid()),
                    },
                    _ => return Err(invalid()),
                };
            }
            "column-fill" => self.column_fill = keyword(value).ok_or_else(invalid)?,
            "column-rule" | "column-rule-width" | "column-rule-style" | "column-rule-color"
            | "column-span" => {}

            "flow-into" | "flow-from" => {
                let kw = match parts.as_slice() {
                    [v] => v.as_ident().map(str::to_string).ok_or_else(invalid)?,
                    _ => return Err(invalid()),
                };
                let flow = (!kw.eq_ignore_ascii_case("none")).then_some(kw);
                if property == "flow-into" {
                    self.flow_into = flow;
                } else {
                    self.flow_from = flow;
                }
            }

            "counter-reset" => self.counter_reset = counter_list(&parts, 0).ok_or_else(invalid)?,
            "counter-increment" => {
                self.counter_increment = counter_list(&parts, 1).ok_or_else(invalid)?;
            }
            "counter-set" => self.counter_set = counter_list(&parts, 0).ok_or_else(invalid)?,
            "list-style-type" => self.list_style_type = keyword(value).ok_or_else(invalid)?,
            "list-style" => {
                if let Some(style) = parts
                    .iter()
                    .find_map(|v| v.as_ident().and_then(|i| i.parse::<CounterStyle>().ok()))
                {
                    self.list_style_type = style;
                }
            }
            "content" => self.content = parse_content(value).map_err(|_| invalid())?,
            "page" => {
                self.page = match single_keyword(value).ok_or_else(invalid)?.as_str() {
                    "auto" => None,
                    _ => parts.first().and_then(|v| v.as_ident()).map(str::to_string),
                };
            }
            _ if IGNORED_PROPERTIES.contains(&property) => {}
            _ => return Err(StyleError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    /// Float side for a flow-relative float value.
    const fn line_left_or_right(&self, start: bool) -> Float {
        let rtl = matches!(self.direction, Direction::Rtl);
        if start != rtl { Float::Left } else { Float::Right }
    }

    /// Whether a sizing property names the physical width of this element.
    fn is_width_property(&self, property: &str) -> bool {
        let logical_inline = property.contains("inline-size");
        let logical_block = property.contains("block-size");
        if logical_inline {
            !self.writing_mode.is_vertical()
        } else if logical_block {
            self.writing_mode.is_vertical()
        } else {
            property.contains("width")
        }
    }

    /// Physical side for a `margin-*`/`padding-*`/`border-*` suffix.
    fn side_from_name(&self, name: &str) -> Option<PhysicalSide> {
        let logical = match name {
            "top" => return Some(PhysicalSide::Top),
            "right" => return Some(PhysicalSide::Right),
            "bottom" => return Some(PhysicalSide::Bottom),
            "left" => return Some(PhysicalSide::Left),
            "block-start" | "before" => LogicalSide::BlockStart,
            "block-end" | "after" => LogicalSide::BlockEnd,
            "inline-start" | "start" => LogicalSide::InlineStart,
            "inline-end" | "end" => LogicalSide::InlineEnd,
            _ => return None,
        };
        Some(self.physical(logical))
    }

    /// `<line-width> || <line-style> || <color>`
    fn parse_border_side(
        &self,
        parts: &[&ComponentValue],
    ) -> Option<(f32, BorderStyle, Option<ColorValue>)> {
        let own = ResolveContext {
            font_size: self.font_size,
            ..ResolveContext::default()
        };
        let mut width = None;
        let mut style = None;
        let mut color = None;
        for v in parts {
            if width.is_none()
                && let Some(w) = border_width(v, &own)
            {
                width = Some(w);
            } else if style.is_none()
                && let Some(s) = v.as_ident().and_then(|i| i.parse::<BorderStyle>().ok())
            {
                style = Some(s);
            } else if color.is_none()
                && let Some(c) = parse_single_color(v)
            {
                color = Some(c);
            } else {
                return None;
            }
        }
        if parts.is_empty() {
            return None;
        }
        // Omitted sub-properties reset to their initial values.
        Some((width.unwrap_or(3.0), style.unwrap_or_default(), color))
    }

    /// [§ 3.7 'font'](https://www.w3.org/TR/css-fonts-4/#font-prop)
    ///
    /// `[ <font-style> || <font-weight> ]? <font-size> [ / <line-height> ]? <font-family>`
    fn apply_font_shorthand(
        &mut self,
        parts: &[&ComponentValue],
        parent: &Self,
        ctx: &ResolveContext,
    ) -> Option<()> {
        let mut style = FontStyle::Normal;
        let mut weight = 400;
        let mut index = 0;
        while let Some(v) = parts.get(index) {
            if let Some(s) = v.as_ident().and_then(|i| i.parse::<FontStyle>().ok()) {
                style = s;
            } else if let Some(w) = font_weight(v, parent.font_weight)
                && !matches!(v, ComponentValue::Token(CSSToken::Dimension { .. }))
            {
                weight = w;
            } else {
                break;
            }
            index += 1;
        }
        let size = font_size(parts.get(index..=index)?, parent, ctx)?;
        index += 1;
        let mut line = LineHeight::Normal;
        if matches!(parts.get(index), Some(ComponentValue::Token(CSSToken::Delim('/')))) {
            let own = ResolveContext {
                font_size: size,
                ..*ctx
            };
            line = line_height(parts.get(index + 1)?, &own)?;
            index += 2;
        }
        let family = font_family_parts(&parts[index.min(parts.len())..])?;
        self.font_style = style;
        self.font_weight = weight;
        self.font_size = size;
        self.line_height = line;
        self.font_family = family;
        Some(())
    }

    /// Copy one property (or every longhand of a shorthand) from `source`.
    /// Returns `false` for unknown names.
    fn copy_property(&mut self, property: &str, source: &Self) -> bool {
        match property {
            "display" => {
                self.display = source.display;
                self.display_none = source.display_none;
            }
            "float" => self.float = source.float,
            "clear" => self.clear = source.clear,
            "writing-mode" => self.writing_mode = source.writing_mode,
            "direction" => self.direction = source.direction,
            "box-sizing" => self.box_sizing = source.box_sizing,
            "width" => self.width = source.width,
            "height" => self.height = source.height,
            "min-width" => self.min_width = source.min_width,
            "min-height" => self.min_height = source.min_height,
            "max-width" => self.max_width = source.max_width,
            "max-height" => self.max_height = source.max_height,
            "margin" => self.margin = source.margin,
            "padding" => self.padding = source.padding,
            "border" => {
                self.border_width = source.border_width;
                self.border_style = source.border_style;
                self.border_color = source.border_color;
            }
            "border-width" => self.border_width = source.border_width,
            "border-style" => self.border_style = source.border_style,
            "border-color" => self.border_color = source.border_color,
            "font" => {
                self.font_size = source.font_size;
                self.font_family.clone_from(&source.font_family);
                self.font_weight = source.font_weight;
                self.font_style = source.font_style;
                self.line_height = source.line_height;
            }
            "font-size" => self.font_size = source.font_size,
            "font-family" => self.font_family.clone_from(&source.font_family),
            "font-weight" => self.font_weight = source.font_weight,
            "font-style" => self.font_style = source.font_style,
            "line-height" => self.line_height = source.line_height,
            "color" => self.color = source.color,
            "background-color" | "background" => self.background_color = source.background_color,
            "white-space" => self.white_space = source.white_space,
            "text-align" => self.text_align = source.text_align,
            "text-indent" => self.text_indent = source.text_indent,
            "hyphens" => self.hyphens = source.hyphens,
            "break-before" | "page-break-before" => self.break_before = source.break_before,
            "break-after" | "page-break-after" => self.break_after = source.break_after,
            "break-inside" | "page-break-inside" => self.break_inside = source.break_inside,
            "orphans" => self.orphans = source.orphans,
            "widows" => self.widows = source.widows,
            "column-count" => self.column_count = source.column_count,
            "column-width" => self.column_width = source.column_width,
            "columns" => {
                self.column_count = source.column_count;
                self.column_width = source.column_width;
            }
            "column-gap" => self.column_gap = source.column_gap,
            "column-fill" => self.column_fill = source.column_fill,
            "flow-into" => self.flow_into.clone_from(&source.flow_into),
            "flow-from" => self.flow_from.clone_from(&source.flow_from),
            "counter-reset" => self.counter_reset.clone_from(&source.counter_reset),
            "counter-increment" => self.counter_increment.clone_from(&source.counter_increment),
            "counter-set" => self.counter_set.clone_from(&source.counter_set),
            "list-style-type" | "list-style" => self.list_style_type = source.list_style_type,
            "content" => self.content.clone_from(&source.content),
            "page" => self.page.clone_from(&source.page),
            _ if property.starts_with("margin-") || property.starts_with("padding-") => {
                let Some((kind, side)) = property.split_once('-') else {
                    return false;
                };
                let Some(side) = self.side_from_name(side) else {
                    return false;
                };
                if kind == "margin" {
                    self.margin[side.index()] = source.margin[side.index()];
                } else {
                    self.padding[side.index()] = source.padding[side.index()];
                }
            }
            _ if property.starts_with("border-") => {
                let rest = &property["border-".len()..];
                let side_name = rest
                    .rsplit_once('-')
                    .filter(|(_, p)| matches!(*p, "width" | "style" | "color"))
                    .map_or(rest, |(s, _)| s);
                let Some(side) = self.side_from_name(side_name) else {
                    return false;
                };
                let i = side.index();
                self.border_width[i] = source.border_width[i];
                self.border_style[i] = source.border_style[i];
                self.border_color[i] = source.border_color[i];
            }
            _ => return IGNORED_PROPERTIES.contains(&property),
        }
        true
    }

    /// Whether a property is inherited by default, for `unset`.
    #[must_use]
    pub fn is_inherited(property: &str) -> bool {
        matches!(
            unprefixed(property),
            "writing-mode"
                | "direction"
                | "font"
                | "font-size"
                | "font-family"
                | "font-weight"
                | "font-style"
                | "line-height"
                | "color"
                | "white-space"
                | "text-align"
                | "text-indent"
                | "hyphens"
                | "orphans"
                | "widows"
                | "list-style-type"
                | "list-style"
        )
    }
}

/// [§ 4.1 Line Width](https://www.w3.org/TR/css-backgrounds-3/#border-width)
fn border_width(v: &ComponentValue, ctx: &ResolveContext) -> Option<f32> {
    match v.as_ident().map(str::to_ascii_lowercase).as_deref() {
        Some("thin") => Some(1.0),
        Some("medium") => Some(3.0),
        Some("thick") => Some(5.0),
        Some(_) => None,
        None => match parse_single_length(v)?.compute(ctx) {
            LengthPercentage::Px(px) if px >= 0.0 => Some(px),
            _ => None,
        },
    }
}

/// [§ 3.5 'font-size'](https://www.w3.org/TR/css-fonts-4/#font-size-prop)
///
/// Relative sizes and `em`/`%` refer to the parent's font size.
fn font_size(parts: &[&ComponentValue], parent: &ComputedStyle, ctx: &ResolveContext) -> Option<f32> {
    let [v] = parts else {
        return None;
    };
    let base = parent.font_size;
    if let Some(kw) = v.as_ident() {
        let scale = match kw.to_ascii_lowercase().as_str() {
            "xx-small" => 3.0 / 5.0,
            "x-small" => 3.0 / 4.0,
            "small" => 8.0 / 9.0,
            "medium" => 1.0,
            "large" => 6.0 / 5.0,
            "x-large" => 3.0 / 2.0,
            "xx-large" => 2.0,
            "smaller" => return Some(base / 1.2),
            "larger" => return Some(base * 1.2),
            _ => return None,
        };
        return Some(DEFAULT_FONT_SIZE_PX * scale);
    }
    let parent_ctx = ResolveContext {
        font_size: base,
        ..*ctx
    };
    let px = parse_single_length(v)?.compute(&parent_ctx).resolve(base);
    (px >= 0.0).then_some(px)
}

fn font_weight(v: &ComponentValue, parent: u16) -> Option<u16> {
    match v {
        ComponentValue::Token(CSSToken::Number { value, .. }) if (1.0..=1000.0).contains(value) => {
            Some(*value as u16)
        }
        ComponentValue::Token(CSSToken::Ident(kw)) => match kw.to_ascii_lowercase().as_str() {
            "normal" => Some(400),
            "bold" => Some(700),
            "bolder" => Some((parent + 300).min(900)),
            "lighter" => Some(parent.saturating_sub(300).max(100)),
            _ => None,
        },
        _ => None,
    }
}

fn line_height(v: &ComponentValue, own: &ResolveContext) -> Option<LineHeight> {
    if v.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("normal")) {
        return Some(LineHeight::Normal);
    }
    if let ComponentValue::Token(CSSToken::Number { value, .. }) = v {
        return (*value >= 0.0).then_some(LineHeight::Number(*value as f32));
    }
    // "Percentage: ... relative to the font size of the element itself."
    let px = parse_single_length(v)?.compute(own).resolve(own.font_size);
    (px >= 0.0).then_some(LineHeight::Px(px))
}

fn font_family(value: &[ComponentValue]) -> Option<String> {
    font_family_parts(&components(value))
}

/// First family in a comma-separated list.
fn font_family_parts(parts: &[&ComponentValue]) -> Option<String> {
    let first: Vec<String> = parts
        .iter()
        .take_while(|v| !matches!(v, ComponentValue::Token(CSSToken::Comma)))
        .filter_map(|v| match v {
            ComponentValue::Token(CSSToken::String(s) | CSSToken::Ident(s)) => Some(s.clone()),
            _ => None,
        })
        .collect();
    (!first.is_empty()).then(|| first.join(" "))
}

/// `[ <counter-name> <integer>? ]+ | none`
fn counter_list(parts: &[&ComponentValue], default: i32) -> Option<Vec<(String, i32)>> {
    if let [single] = parts
        && single.as_ident().is_some_and(|i| i.eq_ignore_ascii_case("none"))
    {
        return Some(Vec::new());
    }
    let mut out: Vec<(String, i32)> = Vec::new();
    for v in parts {
        if let Some(n) = integer(v) {
            out.last_mut()?.1 = n;
        } else {
            out.push((v.as_ident()?.to_string(), default));
        }
    }
    (!out.is_empty()).then_some(out)
}
