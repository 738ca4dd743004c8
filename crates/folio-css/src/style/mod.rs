//! CSS Computed Style representation and value parsing
//!
//! This module implements CSS value types and computed style representation per:
//! - [CSS Values and Units Level 4](https://www.w3.org/TR/css-values-4/)
//! - [CSS Color Level 4](https://www.w3.org/TR/css-color-4/)
//! - [CSS Display Module Level 3](https://www.w3.org/TR/css-display-3/)
//! - [CSS Writing Modes Level 4](https://www.w3.org/TR/css-writing-modes-4/)
//! - [CSS Fragmentation Level 3](https://www.w3.org/TR/css-break-3/)

pub mod computed;
mod display;
mod keywords;
mod values;
mod writing_mode;

pub use computed::{ComputedStyle, LineHeight, StyleError, unprefixed};
pub use display::{
    DisplayValue, InnerDisplayType, OuterDisplayType, ParsedDisplay, parse_display_value,
};
pub use keywords::{
    BorderStyle, BoxSizing, BreakInside, BreakValue, Clear, ColumnFill, Float, FontStyle,
    Hyphens, TextAlign, WhiteSpace,
};
pub use values::{
    AutoLength, ColorValue, DEFAULT_FONT_SIZE_PX, LengthPercentage, LengthValue, ResolveContext,
    absolute_unit_px, parse_color_value, parse_single_auto_length, parse_single_color,
    parse_single_length,
};
pub use writing_mode::{Direction, LogicalSide, PhysicalSide, WritingMode};
