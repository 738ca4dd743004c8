//! Keyword-valued properties.
//!
//! Each enum parses from its CSS keywords through `strum`, so
//! `"avoid-page".parse::<BreakValue>()` is all the cascade needs.

use serde::Serialize;
use strum_macros::{Display, EnumString};

/// [CSS 2.1 § 9.5.1 'float'](https://www.w3.org/TR/CSS2/visuren.html#float-position),
/// plus `footnote` from [GCPM § 2.1](https://www.w3.org/TR/css-gcpm-3/#creating-footnotes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Float {
    /// Not floated.
    #[default]
    None,
    /// Float to the line-left edge.
    Left,
    /// Float to the line-right edge.
    Right,
    /// "The element becomes a footnote": moved to the page's footnote area.
    #[strum(to_string = "footnote", serialize = "-epubx-footnote")]
    Footnote,
}

/// [CSS 2.1 § 9.5.2 'clear'](https://www.w3.org/TR/CSS2/visuren.html#flow-control)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Clear {
    /// No constraint.
    #[default]
    None,
    /// Below left floats.
    Left,
    /// Below right floats.
    Right,
    /// Below all floats.
    Both,
}

/// [CSS Box Sizing § 4.1 'box-sizing'](https://www.w3.org/TR/css-sizing-3/#box-sizing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BoxSizing {
    /// `width` sets the content box.
    #[default]
    ContentBox,
    /// `width` includes padding and border.
    BorderBox,
}

/// [§ 4.2 Line Style](https://www.w3.org/TR/css-backgrounds-3/#border-style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BorderStyle {
    /// No border; the used width is zero.
    #[default]
    None,
    /// Like `none`, winning border conflicts.
    Hidden,
    /// Solid line.
    Solid,
    /// Dotted line.
    Dotted,
    /// Dashed line.
    Dashed,
    /// Two lines.
    Double,
    /// Carved.
    Groove,
    /// Raised.
    Ridge,
    /// Embedded.
    Inset,
    /// Embossed.
    Outset,
}

impl BorderStyle {
    /// "If the border style is 'none' or 'hidden', the used border width is 0."
    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::None | Self::Hidden)
    }
}

/// [CSS Text § 3 'white-space'](https://www.w3.org/TR/css-text-3/#white-space-property)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum WhiteSpace {
    /// Collapse spaces and newlines; wrap.
    #[default]
    Normal,
    /// Preserve everything; break only at newlines.
    Pre,
    /// Preserve everything; wrap.
    PreWrap,
    /// Collapse spaces, keep newlines; wrap.
    PreLine,
    /// Collapse; never wrap.
    Nowrap,
}

impl WhiteSpace {
    /// Spaces and tabs are kept as written.
    #[must_use]
    pub const fn preserves_spaces(self) -> bool {
        matches!(self, Self::Pre | Self::PreWrap)
    }

    /// Newlines force line breaks.
    #[must_use]
    pub const fn preserves_newlines(self) -> bool {
        matches!(self, Self::Pre | Self::PreWrap | Self::PreLine)
    }

    /// Lines may wrap at soft opportunities.
    #[must_use]
    pub const fn wraps(self) -> bool {
        !matches!(self, Self::Pre | Self::Nowrap)
    }
}

/// [CSS Text § 7.1 'text-align'](https://www.w3.org/TR/css-text-3/#text-align-property)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum TextAlign {
    /// Inline-start edge.
    #[default]
    Start,
    /// Inline-end edge.
    End,
    /// Line-left.
    Left,
    /// Line-right.
    Right,
    /// Centered.
    Center,
    /// Justified; the last line is start-aligned.
    Justify,
}

/// [CSS Fragmentation § 3.1 'break-before', 'break-after'](https://www.w3.org/TR/css-break-3/#break-between)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BreakValue {
    /// "Neither force nor forbid a break."
    #[default]
    Auto,
    /// "Avoid a break."
    Avoid,
    /// "Avoid a page break."
    AvoidPage,
    /// "Avoid a column break."
    AvoidColumn,
    /// "Always force a break." Forces the innermost fragmentation context.
    Always,
    /// "Always force a page break."
    Page,
    /// "Always force a column break."
    Column,
    /// Page break, then continue on a left page.
    #[strum(to_string = "left", serialize = "verso")]
    Left,
    /// Page break, then continue on a right page.
    #[strum(to_string = "right", serialize = "recto")]
    Right,
}

impl BreakValue {
    /// Parse a legacy `page-break-before`/`page-break-after` keyword.
    ///
    /// [§ 3.4 Page Break Aliases](https://www.w3.org/TR/css-break-3/#page-break-properties)
    /// "`always` ... is aliased to `page`."
    #[must_use]
    pub fn from_legacy(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "always" => Some(Self::Page),
            "avoid" => Some(Self::Avoid),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// The value forces a break.
    #[must_use]
    pub const fn is_forced(self) -> bool {
        matches!(
            self,
            Self::Always | Self::Page | Self::Column | Self::Left | Self::Right
        )
    }

    /// The value forces a page break (not just a column break).
    #[must_use]
    pub const fn is_page_break(self) -> bool {
        matches!(self, Self::Page | Self::Left | Self::Right)
    }

    /// The value discourages a break in a context of the given kind.
    #[must_use]
    pub const fn avoids(self, page_context: bool) -> bool {
        match self {
            Self::Avoid => true,
            Self::AvoidPage => page_context,
            Self::AvoidColumn => !page_context,
            _ => false,
        }
    }

    /// [§ 3.1 Breaks Between Boxes](https://www.w3.org/TR/css-break-3/#forced-breaks)
    ///
    /// Combine adjacent break values: "if any of the values is a forced break
    /// value, ... use the forced break value"; otherwise any avoid wins.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        if other.is_forced() {
            other
        } else if self.is_forced() {
            self
        } else if !matches!(other, Self::Auto) {
            other
        } else {
            self
        }
    }
}

/// [CSS Fragmentation § 3.2 'break-inside'](https://www.w3.org/TR/css-break-3/#break-within)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BreakInside {
    /// Breaks allowed.
    #[default]
    Auto,
    /// Avoid any break inside.
    Avoid,
    /// Avoid page breaks inside.
    AvoidPage,
    /// Avoid column breaks inside.
    AvoidColumn,
}

impl BreakInside {
    /// The value discourages a break of the given kind inside the box.
    #[must_use]
    pub const fn avoids(self, page_context: bool) -> bool {
        match self {
            Self::Auto => false,
            Self::Avoid => true,
            Self::AvoidPage => page_context,
            Self::AvoidColumn => !page_context,
        }
    }
}

/// [CSS Multi-column § 7.1 'column-fill'](https://www.w3.org/TR/css-multicol-1/#cf)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ColumnFill {
    /// "Balance content equally between columns, as far as possible."
    #[default]
    Balance,
    /// "Fills columns sequentially."
    Auto,
}

/// [CSS Text § 6.1 'hyphens'](https://www.w3.org/TR/css-text-3/#hyphens-property)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Hyphens {
    /// Soft hyphens are ignored.
    None,
    /// "Words are only broken at line breaks where there are characters
    /// inside the word that suggest line break opportunities."
    #[default]
    Manual,
    /// Dictionary hyphenation; treated as `manual` without a dictionary.
    Auto,
}

/// [CSS Fonts § 3.3 'font-style'](https://www.w3.org/TR/css-fonts-4/#font-style-prop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum FontStyle {
    /// Upright.
    #[default]
    Normal,
    /// Italic face.
    Italic,
    /// Slanted face.
    Oblique,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_aliases() {
        assert_eq!("recto".parse::<BreakValue>().ok(), Some(BreakValue::Right));
        assert_eq!(BreakValue::from_legacy("always"), Some(BreakValue::Page));
        assert_eq!("avoid-column".parse::<BreakValue>().ok(), Some(BreakValue::AvoidColumn));
    }

    #[test]
    fn test_break_combination_prefers_forced() {
        assert_eq!(BreakValue::Avoid.combine(BreakValue::Page), BreakValue::Page);
        assert_eq!(BreakValue::Page.combine(BreakValue::Avoid), BreakValue::Page);
        assert_eq!(BreakValue::Auto.combine(BreakValue::Avoid), BreakValue::Avoid);
    }

    #[test]
    fn test_float_footnote_keyword() {
        assert_eq!("footnote".parse::<Float>().ok(), Some(Float::Footnote));
        assert_eq!("-epubx-footnote".parse::<Float>().ok(), Some(Float::Footnote));
    }
}
