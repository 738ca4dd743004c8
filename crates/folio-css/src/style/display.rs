//! CSS Display property types and parsing
//!
//! [§ 2 Box Layout Modes: the display property](https://www.w3.org/TR/css-display-3/#the-display-properties)

use serde::Serialize;

use crate::parser::ComponentValue;

// [§ 2 Box Layout Modes: the display property](https://www.w3.org/TR/css-display-3/#the-display-properties)
//
// "The display property defines an element's display type, which consists of
// the two basic qualities of how an element generates boxes:
//   - the inner display type, which defines the kind of formatting context
//     it generates, dictating how its descendant boxes are laid out.
//   - the outer display type, which dictates how the principal box itself
//     participates in flow layout."

/// [§ 2.1 Outer Display Roles](https://www.w3.org/TR/css-display-3/#outer-role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OuterDisplayType {
    /// "The element generates a block-level box when placed in flow layout."
    Block,
    /// "The element generates an inline-level box when placed in flow layout."
    Inline,
    /// "The element generates a run-in box." Laid out as a block here.
    RunIn,
}

/// [§ 2.2 Inner Display Layout Models](https://www.w3.org/TR/css-display-3/#inner-model)
///
/// Paginated layout only distinguishes flow content from atomic and
/// table-ish containers; flex and grid containers lay out their items as
/// stacked blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InnerDisplayType {
    /// "The element lays out its contents using flow layout."
    Flow,
    /// Flow layout in a new block formatting context.
    FlowRoot,
    /// `table` and `inline-table`.
    Table,
    /// `table-row`, `table-row-group` and friends.
    TableRow,
    /// `table-cell`.
    TableCell,
    /// `flex`, `grid` and their inline forms.
    Flex,
}

/// Combined display value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DisplayValue {
    /// How the box participates in its parent's layout.
    pub outer: OuterDisplayType,
    /// How the box lays out its children.
    pub inner: InnerDisplayType,
    /// [§ 2.3 Generating Marker Boxes](https://www.w3.org/TR/css-display-3/#list-items)
    pub list_item: bool,
}

impl Default for DisplayValue {
    /// "Initial: inline"
    fn default() -> Self {
        Self::inline()
    }
}

impl DisplayValue {
    const fn new(outer: OuterDisplayType, inner: InnerDisplayType) -> Self {
        Self {
            outer,
            inner,
            list_item: false,
        }
    }

    /// `display: block`
    #[must_use]
    pub const fn block() -> Self {
        Self::new(OuterDisplayType::Block, InnerDisplayType::Flow)
    }

    /// `display: inline`
    #[must_use]
    pub const fn inline() -> Self {
        Self::new(OuterDisplayType::Inline, InnerDisplayType::Flow)
    }

    /// `display: inline-block`
    #[must_use]
    pub const fn inline_block() -> Self {
        Self::new(OuterDisplayType::Inline, InnerDisplayType::FlowRoot)
    }

    /// `display: list-item`
    #[must_use]
    pub const fn list_item() -> Self {
        Self {
            outer: OuterDisplayType::Block,
            inner: InnerDisplayType::Flow,
            list_item: true,
        }
    }

    /// Block-level (including run-in, which is not merged into the following block).
    #[must_use]
    pub const fn is_block_level(self) -> bool {
        !matches!(self.outer, OuterDisplayType::Inline)
    }

    /// Inline-level box with block content, placed on a line as one unit.
    #[must_use]
    pub const fn is_atomic_inline(self) -> bool {
        matches!(self.outer, OuterDisplayType::Inline)
            && !matches!(self.inner, InnerDisplayType::Flow)
    }

    /// [§ 2.7 Automatic Box Type Transformations](https://www.w3.org/TR/css-display-3/#transformations)
    ///
    /// "Some layout effects require blockification of the box type." Floats and
    /// the root element are blockified.
    #[must_use]
    pub const fn blockify(self) -> Self {
        Self {
            outer: OuterDisplayType::Block,
            inner: self.inner,
            list_item: self.list_item,
        }
    }
}

/// Result of parsing a `display` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDisplay {
    /// [§ 2.6 display: none](https://www.w3.org/TR/css-display-3/#valdef-display-none)
    ///
    /// "The element and its descendants generate no boxes or text runs."
    None,
    /// Any box-generating value.
    Box(DisplayValue),
}

/// [§ 2 The display property](https://www.w3.org/TR/css-display-3/#the-display-properties)
///
/// Parse a display value. Returns `None` for unsupported keywords.
#[must_use]
pub fn parse_display_value(values: &[ComponentValue]) -> Option<ParsedDisplay> {
    use InnerDisplayType::{Flex, Flow, FlowRoot, Table, TableCell, TableRow};
    use OuterDisplayType::{Block, Inline, RunIn};

    let keyword = values.iter().find_map(ComponentValue::as_ident)?;
    let value = match keyword.to_ascii_lowercase().as_str() {
        "none" => return Some(ParsedDisplay::None),
        "block" => DisplayValue::block(),
        "inline" => DisplayValue::inline(),
        "inline-block" => DisplayValue::inline_block(),
        "list-item" => DisplayValue::list_item(),
        "run-in" => DisplayValue::new(RunIn, Flow),
        "flow-root" => DisplayValue::new(Block, FlowRoot),
        "table" => DisplayValue::new(Block, Table),
        "inline-table" => DisplayValue::new(Inline, Table),
        "table-row" | "table-row-group" | "table-header-group" | "table-footer-group" => {
            DisplayValue::new(Block, TableRow)
        }
        "table-cell" | "table-caption" => DisplayValue::new(Block, TableCell),
        "flex" | "grid" | "-webkit-box" => DisplayValue::new(Block, Flex),
        "inline-flex" | "inline-grid" => DisplayValue::new(Inline, Flex),
        _ => return None,
    };
    Some(ParsedDisplay::Box(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_value;

    #[test]
    fn test_display_keywords() {
        assert_eq!(parse_display_value(&parse_value("none")), Some(ParsedDisplay::None));
        assert_eq!(
            parse_display_value(&parse_value("list-item")),
            Some(ParsedDisplay::Box(DisplayValue::list_item()))
        );
        assert_eq!(parse_display_value(&parse_value("ruby")), None);
    }

    #[test]
    fn test_blockify_inline_block_keeps_flow_root() {
        let blockified = DisplayValue::inline_block().blockify();
        assert!(blockified.is_block_level());
        assert_eq!(blockified.inner, InnerDisplayType::FlowRoot);
        assert!(DisplayValue::inline_block().is_atomic_inline());
        assert!(!DisplayValue::inline().is_atomic_inline());
    }
}
