//! CSS Box Model types.
//!
//! [CSS Box Model Module Level 3](https://www.w3.org/TR/css-box-3/)
//!
//! Layout runs in flow-relative coordinates: `inline` is the axis lines run
//! along, `block` the axis blocks stack along. [`LogicalRect::to_physical`]
//! maps the result onto the page once a fragment is committed.

use serde::Serialize;

use crate::style::{ComputedStyle, Direction, LogicalSide, PhysicalSide, WritingMode};

/// A rectangle positioned in 2D space.
///
/// [§ 3 The CSS Box Model](https://www.w3.org/TR/css-box-3/#box-model)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    /// Horizontal position of the top-left corner.
    pub x: f32,
    /// Vertical position of the top-left corner.
    pub y: f32,
    /// Width of the rectangle.
    pub width: f32,
    /// Height of the rectangle.
    pub height: f32,
}

impl Rect {
    /// Rectangle from its four components.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// The two rectangles share interior area.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Edge sizes in flow-relative terms.
///
/// [§ 3 The CSS Box Model](https://www.w3.org/TR/css-box-3/#box-model)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EdgeSizes {
    /// Block-start edge size.
    pub block_start: f32,
    /// Block-end edge size.
    pub block_end: f32,
    /// Inline-start edge size.
    pub inline_start: f32,
    /// Inline-end edge size.
    pub inline_end: f32,
}

impl EdgeSizes {
    /// Read a `[top, right, bottom, left]` array through the element's
    /// writing mode and direction.
    #[must_use]
    pub fn from_physical(style: &ComputedStyle, sides: [f32; 4]) -> Self {
        let pick = |side: LogicalSide| sides[style.physical(side).index()];
        Self {
            block_start: pick(LogicalSide::BlockStart),
            block_end: pick(LogicalSide::BlockEnd),
            inline_start: pick(LogicalSide::InlineStart),
            inline_end: pick(LogicalSide::InlineEnd),
        }
    }

    /// Sum of both inline edges.
    #[must_use]
    pub fn inline_sum(&self) -> f32 {
        self.inline_start + self.inline_end
    }

    /// Sum of both block edges.
    #[must_use]
    pub fn block_sum(&self) -> f32 {
        self.block_start + self.block_end
    }
}

/// [§ 3. The CSS Box Model](https://www.w3.org/TR/css-box-3/#box-model)
///
/// "Each box has a content area and optional surrounding padding, border,
/// and margin areas."
///
/// `content` is a flow-relative rectangle: `inline`/`block` offsets from the
/// fragmentainer's content-box origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoxDimensions {
    /// Content area.
    pub content: LogicalRect,
    /// Padding widths.
    pub padding: EdgeSizes,
    /// Border widths.
    pub border: EdgeSizes,
    /// Margin widths.
    pub margin: EdgeSizes,
}

impl BoxDimensions {
    // ┌─────────────────────────────────────────┐
    // │              margin                     │
    // │   ┌─────────────────────────────────┐   │
    // │   │          border                 │   │
    // │   │   ┌─────────────────────────┐   │   │
    // │   │   │      padding            │   │   │
    // │   │   │   ┌─────────────────┐   │   │   │
    // │   │   │   │     CONTENT     │   │   │   │
    // │   │   │   └─────────────────┘   │   │   │
    // │   │   └─────────────────────────┘   │   │
    // │   └─────────────────────────────────┘   │
    // └─────────────────────────────────────────┘

    /// [§ 3.3 Borders](https://www.w3.org/TR/css-box-3/#borders)
    ///
    /// "The border box contains content, padding, and border areas."
    #[must_use]
    pub fn border_box(&self) -> LogicalRect {
        let start = self.padding.inline_start + self.border.inline_start;
        let before = self.padding.block_start + self.border.block_start;
        LogicalRect {
            inline: self.content.inline - start,
            block: self.content.block - before,
            inline_size: self.content.inline_size
                + self.padding.inline_sum()
                + self.border.inline_sum(),
            block_size: self.content.block_size
                + self.padding.block_sum()
                + self.border.block_sum(),
        }
    }

    /// [§ 3.1 Margins](https://www.w3.org/TR/css-box-3/#margins)
    ///
    /// "The margin box is the outermost box, and contains all four areas."
    #[must_use]
    pub fn margin_box(&self) -> LogicalRect {
        let border = self.border_box();
        LogicalRect {
            inline: border.inline - self.margin.inline_start,
            block: border.block - self.margin.block_start,
            inline_size: border.inline_size + self.margin.inline_sum(),
            block_size: border.block_size + self.margin.block_sum(),
        }
    }

    /// Inline size of the margin box.
    #[must_use]
    pub fn outer_inline_size(&self) -> f32 {
        self.margin_box().inline_size
    }

    /// Block size of the margin box.
    #[must_use]
    pub fn outer_block_size(&self) -> f32 {
        self.margin_box().block_size
    }
}

/// A rectangle in flow-relative coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LogicalRect {
    /// Offset along the inline axis from the inline-start edge.
    pub inline: f32,
    /// Offset along the block axis from the block-start edge.
    pub block: f32,
    /// Extent along the inline axis.
    pub inline_size: f32,
    /// Extent along the block axis.
    pub block_size: f32,
}

impl LogicalRect {
    /// Rectangle from its four components.
    #[must_use]
    pub const fn new(inline: f32, block: f32, inline_size: f32, block_size: f32) -> Self {
        Self {
            inline,
            block,
            inline_size,
            block_size,
        }
    }

    /// Block-end edge.
    #[must_use]
    pub fn block_end(&self) -> f32 {
        self.block + self.block_size
    }

    /// [§ 6.4 Abstract-to-Physical Mappings](https://www.w3.org/TR/css-writing-modes-4/#logical-to-physical)
    ///
    /// Map onto the physical `container`, whose flow-relative origin is its
    /// block-start/inline-start corner.
    #[must_use]
    pub fn to_physical(&self, mode: WritingMode, direction: Direction, container: Rect) -> Rect {
        let (container_inline, container_block) = if mode.is_vertical() {
            (container.height, container.width)
        } else {
            (container.width, container.height)
        };
        let inline = match direction {
            Direction::Ltr => self.inline,
            Direction::Rtl => container_inline - self.inline - self.inline_size,
        };
        match mode {
            WritingMode::HorizontalTb => Rect::new(
                container.x + inline,
                container.y + self.block,
                self.inline_size,
                self.block_size,
            ),
            WritingMode::VerticalRl => Rect::new(
                container.x + container_block - self.block - self.block_size,
                container.y + inline,
                self.block_size,
                self.inline_size,
            ),
            WritingMode::VerticalLr => Rect::new(
                container.x + self.block,
                container.y + inline,
                self.block_size,
                self.inline_size,
            ),
        }
    }
}

/// Logical `(inline, block)` extents of a physical `width × height`.
#[must_use]
pub const fn logical_size(mode: WritingMode, width: f32, height: f32) -> (f32, f32) {
    if mode.is_vertical() {
        (height, width)
    } else {
        (width, height)
    }
}

/// Used border widths of `style` as flow-relative edges.
#[must_use]
pub fn border_edges(style: &ComputedStyle) -> EdgeSizes {
    EdgeSizes::from_physical(style, PhysicalSide::ALL.map(|side| style.border_used(side)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_and_margin_boxes() {
        let dims = BoxDimensions {
            content: LogicalRect::new(20.0, 30.0, 100.0, 50.0),
            padding: EdgeSizes {
                block_start: 5.0,
                block_end: 5.0,
                inline_start: 5.0,
                inline_end: 5.0,
            },
            border: EdgeSizes {
                block_start: 1.0,
                block_end: 1.0,
                inline_start: 1.0,
                inline_end: 1.0,
            },
            margin: EdgeSizes {
                block_start: 10.0,
                block_end: 0.0,
                inline_start: 14.0,
                inline_end: 0.0,
            },
        };
        let border = dims.border_box();
        assert_eq!(border, LogicalRect::new(14.0, 24.0, 112.0, 62.0));
        let margin = dims.margin_box();
        assert_eq!(margin, LogicalRect::new(0.0, 14.0, 126.0, 72.0));
    }

    #[test]
    fn test_vertical_rl_maps_block_start_to_right() {
        let container = Rect::new(10.0, 20.0, 300.0, 400.0);
        let rect = LogicalRect::new(0.0, 0.0, 100.0, 40.0);
        let physical = rect.to_physical(WritingMode::VerticalRl, Direction::Ltr, container);
        assert_eq!(physical, Rect::new(270.0, 20.0, 40.0, 100.0));
    }

    #[test]
    fn test_rtl_mirrors_inline_axis() {
        let container = Rect::new(0.0, 0.0, 300.0, 400.0);
        let rect = LogicalRect::new(0.0, 0.0, 100.0, 40.0);
        let physical = rect.to_physical(WritingMode::HorizontalTb, Direction::Rtl, container);
        assert_eq!(physical.x, 200.0);
    }
}
