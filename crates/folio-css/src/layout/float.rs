//! CSS Float Layout.
//!
//! [§ 9.5 Floats](https://www.w3.org/TR/CSS2/visuren.html#floats)
//!
//! "A float is a box that is shifted to the left or right on the current line.
//! The most interesting characteristic of a float is that content may flow along
//! its side (or be prohibited from doing so by the 'clear' property)."
//!
//! "A floated box is shifted to the left or right until its outer edge touches
//! the containing block edge or the outer edge of another float."
//!
//! One [`FloatContext`] exists per column. Coordinates are flow-relative to the
//! column's content box, so `left`/`right` become inline-start/inline-end once
//! direction is taken into account.

use serde::Serialize;

use super::box_model::LogicalRect;
use crate::style::{Clear, Direction, Float};

/// Edge of the column a float is pushed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FloatSide {
    /// Inline-start edge.
    Start,
    /// Inline-end edge.
    End,
}

impl FloatSide {
    /// [§ 9.5.1](https://www.w3.org/TR/CSS2/visuren.html#float-position)
    ///
    /// `left`/`right` name line-left and line-right; in right-to-left text
    /// line-left is the inline-end edge.
    #[must_use]
    pub const fn resolve(float: Float, direction: Direction) -> Option<Self> {
        match (float, direction) {
            (Float::Left, Direction::Ltr) | (Float::Right, Direction::Rtl) => Some(Self::Start),
            (Float::Right, Direction::Ltr) | (Float::Left, Direction::Rtl) => Some(Self::End),
            (Float::None | Float::Footnote, _) => None,
        }
    }

    const fn cleared_by(self, clear: Clear, direction: Direction) -> bool {
        match clear {
            Clear::None => false,
            Clear::Both => true,
            Clear::Left | Clear::Right => {
                let float = if matches!(clear, Clear::Left) {
                    Float::Left
                } else {
                    Float::Right
                };
                matches!(
                    (Self::resolve(float, direction), self),
                    (Some(Self::Start), Self::Start) | (Some(Self::End), Self::End)
                )
            }
        }
    }
}

/// A single float that has been placed in a column.
///
/// [§ 9.5 Floats](https://www.w3.org/TR/CSS2/visuren.html#floats)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedFloat {
    /// Which side this float is on.
    pub side: FloatSide,
    /// The margin box of the float.
    pub margin_box: LogicalRect,
    /// Placement sequence number; taking a break back drops the floats
    /// placed after it.
    pub item: usize,
}

impl PlacedFloat {
    fn bottom(&self) -> f32 {
        self.margin_box.block_end()
    }
}

/// Tracks placed floats within one column.
///
/// [§ 9.5 Floats](https://www.w3.org/TR/CSS2/visuren.html#floats)
///
/// "Since a float is not in the flow, non-positioned block boxes created
/// before and after the float box flow vertically as if the float did not
/// exist. However, the current and subsequent line boxes created next to
/// the float are shortened as necessary to make room for the margin box
/// of the float."
#[derive(Debug, Clone)]
pub struct FloatContext {
    floats: Vec<PlacedFloat>,
    /// Inline size of the column.
    pub containing_inline_size: f32,
}

impl FloatContext {
    /// Create a new float context for a column.
    #[must_use]
    pub const fn new(containing_inline_size: f32) -> Self {
        Self {
            floats: Vec::new(),
            containing_inline_size,
        }
    }

    /// Returns true if there are no placed floats in this context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.floats.is_empty()
    }

    /// Placed floats in placement order.
    #[must_use]
    pub fn floats(&self) -> &[PlacedFloat] {
        &self.floats
    }

    /// Return the maximum block-end edge of all placed floats.
    ///
    /// [§ 10.6.7](https://www.w3.org/TR/CSS2/visudet.html#root-height)
    ///
    /// "If the element has any floating descendants whose bottom margin edge
    /// is below the element's bottom content edge, then the height is
    /// increased to include those edges."
    #[must_use]
    pub fn max_float_bottom(&self) -> f32 {
        self.floats
            .iter()
            .map(PlacedFloat::bottom)
            .fold(0.0_f32, f32::max)
    }

    /// [§ 9.5.1 Positioning the float: the 'float' property](https://www.w3.org/TR/CSS2/visuren.html#float-position)
    ///
    /// Find where a float of the given outer size would go, without placing it.
    ///
    /// - Rule 1: Float cannot extend past containing block edges.
    /// - Rules 4, 5, 8: Float is placed as high as possible (at or below `current`).
    /// - Rule 9: Start floats go as far toward inline-start as possible; end
    ///   floats toward inline-end.
    /// - Rules 2, 3, 7: Floats do not overlap each other.
    #[must_use]
    pub fn find_position(
        &self,
        side: FloatSide,
        inline_size: f32,
        block_size: f32,
        current: f32,
    ) -> LogicalRect {
        self.find_position_within(side, inline_size, block_size, current, (0.0, self.containing_inline_size))
    }

    /// [`Self::find_position`] for a float whose containing block spans
    /// `bounds = (start, end)` of the column.
    #[must_use]
    pub fn find_position_within(
        &self,
        side: FloatSide,
        inline_size: f32,
        block_size: f32,
        current: f32,
        bounds: (f32, f32),
    ) -> LogicalRect {
        // STEP 1: Start at the highest allowed position.
        // [§ 9.5.1 Rule 8](https://www.w3.org/TR/CSS2/visuren.html#float-position)
        //
        // "A floating box must be placed as high as possible."
        //
        // Rule 5: "The outer top of a floating box may not be higher than the
        // outer top of any block or floated box generated by an element earlier
        // in the source document."
        let latest_top = self
            .floats
            .iter()
            .map(|f| f.margin_box.block)
            .fold(0.0_f32, f32::max);
        let mut block = current.max(latest_top).max(0.0);

        // STEP 2: Scan downward until the band is wide enough.
        loop {
            let (start_offset, available) = self.available_inline_within(block, block_size.max(1.0), bounds);
            let next = self.next_float_bottom_after(block);
            if available >= inline_size || next <= block {
                // STEP 3: Place the float.
                // [§ 9.5.1 Rule 9](https://www.w3.org/TR/CSS2/visuren.html#float-position)
                //
                // "A left-floating box must be put as far to the left as possible,
                // a right-floating box as far to the right as possible."
                let inline = match side {
                    FloatSide::Start => start_offset,
                    FloatSide::End => (start_offset + available - inline_size).max(bounds.0),
                };
                return LogicalRect::new(inline, block, inline_size, block_size);
            }
            // Advance to the next float bottom instead of stepping 1px at a time.
            block = next;
        }
    }

    /// Record a float at the position [`Self::find_position`] returned.
    pub fn place(&mut self, side: FloatSide, margin_box: LogicalRect, item: usize) {
        self.floats.push(PlacedFloat {
            side,
            margin_box,
            item,
        });
    }

    /// [§ 9.5.2 Controlling flow next to floats: the 'clear' property](https://www.w3.org/TR/CSS2/visuren.html#flow-control)
    ///
    /// "This property indicates which sides of an element's box(es) may not
    /// be adjacent to an earlier floating box."
    ///
    /// Returns the block offset the element must move to.
    #[must_use]
    pub fn clear(&self, clear: Clear, direction: Direction, current: f32) -> f32 {
        self.floats
            .iter()
            .filter(|f| f.side.cleared_by(clear, direction))
            .map(PlacedFloat::bottom)
            .fold(current, f32::max)
    }

    /// [§ 9.5 Floats](https://www.w3.org/TR/CSS2/visuren.html#floats)
    ///
    /// "The current and subsequent line boxes created next to the float are
    /// shortened as necessary to make room for the margin box of the float."
    ///
    /// Returns `(start_offset, available_inline_size)` for the band
    /// `[block, block + extent)`.
    #[must_use]
    pub fn available_inline_at(&self, block: f32, extent: f32) -> (f32, f32) {
        self.available_inline_within(block, extent, (0.0, self.containing_inline_size))
    }

    /// [`Self::available_inline_at`] inside `bounds = (start, end)`.
    #[must_use]
    pub fn available_inline_within(&self, block: f32, extent: f32, bounds: (f32, f32)) -> (f32, f32) {
        let band_end = block + extent;
        let mut start_edge: f32 = bounds.0;
        let mut end_edge: f32 = bounds.1;
        for f in &self.floats {
            let top = f.margin_box.block;
            if top >= band_end || f.bottom() <= block {
                continue;
            }
            match f.side {
                FloatSide::Start => {
                    start_edge = start_edge.max(f.margin_box.inline + f.margin_box.inline_size);
                }
                FloatSide::End => end_edge = end_edge.min(f.margin_box.inline),
            }
        }
        (start_edge, (end_edge - start_edge).max(0.0))
    }

    /// Drop floats placed by items at or after `item_count`; the content after
    /// a committed break is laid out again in the next column.
    pub fn retain_before(&mut self, item_count: usize) {
        self.floats.retain(|f| f.item < item_count);
    }

    /// Find the smallest float bottom edge that is strictly greater than `block`.
    fn next_float_bottom_after(&self, block: f32) -> f32 {
        self.floats
            .iter()
            .map(PlacedFloat::bottom)
            .filter(|bottom| *bottom > block)
            .fold(None, |acc: Option<f32>, b| Some(acc.map_or(b, |a| a.min(b))))
            .unwrap_or(block)
    }
}
