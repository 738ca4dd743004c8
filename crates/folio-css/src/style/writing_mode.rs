//! CSS Writing Mode types and the logical-to-physical mapping
//!
//! [§ 2 Block Flow Direction](https://www.w3.org/TR/css-writing-modes-4/#block-flow)
//! [§ 6.2 Flow-relative Directions](https://www.w3.org/TR/css-writing-modes-4/#logical-directions)

use serde::Serialize;
use strum_macros::{Display, EnumString};

/// [§ 2 Block Flow Direction](https://www.w3.org/TR/css-writing-modes-4/#block-flow)
///
/// "The writing-mode property specifies whether lines of text are laid out
/// horizontally or vertically and the direction in which blocks progress."
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum WritingMode {
    /// "Top-to-bottom block flow direction."
    #[default]
    HorizontalTb,
    /// "Right-to-left block flow direction." Lines are vertical.
    VerticalRl,
    /// "Left-to-right block flow direction." Lines are vertical.
    VerticalLr,
}

/// [§ 2.1 Specifying Directionality](https://www.w3.org/TR/css-writing-modes-4/#direction)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    /// Left-to-right inline base direction.
    #[default]
    Ltr,
    /// Right-to-left inline base direction.
    Rtl,
}

/// Physical side of a box, also used as the index into per-side arrays
/// (`[top, right, bottom, left]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PhysicalSide {
    /// Top edge of the box
    Top = 0,
    /// Right edge of the box
    Right = 1,
    /// Bottom edge of the box
    Bottom = 2,
    /// Left edge of the box
    Left = 3,
}

/// Flow-relative side of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalSide {
    /// Where blocks start stacking.
    BlockStart,
    /// Opposite of block-start.
    BlockEnd,
    /// Where a line starts.
    InlineStart,
    /// Opposite of inline-start.
    InlineEnd,
}

impl PhysicalSide {
    /// All sides in `[top, right, bottom, left]` order.
    pub const ALL: [Self; 4] = [Self::Top, Self::Right, Self::Bottom, Self::Left];

    /// Index into a `[top, right, bottom, left]` array.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// `[block-start, block-end, inline-start, inline-end]` for each
/// `(writing-mode, direction)` pair.
const LOGICAL_TABLE: [[[PhysicalSide; 4]; 2]; 3] = {
    use PhysicalSide::{Bottom, Left, Right, Top};
    [
        // horizontal-tb
        [[Top, Bottom, Left, Right], [Top, Bottom, Right, Left]],
        // vertical-rl
        [[Right, Left, Top, Bottom], [Right, Left, Bottom, Top]],
        // vertical-lr
        [[Left, Right, Top, Bottom], [Left, Right, Bottom, Top]],
    ]
};

impl WritingMode {
    /// Lines run top-to-bottom.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        !matches!(self, Self::HorizontalTb)
    }

    /// [§ 6.2 Flow-relative Directions](https://www.w3.org/TR/css-writing-modes-4/#logical-directions)
    ///
    /// Map a flow-relative side to the physical side it names.
    ///
    /// | Writing Mode   | block-start | inline-start (ltr) |
    /// |----------------|-------------|--------------------|
    /// | horizontal-tb  | top         | left               |
    /// | vertical-rl    | right       | top                |
    /// | vertical-lr    | left        | top                |
    #[must_use]
    pub const fn physical(self, direction: Direction, side: LogicalSide) -> PhysicalSide {
        let mode = match self {
            Self::HorizontalTb => 0,
            Self::VerticalRl => 1,
            Self::VerticalLr => 2,
        };
        let dir = match direction {
            Direction::Ltr => 0,
            Direction::Rtl => 1,
        };
        let index = match side {
            LogicalSide::BlockStart => 0,
            LogicalSide::BlockEnd => 1,
            LogicalSide::InlineStart => 2,
            LogicalSide::InlineEnd => 3,
        };
        LOGICAL_TABLE[mode][dir][index]
    }

    /// Block-start physical side.
    #[must_use]
    pub const fn block_start_physical(self) -> PhysicalSide {
        self.physical(Direction::Ltr, LogicalSide::BlockStart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_mapping_table() {
        let wm = WritingMode::VerticalRl;
        assert_eq!(wm.physical(Direction::Ltr, LogicalSide::BlockStart), PhysicalSide::Right);
        assert_eq!(wm.physical(Direction::Ltr, LogicalSide::InlineEnd), PhysicalSide::Bottom);
        let ht = WritingMode::HorizontalTb;
        assert_eq!(ht.physical(Direction::Rtl, LogicalSide::InlineStart), PhysicalSide::Right);
    }

    #[test]
    fn test_keywords_parse() {
        assert_eq!("vertical-lr".parse::<WritingMode>().ok(), Some(WritingMode::VerticalLr));
        assert_eq!("RTL".parse::<Direction>().ok(), Some(Direction::Rtl));
    }
}
