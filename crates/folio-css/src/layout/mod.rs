//! Paginated layout.
//!
//! This module lays the box tree out into pages: columns are filled along the
//! block axis, broken at the best break point, and mapped onto the page box.
//!
//! # Relevant Specifications
//!
//! - [CSS Box Model Module Level 3](https://www.w3.org/TR/css-box-3/)
//! - [CSS 2.1 Visual Formatting Model](https://www.w3.org/TR/CSS2/visuren.html)
//! - [CSS Fragmentation Module Level 3](https://www.w3.org/TR/css-break-3/)
//! - [CSS Multi-column Layout Module Level 1](https://www.w3.org/TR/css-multicol-1/)
//! - [CSS Paged Media Module Level 3](https://www.w3.org/TR/css-page-3/)
//! - [CSS Text Module Level 3](https://www.w3.org/TR/css-text-3/)
//!
//! # Module Structure
//!
//! - [`box_model`] - Rectangles, edge sizes, logical-to-physical mapping
//! - [`geometry`] - Used widths, heights and margins of block and replaced boxes
//! - [`inline`] - Line breaking of inline content
//! - [`float`] - Float placement and clearance
//! - [`items`] - The box tree flattened into block edges and paragraphs
//! - [`column`] - Filling one column, break candidates, footnote area
//! - [`balance`] - Column balancing
//! - [`page`] - One page: page box, columns, next checkpoint
//! - [`interval`] - Sorted interval map used for balancing and page lookup

pub mod balance;
pub mod box_model;
pub mod column;
pub mod float;
pub mod fragment;
pub mod geometry;
pub mod inline;
pub mod interval;
pub mod items;
pub mod page;

pub use balance::balanced_height;
pub use box_model::{BoxDimensions, EdgeSizes, LogicalRect, Rect, logical_size};
pub use column::{
    BreakOffsets, ColumnEnd, ColumnLayout, ColumnOutput, ColumnRequest, ColumnState, Cursor,
    FOOTNOTE_GAP, Monolith, layout_monolith,
};
pub use float::{FloatContext, FloatSide, PlacedFloat};
pub use fragment::{FragmentArea, FragmentKind, LogicalFragment};
pub use geometry::{InlineSizing, UsedGeometry, resolve_block_geometry, resolve_replaced_geometry};
pub use inline::{
    ApproximateFontMetrics, FontMetrics, FootnoteRef, LineBox, LineContent, LineFragment,
    Paragraph, used_line_height,
};
pub use interval::IntervalMap;
pub use items::{Item, ItemKind, intrinsic_inline_sizes, linearize, shrink_to_fit};
pub use page::{LayoutError, PageContent, PageFragment, PageLayout, column_geometry};
