//! Laid-out pieces of content.
//!
//! [CSS Fragmentation § 1](https://www.w3.org/TR/css-break-3/#intro)
//!
//! "A box fragment is the portion of a box that belongs to exactly one
//! fragmentainer." Columns produce [`LogicalFragment`]s in flow-relative
//! coordinates; the page maps them onto the physical page box.

use folio_dom::NodeId;
use serde::Serialize;

use super::box_model::LogicalRect;
use super::inline::LineContent;

/// What a fragment shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum FragmentKind {
    /// The border box of a block container.
    Block,
    /// A run of text on one line.
    Text(String),
    /// A replaced element.
    Image {
        /// `src` of the element.
        src: Option<String>,
    },
    /// The call mark of a footnote.
    FootnoteCall(String),
}

impl From<LineContent> for FragmentKind {
    fn from(content: LineContent) -> Self {
        match content {
            LineContent::Text(text) => Self::Text(text),
            LineContent::Atomic { src } => Self::Image { src },
            LineContent::FootnoteCall(text) => Self::FootnoteCall(text),
        }
    }
}

/// Which part of a column a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FragmentArea {
    /// The main flow.
    #[default]
    Flow,
    /// A float.
    Float,
    /// [GCPM § 2.2](https://www.w3.org/TR/css-gcpm-3/#footnote-area)
    Footnote,
}

/// A fragment placed in a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalFragment {
    /// Content.
    pub kind: FragmentKind,
    /// Border box, relative to the column's content box.
    pub rect: LogicalRect,
    /// Area of the column.
    pub area: FragmentArea,
    /// Generating node.
    #[serde(skip)]
    pub node: Option<NodeId>,
}

impl LogicalFragment {
    /// A copy moved by `(inline, block)` and, when given, reassigned to
    /// `area`.
    #[must_use]
    pub fn offset(&self, inline: f32, block: f32, area: Option<FragmentArea>) -> Self {
        let mut moved = self.clone();
        moved.rect.inline += inline;
        moved.rect.block += block;
        if let Some(area) = area {
            moved.area = area;
        }
        moved
    }
}
