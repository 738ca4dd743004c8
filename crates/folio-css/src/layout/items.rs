//! Flattening a box subtree into the sequence a column consumes.
//!
//! [§ 9.4.1 Block formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#block-formatting)
//!
//! "In a block formatting context, boxes are laid out one after the other,
//! vertically, beginning at the top of a containing block."
//!
//! Block containers open and close around their children, inline content
//! becomes one [`Paragraph`] per block container, and anything that cannot
//! be split across columns (replaced elements, table rows) is a single
//! monolithic item. Geometry that depends only on the containing block is
//! resolved here, once per page pass.

use folio_dom::NodeId;

use super::geometry::{InlineSizing, UsedGeometry, resolve_block_geometry, resolve_replaced_geometry};
use super::inline::{FontMetrics, Paragraph};
use crate::boxes::{BoxArena, BoxId, BoxKind, FlowPosition};

/// What a column item is.
#[derive(Debug, Clone)]
pub enum ItemKind {
    /// Block-start edge of a block container.
    BlockStart {
        /// The block.
        id: BoxId,
        /// Used geometry; block-start edges are zero for a continuation.
        geometry: UsedGeometry,
        /// Index of the matching [`ItemKind::BlockEnd`].
        end: usize,
    },
    /// Block-end edge of the block opened at `start`.
    BlockEnd {
        /// Index of the matching [`ItemKind::BlockStart`].
        start: usize,
    },
    /// The inline content of a block container.
    Lines {
        /// The block container.
        owner: BoxId,
        /// Segmented content.
        paragraph: Paragraph,
        /// `text-indent` of the first line; zero for a continuation.
        indent: f32,
        /// [§ 3.3 'orphans'](https://www.w3.org/TR/css-break-3/#widows-orphans)
        orphans: u32,
        /// 'widows'
        widows: u32,
    },
    /// Content that is never fragmented.
    Monolithic {
        /// The box.
        id: BoxId,
    },
    /// A left or right float.
    Float {
        /// The float's root box.
        id: BoxId,
    },
}

/// One entry of the flattened sequence.
#[derive(Debug, Clone)]
pub struct Item {
    /// Kind and payload.
    pub kind: ItemKind,
    /// Inline offset of the containing block's content box in the column.
    pub inline: f32,
    /// Inline size of the containing block's content box.
    pub inline_size: f32,
    /// Where the item's content begins in the document.
    pub start: FlowPosition,
    /// Source node.
    pub node: Option<NodeId>,
}

/// Flatten the subtree at `root` into column items.
///
/// The root is placed at inline offset `inline` of a containing block
/// `containing_inline` wide and sized with `sizing`.
#[must_use]
pub fn linearize(
    arena: &BoxArena,
    root: BoxId,
    inline: f32,
    containing_inline: f32,
    sizing: InlineSizing,
    metrics: &dyn FontMetrics,
) -> Vec<Item> {
    let mut builder = Linearizer {
        arena,
        metrics,
        items: Vec::new(),
    };
    builder.block(root, inline, containing_inline, sizing);
    builder.items
}

struct Linearizer<'a> {
    arena: &'a BoxArena,
    metrics: &'a dyn FontMetrics,
    items: Vec<Item>,
}

impl Linearizer<'_> {
    fn push(&mut self, kind: ItemKind, id: BoxId, inline: f32, inline_size: f32) -> usize {
        let arena = self.arena;
        let b = &arena[id];
        self.items.push(Item {
            kind,
            inline,
            inline_size,
            start: b.start.clone(),
            node: b.node,
        });
        self.items.len() - 1
    }

    fn block(&mut self, id: BoxId, inline: f32, containing_inline: f32, sizing: InlineSizing) {
        let arena = self.arena;
        let b = &arena[id];
        match b.kind {
            BoxKind::Replaced { .. } | BoxKind::TableRow => {
                let _ = self.push(ItemKind::Monolithic { id }, id, inline, containing_inline);
                return;
            }
            BoxKind::Text { .. } | BoxKind::LineBreak | BoxKind::FootnoteCall { .. } => return,
            _ => {}
        }

        let mut geometry = resolve_block_geometry(&b.style, containing_inline, None, sizing);
        // [CSS Fragmentation § 5.4](https://www.w3.org/TR/css-break-3/#break-decoration)
        // "box-decoration-break: slice": a continued box has no block-start
        // margin, border or padding.
        if b.continuation {
            geometry.margin.block_start = 0.0;
            geometry.border.block_start = 0.0;
            geometry.padding.block_start = 0.0;
        }
        let start = self.push(
            ItemKind::BlockStart {
                id,
                geometry,
                end: 0,
            },
            id,
            inline,
            containing_inline,
        );

        let content_inline =
            inline + geometry.margin.inline_start + geometry.border.inline_start + geometry.padding.inline_start;
        let content_size = geometry.inline_size;
        let children = &b.children;
        let inline_only = children
            .iter()
            .all(|&c| !arena[c].is_block_level() && !arena[c].is_float());
        if inline_only {
            if !children.is_empty() {
                let style = &b.style;
                let paragraph = Paragraph::new(arena, children, style, content_size, self.metrics);
                if !paragraph.is_empty() {
                    let indent = if b.continuation {
                        0.0
                    } else {
                        style.text_indent.resolve(content_size)
                    };
                    let _ = self.push(
                        ItemKind::Lines {
                            owner: id,
                            paragraph,
                            indent,
                            orphans: style.orphans.max(1),
                            widows: style.widows.max(1),
                        },
                        id,
                        content_inline,
                        content_size,
                    );
                }
            }
        } else {
            for &child in children {
                let c = &arena[child];
                if c.is_float() {
                    let _ = self.push(ItemKind::Float { id: child }, child, content_inline, content_size);
                } else if c.is_block_level() {
                    self.block(child, content_inline, content_size, InlineSizing::Stretch);
                }
            }
        }

        let end = self.push(ItemKind::BlockEnd { start }, id, inline, containing_inline);
        if let ItemKind::BlockStart { end: slot, .. } = &mut self.items[start].kind {
            *slot = end;
        }
    }
}

/// [CSS Sizing § 5.1](https://www.w3.org/TR/css-sizing-3/#intrinsic-sizes)
///
/// `(min-content, max-content)` inline sizes of the margin box of `id`.
#[must_use]
pub fn intrinsic_inline_sizes(arena: &BoxArena, id: BoxId, metrics: &dyn FontMetrics) -> (f32, f32) {
    let b = &arena[id];
    if let BoxKind::Replaced { intrinsic, .. } = &b.kind {
        let used = resolve_replaced_geometry(&b.style, 0.0, None, intrinsic.unwrap_or((0.0, 0.0)));
        let outer = used.outer_inline_size();
        return (outer, outer);
    }
    let used = zero_basis_geometry(arena, id);
    let edges = used.margin.inline_sum() + used.border.inline_sum() + used.padding.inline_sum();
    if used.inline_size > 0.0 {
        let outer = used.inline_size + edges;
        return (outer, outer);
    }
    let (min, max) = content_intrinsic_sizes(arena, id, metrics);
    (min + edges, max + edges)
}

/// [§ 10.3.5](https://www.w3.org/TR/CSS2/visudet.html#float-width): sizing
/// for a float with an `auto` width.
#[must_use]
pub fn shrink_to_fit(arena: &BoxArena, id: BoxId, metrics: &dyn FontMetrics) -> InlineSizing {
    let (min_content, max_content) = content_intrinsic_sizes(arena, id, metrics);
    InlineSizing::ShrinkToFit {
        min_content,
        max_content,
    }
}

/// Percentages and auto margins count as zero.
fn zero_basis_geometry(arena: &BoxArena, id: BoxId) -> UsedGeometry {
    resolve_block_geometry(
        &arena[id].style,
        0.0,
        None,
        InlineSizing::ShrinkToFit {
            min_content: 0.0,
            max_content: 0.0,
        },
    )
}

fn content_intrinsic_sizes(arena: &BoxArena, id: BoxId, metrics: &dyn FontMetrics) -> (f32, f32) {
    let b = &arena[id];
    let inline_only = b
        .children
        .iter()
        .all(|&c| !arena[c].is_block_level() && !arena[c].is_float());
    if inline_only {
        Paragraph::new(arena, &b.children, &b.style, 0.0, metrics).intrinsic_sizes()
    } else if b.kind == BoxKind::TableRow {
        b.children
            .iter()
            .map(|&c| intrinsic_inline_sizes(arena, c, metrics))
            .fold((0.0, 0.0), |acc, s| (acc.0 + s.0, acc.1 + s.1))
    } else {
        b.children
            .iter()
            .map(|&c| intrinsic_inline_sizes(arena, c, metrics))
            .fold((0.0_f32, 0.0_f32), |acc, s| (acc.0.max(s.0), acc.1.max(s.1)))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::boxes::{LayoutBox, TextSource};
    use crate::layout::inline::ApproximateFontMetrics;
    use crate::style::{AutoLength, ComputedStyle, LengthPercentage};

    fn alloc(arena: &mut BoxArena, kind: BoxKind, style: ComputedStyle) -> BoxId {
        arena.alloc(LayoutBox::new(kind, Rc::new(style), FlowPosition::start()))
    }

    fn text(arena: &mut BoxArena, parent: BoxId, s: &str) {
        let style = ComputedStyle::default();
        let id = alloc(
            arena,
            BoxKind::Text {
                text: s.to_string(),
                source: Some(TextSource {
                    node: NodeId(99),
                    offset: 0,
                }),
            },
            style,
        );
        arena.append_child(parent, id);
    }

    #[test]
    fn test_nested_blocks_open_and_close() {
        let mut arena = BoxArena::new();
        let mut body_style = ComputedStyle::default();
        body_style.margin = [AutoLength::Length(LengthPercentage::Px(8.0)); 4];
        let body = alloc(&mut arena, BoxKind::Block, body_style);
        let p1 = alloc(&mut arena, BoxKind::Block, ComputedStyle::default());
        let p2 = alloc(&mut arena, BoxKind::Block, ComputedStyle::default());
        arena.append_child(body, p1);
        arena.append_child(body, p2);
        text(&mut arena, p1, "one");
        text(&mut arena, p2, "two");

        let items = linearize(&arena, body, 0.0, 300.0, InlineSizing::Stretch, &ApproximateFontMetrics);
        let kinds: Vec<&str> = items
            .iter()
            .map(|i| match i.kind {
                ItemKind::BlockStart { .. } => "start",
                ItemKind::BlockEnd { .. } => "end",
                ItemKind::Lines { .. } => "lines",
                ItemKind::Monolithic { .. } => "mono",
                ItemKind::Float { .. } => "float",
            })
            .collect();
        assert_eq!(kinds, ["start", "start", "lines", "end", "start", "lines", "end", "end"]);
        let ItemKind::BlockStart { end, .. } = items[0].kind else {
            panic!("expected block start");
        };
        assert_eq!(end, 7);
        // Children sit in the body's content box.
        assert!((items[1].inline - 8.0).abs() < f32::EPSILON);
        assert!((items[1].inline_size - 284.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_continuation_drops_block_start_edges() {
        let mut arena = BoxArena::new();
        let mut style = ComputedStyle::default();
        style.margin = [AutoLength::Length(LengthPercentage::Px(10.0)); 4];
        style.text_indent = LengthPercentage::Px(20.0);
        let p = alloc(&mut arena, BoxKind::Block, style);
        arena[p].continuation = true;
        text(&mut arena, p, "rest of it");
        let items = linearize(&arena, p, 0.0, 300.0, InlineSizing::Stretch, &ApproximateFontMetrics);
        let ItemKind::BlockStart { geometry, .. } = &items[0].kind else {
            panic!("expected block start");
        };
        assert!(geometry.margin.block_start.abs() < f32::EPSILON);
        assert!((geometry.margin.block_end - 10.0).abs() < f32::EPSILON);
        let ItemKind::Lines { indent, .. } = &items[1].kind else {
            panic!("expected lines");
        };
        assert!(indent.abs() < f32::EPSILON);
    }

    #[test]
    fn test_intrinsic_sizes_of_text_block() {
        let mut arena = BoxArena::new();
        let div = alloc(&mut arena, BoxKind::Block, ComputedStyle::default());
        text(&mut arena, div, "aaa bbbbb");
        let (min, max) = intrinsic_inline_sizes(&arena, div, &ApproximateFontMetrics);
        assert!((min - 48.0).abs() < 1e-3);
        assert!((max - 86.4).abs() < 1e-3);
    }
}
