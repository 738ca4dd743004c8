//! Filling one column.
//!
//! [CSS Fragmentation § 4 Rules for Breaking](https://www.w3.org/TR/css-break-3/#breaking-rules)
//!
//! A column walks the flattened [`Item`] sequence from a [`Cursor`],
//! stacking blocks and lines along the block axis. Every legal break point
//! it passes is registered as a candidate together with a snapshot of the
//! column state. When content no longer fits, the column goes back to the
//! chosen candidate and commits there; the cursor of that candidate is where
//! the next column starts.
//!
//! ```text
//!   Empty ──▶ Filling ──▶ FullPendingBreak ──▶ Committed
//!                └──────── (content ran out) ──────┘
//! ```

use serde::Serialize;

use super::box_model::LogicalRect;
use super::float::{FloatContext, FloatSide};
use super::fragment::{FragmentArea, FragmentKind, LogicalFragment};
use super::geometry::{InlineSizing, UsedGeometry, resolve_block_geometry, resolve_replaced_geometry};
use super::inline::{FontMetrics, FootnoteRef, LineBox, Paragraph};
use super::interval::IntervalMap;
use super::items::{Item, ItemKind, linearize, shrink_to_fit};
use crate::boxes::{BoxArena, BoxId, BoxKind, FlowPosition};
use crate::fragmentation::{BreakCandidates, BreakConstraints, FootnoteArea, PlacedFootnote};
use crate::style::{BreakValue, Clear};

/// Space between the flow and the first footnote body.
pub const FOOTNOTE_GAP: f32 = 8.0;

/// Tolerance for comparing block offsets.
const EPSILON: f32 = 0.01;

/// Progress of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ColumnState {
    /// Nothing placed yet.
    #[default]
    Empty,
    /// Appending content while it fits.
    Filling,
    /// Content overflowed; a break is being chosen.
    FullPendingBreak,
    /// The column's end is final.
    Committed,
}

/// A point in the item sequence: an item, and for lines the first segment
/// still to be laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor {
    /// Item index.
    pub item: usize,
    /// Segment of a [`ItemKind::Lines`] item.
    pub segment: usize,
}

/// How a column ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnEnd {
    /// Every item was placed.
    Exhausted,
    /// The column broke before `cursor`.
    Break {
        /// First content of the next column.
        cursor: Cursor,
        /// Document position of `cursor`.
        position: FlowPosition,
        /// The break was forced by this value.
        forced: Option<BreakValue>,
    },
}

/// What a column is asked to do.
#[derive(Debug, Clone)]
pub struct ColumnRequest {
    /// Where to start.
    pub start: Cursor,
    /// Block extent of the column.
    pub block_size: f32,
    /// Keep margins at the top of the column (after a forced break or at the
    /// start of the document).
    pub keep_top_margin: bool,
    /// A break at the end of this column is a page break.
    pub page_context: bool,
    /// The column is one of several on the page.
    pub multicol: bool,
    /// Floats deferred from the previous column, placed first.
    pub floats: Vec<BoxId>,
    /// Footnotes deferred from the previous page, placed first.
    pub footnotes: Vec<FootnoteRef>,
    /// Hand footnote calls back in [`ColumnOutput::collected_footnotes`]
    /// instead of laying out their bodies.
    pub collect_footnotes: bool,
}

impl ColumnRequest {
    /// A column of height `block_size` starting at `start`.
    #[must_use]
    pub const fn new(start: Cursor, block_size: f32) -> Self {
        Self {
            start,
            block_size,
            keep_top_margin: false,
            page_context: true,
            multicol: false,
            floats: Vec::new(),
            footnotes: Vec::new(),
            collect_footnotes: false,
        }
    }

    /// A column with no bottom, for content that is never fragmented.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            keep_top_margin: true,
            collect_footnotes: true,
            ..Self::new(Cursor { item: 0, segment: 0 }, f32::INFINITY)
        }
    }
}

/// A filled column.
#[derive(Debug, Clone)]
pub struct ColumnOutput {
    /// Final state.
    pub state: ColumnState,
    /// Fragments in flow-relative column coordinates.
    pub fragments: Vec<LogicalFragment>,
    /// Footnote bodies placed at the bottom.
    pub footnotes: FootnoteArea,
    /// Where the column ended.
    pub end: ColumnEnd,
    /// Floats that did not fit, in order.
    pub deferred_floats: Vec<BoxId>,
    /// Footnotes whose bodies did not fit, in order.
    pub deferred_footnotes: Vec<FootnoteRef>,
    /// Footnote calls met when collecting.
    pub collected_footnotes: Vec<FootnoteRef>,
    /// Block extent of the placed flow content and floats.
    pub content_block_size: f32,
}

/// Break offsets recorded by a column with no bottom, for balancing.
#[derive(Debug, Clone, Default)]
pub struct BreakOffsets {
    /// Block offset of every candidate, with its penalty.
    pub candidates: IntervalMap<f32, u32>,
    /// Block extent of all the content.
    pub total: f32,
}

/// The flattened content of one page pass, ready to be poured into columns.
pub struct ColumnLayout<'a> {
    arena: &'a BoxArena,
    items: Vec<Item>,
    metrics: &'a dyn FontMetrics,
    inline_size: f32,
}

impl<'a> ColumnLayout<'a> {
    /// Flatten the subtree at `root` for columns `inline_size` wide.
    #[must_use]
    pub fn new(arena: &'a BoxArena, root: BoxId, inline_size: f32, metrics: &'a dyn FontMetrics) -> Self {
        Self {
            arena,
            items: linearize(arena, root, 0.0, inline_size, InlineSizing::Stretch, metrics),
            metrics,
            inline_size,
        }
    }

    /// Content with no root box: only deferred floats and footnotes.
    #[must_use]
    pub const fn empty(arena: &'a BoxArena, inline_size: f32, metrics: &'a dyn FontMetrics) -> Self {
        Self {
            arena,
            items: Vec::new(),
            metrics,
            inline_size,
        }
    }

    /// The item sequence.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Column inline size.
    #[must_use]
    pub const fn inline_size(&self) -> f32 {
        self.inline_size
    }

    /// Fill one column.
    #[must_use]
    pub fn fill(&self, request: ColumnRequest) -> ColumnOutput {
        let filler = Filler::new(self, &request, None);
        filler.run(request.start, request.floats, request.footnotes).0
    }

    /// Lay everything from `start` out in a column with no bottom and record
    /// the block offset of each break candidate.
    #[must_use]
    pub fn break_offsets(&self, start: Cursor, page_context: bool) -> BreakOffsets {
        let mut request = ColumnRequest::unbounded();
        request.start = start;
        request.page_context = page_context;
        request.keep_top_margin = false;
        let filler = Filler::new(self, &request, Some(BreakOffsets::default()));
        let (output, offsets) = filler.run(start, Vec::new(), Vec::new());
        let mut offsets = offsets.unwrap_or_default();
        offsets.total = output.content_block_size;
        offsets
    }
}

/// Content laid out in one piece, in coordinates relative to its margin box.
#[derive(Debug, Clone, Default)]
pub struct Monolith {
    /// Fragments.
    pub fragments: Vec<LogicalFragment>,
    /// Inline size of the margin box.
    pub inline_size: f32,
    /// Block size of the margin box.
    pub block_size: f32,
    /// Block-start and block-end margins.
    pub margins: (f32, f32),
    /// Footnote calls inside the content.
    pub footnotes: Vec<FootnoteRef>,
}

/// [CSS Fragmentation § 2.1](https://www.w3.org/TR/css-break-3/#monolithic)
///
/// "Monolithic elements ... cannot be fragmented." Lay out the box `id` in a
/// containing block `containing_inline` wide without any break.
#[must_use]
pub fn layout_monolith(
    arena: &BoxArena,
    id: BoxId,
    containing_inline: f32,
    sizing: InlineSizing,
    metrics: &dyn FontMetrics,
) -> Monolith {
    let b = &arena[id];
    match &b.kind {
        BoxKind::Replaced { intrinsic, src } => {
            let used = resolve_replaced_geometry(&b.style, containing_inline, None, intrinsic.unwrap_or((0.0, 0.0)));
            let rect = border_box(&used, used.margin.inline_start, used.margin.block_start, used.block_size.unwrap_or(0.0));
            Monolith {
                fragments: vec![LogicalFragment {
                    kind: FragmentKind::Image { src: src.clone() },
                    rect,
                    area: FragmentArea::Flow,
                    node: b.node,
                }],
                inline_size: used.outer_inline_size(),
                block_size: rect.block_size + used.margin.block_sum(),
                margins: (used.margin.block_start, used.margin.block_end),
                footnotes: Vec::new(),
            }
        }
        BoxKind::TableRow => layout_row(arena, id, containing_inline, metrics),
        _ => {
            let layout = ColumnLayout {
                arena,
                items: linearize(arena, id, 0.0, containing_inline, sizing, metrics),
                metrics,
                inline_size: containing_inline,
            };
            let margins = match layout.items.first().map(|i| &i.kind) {
                Some(ItemKind::BlockStart { geometry, .. }) => geometry,
                _ => return Monolith::default(),
            };
            let inline_size = margins.outer_inline_size();
            let margins = (margins.margin.block_start, margins.margin.block_end);
            let output = layout.fill(ColumnRequest::unbounded());
            Monolith {
                fragments: output.fragments,
                inline_size,
                block_size: output.content_block_size,
                margins,
                footnotes: output.collected_footnotes,
            }
        }
    }
}

/// A table row: its cells share the row's inline size equally and the
/// tallest cell sets the row's height.
fn layout_row(arena: &BoxArena, id: BoxId, containing_inline: f32, metrics: &dyn FontMetrics) -> Monolith {
    let b = &arena[id];
    let geometry = resolve_block_geometry(&b.style, containing_inline, None, InlineSizing::Stretch);
    let count = b.children.len().max(1);
    let cell_inline = geometry.inline_size / count as f32;
    let content_inline = geometry.margin.inline_start + geometry.border.inline_start + geometry.padding.inline_start;
    let content_block = geometry.block_start_edges();

    let mut fragments = Vec::new();
    let mut footnotes = Vec::new();
    let mut tallest: f32 = 0.0;
    for (index, &cell) in b.children.iter().enumerate() {
        let laid = layout_monolith(arena, cell, cell_inline, InlineSizing::Stretch, metrics);
        tallest = tallest.max(laid.block_size);
        let inline = content_inline + index as f32 * cell_inline;
        fragments.extend(laid.fragments.iter().map(|f| f.offset(inline, content_block, None)));
        footnotes.extend(laid.footnotes);
    }
    let rect = border_box(
        &geometry,
        geometry.margin.inline_start,
        geometry.margin.block_start,
        geometry.clamp_block(tallest),
    );
    fragments.insert(0, LogicalFragment {
        kind: FragmentKind::Block,
        rect,
        area: FragmentArea::Flow,
        node: b.node,
    });
    Monolith {
        fragments,
        inline_size: geometry.outer_inline_size(),
        block_size: rect.block_size + geometry.margin.block_sum(),
        margins: (geometry.margin.block_start, geometry.margin.block_end),
        footnotes,
    }
}

/// Border box of a box whose content is `content_block` tall, with its
/// border-box corner at `(inline, block)`.
fn border_box(geometry: &UsedGeometry, inline: f32, block: f32, content_block: f32) -> LogicalRect {
    LogicalRect::new(
        inline,
        block,
        geometry.inline_size + geometry.border.inline_sum() + geometry.padding.inline_sum(),
        content_block + geometry.border.block_sum() + geometry.padding.block_sum(),
    )
}

/// [§ 8.3.1 Collapsing margins](https://www.w3.org/TR/CSS2/box.html#collapsing-margins)
///
/// "In the case of negative margins, the maximum of the absolute values of
/// the negative adjoining margins is deducted from the maximum of the
/// positive adjoining margins."
#[derive(Debug, Clone, Copy, Default)]
struct CollapsedMargin {
    positive: f32,
    negative: f32,
}

impl CollapsedMargin {
    fn add(&mut self, margin: f32) {
        if margin >= 0.0 {
            self.positive = self.positive.max(margin);
        } else {
            self.negative = self.negative.min(margin);
        }
    }

    fn take(&mut self) -> f32 {
        let resolved = self.positive + self.negative;
        *self = Self::default();
        resolved
    }
}

/// A block whose block-end edge has not been reached.
#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    item: usize,
    fragment: usize,
    /// Border-box top, once the margins above it are resolved.
    top: Option<f32>,
    start_edges: f32,
    /// The block began in an earlier column.
    continued: bool,
}

/// Column state to return to when a candidate is taken.
#[derive(Debug, Clone)]
struct Snapshot {
    cursor: Cursor,
    position: FlowPosition,
    block: f32,
    open: Vec<OpenBlock>,
    out_len: usize,
    floats_len: usize,
    footnotes_len: usize,
    deferred_floats_len: usize,
    deferred_footnotes_len: usize,
    collected_len: usize,
}

/// Candidate shared by a run of block-start edges: a break before a first
/// child is a break before its parent.
#[derive(Debug, Clone, Copy)]
struct Chain {
    candidate: usize,
    between: BreakValue,
    avoid_inside: u32,
}

struct Filler<'l> {
    layout: &'l ColumnLayout<'l>,
    limit: f32,
    keep_top_margin: bool,
    page_context: bool,
    multicol: bool,
    collect: bool,
    state: ColumnState,
    cursor: Cursor,
    block: f32,
    margin: CollapsedMargin,
    /// Some margin was resolved in this column, so later ones are kept.
    placed: bool,
    has_content: bool,
    open: Vec<OpenBlock>,
    out: Vec<LogicalFragment>,
    floats: FloatContext,
    footnotes: FootnoteArea,
    candidates: BreakCandidates<Snapshot>,
    chain: Option<Chain>,
    pending_break: BreakValue,
    deferring_footnotes: bool,
    deferred_floats: Vec<BoxId>,
    deferred_footnotes: Vec<FootnoteRef>,
    collected: Vec<FootnoteRef>,
    offsets: Option<BreakOffsets>,
}

impl<'l> Filler<'l> {
    fn new(layout: &'l ColumnLayout<'l>, request: &ColumnRequest, offsets: Option<BreakOffsets>) -> Self {
        Self {
            layout,
            limit: request.block_size.max(0.0),
            keep_top_margin: request.keep_top_margin,
            page_context: request.page_context,
            multicol: request.multicol,
            collect: request.collect_footnotes,
            state: ColumnState::Empty,
            cursor: request.start,
            block: 0.0,
            margin: CollapsedMargin::default(),
            placed: false,
            has_content: false,
            open: Vec::new(),
            out: Vec::new(),
            floats: FloatContext::new(layout.inline_size),
            footnotes: FootnoteArea::new(FOOTNOTE_GAP),
            candidates: BreakCandidates::new(),
            chain: None,
            pending_break: BreakValue::Auto,
            deferring_footnotes: false,
            deferred_floats: Vec::new(),
            deferred_footnotes: Vec::new(),
            collected: Vec::new(),
            offsets,
        }
    }

    fn run(
        mut self,
        start: Cursor,
        floats: Vec<BoxId>,
        footnotes: Vec<FootnoteRef>,
    ) -> (ColumnOutput, Option<BreakOffsets>) {
        self.state = ColumnState::Filling;
        self.cursor = start;
        self.reopen_ancestors();
        for note in footnotes {
            self.footnote(note, true);
        }
        let inline_size = self.layout.inline_size;
        for id in floats {
            self.float(id, 0.0, inline_size, true);
        }
        let layout = self.layout;
        while self.cursor.item < layout.items.len() {
            if let Some(end) = self.step() {
                return self.finish(end);
            }
        }
        self.finish(ColumnEnd::Exhausted)
    }

    /// Blocks that contain the start cursor continue from the previous
    /// column, without their block-start edges.
    fn reopen_ancestors(&mut self) {
        let layout = self.layout;
        let start = self.cursor.item;
        for (index, item) in layout.items.iter().enumerate().take(start) {
            if let ItemKind::BlockStart { geometry, end, .. } = &item.kind
                && *end >= start
            {
                let fragment = self.out.len();
                self.out.push(block_fragment(item, geometry, 0.0));
                self.open.push(OpenBlock {
                    item: index,
                    fragment,
                    top: Some(0.0),
                    start_edges: 0.0,
                    continued: true,
                });
            }
        }
    }

    fn available(&self) -> f32 {
        self.limit - self.footnotes.block_size()
    }

    fn advance(&mut self) {
        self.cursor = Cursor {
            item: self.cursor.item + 1,
            segment: 0,
        };
    }

    fn step(&mut self) -> Option<ColumnEnd> {
        let layout = self.layout;
        let index = self.cursor.item;
        let item = &layout.items[index];
        match &item.kind {
            ItemKind::BlockStart { id, geometry, .. } => self.block_start(index, item, *id, geometry),
            ItemKind::BlockEnd { start } => {
                self.block_end(*start);
                None
            }
            ItemKind::Lines {
                paragraph,
                indent,
                orphans,
                widows,
                ..
            } => self.lines(index, item, paragraph, *indent, (*orphans, *widows)),
            ItemKind::Monolithic { id } => self.monolithic(index, item, *id),
            ItemKind::Float { id } => {
                self.float(*id, item.inline, item.inline_size, false);
                self.advance();
                None
            }
        }
    }

    /// [§ 5.2 Adjoining Margins at Breaks](https://www.w3.org/TR/css-break-3/#break-margins)
    ///
    /// "When an unforced break occurs between block-level boxes, any margins
    /// adjoining the break truncate to zero."
    fn resolve_margins(&mut self) {
        let margin = self.margin.take();
        if self.placed || self.keep_top_margin {
            self.block += margin;
        }
        self.placed = true;
        for open in &mut self.open {
            if open.top.is_none() {
                open.top = Some(self.block);
            }
        }
    }

    fn avoid_inside(&self) -> u32 {
        let layout = self.layout;
        self.open
            .iter()
            .filter(|open| match &layout.items[open.item].kind {
                ItemKind::BlockStart { id, .. } => layout.arena[*id].style.break_inside.avoids(self.page_context),
                _ => false,
            })
            .count() as u32
    }

    fn snapshot(&self, cursor: Cursor, position: FlowPosition) -> Snapshot {
        Snapshot {
            cursor,
            position,
            block: self.block,
            open: self.open.clone(),
            out_len: self.out.len(),
            floats_len: self.floats.floats().len(),
            footnotes_len: self.footnotes.len(),
            deferred_floats_len: self.deferred_floats.len(),
            deferred_footnotes_len: self.deferred_footnotes.len(),
            collected_len: self.collected.len(),
        }
    }

    fn register(&mut self, snapshot: Snapshot, constraints: &BreakConstraints) -> usize {
        if let Some(offsets) = &mut self.offsets {
            offsets.candidates.insert(self.block, constraints.penalty());
        }
        self.candidates.push(snapshot, constraints)
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        self.cursor = snapshot.cursor;
        self.block = snapshot.block;
        self.open.clone_from(&snapshot.open);
        self.out.truncate(snapshot.out_len);
        self.floats.retain_before(snapshot.floats_len);
        self.footnotes.truncate(snapshot.footnotes_len);
        self.deferred_floats.truncate(snapshot.deferred_floats_len);
        self.deferred_footnotes.truncate(snapshot.deferred_footnotes_len);
        self.collected.truncate(snapshot.collected_len);
    }

    fn commit(&mut self, candidate: usize, forced: Option<BreakValue>) -> Option<ColumnEnd> {
        let snapshot = self.candidates.get(candidate)?.at.clone();
        self.restore(&snapshot);
        self.state = ColumnState::Committed;
        Some(ColumnEnd::Break {
            cursor: snapshot.cursor,
            position: snapshot.position,
            forced,
        })
    }

    /// Content does not fit. Go back to the chosen candidate, or report that
    /// there is none and the content is placed anyway.
    fn overflow(&mut self) -> Option<ColumnEnd> {
        if !self.has_content {
            return None;
        }
        self.state = ColumnState::FullPendingBreak;
        let Some(choice) = self.candidates.choose() else {
            self.state = ColumnState::Filling;
            return None;
        };
        let snapshot = choice.at.clone();
        tracing::trace!(
            penalty = choice.penalty,
            candidates = self.candidates.len(),
            at = %snapshot.position,
            "column full"
        );
        self.restore(&snapshot);
        self.state = ColumnState::Committed;
        Some(ColumnEnd::Break {
            cursor: snapshot.cursor,
            position: snapshot.position,
            forced: None,
        })
    }

    /// [§ 4.1 Possible Break Points](https://www.w3.org/TR/css-break-3/#possible-breaks)
    ///
    /// "Class A: between sibling boxes." Register the break before item
    /// `index` and take it at once when it is forced.
    fn boundary(&mut self, index: usize, before: BreakValue) -> Option<ColumnEnd> {
        let layout = self.layout;
        let chained = index > 0 && matches!(layout.items[index - 1].kind, ItemKind::BlockStart { .. });
        if chained {
            // "Forced break values specified on a first child propagate to
            // the parent."
            let chain = self.chain.as_mut()?;
            chain.between = chain.between.combine(before);
            let chain = *chain;
            self.candidates.repenalize(chain.candidate, &BreakConstraints {
                between: chain.between,
                avoid_inside: chain.avoid_inside,
                page_context: self.page_context,
                ..BreakConstraints::default()
            });
            if let Some(offsets) = &mut self.offsets
                && let Some(candidate) = self.candidates.get(chain.candidate)
            {
                offsets.candidates.insert(candidate.at.block, candidate.penalty);
            }
        } else {
            let between = self.pending_break.combine(before);
            self.pending_break = BreakValue::Auto;
            self.chain = None;
            if !self.has_content {
                return None;
            }
            let avoid_inside = self.avoid_inside();
            let snapshot = self.snapshot(
                Cursor {
                    item: index,
                    segment: 0,
                },
                layout.items[index].start.clone(),
            );
            let candidate = self.register(snapshot, &BreakConstraints {
                between,
                avoid_inside,
                page_context: self.page_context,
                ..BreakConstraints::default()
            });
            self.chain = Some(Chain {
                candidate,
                between,
                avoid_inside,
            });
        }

        let chain = self.chain?;
        // A column break outside a multi-column container does not apply.
        let applies = self.multicol || chain.between != BreakValue::Column;
        if chain.between.is_forced() && applies && self.limit.is_finite() {
            tracing::trace!(value = %chain.between, "forced break");
            return self.commit(chain.candidate, Some(chain.between));
        }
        None
    }

    fn block_start(&mut self, index: usize, item: &Item, id: BoxId, geometry: &UsedGeometry) -> Option<ColumnEnd> {
        let layout = self.layout;
        let style = &layout.arena[id].style;
        // STEP 1: The edge before the box is a break opportunity.
        if let Some(end) = self.boundary(index, style.break_before) {
            return Some(end);
        }

        // STEP 2: Collapse the top margin, apply clearance, and place the
        // block-start border and padding.
        self.margin.add(geometry.margin.block_start);
        let mut top = None;
        // [§ 9.5.2](https://www.w3.org/TR/CSS2/visuren.html#flow-control)
        // "Clearance is introduced as spacing above the margin-top of an
        // element."
        if style.clear != Clear::None && !self.floats.is_empty() {
            self.resolve_margins();
            self.block = self.floats.clear(style.clear, style.direction, self.block);
            top = Some(self.block);
        }
        let start_edges = geometry.border.block_start + geometry.padding.block_start;
        if start_edges > 0.0 {
            self.resolve_margins();
            if self.block + start_edges > self.available() + EPSILON
                && let Some(end) = self.overflow()
            {
                return Some(end);
            }
            top = Some(self.block);
            self.block += start_edges;
            self.has_content = true;
        }

        let fragment = self.out.len();
        self.out.push(block_fragment(item, geometry, top.unwrap_or(self.block)));
        self.open.push(OpenBlock {
            item: index,
            fragment,
            top,
            start_edges,
            continued: layout.arena[id].continuation,
        });
        self.advance();
        None
    }

    fn block_end(&mut self, start: usize) {
        let layout = self.layout;
        self.advance();
        let ItemKind::BlockStart { id, geometry, .. } = &layout.items[start].kind else {
            return;
        };
        let open = match self.open.last() {
            Some(open) if open.item == start => self.open.pop(),
            _ => None,
        };
        let Some(open) = open else {
            return;
        };

        // [§ 10.6.3](https://www.w3.org/TR/CSS2/visudet.html#normal-block)
        // Without bottom border or padding, the last child's bottom margin
        // collapses through the parent's.
        let end_edges = geometry.block_end_decoration();
        let sized = geometry.block_size.is_some() || geometry.min_block_size > 0.0;
        if end_edges > 0.0 || sized {
            self.resolve_margins();
        }
        let top = open.top.unwrap_or(self.block);
        let content_top = top + open.start_edges;
        let content = (self.block - content_top).max(0.0);
        let used = if open.continued {
            content
        } else {
            geometry.clamp_block(content)
        };
        self.block = content_top + used + end_edges;
        if let Some(fragment) = self.out.get_mut(open.fragment) {
            fragment.rect.block = top;
            fragment.rect.block_size = self.block - top;
        }
        self.margin.add(geometry.margin.block_end);
        self.pending_break = self.pending_break.combine(layout.arena[*id].style.break_after);
    }

    fn lines(
        &mut self,
        index: usize,
        item: &Item,
        paragraph: &Paragraph,
        indent: f32,
        (orphans, widows): (u32, u32),
    ) -> Option<ColumnEnd> {
        let from = self.cursor.segment;
        self.resolve_margins();
        let top = self.block;
        let floats = &self.floats;
        let bounds = (item.inline, item.inline + item.inline_size);
        let indent = if from == 0 { indent } else { 0.0 };
        let lines = paragraph.break_lines(from, indent, &mut |offset, extent| {
            let (start, size) = floats.available_inline_within(top + offset, extent, bounds);
            (start - item.inline, size)
        });

        let count = lines.len();
        for (k, line) in lines.into_iter().enumerate() {
            let at = Cursor {
                item: index,
                segment: line.first_segment,
            };
            // [§ 4.1](https://www.w3.org/TR/css-break-3/#possible-breaks)
            // "Class C: between line boxes inside a block container box."
            if k > 0 && self.has_content {
                let constraints = BreakConstraints {
                    avoid_inside: self.avoid_inside(),
                    lines_before: Some(k as u32),
                    lines_after: Some((count - k) as u32),
                    orphans,
                    widows,
                    page_context: self.page_context,
                    ..BreakConstraints::default()
                };
                let snapshot = self.snapshot(at, line.start.clone());
                let _ = self.register(snapshot, &constraints);
            }
            if self.block + line.block_size > self.available() + EPSILON
                && let Some(end) = self.overflow()
            {
                return Some(end);
            }
            self.place_line(item, &line);
            self.has_content = true;
            for note in &line.footnotes {
                self.footnote(*note, false);
            }
        }
        self.pending_break = BreakValue::Auto;
        self.advance();
        None
    }

    fn place_line(&mut self, item: &Item, line: &LineBox) {
        for fragment in &line.fragments {
            self.out.push(LogicalFragment {
                kind: fragment.content.clone().into(),
                rect: LogicalRect::new(
                    item.inline + fragment.inline,
                    self.block + fragment.block,
                    fragment.inline_size,
                    fragment.block_size,
                ),
                area: FragmentArea::Flow,
                node: fragment.node,
            });
        }
        self.block += line.block_size;
    }

    fn monolithic(&mut self, index: usize, item: &Item, id: BoxId) -> Option<ColumnEnd> {
        let layout = self.layout;
        let style = &layout.arena[id].style;
        if let Some(end) = self.boundary(index, style.break_before) {
            return Some(end);
        }
        let laid = layout_monolith(layout.arena, id, item.inline_size, InlineSizing::Stretch, layout.metrics);
        self.margin.add(laid.margins.0);
        self.resolve_margins();
        let border_size = laid.block_size - laid.margins.0 - laid.margins.1;
        // "If a single atomic box is larger than the column, it is placed
        // anyway."
        if self.block + border_size > self.available() + EPSILON
            && let Some(end) = self.overflow()
        {
            return Some(end);
        }
        let block = self.block - laid.margins.0;
        self.out
            .extend(laid.fragments.iter().map(|f| f.offset(item.inline, block, None)));
        self.block += border_size;
        self.margin.add(laid.margins.1);
        self.has_content = true;
        self.pending_break = style.break_after;
        for note in laid.footnotes {
            self.footnote(note, false);
        }
        self.advance();
        None
    }

    /// [§ 9.5.1](https://www.w3.org/TR/CSS2/visuren.html#float-position)
    ///
    /// Place a float at the current block offset, or defer it to the next
    /// column when it does not fit below content already placed.
    fn float(&mut self, id: BoxId, inline: f32, inline_size: f32, incoming: bool) {
        let layout = self.layout;
        let b = &layout.arena[id];
        let direction = b.parent.map_or(b.style.direction, |p| layout.arena[p].style.direction);
        let Some(side) = FloatSide::resolve(b.style.float, direction) else {
            return;
        };
        if !incoming && !self.deferred_floats.is_empty() {
            // A float may not be placed above an earlier one.
            self.deferred_floats.push(id);
            return;
        }
        let sizing = shrink_to_fit(layout.arena, id, layout.metrics);
        let laid = layout_monolith(layout.arena, id, inline_size, sizing, layout.metrics);
        let rect = self.floats.find_position_within(
            side,
            laid.inline_size,
            laid.block_size,
            self.block,
            (inline, inline + inline_size),
        );
        let fits = rect.block_end() <= self.available() + EPSILON;
        if !fits && !incoming && (self.has_content || !self.floats.is_empty()) {
            tracing::debug!(block_size = laid.block_size, "float deferred to the next column");
            self.deferred_floats.push(id);
            return;
        }
        let sequence = self.floats.floats().len();
        self.floats.place(side, rect, sequence);
        self.out.extend(
            laid.fragments
                .iter()
                .map(|f| f.offset(rect.inline, rect.block, Some(FragmentArea::Float))),
        );
        for note in laid.footnotes {
            self.footnote(note, false);
        }
    }

    /// [GCPM § 2.2](https://www.w3.org/TR/css-gcpm-3/#footnote-area)
    ///
    /// Lay the body out into the footnote area when it fits below the flow;
    /// otherwise it waits for the next page, together with every later note.
    fn footnote(&mut self, note: FootnoteRef, incoming: bool) {
        if self.collect {
            self.collected.push(note);
            return;
        }
        if self.deferring_footnotes {
            self.deferred_footnotes.push(note);
            return;
        }
        let layout = self.layout;
        let laid = layout_monolith(layout.arena, note.body, layout.inline_size, InlineSizing::Stretch, layout.metrics);
        let fits = self.block + self.footnotes.block_size_with(laid.block_size) <= self.limit + EPSILON;
        if fits || (incoming && self.footnotes.is_empty()) {
            self.footnotes.push(PlacedFootnote {
                number: note.number,
                body_node: note.body_node,
                block_size: laid.block_size,
                fragments: laid.fragments,
            });
        } else {
            tracing::debug!(number = note.number, "footnote deferred to the next page");
            self.deferring_footnotes = true;
            self.deferred_footnotes.push(note);
        }
    }

    fn finish(mut self, end: ColumnEnd) -> (ColumnOutput, Option<BreakOffsets>) {
        if end == ColumnEnd::Exhausted {
            self.block += self.margin.take();
        }
        // Blocks still open at the break are sliced at the column end.
        for open in &self.open {
            if let Some(fragment) = self.out.get_mut(open.fragment) {
                let top = open.top.unwrap_or(self.block);
                fragment.rect.block = top;
                fragment.rect.block_size = (self.block - top).max(0.0);
            }
        }
        let content_block_size = self.block.max(self.floats.max_float_bottom());

        if !self.footnotes.is_empty() {
            let bottom = if self.limit.is_finite() {
                self.limit
            } else {
                content_block_size + self.footnotes.block_size()
            };
            let mut block = bottom - self.footnotes.block_size() + self.footnotes.gap();
            for note in self.footnotes.notes() {
                self.out.extend(
                    note.fragments
                        .iter()
                        .map(|f| f.offset(0.0, block, Some(FragmentArea::Footnote))),
                );
                block += note.block_size;
            }
        }

        self.state = ColumnState::Committed;
        tracing::trace!(
            fragments = self.out.len(),
            block = content_block_size,
            deferred_floats = self.deferred_floats.len(),
            deferred_footnotes = self.deferred_footnotes.len(),
            "column committed"
        );
        let output = ColumnOutput {
            state: self.state,
            fragments: self.out,
            footnotes: self.footnotes,
            end,
            deferred_floats: self.deferred_floats,
            deferred_footnotes: self.deferred_footnotes,
            collected_footnotes: self.collected,
            content_block_size,
        };
        (output, self.offsets)
    }
}

fn block_fragment(item: &Item, geometry: &UsedGeometry, top: f32) -> LogicalFragment {
    LogicalFragment {
        kind: FragmentKind::Block,
        rect: border_box(geometry, item.inline + geometry.margin.inline_start, top, 0.0),
        area: FragmentArea::Flow,
        node: item.node,
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::boxes::{LayoutBox, TextSource};
    use crate::layout::inline::ApproximateFontMetrics;
    use crate::style::{AutoLength, BreakInside, ComputedStyle, Float, LengthPercentage, LineHeight};
    use folio_dom::NodeId;

    /// 10px text on 20px lines: each character is 6px wide.
    fn text_style() -> ComputedStyle {
        let mut style = ComputedStyle::default();
        style.font_size = 10.0;
        style.line_height = LineHeight::Px(20.0);
        style
    }

    struct Doc {
        arena: BoxArena,
        root: BoxId,
        next_path: u32,
    }

    impl Doc {
        fn new() -> Self {
            let mut arena = BoxArena::new();
            let root = arena.alloc(LayoutBox::new(BoxKind::Block, Rc::new(text_style()), FlowPosition::start()));
            Self {
                arena,
                root,
                next_path: 0,
            }
        }

        fn start(&mut self) -> FlowPosition {
            self.next_path += 1;
            FlowPosition {
                path: vec![self.next_path],
                offset: 0,
                after: false,
            }
        }

        fn block(&mut self, parent: BoxId, style: ComputedStyle) -> BoxId {
            let start = self.start();
            let id = self.arena.alloc(LayoutBox::new(BoxKind::Block, Rc::new(style), start));
            self.arena.append_child(parent, id);
            id
        }

        /// A paragraph of `lines` one-word lines in a 60px column.
        fn paragraph(&mut self, parent: BoxId, style: ComputedStyle, lines: usize) -> BoxId {
            let p = self.block(parent, style);
            let text = vec!["wordsss"; lines].join(" ");
            let start = self.start();
            let node = NodeId(self.next_path as usize);
            let mut b = LayoutBox::new(
                BoxKind::Text {
                    text,
                    source: Some(TextSource { node, offset: 0 }),
                },
                Rc::new(text_style()),
                start,
            );
            b.node = Some(node);
            let id = self.arena.alloc(b);
            self.arena.append_child(p, id);
            p
        }

        fn layout(&self) -> ColumnLayout<'_> {
            ColumnLayout::new(&self.arena, self.root, 60.0, &ApproximateFontMetrics)
        }
    }

    fn text_count(output: &ColumnOutput) -> usize {
        output
            .fragments
            .iter()
            .filter(|f| matches!(f.kind, FragmentKind::Text(_)))
            .count()
    }

    fn break_cursor(output: &ColumnOutput) -> Cursor {
        match output.end {
            ColumnEnd::Break { cursor, .. } => cursor,
            ColumnEnd::Exhausted => panic!("expected a break"),
        }
    }

    #[test]
    fn test_everything_fits() {
        let mut doc = Doc::new();
        let root = doc.root;
        let _ = doc.paragraph(root, text_style(), 3);
        let layout = doc.layout();
        let output = layout.fill(ColumnRequest::new(Cursor::default(), 600.0));
        assert_eq!(output.end, ColumnEnd::Exhausted);
        assert_eq!(output.state, ColumnState::Committed);
        assert_eq!(text_count(&output), 3);
        assert!((output.content_block_size - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_widows_move_a_line_to_the_next_column() {
        let mut doc = Doc::new();
        let root = doc.root;
        let _ = doc.paragraph(root, text_style(), 31);
        let layout = doc.layout();
        let first = layout.fill(ColumnRequest::new(Cursor::default(), 600.0));
        // 30 lines fit, but the last would be a widow on its own.
        assert_eq!(text_count(&first), 29);
        let cursor = break_cursor(&first);
        let second = layout.fill(ColumnRequest::new(cursor, 600.0));
        assert_eq!(text_count(&second), 2);
        assert_eq!(second.end, ColumnEnd::Exhausted);
    }

    #[test]
    fn test_short_column_falls_back_to_latest_candidate() {
        let mut doc = Doc::new();
        let root = doc.root;
        let _ = doc.paragraph(root, text_style(), 3);
        let layout = doc.layout();
        let output = layout.fill(ColumnRequest::new(Cursor::default(), 50.0));
        assert_eq!(text_count(&output), 2);
    }

    #[test]
    fn test_margins_collapse_and_truncate_at_breaks() {
        let mut doc = Doc::new();
        let root = doc.root;
        let mut style = text_style();
        style.margin[0] = AutoLength::Length(LengthPercentage::Px(30.0));
        style.margin[2] = AutoLength::Length(LengthPercentage::Px(10.0));
        let _ = doc.paragraph(root, style.clone(), 1);
        let _ = doc.paragraph(root, style, 1);
        let layout = doc.layout();

        let mut request = ColumnRequest::new(Cursor::default(), 600.0);
        request.keep_top_margin = true;
        let output = layout.fill(request);
        let tops: Vec<f32> = output
            .fragments
            .iter()
            .filter(|f| matches!(f.kind, FragmentKind::Text(_)))
            .map(|f| f.rect.block)
            .collect();
        // 30 on top, then max(10, 30) between the paragraphs.
        assert!((tops[0] - 30.0).abs() < 1e-3);
        assert!((tops[1] - 80.0).abs() < 1e-3);

        // At the top of a column after an unforced break the margin goes.
        let output = layout.fill(ColumnRequest::new(Cursor::default(), 600.0));
        let first = output.fragments.iter().find(|f| matches!(f.kind, FragmentKind::Text(_)));
        assert!(first.is_some_and(|f| f.rect.block.abs() < 1e-3));
    }

    #[test]
    fn test_forced_break_between_blocks() {
        let mut doc = Doc::new();
        let root = doc.root;
        let _ = doc.paragraph(root, text_style(), 1);
        let mut style = text_style();
        style.break_before = BreakValue::Column;
        let second = doc.paragraph(root, style, 1);
        let layout = doc.layout();
        let mut request = ColumnRequest::new(Cursor::default(), 600.0);
        request.multicol = true;
        let output = layout.fill(request);
        match &output.end {
            ColumnEnd::Break { forced, position, .. } => {
                assert_eq!(*forced, Some(BreakValue::Column));
                assert_eq!(*position, doc.arena[second].start);
            }
            ColumnEnd::Exhausted => panic!("expected a forced break"),
        }
        assert_eq!(text_count(&output), 1);
    }

    #[test]
    fn test_break_inside_avoid_moves_whole_block() {
        let mut doc = Doc::new();
        let root = doc.root;
        let _ = doc.paragraph(root, text_style(), 4);
        let mut style = text_style();
        style.break_inside = BreakInside::Avoid;
        let _ = doc.paragraph(root, style, 4);
        let layout = doc.layout();
        let output = layout.fill(ColumnRequest::new(Cursor::default(), 120.0));
        // Six lines would fit; the avoiding paragraph goes whole.
        assert_eq!(text_count(&output), 4);
        assert_eq!(break_cursor(&output).segment, 0);
    }

    #[test]
    fn test_floats_do_not_overlap() {
        let mut doc = Doc::new();
        let root = doc.root;
        for width in [80.0, 100.0] {
            let mut style = text_style();
            style.float = Float::Left;
            style.width = AutoLength::Length(LengthPercentage::Px(width));
            style.height = AutoLength::Length(LengthPercentage::Px(40.0));
            let _ = doc.block(root, style);
        }
        let layout = ColumnLayout::new(&doc.arena, doc.root, 300.0, &ApproximateFontMetrics);
        let output = layout.fill(ColumnRequest::new(Cursor::default(), 600.0));
        let floats: Vec<LogicalRect> = output
            .fragments
            .iter()
            .filter(|f| f.area == FragmentArea::Float && f.kind == FragmentKind::Block)
            .map(|f| f.rect)
            .collect();
        assert_eq!(floats.len(), 2);
        assert!(floats[1].inline >= 80.0);
    }

    #[test]
    fn test_break_offsets_record_candidates() {
        let mut doc = Doc::new();
        let root = doc.root;
        let _ = doc.paragraph(root, text_style(), 6);
        let layout = doc.layout();
        let offsets = layout.break_offsets(Cursor::default(), false);
        assert!((offsets.total - 120.0).abs() < 1e-3);
        assert_eq!(offsets.candidates.len(), 5);
        assert_eq!(offsets.candidates.floor(&65.0).map(|e| *e.1), Some(0));
    }
}
