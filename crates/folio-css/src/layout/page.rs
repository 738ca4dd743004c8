//! Laying out one page.
//!
//! [CSS Paged Media § 3](https://www.w3.org/TR/css-page-3/#page-model)
//!
//! "The page area acts as the containing block for the root element." A page
//! pass takes a [`Checkpoint`], builds the boxes for the slice of the flow
//! that can land on the page, resolves the page box from the `@page` rules,
//! splits the page area into columns, and fills them in order. The result is
//! a [`PageContent`] in physical page coordinates and the checkpoint the next
//! page starts from.

use std::collections::BTreeMap;

use folio_dom::{DomTree, NodeId};
use serde::Serialize;
use thiserror::Error;

use super::balance::balanced_height;
use super::box_model::{LogicalRect, Rect, logical_size};
use super::column::{ColumnEnd, ColumnLayout, ColumnOutput, ColumnRequest, Cursor};
use super::fragment::{FragmentArea, FragmentKind, LogicalFragment};
use super::inline::{FontMetrics, FootnoteRef};
use crate::boxes::{
    BoxBuilder, BuildOptions, Checkpoint, DeferredFootnote, FlowMap, FlowPosition, Fragment,
    ResourceSizes,
};
use crate::cascade::StyleResolver;
use crate::counters::CounterState;
use crate::page::{MarginBoxName, PageContext, PageExprContext, PageSide, PageStyle};
use crate::style::{BreakValue, ColumnFill, ComputedStyle, Direction, WritingMode};

/// Rebuilds of one page before the whole remaining document is built at once.
const MAX_REBUILDS: u32 = 8;

/// Fatal failure of one page task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The page consumed no content, so paginating would never end.
    #[error("layout made no progress at {position}")]
    NoProgress {
        /// Where the page started.
        position: String,
    },
}

/// A fragment on the page, in px from the page box's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFragment {
    /// Content.
    #[serde(flatten)]
    pub kind: FragmentKind,
    /// Border box.
    pub rect: Rect,
    /// Area of its column.
    pub area: FragmentArea,
    /// Generating node.
    #[serde(skip)]
    pub node: Option<NodeId>,
}

/// One laid-out page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    /// 0-based index within its document.
    pub index: usize,
    /// Spread side.
    pub side: PageSide,
    /// Named page.
    pub name: Option<String>,
    /// Resolved page box.
    pub style: PageStyle,
    /// Fragments in painting order.
    pub fragments: Vec<PageFragment>,
    /// Position of the first content on the page.
    #[serde(serialize_with = "display")]
    pub start: FlowPosition,
    /// Position of the first content of the next page.
    #[serde(serialize_with = "display")]
    pub end: FlowPosition,
    /// Counters in effect at the start of the page.
    #[serde(skip)]
    pub start_counters: CounterState,
    /// Inserted to put the next content on the required spread side.
    pub blank: bool,
    /// Number of columns.
    pub columns: u32,
}

fn display<S: serde::Serializer>(position: &FlowPosition, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(position)
}

impl PageContent {
    /// [CSS Paged Media § 4.2](https://www.w3.org/TR/css-page-3/#margin-boxes)
    ///
    /// Text of each margin box, with `counter(page)` as `page_number` and
    /// `counter(pages)` as `page_count`.
    #[must_use]
    pub fn margin_box_texts(&self, page_number: usize, page_count: Option<usize>) -> BTreeMap<MarginBoxName, String> {
        let ctx = PageExprContext {
            page_number,
            page_count,
            counters: &self.start_counters,
        };
        self.style
            .margin_boxes
            .iter()
            .map(|(name, content)| (*name, content.text(&ctx)))
            .collect()
    }

    /// Text of the page in fragment order, one line per text fragment run.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut line: Option<f32> = None;
        for fragment in &self.fragments {
            let text = match &fragment.kind {
                FragmentKind::Text(text) | FragmentKind::FootnoteCall(text) => text,
                FragmentKind::Block | FragmentKind::Image { .. } => continue,
            };
            match line {
                Some(y) if (y - fragment.rect.y).abs() < 0.5 => {}
                Some(_) => out.push('\n'),
                None => {}
            }
            line = Some(fragment.rect.y);
            out.push_str(text);
        }
        out
    }
}

/// [CSS Multi-column § 3.4](https://www.w3.org/TR/css-multicol-1/#pseudo-algorithm)
///
/// Used column count and width for an available inline size.
#[must_use]
pub fn column_geometry(style: &ComputedStyle, available: f32) -> (u32, f32) {
    let gap = style.column_gap.max(0.0);
    let count = match (style.column_count, style.column_width) {
        (None, None) => return (1, available.max(0.0)),
        (Some(count), None) => count.max(1),
        (None, Some(width)) => columns_fitting(available, width, gap),
        (Some(count), Some(width)) => count.min(columns_fitting(available, width, gap)).max(1),
    };
    // "W := max(0, ((U + column-gap)/N - column-gap))"
    let used = ((available + gap) / count as f32 - gap).max(0.0);
    (count, used)
}

/// "N := max(1, floor((U + column-gap)/(column-width + column-gap)))"
fn columns_fitting(available: f32, width: f32, gap: f32) -> u32 {
    ((available + gap) / (width + gap)).floor().max(1.0) as u32
}

/// Everything a page pass reads from the loaded document.
pub struct PageLayout<'a> {
    tree: &'a DomTree,
    resolver: &'a mut StyleResolver,
    flows: &'a FlowMap,
    resources: &'a dyn ResourceSizes,
    metrics: &'a dyn FontMetrics,
    base: PageStyle,
    rtl_progression: bool,
}

/// Root styles that shape every page.
struct RootStyles {
    mode: WritingMode,
    direction: Direction,
    columns: ComputedStyle,
}

/// The columns of one page pass.
struct Filled {
    outputs: Vec<ColumnOutput>,
    column_inline: f32,
    gap: f32,
}

impl<'a> PageLayout<'a> {
    /// Page passes over `tree`; `base` is the page box used where no
    /// `@page` rule applies.
    pub fn new(
        tree: &'a DomTree,
        resolver: &'a mut StyleResolver,
        flows: &'a FlowMap,
        resources: &'a dyn ResourceSizes,
        metrics: &'a dyn FontMetrics,
        base: PageStyle,
    ) -> Self {
        Self {
            tree,
            resolver,
            flows,
            resources,
            metrics,
            base,
            rtl_progression: false,
        }
    }

    /// Pages progress right to left: the first page is a left page.
    #[must_use]
    pub fn with_rtl_progression(mut self, rtl: bool) -> Self {
        self.rtl_progression = rtl;
        self
    }

    /// [CSS Writing Modes § 2](https://www.w3.org/TR/css-writing-modes-4/#principal-flow)
    ///
    /// "The principal writing mode of the document is ... taken from the
    /// root element." A vertical-rl or right-to-left root progresses pages
    /// right to left.
    #[must_use]
    pub fn principal_rtl(tree: &DomTree, resolver: &mut StyleResolver) -> bool {
        tree.document_element().is_some_and(|root| {
            let style = resolver.resolve_style(tree, root, None);
            style.writing_mode == WritingMode::VerticalRl
                || (!style.writing_mode.is_vertical() && style.direction == Direction::Rtl)
        })
    }

    fn root_styles(&mut self) -> RootStyles {
        let tree = self.tree;
        let Some(html) = tree.document_element() else {
            return RootStyles {
                mode: WritingMode::HorizontalTb,
                direction: Direction::Ltr,
                columns: ComputedStyle::default(),
            };
        };
        let root = self.resolver.resolve_style(tree, html, None);
        // Columns set on the body apply to the page like those on the root.
        let columns = [Some(html), tree.body()]
            .into_iter()
            .flatten()
            .map(|node| self.resolver.resolve_style(tree, node, None))
            .find(|style| style.column_count.is_some() || style.column_width.is_some())
            .map_or_else(|| (*root).clone(), |style| (*style).clone());
        RootStyles {
            mode: root.writing_mode,
            direction: root.direction,
            columns,
        }
    }

    /// Lay out page `index` from `checkpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NoProgress`] when the page consumed nothing.
    pub fn layout_page(&mut self, index: usize, checkpoint: &Checkpoint) -> Result<(PageContent, Checkpoint), LayoutError> {
        let side = PageSide::for_index(index, self.rtl_progression);
        // [CSS Fragmentation § 3.1](https://www.w3.org/TR/css-break-3/#break-between)
        // "left: ... force one or two page breaks ... so that the next page is
        // formatted as a left page."
        if let Some(required) = checkpoint.required_side
            && required != side
        {
            tracing::debug!(index, %side, "blank page for spread side");
            return Ok((self.blank_page(index, side, checkpoint), Checkpoint {
                required_side: None,
                ..checkpoint.clone()
            }));
        }

        let roots = self.root_styles();
        let multicol = roots.columns.column_count.is_some_and(|n| n > 1) || roots.columns.column_width.is_some();
        let mut options = BuildOptions {
            multicol,
            ..BuildOptions::default()
        };

        let mut rebuilds = 0;
        loop {
            let fragment = BoxBuilder::new(self.tree, self.resolver, self.flows, self.resources, options).build(checkpoint);
            let page = PageContext {
                index,
                side,
                name: fragment.page_name.as_deref(),
            };
            let style = self.resolver.page_style(&page, &self.base);
            let (inline, block) = logical_size(roots.mode, style.content_width(), style.content_height());
            let (count, column_inline) = column_geometry(&roots.columns, inline);

            let filled = self.fill_columns(&fragment, &roots, count, column_inline, block, checkpoint);
            let last = filled.outputs.last();
            let ran_out = last.is_some_and(|o| o.end == ColumnEnd::Exhausted)
                && !fragment.complete
                && fragment.forced_break.is_none();
            if ran_out && options.char_budget < usize::MAX {
                // The slice was too small to fill the page.
                rebuilds += 1;
                options.char_budget = if rebuilds < MAX_REBUILDS {
                    options.char_budget.saturating_mul(2)
                } else {
                    usize::MAX
                };
                continue;
            }
            return self.commit((index, side), checkpoint, &fragment, style, &roots, &filled);
        }
    }

    fn fill_columns(
        &self,
        fragment: &Fragment,
        roots: &RootStyles,
        count: u32,
        column_inline: f32,
        block: f32,
        checkpoint: &Checkpoint,
    ) -> Filled {
        let layout = match fragment.root {
            Some(root) => ColumnLayout::new(&fragment.arena, root, column_inline, self.metrics),
            None => ColumnLayout::empty(&fragment.arena, column_inline, self.metrics),
        };
        let footnotes: Vec<FootnoteRef> = fragment
            .deferred_footnotes
            .iter()
            .map(|&(body, number, body_node)| FootnoteRef {
                body,
                number,
                body_node,
            })
            .collect();
        let keep_top_margin = checkpoint.after_forced_break || checkpoint.position == FlowPosition::start();
        let gap = roots.columns.column_gap.max(0.0);

        let greedy = fill_sequence(&layout, count, block, keep_top_margin, fragment.deferred_floats.clone(), footnotes.clone());
        let balance = count > 1
            && roots.columns.column_fill == ColumnFill::Balance
            && fragment.complete
            && fragment.deferred_floats.is_empty()
            && footnotes.is_empty()
            && greedy.last().is_some_and(|o| o.end == ColumnEnd::Exhausted);
        let outputs = if balance {
            let offsets = layout.break_offsets(Cursor::default(), false);
            let height = balanced_height(&offsets, count, block);
            let balanced = fill_sequence(&layout, count, height, keep_top_margin, Vec::new(), Vec::new());
            if balanced.last().is_some_and(|o| o.end == ColumnEnd::Exhausted) {
                tracing::debug!(height, columns = count, "balanced columns");
                balanced
            } else {
                greedy
            }
        } else {
            greedy
        };
        Filled {
            outputs,
            column_inline,
            gap,
        }
    }

    fn commit(
        &self,
        (index, side): (usize, PageSide),
        checkpoint: &Checkpoint,
        fragment: &Fragment,
        style: PageStyle,
        roots: &RootStyles,
        filled: &Filled,
    ) -> Result<(PageContent, Checkpoint), LayoutError> {
        let container = Rect::new(
            style.margin[3],
            style.margin[0],
            style.content_width(),
            style.content_height(),
        );
        let mut fragments = Vec::new();
        for (column, output) in filled.outputs.iter().enumerate() {
            let offset = column as f32 * (filled.column_inline + filled.gap);
            fragments.extend(output.fragments.iter().map(|f| {
                let rect = LogicalRect {
                    inline: f.rect.inline + offset,
                    ..f.rect
                };
                physical(f, rect.to_physical(roots.mode, roots.direction, container))
            }));
        }

        let last = filled.outputs.last();
        let (end, forced) = match last.map(|o| &o.end) {
            Some(ColumnEnd::Break { position, forced, .. }) => (position.clone(), *forced),
            Some(ColumnEnd::Exhausted) | None => (fragment.end.clone(), fragment.forced_break),
        };
        let arena = &fragment.arena;
        let deferred_floats: Vec<NodeId> = last
            .map(|o| o.deferred_floats.iter().filter_map(|&id| arena[id].node).collect())
            .unwrap_or_default();
        let deferred_footnotes: Vec<DeferredFootnote> = last
            .map(|o| {
                o.deferred_footnotes
                    .iter()
                    .map(|note| DeferredFootnote {
                        body: note.body_node,
                        number: note.number,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let next = Checkpoint {
            position: end.clone(),
            deferred_floats,
            deferred_footnotes,
            required_side: match forced {
                Some(BreakValue::Left) => Some(PageSide::Left),
                Some(BreakValue::Right) => Some(PageSide::Right),
                _ => None,
            },
            after_forced_break: forced.is_some(),
        };
        if next == *checkpoint && fragments.is_empty() {
            return Err(LayoutError::NoProgress {
                position: checkpoint.position.to_string(),
            });
        }
        tracing::debug!(
            index,
            start = %checkpoint.position,
            end = %end,
            fragments = fragments.len(),
            columns = filled.outputs.len(),
            "page committed"
        );
        let content = PageContent {
            index,
            side,
            name: fragment.page_name.clone(),
            style,
            fragments,
            start: checkpoint.position.clone(),
            end,
            start_counters: fragment.start_counters.clone(),
            blank: false,
            columns: filled.outputs.len() as u32,
        };
        Ok((content, next))
    }

    fn blank_page(&self, index: usize, side: PageSide, checkpoint: &Checkpoint) -> PageContent {
        let page = PageContext { index, side, name: None };
        PageContent {
            index,
            side,
            name: None,
            style: self.resolver.page_style(&page, &self.base),
            fragments: Vec::new(),
            start: checkpoint.position.clone(),
            end: checkpoint.position.clone(),
            start_counters: CounterState::new(),
            blank: true,
            columns: 1,
        }
    }
}

/// Fill up to `count` columns in order. Floats left over from one column
/// are placed first in the next, and so are footnotes that did not fit.
fn fill_sequence(
    layout: &ColumnLayout<'_>,
    count: u32,
    block: f32,
    keep_top_margin: bool,
    mut floats: Vec<crate::boxes::BoxId>,
    mut footnotes: Vec<FootnoteRef>,
) -> Vec<ColumnOutput> {
    let mut outputs: Vec<ColumnOutput> = Vec::new();
    let mut start = Cursor::default();
    let mut keep = keep_top_margin;
    for column in 0..count {
        let last = column + 1 == count;
        let mut request = ColumnRequest::new(start, block);
        request.keep_top_margin = keep;
        request.page_context = count == 1;
        request.multicol = count > 1;
        request.floats = std::mem::take(&mut floats);
        request.footnotes = std::mem::take(&mut footnotes);
        let mut output = layout.fill(request);
        let end = output.end.clone();
        let leftovers = !output.deferred_floats.is_empty() || !output.deferred_footnotes.is_empty();
        let page_break = matches!(&end, ColumnEnd::Break { forced: Some(f), .. } if f.is_page_break());
        let carry = !last && !page_break && (end != ColumnEnd::Exhausted || leftovers);
        if carry {
            floats = std::mem::take(&mut output.deferred_floats);
            footnotes = std::mem::take(&mut output.deferred_footnotes);
        }
        outputs.push(output);
        match end {
            // Floats and footnotes left over go to the next column.
            ColumnEnd::Exhausted if carry => {
                start = Cursor {
                    item: layout.items().len(),
                    segment: 0,
                };
            }
            ColumnEnd::Exhausted => break,
            ColumnEnd::Break { cursor, forced, .. } => {
                if page_break || last {
                    break;
                }
                start = cursor;
                keep = forced.is_some();
            }
        }
    }
    outputs
}

fn physical(fragment: &LogicalFragment, rect: Rect) -> PageFragment {
    PageFragment {
        kind: fragment.kind.clone(),
        rect,
        area: fragment.area,
        node: fragment.node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_count_splits_available_width() {
        let mut style = ComputedStyle::default();
        style.column_count = Some(3);
        style.column_gap = 15.0;
        let (count, width) = column_geometry(&style, 630.0);
        assert_eq!(count, 3);
        assert!((width - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_column_width_sets_count() {
        let mut style = ComputedStyle::default();
        style.column_width = Some(150.0);
        style.column_gap = 10.0;
        let (count, width) = column_geometry(&style, 500.0);
        assert_eq!(count, 3);
        assert!((width - 160.0).abs() < 1e-3);

        // Both set: the count is a maximum.
        style.column_count = Some(2);
        assert_eq!(column_geometry(&style, 500.0).0, 2);
    }

    #[test]
    fn test_no_columns_uses_whole_width() {
        let (count, width) = column_geometry(&ComputedStyle::default(), 400.0);
        assert_eq!(count, 1);
        assert!((width - 400.0).abs() < 1e-3);
    }
}
