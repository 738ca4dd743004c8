//! CSS Inline Layout and Line Box Model.
//!
//! [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
//!
//! "In an inline formatting context, boxes are laid out horizontally, one
//! after the other, beginning at the top of a containing block. Horizontal
//! margins, borders, and padding are respected between these boxes."
//!
//! [§ 10.8 Line height calculations: the 'line-height' and 'vertical-align' properties](https://www.w3.org/TR/CSS2/visudet.html#line-height)
//!
//! "The height of the line box is determined by the rules given in the
//! section on line height calculations."
//!
//! A [`Paragraph`] is the inline content of one block container, flattened
//! into pieces and cut into unbreakable segments once. Lines are then broken
//! greedily from any segment, so the remainder of a paragraph can be broken
//! again at a different width when it moves to the next column.

use std::rc::Rc;

use folio_dom::NodeId;
use serde::Serialize;

use super::geometry::resolve_replaced_geometry;
use crate::boxes::{BoxArena, BoxId, BoxKind, FlowPosition};
use crate::style::{ComputedStyle, Direction, Hyphens, LineHeight, TextAlign, WhiteSpace};

/// Font metrics interface for text measurement during layout.
///
/// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
///
/// "CSS assumes that every font has font metrics that specify a
/// characteristic height above the baseline and a depth below it."
///
/// Implementors provide the actual per-glyph advance widths and line
/// height values needed for inline layout. The layout engine calls
/// these methods to measure text for line breaking and fragment placement.
pub trait FontMetrics {
    /// Measure the total advance width of a text string at the given font size.
    ///
    /// This should sum the advance width of each glyph in the string,
    /// matching the cursor advancement used during text rendering.
    fn text_width(&self, text: &str, font_size: f32) -> f32;

    /// Calculate the line height for a given font size.
    ///
    /// [§ 10.8.1 Leading and half-leading](https://www.w3.org/TR/CSS2/visudet.html#leading)
    ///
    /// "The initial value of 'line-height' is 'normal'. We recommend a used
    /// value for 'normal' between 1.0 and 1.2."
    fn line_height(&self, font_size: f32) -> f32;
}

/// Approximate font metrics using fixed ratios.
///
/// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
///
/// Without font data the average advance of a glyph is taken as 0.6× the
/// font size and `line-height: normal` as 1.2×, the upper end of the
/// recommended range.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateFontMetrics;

impl FontMetrics for ApproximateFontMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        const CHAR_WIDTH_RATIO: f32 = 0.6;
        text.chars().count() as f32 * font_size * CHAR_WIDTH_RATIO
    }

    fn line_height(&self, font_size: f32) -> f32 {
        const LINE_HEIGHT_RATIO: f32 = 1.2;
        font_size * LINE_HEIGHT_RATIO
    }
}

/// Used `line-height` of a style; `normal` asks the font.
#[must_use]
pub fn used_line_height(style: &ComputedStyle, metrics: &dyn FontMetrics) -> f32 {
    match style.line_height {
        LineHeight::Normal => metrics.line_height(style.font_size),
        _ => style.line_height_px(),
    }
}

const SOFT_HYPHEN: char = '\u{AD}';

/// A footnote call met on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootnoteRef {
    /// Detached body box.
    pub body: BoxId,
    /// Footnote number.
    pub number: i32,
    /// Source element of the body.
    pub body_node: NodeId,
}

#[derive(Debug, Clone)]
enum PieceKind {
    Text {
        chars: Vec<char>,
        /// Source character offset of each char; empty for generated text.
        sources: Vec<usize>,
    },
    Atomic {
        inline_size: f32,
        block_size: f32,
        src: Option<String>,
    },
    ForcedBreak,
    /// Inline-start or inline-end margin, border and padding of an inline box.
    Edge(f32),
    FootnoteCall {
        note: FootnoteRef,
        text: String,
    },
}

#[derive(Debug, Clone)]
struct Piece {
    kind: PieceKind,
    style: Rc<ComputedStyle>,
    node: Option<NodeId>,
    start: FlowPosition,
}

/// [CSS Text § 5.1 Line Breaking Details](https://www.w3.org/TR/css-text-3/#line-breaking)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opportunity {
    /// No break after this segment.
    None,
    /// "A soft wrap opportunity exists at the boundary of whitespace."
    Soft,
    /// A soft hyphen; breaking here shows a hyphen.
    Hyphen,
    /// Preserved newline or `<br>`.
    Forced,
}

/// An unbreakable run of a piece and the spaces after it.
#[derive(Debug, Clone)]
struct Segment {
    piece: usize,
    word: (usize, usize),
    space_end: usize,
    width: f32,
    space_width: f32,
    hyphen_width: f32,
    block_size: f32,
    after: Opportunity,
}

/// What a fragment on a line shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LineContent {
    /// A run of text.
    Text(String),
    /// An inline replaced element.
    Atomic {
        /// `src` of the element.
        src: Option<String>,
    },
    /// The call mark of a footnote.
    FootnoteCall(String),
}

/// A fragment of content placed on a line.
///
/// Offsets are flow-relative to the content box of the paragraph's block
/// container (inline) and to the top of the line (block).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFragment {
    /// Inline offset.
    pub inline: f32,
    /// Inline size.
    pub inline_size: f32,
    /// Block offset from the top of the line box.
    pub block: f32,
    /// Block size.
    pub block_size: f32,
    /// Content.
    pub content: LineContent,
    /// Generating node.
    #[serde(skip)]
    pub node: Option<NodeId>,
}

/// [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
///
/// "The rectangular area that contains the boxes that form a line is called
/// a line box."
#[derive(Debug, Clone)]
pub struct LineBox {
    /// [§ 10.8](https://www.w3.org/TR/CSS2/visudet.html#line-height)
    /// "The height of the line box is the distance between the uppermost box
    /// top and the lowermost box bottom."
    pub block_size: f32,
    /// Fragments, in inline order.
    pub fragments: Vec<LineFragment>,
    /// Position of the line's first content.
    pub start: FlowPosition,
    /// First segment of the line.
    pub first_segment: usize,
    /// Segment after the line.
    pub end_segment: usize,
    /// Footnote calls on the line, in order.
    pub footnotes: Vec<FootnoteRef>,
}

/// The inline content of one block container.
#[derive(Debug, Clone)]
pub struct Paragraph {
    pieces: Vec<Piece>,
    segments: Vec<Segment>,
    strut: f32,
    text_align: TextAlign,
    direction: Direction,
}

/// Band available to one line: `(inline_start, inline_size)`.
pub type LineBand = (f32, f32);

impl Paragraph {
    /// Flatten the inline-level `children` of a block container with style
    /// `style` whose content box is `containing_inline` wide.
    pub fn new(
        arena: &BoxArena,
        children: &[BoxId],
        style: &ComputedStyle,
        containing_inline: f32,
        metrics: &dyn FontMetrics,
    ) -> Self {
        let mut collector = Collector {
            arena,
            containing_inline,
            pieces: Vec::new(),
            collapsing: true,
        };
        for &child in children {
            collector.visit(child);
        }
        let pieces = collector.pieces;
        let segments = segment(&pieces, metrics);
        Self {
            pieces,
            segments,
            strut: used_line_height(style, metrics),
            text_align: style.text_align,
            direction: style.direction,
        }
    }

    /// The paragraph produces no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments
            .iter()
            .all(|s| s.after != Opportunity::Forced && !self.is_visible(s))
    }

    /// Number of segments; lines are addressed by segment index.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Height of an empty line.
    #[must_use]
    pub const fn strut(&self) -> f32 {
        self.strut
    }

    fn is_visible(&self, segment: &Segment) -> bool {
        match &self.pieces[segment.piece].kind {
            PieceKind::Text { .. } => segment.word.1 > segment.word.0,
            PieceKind::Atomic { .. } | PieceKind::FootnoteCall { .. } => true,
            PieceKind::ForcedBreak | PieceKind::Edge(_) => false,
        }
    }

    /// [CSS Sizing § 5.1 Intrinsic Sizes](https://www.w3.org/TR/css-sizing-3/#intrinsic-sizes):
    /// `(min-content, max-content)` inline sizes.
    #[must_use]
    pub fn intrinsic_sizes(&self) -> (f32, f32) {
        let mut min: f32 = 0.0;
        let mut max: f32 = 0.0;
        let mut glued = 0.0;
        let mut line = 0.0;
        for s in &self.segments {
            glued += s.width;
            line += s.width;
            if s.after != Opportunity::None {
                min = min.max(glued + if s.after == Opportunity::Hyphen { s.hyphen_width } else { 0.0 });
                glued = 0.0;
            }
            if s.after == Opportunity::Forced {
                max = max.max(line);
                line = 0.0;
            } else {
                line += s.space_width;
            }
        }
        (min.max(glued), max.max(line))
    }

    /// Break lines from segment `from`.
    ///
    /// `band(offset, extent)` gives the space free of floats for a line whose
    /// top is `offset` below the first line's top and whose height is
    /// expected to be `extent`. `indent` is added to the first line only.
    pub fn break_lines(
        &self,
        from: usize,
        indent: f32,
        band: &mut dyn FnMut(f32, f32) -> LineBand,
    ) -> Vec<LineBox> {
        let mut lines = Vec::new();
        let mut block = 0.0;
        let mut i = from;
        let n = self.segments.len();
        while i < n {
            // "A sequence of collapsible spaces at the beginning of a line is
            // removed."
            while i < n && self.is_collapsible_gap(&self.segments[i]) {
                i += 1;
            }
            if i >= n {
                break;
            }
            let (band_start, available) = band(block, self.strut);
            let indent_here = if lines.is_empty() && i == 0 { indent } else { 0.0 };

            // STEP 1: Take segments while they fit, remembering the last
            // opportunity. A segment that does not fit ends the line at that
            // opportunity; with none yet the line overflows.
            let mut used = indent_here;
            let mut last_break = None;
            let mut end = n;
            let mut j = i;
            while j < n {
                let s = &self.segments[j];
                if j > i && last_break.is_some() && used + s.width > available + 0.01 {
                    end = last_break.unwrap_or(j);
                    break;
                }
                used += s.width;
                if s.after == Opportunity::Forced {
                    end = j + 1;
                    break;
                }
                if s.after != Opportunity::None {
                    last_break = Some(j + 1);
                }
                used += s.space_width;
                j += 1;
            }

            // STEP 2: Build the line box.
            let forced = self.segments[end - 1].after == Opportunity::Forced;
            let last = end >= n;
            let line = self.build_line(i, end, band_start, available, indent_here, forced || last);
            block += line.block_size;
            lines.push(line);
            i = end;
        }
        lines
    }

    fn is_collapsible_gap(&self, s: &Segment) -> bool {
        let piece = &self.pieces[s.piece];
        matches!(piece.kind, PieceKind::Text { .. })
            && s.word.0 == s.word.1
            && s.after != Opportunity::Forced
            && !piece.style.white_space.preserves_spaces()
    }

    fn position_of(&self, s: &Segment) -> FlowPosition {
        let piece = &self.pieces[s.piece];
        match &piece.kind {
            PieceKind::Text { sources, .. } if !sources.is_empty() => FlowPosition {
                path: piece.start.path.clone(),
                offset: sources.get(s.word.0).copied().unwrap_or(piece.start.offset),
                after: false,
            },
            _ => piece.start.clone(),
        }
    }

    fn build_line(
        &self,
        first: usize,
        end: usize,
        band_start: f32,
        available: f32,
        indent: f32,
        last_line: bool,
    ) -> LineBox {
        let segments = &self.segments[first..end];
        let block_size = segments
            .iter()
            .map(|s| s.block_size)
            .fold(self.strut, f32::max);

        // Trailing spaces hang and do not count for alignment.
        let content_width: f32 = indent
            + segments.iter().map(|s| s.width).sum::<f32>()
            + segments[..segments.len() - 1].iter().map(|s| s.space_width).sum::<f32>()
            + match segments.last() {
                Some(s) if s.after == Opportunity::Hyphen && !last_line => s.hyphen_width,
                _ => 0.0,
            };
        let slack = (available - content_width).max(0.0);

        // [§ 16.2 'text-align'](https://www.w3.org/TR/CSS2/text.html#alignment-prop)
        let rtl = self.direction == Direction::Rtl;
        let (shift, justify_gap) = match self.text_align {
            TextAlign::Start => (0.0, 0.0),
            TextAlign::End => (slack, 0.0),
            TextAlign::Left => (if rtl { slack } else { 0.0 }, 0.0),
            TextAlign::Right => (if rtl { 0.0 } else { slack }, 0.0),
            TextAlign::Center => (slack / 2.0, 0.0),
            TextAlign::Justify => {
                let gaps = segments[..segments.len() - 1]
                    .iter()
                    .filter(|s| s.space_width > 0.0)
                    .count();
                if last_line || gaps == 0 {
                    (0.0, 0.0)
                } else {
                    (0.0, slack / gaps as f32)
                }
            }
        };
        let justifying = justify_gap > 0.0;

        let mut fragments: Vec<LineFragment> = Vec::new();
        let mut footnotes = Vec::new();
        let mut x = band_start + indent + shift;
        for (index, s) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();
            let piece = &self.pieces[s.piece];
            let fragment_block = |size: f32| (block_size - size).max(0.0);
            match &piece.kind {
                PieceKind::Text { chars, .. } => {
                    let keep_spaces = !is_last || piece.style.white_space.preserves_spaces();
                    let upto = if keep_spaces { s.space_end } else { s.word.1 };
                    let mut text: String = chars[s.word.0..upto]
                        .iter()
                        .filter(|&&c| c != SOFT_HYPHEN && c != '\n')
                        .collect();
                    let mut width = s.width + if is_last { 0.0 } else { s.space_width };
                    if is_last && s.after == Opportunity::Hyphen && !last_line {
                        text.push('-');
                        width += s.hyphen_width;
                    }
                    let own = s.block_size.min(block_size);
                    let merge = !justifying
                        && index > 0
                        && segments[index - 1].piece == s.piece
                        && fragments.last().is_some_and(|f| matches!(f.content, LineContent::Text(_)));
                    if merge && let Some(last) = fragments.last_mut() {
                        if let LineContent::Text(existing) = &mut last.content {
                            existing.push_str(&text);
                        }
                        last.inline_size += width;
                    } else if !text.is_empty() {
                        fragments.push(LineFragment {
                            inline: x,
                            inline_size: width,
                            block: (block_size - own) / 2.0,
                            block_size: own,
                            content: LineContent::Text(text),
                            node: piece.node,
                        });
                    }
                    x += width;
                    if s.space_width > 0.0 && !is_last {
                        x += justify_gap;
                    }
                }
                PieceKind::Atomic {
                    inline_size,
                    block_size: size,
                    src,
                } => {
                    fragments.push(LineFragment {
                        inline: x,
                        inline_size: *inline_size,
                        block: fragment_block(*size),
                        block_size: *size,
                        content: LineContent::Atomic { src: src.clone() },
                        node: piece.node,
                    });
                    x += inline_size + s.space_width;
                }
                PieceKind::FootnoteCall { note, text } => {
                    footnotes.push(*note);
                    let own = s.block_size.min(block_size);
                    fragments.push(LineFragment {
                        inline: x,
                        inline_size: s.width,
                        block: 0.0,
                        block_size: own,
                        content: LineContent::FootnoteCall(text.clone()),
                        node: piece.node,
                    });
                    x += s.width + s.space_width;
                }
                PieceKind::Edge(width) => x += width,
                PieceKind::ForcedBreak => {}
            }
        }

        LineBox {
            block_size,
            fragments,
            start: self.position_of(&segments[0]),
            first_segment: first,
            end_segment: end,
            footnotes,
        }
    }
}

/// Flattens an inline subtree into pieces, applying white-space processing.
struct Collector<'a> {
    arena: &'a BoxArena,
    containing_inline: f32,
    pieces: Vec<Piece>,
    /// The previous character was a collapsible space, or we are at the start.
    collapsing: bool,
}

impl Collector<'_> {
    fn push(&mut self, kind: PieceKind, style: Rc<ComputedStyle>, node: Option<NodeId>, start: FlowPosition) {
        self.pieces.push(Piece {
            kind,
            style,
            node,
            start,
        });
    }

    fn visit(&mut self, id: BoxId) {
        let b = &self.arena[id];
        match &b.kind {
            BoxKind::Text { text, source } => {
                let base = source.map(|s| s.offset);
                let (chars, sources) = process_white_space(text, b.style.white_space, base, &mut self.collapsing);
                if !chars.is_empty() {
                    self.push(
                        PieceKind::Text { chars, sources },
                        Rc::clone(&b.style),
                        b.node,
                        b.start.clone(),
                    );
                }
            }
            BoxKind::Replaced { intrinsic, src } => {
                let used = resolve_replaced_geometry(
                    &b.style,
                    self.containing_inline,
                    None,
                    intrinsic.unwrap_or((0.0, 0.0)),
                );
                let inline_size = used.outer_inline_size();
                let block_size =
                    used.block_size.unwrap_or(0.0) + used.margin.block_sum() + used.border.block_sum() + used.padding.block_sum();
                self.collapsing = false;
                self.push(
                    PieceKind::Atomic {
                        inline_size,
                        block_size,
                        src: src.clone(),
                    },
                    Rc::clone(&b.style),
                    b.node,
                    b.start.clone(),
                );
            }
            BoxKind::LineBreak => {
                self.collapsing = true;
                self.push(PieceKind::ForcedBreak, Rc::clone(&b.style), b.node, b.start.clone());
            }
            BoxKind::FootnoteCall {
                body,
                number,
                body_node,
            } => {
                let text = self.arena.text_of(id);
                self.collapsing = false;
                self.push(
                    PieceKind::FootnoteCall {
                        note: FootnoteRef {
                            body: *body,
                            number: *number,
                            body_node: *body_node,
                        },
                        text,
                    },
                    Rc::clone(&b.style),
                    b.node,
                    b.start.clone(),
                );
            }
            _ => {
                // Inline box: its edges take room, its children flow through.
                let edges = inline_edges(&b.style, self.containing_inline);
                if !b.continuation && edges.0 > 0.0 {
                    self.push(PieceKind::Edge(edges.0), Rc::clone(&b.style), b.node, b.start.clone());
                }
                for &child in &b.children {
                    self.visit(child);
                }
                if edges.1 > 0.0 {
                    self.push(PieceKind::Edge(edges.1), Rc::clone(&b.style), b.node, b.start.clone());
                }
            }
        }
    }
}

/// `(start, end)` margin + border + padding of an inline box.
fn inline_edges(style: &ComputedStyle, basis: f32) -> (f32, f32) {
    use crate::style::LogicalSide;
    let side = |logical| {
        let physical = style.physical(logical);
        style.margin[physical.index()].resolve(basis).unwrap_or(0.0)
            + style.border_used(physical)
            + style.padding[physical.index()].resolve(basis)
    };
    (side(LogicalSide::InlineStart), side(LogicalSide::InlineEnd))
}

/// [CSS Text § 4.1 The White Space Processing Rules](https://www.w3.org/TR/css-text-3/#white-space-rules)
///
/// Returns the processed characters and, when `base` is given, the source
/// offset of each. `collapsing` carries the collapsible-space state across
/// text runs.
fn process_white_space(
    text: &str,
    mode: WhiteSpace,
    base: Option<usize>,
    collapsing: &mut bool,
) -> (Vec<char>, Vec<usize>) {
    let mut chars: Vec<char> = Vec::with_capacity(text.len());
    let mut sources: Vec<usize> = Vec::new();
    for (index, c) in text.chars().enumerate() {
        let out = match c {
            '\r' => None,
            '\n' if mode.preserves_newlines() => {
                // "Any collapsible space immediately preceding a segment
                // break is removed."
                if !mode.preserves_spaces() && chars.last() == Some(&' ') {
                    let _ = chars.pop();
                    let _ = sources.pop();
                }
                *collapsing = true;
                Some('\n')
            }
            ' ' | '\t' if mode.preserves_spaces() => {
                *collapsing = false;
                Some(' ')
            }
            // "Any sequence of collapsible spaces and tabs immediately
            // following another collapsible space ... is removed."
            ' ' | '\t' | '\n' if *collapsing => None,
            ' ' | '\t' | '\n' => {
                *collapsing = true;
                Some(' ')
            }
            c => {
                *collapsing = false;
                Some(c)
            }
        };
        if let Some(c) = out {
            chars.push(c);
            if let Some(base) = base {
                sources.push(base + index);
            }
        }
    }
    (chars, sources)
}

/// Cut pieces into segments at every break opportunity.
fn segment(pieces: &[Piece], metrics: &dyn FontMetrics) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (index, piece) in pieces.iter().enumerate() {
        let style = &piece.style;
        let line_height = used_line_height(style, metrics);
        let simple = |width: f32, after: Opportunity, block_size: f32| Segment {
            piece: index,
            word: (0, 0),
            space_end: 0,
            width,
            space_width: 0.0,
            hyphen_width: 0.0,
            block_size,
            after,
        };
        match &piece.kind {
            PieceKind::Text { chars, .. } => {
                let wraps = style.white_space.wraps();
                let hyphenate = wraps && style.hyphens != Hyphens::None;
                let measure = |from: usize, to: usize| {
                    let s: String = chars[from..to].iter().filter(|&&c| c != SOFT_HYPHEN).collect();
                    metrics.text_width(&s, style.font_size)
                };
                let hyphen_width = metrics.text_width("-", style.font_size);
                let mut emit = |word: (usize, usize), space_end: usize, after: Opportunity| {
                    segments.push(Segment {
                        piece: index,
                        word,
                        space_end,
                        width: measure(word.0, word.1),
                        space_width: measure(word.1, space_end),
                        hyphen_width,
                        block_size: line_height,
                        after,
                    });
                };
                let len = chars.len();
                let mut word_start = 0;
                let mut k = 0;
                while k < len {
                    match chars[k] {
                        '\n' => {
                            emit((word_start, k), k + 1, Opportunity::Forced);
                            k += 1;
                            word_start = k;
                        }
                        ' ' => {
                            let spaces = k;
                            while k < len && chars[k] == ' ' {
                                k += 1;
                            }
                            let after = if wraps { Opportunity::Soft } else { Opportunity::None };
                            emit((word_start, spaces), k, after);
                            word_start = k;
                        }
                        SOFT_HYPHEN if hyphenate => {
                            emit((word_start, k), k + 1, Opportunity::Hyphen);
                            k += 1;
                            word_start = k;
                        }
                        _ => k += 1,
                    }
                }
                if word_start < len {
                    emit((word_start, len), len, Opportunity::None);
                }
            }
            PieceKind::Atomic {
                inline_size,
                block_size,
                ..
            } => {
                // Atomic inlines can be wrapped around on both sides.
                if let Some(previous) = segments.last_mut()
                    && previous.after == Opportunity::None
                    && style.white_space.wraps()
                {
                    previous.after = Opportunity::Soft;
                }
                segments.push(simple(*inline_size, Opportunity::Soft, *block_size));
            }
            PieceKind::ForcedBreak => segments.push(simple(0.0, Opportunity::Forced, line_height)),
            PieceKind::Edge(width) => segments.push(simple(*width, Opportunity::None, 0.0)),
            PieceKind::FootnoteCall { text, .. } => {
                segments.push(simple(metrics.text_width(text, style.font_size), Opportunity::None, line_height));
            }
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{LayoutBox, TextSource};
    use crate::style::LengthPercentage;

    fn paragraph(texts: &[&str], style: ComputedStyle) -> Paragraph {
        let style = Rc::new(style);
        let mut arena = BoxArena::new();
        let children: Vec<BoxId> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let start = FlowPosition {
                    path: vec![0, i as u32],
                    offset: 0,
                    after: false,
                };
                let mut b = LayoutBox::new(
                    BoxKind::Text {
                        text: (*t).to_string(),
                        source: Some(TextSource {
                            node: NodeId(i + 10),
                            offset: 0,
                        }),
                    },
                    Rc::clone(&style),
                    start,
                );
                b.node = Some(NodeId(i + 10));
                arena.alloc(b)
            })
            .collect();
        Paragraph::new(&arena, &children, &style, 1000.0, &ApproximateFontMetrics)
    }

    fn style_10px() -> ComputedStyle {
        let mut s = ComputedStyle::default();
        s.font_size = 10.0;
        s.line_height = LineHeight::Px(20.0);
        s
    }

    fn texts(lines: &[LineBox]) -> Vec<String> {
        lines
            .iter()
            .map(|l| {
                l.fragments
                    .iter()
                    .map(|f| match &f.content {
                        LineContent::Text(t) | LineContent::FootnoteCall(t) => t.clone(),
                        LineContent::Atomic { .. } => "[img]".to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_approximate_metrics() {
        let m = ApproximateFontMetrics;
        assert!((m.text_width("abcd", 10.0) - 24.0).abs() < 1e-4);
        assert!((m.line_height(10.0) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_greedy_wrapping_collapses_spaces() {
        // Each character is 6px wide.
        let p = paragraph(&["aaaa   bbbb\ncccc dddd"], style_10px());
        let lines = p.break_lines(0, 0.0, &mut |_, _| (0.0, 60.0));
        assert_eq!(texts(&lines), vec!["aaaa bbbb", "cccc dddd"]);
        assert!((lines[0].block_size - 20.0).abs() < 1e-4);
        assert_eq!(lines[1].start.offset, 12);
    }

    #[test]
    fn test_resume_from_a_later_segment() {
        let p = paragraph(&["one two three four"], style_10px());
        let lines = p.break_lines(0, 0.0, &mut |_, _| (0.0, 50.0));
        assert_eq!(texts(&lines), vec!["one two", "three", "four"]);
        let rest = p.break_lines(lines[1].first_segment, 0.0, &mut |_, _| (0.0, 200.0));
        assert_eq!(texts(&rest), vec!["three four"]);
    }

    #[test]
    fn test_soft_hyphen_breaks_and_shows_hyphen() {
        let p = paragraph(&["hyphen\u{AD}ation"], style_10px());
        let lines = p.break_lines(0, 0.0, &mut |_, _| (0.0, 50.0));
        assert_eq!(texts(&lines), vec!["hyphen-", "ation"]);
        let wide = p.break_lines(0, 0.0, &mut |_, _| (0.0, 500.0));
        assert_eq!(texts(&wide), vec!["hyphenation"]);

        let mut no_hyphens = style_10px();
        no_hyphens.hyphens = Hyphens::None;
        let p = paragraph(&["hyphen\u{AD}ation"], no_hyphens);
        assert_eq!(p.break_lines(0, 0.0, &mut |_, _| (0.0, 50.0)).len(), 1);
    }

    #[test]
    fn test_pre_keeps_spaces_and_newlines() {
        let mut s = style_10px();
        s.white_space = WhiteSpace::Pre;
        let p = paragraph(&["a  b\nc"], s);
        let lines = p.break_lines(0, 0.0, &mut |_, _| (0.0, 6.0));
        assert_eq!(texts(&lines), vec!["a  b", "c"]);
    }

    #[test]
    fn test_words_across_runs_stay_together() {
        let p = paragraph(&["ab", "cd ef"], style_10px());
        let lines = p.break_lines(0, 0.0, &mut |_, _| (0.0, 30.0));
        assert_eq!(texts(&lines), vec!["abcd", "ef"]);
    }

    #[test]
    fn test_alignment_and_indent() {
        let mut s = style_10px();
        s.text_align = TextAlign::Center;
        let p = paragraph(&["abcd"], s);
        let lines = p.break_lines(0, 0.0, &mut |_, _| (0.0, 100.0));
        assert!((lines[0].fragments[0].inline - 38.0).abs() < 1e-4);

        let mut s = style_10px();
        s.text_indent = LengthPercentage::Px(12.0);
        let p = paragraph(&["abcd efgh"], s);
        let lines = p.break_lines(0, 12.0, &mut |_, _| (5.0, 100.0));
        assert!((lines[0].fragments[0].inline - 17.0).abs() < 1e-4);
    }

    #[test]
    fn test_band_narrows_lines() {
        let p = paragraph(&["aa bb cc dd"], style_10px());
        let mut calls = Vec::new();
        let lines = p.break_lines(0, 0.0, &mut |offset, _| {
            calls.push(offset);
            if offset < 20.0 { (30.0, 20.0) } else { (0.0, 100.0) }
        });
        assert_eq!(texts(&lines), vec!["aa", "bb cc dd"]);
        assert!((lines[0].fragments[0].inline - 30.0).abs() < 1e-4);
        assert_eq!(calls, vec![0.0, 20.0]);
    }

    #[test]
    fn test_intrinsic_sizes() {
        let p = paragraph(&["aaa bbbbb"], style_10px());
        let (min, max) = p.intrinsic_sizes();
        assert!((min - 30.0).abs() < 1e-4);
        assert!((max - 54.0).abs() < 1e-4);
    }
}
