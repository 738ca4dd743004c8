//! Box generation.
//!
//! [CSS Display § 2](https://www.w3.org/TR/css-display-3/#the-display-properties)
//!
//! "The display property defines an element's display type, which consists of
//! the two basic qualities of how an element generates boxes."
//!
//! [`BoxBuilder`] walks the document in order from a [`Checkpoint`]. Content
//! before the checkpoint generates no boxes but still runs its counter
//! operations, so counters on the new page match a walk from the start.
//! Elements the checkpoint is inside of become *continuation* boxes: their
//! block-start edge, `::before` and list marker were laid out on an earlier
//! page.
//!
//! Building stops early at a forced page break, at a change of named page, or
//! once enough text has been generated to fill a page; the layout engine asks
//! for a larger slice if it runs out.

use std::rc::Rc;

use folio_dom::{DomTree, ElementData, NodeId, NodeType};

use super::{
    BoxArena, BoxId, BoxKind, Checkpoint, FlowMap, FlowPosition, LayoutBox, ResourceSizes,
    TextSource,
};
use crate::cascade::StyleResolver;
use crate::counters::{CounterState, CounterStyle, format_counter};
use crate::expr::{Content, ExprContext};
use crate::selector::PseudoElement;
use crate::style::{BreakValue, ComputedStyle, DisplayValue, Float, InnerDisplayType};

/// Tags of elements replaced by external content.
const REPLACED_TAGS: [&str; 7] = ["img", "svg", "video", "object", "iframe", "canvas", "embed"];

/// [CSS Images § 5.1 default object size](https://www.w3.org/TR/css-images-3/#default-object-size)
const DEFAULT_OBJECT_SIZE: (f32, f32) = (300.0, 150.0);

/// Knobs for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Stop at the next block boundary once this many characters were generated.
    pub char_budget: usize,
    /// The page is multi-column, so `break-before: always` means a column break
    /// rather than a page break.
    pub multicol: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            char_budget: 4096,
            multicol: false,
        }
    }
}

/// The boxes for one slice of the flow.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// All boxes, including detached footnote bodies and deferred floats.
    pub arena: BoxArena,
    /// Box of the document element, if it generated one.
    pub root: Option<BoxId>,
    /// Roots of floats deferred from an earlier page, in order.
    pub deferred_floats: Vec<BoxId>,
    /// Bodies of footnotes deferred from an earlier page, with their numbers.
    pub deferred_footnotes: Vec<(BoxId, i32, NodeId)>,
    /// Where building stopped.
    pub end: FlowPosition,
    /// The whole remaining document was built.
    pub complete: bool,
    /// Building stopped at this forced page break.
    pub forced_break: Option<BreakValue>,
    /// Counters in effect at the start position.
    pub start_counters: CounterState,
    /// Named page of the first block on the slice.
    pub page_name: Option<String>,
}

/// How a node relates to the start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Entirely before the start: counters only.
    Skip,
    /// Contains the start: the box continues from an earlier page.
    Continue,
    /// At or after the start.
    Fresh,
}

/// What an expression inside generated content sees.
struct ElementExpr<'a> {
    element: Option<&'a ElementData>,
    counters: &'a CounterState,
}

impl ExprContext for ElementExpr<'_> {
    fn attr(&self, name: &str) -> Option<String> {
        self.element.and_then(|e| e.attr(name)).map(str::to_string)
    }

    fn counter(&self, name: &str) -> Option<i32> {
        self.counters.value(name)
    }

    fn counters(&self, name: &str) -> Vec<i32> {
        self.counters.values(name).to_vec()
    }
}

/// Generates boxes for one page pass.
pub struct BoxBuilder<'a> {
    tree: &'a DomTree,
    resolver: &'a mut StyleResolver,
    flows: &'a FlowMap,
    resources: &'a dyn ResourceSizes,
    options: BuildOptions,
    arena: BoxArena,
    counters: CounterState,
    start: FlowPosition,
    path: Vec<u32>,
    detached: u32,
    started: Option<CounterState>,
    chars: usize,
    content_emitted: bool,
    pending_break: BreakValue,
    page_name: Option<String>,
    stop: Option<(FlowPosition, Option<BreakValue>)>,
}

impl<'a> BoxBuilder<'a> {
    /// Builder over `tree`, resolving styles through `resolver`.
    pub fn new(
        tree: &'a DomTree,
        resolver: &'a mut StyleResolver,
        flows: &'a FlowMap,
        resources: &'a dyn ResourceSizes,
        options: BuildOptions,
    ) -> Self {
        Self {
            tree,
            resolver,
            flows,
            resources,
            options,
            arena: BoxArena::new(),
            counters: CounterState::new(),
            start: FlowPosition::start(),
            path: Vec::new(),
            detached: 0,
            started: None,
            chars: 0,
            content_emitted: false,
            pending_break: BreakValue::Auto,
            page_name: None,
            stop: None,
        }
    }

    /// Build the slice of the flow that starts at `checkpoint`, plus the
    /// floats and footnotes it carries over.
    pub fn build(mut self, checkpoint: &Checkpoint) -> Fragment {
        self.start = checkpoint.position.clone();
        // [GCPM § 2.3](https://www.w3.org/TR/css-gcpm-3/#footnote-counters)
        // The footnote counter lives for the whole document.
        self.counters.reset("footnote", 0);
        let root = self.tree.document_element().and_then(|html| {
            self.path = self.tree.path_to(html);
            let mode = self.classify();
            self.visit_element(html, mode, None)
        });

        let deferred_floats = checkpoint
            .deferred_floats
            .iter()
            .filter_map(|&node| self.build_detached(node))
            .collect();
        let deferred_footnotes = checkpoint
            .deferred_footnotes
            .iter()
            .map(|note| {
                let mut counters = CounterState::new();
                counters.set("footnote", note.number);
                let saved = std::mem::replace(&mut self.counters, counters);
                let body = self.footnote_body(note.body, note.number);
                self.counters = saved;
                (body, note.number, note.body)
            })
            .collect();

        let (end, forced_break, complete) = match self.stop.take() {
            Some((at, forced)) => (at, forced, false),
            None => (FlowPosition::end(), None, true),
        };
        tracing::debug!(
            start = %self.start,
            end = %end,
            boxes = self.arena.len(),
            complete,
            "built box fragment"
        );
        let start_counters = self.started.take().unwrap_or_else(|| self.counters.clone());
        Fragment {
            arena: self.arena,
            root,
            deferred_floats,
            deferred_footnotes,
            end,
            complete,
            forced_break,
            start_counters,
            page_name: self.page_name,
        }
    }

    /// Build the full subtree of `node` regardless of the start position.
    fn build_detached(&mut self, node: NodeId) -> Option<BoxId> {
        self.detached += 1;
        let built = self.visit_element(node, Mode::Fresh, None);
        self.detached -= 1;
        built
    }

    fn classify(&self) -> Mode {
        if self.detached > 0 {
            Mode::Fresh
        } else if self.start.is_past(&self.path) {
            Mode::Skip
        } else if self.start.is_inside(&self.path) {
            Mode::Continue
        } else {
            Mode::Fresh
        }
    }

    fn position_here(&self, node: NodeId) -> FlowPosition {
        if self.detached > 0 {
            FlowPosition::before(self.tree, node)
        } else {
            FlowPosition {
                path: self.path.clone(),
                offset: 0,
                after: false,
            }
        }
    }

    fn mark_started(&mut self) {
        if self.started.is_none() && self.detached == 0 {
            self.started = Some(self.counters.clone());
        }
    }

    fn style_of(&mut self, node: NodeId, pseudo: Option<PseudoElement>) -> Rc<ComputedStyle> {
        self.resolver.resolve_style(self.tree, node, pseudo)
    }

    fn alloc(&mut self, kind: BoxKind, style: Rc<ComputedStyle>, node: Option<NodeId>, start: FlowPosition) -> BoxId {
        let mut layout_box = LayoutBox::new(kind, style, start);
        layout_box.node = node;
        self.arena.alloc(layout_box)
    }

    /// [CSS Lists § 4 Automatic Numbering](https://www.w3.org/TR/css-lists-3/#auto-numbering)
    ///
    /// "Resets first, then increments, then sets." List items increment
    /// `list-item` unless they name it themselves.
    fn apply_counters(&mut self, style: &ComputedStyle) {
        for (name, value) in &style.counter_reset {
            self.counters.reset(name, *value);
        }
        let mut increments_list_item = false;
        for (name, by) in &style.counter_increment {
            increments_list_item |= name == "list-item";
            self.counters.increment(name, *by);
        }
        if style.display.list_item && !increments_list_item {
            self.counters.increment("list-item", 1);
        }
        for (name, value) in &style.counter_set {
            self.counters.set(name, *value);
        }
    }

    fn stop_before(&mut self, forced: Option<BreakValue>) {
        self.stop = Some((
            FlowPosition {
                path: self.path.clone(),
                offset: 0,
                after: false,
            },
            forced,
        ));
    }

    /// Forced breaks, named-page changes, and the size budget all end the
    /// slice at a block boundary.
    fn check_block_boundary(&mut self, style: &ComputedStyle, page: Option<&str>) -> bool {
        let combined = self.pending_break.combine(style.break_before);
        self.pending_break = BreakValue::Auto;
        if !self.content_emitted || self.detached > 0 {
            return false;
        }
        let forces_page = combined.is_page_break()
            || (matches!(combined, BreakValue::Always) && !self.options.multicol);
        if forces_page {
            self.stop_before(Some(combined));
            return true;
        }
        // [CSS Paged Media § 5.2](https://www.w3.org/TR/css-page-3/#using-named-pages)
        // "If the value of the page property changes between two boxes, a
        // forced page break is introduced."
        if page != self.page_name.as_deref() {
            self.stop_before(Some(BreakValue::Page));
            return true;
        }
        if self.chars >= self.options.char_budget {
            self.stop_before(None);
            return true;
        }
        false
    }

    fn visit_element(&mut self, node: NodeId, mode: Mode, page: Option<&str>) -> Option<BoxId> {
        let style = self.style_of(node, None);
        // "The element and its descendants generate no boxes or text runs",
        // and so take no part in counting either.
        if style.display_none {
            return None;
        }
        let page_name = style.page.clone().or_else(|| page.map(str::to_string));
        let in_flow_block = style.display.is_block_level() && !style.is_out_of_flow();
        if mode == Mode::Fresh && in_flow_block && self.check_block_boundary(&style, page_name.as_deref()) {
            return None;
        }
        if mode != Mode::Skip {
            self.mark_started();
        }

        self.apply_counters(&style);

        if matches!(style.float, Float::Footnote) && self.detached == 0 {
            return self.footnote_call(node, mode, &style);
        }

        if mode == Mode::Skip {
            self.counters.push_scope();
            self.generated_counters(node, PseudoElement::Before);
            self.visit_children(node, None, Mode::Skip, page_name.as_deref());
            self.generated_counters(node, PseudoElement::After);
            self.counters.pop_scope();
            self.noteref(node, None, Mode::Skip);
            return None;
        }

        let kind = self.kind_for(node, &style);
        let id = self.alloc(kind, Rc::clone(&style), Some(node), self.position_here(node));
        self.arena[id].continuation = mode == Mode::Continue;
        if self.arena[id].is_block_level() && !self.content_emitted && self.detached == 0 {
            self.page_name.clone_from(&page_name);
        }
        if matches!(self.arena[id].kind, BoxKind::Replaced { .. }) {
            self.content_emitted = true;
            return Some(id);
        }

        self.counters.push_scope();
        if let BoxKind::Region { flow } = &self.arena[id].kind {
            let flow = flow.clone();
            self.fill_region(id, &flow);
        } else {
            if mode == Mode::Fresh {
                self.marker(node, id, &style);
                self.generated(node, id, PseudoElement::Before);
            } else {
                self.generated_counters(node, PseudoElement::Before);
            }
            self.visit_children(node, Some(id), mode, page_name.as_deref());
            if self.stop.is_none() {
                self.generated(node, id, PseudoElement::After);
            }
        }
        self.counters.pop_scope();
        self.noteref(node, Some(id), mode);

        if in_flow_block {
            self.pending_break = self.pending_break.combine(style.break_after);
        }
        self.normalize(id);
        Some(id)
    }

    fn kind_for(&self, node: NodeId, style: &ComputedStyle) -> BoxKind {
        let element = self.tree.as_element(node);
        let tag = element.map_or("", |e| e.tag_name.as_str());
        if REPLACED_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t)) {
            let src = element.and_then(|e| e.attr("src")).map(str::to_string);
            return BoxKind::Replaced {
                intrinsic: Some(self.replaced_size(element, src.as_deref())),
                src,
            };
        }
        if tag.eq_ignore_ascii_case("br") {
            return BoxKind::LineBreak;
        }
        if let Some(flow) = &style.flow_from
            && self.flows.is_region(flow, node)
        {
            return BoxKind::Region { flow: flow.clone() };
        }
        match style.display.inner {
            InnerDisplayType::TableRow => BoxKind::TableRow,
            InnerDisplayType::TableCell => BoxKind::TableCell,
            _ if style.display.is_block_level() => BoxKind::Block,
            _ => BoxKind::Inline,
        }
    }

    /// Intrinsic size from `width`/`height` attributes, completed from the
    /// fetched image's aspect ratio.
    fn replaced_size(&self, element: Option<&ElementData>, src: Option<&str>) -> (f32, f32) {
        let attr = |name: &str| {
            element
                .and_then(|e| e.attr(name))
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
        };
        let fetched = src.and_then(|s| self.resources.image_size(s));
        match (attr("width"), attr("height"), fetched) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some((fw, fh))) if fw > 0.0 => (w, w * fh / fw),
            (None, Some(h), Some((fw, fh))) if fh > 0.0 => (h * fw / fh, h),
            (Some(w), None, _) => (w, DEFAULT_OBJECT_SIZE.1),
            (None, Some(h), _) => (DEFAULT_OBJECT_SIZE.0, h),
            (None, None, Some(size)) => size,
            (None, None, None) => DEFAULT_OBJECT_SIZE,
        }
    }

    fn visit_children(&mut self, node: NodeId, parent: Option<BoxId>, mode: Mode, page: Option<&str>) {
        let tree = self.tree;
        for (index, &child) in tree.children(node).iter().enumerate() {
            if self.stop.is_some() {
                return;
            }
            self.path.push(u32::try_from(index).unwrap_or(u32::MAX));
            let child_mode = match mode {
                Mode::Skip => Mode::Skip,
                Mode::Fresh => Mode::Fresh,
                Mode::Continue => self.classify(),
            };
            match tree.get(child).map(|n| &n.node_type) {
                Some(NodeType::Element(_)) => {
                    let redirected = {
                        let style = self.style_of(child, None);
                        !style.display_none && self.flows.is_redirected(style.flow_into.as_deref())
                    };
                    if !redirected
                        && let Some(child_box) = self.visit_element(child, child_mode, page)
                        && let Some(parent) = parent
                    {
                        self.arena.append_child(parent, child_box);
                    }
                }
                Some(NodeType::Text(text)) => {
                    if let (Some(parent), true) = (parent, child_mode != Mode::Skip) {
                        let offset = if child_mode == Mode::Continue { self.start.offset } else { 0 };
                        self.text(child, text, offset, parent);
                    }
                }
                _ => {}
            }
            let _ = self.path.pop();
        }
    }

    fn text(&mut self, node: NodeId, text: &str, offset: usize, parent: BoxId) {
        self.mark_started();
        let slice: String = text.chars().skip(offset).collect();
        if slice.is_empty() {
            return;
        }
        self.chars += slice.chars().count();
        if slice.chars().any(|c| !c.is_whitespace()) {
            self.content_emitted = true;
        }
        let start = if self.detached > 0 {
            FlowPosition::in_text(self.tree, node, offset)
        } else {
            FlowPosition {
                path: self.path.clone(),
                offset,
                after: false,
            }
        };
        let style = Rc::clone(&self.arena[parent].style);
        let id = self.alloc(
            BoxKind::Text {
                text: slice,
                source: Some(TextSource { node, offset }),
            },
            style,
            Some(node),
            start,
        );
        self.arena[id].continuation = offset > 0;
        self.arena.append_child(parent, id);
    }

    /// Style of a generating pseudo-element, when it has content.
    fn pseudo_style(&mut self, node: NodeId, pseudo: PseudoElement) -> Option<Rc<ComputedStyle>> {
        let style = self.style_of(node, Some(pseudo));
        (!style.display_none).then_some(style)
    }

    fn generated_counters(&mut self, node: NodeId, pseudo: PseudoElement) {
        if let Some(style) = self.pseudo_style(node, pseudo) {
            self.apply_counters(&style);
        }
    }

    /// [CSS Generated Content § 2](https://www.w3.org/TR/css-content-3/#content-property)
    ///
    /// `::before`/`::after` become an inline (or block) box holding the
    /// evaluated `content` text.
    fn generated(&mut self, node: NodeId, parent: BoxId, pseudo: PseudoElement) {
        let Some(style) = self.pseudo_style(node, pseudo) else {
            return;
        };
        self.apply_counters(&style);
        let text = self.content_text(node, &style.content);
        let kind = if style.display.is_block_level() {
            BoxKind::Block
        } else {
            BoxKind::Inline
        };
        let start = self.arena[parent].start.clone();
        let id = self.alloc(kind, Rc::clone(&style), Some(node), start.clone());
        self.arena[id].pseudo = Some(pseudo);
        let text_box = self.alloc(BoxKind::Text { text, source: None }, style, None, start);
        self.arena.append_child(id, text_box);
        self.arena.append_child(parent, id);
    }

    fn content_text(&self, node: NodeId, content: &Content) -> String {
        let ctx = ElementExpr {
            element: self.tree.as_element(node),
            counters: &self.counters,
        };
        content.text(&ctx)
    }

    /// [CSS Lists § 3 Markers](https://www.w3.org/TR/css-lists-3/#markers)
    ///
    /// Markers are laid out at the start of the item's first line.
    fn marker(&mut self, node: NodeId, parent: BoxId, style: &ComputedStyle) {
        if !style.display.list_item {
            return;
        }
        let marker_style = self.style_of(node, Some(PseudoElement::Marker));
        let text = match &marker_style.content {
            Content::Items(_) => self.content_text(node, &marker_style.content),
            Content::None => return,
            Content::Normal => match style.list_style_type {
                CounterStyle::None => return,
                CounterStyle::Disc => "\u{2022} ".to_string(),
                CounterStyle::Circle => "\u{25E6} ".to_string(),
                CounterStyle::Square => "\u{25AA} ".to_string(),
                numbered => format!(
                    "{}. ",
                    format_counter(self.counters.value("list-item").unwrap_or(0), numbered)
                ),
            },
        };
        let start = self.arena[parent].start.clone();
        let id = self.alloc(BoxKind::Inline, Rc::clone(&marker_style), Some(node), start.clone());
        self.arena[id].pseudo = Some(PseudoElement::Marker);
        let text_box = self.alloc(BoxKind::Text { text, source: None }, marker_style, None, start);
        self.arena.append_child(id, text_box);
        self.arena.append_child(parent, id);
    }

    /// [GCPM § 2.1](https://www.w3.org/TR/css-gcpm-3/#creating-footnotes)
    ///
    /// "The element is removed from the flow and displayed as a footnote. A
    /// footnote call is left behind in its place."
    fn footnote_call(&mut self, node: NodeId, mode: Mode, style: &ComputedStyle) -> Option<BoxId> {
        self.counters.increment("footnote", 1);
        let number = self.counters.value("footnote").unwrap_or(1);
        if mode == Mode::Skip {
            self.counters.push_scope();
            self.visit_children(node, None, Mode::Skip, None);
            self.counters.pop_scope();
            return None;
        }
        let body = self.footnote_body(node, number);
        let call_style = self
            .pseudo_style(node, PseudoElement::FootnoteCall)
            .unwrap_or_else(|| Rc::new(ComputedStyle::inherit_from(style)));
        let text = self.content_text(node, &call_style.content);
        let start = self.position_here(node);
        let id = self.alloc(
            BoxKind::FootnoteCall {
                body,
                number,
                body_node: node,
            },
            Rc::clone(&call_style),
            Some(node),
            start.clone(),
        );
        self.arena[id].pseudo = Some(PseudoElement::FootnoteCall);
        if !text.is_empty() {
            let text_box = self.alloc(BoxKind::Text { text, source: None }, call_style, None, start);
            self.arena.append_child(id, text_box);
        }
        self.content_emitted = true;
        Some(id)
    }

    /// [EPUB 3 Structural Semantics](https://www.w3.org/TR/epub-ssv-11/#notes)
    ///
    /// A note reference pointing at a footnote `aside` pulls the aside in as a
    /// footnote right after the reference.
    fn noteref(&mut self, node: NodeId, parent: Option<BoxId>, mode: Mode) {
        let Some(target) = self.noteref_target(node) else {
            return;
        };
        self.counters.increment("footnote", 1);
        let number = self.counters.value("footnote").unwrap_or(1);
        if mode == Mode::Skip {
            self.counters.push_scope();
            self.visit_children(target, None, Mode::Skip, None);
            self.counters.pop_scope();
            return;
        }
        let Some(parent) = parent else {
            return;
        };
        let body = self.footnote_body(target, number);
        let style = Rc::new(ComputedStyle::inherit_from(&self.arena[parent].style));
        let start = self.arena[parent].start.clone();
        let id = self.alloc(
            BoxKind::FootnoteCall {
                body,
                number,
                body_node: target,
            },
            style,
            Some(node),
            start,
        );
        self.arena.append_child(parent, id);
    }

    fn noteref_target(&self, node: NodeId) -> Option<NodeId> {
        let element = self.tree.as_element(node)?;
        let is_noteref = element
            .attr("epub:type")
            .is_some_and(|t| t.split_whitespace().any(|v| v == "noteref"));
        if !is_noteref {
            return None;
        }
        let id = element.attr("href")?.strip_prefix('#')?;
        let target = self.tree.element_by_id(id)?;
        let aside = self.tree.as_element(target)?;
        let is_footnote = aside
            .attr("epub:type")
            .is_some_and(|t| t.split_whitespace().any(|v| v == "footnote"));
        is_footnote.then_some(target)
    }

    /// Detached body box of a footnote, with its `::footnote-marker` leading
    /// the first line.
    fn footnote_body(&mut self, node: NodeId, number: i32) -> BoxId {
        let source = self.style_of(node, None);
        let mut style = (*source).clone();
        style.display = DisplayValue::block();
        style.display_none = false;
        style.float = Float::None;
        let style = Rc::new(style);
        self.detached += 1;
        let body = self.alloc(BoxKind::Block, style, Some(node), FlowPosition::before(self.tree, node));
        self.counters.push_scope();
        self.visit_children(node, Some(body), Mode::Fresh, None);
        self.counters.pop_scope();
        self.normalize(body);
        if let Some(marker_style) = self.pseudo_style(node, PseudoElement::FootnoteMarker) {
            let mut counters = CounterState::new();
            counters.set("footnote", number);
            let ctx = ElementExpr {
                element: self.tree.as_element(node),
                counters: &counters,
            };
            let text = marker_style.content.text(&ctx);
            let start = self.arena[body].start.clone();
            let marker = self.alloc(BoxKind::Inline, Rc::clone(&marker_style), Some(node), start.clone());
            self.arena[marker].pseudo = Some(PseudoElement::FootnoteMarker);
            let text_box = self.alloc(BoxKind::Text { text, source: None }, marker_style, None, start);
            self.arena.append_child(marker, text_box);
            let host = self.first_inline_host(body);
            self.arena[marker].parent = Some(host);
            self.arena[host].children.insert(0, marker);
        }
        self.detached -= 1;
        body
    }

    fn first_inline_host(&self, mut id: BoxId) -> BoxId {
        while let Some(&first) = self.arena[id].children.first() {
            if !self.arena[first].is_block_level() {
                break;
            }
            id = first;
        }
        id
    }

    /// [CSS Regions § 3](https://www.w3.org/TR/css-regions-1/#the-flow-from-property)
    ///
    /// "The region's own content is not rendered; it is replaced by the
    /// content of the named flow."
    fn fill_region(&mut self, region: BoxId, flow: &str) {
        let sources = self.flows.content_of(flow).to_vec();
        for source in sources {
            if let Some(child) = self.build_detached(source) {
                self.arena.append_child(region, child);
            }
        }
        self.content_emitted = true;
    }

    /// Tidy a finished container: row groups become plain blocks, inline boxes
    /// holding blocks become blocks, and mixed children get anonymous block
    /// wrappers.
    fn normalize(&mut self, id: BoxId) {
        let children = self.arena[id].children.clone();
        let has_block = children.iter().any(|&c| self.arena[c].is_block_level() || self.arena[c].is_float());
        match self.arena[id].kind {
            BoxKind::TableRow if children.iter().any(|&c| self.arena[c].kind == BoxKind::TableRow) => {
                self.arena[id].kind = BoxKind::Block;
            }
            BoxKind::TableRow => {
                // Only cells take part in a row.
                let cells: Vec<BoxId> = children
                    .into_iter()
                    .filter(|&c| self.arena[c].kind == BoxKind::TableCell)
                    .collect();
                self.arena[id].children = cells;
                return;
            }
            BoxKind::Inline if has_block => self.arena[id].kind = BoxKind::Block,
            _ => {}
        }
        if !has_block || !self.arena[id].is_block_level() {
            return;
        }

        let mut wrapped = Vec::with_capacity(children.len());
        let mut run: Vec<BoxId> = Vec::new();
        for child in children {
            if self.arena[child].is_block_level() || self.arena[child].is_float() {
                self.flush_run(id, &mut run, &mut wrapped);
                wrapped.push(child);
            } else {
                run.push(child);
            }
        }
        self.flush_run(id, &mut run, &mut wrapped);
        self.arena[id].children = wrapped;
    }

    /// [§ 9.2.1.1 Anonymous block boxes](https://www.w3.org/TR/CSS2/visuren.html#anonymous-block-level)
    ///
    /// Runs of collapsible white space between blocks generate nothing.
    fn flush_run(&mut self, parent: BoxId, run: &mut Vec<BoxId>, out: &mut Vec<BoxId>) {
        if run.is_empty() {
            return;
        }
        let parent_style = Rc::clone(&self.arena[parent].style);
        let blank = !parent_style.white_space.preserves_spaces()
            && run.iter().all(|&c| match &self.arena[c].kind {
                BoxKind::Text { text, .. } => text.chars().all(char::is_whitespace),
                _ => false,
            });
        if blank {
            run.clear();
            return;
        }
        let mut style = ComputedStyle::inherit_from(&parent_style);
        style.display = DisplayValue::block();
        let start = self.arena[run[0]].start.clone();
        let anonymous = self.alloc(BoxKind::AnonymousBlock, Rc::new(style), None, start);
        self.arena[anonymous].continuation = run.iter().all(|&c| self.arena[c].continuation);
        for child in run.drain(..) {
            self.arena[child].parent = Some(anonymous);
            self.arena[anonymous].children.push(child);
        }
        self.arena[anonymous].parent = Some(parent);
        out.push(anonymous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{DeferredFootnote, NoResources};
    use folio_common::MessageQueue;

    fn doc(paragraphs: usize) -> (DomTree, Vec<NodeId>) {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let ps = (0..paragraphs)
            .map(|i| {
                let p = tree.append_element(body, ElementData::new("p"));
                let _ = tree.append_text(p, format!("paragraph {i}"));
                p
            })
            .collect();
        (tree, ps)
    }

    fn build(tree: &DomTree, css: &str, checkpoint: &Checkpoint) -> Fragment {
        let mut resolver = StyleResolver::new(MessageQueue::new());
        let _ = resolver.add_stylesheet(css, crate::cascade::Origin::Author);
        let flows = FlowMap::build(tree, &mut resolver);
        BoxBuilder::new(tree, &mut resolver, &flows, &NoResources, BuildOptions::default())
            .build(checkpoint)
    }

    fn body_box(fragment: &Fragment) -> BoxId {
        let root = fragment.root.expect("root box");
        fragment.arena[root].children[0]
    }

    #[test]
    fn test_builds_whole_document() {
        let (tree, _) = doc(3);
        let fragment = build(&tree, "", &Checkpoint::start());
        assert!(fragment.complete);
        let body = body_box(&fragment);
        assert_eq!(fragment.arena[body].children.len(), 3);
        assert!(!fragment.arena[body].continuation);
    }

    #[test]
    fn test_resume_marks_continuations_and_skips_earlier_content() {
        let (tree, ps) = doc(3);
        let text = tree.children(ps[1])[0];
        let checkpoint = Checkpoint {
            position: FlowPosition::in_text(&tree, text, 4),
            ..Checkpoint::default()
        };
        let fragment = build(&tree, "", &checkpoint);
        let body = body_box(&fragment);
        assert!(fragment.arena[body].continuation);
        let kids = &fragment.arena[body].children;
        assert_eq!(kids.len(), 2);
        assert!(fragment.arena[kids[0]].continuation);
        assert_eq!(fragment.arena.text_of(kids[0]), "graph 1");
    }

    #[test]
    fn test_table_row_keeps_only_cells() {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let row = tree.append_element(body, ElementData::new("tr"));
        for text in ["a", "b"] {
            let cell = tree.append_element(row, ElementData::new("td"));
            let _ = tree.append_text(cell, text);
            let _ = tree.append_text(row, "stray");
        }
        let css = "tr { display: table-row } td { display: table-cell }";
        let fragment = build(&tree, css, &Checkpoint::start());
        let row = body_box(&fragment);
        assert_eq!(fragment.arena[row].kind, BoxKind::TableRow);
        let kids = &fragment.arena[row].children;
        assert_eq!(kids.len(), 2);
        assert!(kids.iter().all(|&c| fragment.arena[c].kind == BoxKind::TableCell));
    }

    #[test]
    fn test_forced_break_ends_fragment() {
        let (tree, ps) = doc(3);
        let fragment = build(&tree, "p + p { break-before: page }", &Checkpoint::start());
        assert!(!fragment.complete);
        assert_eq!(fragment.forced_break, Some(BreakValue::Page));
        assert_eq!(fragment.end, FlowPosition::before(&tree, ps[1]));
    }

    #[test]
    fn test_counters_replayed_for_skipped_items() {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let ol = tree.append_element(body, ElementData::new("ol"));
        let items: Vec<NodeId> = (0..3)
            .map(|i| {
                let li = tree.append_element(ol, ElementData::new("li"));
                let _ = tree.append_text(li, format!("item {i}"));
                li
            })
            .collect();
        let checkpoint = Checkpoint {
            position: FlowPosition::before(&tree, items[2]),
            ..Checkpoint::default()
        };
        let fragment = build(&tree, "", &checkpoint);
        let body_id = body_box(&fragment);
        let ol_box = fragment.arena[body_id].children[0];
        let li_box = fragment.arena[ol_box].children[0];
        assert_eq!(fragment.arena.text_of(li_box), "3. item 2");
    }

    #[test]
    fn test_footnote_leaves_call_and_detached_body() {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let p = tree.append_element(body, ElementData::new("p"));
        let _ = tree.append_text(p, "text");
        let note = tree.append_element(p, ElementData::new("span").with_attr("class", "fn"));
        let _ = tree.append_text(note, "the note");
        let fragment = build(&tree, ".fn { float: footnote }", &Checkpoint::start());
        let body_id = body_box(&fragment);
        let p_box = fragment.arena[body_id].children[0];
        let call = fragment.arena[p_box].children[1];
        let BoxKind::FootnoteCall { body: note_body, number, .. } = fragment.arena[call].kind else {
            panic!("expected a footnote call");
        };
        assert_eq!(number, 1);
        assert_eq!(fragment.arena.text_of(call), "1");
        assert_eq!(fragment.arena.text_of(note_body), "1. the note");
        assert_eq!(fragment.arena[note_body].parent, None);
    }

    #[test]
    fn test_deferred_footnote_rebuilt_with_its_number() {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let note = tree.append_element(body, ElementData::new("aside").with_attr("class", "fn"));
        let _ = tree.append_text(note, "late");
        let checkpoint = Checkpoint {
            position: FlowPosition::end(),
            deferred_footnotes: vec![DeferredFootnote { body: note, number: 7 }],
            ..Checkpoint::default()
        };
        let fragment = build(&tree, ".fn { float: footnote }", &checkpoint);
        let (body_id, number, _) = fragment.deferred_footnotes[0];
        assert_eq!(number, 7);
        assert_eq!(fragment.arena.text_of(body_id), "7. late");
    }

    #[test]
    fn test_mixed_content_gets_anonymous_blocks() {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let div = tree.append_element(body, ElementData::new("div"));
        let _ = tree.append_text(div, "loose text");
        let p = tree.append_element(div, ElementData::new("p"));
        let _ = tree.append_text(p, "para");
        let _ = tree.append_text(div, "\n  ");
        let fragment = build(&tree, "", &Checkpoint::start());
        let body_id = body_box(&fragment);
        let div_box = fragment.arena[body_id].children[0];
        let kids = &fragment.arena[div_box].children;
        assert_eq!(kids.len(), 2);
        assert_eq!(fragment.arena[kids[0]].kind, BoxKind::AnonymousBlock);
    }
}
