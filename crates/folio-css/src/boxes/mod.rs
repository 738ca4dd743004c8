//! Box tree for one page-layout pass.
//!
//! [CSS Display § 2 Box Layout Modes](https://www.w3.org/TR/css-display-3/#the-display-properties)
//!
//! Boxes live in a [`BoxArena`] and refer to each other by [`BoxId`]. The
//! arena is built from a [`FlowPosition`] for the content that can land on
//! one page and dropped when the page is committed, so no box outlives the
//! pass that created it.

mod builder;
mod flows;
mod position;

use std::ops::{Index, IndexMut};
use std::rc::Rc;

use folio_dom::NodeId;

pub use builder::{BoxBuilder, BuildOptions, Fragment};
pub use flows::FlowMap;
pub use position::{Checkpoint, DeferredFootnote, FlowPosition};

use crate::selector::PseudoElement;
use crate::style::{ComputedStyle, Float};

/// Index of a box in its [`BoxArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxId(pub u32);

/// Where the characters of a text box come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSource {
    /// The DOM text node.
    pub node: NodeId,
    /// Character offset of the box's first character in that node.
    pub offset: usize,
}

/// What a box is.
#[derive(Debug, Clone, PartialEq)]
pub enum BoxKind {
    /// Block container, in flow or floated.
    Block,
    /// [§ 9.2.1.1 Anonymous block boxes](https://www.w3.org/TR/CSS2/visuren.html#anonymous-block-level)
    ///
    /// "If a block container box has a block-level box inside it, then we
    /// force it to have only block-level boxes inside it."
    AnonymousBlock,
    /// Inline box.
    Inline,
    /// A run of text, from the document or generated content.
    Text {
        /// Characters, before white-space processing.
        text: String,
        /// `None` for generated content.
        source: Option<TextSource>,
    },
    /// Replaced element: an image or another atomic object.
    Replaced {
        /// Intrinsic `(width, height)` when known.
        intrinsic: Option<(f32, f32)>,
        /// `src` attribute, if any.
        src: Option<String>,
    },
    /// A table row; its cells sit side by side and it never fragments.
    TableRow,
    /// A table cell.
    TableCell,
    /// [GCPM § 2.4 Footnote calls](https://www.w3.org/TR/css-gcpm-3/#footnote-call)
    ///
    /// Left in the line where a footnote was taken out of the flow.
    FootnoteCall {
        /// Root of the footnote body, detached from the flow tree.
        body: BoxId,
        /// Value of the `footnote` counter for this note.
        number: i32,
        /// Source element of the body.
        body_node: NodeId,
    },
    /// `<br>`: a forced line break.
    LineBreak,
    /// [CSS Regions § 2](https://www.w3.org/TR/css-regions-1/#the-flow-from-property)
    ///
    /// An element that receives a named flow's content.
    Region {
        /// Flow name.
        flow: String,
    },
}

/// One box.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    /// Kind and kind-specific payload.
    pub kind: BoxKind,
    /// Computed style.
    pub style: Rc<ComputedStyle>,
    /// Generating element or text node.
    pub node: Option<NodeId>,
    /// Set for generated boxes.
    pub pseudo: Option<PseudoElement>,
    /// Parent in the flow tree; `None` for the root and detached bodies.
    pub parent: Option<BoxId>,
    /// Children in order.
    pub children: Vec<BoxId>,
    /// The box started on an earlier page: its block-start edge, `::before`
    /// and marker were already laid out.
    pub continuation: bool,
    /// Position immediately before the box's content.
    pub start: FlowPosition,
}

impl LayoutBox {
    /// Box with no children.
    #[must_use]
    pub const fn new(kind: BoxKind, style: Rc<ComputedStyle>, start: FlowPosition) -> Self {
        Self {
            kind,
            style,
            node: None,
            pseudo: None,
            parent: None,
            children: Vec::new(),
            continuation: false,
            start,
        }
    }

    /// Participates in a block formatting context as a block-level box.
    #[must_use]
    pub fn is_block_level(&self) -> bool {
        match self.kind {
            BoxKind::Block
            | BoxKind::AnonymousBlock
            | BoxKind::TableRow
            | BoxKind::TableCell
            | BoxKind::Region { .. } => true,
            BoxKind::Replaced { .. } => self.style.display.is_block_level(),
            BoxKind::Inline
            | BoxKind::Text { .. }
            | BoxKind::FootnoteCall { .. }
            | BoxKind::LineBreak => false,
        }
    }

    /// Taken out of the flow as a left/right float.
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self.style.float, Float::Left | Float::Right)
    }
}

/// Arena of boxes for one page pass.
#[derive(Debug, Clone, Default)]
pub struct BoxArena {
    boxes: Vec<LayoutBox>,
}

impl BoxArena {
    /// Empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self { boxes: Vec::new() }
    }

    /// Store a box and return its id.
    pub fn alloc(&mut self, layout_box: LayoutBox) -> BoxId {
        let id = BoxId(u32::try_from(self.boxes.len()).unwrap_or(u32::MAX));
        self.boxes.push(layout_box);
        id
    }

    /// Attach `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: BoxId, child: BoxId) {
        self[child].parent = Some(parent);
        self[parent].children.push(child);
    }

    /// Look up a box.
    #[must_use]
    pub fn get(&self, id: BoxId) -> Option<&LayoutBox> {
        self.boxes.get(id.0 as usize)
    }

    /// Number of boxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// No boxes yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Drop every box, keeping the allocation.
    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    /// Concatenated text of a subtree, generated content included.
    #[must_use]
    pub fn text_of(&self, id: BoxId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: BoxId, out: &mut String) {
        let Some(b) = self.get(id) else {
            return;
        };
        if let BoxKind::Text { text, .. } = &b.kind {
            out.push_str(text);
        }
        for child in &b.children {
            self.collect_text(*child, out);
        }
    }
}

impl Index<BoxId> for BoxArena {
    type Output = LayoutBox;

    fn index(&self, id: BoxId) -> &LayoutBox {
        &self.boxes[id.0 as usize]
    }
}

impl IndexMut<BoxId> for BoxArena {
    fn index_mut(&mut self, id: BoxId) -> &mut LayoutBox {
        &mut self.boxes[id.0 as usize]
    }
}

/// Sizes of fetched resources, consulted for replaced elements.
pub trait ResourceSizes {
    /// Intrinsic `(width, height)` of the image at `src`, once it is loaded.
    fn image_size(&self, src: &str) -> Option<(f32, f32)>;
}

/// No resources are known; images fall back to their attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceSizes for NoResources {
    fn image_size(&self, _src: &str) -> Option<(f32, f32)> {
        None
    }
}
