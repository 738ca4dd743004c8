//! Cursors into the document's logical content order.
//!
//! A [`FlowPosition`] names a point between two pieces of content: before a
//! node, after it, or inside a text node at a character offset. Positions are
//! stored as child-index paths so they survive the per-page box arena and can
//! be turned into CFIs without touching layout state.

use std::cmp::Ordering;
use std::fmt;

use folio_dom::{DomTree, NodeId};
use serde::Serialize;

use crate::page::PageSide;

/// A point in document order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FlowPosition {
    /// Child-index path from the document node.
    pub path: Vec<u32>,
    /// Character offset inside a text node; zero for elements.
    pub offset: usize,
    /// The position lies after the node's whole subtree.
    pub after: bool,
}

impl FlowPosition {
    /// Before any content.
    #[must_use]
    pub const fn start() -> Self {
        Self {
            path: Vec::new(),
            offset: 0,
            after: false,
        }
    }

    /// After all content.
    #[must_use]
    pub const fn end() -> Self {
        Self {
            path: Vec::new(),
            offset: 0,
            after: true,
        }
    }

    /// Immediately before `node`.
    #[must_use]
    pub fn before(tree: &DomTree, node: NodeId) -> Self {
        Self {
            path: tree.path_to(node),
            offset: 0,
            after: false,
        }
    }

    /// Immediately after `node` and its descendants.
    #[must_use]
    pub fn after(tree: &DomTree, node: NodeId) -> Self {
        Self {
            path: tree.path_to(node),
            offset: 0,
            after: true,
        }
    }

    /// Inside text node `node`, before character `offset`.
    #[must_use]
    pub fn in_text(tree: &DomTree, node: NodeId, offset: usize) -> Self {
        Self {
            path: tree.path_to(node),
            offset,
            after: false,
        }
    }

    /// The node the position is anchored on, if it still exists.
    #[must_use]
    pub fn node(&self, tree: &DomTree) -> Option<NodeId> {
        tree.node_at_path(&self.path)
    }

    /// The position lies strictly inside the subtree at `path` (the node's
    /// start has already been passed, its end has not).
    #[must_use]
    pub fn is_inside(&self, path: &[u32]) -> bool {
        if self.path.len() > path.len() {
            self.path.starts_with(path)
        } else {
            self.path == path && self.offset > 0 && !self.after
        }
    }

    /// Everything in the subtree at `path` comes before this position.
    #[must_use]
    pub fn is_past(&self, path: &[u32]) -> bool {
        let node_end = Self {
            path: path.to_vec(),
            offset: 0,
            after: true,
        };
        node_end <= *self
    }
}

impl Ord for FlowPosition {
    /// Document order. A node's "before" position precedes everything in its
    /// subtree and its "after" position follows it.
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.path.iter().zip(&other.path) {
            match a.cmp(b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        match self.path.len().cmp(&other.path.len()) {
            // `self` is an ancestor of `other`.
            Ordering::Less => {
                if self.after {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            Ordering::Greater => {
                if other.after {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            Ordering::Equal => self
                .after
                .cmp(&other.after)
                .then(self.offset.cmp(&other.offset)),
        }
    }
}

impl PartialOrd for FlowPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FlowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.path {
            write!(f, "/{step}")?;
        }
        if self.offset > 0 {
            write!(f, ":{}", self.offset)?;
        }
        if self.after {
            f.write_str("+")?;
        }
        Ok(())
    }
}

/// A footnote whose body did not fit on the page of its call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredFootnote {
    /// Element holding the footnote body.
    pub body: NodeId,
    /// Value of the `footnote` counter at the call.
    pub number: i32,
}

/// Everything needed to start laying out the next page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Checkpoint {
    /// Where the main flow resumes.
    pub position: FlowPosition,
    /// Floats whose source precedes `position` but that did not fit.
    pub deferred_floats: Vec<NodeId>,
    /// Footnotes pushed to the next page's footnote area.
    pub deferred_footnotes: Vec<DeferredFootnote>,
    /// A `left`/`right` break requires the next content page to be on this side.
    pub required_side: Option<PageSide>,
    /// The previous page ended on a forced break, so margins at the top of the
    /// next one are kept.
    pub after_forced_break: bool,
}

impl Checkpoint {
    /// Start of the document.
    #[must_use]
    pub fn start() -> Self {
        Self::default()
    }

    /// Nothing left to lay out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.position == FlowPosition::end()
            && self.deferred_floats.is_empty()
            && self.deferred_footnotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(path: &[u32], offset: usize, after: bool) -> FlowPosition {
        FlowPosition {
            path: path.to_vec(),
            offset,
            after,
        }
    }

    #[test]
    fn test_ancestor_brackets_its_subtree() {
        let before = pos(&[0, 1], 0, false);
        let inner = pos(&[0, 1, 4], 7, false);
        let after = pos(&[0, 1], 0, true);
        assert!(before < inner);
        assert!(inner < after);
        assert!(after < pos(&[0, 2], 0, false));
    }

    #[test]
    fn test_text_offsets_order() {
        assert!(pos(&[0, 3], 2, false) < pos(&[0, 3], 10, false));
        assert!(pos(&[0, 3], 10, false) < pos(&[0, 3], 0, true));
    }

    #[test]
    fn test_document_bounds() {
        let middle = pos(&[1, 0, 2], 5, false);
        assert!(FlowPosition::start() < middle);
        assert!(middle < FlowPosition::end());
    }

    #[test]
    fn test_inside_and_past() {
        let p = pos(&[0, 1, 2], 3, false);
        assert!(p.is_inside(&[0, 1]));
        assert!(p.is_inside(&[0, 1, 2]));
        assert!(!p.is_inside(&[0, 2]));
        assert!(p.is_past(&[0, 0]));
        assert!(!p.is_past(&[0, 1]));
        assert!(pos(&[0, 1], 0, true).is_past(&[0, 1, 5]));
    }
}
