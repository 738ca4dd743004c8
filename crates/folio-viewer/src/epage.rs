//! Character offsets and EPages.
//!
//! An EPage is a position across the whole spine measured in characters of
//! text content, [`EPAGE_CHARS`] characters per EPage. Unlike page numbers it
//! does not change when the viewport or the font size does, so hosts use it
//! for progress bars and for restoring a position after relayout.

use folio_css::FlowPosition;
use folio_dom::{DomTree, NodeId, NodeType};

/// Characters of text content per EPage.
pub const EPAGE_CHARS: usize = 1024;

/// EPage of a spine-wide character offset. Fractional values lie inside an
/// EPage.
#[must_use]
pub fn epage_of(offset: usize) -> f64 {
    offset as f64 / EPAGE_CHARS as f64
}

/// Spine-wide character offset of an EPage, clamped at zero.
#[must_use]
pub fn offset_of_epage(epage: f64) -> usize {
    if epage.is_finite() && epage > 0.0 {
        (epage * EPAGE_CHARS as f64).floor() as usize
    } else {
        0
    }
}

/// One text node and where its characters start.
#[derive(Debug, Clone)]
struct TextRun {
    node: NodeId,
    /// Position just past the node.
    end: FlowPosition,
    path: Vec<u32>,
    start: usize,
    len: usize,
}

/// Text nodes of a document in order, with running character offsets.
///
/// Converts between [`FlowPosition`]s and character offsets in both
/// directions with a binary search.
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    runs: Vec<TextRun>,
    total: usize,
}

impl TextIndex {
    /// Index the text of `tree`.
    #[must_use]
    pub fn build(tree: &DomTree) -> Self {
        let mut runs = Vec::new();
        let mut total = 0;
        for node in tree.descendants(tree.root()) {
            let Some(NodeType::Text(text)) = tree.get(node).map(|n| &n.node_type) else {
                continue;
            };
            let len = text.chars().count();
            if len == 0 {
                continue;
            }
            runs.push(TextRun {
                node,
                end: FlowPosition::after(tree, node),
                path: tree.path_to(node),
                start: total,
                len,
            });
            total += len;
        }
        Self { runs, total }
    }

    /// Characters of text in the document.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Characters of text before `position`.
    #[must_use]
    pub fn offset_of(&self, position: &FlowPosition) -> usize {
        // Runs wholly before the position.
        let passed = self.runs.partition_point(|run| run.end <= *position);
        match self.runs.get(passed) {
            Some(run) if run.path == position.path && !position.after => {
                run.start + position.offset.min(run.len)
            }
            Some(run) => run.start,
            None => self.total,
        }
    }

    /// The text position holding character `offset`, or the end of the last
    /// text node when `offset` is past the end.
    #[must_use]
    pub fn position_at(&self, tree: &DomTree, offset: usize) -> FlowPosition {
        let index = self.runs.partition_point(|run| run.start + run.len <= offset);
        match self.runs.get(index).or_else(|| self.runs.last()) {
            Some(run) => {
                let within = offset.saturating_sub(run.start).min(run.len);
                FlowPosition::in_text(tree, run.node, within)
            }
            None => FlowPosition::start(),
        }
    }
}

#[cfg(test)]
mod tests {
    use folio_dom::parse_xhtml;

    use super::*;

    fn tree() -> DomTree {
        parse_xhtml("<html><body><p>Hello</p><p>big <b>bold</b> world</p></body></html>").unwrap()
    }

    #[test]
    fn test_offsets_count_characters_in_order() {
        let tree = tree();
        let index = TextIndex::build(&tree);
        assert_eq!(index.total(), 5 + 4 + 4 + 6);

        let bold = tree.descendants(tree.root()).find(|&n| tree.as_text(n) == Some("bold")).unwrap();
        assert_eq!(index.offset_of(&FlowPosition::in_text(&tree, bold, 2)), 11);
        assert_eq!(index.offset_of(&FlowPosition::after(&tree, bold)), 13);
        assert_eq!(index.offset_of(&FlowPosition::start()), 0);
        assert_eq!(index.offset_of(&FlowPosition::end()), index.total());
    }

    #[test]
    fn test_position_at_inverts_offset_of() {
        let tree = tree();
        let index = TextIndex::build(&tree);
        for offset in [0, 4, 5, 9, 12, 18] {
            let position = index.position_at(&tree, offset);
            assert_eq!(index.offset_of(&position), offset, "{position}");
        }
    }

    #[test]
    fn test_epage_conversions() {
        assert!((epage_of(1536) - 1.5).abs() < f64::EPSILON);
        assert_eq!(offset_of_epage(1.5), 1536);
        assert_eq!(offset_of_epage(-3.0), 0);
        assert_eq!(offset_of_epage(f64::NAN), 0);
    }
}
