//! Committed pages of one document.
//!
//! Pages are produced strictly in order: page N+1 starts from the
//! checkpoint page N ended with. Producing a page and committing it are
//! separate steps so the caller can check that the work is still wanted
//! before it becomes visible.

use folio_css::{Checkpoint, FlowPosition, IntervalMap, PageContent};

use crate::epage::TextIndex;

/// Pages laid out so far, the checkpoint the next one starts from, and a
/// map from character offsets to pages.
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    pages: Vec<PageContent>,
    next: Checkpoint,
    /// Document-local character offset of each content page's start.
    offsets: IntervalMap<usize, usize>,
    complete: bool,
}

impl Paginator {
    /// Nothing laid out yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// No page has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The whole document has been paginated.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Committed page `index`.
    #[must_use]
    pub fn page(&self, index: usize) -> Option<&PageContent> {
        self.pages.get(index)
    }

    /// All committed pages.
    #[must_use]
    pub fn pages(&self) -> &[PageContent] {
        &self.pages
    }

    /// Where the next page starts.
    #[must_use]
    pub const fn next_checkpoint(&self) -> &Checkpoint {
        &self.next
    }

    /// Append a page laid out from [`Self::next_checkpoint`].
    ///
    /// Blank pages are not entered in the offset map, so an offset always
    /// finds the page showing its content.
    pub fn commit(&mut self, page: PageContent, next: Checkpoint, text: &TextIndex) {
        debug_assert_eq!(page.index, self.pages.len());
        if !page.blank {
            self.offsets.insert(text.offset_of(&page.start), page.index);
        }
        tracing::debug!(index = page.index, start = %page.start, end = %page.end, "committed page");
        self.complete = next.is_exhausted();
        self.next = next;
        self.pages.push(page);
    }

    /// Character offset up to which pages are known: content before it is
    /// on a committed page.
    #[must_use]
    pub fn frontier(&self, text: &TextIndex) -> usize {
        if self.complete {
            text.total()
        } else {
            text.offset_of(&self.next.position)
        }
    }

    /// Page holding character `offset`, if it has been laid out.
    #[must_use]
    pub fn page_for_offset(&self, offset: usize, text: &TextIndex) -> Option<usize> {
        if offset >= self.frontier(text) && !self.complete {
            return None;
        }
        self.offsets
            .floor(&offset)
            .map(|(_, &page)| page)
            .or_else(|| self.pages.iter().position(|p| !p.blank))
    }

    /// Page holding `position`, if it has been laid out.
    #[must_use]
    pub fn page_for_position(&self, position: &FlowPosition) -> Option<usize> {
        if !self.complete && *position >= self.next.position {
            return None;
        }
        // Page starts only grow, so the last page starting at or before the
        // position is found by bisection. Blank pages hold no content.
        let after = self.pages.partition_point(|p| p.start <= *position);
        self.pages[..after]
            .iter()
            .rposition(|p| !p.blank)
            .or_else(|| self.pages.iter().position(|p| !p.blank))
    }

    /// Forget every page, e.g. after the page size changed.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.offsets.clear();
        self.next = Checkpoint::start();
        self.complete = false;
    }
}

#[cfg(test)]
mod tests {
    use folio_css::page::PageSide;
    use folio_css::{ApproximateFontMetrics, FlowMap, PageLayout, PageStyle, StyleResolver};
    use folio_common::MessageQueue;
    use folio_dom::parse_xhtml;

    use super::*;
    use crate::resources::ImageSizes;

    fn paginate(body: &str) -> (folio_dom::DomTree, TextIndex, Paginator) {
        let tree = parse_xhtml(&format!("<html><body>{body}</body></html>")).unwrap();
        let mut resolver = StyleResolver::new(MessageQueue::new());
        let _ = resolver.add_stylesheet(
            "body { margin: 0; font-size: 10px; line-height: 20px } p { margin: 0 }",
            folio_css::Origin::Author,
        );
        let flows = FlowMap::build(&tree, &mut resolver);
        let text = TextIndex::build(&tree);
        let images = ImageSizes::new();
        let mut paginator = Paginator::new();
        let mut layout = PageLayout::new(
            &tree,
            &mut resolver,
            &flows,
            &images,
            &ApproximateFontMetrics,
            PageStyle::new(400.0, 60.0, [0.0; 4]),
        );
        while !paginator.is_complete() && paginator.len() < 50 {
            let (page, next) = layout.layout_page(paginator.len(), paginator.next_checkpoint()).unwrap();
            paginator.commit(page, next, &text);
        }
        (tree, text, paginator)
    }

    #[test]
    fn test_offsets_map_to_pages() {
        let body: String = (0..6).map(|i| format!("<p>line {i}</p>")).collect();
        let (_, text, paginator) = paginate(&body);
        assert_eq!(paginator.len(), 2);
        assert_eq!(paginator.page(0).map(|p| p.side), Some(PageSide::Right));
        assert_eq!(paginator.page_for_offset(0, &text), Some(0));
        // Each paragraph holds six characters; three fit on a page.
        assert_eq!(paginator.page_for_offset(17, &text), Some(0));
        assert_eq!(paginator.page_for_offset(18, &text), Some(1));
        assert_eq!(paginator.page_for_offset(text.total(), &text), Some(1));
    }

    #[test]
    fn test_positions_map_to_pages() {
        let body: String = (0..6).map(|i| format!("<p id=\"p{i}\">line {i}</p>")).collect();
        let (tree, _, paginator) = paginate(&body);
        let p4 = tree.element_by_id("p4").unwrap();
        assert_eq!(paginator.page_for_position(&FlowPosition::before(&tree, p4)), Some(1));
        assert_eq!(paginator.page_for_position(&FlowPosition::start()), Some(0));
    }

    #[test]
    fn test_positions_skip_blank_pages() {
        let body = r#"<p id="a">alpha</p><p id="b" style="break-before: right">beta</p><p id="c">gamma</p>"#;
        let (tree, _, paginator) = paginate(body);
        let blanks: Vec<bool> = paginator.pages().iter().map(|p| p.blank).collect();
        assert_eq!(blanks, vec![false, true, false]);

        let at = |id: &str| FlowPosition::before(&tree, tree.element_by_id(id).unwrap());
        assert_eq!(paginator.page_for_position(&at("a")), Some(0));
        assert_eq!(paginator.page_for_position(&at("c")), Some(2));
        // The blank page starts where the next content page does.
        let blank_start = paginator.page(1).unwrap().start.clone();
        assert_eq!(paginator.page_for_position(&blank_start), Some(2));
    }

    #[test]
    fn test_clear_forgets_pages() {
        let (_, text, mut paginator) = paginate("<p>one</p>");
        assert!(paginator.is_complete());
        paginator.clear();
        assert!(paginator.is_empty());
        assert!(!paginator.is_complete());
        assert_eq!(paginator.page_for_offset(0, &text), None);
        assert_eq!(paginator.next_checkpoint(), &Checkpoint::start());
    }
}
