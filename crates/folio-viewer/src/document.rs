//! One loaded content document.
//!
//! Loading fetches and parses the XHTML, then builds the style context:
//! the UA sheet, the User sheets made from the viewer options, and the
//! author sheets in document order with their `@import`s. The style
//! context lives as long as the document; relayout after a resize keeps it
//! and only tells it about the new media.

use folio_common::{MessageQueue, resolve_url};
use folio_css::{
    Checkpoint, FlowMap, FontMetrics, LayoutError, Origin, PageContent, PageLayout, StyleResolver,
    Stylesheet, StylesheetSource, collect_stylesheet_sources, parse_stylesheet,
};
use folio_dom::{DomTree, parse_xhtml};

use crate::config::ViewerOptions;
use crate::epage::TextIndex;
use crate::error::ViewerError;
use crate::paginator::Paginator;
use crate::resources::{Fetcher, ImageSizes, image_sources};

/// How deep `@import` chains are followed.
const MAX_IMPORT_DEPTH: u32 = 8;

/// A content document with its style context and pages.
#[derive(Debug)]
pub struct Document {
    /// URL the document was loaded from.
    pub url: String,
    /// Parsed document.
    pub tree: DomTree,
    /// Style context shared by all pages of the document.
    pub resolver: StyleResolver,
    /// Named flows.
    pub flows: FlowMap,
    /// Intrinsic sizes of the document's images.
    pub images: ImageSizes,
    /// Character offsets of the document's text.
    pub text: TextIndex,
    /// Spine-wide character offset of the document's first character.
    pub char_start: usize,
    /// Pages progress right to left.
    pub rtl: bool,
    /// Pages laid out so far.
    pub paginator: Paginator,
}

impl Document {
    /// Fetch and parse the document at `url` and build its style context.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::Fetch`] when the document cannot be loaded and
    /// [`ViewerError::Parse`] when it is not well-formed. Stylesheets that
    /// fail to load are reported as warnings only.
    pub fn load(
        url: &str,
        fetcher: &dyn Fetcher,
        options: &ViewerOptions,
        messages: &MessageQueue,
    ) -> Result<Self, ViewerError> {
        let source = fetcher.fetch_text(url)?;
        let tree = parse_xhtml(&source).map_err(|source| ViewerError::Parse {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::from_tree(url, tree, fetcher, options, messages))
    }

    /// A document from an already parsed tree.
    pub fn from_tree(
        url: &str,
        tree: DomTree,
        fetcher: &dyn Fetcher,
        options: &ViewerOptions,
        messages: &MessageQueue,
    ) -> Self {
        let mut resolver = build_resolver(url, &tree, fetcher, options, messages);
        let flows = FlowMap::build(&tree, &mut resolver);
        let rtl = PageLayout::principal_rtl(&tree, &mut resolver);
        let text = TextIndex::build(&tree);
        tracing::info!(url, rules = resolver.rule_count(), chars = text.total(), "document loaded");
        Self {
            url: url.to_string(),
            tree,
            resolver,
            flows,
            images: ImageSizes::new(),
            text,
            char_start: 0,
            rtl,
            paginator: Paginator::new(),
        }
    }

    /// Rebuild the style context for new options and forget all pages.
    pub fn restyle(&mut self, fetcher: &dyn Fetcher, options: &ViewerOptions) {
        let messages = self.resolver.messages().clone();
        self.resolver = build_resolver(&self.url, &self.tree, fetcher, options, &messages);
        self.flows = FlowMap::build(&self.tree, &mut self.resolver);
        self.rtl = PageLayout::principal_rtl(&self.tree, &mut self.resolver);
        self.paginator.clear();
    }

    /// Images of the document not yet loaded, as `(src, resolved url)`.
    #[must_use]
    pub fn pending_images(&self) -> Vec<(String, String)> {
        image_sources(&self.tree)
            .into_iter()
            .filter(|src| !self.images.is_settled(src))
            .map(|src| {
                let url = resolve_url(&src, Some(&self.url));
                (src, url)
            })
            .collect()
    }

    /// Lay out the page after the last committed one, without committing
    /// it. `None` once the document is fully paginated.
    ///
    /// # Errors
    ///
    /// Returns the [`LayoutError`] of a page pass that made no progress.
    pub fn layout_next(
        &mut self,
        base: folio_css::PageStyle,
        metrics: &dyn FontMetrics,
    ) -> Result<Option<(PageContent, Checkpoint)>, LayoutError> {
        if self.paginator.is_complete() {
            return Ok(None);
        }
        let index = self.paginator.len();
        let mut layout = PageLayout::new(&self.tree, &mut self.resolver, &self.flows, &self.images, metrics, base)
            .with_rtl_progression(self.rtl);
        layout.layout_page(index, self.paginator.next_checkpoint()).map(Some)
    }

    /// Commit a page produced by [`Self::layout_next`].
    pub fn commit(&mut self, page: PageContent, next: Checkpoint) {
        self.paginator.commit(page, next, &self.text);
    }
}

/// UA sheet, User sheets from `options`, then the author sheets of `tree`.
fn build_resolver(
    url: &str,
    tree: &DomTree,
    fetcher: &dyn Fetcher,
    options: &ViewerOptions,
    messages: &MessageQueue,
) -> StyleResolver {
    let mut resolver = StyleResolver::new(messages.clone());
    let _ = resolver.set_media(options.media());
    let _ = resolver.add_stylesheet(&options.generated_style_sheet(), Origin::User);
    if let Some(css) = &options.user_style_sheet {
        add_with_imports(&mut resolver, &parse_stylesheet(css), Origin::User, url, fetcher, 0);
    }
    for source in collect_stylesheet_sources(tree) {
        match source {
            StylesheetSource::Inline { css } => {
                add_with_imports(&mut resolver, &parse_stylesheet(&css), Origin::Author, url, fetcher, 0);
            }
            StylesheetSource::External { href } => {
                let sheet_url = resolve_url(&href, Some(url));
                add_external(&mut resolver, &sheet_url, Origin::Author, fetcher, 0);
            }
        }
    }
    resolver
}

fn add_external(resolver: &mut StyleResolver, url: &str, origin: Origin, fetcher: &dyn Fetcher, depth: u32) {
    match fetcher.fetch_text(url) {
        Ok(css) => add_with_imports(resolver, &parse_stylesheet(&css), origin, url, fetcher, depth),
        Err(err) => resolver.messages().warn("CSS", format!("stylesheet not loaded: {err}")),
    }
}

/// [CSS Cascade § 2](https://www.w3.org/TR/css-cascade-4/#at-import)
///
/// "The @import rule ... imports style rules from other style sheets", which
/// cascade as if they stood in place of the rule, before the sheet's own.
fn add_with_imports(
    resolver: &mut StyleResolver,
    sheet: &Stylesheet,
    origin: Origin,
    base_url: &str,
    fetcher: &dyn Fetcher,
    depth: u32,
) {
    for target in sheet.imports() {
        let url = resolve_url(&target, Some(base_url));
        if depth >= MAX_IMPORT_DEPTH {
            resolver.messages().warn("CSS", format!("@import of {url} nested too deep"));
            continue;
        }
        add_external(resolver, &url, origin, fetcher, depth + 1);
    }
    let _ = resolver.add_parsed(sheet, origin);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use folio_common::FetchError;
    use folio_css::style::ColorValue;

    use super::*;

    struct Files(HashMap<&'static str, &'static str>);

    impl Fetcher for Files {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.0
                .get(url)
                .map(|text| text.as_bytes().to_vec())
                .ok_or_else(|| FetchError::Http {
                    url: url.to_string(),
                    message: "404".to_string(),
                })
        }
    }

    fn color_of(doc: &mut Document, id: &str) -> ColorValue {
        let node = doc.tree.element_by_id(id).unwrap();
        doc.resolver.resolve_style(&doc.tree, node, None).color
    }

    #[test]
    fn test_imports_cascade_before_the_importing_sheet() {
        let files = Files(HashMap::from([
            (
                "book/ch1.xhtml",
                r#"<html><head><link rel="stylesheet" href="css/main.css"/></head><body><p id="a">x</p><p id="b">y</p></body></html>"#,
            ),
            ("book/css/main.css", "@import \"base.css\"; #a { color: rgb(0, 0, 255) }"),
            ("book/css/base.css", "p { color: rgb(0, 128, 0) } #a { color: rgb(255, 0, 0) }"),
        ]));
        let messages = MessageQueue::new();
        let mut doc = Document::load("book/ch1.xhtml", &files, &ViewerOptions::default(), &messages).unwrap();
        assert_eq!(color_of(&mut doc, "a"), ColorValue::rgb(0, 0, 255));
        assert_eq!(color_of(&mut doc, "b"), ColorValue::rgb(0, 128, 0));
    }

    #[test]
    fn test_missing_stylesheet_is_a_warning() {
        let files = Files(HashMap::from([(
            "ch.xhtml",
            r#"<html><head><link rel="stylesheet" href="gone.css"/></head><body><p>x</p></body></html>"#,
        )]));
        let messages = MessageQueue::new();
        let doc = Document::load("ch.xhtml", &files, &ViewerOptions::default(), &messages);
        assert!(doc.is_ok());
        assert!(messages.drain().iter().any(|m| m.text.contains("gone.css")));
    }

    #[test]
    fn test_load_errors() {
        let files = Files(HashMap::from([("bad.xhtml", "<html><body></html>")]));
        let messages = MessageQueue::new();
        let options = ViewerOptions::default();
        assert!(matches!(
            Document::load("bad.xhtml", &files, &options, &messages),
            Err(ViewerError::Parse { .. })
        ));
        assert!(matches!(
            Document::load("none.xhtml", &files, &options, &messages),
            Err(ViewerError::Fetch(_))
        ));
    }

    #[test]
    fn test_pending_images_resolve_against_the_document() {
        let files = Files(HashMap::from([(
            "book/ch.xhtml",
            r#"<html><body><img src="img/a.png"/><img src="b.png"/></body></html>"#,
        )]));
        let mut doc = Document::load("book/ch.xhtml", &files, &ViewerOptions::default(), &MessageQueue::new()).unwrap();
        doc.images.insert("b.png", None);
        assert_eq!(doc.pending_images(), vec![("img/a.png".to_string(), "book/img/a.png".to_string())]);
    }
}
