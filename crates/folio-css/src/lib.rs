//! CSS cascade, box generation, geometry, column layout, and break scheduling
//! for the Folio pagination engine.
//!
//! # Scope
//!
//! This crate implements:
//! - **CSS Tokenizer** ([§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization))
//! - **CSS Parser** ([§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing))
//!   - Style rules and at-rules kept with prelude and block
//!   - Parse issues collected instead of raised
//!
//! - **CSS Selectors** ([Selectors Level 4](https://www.w3.org/TR/selectors-4/))
//!   - Type, class, ID, universal, attribute and structural pseudo-class selectors
//!   - Pseudo-elements including `::footnote-call` and `::footnote-marker`
//!
//! - **CSS Cascade** ([CSS Cascading Level 4](https://www.w3.org/TR/css-cascade-4/))
//!   - UA, user and author origins, `!important`, `style` attributes
//!   - `@media` queries evaluated lazily, `@page` rules and margin boxes
//!   - A style cache invalidated by stylesheet reloads and media changes
//!
//! - **Box Generation** ([CSS Display Level 3](https://www.w3.org/TR/css-display-3/))
//!   - Box kinds as a tagged union in a per-page arena
//!   - Counters, generated content, footnotes, named flows
//!
//! - **Paginated Layout** ([CSS Fragmentation Level 3](https://www.w3.org/TR/css-break-3/))
//!   - Block geometry, line breaking, floats, multi-column pages
//!   - Break candidates with orphans, widows and `avoid` penalties
//!   - Footnote areas at the bottom of columns

/// Box tree per [CSS Display Level 3](https://www.w3.org/TR/css-display-3/).
pub mod boxes;
/// CSS cascade and style computation per [CSS Cascading Level 4](https://www.w3.org/TR/css-cascade-4/).
pub mod cascade;
/// Counters per [CSS Lists Level 3](https://www.w3.org/TR/css-lists-3/#auto-numbering).
pub mod counters;
/// Value expressions of `content` and `-epubx-expr()`.
pub mod expr;
/// Break candidates and footnote areas per [CSS Fragmentation Level 3](https://www.w3.org/TR/css-break-3/).
pub mod fragmentation;
/// Column and page layout.
pub mod layout;
/// Media queries per [Media Queries Level 4](https://www.w3.org/TR/mediaqueries-4/).
pub mod media;
/// `@page` rules per [CSS Paged Media Level 3](https://www.w3.org/TR/css-page-3/).
pub mod page;
/// CSS parser per [§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing).
pub mod parser;
/// CSS selector parsing and matching per [Selectors Level 4](https://www.w3.org/TR/selectors-4/).
pub mod selector;
/// Computed style representation per [CSS Cascading Level 4](https://www.w3.org/TR/css-cascade-4/).
pub mod style;
/// CSS tokenizer per [§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization).
pub mod tokenizer;
/// User-agent stylesheet per [WHATWG HTML § 15 Rendering](https://html.spec.whatwg.org/multipage/rendering.html).
pub mod ua_stylesheet;

// Re-exports for convenience
pub use boxes::{BoxArena, BoxBuilder, BoxId, BoxKind, Checkpoint, FlowMap, FlowPosition, ResourceSizes};
pub use cascade::{Origin, StyleResolver, compute_styles};
pub use layout::{
    ApproximateFontMetrics, FontMetrics, IntervalMap, LayoutError, PageContent, PageFragment,
    PageLayout, Rect,
};
pub use media::MediaEnvironment;
pub use page::{PageSide, PageStyle};
pub use parser::{CSSParser, ComponentValue, Declaration, ParseIssue, Rule, Stylesheet, parse_stylesheet};
pub use selector::{ParsedSelector, Specificity, parse_selector};
pub use style::ComputedStyle;
pub use tokenizer::{CSSToken, CSSTokenizer};

use folio_dom::{DomTree, ElementData, NodeId, NodeType};

/// [§ 6.1 Cascade Sorting Order](https://www.w3.org/TR/css-cascade-4/#cascade-sort)
///
/// "Declarations from style sheets independently linked by the originating document
/// are treated as if they were concatenated in linking order."
///
/// The source of an author stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StylesheetSource {
    /// External stylesheet from `<link rel="stylesheet">`.
    ///
    /// [§ 4.2.4 The link element](https://html.spec.whatwg.org/multipage/semantics.html#the-link-element)
    External {
        /// The href of the stylesheet, unresolved.
        href: String,
    },
    /// Inline stylesheet from a `<style>` element.
    ///
    /// [§ 4.2.6 The style element](https://html.spec.whatwg.org/multipage/semantics.html#the-style-element)
    Inline {
        /// Text of the element.
        css: String,
    },
}

/// [§ 4.2.4 The link element](https://html.spec.whatwg.org/multipage/semantics.html#the-link-element)
/// [§ 4.2.6 The style element](https://html.spec.whatwg.org/multipage/semantics.html#the-style-element)
///
/// Collect the author stylesheets of a document in document order, which is
/// the order their rules cascade in.
#[must_use]
pub fn collect_stylesheet_sources(tree: &DomTree) -> Vec<StylesheetSource> {
    let mut sources = Vec::new();
    collect_sources_recursive(tree, tree.root(), &mut sources);
    sources
}

fn collect_sources_recursive(tree: &DomTree, id: NodeId, sources: &mut Vec<StylesheetSource>) {
    let Some(node) = tree.get(id) else { return };

    if let NodeType::Element(data) = &node.node_type {
        if data.tag_name.eq_ignore_ascii_case("link") {
            // STEP 1: "If the rel attribute's value contains the token
            // stylesheet, then the link is a stylesheet link."
            //
            // STEP 2: "The href attribute gives the address (a valid non-empty
            // URL potentially surrounded by spaces) of the linked resource."
            if is_stylesheet_link(data)
                && let Some(href) = data.attr("href").map(str::trim)
                && !href.is_empty()
            {
                sources.push(StylesheetSource::External { href: href.to_string() });
            }
        } else if data.tag_name.eq_ignore_ascii_case("style") {
            let css = tree
                .children(id)
                .iter()
                .filter_map(|&child| tree.as_text(child))
                .collect();
            sources.push(StylesheetSource::Inline { css });
            return;
        }
    }

    for &child_id in tree.children(id) {
        collect_sources_recursive(tree, child_id, sources);
    }
}

/// [§ 2.4.7 Space-separated tokens](https://html.spec.whatwg.org/multipage/common-microsyntaxes.html#space-separated-tokens)
///
/// Token comparison is ASCII case-insensitive.
fn is_stylesheet_link(data: &ElementData) -> bool {
    data.attr("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_in_document_order() {
        let mut tree = DomTree::new();
        let html = tree.append_element(tree.root(), ElementData::new("html"));
        let head = tree.append_element(html, ElementData::new("head"));
        let _ = tree.append_element(
            head,
            ElementData::new("link")
                .with_attr("rel", "Alternate StyleSheet")
                .with_attr("href", " a.css "),
        );
        let style = tree.append_element(head, ElementData::new("style"));
        let _ = tree.append_text(style, "p { color: red }");
        let _ = tree.append_element(head, ElementData::new("link").with_attr("rel", "icon").with_attr("href", "i.png"));

        assert_eq!(collect_stylesheet_sources(&tree), vec![
            StylesheetSource::External { href: "a.css".to_string() },
            StylesheetSource::Inline {
                css: "p { color: red }".to_string()
            },
        ]);
    }
}
