//! User-Agent Stylesheet
//!
//! [WHATWG HTML § 15 Rendering](https://html.spec.whatwg.org/multipage/rendering.html)
//!
//! "User agents are expected to have a default style sheet that presents elements
//! of HTML documents in ways consistent with general user expectations."
//!
//! [CSS Cascading § 6.1 Cascade Sorting Order](https://www.w3.org/TR/css-cascade-4/#cascade-sort)
//!
//! "Each style rule has a cascade origin, which determines where it enters the
//! cascade. CSS defines three core origins: Author, User, and User-Agent."
//!
//! Besides the HTML defaults this sheet carries the paginated-media rules: EPUB
//! footnote asides are hidden from the flow (their content is pulled in at the
//! note reference), headings avoid breaks after them, and list items count.

use std::sync::OnceLock;

use crate::parser::{Stylesheet, parse_stylesheet};

/// [WHATWG HTML § 15.3 Rendering: Suggested default style sheet](https://html.spec.whatwg.org/multipage/rendering.html#the-css-user-agent-style-sheet-and-presentational-hints)
const UA_CSS: &str = r#"
@namespace epub "http://www.idpf.org/2007/ops";

/* [§ 15.3.1 Hidden elements](https://html.spec.whatwg.org/multipage/rendering.html#hidden-elements) */
area, base, basefont, datalist, head, link, meta, noembed,
noframes, param, rp, script, style, template, title {
    display: none;
}

/* [§ 15.3.3 Flow content](https://html.spec.whatwg.org/multipage/rendering.html#flow-content-3) */
address, article, aside, blockquote, body, center, dd, details,
dialog, dir, div, dl, dt, fieldset, figcaption, figure, footer,
form, h1, h2, h3, h4, h5, h6, header, hgroup, hr, html, legend,
listing, main, menu, nav, ol, p, plaintext, pre, search,
section, summary, ul, xmp {
    display: block;
}

/* [§ 15.3.7 Lists](https://html.spec.whatwg.org/multipage/rendering.html#lists) */
li {
    display: list-item;
}

ol, ul, menu {
    counter-reset: list-item;
    margin-block-start: 1em;
    margin-block-end: 1em;
    padding-inline-start: 40px;
}

ul, menu {
    list-style-type: disc;
}

ol {
    list-style-type: decimal;
}

/* [§ 15.3.6 Sections and headings](https://html.spec.whatwg.org/multipage/rendering.html#sections-and-headings) */
h1 {
    font-size: 2em;
    font-weight: bold;
    margin-block-start: 0.67em;
    margin-block-end: 0.67em;
}

h2 {
    font-size: 1.5em;
    font-weight: bold;
    margin-block-start: 0.83em;
    margin-block-end: 0.83em;
}

h3 {
    font-size: 1.17em;
    font-weight: bold;
    margin-block-start: 1em;
    margin-block-end: 1em;
}

h4 {
    font-weight: bold;
    margin-block-start: 1.33em;
    margin-block-end: 1.33em;
}

h5 {
    font-size: 0.83em;
    font-weight: bold;
    margin-block-start: 1.67em;
    margin-block-end: 1.67em;
}

h6 {
    font-size: 0.67em;
    font-weight: bold;
    margin-block-start: 2.33em;
    margin-block-end: 2.33em;
}

/* [CSS Fragmentation § 3.1](https://www.w3.org/TR/css-break-3/#break-between) */
h1, h2, h3, h4, h5, h6 {
    break-after: avoid;
}

/* [§ 15.3.5 Grouping content](https://html.spec.whatwg.org/multipage/rendering.html#grouping-content) */
p, blockquote, figure, listing, plaintext, pre, xmp {
    margin-block-start: 1em;
    margin-block-end: 1em;
}

blockquote, figure {
    margin-inline-start: 40px;
    margin-inline-end: 40px;
}

listing, plaintext, pre, xmp {
    white-space: pre;
    font-family: monospace;
}

hr {
    border: 1px inset;
    margin-block-start: 0.5em;
    margin-block-end: 0.5em;
}

/* [§ 15.3.4 The page](https://html.spec.whatwg.org/multipage/rendering.html#the-page) */
body {
    margin: 8px;
}

/* [§ 15.3.8 Text-level semantics](https://html.spec.whatwg.org/multipage/rendering.html#text-level-semantics) */
b, strong, th {
    font-weight: bolder;
}

em, i, cite, dfn, var {
    font-style: italic;
}

br {
    display: inline;
}

img, svg, video {
    display: inline-block;
}

/* [§ 15.3.10 Tables](https://html.spec.whatwg.org/multipage/rendering.html#tables-2) */
table {
    display: table;
}

tr {
    display: table-row;
}

td, th {
    display: table-cell;
    padding: 1px;
}

/* [EPUB 3 Structural Semantics](https://www.w3.org/TR/epub-ssv-11/#notes)
   Notes are rendered at the reference, not where they sit in the source. */
aside[epub|type~="footnote"],
aside[epub|type~="endnote"],
aside[epub|type~="rearnote"] {
    display: none;
}

/* [CSS GCPM § 2.4](https://www.w3.org/TR/css-gcpm-3/#footnote-call) */
::footnote-call {
    content: counter(footnote);
    font-size: 0.83em;
}

::footnote-marker {
    content: counter(footnote) ". ";
}
"#;

/// The UA stylesheet source, for callers that want to re-parse it.
#[must_use]
pub const fn ua_css() -> &'static str {
    UA_CSS
}

/// Return the parsed UA stylesheet, parsing only once.
///
/// [CSS Cascading § 6.1](https://www.w3.org/TR/css-cascade-4/#cascade-sort)
///
/// "Each style rule has a cascade origin... User-Agent origin rules have
/// the lowest priority."
pub fn ua_stylesheet() -> &'static Stylesheet {
    static STYLESHEET: OnceLock<Stylesheet> = OnceLock::new();
    STYLESHEET.get_or_init(|| parse_stylesheet(UA_CSS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ua_stylesheet_parses_cleanly() {
        let sheet = ua_stylesheet();
        assert!(sheet.issues.is_empty(), "{:?}", sheet.issues);
        assert!(sheet.rules.len() > 20);
    }
}
