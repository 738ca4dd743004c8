//! Integration tests for selector parsing and matching against parsed
//! documents.

use folio_css::selector::PseudoElement;
use folio_css::{Specificity, parse_selector};
use folio_dom::{DomTree, NodeId, parse_xhtml};

const DOC: &str = r##"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <section id="s1" class="chapter intro">
    <h1 id="t">Title</h1>
    <p id="p1" lang="en-GB">One</p>
    <p id="p2">Two<a id="n1" epub:type="noteref" href="#fn1">1</a></p>
    <p id="p3"></p>
  </section>
  <aside id="fn1" epub:type="footnote">Note</aside>
</body>
</html>"##;

fn load() -> DomTree {
    parse_xhtml(DOC).unwrap()
}

fn node(tree: &DomTree, id: &str) -> NodeId {
    tree.element_by_id(id).unwrap()
}

fn matches(tree: &DomTree, selector: &str, id: &str) -> bool {
    parse_selector(selector).unwrap().matches_in_tree(tree, node(tree, id))
}

#[test]
fn test_descendant_and_child_combinators() {
    let tree = load();
    assert!(matches(&tree, "section p", "p1"));
    assert!(matches(&tree, "body > section > p", "p2"));
    assert!(!matches(&tree, "body > p", "p1"));
    assert!(matches(&tree, "section.intro.chapter #p2 a", "n1"));
}

#[test]
fn test_sibling_combinators() {
    let tree = load();
    assert!(matches(&tree, "h1 + p", "p1"));
    assert!(!matches(&tree, "h1 + p", "p2"));
    assert!(matches(&tree, "h1 ~ p", "p3"));
}

#[test]
fn test_structural_pseudo_classes() {
    let tree = load();
    assert!(matches(&tree, "p:first-of-type", "p1"));
    assert!(matches(&tree, "p:last-child", "p3"));
    assert!(matches(&tree, "p:empty", "p3"));
    assert!(!matches(&tree, "p:empty", "p1"));
    assert!(matches(&tree, "p:nth-child(2n+1)", "p2"));
    assert!(matches(&tree, "p:not(#p1)", "p2"));
    assert!(!matches(&tree, ":root", "s1"));
}

#[test]
fn test_attribute_operators() {
    let tree = load();
    assert!(matches(&tree, "[lang|=en]", "p1"));
    assert!(matches(&tree, "[class~=intro]", "s1"));
    assert!(matches(&tree, "a[href^='#']", "n1"));
    assert!(matches(&tree, "a[href$=fn1]", "n1"));
    assert!(matches(&tree, "[id*=n]", "fn1"));
}

#[test]
fn test_specificity_ordering() {
    let id = parse_selector("#p1").unwrap().specificity;
    let class = parse_selector("p.a.b").unwrap().specificity;
    let tags = parse_selector("body section p").unwrap().specificity;
    assert_eq!(class, Specificity(0, 2, 1));
    assert!(id > class);
    assert!(class > tags);
}

#[test]
fn test_footnote_pseudo_elements() {
    let call = parse_selector("a::footnote-call").unwrap();
    assert_eq!(call.pseudo_element, Some(PseudoElement::FootnoteCall));
    let marker = parse_selector("aside::footnote-marker").unwrap();
    assert_eq!(marker.pseudo_element, Some(PseudoElement::FootnoteMarker));
}

#[test]
fn test_invalid_selectors_rejected() {
    assert!(parse_selector("p >").is_err());
    assert!(parse_selector("p::before span").is_err());
    assert!(parse_selector("nope|p").is_err());
}
