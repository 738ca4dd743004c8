//! Tests for tree navigation and the XHTML loader.

use folio_dom::{DomError, DomTree, ElementData, NodeId, XHTML_NAMESPACE, parse_xhtml};

fn sample() -> DomTree {
    parse_xhtml(
        r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>T</title></head>
<body><p id="first" class="a b">Hello <em>world</em></p><!-- note --><aside epub:type="footnote" id="fn1">Note</aside></body>
</html>"#,
    )
    .expect("well-formed")
}

// ========== loader ==========

#[test]
fn test_parse_builds_document_element() {
    let tree = sample();
    let html = tree.document_element().expect("root");
    let data = tree.as_element(html).expect("element");
    assert_eq!(data.tag_name, "html");
    assert_eq!(data.namespace.as_deref(), Some(XHTML_NAMESPACE));
}

#[test]
fn test_prefixed_attribute_keeps_qualified_name() {
    let tree = sample();
    let aside = tree.element_by_id("fn1").expect("aside");
    let data = tree.as_element(aside).expect("element");
    assert_eq!(data.attr("epub:type"), Some("footnote"));
    assert!(data.attr("xmlns:epub").is_none());
}

#[test]
fn test_classes_and_text_content() {
    let tree = sample();
    let p = tree.element_by_id("first").expect("p");
    let data = tree.as_element(p).expect("element");
    assert!(data.classes().contains("a"));
    assert!(data.classes().contains("b"));
    assert_eq!(tree.text_content(p), "Hello world");
}

#[test]
fn test_entities_merge_into_one_text_node() {
    let tree = parse_xhtml("<html><body><p>a &amp; b&nbsp;c</p></body></html>").expect("parse");
    let body = tree.body().expect("body");
    let p = tree.first_child(body).expect("p");
    assert_eq!(tree.children(p).len(), 1);
    assert_eq!(tree.text_content(p), "a & b\u{a0}c");
}

#[test]
fn test_mismatched_end_tag_is_error() {
    let err = parse_xhtml("<html><body></html>").expect_err("must fail");
    assert!(matches!(
        err,
        DomError::Syntax { .. } | DomError::MismatchedEnd { .. }
    ));
}

#[test]
fn test_empty_input_has_no_root() {
    assert!(matches!(parse_xhtml(""), Err(DomError::NoRootElement)));
}

// ========== navigation ==========

#[test]
fn test_path_round_trips() {
    let tree = sample();
    let em = tree
        .descendants(NodeId::ROOT)
        .find(|&id| tree.as_element(id).is_some_and(|e| e.tag_name == "em"))
        .expect("em");
    let path = tree.path_to(em);
    assert_eq!(tree.node_at_path(&path), Some(em));
}

#[test]
fn test_descendants_are_document_order() {
    let mut tree = DomTree::new();
    let root = tree.append_element(NodeId::ROOT, ElementData::new("div"));
    let a = tree.append_element(root, ElementData::new("a"));
    let a1 = tree.append_text(a, "x");
    let b = tree.append_element(root, ElementData::new("b"));

    let order: Vec<NodeId> = tree.descendants(root).collect();
    assert_eq!(order, vec![root, a, a1, b]);
}

#[test]
fn test_paths_compare_in_document_order() {
    let tree = sample();
    let p = tree.element_by_id("first").expect("p");
    let aside = tree.element_by_id("fn1").expect("aside");
    assert!(tree.path_to(p) < tree.path_to(aside));
}

#[test]
fn test_element_children_skip_text_and_comments() {
    let tree = sample();
    let body = tree.body().expect("body");
    let names: Vec<&str> = tree
        .element_children(body)
        .filter_map(|id| tree.as_element(id))
        .map(|e| e.tag_name.as_str())
        .collect();
    assert_eq!(names, vec!["p", "aside"]);
}

#[test]
fn test_child_index_and_siblings() {
    let mut tree = DomTree::new();
    let root = tree.append_element(NodeId::ROOT, ElementData::new("div"));
    let a = tree.append_element(root, ElementData::new("a"));
    let b = tree.append_element(root, ElementData::new("b"));
    assert_eq!(tree.child_index(b), Some(1));
    assert_eq!(tree.prev_sibling(b), Some(a));
    assert_eq!(tree.preceding_siblings(b).collect::<Vec<_>>(), vec![a]);
    assert!(tree.is_descendant_of(b, NodeId::ROOT));
}

#[test]
fn test_first_id_wins() {
    let tree =
        parse_xhtml(r#"<html><body><p id="x">1</p><p id="x">2</p></body></html>"#).expect("parse");
    let found = tree.element_by_id("x").expect("x");
    assert_eq!(tree.text_content(found), "1");
}
