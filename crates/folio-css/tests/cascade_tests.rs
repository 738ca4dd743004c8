//! Integration tests for the style cascade: specificity, origins, media
//! queries and the style cache.

use folio_common::MessageQueue;
use folio_css::style::ColorValue;
use folio_css::{MediaEnvironment, Origin, StyleResolver, compute_styles};
use folio_dom::{DomTree, ElementData, NodeId, parse_xhtml};

/// Build `<html><body><tag ...></body></html>` and return the inner element.
fn make_element(tag: &str, id: Option<&str>, classes: &[&str]) -> (DomTree, NodeId) {
    let mut tree = DomTree::new();
    let html = tree.append_element(tree.root(), ElementData::new("html"));
    let body = tree.append_element(html, ElementData::new("body"));
    let mut data = ElementData::new(tag);
    if let Some(id) = id {
        data = data.with_attr("id", id);
    }
    if !classes.is_empty() {
        data = data.with_attr("class", classes.join(" "));
    }
    let node = tree.append_element(body, data);
    (tree, node)
}

fn resolver_with(css: &str) -> StyleResolver {
    let mut resolver = StyleResolver::new(MessageQueue::new());
    let _ = resolver.add_stylesheet(css, Origin::Author);
    resolver
}

#[test]
fn test_more_specific_rule_wins() {
    let (tree, p) = make_element("p", None, &["x"]);
    let mut resolver = resolver_with("p { color: red; } p.x { color: blue; }");
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 0, 255));
}

#[test]
fn test_specificity_beats_source_order() {
    let (tree, p) = make_element("p", Some("a"), &["x"]);
    let mut resolver = resolver_with("#a { color: blue } .x { color: red } p { color: lime }");
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 0, 255));
}

#[test]
fn test_later_rule_wins_equal_specificity() {
    let (tree, p) = make_element("p", None, &["x", "y"]);
    let mut resolver = resolver_with(".y { color: red } .x { color: lime }");
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 255, 0));
}

#[test]
fn test_important_beats_specificity() {
    let (tree, p) = make_element("p", Some("a"), &[]);
    let mut resolver = resolver_with("p { color: red !important } #a { color: blue }");
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(255, 0, 0));
}

#[test]
fn test_style_attribute_beats_id() {
    let mut tree = DomTree::new();
    let html = tree.append_element(tree.root(), ElementData::new("html"));
    let p = tree.append_element(
        html,
        ElementData::new("p").with_attr("id", "a").with_attr("style", "color: lime"),
    );
    let mut resolver = resolver_with("#a { color: red }");
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 255, 0));
}

#[test]
fn test_false_media_query_falls_back_to_inherited() {
    let (tree, p) = make_element("p", None, &[]);
    let mut resolver = resolver_with("@media (min-width: 500px) { p { color: green; } }");
    let _ = resolver.set_media(MediaEnvironment::print(400.0, 600.0));
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::BLACK);

    // Widening the viewport flips the query and drops the cache.
    assert!(resolver.set_media(MediaEnvironment::print(600.0, 600.0)));
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 128, 0));
}

#[test]
fn test_media_change_without_flip_keeps_result() {
    let (tree, p) = make_element("p", None, &[]);
    let mut resolver = resolver_with("@media screen { p { color: red } }");
    assert!(!resolver.set_media(MediaEnvironment::print(300.0, 300.0)));
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::BLACK);
}

#[test]
fn test_resolution_is_deterministic() {
    let (tree, p) = make_element("p", None, &["x"]);
    let css = "p { margin: 1em 2px; font-size: 12px } .x { color: blue; orphans: 3 }";
    let mut resolver = resolver_with(css);
    let first = resolver.resolve_style(&tree, p, None);
    let second = resolver.resolve_style(&tree, p, None);
    assert_eq!(*first, *second);

    let mut fresh = resolver_with(css);
    assert_eq!(*fresh.resolve_style(&tree, p, None), *first);
    assert_eq!(first.orphans, 3);
}

#[test]
fn test_user_sheet_loses_to_author_normal() {
    let (tree, p) = make_element("p", None, &[]);
    let mut resolver = StyleResolver::new(MessageQueue::new());
    let _ = resolver.add_stylesheet("p { color: red }", Origin::User);
    let _ = resolver.add_stylesheet("p { color: blue }", Origin::Author);
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 0, 255));
}

#[test]
fn test_inheritance_through_parsed_document() {
    let tree = parse_xhtml(
        r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><div class="c"><p>text</p></div></body></html>"#,
    )
    .unwrap();
    let mut resolver = resolver_with(".c { color: #00f; font-size: 20px } p { line-height: 1.5 }");
    let styles = compute_styles(&tree, &mut resolver);
    let p = tree
        .descendants(tree.root())
        .find(|&n| tree.as_element(n).is_some_and(|e| e.tag_name == "p"))
        .unwrap();
    let style = &styles[&p];
    assert_eq!(style.color, ColorValue::rgb(0, 0, 255));
    assert!((style.font_size - 20.0).abs() < f32::EPSILON);
}

#[test]
fn test_parse_errors_are_reported_not_raised() {
    let (tree, p) = make_element("p", None, &[]);
    let messages = MessageQueue::new();
    let mut resolver = StyleResolver::new(messages.clone());
    let _ = resolver.add_stylesheet("p:no-such-class { color: red } p { color: blue } p { colour: red }", Origin::Author);
    assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 0, 255));
    assert!(!messages.is_empty());
}
