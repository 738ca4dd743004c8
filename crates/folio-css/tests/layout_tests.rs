//! Integration tests for paginated layout: line breaking across pages,
//! widows and orphans, floats, forced breaks, footnotes and columns.

use folio_common::MessageQueue;
use folio_css::boxes::NoResources;
use folio_css::layout::{FragmentArea, FragmentKind};
use folio_css::{
    ApproximateFontMetrics, Checkpoint, FlowMap, Origin, PageContent, PageLayout, PageSide,
    PageStyle, StyleResolver,
};
use folio_dom::{DomTree, parse_xhtml};

/// One word per line in a 60px column: each word is 42px wide at 10px.
const BASE_CSS: &str = "html, body, p, div { margin: 0; padding: 0 }
    body { font-size: 10px; line-height: 20px; orphans: 2; widows: 2 }";

fn words(count: usize) -> String {
    vec!["wordsss"; count].join(" ")
}

fn document(body: &str) -> DomTree {
    parse_xhtml(&format!(
        r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head><body>{body}</body></html>"#
    ))
    .unwrap()
}

/// Paginate `tree` with `css` on pages of the given size and no margins.
fn load(tree: &DomTree, css: &str, width: f32, height: f32) -> Vec<PageContent> {
    let mut resolver = StyleResolver::new(MessageQueue::new());
    let _ = resolver.add_stylesheet(BASE_CSS, Origin::Author);
    let _ = resolver.add_stylesheet(css, Origin::Author);
    let flows = FlowMap::build(tree, &mut resolver);
    let mut layout = PageLayout::new(
        tree,
        &mut resolver,
        &flows,
        &NoResources,
        &ApproximateFontMetrics,
        PageStyle::new(width, height, [0.0; 4]),
    );
    let mut pages = Vec::new();
    let mut checkpoint = Checkpoint::start();
    while !checkpoint.is_exhausted() {
        assert!(pages.len() < 100, "pagination did not terminate");
        let (page, next) = layout.layout_page(pages.len(), &checkpoint).unwrap();
        pages.push(page);
        checkpoint = next;
    }
    pages
}

fn line_count(page: &PageContent) -> usize {
    page.text().lines().count()
}

#[test]
fn test_forty_lines_never_leave_a_single_line() {
    let tree = document(&format!("<p>{}</p>", words(40)));
    let pages = load(&tree, "", 60.0, 600.0);
    let counts: Vec<usize> = pages.iter().map(line_count).collect();
    assert_eq!(counts.iter().sum::<usize>(), 40);
    assert!(counts.iter().all(|&n| n >= 2), "{counts:?}");
    assert_eq!(counts, vec![30, 10]);
}

#[test]
fn test_widows_pull_a_line_onto_the_next_page() {
    let tree = document(&format!("<p>{}</p>", words(31)));
    let pages = load(&tree, "", 60.0, 600.0);
    let counts: Vec<usize> = pages.iter().map(line_count).collect();
    assert_eq!(counts, vec![29, 2]);
}

#[test]
fn test_page_positions_are_increasing() {
    let tree = document(&format!("<p>{}</p><p>{}</p>", words(25), words(25)));
    let pages = load(&tree, "", 60.0, 200.0);
    assert!(pages.len() > 2);
    for pair in pages.windows(2) {
        assert!(pair[0].start < pair[1].start);
        assert_eq!(pair[0].end, pair[1].start);
    }
    let total: usize = pages.iter().map(line_count).sum();
    assert_eq!(total, 50);
}

#[test]
fn test_second_float_clears_the_first() {
    let tree = document(
        r#"<div id="a" style="float: left; width: 80px; height: 40px"></div><div id="b" style="float: left; width: 100px; height: 40px"></div>"#,
    );
    let pages = load(&tree, "", 300.0, 600.0);
    let rect = |id: &str| {
        let node = tree.element_by_id(id).unwrap();
        pages[0]
            .fragments
            .iter()
            .find(|f| f.node == Some(node) && f.kind == FragmentKind::Block)
            .map(|f| f.rect)
            .unwrap()
    };
    let (first, second) = (rect("a"), rect("b"));
    assert!(second.x >= 80.0);
    assert!(second.x >= first.x + first.width);
    assert!((second.y - first.y).abs() < 0.01);
}

#[test]
fn test_forced_page_break() {
    let tree = document(r#"<div>alpha</div><div style="break-before: page">beta</div>"#);
    let pages = load(&tree, "", 300.0, 600.0);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].text(), "alpha");
    assert_eq!(pages[1].text(), "beta");
}

#[test]
fn test_right_break_inserts_blank_page() {
    let tree = document(r#"<div>alpha</div><div style="break-before: right">beta</div>"#);
    let pages = load(&tree, "", 300.0, 600.0);
    let sides: Vec<(PageSide, bool)> = pages.iter().map(|p| (p.side, p.blank)).collect();
    assert_eq!(sides, vec![
        (PageSide::Right, false),
        (PageSide::Left, true),
        (PageSide::Right, false),
    ]);
    assert_eq!(pages[2].text(), "beta");
}

#[test]
fn test_footnote_goes_to_the_bottom_of_the_page() {
    let tree = document(
        r#"<p>call<span style="float: footnote">note</span> text</p>"#,
    );
    let pages = load(&tree, "", 300.0, 600.0);
    assert_eq!(pages.len(), 1);
    let flow_bottom = pages[0]
        .fragments
        .iter()
        .filter(|f| f.area == FragmentArea::Flow)
        .map(|f| f.rect.y + f.rect.height)
        .fold(0.0_f32, f32::max);
    let notes: Vec<_> = pages[0]
        .fragments
        .iter()
        .filter(|f| f.area == FragmentArea::Footnote)
        .collect();
    assert!(!notes.is_empty());
    assert!(notes.iter().all(|f| f.rect.y >= flow_bottom));
    assert!(pages[0].text().contains("note"));
}

#[test]
fn test_float_that_does_not_fit_moves_to_the_next_page() {
    let tree = document(
        r#"<p>alpha</p><div id="f" style="float: left; width: 50px; height: 90px"></div><p>beta</p>"#,
    );
    let pages = load(&tree, "", 300.0, 100.0);
    assert_eq!(pages.len(), 2);
    let float = tree.element_by_id("f").unwrap();
    let placed = |page: &PageContent| page.fragments.iter().any(|f| f.node == Some(float));

    // The float waits; the content after it stays where it was.
    assert!(!placed(&pages[0]));
    assert!(pages[0].text().contains("alpha"));
    assert!(pages[0].text().contains("beta"));
    assert_eq!(pages[1].start, pages[0].end);

    let rect = pages[1]
        .fragments
        .iter()
        .find(|f| f.node == Some(float))
        .map(|f| (f.area, f.rect))
        .unwrap();
    assert_eq!(rect.0, FragmentArea::Float);
    assert!(rect.1.y.abs() < 0.01);
}

#[test]
fn test_footnote_that_does_not_fit_moves_to_the_next_page() {
    let body = |note: &str| {
        format!("<p>one</p><p>two</p><p>three{note}</p><p>four</p><p>five</p><p>six</p>")
    };
    let note = format!(r#"<span style="float: footnote">{}</span>"#, words(16));
    let with_note = document(&body(&note));
    let without_note = document(&body(""));
    let pages = load(&with_note, "", 300.0, 100.0);
    let plain = load(&without_note, "", 300.0, 100.0);

    let notes = |page: &PageContent| page.fragments.iter().filter(|f| f.area == FragmentArea::Footnote).count();
    assert_eq!(notes(&pages[0]), 0);
    assert!(pages[0].text().contains("three"));
    assert!(pages[0].text().contains("five"));
    // The calling page breaks exactly where it would without the note.
    assert_eq!(pages[0].end, plain[0].end);

    assert!(notes(&pages[1]) > 0);
    assert_eq!(pages[1].start, pages[0].end);
    assert!(pages[1].text().contains("wordsss"));
    let all: String = pages.iter().map(PageContent::text).collect();
    assert!(all.contains("six"));
}

#[test]
fn test_two_columns_are_balanced_on_the_last_page() {
    let tree = document(&format!("<p>{}</p>", words(10)));
    let pages = load(&tree, "body { column-count: 2; column-gap: 20px }", 140.0, 600.0);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].columns, 2);
    let lines = |left: bool| {
        pages[0]
            .fragments
            .iter()
            .filter(|f| matches!(f.kind, FragmentKind::Text(_)))
            .filter(|f| (f.rect.x < 70.0) == left)
            .count()
    };
    let (left, right) = (lines(true), lines(false));
    assert_eq!(left + right, 10);
    assert!(left.abs_diff(right) <= 1, "{left} / {right}");
}

#[test]
fn test_page_rules_size_and_margin_boxes() {
    let tree = document(&format!("<p>{}</p>", words(12)));
    let css = "@page { size: 60px 140px; margin: 10px 0 30px 0; @bottom-center { content: counter(page) } }";
    let pages = load(&tree, css, 800.0, 1000.0);
    assert!((pages[0].style.width - 60.0).abs() < 0.01);
    // 100px of content area holds five 20px lines.
    assert_eq!(line_count(&pages[0]), 5);
    assert!(pages[0].fragments.iter().all(|f| f.rect.y >= 10.0));
    let count = pages.len();
    let texts = pages[1].margin_box_texts(2, Some(count));
    assert_eq!(texts.values().next().map(String::as_str), Some("2"));
}
