//! Integration tests for the viewer façade: loading, background
//! pagination, navigation by page, EPage, CFI and link, resize, spreads
//! and events.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::rc::Rc;

use folio_common::FetchError;
use folio_css::PageSide;
use zip::write::SimpleFileOptions;
use folio_viewer::{
    Cfi, CfiError, Fetcher, PageProgression, Spread, Target, Viewer, ViewerError, ViewerEvent, ViewerOptions,
    Viewport, ZoomType,
};

/// An EPUB holding `files`, stored uncompressed.
fn epub(files: &[(&str, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// One `<p>` per 20px line.
const CSS: &str = "body { margin: 0; font-size: 10px; line-height: 20px } p { margin: 0 }";

/// A 3x2 PNG.
const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0x12, 0x16, 0xF1,
    0x4D, 0x00, 0x00, 0x00, 0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8, 0xCF, 0xC0, 0x00,
    0x41, 0x0C, 0x70, 0x16, 0x00, 0x41, 0xD2, 0x05, 0xFB, 0x87, 0xF0, 0xB9, 0x48, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

type Hook = Rc<RefCell<Option<Box<dyn FnMut(&str)>>>>;

/// In-memory resources. `hook` runs on every fetch, before it returns.
#[derive(Default)]
struct Files {
    files: HashMap<String, Vec<u8>>,
    hook: Hook,
}

impl Files {
    /// Resources with the shared `style.css`.
    fn new() -> Self {
        Self::default().with("style.css", CSS)
    }

    fn with(mut self, url: &str, content: impl AsRef<[u8]>) -> Self {
        let _ = self.files.insert(url.to_string(), content.as_ref().to_vec());
        self
    }
}

impl Fetcher for Files {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(hook) = self.hook.borrow_mut().as_mut() {
            hook(url);
        }
        self.files.get(url).cloned().ok_or_else(|| FetchError::Http {
            url: url.to_string(),
            message: "404 Not Found".to_string(),
        })
    }
}

/// A chapter linking `style.css` and then `sheets`. The head holds no text,
/// so character offsets count paragraph text only.
fn chapter_with(sheets: &[&str], body: &str) -> String {
    let links: String = std::iter::once("style.css")
        .chain(sheets.iter().copied())
        .map(|href| format!(r#"<link rel="stylesheet" href="{href}"/>"#))
        .collect();
    format!(r#"<html xmlns="http://www.w3.org/1999/xhtml"><head>{links}</head><body>{body}</body></html>"#)
}

fn chapter(body: &str) -> String {
    chapter_with(&[], body)
}

/// `count` one-line paragraphs of 32 characters, with ids `p0`, `p1`, ...
fn paragraphs(count: usize) -> String {
    (0..count)
        .map(|i| format!(r#"<p id="p{i}">{i:04}{}</p>"#, "x".repeat(28)))
        .collect()
}

/// A 400x100 viewport: five lines per page.
fn options() -> ViewerOptions {
    ViewerOptions {
        viewport: Viewport {
            width: 400.0,
            height: 100.0,
            ..Viewport::default()
        },
        ..ViewerOptions::default()
    }
}

fn viewer(files: Files, options: ViewerOptions) -> (Viewer, Rc<RefCell<Vec<ViewerEvent>>>) {
    let mut viewer = Viewer::with_fetcher(options, Box::new(files));
    let events: Rc<RefCell<Vec<ViewerEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    viewer.add_listener(Box::new(move |event| sink.borrow_mut().push(event.clone())));
    (viewer, events)
}

fn count(events: &[ViewerEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

#[test]
fn test_background_pagination_commits_pages_in_order() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(12)));
    let (mut viewer, events) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    viewer.run_until_idle();

    assert_eq!(viewer.page_count().unwrap(), 3);
    let events = events.borrow();
    assert_eq!(count(&events, "loaded"), 1);
    let laid: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ViewerEvent::PageLaid { page, .. } => Some(*page),
            _ => None,
        })
        .collect();
    assert_eq!(laid, vec![0, 1, 2]);
    assert!(events.iter().any(|e| matches!(e, ViewerEvent::Nav { page: 0, .. })));

    let starts: Vec<_> = (0..3).map(|i| viewer.page(i).unwrap().start.clone()).collect();
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_cfi_navigation_round_trips() {
    let files = Files::new()
        .with("ch1.xhtml", chapter(&paragraphs(7)))
        .with(
            "ch2.xhtml",
            r#"<html><head></head><body><p>Hello world</p><p>again</p></body></html>"#,
        );
    let (mut viewer, _) = viewer(files, options());
    viewer.load_spine(&["ch1.xhtml", "ch2.xhtml"]).unwrap();

    let target = "epubcfi(/6/4!/4/2/1:0)";
    let page = viewer.navigate(Target::Cfi(target.to_string())).unwrap();
    // The first chapter fills two pages.
    assert_eq!(page, 2);

    let current = viewer.current_cfi().unwrap();
    assert_eq!(current, target);

    let tree = &viewer.document(1).unwrap().tree;
    let expected = Cfi::parse(target).unwrap().start().resolve(tree).unwrap();
    let resolved = Cfi::parse(&current).unwrap().start().resolve(tree).unwrap();
    assert_eq!(resolved, expected);
    let node = resolved.node(tree).unwrap();
    assert_eq!(tree.as_text(node), Some("Hello world"));
    assert_eq!(resolved.offset, 0);
}

#[test]
fn test_resize_during_fetch_discards_stale_layout() {
    let hook: Hook = Rc::default();
    let files = Files {
        hook: Rc::clone(&hook),
        ..Files::new()
    }
    .with(
        "ch.xhtml",
        chapter(&format!(r#"<p><img src="pic.png"/></p>{}"#, paragraphs(8))),
    )
    .with("pic.png", PNG);
    let (mut viewer, events) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();

    // The viewport changes while the image is in flight.
    let handle = viewer.handle();
    let mut fired = false;
    let resize_once: Box<dyn FnMut(&str)> = Box::new(move |url: &str| {
        if url == "pic.png" && !fired {
            fired = true;
            handle.request_resize(300.0, 60.0);
        }
    });
    *hook.borrow_mut() = Some(resize_once);
    viewer.run_until_idle();

    assert!(viewer.discarded_tasks() >= 1);
    let pages = viewer.page_count().unwrap();
    assert_eq!(pages, 3);
    for index in 0..pages {
        let page = viewer.page(index).unwrap();
        assert!((page.style.width - 300.0).abs() < f32::EPSILON);
        assert!((page.style.height - 60.0).abs() < f32::EPSILON);
    }
    let events = events.borrow();
    assert_eq!(count(&events, "resizestart"), 1);
    assert_eq!(count(&events, "resizeend"), 1);
    assert!(viewer.document(0).unwrap().images.is_settled("pic.png"));
}

#[test]
fn test_resize_returns_to_the_viewed_position() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(20)));
    let (mut viewer, _) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    viewer.run_until_idle();
    assert_eq!(viewer.navigate(Target::Url("#p13".to_string())).unwrap(), 2);
    let before = viewer.current_cfi();

    // Three lines per page now: p13 is on the fifth page.
    viewer.resize(400.0, 60.0);
    viewer.run_until_idle();
    assert_eq!(viewer.current_cfi(), before);
    assert_eq!(viewer.current_page().unwrap(), 4);
}

#[test]
fn test_resize_without_autoresize_keeps_pages() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(6)));
    let options = ViewerOptions {
        autoresize: false,
        ..options()
    };
    let (mut viewer, events) = viewer(files, options);
    viewer.load_document("ch.xhtml").unwrap();
    viewer.run_until_idle();
    viewer.resize(200.0, 40.0);
    viewer.run_until_idle();
    assert!((viewer.options().viewport.width - 200.0).abs() < f32::EPSILON);
    assert_eq!(viewer.page_count().unwrap(), 2);
    assert!((viewer.page(0).unwrap().style.width - 400.0).abs() < f32::EPSILON);
    assert_eq!(count(&events.borrow(), "resizestart"), 0);
}

#[test]
fn test_epage_navigation() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(40)));
    let (mut viewer, _) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    assert!((viewer.epage_count() - 1.25).abs() < f64::EPSILON);

    // Character 1024 opens the 33rd paragraph, on page 7.
    assert_eq!(viewer.navigate(Target::EPage(1.0)).unwrap(), 6);
    assert!((viewer.current_epage().unwrap() - 1.0).abs() < f64::EPSILON);
    assert_eq!(viewer.navigate(Target::EPage(0.0)).unwrap(), 0);
    assert_eq!(viewer.navigate(Target::EPage(99.0)).unwrap(), 7);
}

#[test]
fn test_sequential_navigation_and_bounds() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(12)));
    let (mut viewer, _) = viewer(files, options());
    assert!(matches!(viewer.navigate(Target::Next), Err(ViewerError::NoDocument)));
    viewer.load_document("ch.xhtml").unwrap();

    assert_eq!(viewer.navigate(Target::Previous).unwrap(), 0);
    assert_eq!(viewer.navigate(Target::Next).unwrap(), 1);
    assert_eq!(viewer.navigate(Target::Last).unwrap(), 2);
    assert_eq!(viewer.navigate(Target::Next).unwrap(), 2);
    assert_eq!(viewer.navigate(Target::First).unwrap(), 0);
    assert!(matches!(
        viewer.navigate(Target::Page(9)),
        Err(ViewerError::PageOutOfRange { index: 9, count: 3 })
    ));
}

#[test]
fn test_pages_are_numbered_across_the_spine() {
    let files = Files::new()
        .with("a.xhtml", chapter(&paragraphs(6)))
        .with("b.xhtml", chapter(&paragraphs(3)));
    let (mut viewer, _) = viewer(files, options());
    viewer.load_spine(&["a.xhtml", "b.xhtml"]).unwrap();
    viewer.run_until_idle();
    assert_eq!(viewer.page_count().unwrap(), 3);
    assert_eq!(viewer.navigate(Target::Page(2)).unwrap(), 2);
    assert!(viewer.current_cfi().unwrap().starts_with("epubcfi(/6/4!"));
    // Each spine item starts on a right page.
    assert_eq!(viewer.page(2).unwrap().side, PageSide::Right);
    assert_eq!(viewer.page(2).unwrap().index, 0);
}

#[test]
fn test_links() {
    let files = Files::new()
        .with("a.xhtml", chapter(&paragraphs(12)))
        .with("b.xhtml", chapter(&paragraphs(2)));
    let (mut viewer, events) = viewer(files, options());
    viewer.load_spine(&["a.xhtml", "b.xhtml"]).unwrap();

    assert_eq!(viewer.navigate_to_internal_url("#p7").unwrap(), 1);
    assert_eq!(viewer.navigate_to_internal_url("b.xhtml").unwrap(), 3);
    assert_eq!(viewer.navigate_to_internal_url("a.xhtml#p11").unwrap(), 2);

    // Missing targets leave the view alone.
    assert_eq!(viewer.navigate_to_internal_url("#nowhere").unwrap(), 2);
    assert_eq!(viewer.navigate_to_internal_url("https://example.com/x").unwrap(), 2);

    let _ = viewer.drain_messages();
    let events = events.borrow();
    let external: Vec<&ViewerEvent> = events
        .iter()
        .filter(|e| matches!(e, ViewerEvent::Hyperlink { internal: false, .. }))
        .collect();
    assert_eq!(external.len(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::Message { level, text, .. } if level == "warn" && text.contains("nowhere")
    )));
}

#[test]
fn test_bad_cfis_leave_the_view_alone() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(12)));
    let (mut viewer, events) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    let _ = viewer.navigate(Target::Page(1)).unwrap();

    // Malformed, past the spine, and a step past the last child.
    for cfi in ["epubcfi(/6/x)", "epubcfi(/6/8!/4/2)", "epubcfi(/6/2!/4/80)"] {
        assert_eq!(viewer.navigate(Target::Cfi(cfi.to_string())).unwrap(), 1, "{cfi}");
    }
    assert!(matches!(Cfi::parse("epubcfi(/6/x)"), Err(CfiError::Syntax { position: 11, .. })));

    let events = events.borrow();
    let ignored = events
        .iter()
        .filter(|e| matches!(
            e,
            ViewerEvent::Message { level, text, .. } if level == "warn" && text.contains("navigation ignored")
        ))
        .count();
    assert_eq!(ignored, 3);
}

#[test]
fn test_malformed_fragment_still_loads() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(12)));
    let (mut viewer, _) = viewer(files, options());
    viewer.load_document("ch.xhtml#f=epubcfi(/6/x)").unwrap();
    assert_eq!(viewer.documents().len(), 1);
    assert_eq!(viewer.current_page().unwrap(), 0);
}

#[test]
fn test_fragment_restores_the_reading_position() {
    let make = || Files::new().with("ch.xhtml", chapter(&paragraphs(12)));
    let (mut first, _) = viewer(make(), options());
    first.load_document("ch.xhtml").unwrap();
    let _ = first.navigate(Target::Url("#p8".to_string())).unwrap();
    let fragment = first.fragment().unwrap();
    assert!(fragment.starts_with("f=epubcfi("));

    let (mut second, _) = viewer(make(), options());
    second.load_document(&format!("ch.xhtml#{fragment}")).unwrap();
    assert_eq!(second.current_page().unwrap(), 1);
    assert_eq!(second.current_cfi(), first.current_cfi());
    assert_eq!(second.set_fragment("chapter-2").unwrap(), None);
}

#[test]
fn test_spreads_and_zoom() {
    let files = Files::new().with("ch.xhtml", chapter(&paragraphs(20)));
    let options = ViewerOptions {
        spread_view: true,
        viewport: Viewport {
            width: 800.0,
            height: 100.0,
            ..Viewport::default()
        },
        ..ViewerOptions::default()
    };
    let (mut viewer, _) = viewer(files, options);
    viewer.load_document("ch.xhtml").unwrap();

    assert_eq!(viewer.page_progression(), PageProgression::Ltr);
    assert_eq!(viewer.current_spread().unwrap(), Spread {
        left: None,
        right: Some(0),
    });
    assert_eq!(viewer.navigate(Target::Next).unwrap(), 1);
    assert_eq!(viewer.current_spread().unwrap(), Spread {
        left: Some(1),
        right: Some(2),
    });
    assert_eq!(viewer.navigate(Target::Next).unwrap(), 3);
    assert_eq!(viewer.navigate(Target::Previous).unwrap(), 2);
    assert!((viewer.query_zoom_factor(ZoomType::FitInsideViewport) - 1.0).abs() < f32::EPSILON);
}

#[test]
fn test_page_size_rules_set_the_zoom() {
    let files = Files::new().with(
        "ch.xhtml",
        chapter_with(&["page.css"], &paragraphs(3)),
    )
    .with("page.css", "@page { size: 200px 50px; margin: 0 }");
    let (mut viewer, _) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    viewer.run_until_idle();
    assert!((viewer.query_zoom_factor(ZoomType::FitInsideViewport) - 2.0).abs() < f32::EPSILON);
}

#[test]
fn test_rtl_documents_progress_right_to_left() {
    let files = Files::new().with(
        "ch.xhtml",
        chapter_with(&["rtl.css"], &paragraphs(6)),
    )
    .with("rtl.css", "html { direction: rtl }");
    let (mut viewer, _) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    assert_eq!(viewer.page_progression(), PageProgression::Rtl);
    assert_eq!(viewer.page(0).unwrap().side, PageSide::Left);
}

#[test]
fn test_load_failures() {
    let files = Files::new().with("bad.xhtml", "<html><body><p></body></html>");
    let (mut viewer, _) = viewer(files, options());
    assert!(matches!(viewer.load_document("gone.xhtml"), Err(ViewerError::Fetch(_))));
    assert!(matches!(viewer.load_document("bad.xhtml"), Err(ViewerError::Parse { .. })));
    assert!(viewer.documents().is_empty());
}

#[test]
fn test_options_change_restyles() {
    let files = Files::new().with(
        "ch.xhtml",
        r#"<html><head><title>t</title></head><body><p>one</p><p>two</p><p>three</p><p>four</p></body></html>"#,
    );
    let (mut viewer, _) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    let small = viewer.page_count().unwrap();

    let mut bigger = viewer.options().clone();
    bigger.font_size = 40.0;
    viewer.set_options(bigger);
    viewer.run_until_idle();
    assert!(viewer.page_count().unwrap() > small);
}

#[test]
fn test_missing_images_are_warnings() {
    let files = Files::new().with("ch.xhtml", chapter(r#"<p><img src="gone.png"/>text</p>"#));
    let (mut viewer, events) = viewer(files, options());
    viewer.load_document("ch.xhtml").unwrap();
    viewer.run_until_idle();
    assert_eq!(viewer.page_count().unwrap(), 1);
    let events = events.borrow();
    assert_eq!(count(&events, "error"), 0);
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::Message { component, text, .. } if component == "Image" && text.contains("gone.png")
    )));
}

#[test]
fn test_epub_spine_loads_from_the_archive() {
    let container = r#"<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="OEBPS/book.opf"/></rootfiles></container>"#;
    let opf = r#"<package xmlns="http://www.idpf.org/2007/opf"><metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Two Chapters</dc:title></metadata><manifest><item id="a" href="text/a.xhtml"/><item id="b" href="text/b.xhtml"/></manifest><spine><itemref idref="a"/><itemref idref="lost"/><itemref idref="b"/></spine></package>"#;
    let book = epub(&[
        ("mimetype", "application/epub+zip".to_string()),
        ("META-INF/container.xml", container.to_string()),
        ("OEBPS/book.opf", opf.to_string()),
        ("OEBPS/text/style.css", CSS.to_string()),
        ("OEBPS/text/a.xhtml", chapter(&paragraphs(12))),
        ("OEBPS/text/b.xhtml", chapter(&paragraphs(2))),
    ]);
    let files = Files::new().with("book.epub", book).with("broken.epub", "not a zip");
    let (mut viewer, events) = viewer(files, options());

    let package = viewer.load_epub("book.epub").unwrap();
    assert_eq!(package.title.as_deref(), Some("Two Chapters"));
    assert_eq!(package.spine, vec!["OEBPS/text/a.xhtml", "OEBPS/text/b.xhtml"]);
    viewer.run_until_idle();
    assert_eq!(viewer.page_count().unwrap(), 4);

    assert_eq!(viewer.navigate_to_internal_url("b.xhtml#p1").unwrap(), 3);
    assert!(viewer.current_cfi().unwrap().starts_with("epubcfi(/6/4!"));

    {
        let events = events.borrow();
        assert_eq!(count(&events, "loaded"), 2);
        assert!(events.iter().any(|e| matches!(
            e,
            ViewerEvent::Message { level, text, .. } if level == "warn" && text.contains("lost")
        )));
    }

    assert!(matches!(viewer.load_epub("broken.epub"), Err(ViewerError::Epub { .. })));
    assert!(matches!(viewer.load_epub("missing.epub"), Err(ViewerError::Fetch(_))));
}
