//! Folio CLI
//!
//! Paginates XHTML documents or an EPUB and prints its pages as text or JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use folio_viewer::{Target, Viewer, ViewerEvent, ViewerOptions, ZoomType};

/// Folio - paginate XHTML documents with CSS fragmentation
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Print every page of a chapter
    folio chapter.xhtml

    # A small page with an extra stylesheet
    folio --width 400 --height 300 --css extra.css chapter.xhtml

    # Options from a file, as the host would pass them
    folio --options viewer.json chapter.xhtml

    # Spine of several documents, as JSON
    folio --json ch1.xhtml ch2.xhtml

    # A whole book
    folio book.epub

    # Show the page holding a CFI
    folio --cfi 'epubcfi(/6/4!/4/10/1:0)' ch1.xhtml ch2.xhtml
"#)]
struct Cli {
    /// Documents of the spine, in reading order, or a single EPUB
    #[arg(value_name = "FILE|URL", required = true)]
    files: Vec<String>,

    /// Extra stylesheet applied with User origin
    #[arg(long, value_name = "FILE")]
    css: Option<PathBuf>,

    /// Viewer options file, JSON with the host API's keys
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Viewport width in px
    #[arg(long)]
    width: Option<f32>,

    /// Viewport height in px
    #[arg(long)]
    height: Option<f32>,

    /// Root font size in px
    #[arg(long)]
    font_size: Option<f32>,

    /// Two pages side by side
    #[arg(long)]
    spread: bool,

    /// Only print the page holding this CFI
    #[arg(long, value_name = "CFI")]
    cfi: Option<String>,

    /// Print pages as JSON
    #[arg(long)]
    json: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = build_options(&cli)?;
    let mut viewer = Viewer::new(options);
    viewer.add_listener(Box::new(print_event));

    match cli.files.as_slice() {
        [book] if is_epub(book) => {
            let package = viewer.load_epub(book).with_context(|| format!("cannot open {book}"))?;
            if let Some(title) = &package.title {
                tracing::info!(title = %title, "opened book");
            }
        }
        files => {
            let spine: Vec<&str> = files.iter().map(String::as_str).collect();
            viewer.load_spine(&spine).context("cannot load the spine")?;
        }
    }
    viewer.run_until_idle();

    let count = viewer.page_count()?;
    let pages: Vec<usize> = match &cli.cfi {
        Some(cfi) => vec![viewer.navigate(Target::Cfi(cfi.clone()))?],
        None => (0..count).collect(),
    };

    if cli.json {
        print_json(&mut viewer, &pages, count)?;
    } else {
        print_text(&mut viewer, &pages, count)?;
    }
    Ok(())
}

fn is_epub(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// Log to stderr; `RUST_LOG` overrides the level.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Options JSON first, then the flags on top of it.
fn build_options(cli: &Cli) -> anyhow::Result<ViewerOptions> {
    let mut options = match &cli.options {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
            ViewerOptions::from_json(&json)?
        }
        None => ViewerOptions::default(),
    };
    if let Some(width) = cli.width {
        options.viewport.width = width;
    }
    if let Some(height) = cli.height {
        options.viewport.height = height;
    }
    if let Some(size) = cli.font_size {
        options.font_size = size;
    }
    if cli.spread {
        options.spread_view = true;
    }
    if let Some(path) = &cli.css {
        let css = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        options.user_style_sheet = Some(css);
    }
    Ok(options)
}

fn print_event(event: &ViewerEvent) {
    match event {
        ViewerEvent::Message { level, component, text } => {
            let tag = format!("[{level}] {component}:");
            match level.as_str() {
                "error" => eprintln!("{} {text}", tag.red()),
                "warn" => eprintln!("{} {text}", tag.yellow()),
                _ => tracing::debug!("{tag} {text}"),
            }
        }
        ViewerEvent::Error { message } => eprintln!("{} {message}", "error:".red().bold()),
        other => tracing::debug!(event = other.name(), "event"),
    }
}

fn print_text(viewer: &mut Viewer, pages: &[usize], count: usize) -> anyhow::Result<()> {
    for &index in pages {
        let page = viewer.page(index)?;
        let header = format!(
            "=== Page {} of {count} ({}, {}x{}) ===",
            index + 1,
            page.side,
            page.style.width,
            page.style.height
        );
        println!("{}", header.bold());
        if page.blank {
            println!("{}", "(blank)".dimmed());
            continue;
        }
        for (name, text) in page.margin_box_texts(index + 1, Some(count)) {
            if !text.is_empty() {
                println!("{} {text}", format!("[{name}]").cyan());
            }
        }
        println!("{}\n", page.text());
    }
    if pages.len() == 1 {
        print_position(viewer);
    }
    Ok(())
}

fn print_position(viewer: &Viewer) {
    if let Some(cfi) = viewer.current_cfi() {
        println!("{} {cfi}", "cfi:".green());
    }
    if let Some(epage) = viewer.current_epage() {
        println!("{} {epage:.2} of {:.2}", "epage:".green(), viewer.epage_count());
    }
    println!(
        "{} {:.2}",
        "zoom:".green(),
        viewer.query_zoom_factor(ZoomType::FitInsideViewport)
    );
}

fn print_json(viewer: &mut Viewer, pages: &[usize], count: usize) -> anyhow::Result<()> {
    let mut out = Vec::with_capacity(pages.len());
    for &index in pages {
        let page = viewer.page(index)?;
        let margin_boxes: serde_json::Map<String, serde_json::Value> = page
            .margin_box_texts(index + 1, Some(count))
            .into_iter()
            .map(|(name, text)| (name.to_string(), json!(text)))
            .collect();
        out.push(json!({
            "page": index,
            "side": page.side.to_string(),
            "name": page.name,
            "width": page.style.width,
            "height": page.style.height,
            "blank": page.blank,
            "start": page.start.to_string(),
            "end": page.end.to_string(),
            "marginBoxes": margin_boxes,
            "text": page.text(),
        }));
    }
    let doc = json!({
        "pageCount": count,
        "epageCount": viewer.epage_count(),
        "cfi": viewer.current_cfi(),
        "pages": out,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
