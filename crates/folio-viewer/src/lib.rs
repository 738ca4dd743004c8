//! Page iterator and viewer façade for the Folio pagination engine.
//!
//! # Scope
//!
//! This crate provides:
//! - **Document Loading** - fetch XHTML spine items, or a whole EPUB, with
//!   their stylesheets and images
//! - **Pagination** - pages produced in order by cooperative tasks, committed
//!   only while their generation is current
//! - **Navigation** - by page, [EPage](epage), [CFI](cfi), or link
//! - **Resize** - relayout for a new viewport, keeping the style context and
//!   the reading position
//! - **Events** - `loaded`, `nav`, `hyperlink`, `error`, `resizestart`,
//!   `resizeend` and engine messages, delivered to registered listeners

/// [EPUB CFI](https://idpf.org/epub/linking/cfi/epub-cfi.html) parsing, serialization and resolution.
pub mod cfi;
/// Viewer options.
pub mod config;
/// Loaded content documents.
pub mod document;
/// Character offsets and EPages.
pub mod epage;
/// EPUB containers.
pub mod epub;
/// Public API errors.
pub mod error;
/// Events reported to the host.
pub mod events;
/// Committed pages of one document.
pub mod paginator;
/// Resource fetching and image sizes.
pub mod resources;
/// Cooperative task queue with generation tokens.
pub mod scheduler;
/// The viewer façade.
pub mod viewer;

pub use cfi::{Cfi, CfiError};
pub use config::{Margins, ViewerOptions, Viewport};
pub use document::Document;
pub use epage::{EPAGE_CHARS, TextIndex};
pub use epub::{EpubArchive, EpubError, Package};
pub use error::ViewerError;
pub use events::{Listener, ViewerEvent};
pub use resources::{Fetcher, ImageSizes, NetFetcher};
pub use scheduler::GenerationToken;
pub use viewer::{PageProgression, Spread, Target, Viewer, ViewerHandle, ZoomType};

pub use folio_css as css;
pub use folio_dom as dom;
