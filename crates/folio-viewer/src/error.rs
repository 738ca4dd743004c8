//! Errors of the viewer's public API.

use folio_common::FetchError;
use folio_css::LayoutError;
use folio_dom::DomError;
use thiserror::Error;

use crate::epub::EpubError;

/// Misuse of the viewer API, or a document that cannot be loaded at all.
///
/// Problems inside a document (bad CSS, unresolvable references) are not
/// errors; they degrade and are reported as messages.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// No document has been loaded.
    #[error("no document loaded")]
    NoDocument,
    /// A page index past the last page.
    #[error("page {index} out of range ({count} pages)")]
    PageOutOfRange {
        /// Requested 0-based page.
        index: usize,
        /// Pages in the spine.
        count: usize,
    },
    /// The options JSON does not parse.
    #[error("invalid viewer options: {0}")]
    Options(#[from] serde_json::Error),
    /// A document could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A document is not well-formed.
    #[error("cannot parse {url}: {source}")]
    Parse {
        /// Document URL.
        url: String,
        /// Parser error.
        #[source]
        source: DomError,
    },
    /// An EPUB container or its package document is unusable.
    #[error("cannot open {url}: {source}")]
    Epub {
        /// Book URL.
        url: String,
        /// What went wrong.
        #[source]
        source: EpubError,
    },
    /// A page task failed.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}
