//! EPUB containers.
//!
//! [EPUB 3.3 § 4 Open Container Format](https://www.w3.org/TR/epub-33/#sec-ocf)
//!
//! A book is a ZIP archive. `META-INF/container.xml` names the package
//! document (OPF), whose `<manifest>` maps ids to archive paths and whose
//! `<spine>` lists the content documents in reading order. The archive is
//! read into memory once and its entries are served through
//! [`ArchiveFetcher`], so spine items load their stylesheets and images the
//! same way plain documents do.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::rc::Rc;

use folio_common::{FetchError, MessageQueue, percent_decode, resolve_url};
use folio_dom::{DomError, DomTree, NodeId, parse_xhtml};
use thiserror::Error;
use zip::ZipArchive;

use crate::resources::Fetcher;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Errors raised while opening a book.
#[derive(Debug, Error)]
pub enum EpubError {
    /// The bytes are not a readable ZIP archive.
    #[error("not a ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// An entry could not be decompressed.
    #[error("cannot read {name}: {source}")]
    Read {
        /// Entry name.
        name: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A required entry is absent.
    #[error("missing {0} in the archive")]
    MissingEntry(String),
    /// An XML entry is not well-formed.
    #[error("malformed {path}: {source}")]
    Xml {
        /// Entry name.
        path: String,
        /// Parser diagnostic.
        #[source]
        source: DomError,
    },
    /// `container.xml` names no package document.
    #[error("container.xml has no rootfile")]
    NoRootfile,
}

/// What the package document says about the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Archive path of the OPF.
    pub opf_path: String,
    /// `dc:title`, when present.
    pub title: Option<String>,
    /// Archive paths of the spine items, in reading order.
    pub spine: Vec<String>,
}

/// Entries of an EPUB archive, held in memory.
#[derive(Debug, Default)]
pub struct EpubArchive {
    entries: HashMap<String, Vec<u8>>,
}

impl EpubArchive {
    /// Read every file entry of the archive in `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an [`EpubError`] when the archive or one of its entries
    /// cannot be read.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EpubError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = HashMap::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            let _ = file
                .read_to_end(&mut data)
                .map_err(|source| EpubError::Read {
                    name: name.clone(),
                    source,
                })?;
            let _ = entries.insert(name, data);
        }
        tracing::debug!(entries = entries.len(), "read EPUB archive");
        Ok(Self { entries })
    }

    /// Bytes of the entry at `path`. Percent-encoded paths, as they appear
    /// in manifest hrefs, are tried decoded too.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&[u8]> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if let Some(data) = self.entries.get(path) {
            return Some(data.as_slice());
        }
        let decoded = String::from_utf8(percent_decode(path)).ok()?;
        self.entries.get(&decoded).map(Vec::as_slice)
    }

    /// Number of file entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` for an archive without files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locate and read the package document.
    ///
    /// Spine items whose `idref` is not in the manifest are reported to
    /// `messages` and skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`EpubError`] when `container.xml` or the OPF is missing
    /// or malformed.
    pub fn package(&self, messages: &MessageQueue) -> Result<Package, EpubError> {
        let container = self.xml(CONTAINER_PATH)?;
        let opf_path = container
            .descendants(NodeId::ROOT)
            .find(|&id| local_name_is(&container, id, "rootfile"))
            .and_then(|id| container.as_element(id)?.attr("full-path"))
            .map(str::to_string)
            .ok_or(EpubError::NoRootfile)?;

        let opf = self.xml(&opf_path)?;
        let mut manifest: HashMap<&str, String> = HashMap::new();
        let mut idrefs: Vec<&str> = Vec::new();
        let mut title = None;
        for id in opf.descendants(NodeId::ROOT) {
            let Some(element) = opf.as_element(id) else {
                continue;
            };
            match local_name(&element.tag_name) {
                "item" => {
                    if let (Some(item), Some(href)) = (element.attr("id"), element.attr("href")) {
                        let _ = manifest.insert(item, resolve_url(href, Some(&opf_path)));
                    }
                }
                "itemref" => {
                    if let Some(idref) = element.attr("idref") {
                        idrefs.push(idref);
                    }
                }
                "title" if title.is_none() => {
                    let text = opf.text_content(id);
                    let text = text.trim();
                    if !text.is_empty() {
                        title = Some(text.to_string());
                    }
                }
                _ => {}
            }
        }

        let mut spine = Vec::with_capacity(idrefs.len());
        for idref in idrefs {
            match manifest.get(idref) {
                Some(href) => spine.push(href.clone()),
                None => messages.warn("EPUB", format!("spine item {idref} is not in the manifest")),
            }
        }
        tracing::debug!(opf = %opf_path, items = spine.len(), "read package document");
        Ok(Package { opf_path, title, spine })
    }

    fn xml(&self, path: &str) -> Result<DomTree, EpubError> {
        let bytes = self
            .entry(path)
            .ok_or_else(|| EpubError::MissingEntry(path.to_string()))?;
        let text = String::from_utf8_lossy(bytes);
        parse_xhtml(&text).map_err(|source| EpubError::Xml {
            path: path.to_string(),
            source,
        })
    }
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn local_name_is(tree: &DomTree, id: NodeId, name: &str) -> bool {
    tree.as_element(id)
        .is_some_and(|element| local_name(&element.tag_name) == name)
}

/// Serves archive entries first, then defers to another fetcher for
/// anything outside the book (remote stylesheets, `data:` URLs).
pub struct ArchiveFetcher {
    archive: Rc<EpubArchive>,
    fallback: Rc<dyn Fetcher>,
}

impl ArchiveFetcher {
    /// Entries of `archive`, then `fallback`.
    #[must_use]
    pub fn new(archive: Rc<EpubArchive>, fallback: Rc<dyn Fetcher>) -> Self {
        Self { archive, fallback }
    }
}

impl Fetcher for ArchiveFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match self.archive.entry(url) {
            Some(data) => Ok(data.to_vec()),
            None => self.fallback.fetch(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title> A Small Book </dc:title>
  </metadata>
  <manifest>
    <item id="c1" href="text/one.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/two%20b.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="ghost"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    struct Nothing;

    impl Fetcher for Nothing {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::DataUrl(url.to_string()))
        }
    }

    #[test]
    fn test_package_lists_the_spine_in_reading_order() {
        let bytes = archive(&[
            ("mimetype", "application/epub+zip"),
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", OPF),
        ]);
        let book = EpubArchive::from_bytes(&bytes).unwrap();
        assert_eq!(book.len(), 3);

        let messages = MessageQueue::new();
        let package = book.package(&messages).unwrap();
        assert_eq!(package.opf_path, "OEBPS/content.opf");
        assert_eq!(package.title.as_deref(), Some("A Small Book"));
        assert_eq!(package.spine, vec!["OEBPS/text/one.xhtml", "OEBPS/text/two%20b.xhtml"]);

        let warnings = messages.drain();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].text.contains("ghost"));
    }

    #[test]
    fn test_entries_are_found_by_encoded_paths() {
        let bytes = archive(&[("OEBPS/text/two b.xhtml", "<html/>")]);
        let book = EpubArchive::from_bytes(&bytes).unwrap();
        assert_eq!(book.entry("OEBPS/text/two%20b.xhtml"), Some(&b"<html/>"[..]));
        assert_eq!(book.entry("/OEBPS/text/two b.xhtml"), Some(&b"<html/>"[..]));
        assert_eq!(book.entry("OEBPS/missing.xhtml"), None);
    }

    #[test]
    fn test_missing_container_is_an_error() {
        let bytes = archive(&[("mimetype", "application/epub+zip")]);
        let book = EpubArchive::from_bytes(&bytes).unwrap();
        let err = book.package(&MessageQueue::new()).unwrap_err();
        assert!(matches!(err, EpubError::MissingEntry(path) if path == CONTAINER_PATH));
    }

    #[test]
    fn test_container_without_rootfile() {
        let bytes = archive(&[(CONTAINER_PATH, "<container><rootfiles/></container>")]);
        let book = EpubArchive::from_bytes(&bytes).unwrap();
        assert!(matches!(book.package(&MessageQueue::new()), Err(EpubError::NoRootfile)));
    }

    #[test]
    fn test_garbage_is_not_an_archive() {
        assert!(matches!(EpubArchive::from_bytes(b"not a zip"), Err(EpubError::Zip(_))));
    }

    #[test]
    fn test_archive_fetcher_falls_back_outside_the_book() {
        let bytes = archive(&[("OEBPS/style.css", "p {}")]);
        let book = Rc::new(EpubArchive::from_bytes(&bytes).unwrap());
        let fetcher = ArchiveFetcher::new(book, Rc::new(Nothing));
        assert_eq!(fetcher.fetch_text("OEBPS/style.css").unwrap(), "p {}");
        assert!(fetcher.fetch("https://example.com/a.css").is_err());
    }
}
