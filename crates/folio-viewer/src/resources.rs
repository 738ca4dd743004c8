//! Resource fetching and image sizing.
//!
//! [§ 4.8.3 The img element](https://html.spec.whatwg.org/multipage/embedded-content.html#the-img-element)
//!
//! Layout only needs the intrinsic size of an image, never its pixels:
//!
//! 1. **Fetch** - a [`Fetcher`] turns a URL into bytes. [`NetFetcher`] goes
//!    to the network or the file system; tests plug in their own.
//! 2. **Detect** - [`detect_format()`] tells SVG from raster images.
//! 3. **Measure** - raster headers are read with the `image` crate, SVG
//!    sizes come from the root element's attributes.
//!
//! Sizes end up in [`ImageSizes`], which the box builder consults through
//! [`ResourceSizes`].

use std::collections::HashMap;
use std::io::Cursor;

use folio_common::FetchError;
use folio_css::ResourceSizes;
use folio_dom::{DomTree, parse_xhtml};

/// Loads resources for the viewer.
pub trait Fetcher {
    /// Bytes of the resource at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the resource cannot be loaded.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// The resource at `url` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the resource cannot be loaded or is
    /// not text.
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.fetch(url)?;
        String::from_utf8(bytes).map_err(|_| FetchError::NotText(url.to_string()))
    }
}

/// Fetches `http(s):`, `data:` and `file:` URLs and plain paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetFetcher;

impl Fetcher for NetFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        folio_common::fetch_bytes(url)
    }
}

/// Detected image format.
///
/// The `image` crate tells raster formats apart on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// SVG vector image.
    Svg,
    /// Raster image (PNG, JPEG, GIF, WebP, ...).
    Raster,
}

/// Strip query string (`?…`) and fragment identifier (`#…`) from a URL so
/// that the remaining path can be checked for a file extension.
///
/// [URL Standard § 4.1](https://url.spec.whatwg.org/#concept-url-path)
#[must_use]
pub fn strip_url_decorations(resolved: &str) -> &str {
    let without_fragment = resolved.split_once('#').map_or(resolved, |(b, _)| b);
    without_fragment
        .split_once('?')
        .map_or(without_fragment, |(b, _)| b)
}

/// Detect whether `bytes` hold an SVG or a raster image, from the URL's
/// extension, a `data:image/svg` MIME type, or the first bytes.
#[must_use]
pub fn detect_format(url: &str, bytes: &[u8]) -> ImageFormat {
    if std::path::Path::new(strip_url_decorations(url))
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
        || url.starts_with("data:image/svg")
    {
        return ImageFormat::Svg;
    }
    let head: Vec<u8> = bytes
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(256)
        .copied()
        .collect();
    if head.starts_with(b"<?xml") || head.starts_with(b"<svg") {
        ImageFormat::Svg
    } else {
        ImageFormat::Raster
    }
}

/// Intrinsic size of encoded image data, or a reason it has none.
///
/// # Errors
///
/// Returns a message when the data is neither a readable raster image nor
/// an SVG with a usable size.
pub fn measure_image(url: &str, bytes: &[u8]) -> Result<(f32, f32), String> {
    match detect_format(url, bytes) {
        ImageFormat::Raster => {
            let (width, height) = image::ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| format!("could not read image header ({e})"))?
                .into_dimensions()
                .map_err(|e| format!("could not decode image ({e})"))?;
            Ok((width as f32, height as f32))
        }
        ImageFormat::Svg => svg_size(bytes),
    }
}

/// [SVG 2 § 8.2](https://www.w3.org/TR/SVG2/coords.html#ViewBoxAttribute)
///
/// `width`/`height` of the root element in px, falling back to the
/// `viewBox` extent.
fn svg_size(bytes: &[u8]) -> Result<(f32, f32), String> {
    let text = std::str::from_utf8(bytes).map_err(|_| "SVG is not UTF-8".to_string())?;
    let tree = parse_xhtml(text).map_err(|e| format!("failed to parse SVG: {e}"))?;
    let root = tree
        .document_element()
        .and_then(|root| tree.as_element(root))
        .ok_or_else(|| "SVG has no root element".to_string())?;
    let length = |name: &str| {
        root.attr(name)
            .map(|v| v.trim().trim_end_matches("px"))
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
    };
    let view_box: Option<(f32, f32)> = root.attr("viewBox").and_then(|v| {
        let numbers: Vec<f32> = v
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        match numbers.as_slice() {
            [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
            _ => None,
        }
    });
    match (length("width"), length("height"), view_box) {
        (Some(w), Some(h), _) => Ok((w, h)),
        (Some(w), None, Some((vw, vh))) => Ok((w, w * vh / vw)),
        (None, Some(h), Some((vw, vh))) => Ok((h * vw / vh, h)),
        (None, None, Some(size)) => Ok(size),
        _ => Err("SVG has zero-size dimensions".to_string()),
    }
}

/// `src` of every image in the document, in document order and without
/// duplicates.
#[must_use]
pub fn image_sources(tree: &DomTree) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for node in tree.descendants(tree.root()) {
        let Some(element) = tree.as_element(node) else {
            continue;
        };
        if !element.tag_name.eq_ignore_ascii_case("img") {
            continue;
        }
        if let Some(src) = element.attr("src").map(str::trim)
            && !src.is_empty()
            && !sources.iter().any(|s| s == src)
        {
            sources.push(src.to_string());
        }
    }
    sources
}

/// Intrinsic image sizes of one document, keyed by the `src` attribute as
/// written.
#[derive(Debug, Clone, Default)]
pub struct ImageSizes {
    sizes: HashMap<String, Option<(f32, f32)>>,
}

impl ImageSizes {
    /// No images known yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of loading `src`. `None` marks an image that
    /// failed, so it is not fetched again.
    pub fn insert(&mut self, src: &str, size: Option<(f32, f32)>) {
        let _ = self.sizes.insert(src.to_string(), size);
    }

    /// `src` has been loaded or has failed.
    #[must_use]
    pub fn is_settled(&self, src: &str) -> bool {
        self.sizes.contains_key(src)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.sizes.clear();
    }
}

impl ResourceSizes for ImageSizes {
    fn image_size(&self, src: &str) -> Option<(f32, f32)> {
        self.sizes.get(src.trim()).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 3x2 PNG.
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0x12,
        0x16, 0xF1, 0x4D, 0x00, 0x00, 0x00, 0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
        0xCF, 0xC0, 0x00, 0x41, 0x0C, 0x70, 0x16, 0x00, 0x41, 0xD2, 0x05, 0xFB, 0x87, 0xF0, 0xB9,
        0x48, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("a/b.SVG?x=1", b""), ImageFormat::Svg);
        assert_eq!(detect_format("data:image/svg+xml,<svg/>", b""), ImageFormat::Svg);
        assert_eq!(detect_format("x", b"  <svg xmlns='x'/>"), ImageFormat::Svg);
        assert_eq!(detect_format("x.png", PNG), ImageFormat::Raster);
    }

    #[test]
    fn test_png_header_gives_size() {
        assert_eq!(measure_image("x.png", PNG), Ok((3.0, 2.0)));
        assert!(measure_image("x.png", b"not an image").is_err());
    }

    #[test]
    fn test_svg_size_from_view_box() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="200" viewBox="0 0 100 50"/>"#;
        assert_eq!(measure_image("a.svg", svg), Ok((200.0, 100.0)));
    }

    #[test]
    fn test_sources_are_unique() {
        let tree = parse_xhtml(r#"<html><body><img src="a.png"/><p><img src=" a.png"/><img src="b.svg"/></p></body></html>"#).unwrap();
        assert_eq!(image_sources(&tree), vec!["a.png".to_string(), "b.svg".to_string()]);
        let mut sizes = ImageSizes::new();
        sizes.insert("a.png", Some((4.0, 3.0)));
        sizes.insert("b.svg", None);
        assert_eq!(sizes.image_size("a.png"), Some((4.0, 3.0)));
        assert!(sizes.is_settled("b.svg"));
        assert_eq!(sizes.image_size("b.svg"), None);
    }
}
