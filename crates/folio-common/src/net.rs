//! Resource fetching.
//!
//! Provides blocking loaders for documents, stylesheets and images. A
//! resource is addressed by an `http(s):` URL, a `data:` URL, a `file:` URL
//! or a plain file path.

use std::time::Duration;

use base64::Engine;
use thiserror::Error;

use crate::url::percent_decode;

/// User-Agent header sent with all requests.
const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Why a resource could not be loaded.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request failed or returned a non-success status.
    #[error("request for {url} failed: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// What went wrong.
        message: String,
    },
    /// A local file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A `data:` URL is malformed.
    #[error("invalid data URL: {0}")]
    DataUrl(String),
    /// The resource is not valid UTF-8 text.
    #[error("{0} is not UTF-8 text")]
    NotText(String),
}

/// [RFC 2397](https://www.rfc-editor.org/rfc/rfc2397) `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl<'a> {
    /// `mediatype` with parameters, without `;base64`.
    pub media_type: &'a str,
    base64: bool,
    data: &'a str,
}

impl<'a> DataUrl<'a> {
    /// Split a `data:` URL into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DataUrl`] without a `data:` prefix or a comma.
    pub fn parse(url: &'a str) -> Result<Self, FetchError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| FetchError::DataUrl("missing data: prefix".to_string()))?;
        let (metadata, data) = rest
            .split_once(',')
            .ok_or_else(|| FetchError::DataUrl("missing comma".to_string()))?;
        let (media_type, base64) = match metadata.strip_suffix(";base64") {
            Some(media_type) => (media_type, true),
            None => (metadata, false),
        };
        Ok(Self {
            media_type,
            base64,
            data,
        })
    }

    /// Decode the payload.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DataUrl`] if base64 decoding fails.
    pub fn decode(&self) -> Result<Vec<u8>, FetchError> {
        if self.base64 {
            base64::engine::general_purpose::STANDARD
                .decode(self.data.trim())
                .map_err(|e| FetchError::DataUrl(format!("base64 decode error: {e}")))
        } else {
            Ok(percent_decode(self.data))
        }
    }
}

/// Load a resource as raw bytes.
///
/// # Errors
///
/// Returns a [`FetchError`] when the resource cannot be loaded.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    if url.starts_with("data:") {
        return DataUrl::parse(url)?.decode();
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch_http(url);
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    tracing::debug!(path, "reading file");
    std::fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_string(),
        source,
    })
}

/// Load a resource as UTF-8 text.
///
/// # Errors
///
/// Returns a [`FetchError`] when the resource cannot be loaded or is not
/// text.
pub fn fetch_text(url: &str) -> Result<String, FetchError> {
    let bytes = fetch_bytes(url)?;
    String::from_utf8(bytes).map_err(|_| FetchError::NotText(url.to_string()))
}

fn fetch_http(url: &str) -> Result<Vec<u8>, FetchError> {
    let http = |message: String| FetchError::Http {
        url: url.to_string(),
        message,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(TIMEOUT)
        .build()
        .map_err(|e| http(format!("cannot create HTTP client: {e}")))?;
    tracing::debug!(url, "fetching");
    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .map_err(|e| http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(http(format!("HTTP {}", response.status())));
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| http(format!("cannot read response body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_data_url() {
        let bytes = fetch_bytes("data:text/css;base64,cCB7IH0=").unwrap();
        assert_eq!(bytes, b"p { }");
    }

    #[test]
    fn test_percent_encoded_data_url() {
        let text = fetch_text("data:text/css,p%20%7B%20color:red%20%7D").unwrap();
        assert_eq!(text, "p { color:red }");
        let url = DataUrl::parse("data:text/css;charset=utf-8,x").unwrap();
        assert_eq!(url.media_type, "text/css;charset=utf-8");
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = fetch_text("file:///definitely/not/here.css").unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(matches!(DataUrl::parse("data:nocomma"), Err(FetchError::DataUrl(_))));
    }
}
