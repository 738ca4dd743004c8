//! URL resolution for spine items, stylesheets and images.
//!
//! [URL Standard](https://url.spec.whatwg.org/)
//!
//! Documents are loaded from `http(s):` URLs, `file:` URLs or plain file
//! paths, and everything they link to resolves against them the same way.

use std::fmt::Write;

/// The part of `href` before any `#fragment`, and the fragment itself.
#[must_use]
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    href.split_once('#')
        .map_or((href, None), |(base, fragment)| (base, Some(fragment)))
}

/// `href` carries a scheme and resolves on its own.
#[must_use]
pub fn is_absolute(href: &str) -> bool {
    // [URL Standard § 4.3](https://url.spec.whatwg.org/#url-parsing)
    // "An absolute-URL string is a URL-scheme string, followed by U+003A (:),
    // followed by a scheme-specific part."
    href.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// [§ 2.5 URLs](https://html.spec.whatwg.org/multipage/urls-and-fetching.html#resolving-urls)
///
/// Resolve a potentially relative URL against a base URL or file path.
///
/// STEP 1: "If url is an absolute URL, return url."
///
/// STEP 2: "Otherwise, resolve url relative to base."
#[must_use]
pub fn resolve_url(href: &str, base_url: Option<&str>) -> String {
    // STEP 1
    if is_absolute(href) {
        return href.to_string();
    }
    let Some(base) = base_url else {
        return href.to_string();
    };
    let base = split_fragment(base).0;
    if href.is_empty() {
        return base.to_string();
    }
    if href.starts_with('#') {
        return format!("{base}{href}");
    }

    // STEP 2: Split the base into the part that never changes (scheme and
    // authority) and the path.
    let (prefix, path) = match base.find("://") {
        Some(scheme_end) => {
            let after = &base[scheme_end + 3..];
            let path_start = after.find('/').map_or(base.len(), |i| scheme_end + 3 + i);
            base.split_at(path_start)
        }
        None => ("", base),
    };
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = base.split_once(':').map_or("http", |(scheme, _)| scheme);
        return format!("{scheme}://{rest}");
    }

    let joined = if href.starts_with('/') {
        href.to_string()
    } else {
        match path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{href}"),
            None => href.to_string(),
        }
    };
    format!("{prefix}{}", remove_dot_segments(&joined))
}

/// [RFC 3986 § 5.2.4](https://www.rfc-editor.org/rfc/rfc3986#section-5.2.4)
///
/// "Remove Dot Segments" from a path, keeping a leading `/`.
fn remove_dot_segments(path: &str) -> String {
    let (path, suffix) = match path.find(['?', '#']) {
        Some(i) => path.split_at(i),
        None => (path, ""),
    };
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    let _ = out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            "" if i + 1 < segments.len() => {}
            s => out.push(s),
        }
    }
    let trailing = matches!(segments.last(), Some(&"." | &".."));
    let mut joined = out.join("/");
    if trailing && !joined.is_empty() {
        joined.push('/');
    }
    if absolute {
        format!("/{joined}{suffix}")
    } else {
        format!("{joined}{suffix}")
    }
}

/// [URL Standard § 1.3](https://url.spec.whatwg.org/#percent-decode)
#[must_use]
pub fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (bytes[i], hex) {
            (b'%', Some(byte)) => {
                out.push(byte);
                i += 3;
            }
            (byte, _) => {
                out.push(byte);
                i += 1;
            }
        }
    }
    out
}

/// [URL Standard § 1.3](https://url.spec.whatwg.org/#fragment-percent-encode-set)
///
/// Percent-encode `input` for use in a fragment. `%` and `#` are encoded too,
/// so [`percent_decode`] gives the input back.
#[must_use]
pub fn percent_encode_fragment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        if byte <= b' ' || byte >= 0x7F || matches!(byte, b'"' | b'<' | b'>' | b'`' | b'%' | b'#') {
            let _ = write!(out, "%{byte:02X}");
        } else {
            out.push(char::from(byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_against_the_base_directory() {
        assert_eq!(resolve_url("style.css", Some("book/ch1.xhtml")), "book/style.css");
        assert_eq!(resolve_url("../img/a.png", Some("book/text/ch1.xhtml")), "book/img/a.png");
        assert_eq!(resolve_url("./b.xhtml#n1", Some("/srv/a.xhtml")), "/srv/b.xhtml#n1");
        assert_eq!(resolve_url("a.css", None), "a.css");
    }

    #[test]
    fn test_urls_keep_scheme_and_host() {
        assert_eq!(
            resolve_url("../s.css", Some("https://example.com/book/text/c.xhtml")),
            "https://example.com/book/s.css"
        );
        assert_eq!(resolve_url("/s.css", Some("https://example.com/book/c.xhtml")), "https://example.com/s.css");
        assert_eq!(resolve_url("//cdn.example/x", Some("https://example.com/")), "https://cdn.example/x");
        assert_eq!(resolve_url("data:text/css,p{}", Some("a/b.xhtml")), "data:text/css,p{}");
    }

    #[test]
    fn test_fragment_only_reference() {
        assert_eq!(resolve_url("#note", Some("ch1.xhtml#old")), "ch1.xhtml#note");
        assert_eq!(split_fragment("ch1.xhtml#p3"), ("ch1.xhtml", Some("p3")));
        assert!(!is_absolute("c:"));
    }

    #[test]
    fn test_fragment_encoding_round_trips() {
        let text = "epubcfi(/6/4!/4[a b]/1:0) 100% #é";
        let encoded = percent_encode_fragment(text);
        assert!(!encoded.contains(' ') && !encoded.contains('#'));
        assert_eq!(String::from_utf8(percent_decode(&encoded)).unwrap(), text);
    }
}
