//! XHTML loading on top of `quick-xml`.
//!
//! Content documents in a paginated publication are XHTML, so the loader is a
//! namespace-aware XML reader rather than an HTML5 tree builder. Element names
//! in the XHTML namespace are lowercased; prefixed attributes keep their
//! qualified name so selectors can match `epub|type` and `[epub:type]`.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

use crate::{DomTree, ElementData, NodeId, NodeType};

/// The XHTML namespace URI.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Errors raised while building a tree from markup.
#[derive(Debug, Error)]
pub enum DomError {
    /// The reader rejected the input.
    #[error("XML error at byte {position}: {message}")]
    Syntax {
        /// Byte offset into the input.
        position: u64,
        /// Reader diagnostic.
        message: String,
    },
    /// An end tag did not match the open element.
    #[error("mismatched end tag </{found}> at byte {position}, expected </{expected}>")]
    MismatchedEnd {
        /// Byte offset into the input.
        position: u64,
        /// Name of the open element.
        expected: String,
        /// Name found in the end tag.
        found: String,
    },
    /// Input ended with elements still open.
    #[error("unexpected end of input inside <{0}>")]
    UnclosedElement(String),
    /// The document had no root element.
    #[error("document has no root element")]
    NoRootElement,
}

/// A namespace declaration in scope.
struct Binding {
    prefix: String,
    uri: String,
}

/// One open element plus the bindings it introduced.
struct Open {
    node: NodeId,
    qname: String,
    bindings: usize,
}

/// Parse XHTML (or any well-formed XML) into a [`DomTree`].
///
/// Comments are kept, processing instructions and the doctype are dropped.
/// Whitespace-only text is preserved; collapsing it is a styling decision.
///
/// # Errors
///
/// Returns [`DomError`] when the markup is not well-formed.
pub fn parse_xhtml(input: &str) -> Result<DomTree, DomError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut tree = DomTree::new();
    let mut open: Vec<Open> = Vec::new();
    let mut scope: Vec<Binding> = vec![Binding {
        prefix: "xml".to_string(),
        uri: "http://www.w3.org/XML/1998/namespace".to_string(),
    }];
    let mut entity = String::with_capacity(16);

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|err| DomError::Syntax {
            position,
            message: err.to_string(),
        })?;
        let parent = open.last().map_or(NodeId::ROOT, |o| o.node);
        match event {
            Event::Start(start) => {
                let (data, qname, bindings) = element_from_start(&start, &mut scope, position)?;
                let node = tree.append_element(parent, data);
                open.push(Open {
                    node,
                    qname,
                    bindings,
                });
            }
            Event::Empty(start) => {
                let (data, _, bindings) = element_from_start(&start, &mut scope, position)?;
                let _ = tree.append_element(parent, data);
                scope.truncate(scope.len() - bindings);
            }
            Event::End(end) => {
                let found = decode(end.name().as_ref(), position)?.into_owned();
                let Some(top) = open.pop() else {
                    return Err(DomError::MismatchedEnd {
                        position,
                        expected: String::new(),
                        found,
                    });
                };
                if top.qname != found {
                    return Err(DomError::MismatchedEnd {
                        position,
                        expected: top.qname,
                        found,
                    });
                }
                scope.truncate(scope.len() - top.bindings);
            }
            Event::Text(text) => {
                let text = text.decode().map_err(|err| DomError::Syntax {
                    position,
                    message: err.to_string(),
                })?;
                push_text(&mut tree, parent, &text);
            }
            Event::CData(data) => {
                let text = decode(&data, position)?;
                push_text(&mut tree, parent, &text);
            }
            Event::GeneralRef(reference) => {
                let name = reference.decode().map_err(|err| DomError::Syntax {
                    position,
                    message: err.to_string(),
                })?;
                entity.clear();
                entity.push('&');
                entity.push_str(&name);
                entity.push(';');
                let resolved = quick_xml::escape::unescape(&entity)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| html_entity(&name).unwrap_or_default());
                push_text(&mut tree, parent, &resolved);
            }
            Event::Comment(comment) => {
                let text = decode(&comment, position)?.into_owned();
                let node = tree.alloc(NodeType::Comment(text));
                tree.append_child(parent, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(top) = open.pop() {
        return Err(DomError::UnclosedElement(top.qname));
    }
    if tree.document_element().is_none() {
        return Err(DomError::NoRootElement);
    }
    Ok(tree)
}

fn decode(raw: &[u8], position: u64) -> Result<Cow<'_, str>, DomError> {
    std::str::from_utf8(raw)
        .map(Cow::Borrowed)
        .map_err(|err| DomError::Syntax {
            position,
            message: err.to_string(),
        })
}

/// Merge with a preceding text sibling so entity references don't split runs.
fn push_text(tree: &mut DomTree, parent: NodeId, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = tree.children(parent).last().copied()
        && tree.as_text(last).is_some()
    {
        if let Some(node) = tree.nodes.get_mut(last.0)
            && let NodeType::Text(existing) = &mut node.node_type
        {
            existing.push_str(text);
        }
        return;
    }
    let _ = tree.append_text(parent, text);
}

/// The few HTML named entities XHTML documents use without a DTD.
fn html_entity(name: &str) -> Option<String> {
    let ch = match name {
        "nbsp" => '\u{a0}',
        "shy" => '\u{ad}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "copy" => '\u{a9}',
        "zwj" => '\u{200d}',
        "zwnj" => '\u{200c}',
        _ => return None,
    };
    Some(ch.to_string())
}

fn element_from_start(
    start: &BytesStart<'_>,
    scope: &mut Vec<Binding>,
    position: u64,
) -> Result<(ElementData, String, usize), DomError> {
    let qname = decode(start.name().as_ref(), position)?.into_owned();
    let mut attrs = Vec::new();
    let mut bindings = 0;

    for attr in start.attributes() {
        let attr = attr.map_err(|err| DomError::Syntax {
            position,
            message: err.to_string(),
        })?;
        let key = decode(attr.key.as_ref(), position)?.into_owned();
        let raw = decode(&attr.value, position)?;
        let value = quick_xml::escape::unescape(&raw)
            .map_or_else(|_| raw.to_string(), Cow::into_owned);

        if key == "xmlns" {
            scope.push(Binding {
                prefix: String::new(),
                uri: value,
            });
            bindings += 1;
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.push(Binding {
                prefix: prefix.to_string(),
                uri: value,
            });
            bindings += 1;
        } else {
            attrs.push((key, value));
        }
    }

    let (prefix, local) = qname.split_once(':').unwrap_or(("", qname.as_str()));
    let namespace = scope
        .iter()
        .rev()
        .find(|b| b.prefix == prefix)
        .map(|b| b.uri.clone())
        .filter(|uri| !uri.is_empty());
    let tag_name = if namespace.as_deref() == Some(XHTML_NAMESPACE) || namespace.is_none() {
        local.to_ascii_lowercase()
    } else {
        local.to_string()
    };

    let mut data = ElementData {
        tag_name,
        namespace,
        ..ElementData::default()
    };
    for (key, value) in attrs {
        let _ = data.attrs.insert(key, value);
    }
    Ok((data, qname, bindings))
}
