//! [EPUB Canonical Fragment Identifiers 1.1](https://idpf.org/epub/linking/cfi/epub-cfi.html)
//!
//! A CFI addresses a location as a path of child steps. Even steps select
//! element children (`/2` is the first element), odd steps select the text
//! between two elements (`/1` is the text before the first element). A `!`
//! follows an indirection, here from the spine to a content document.
//!
//! ```text
//! epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/3:10)
//!         ^^^^^^^^^^^^^^^^ spine item 2
//!                          ^^^^^^^^^^^^^^^^^^^^^^^^^ body, 5th element, 2nd text chunk, char 10
//! ```

use std::fmt;

use folio_common::{percent_decode, percent_encode_fragment};
use folio_css::FlowPosition;
use folio_dom::{DomTree, NodeId, NodeType};
use thiserror::Error;

/// Why a CFI could not be parsed or resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfiError {
    /// The text does not follow the CFI grammar.
    #[error("malformed CFI at byte {position}: {message}")]
    Syntax {
        /// Byte offset of the problem in the input.
        position: usize,
        /// What was expected.
        message: String,
    },
    /// A step names a child that does not exist.
    #[error("CFI step /{index} does not exist")]
    MissingStep {
        /// The step's index.
        index: u32,
    },
    /// The CFI does not name a spine item.
    #[error("CFI addresses no spine item")]
    NotInSpine,
}

/// [§ 3.1.2](https://idpf.org/epub/linking/cfi/epub-cfi.html#sec-epubcfi-escaping)
/// Characters written with a leading `^` inside assertions.
const SPECIAL: [char; 8] = ['^', '[', ']', '(', ')', ',', ';', '='];

/// Spine element step in the package document.
const SPINE_STEP: u32 = 6;

/// A bracketed assertion: comma-separated values, then `;name=value`
/// parameters. A step's assertion holds an id; a character offset's holds
/// the text around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// Values, at least one.
    pub values: Vec<String>,
    /// Parameters such as `s=b` (side bias).
    pub parameters: Vec<(String, String)>,
}

impl Assertion {
    /// An id assertion.
    #[must_use]
    pub fn id(id: &str) -> Self {
        Self {
            values: vec![id.to_string()],
            parameters: Vec::new(),
        }
    }

    /// The first value, when not empty.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// One `/n[assertion]` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Child index: even for elements, odd for text chunks.
    pub index: u32,
    /// Optional id assertion.
    pub assertion: Option<Assertion>,
}

impl Step {
    /// A step without assertion.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self { index, assertion: None }
    }
}

/// What a terminal offset measures.
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetKind {
    /// `:n`, characters into a text chunk.
    Character(u32),
    /// `~s`, seconds into a media element, optionally with a point.
    Temporal {
        /// Seconds.
        seconds: f64,
        /// `@x:y` point in percent of the media's extent.
        spatial: Option<(f64, f64)>,
    },
    /// `@x:y`, a point in percent of an image's extent.
    Spatial {
        /// Horizontal percent.
        x: f64,
        /// Vertical percent.
        y: f64,
    },
}

/// A terminal offset with its optional assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Offset {
    /// The offset.
    pub kind: OffsetKind,
    /// Text or parameters asserted at the offset.
    pub assertion: Option<Assertion>,
}

/// Steps split at `!` indirections, then an optional offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CfiPath {
    /// Step lists, one per document along the indirections.
    pub segments: Vec<Vec<Step>>,
    /// Terminal offset.
    pub offset: Option<Offset>,
}

/// A parsed `epubcfi(...)`, either a location or a range.
#[derive(Debug, Clone, PartialEq)]
pub struct Cfi {
    /// The location, or the common parent of a range.
    pub path: CfiPath,
    /// Start and end paths relative to [`Self::path`].
    pub range: Option<(CfiPath, CfiPath)>,
}

impl Cfi {
    /// Parse `epubcfi(...)`.
    ///
    /// # Errors
    ///
    /// Returns [`CfiError::Syntax`] with the byte offset of the first
    /// problem.
    pub fn parse(input: &str) -> Result<Self, CfiError> {
        let mut parser = Parser { input, pos: 0 };
        parser.expect_str("epubcfi(")?;
        let path = parser.path(false)?;
        let range = if parser.eat(',') {
            let start = parser.path(true)?;
            parser.expect(',')?;
            let end = parser.path(true)?;
            Some((start, end))
        } else {
            None
        };
        parser.expect(')')?;
        if parser.pos < input.len() {
            return Err(parser.error("trailing characters after ')'"));
        }
        Ok(Self { path, range })
    }

    /// A location CFI for `position`, inside spine item `spine` when given.
    #[must_use]
    pub fn from_position(tree: &DomTree, position: &FlowPosition, spine: Option<usize>) -> Self {
        let (steps, offset) = document_steps(tree, position);
        let mut segments = Vec::with_capacity(2);
        if let Some(spine) = spine {
            let item = u32::try_from(spine).unwrap_or(u32::MAX / 2 - 1);
            segments.push(vec![Step::new(SPINE_STEP), Step::new((item + 1) * 2)]);
        }
        segments.push(steps);
        Self {
            path: CfiPath { segments, offset },
            range: None,
        }
    }

    /// The start of the location: for a range, the parent joined with the
    /// start path.
    #[must_use]
    pub fn start(&self) -> CfiPath {
        match &self.range {
            Some((start, _)) => self.path.join(start),
            None => self.path.clone(),
        }
    }

    /// The end of a range, or the location itself.
    #[must_use]
    pub fn end(&self) -> CfiPath {
        match &self.range {
            Some((_, end)) => self.path.join(end),
            None => self.path.clone(),
        }
    }

    /// `f=<cfi>`, the URL fragment form without `#`.
    #[must_use]
    pub fn to_fragment(&self) -> String {
        format!("f={}", percent_encode_fragment(&self.to_string()))
    }

    /// Read a CFI back from a URL fragment (without `#`). `None` when the
    /// fragment is not of the `f=` form.
    #[must_use]
    pub fn from_fragment(fragment: &str) -> Option<Result<Self, CfiError>> {
        let encoded = fragment.strip_prefix("f=")?;
        let decoded = String::from_utf8_lossy(&percent_decode(encoded)).into_owned();
        Some(Self::parse(&decoded))
    }
}

impl CfiPath {
    /// Append a range's local path to this parent path.
    #[must_use]
    pub fn join(&self, local: &Self) -> Self {
        let mut segments = self.segments.clone();
        let mut rest = local.segments.iter();
        if let Some(first) = rest.next() {
            match segments.last_mut() {
                Some(last) => last.extend(first.iter().cloned()),
                None => segments.push(first.clone()),
            }
        }
        segments.extend(rest.cloned());
        Self {
            segments,
            offset: local.offset.clone(),
        }
    }

    /// 0-based spine item named by the package-document part of the path.
    #[must_use]
    pub fn spine_index(&self) -> Option<usize> {
        if self.segments.len() < 2 {
            return None;
        }
        let step = self.segments.first()?.last()?;
        (step.index >= 2 && step.index % 2 == 0).then(|| (step.index / 2 - 1) as usize)
    }

    /// Steps inside the content document.
    #[must_use]
    pub fn document_steps(&self) -> &[Step] {
        self.segments.last().map_or(&[], Vec::as_slice)
    }

    /// Resolve the content-document part of the path in `tree`.
    ///
    /// An id assertion that disagrees with the step's index wins over the
    /// index. Character offsets past the end of a text chunk are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`CfiError::MissingStep`] for a step with no matching child.
    pub fn resolve(&self, tree: &DomTree) -> Result<FlowPosition, CfiError> {
        let Some(mut node) = tree.document_element() else {
            return Ok(FlowPosition::start());
        };
        let steps = self.document_steps();
        for (i, step) in steps.iter().enumerate() {
            if step.index % 2 == 1 {
                if i + 1 != steps.len() {
                    return Err(CfiError::MissingStep { index: step.index });
                }
                let offset = match self.offset.as_ref().map(|o| &o.kind) {
                    Some(OffsetKind::Character(n)) => *n as usize,
                    _ => 0,
                };
                return chunk_position(tree, node, step.index, offset)
                    .ok_or(CfiError::MissingStep { index: step.index });
            }
            let by_index = (step.index / 2)
                .checked_sub(1)
                .and_then(|k| tree.element_children(node).nth(k as usize));
            let asserted = step
                .assertion
                .as_ref()
                .and_then(Assertion::first)
                .and_then(|id| tree.element_by_id(id));
            node = match (by_index, asserted) {
                (_, Some(target)) => target,
                (Some(child), None) => child,
                (None, None) => return Err(CfiError::MissingStep { index: step.index }),
            };
        }
        Ok(FlowPosition::before(tree, node))
    }
}

/// Position of character `offset` in the `index`-th (odd) text chunk of
/// `parent`.
fn chunk_position(tree: &DomTree, parent: NodeId, index: u32, offset: usize) -> Option<FlowPosition> {
    let wanted = ((index - 1) / 2) as usize;
    let mut seen = 0;
    let mut previous = None;
    let mut next = None;
    let mut texts: Vec<(NodeId, usize)> = Vec::new();
    for &child in tree.children(parent) {
        if tree.as_element(child).is_some() {
            if seen == wanted {
                next = Some(child);
                break;
            }
            seen += 1;
            previous = Some(child);
        } else if seen == wanted
            && let Some(text) = tree.as_text(child)
        {
            texts.push((child, text.chars().count()));
        }
    }
    if seen < wanted {
        return None;
    }
    let mut remaining = offset;
    for &(text, len) in &texts {
        if remaining < len {
            return Some(FlowPosition::in_text(tree, text, remaining));
        }
        remaining -= len;
    }
    Some(match (texts.last(), next, previous) {
        (Some(&(text, len)), _, _) => FlowPosition::in_text(tree, text, len),
        (None, Some(element), _) => FlowPosition::before(tree, element),
        (None, None, Some(element)) => FlowPosition::after(tree, element),
        (None, None, None) => FlowPosition::before(tree, parent),
    })
}

/// Steps and offset of `position` relative to the document element.
fn document_steps(tree: &DomTree, position: &FlowPosition) -> (Vec<Step>, Option<Offset>) {
    let root = tree.document_element();
    let node = position.node(tree).unwrap_or_else(|| tree.root());
    let character = |n: usize| {
        Some(Offset {
            kind: OffsetKind::Character(u32::try_from(n).unwrap_or(u32::MAX)),
            assertion: None,
        })
    };
    let parent = tree.parent(node).filter(|&p| tree.as_element(p).is_some());
    match (tree.get(node).map(|n| &n.node_type), parent) {
        (Some(NodeType::Element(_)), Some(parent)) if position.after && Some(node) != root => {
            let before = preceding_elements(tree, node) + 1;
            let mut steps = element_steps(tree, parent);
            steps.push(Step::new(before * 2 + 1));
            (steps, character(0))
        }
        (Some(NodeType::Element(_)), _) if Some(node) != root => (element_steps(tree, node), None),
        (Some(NodeType::Text(_) | NodeType::Comment(_)), Some(parent)) => {
            let mut offset = 0;
            for sibling in tree.preceding_siblings(node) {
                if tree.as_element(sibling).is_some() {
                    break;
                }
                offset += tree.as_text(sibling).map_or(0, |t| t.chars().count());
            }
            let len = tree.as_text(node).map_or(0, |t| t.chars().count());
            offset += if position.after { len } else { position.offset.min(len) };
            let mut steps = element_steps(tree, parent);
            steps.push(Step::new(preceding_elements(tree, node) * 2 + 1));
            (steps, character(offset))
        }
        _ => {
            // Document start: the body, or the first element of the root.
            let first = tree
                .body()
                .or_else(|| root.and_then(|r| tree.element_children(r).next()));
            match first {
                Some(element) => (element_steps(tree, element), None),
                None => (vec![Step::new(1)], character(0)),
            }
        }
    }
}

/// Element siblings before `node`.
fn preceding_elements(tree: &DomTree, node: NodeId) -> u32 {
    let count = tree
        .preceding_siblings(node)
        .filter(|&sibling| tree.as_element(sibling).is_some())
        .count();
    u32::try_from(count).unwrap_or(u32::MAX / 2 - 1)
}

/// Even steps from the document element down to `element`, with id
/// assertions.
fn element_steps(tree: &DomTree, element: NodeId) -> Vec<Step> {
    let root = tree.document_element();
    let mut steps = Vec::new();
    let mut current = element;
    while Some(current) != root {
        let Some(parent) = tree.parent(current) else {
            break;
        };
        steps.push(Step {
            index: (preceding_elements(tree, current) + 1) * 2,
            assertion: tree
                .as_element(current)
                .and_then(|e| e.id())
                .map(|id| Assertion::id(id)),
        });
        current = parent;
    }
    steps.reverse();
    steps
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> CfiError {
        CfiError::Syntax {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), CfiError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn expect_str(&mut self, s: &str) -> Result<(), CfiError> {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{s}'")))
        }
    }

    /// `path` or, for ranges, `local_path`.
    fn path(&mut self, local: bool) -> Result<CfiPath, CfiError> {
        let mut segments: Vec<Vec<Step>> = vec![Vec::new()];
        let mut offset = None;
        loop {
            match self.peek() {
                Some('/') => {
                    let step = self.step()?;
                    if let Some(segment) = segments.last_mut() {
                        segment.push(step);
                    }
                }
                Some('!') => {
                    if segments.last().is_some_and(Vec::is_empty) && (segments.len() > 1 || !local) {
                        return Err(self.error("expected a step before '!'"));
                    }
                    self.pos += 1;
                    segments.push(Vec::new());
                }
                Some(':' | '~' | '@') => {
                    offset = Some(self.offset()?);
                    break;
                }
                _ => break,
            }
        }
        if !local && segments.first().is_some_and(Vec::is_empty) {
            return Err(self.error("expected '/'"));
        }
        if segments.len() > 1 && segments.last().is_some_and(Vec::is_empty) && offset.is_none() {
            return Err(self.error("expected a step or offset after '!'"));
        }
        Ok(CfiPath { segments, offset })
    }

    fn step(&mut self) -> Result<Step, CfiError> {
        self.expect('/')?;
        let index = self.integer()?;
        let assertion = if self.peek() == Some('[') {
            Some(self.assertion()?)
        } else {
            None
        };
        Ok(Step { index, assertion })
    }

    fn offset(&mut self) -> Result<Offset, CfiError> {
        let kind = match self.bump() {
            Some(':') => OffsetKind::Character(self.integer()?),
            Some('~') => {
                let seconds = self.number()?;
                let spatial = if self.eat('@') { Some(self.point()?) } else { None };
                OffsetKind::Temporal { seconds, spatial }
            }
            Some('@') => {
                let (x, y) = self.point()?;
                OffsetKind::Spatial { x, y }
            }
            _ => return Err(self.error("expected an offset")),
        };
        let assertion = if self.peek() == Some('[') {
            Some(self.assertion()?)
        } else {
            None
        };
        Ok(Offset { kind, assertion })
    }

    fn point(&mut self) -> Result<(f64, f64), CfiError> {
        let x = self.number()?;
        self.expect(':')?;
        let y = self.number()?;
        Ok((x, y))
    }

    fn digits(&mut self) -> &str {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn integer(&mut self) -> Result<u32, CfiError> {
        let start = self.pos;
        let digits = self.digits();
        if digits.is_empty() {
            return Err(self.error("expected an integer"));
        }
        digits.parse().map_err(|_| CfiError::Syntax {
            position: start,
            message: "integer out of range".to_string(),
        })
    }

    fn number(&mut self) -> Result<f64, CfiError> {
        let start = self.pos;
        if self.digits().is_empty() {
            return Err(self.error("expected a number"));
        }
        if self.eat('.') && self.digits().is_empty() {
            return Err(self.error("expected digits after '.'"));
        }
        self.input[start..self.pos].parse().map_err(|_| CfiError::Syntax {
            position: start,
            message: "invalid number".to_string(),
        })
    }

    /// `[values;name=value]` with `^` escapes.
    fn assertion(&mut self) -> Result<Assertion, CfiError> {
        self.expect('[')?;
        let mut values = vec![String::new()];
        let mut parameters: Vec<(String, String)> = Vec::new();
        let mut in_name = false;
        loop {
            let c = match self.bump() {
                None => return Err(self.error("unterminated assertion")),
                Some(']') => break,
                Some('^') => self.bump().ok_or_else(|| self.error("dangling '^'"))?,
                Some(',') if parameters.is_empty() => {
                    values.push(String::new());
                    continue;
                }
                Some(';') => {
                    parameters.push((String::new(), String::new()));
                    in_name = true;
                    continue;
                }
                Some('=') if in_name => {
                    in_name = false;
                    continue;
                }
                Some(c @ ('[' | '(' | ')')) => {
                    self.pos -= 1;
                    return Err(self.error(&format!("unescaped '{c}' in assertion")));
                }
                Some(c) => c,
            };
            let target = match parameters.last_mut() {
                Some((name, _)) if in_name => name,
                Some((_, value)) => value,
                None => values.last_mut().ok_or_else(|| self.error("empty assertion"))?,
            };
            target.push(c);
        }
        Ok(Assertion { values, parameters })
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            f.write_str("^")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write_escaped(f, value)?;
        }
        for (name, value) in &self.parameters {
            f.write_str(";")?;
            write_escaped(f, name)?;
            f.write_str("=")?;
            write_escaped(f, value)?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.index)?;
        if let Some(assertion) = &self.assertion {
            write!(f, "{assertion}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OffsetKind::Character(n) => write!(f, ":{n}")?,
            OffsetKind::Temporal { seconds, spatial } => {
                write!(f, "~{seconds}")?;
                if let Some((x, y)) = spatial {
                    write!(f, "@{x}:{y}")?;
                }
            }
            OffsetKind::Spatial { x, y } => write!(f, "@{x}:{y}")?,
        }
        if let Some(assertion) = &self.assertion {
            write!(f, "{assertion}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("!")?;
            }
            for step in segment {
                write!(f, "{step}")?;
            }
        }
        if let Some(offset) = &self.offset {
            write!(f, "{offset}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}", self.path)?;
        if let Some((start, end)) = &self.range {
            write!(f, ",{start},{end}")?;
        }
        f.write_str(")")
    }
}

impl std::str::FromStr for Cfi {
    type Err = CfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use folio_dom::parse_xhtml;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;

    const DOC: &str = r#"<html><head><title>t</title></head><body id="body01"><p>Hello <em>big</em> world</p><p id="para02">Second</p></body></html>"#;

    fn round_trip(s: &str) {
        let cfi = Cfi::parse(s).unwrap();
        assert_eq!(cfi.to_string(), s);
    }

    #[test]
    fn test_grammar_round_trips() {
        round_trip("epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/3:10)");
        round_trip("epubcfi(/6/4!/4/2/1:0)");
        round_trip("epubcfi(/6/4!/4/2/1:3[yyy,xxx;s=b])");
        round_trip("epubcfi(/6/4!/4/2,/1:1,/3:4)");
        round_trip("epubcfi(/6/4!/4/10~23.5@50:25.25)");
        round_trip("epubcfi(/6/4!/4/10@0:100)");
        round_trip("epubcfi(/6/4!/4[a^,b^]^^]/1:2)");
        round_trip("epubcfi(/6/4!/4,!/2:1,!/4:2)");
    }

    #[test]
    fn test_syntax_errors_carry_the_position() {
        let cases = [
            ("epubcfi(/6/x)", 11),
            ("epub(/6)", 0),
            ("epubcfi(/6/4!)", 13),
            ("epubcfi(/6/4[abc)", 16),
            ("epubcfi(/6~2.)", 13),
            ("epubcfi(/6)x", 11),
        ];
        for (input, position) in cases {
            match Cfi::parse(input) {
                Err(CfiError::Syntax { position: p, .. }) => assert_eq!(p, position, "{input}"),
                other => panic!("{input}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_spine_and_document_steps() {
        let cfi = Cfi::parse("epubcfi(/6/4!/4/2/1:0)").unwrap();
        assert_eq!(cfi.path.spine_index(), Some(1));
        assert_eq!(cfi.path.document_steps().len(), 3);
        let local = Cfi::parse("epubcfi(/4/2)").unwrap();
        assert_eq!(local.path.spine_index(), None);
    }

    #[test]
    fn test_resolve_text_offset() {
        let tree = parse_xhtml(DOC).unwrap();
        let cfi = Cfi::parse("epubcfi(/6/2!/4/2/3:2)").unwrap();
        let position = cfi.path.resolve(&tree).unwrap();
        let node = position.node(&tree).unwrap();
        assert_eq!(tree.as_text(node), Some(" world"));
        assert_eq!(position.offset, 2);
    }

    #[test]
    fn test_id_assertion_wins_over_index() {
        let tree = parse_xhtml(DOC).unwrap();
        let cfi = Cfi::parse("epubcfi(/4/2[para02])").unwrap();
        let position = cfi.path.resolve(&tree).unwrap();
        assert_eq!(position.node(&tree), tree.element_by_id("para02"));
        let missing = Cfi::parse("epubcfi(/4/8)").unwrap();
        assert_eq!(missing.path.resolve(&tree), Err(CfiError::MissingStep { index: 8 }));
    }

    #[test]
    fn test_position_round_trips_through_cfi() {
        let tree = parse_xhtml(DOC).unwrap();
        let world = tree
            .descendants(tree.root())
            .find(|&n| tree.as_text(n) == Some(" world"))
            .unwrap();
        let position = FlowPosition::in_text(&tree, world, 3);
        let cfi = Cfi::from_position(&tree, &position, Some(0));
        assert_eq!(cfi.to_string(), "epubcfi(/6/2!/4[body01]/2/3:3)");
        assert_eq!(cfi.path.resolve(&tree).unwrap(), position);

        let para = tree.element_by_id("para02").unwrap();
        let cfi = Cfi::from_position(&tree, &FlowPosition::before(&tree, para), None);
        assert_eq!(cfi.to_string(), "epubcfi(/4[body01]/4[para02])");
    }

    #[test]
    fn test_range_start_and_end() {
        let tree = parse_xhtml(DOC).unwrap();
        let cfi = Cfi::parse("epubcfi(/6/2!/4/2,/1:1,/3:4)").unwrap();
        let start = cfi.start().resolve(&tree).unwrap();
        let end = cfi.end().resolve(&tree).unwrap();
        assert!(start < end);
        assert_eq!(start.offset, 1);
        assert_eq!(end.offset, 4);
    }

    #[test]
    fn test_fragment_form() {
        let cfi = Cfi::parse("epubcfi(/6/4!/4[a b]/1:0)").unwrap();
        let fragment = cfi.to_fragment();
        assert!(fragment.starts_with("f=epubcfi("));
        assert!(!fragment.contains(' '));
        assert_eq!(Cfi::from_fragment(&fragment), Some(Ok(cfi)));
        assert_eq!(Cfi::from_fragment("chapter1"), None);
    }

    fn small_number(g: &mut Gen) -> f64 {
        f64::from(u16::arbitrary(g)) / 4.0
    }

    fn arbitrary_assertion(g: &mut Gen) -> Option<Assertion> {
        if !bool::arbitrary(g) {
            return None;
        }
        let mut values: Vec<String> = Vec::arbitrary(g);
        if values.is_empty() {
            values.push(String::arbitrary(g));
        }
        let parameters: Vec<(String, String)> = Vec::arbitrary(g);
        Some(Assertion { values, parameters })
    }

    fn arbitrary_steps(g: &mut Gen, min: usize) -> Vec<Step> {
        let len = min + usize::arbitrary(g) % 4;
        (0..len)
            .map(|_| Step {
                index: u32::arbitrary(g) % 64,
                assertion: arbitrary_assertion(g),
            })
            .collect()
    }

    fn arbitrary_offset(g: &mut Gen) -> Option<Offset> {
        let kind = match u8::arbitrary(g) % 4 {
            0 => return None,
            1 => OffsetKind::Character(u32::arbitrary(g)),
            2 => OffsetKind::Temporal {
                seconds: small_number(g),
                spatial: bool::arbitrary(g).then(|| (small_number(g), small_number(g))),
            },
            _ => OffsetKind::Spatial {
                x: small_number(g),
                y: small_number(g),
            },
        };
        Some(Offset {
            kind,
            assertion: arbitrary_assertion(g),
        })
    }

    /// Segments after the first are non-empty, except a last one followed
    /// by an offset.
    fn arbitrary_path(g: &mut Gen, local: bool) -> CfiPath {
        let offset = arbitrary_offset(g);
        let count = 1 + usize::arbitrary(g) % 3;
        let mut segments: Vec<Vec<Step>> = (0..count)
            .map(|i| arbitrary_steps(g, usize::from(i > 0 || !local)))
            .collect();
        if offset.is_some() && count > 1 && bool::arbitrary(g) {
            segments.push(Vec::new());
        }
        CfiPath { segments, offset }
    }

    impl Arbitrary for Cfi {
        fn arbitrary(g: &mut Gen) -> Self {
            let range = bool::arbitrary(g).then(|| (arbitrary_path(g, true), arbitrary_path(g, true)));
            Self {
                path: arbitrary_path(g, false),
                range,
            }
        }
    }

    #[quickcheck]
    fn test_serialize_parse_round_trip(cfi: Cfi) -> bool {
        let text = cfi.to_string();
        Cfi::parse(&text).is_ok_and(|parsed| parsed == cfi && parsed.to_string() == text)
    }
}
