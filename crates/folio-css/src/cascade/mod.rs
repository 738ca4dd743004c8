//! CSS Cascading and Style Computation
//!
//! This module implements style computation per
//! [CSS Cascading and Inheritance Level 4](https://www.w3.org/TR/css-cascade-4/).
//!
//! A [`StyleResolver`] owns every rule of one document instance: the UA sheet,
//! the user sheet generated from viewer options, and the author sheets. Rules
//! are filed in a [`RuleIndex`] under the most selective key of their subject
//! compound, so an element only tests the rules that could possibly match it.
//! Computed styles are cached per `(node, pseudo-element)` until a stylesheet
//! is added or the media environment flips a query.

use std::collections::HashMap;
use std::rc::Rc;

use folio_common::MessageQueue;
use folio_dom::{DomTree, NodeId, NodeType};
use serde::Serialize;
use strum_macros::Display;

use crate::media::{MediaEnvironment, MediaQueryList};
use crate::page::{PageContext, PageRule, PageStyle, resolve_page_style};
use crate::parser::{CSSParser, Declaration, Rule, Stylesheet, parse_declarations, parse_stylesheet};
use crate::selector::{IndexKey, NamespaceMap, ParsedSelector, PseudoElement, Specificity, parse_selector_list};
use crate::style::{ComputedStyle, Float, ResolveContext, StyleError};
use crate::tokenizer::CSSToken;
use crate::ua_stylesheet::ua_stylesheet;

/// [§ 6.2 Cascading Origins](https://www.w3.org/TR/css-cascade-4/#cascading-origins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum Origin {
    /// Built-in defaults.
    #[strum(to_string = "user-agent")]
    UserAgent,
    /// Reader preferences (viewer options, user stylesheet).
    #[strum(to_string = "user")]
    User,
    /// The document's own stylesheets and `style` attributes.
    #[strum(to_string = "author")]
    Author,
}

impl Origin {
    /// [§ 6.4.1 Cascade Sorting Order](https://www.w3.org/TR/css-cascade-4/#cascade-sort)
    ///
    /// Precedence tier of a declaration, lowest first: normal UA, normal user,
    /// normal author, important author, important user, important UA.
    #[must_use]
    pub const fn tier(self, important: bool) -> u8 {
        match (important, self) {
            (false, Self::UserAgent) => 0,
            (false, Self::User) => 1,
            (false, Self::Author) => 2,
            (true, Self::Author) => 3,
            (true, Self::User) => 4,
            (true, Self::UserAgent) => 5,
        }
    }
}

/// A style rule split into one entry per selector.
#[derive(Debug, Clone)]
struct CompiledRule {
    selector: ParsedSelector,
    declarations: Rc<[Declaration]>,
    origin: Origin,
    order: usize,
    /// Indices of the enclosing `@media` lists; all must hold.
    media: Vec<usize>,
}

/// Rules bucketed by the key of their subject compound.
#[derive(Debug, Default)]
pub struct RuleIndex {
    by_id: HashMap<String, Vec<usize>>,
    by_class: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
    universal: Vec<usize>,
}

impl RuleIndex {
    fn insert(&mut self, key: IndexKey, rule: usize) {
        match key {
            IndexKey::Id(id) => self.by_id.entry(id).or_default().push(rule),
            IndexKey::Class(class) => self.by_class.entry(class).or_default().push(rule),
            IndexKey::Tag(tag) => self.by_tag.entry(tag).or_default().push(rule),
            IndexKey::Universal => self.universal.push(rule),
        }
    }

    /// Rules that may match an element; each rule appears at most once.
    fn candidates(&self, tree: &DomTree, node: NodeId) -> Vec<usize> {
        let mut out = self.universal.clone();
        let Some(element) = tree.as_element(node) else {
            return out;
        };
        if let Some(rules) = element.id().and_then(|id| self.by_id.get(id)) {
            out.extend_from_slice(rules);
        }
        for class in element.classes() {
            if let Some(rules) = self.by_class.get(class) {
                out.extend_from_slice(rules);
            }
        }
        if let Some(rules) = self.by_tag.get(&element.tag_name.to_ascii_lowercase()) {
            out.extend_from_slice(rules);
        }
        out
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What adding a stylesheet produced besides rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetOutcome {
    /// `@import` targets, for the caller to fetch and add in order.
    pub imports: Vec<String>,
    /// Number of style rules (per selector) added.
    pub rules_added: usize,
}

/// [§ 6 Cascading](https://www.w3.org/TR/css-cascade-4/#cascading)
///
/// Resolves computed styles for the nodes of one document.
#[derive(Debug)]
pub struct StyleResolver {
    rules: Vec<CompiledRule>,
    index: RuleIndex,
    page_rules: Vec<PageRule>,
    media_lists: Vec<MediaQueryList>,
    media_truth: Vec<bool>,
    media: MediaEnvironment,
    cache: HashMap<(NodeId, Option<PseudoElement>), Rc<ComputedStyle>>,
    initial: Rc<ComputedStyle>,
    messages: MessageQueue,
    next_order: usize,
}

impl StyleResolver {
    /// A resolver holding only the UA stylesheet.
    #[must_use]
    pub fn new(messages: MessageQueue) -> Self {
        let mut resolver = Self::empty(messages);
        let _ = resolver.add_parsed(ua_stylesheet(), Origin::UserAgent);
        resolver
    }

    /// A resolver without any stylesheet, not even the UA defaults.
    #[must_use]
    pub fn empty(messages: MessageQueue) -> Self {
        Self {
            rules: Vec::new(),
            index: RuleIndex::default(),
            page_rules: Vec::new(),
            media_lists: Vec::new(),
            media_truth: Vec::new(),
            media: MediaEnvironment::default(),
            cache: HashMap::new(),
            initial: Rc::new(ComputedStyle::default()),
            messages,
            next_order: 0,
        }
    }

    /// The message queue warnings go to.
    #[must_use]
    pub const fn messages(&self) -> &MessageQueue {
        &self.messages
    }

    /// Current media environment.
    #[must_use]
    pub const fn media(&self) -> &MediaEnvironment {
        &self.media
    }

    /// Number of compiled style rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Parse and add a stylesheet. Rules added later win ties.
    pub fn add_stylesheet(&mut self, css: &str, origin: Origin) -> SheetOutcome {
        let sheet = parse_stylesheet(css);
        self.add_parsed(&sheet, origin)
    }

    /// Add an already-parsed stylesheet.
    pub fn add_parsed(&mut self, sheet: &Stylesheet, origin: Origin) -> SheetOutcome {
        for issue in &sheet.issues {
            self.messages.warn("CSS", format!("{origin} stylesheet: {issue}"));
        }
        let mut outcome = SheetOutcome {
            imports: sheet.imports(),
            ..SheetOutcome::default()
        };
        let mut namespaces = NamespaceMap::new();
        self.add_rules(&sheet.rules, origin, &[], &mut namespaces, &mut outcome);
        self.cache.clear();
        outcome
    }

    /// Drop every rule and cached style, e.g. before reloading stylesheets.
    pub fn clear(&mut self) {
        self.rules.clear();
        self.index.clear();
        self.page_rules.clear();
        self.media_lists.clear();
        self.media_truth.clear();
        self.cache.clear();
        self.next_order = 0;
    }

    /// Drop cached styles only.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    fn add_rules(
        &mut self,
        rules: &[Rule],
        origin: Origin,
        media: &[usize],
        namespaces: &mut NamespaceMap,
        outcome: &mut SheetOutcome,
    ) {
        for rule in rules {
            match rule {
                Rule::Style(style_rule) => {
                    let selectors = match parse_selector_list(&style_rule.prelude, namespaces) {
                        Ok(selectors) => selectors,
                        Err(err) => {
                            // "If a selector is invalid, the entire rule is dropped."
                            self.messages
                                .warn("CSS", format!("line {}: {err}; rule dropped", style_rule.line));
                            continue;
                        }
                    };
                    let declarations: Rc<[Declaration]> = style_rule.declarations.clone().into();
                    let order = self.next_order;
                    self.next_order += 1;
                    for selector in selectors {
                        let id = self.rules.len();
                        self.index.insert(selector.index_key(), id);
                        self.rules.push(CompiledRule {
                            selector,
                            declarations: Rc::clone(&declarations),
                            origin,
                            order,
                            media: media.to_vec(),
                        });
                        outcome.rules_added += 1;
                    }
                }
                Rule::At(at) => match at.name.as_str() {
                    "media" => {
                        let list = MediaQueryList::parse(&at.prelude);
                        self.media_truth.push(list.matches(&self.media));
                        self.media_lists.push(list);
                        let mut nested_media = media.to_vec();
                        nested_media.push(self.media_lists.len() - 1);
                        let body = CSSParser::new(at.block.clone().unwrap_or_default()).parse_rule_list();
                        self.add_rules(&body.rules, origin, &nested_media, namespaces, outcome);
                    }
                    "namespace" => {
                        let parts: Vec<&CSSToken> =
                            at.prelude.iter().filter(|t| !t.is_whitespace()).collect();
                        let (prefix, uri) = match parts.as_slice() {
                            [uri] => (String::new(), namespace_uri(uri)),
                            [CSSToken::Ident(prefix), uri] => (prefix.clone(), namespace_uri(uri)),
                            _ => (String::new(), None),
                        };
                        match uri {
                            Some(uri) => {
                                let _ = namespaces.insert(prefix, uri);
                            }
                            None => self
                                .messages
                                .warn("CSS", format!("line {}: malformed @namespace", at.line)),
                        }
                    }
                    "page" => {
                        let order = self.next_order;
                        self.next_order += 1;
                        match PageRule::from_at_rule(at, origin, order) {
                            Some(page_rule) => self.page_rules.push(page_rule),
                            None => self
                                .messages
                                .warn("CSS", format!("line {}: invalid @page selector", at.line)),
                        }
                    }
                    "import" | "font-face" | "charset" => {}
                    other => self
                        .messages
                        .warn("CSS", format!("line {}: unsupported @{other} ignored", at.line)),
                },
            }
        }
    }

    /// Switch the media environment. Returns `true` (and drops the style
    /// cache) when any `@media` list changed its result.
    pub fn set_media(&mut self, media: MediaEnvironment) -> bool {
        let truth: Vec<bool> = self.media_lists.iter().map(|l| l.matches(&media)).collect();
        let viewport_changed = media.width != self.media.width || media.height != self.media.height;
        self.media = media;
        let changed = truth != self.media_truth;
        self.media_truth = truth;
        // Viewport units depend on the size even when no query flips.
        if changed || viewport_changed {
            self.cache.clear();
        }
        changed
    }

    /// Resolve the computed style of `node`, or of its pseudo-element.
    ///
    /// Text nodes get their parent's style; the document node gets initial
    /// values.
    pub fn resolve_style(
        &mut self,
        tree: &DomTree,
        node: NodeId,
        pseudo: Option<PseudoElement>,
    ) -> Rc<ComputedStyle> {
        if let Some(style) = self.cache.get(&(node, pseudo)) {
            return Rc::clone(style);
        }
        let Some(data) = tree.get(node) else {
            return Rc::clone(&self.initial);
        };
        match &data.node_type {
            NodeType::Element(_) => {}
            NodeType::Document => return Rc::clone(&self.initial),
            NodeType::Text(_) | NodeType::Comment(_) => {
                return match tree.parent(node) {
                    Some(parent) => self.resolve_style(tree, parent, None),
                    None => Rc::clone(&self.initial),
                };
            }
        }

        let parent = match pseudo {
            Some(_) => self.resolve_style(tree, node, None),
            None => match tree.parent(node) {
                Some(parent) => self.resolve_style(tree, parent, None),
                None => Rc::clone(&self.initial),
            },
        };
        let is_root = pseudo.is_none() && tree.document_element() == Some(node);
        let root_font_size = match tree.document_element() {
            Some(root) if !is_root => self.resolve_style(tree, root, None).font_size,
            _ => parent.font_size,
        };
        let ctx = ResolveContext {
            font_size: parent.font_size,
            root_font_size,
            viewport_width: self.media.width,
            viewport_height: self.media.height,
        };

        let inline = match (pseudo, tree.as_element(node).and_then(|e| e.attr("style"))) {
            (None, Some(text)) => parse_declarations(text),
            _ => Vec::new(),
        };
        let mut matched = self.matched_declarations(tree, node, pseudo);
        matched.extend(inline.iter().map(|decl| DeclarationRef {
            tier: Origin::Author.tier(decl.important),
            specificity: Specificity::INLINE,
            order: usize::MAX,
            decl,
        }));
        matched.sort_by_key(|m| (m.tier, m.specificity, m.order, m.decl.source_order));

        let mut style = ComputedStyle::inherit_from(&parent);
        // Font size and writing mode first: `em` and logical properties depend on them.
        for early in [true, false] {
            for m in matched
                .iter()
                .filter(|m| ComputedStyle::is_early_property(&m.decl.name) == early)
            {
                if let Err(err) = style.apply_declaration(&m.decl.name, &m.decl.value, &parent, &ctx) {
                    match err {
                        StyleError::UnknownProperty(_) => {
                            self.messages.warn("CSS", format!("{err}; declaration dropped"));
                        }
                        StyleError::InvalidValue { .. } => self.messages.warn("CSS", err.to_string()),
                    }
                }
            }
        }
        drop(matched);
        fix_up(&mut style, pseudo, is_root);

        let style = Rc::new(style);
        let _ = self.cache.insert((node, pseudo), Rc::clone(&style));
        style
    }

    fn matched_declarations(
        &self,
        tree: &DomTree,
        node: NodeId,
        pseudo: Option<PseudoElement>,
    ) -> Vec<DeclarationRef<'_>> {
        let mut out = Vec::new();
        for id in self.index.candidates(tree, node) {
            let rule = &self.rules[id];
            if rule.selector.pseudo_element != pseudo
                || !rule.media.iter().all(|&m| self.media_truth.get(m).copied().unwrap_or(false))
                || !rule.selector.matches_in_tree(tree, node)
            {
                continue;
            }
            out.extend(rule.declarations.iter().map(|decl| DeclarationRef {
                tier: rule.origin.tier(decl.important),
                specificity: rule.selector.specificity,
                order: rule.order,
                decl,
            }));
        }
        out
    }

    /// Resolve the page box for one page from the `@page` rules.
    #[must_use]
    pub fn page_style(&self, page: &PageContext<'_>, base: &PageStyle) -> PageStyle {
        let (style, warnings) = resolve_page_style(&self.page_rules, page, base);
        for warning in warnings {
            self.messages.warn("CSS", warning);
        }
        style
    }
}

/// One declaration with its cascade sort key.
struct DeclarationRef<'a> {
    tier: u8,
    specificity: Specificity,
    order: usize,
    decl: &'a Declaration,
}

fn namespace_uri(token: &CSSToken) -> Option<String> {
    match token {
        CSSToken::String(uri) | CSSToken::Url(uri) => Some(uri.clone()),
        _ => None,
    }
}

/// [CSS 2.1 § 9.7 Relationships between 'display', 'position', and 'float'](https://www.w3.org/TR/CSS2/visuren.html#dis-pos-flo)
///
/// "Otherwise, if 'float' has a value other than 'none', the box is floated
/// and 'display' is set according to the table below." The root element is
/// blockified too. Pseudo-elements whose `content` computes to nothing
/// generate no box.
fn fix_up(style: &mut ComputedStyle, pseudo: Option<PseudoElement>, is_root: bool) {
    if is_root || !matches!(style.float, Float::None) {
        style.display = style.display.blockify();
    }
    match pseudo {
        Some(
            PseudoElement::Before
            | PseudoElement::After
            | PseudoElement::FootnoteCall
            | PseudoElement::FootnoteMarker,
        ) if !matches!(style.content, crate::expr::Content::Items(_)) => {
            style.display_none = true;
        }
        Some(PseudoElement::Marker) => {
            style.display = crate::style::DisplayValue::inline();
        }
        _ => {}
    }
}

/// [§ 6 Cascading](https://www.w3.org/TR/css-cascade-4/#cascading)
///
/// Compute styles for every element of the tree. Mostly useful for tests and
/// tooling; layout resolves styles lazily as it walks the flow.
pub fn compute_styles(tree: &DomTree, resolver: &mut StyleResolver) -> HashMap<NodeId, Rc<ComputedStyle>> {
    tree.descendants(tree.root())
        .filter(|&id| tree.as_element(id).is_some())
        .map(|id| (id, resolver.resolve_style(tree, id, None)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::ColorValue;
    use folio_dom::ElementData;

    fn document(tag: &str, class: Option<&str>) -> (DomTree, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.append_element(NodeId::ROOT, ElementData::new("html"));
        let body = tree.append_element(html, ElementData::new("body"));
        let mut data = ElementData::new(tag);
        if let Some(class) = class {
            data = data.with_attr("class", class);
        }
        let node = tree.append_element(body, data);
        (tree, node)
    }

    #[test]
    fn test_origin_tiers() {
        assert!(Origin::Author.tier(false) > Origin::User.tier(false));
        assert!(Origin::User.tier(true) > Origin::Author.tier(true));
        assert!(Origin::UserAgent.tier(true) > Origin::Author.tier(false));
    }

    #[test]
    fn test_important_user_beats_author() {
        let (tree, p) = document("p", None);
        let mut resolver = StyleResolver::empty(MessageQueue::new());
        let _ = resolver.add_stylesheet("p { color: red !important }", Origin::Author);
        let _ = resolver.add_stylesheet("p { color: blue !important }", Origin::User);
        assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 0, 255));
    }

    #[test]
    fn test_cache_invalidated_by_new_sheet() {
        let (tree, p) = document("p", Some("x"));
        let mut resolver = StyleResolver::empty(MessageQueue::new());
        let _ = resolver.add_stylesheet(".x { color: red }", Origin::Author);
        assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(255, 0, 0));
        let _ = resolver.add_stylesheet(".x { color: lime }", Origin::Author);
        assert_eq!(resolver.resolve_style(&tree, p, None).color, ColorValue::rgb(0, 255, 0));
    }

    #[test]
    fn test_index_candidates_skip_unrelated_rules() {
        let (tree, p) = document("p", None);
        let mut resolver = StyleResolver::empty(MessageQueue::new());
        let _ = resolver.add_stylesheet("#a { color: red } .b { color: red } div { color: red } * { margin: 0 }", Origin::Author);
        assert_eq!(resolver.index.candidates(&tree, p).len(), 1);
    }

    #[test]
    fn test_pseudo_without_content_generates_nothing() {
        let (tree, p) = document("p", None);
        let mut resolver = StyleResolver::empty(MessageQueue::new());
        let _ = resolver.add_stylesheet("p::before { color: red } p::after { content: 'x' }", Origin::Author);
        assert!(resolver.resolve_style(&tree, p, Some(PseudoElement::Before)).display_none);
        assert!(!resolver.resolve_style(&tree, p, Some(PseudoElement::After)).display_none);
    }

    #[test]
    fn test_unknown_property_warns_once() {
        let (tree, p) = document("p", None);
        let messages = MessageQueue::new();
        let mut resolver = StyleResolver::empty(messages.clone());
        let _ = resolver.add_stylesheet("p { frobnicate: 1 } p { frobnicate: 1 }", Origin::Author);
        let _ = resolver.resolve_style(&tree, p, None);
        assert_eq!(messages.drain().len(), 1);
    }
}
