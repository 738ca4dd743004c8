//! CSS Selector parsing and matching
//!
//! This module implements selector parsing and matching per
//! [Selectors Level 4](https://www.w3.org/TR/selectors-4/), plus the
//! pseudo-elements a paginated renderer generates boxes for.
//!
//! Selectors are parsed from the prelude tokens of a style rule and matched
//! right-to-left against the arena DOM.

mod parse;

use std::collections::HashMap;

use folio_dom::{DomTree, ElementData, NodeId, NodeType, XHTML_NAMESPACE};
use strum_macros::{Display, EnumString};

pub use parse::{SelectorError, parse_selector, parse_selector_list};

/// Prefix → namespace URI bindings from `@namespace` rules. The empty prefix
/// holds the default namespace.
pub type NamespaceMap = HashMap<String, String>;

/// [§ 5.3 Namespaces in type selectors](https://www.w3.org/TR/selectors-4/#type-nmsp)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// `*|name`, or no prefix and no default namespace.
    Any,
    /// `|name`: elements without a namespace.
    None,
    /// `prefix|name`, or no prefix under a default namespace.
    Uri(String),
}

impl NamespaceConstraint {
    fn matches(&self, element: &ElementData) -> bool {
        match self {
            Self::Any => true,
            Self::None => element.namespace.is_none(),
            Self::Uri(uri) => element.namespace.as_deref() == Some(uri.as_str()),
        }
    }
}

/// [§ 5 Elemental selectors](https://www.w3.org/TR/selectors-4/#elemental-selectors)
///
/// A simple selector is a single condition on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// [§ 5.1 Type selector](https://www.w3.org/TR/selectors-4/#type-selectors)
    Type {
        /// Namespace the element must be in.
        namespace: NamespaceConstraint,
        /// Local name.
        name: String,
    },
    /// [§ 5.2 Universal selector](https://www.w3.org/TR/selectors-4/#universal-selector)
    Universal(NamespaceConstraint),
    /// [§ 6.6 Class selector](https://www.w3.org/TR/selectors-4/#class-html)
    Class(String),
    /// [§ 6.7 ID selector](https://www.w3.org/TR/selectors-4/#id-selectors)
    Id(String),
    /// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
    Attribute(AttributeSelector),
    /// [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
    PseudoClass(PseudoClass),
    /// Interactive pseudo-classes (`:hover`, `:focus`, ...). They never match a
    /// paginated rendering but must not invalidate the whole rule.
    NeverMatch,
}

/// Attribute test operators per [§ 6.1](https://www.w3.org/TR/selectors-4/#attribute-representation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    /// `[att]`
    Exists,
    /// `[att=val]`
    Equals,
    /// `[att~=val]`
    Includes,
    /// `[att|=val]`
    DashMatch,
    /// `[att^=val]`
    Prefix,
    /// `[att$=val]`
    Suffix,
    /// `[att*=val]`
    Substring,
}

/// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Attribute name. Namespaced attributes use the qualified form the DOM
    /// stores (`epub:type`); `*|name` matches any prefix.
    pub name: String,
    /// Whether the name came from `*|name`.
    pub any_namespace: bool,
    /// Test to apply.
    pub operator: AttributeOperator,
    /// Value to compare with.
    pub value: String,
    /// `[att=val i]`
    pub case_insensitive: bool,
}

impl AttributeSelector {
    fn lookup<'a>(&self, element: &'a ElementData) -> Option<&'a str> {
        if self.any_namespace {
            return element
                .attrs
                .iter()
                .find(|(k, _)| k.rsplit(':').next() == Some(self.name.as_str()))
                .map(|(_, v)| v.as_str());
        }
        element.attr(&self.name)
    }

    fn matches(&self, element: &ElementData) -> bool {
        let Some(actual) = self.lookup(element) else {
            return false;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_ascii_lowercase(), self.value.to_ascii_lowercase())
        } else {
            (actual.to_string(), self.value.clone())
        };
        match self.operator {
            AttributeOperator::Exists => true,
            AttributeOperator::Equals => actual == expected,
            AttributeOperator::Includes => actual.split_ascii_whitespace().any(|w| w == expected),
            AttributeOperator::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            // "If 'val' is the empty string then the selector does not represent anything."
            AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

/// The `an+b` microsyntax of [§ 14.1](https://www.w3.org/TR/selectors-4/#the-nth-child-pseudo).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    /// Step.
    pub a: i32,
    /// Offset.
    pub b: i32,
}

impl Nth {
    /// Whether the 1-based `index` is `a*n + b` for some `n >= 0`.
    #[must_use]
    pub const fn matches(self, index: i32) -> bool {
        if self.a == 0 {
            return index == self.b;
        }
        let diff = index - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

/// Structural pseudo-classes per [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    /// `:root`
    Root,
    /// `:first-child`
    FirstChild,
    /// `:last-child`
    LastChild,
    /// `:only-child`
    OnlyChild,
    /// `:first-of-type`
    FirstOfType,
    /// `:last-of-type`
    LastOfType,
    /// `:only-of-type`
    OnlyOfType,
    /// `:empty`
    Empty,
    /// `:nth-child(an+b)`
    NthChild(Nth),
    /// `:nth-last-child(an+b)`
    NthLastChild(Nth),
    /// `:nth-of-type(an+b)`
    NthOfType(Nth),
    /// `:nth-last-of-type(an+b)`
    NthLastOfType(Nth),
    /// `:not(compound)`
    Not(Box<CompoundSelector>),
    /// `:link`, any `a`/`area` with `href`.
    Link,
    /// `:lang(code)`, matched against the nearest `lang`/`xml:lang`.
    Lang(String),
}

/// Pseudo-elements that generate boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum PseudoElement {
    /// `::before`
    Before,
    /// `::after`
    After,
    /// `::marker` of a list item.
    Marker,
    /// `::first-letter`
    FirstLetter,
    /// `::first-line`
    FirstLine,
    /// `::footnote-call`, left in the flow where a footnote was removed.
    FootnoteCall,
    /// `::footnote-marker`, prepended to the footnote body.
    FootnoteMarker,
}

/// [§ 4.2 Compound selectors](https://www.w3.org/TR/selectors-4/#compound)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    /// Conditions that must all hold.
    pub simple_selectors: Vec<SimpleSelector>,
}

/// [§ 16 Combinators](https://www.w3.org/TR/selectors-4/#combinators)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace: `A B`.
    Descendant,
    /// `A > B`
    Child,
    /// `A + B`
    NextSibling,
    /// `A ~ B`
    SubsequentSibling,
}

/// [§ 4.3 Complex selectors](https://www.w3.org/TR/selectors-4/#complex)
///
/// Stored right-to-left: `subject` is the rightmost compound and
/// `combinators[0]` relates it to the compound on its left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    /// The rightmost compound selector.
    pub subject: CompoundSelector,
    /// `(combinator, compound)` pairs walking left from the subject.
    pub combinators: Vec<(Combinator, CompoundSelector)>,
}

/// [§ 17 Calculating Specificity](https://www.w3.org/TR/selectors-4/#specificity-rules)
///
/// Compared component-wise: ids, then classes/attributes/pseudo-classes, then
/// types/pseudo-elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl Specificity {
    /// Specificity used for `style` attribute declarations, above any selector.
    pub const INLINE: Self = Self(u32::MAX, 0, 0);

    /// Create a new specificity with (A, B, C) components.
    #[must_use]
    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Self(a, b, c)
    }

    const fn add(self, other: Self) -> Self {
        Self(self.0 + other.0, self.1 + other.1, self.2 + other.2)
    }
}

/// Bucket a rule is filed under in the cascade's rule index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Subject has an id selector.
    Id(String),
    /// Subject has a class selector (and no id).
    Class(String),
    /// Subject has a type selector (and no id or class). Lowercased.
    Tag(String),
    /// Anything else.
    Universal,
}

/// A parsed selector ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    /// The compound selectors and their combinators.
    pub complex: ComplexSelector,
    /// Trailing pseudo-element, if any.
    pub pseudo_element: Option<PseudoElement>,
    /// Specificity including the pseudo-element.
    pub specificity: Specificity,
}

impl ParsedSelector {
    /// Check if this is a simple selector (no combinators).
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        self.complex.combinators.is_empty()
    }

    /// The most selective key of the subject compound.
    #[must_use]
    pub fn index_key(&self) -> IndexKey {
        let simple = &self.complex.subject.simple_selectors;
        if let Some(id) = simple.iter().find_map(|s| match s {
            SimpleSelector::Id(id) => Some(id),
            _ => None,
        }) {
            return IndexKey::Id(id.clone());
        }
        if let Some(class) = simple.iter().find_map(|s| match s {
            SimpleSelector::Class(c) => Some(c),
            _ => None,
        }) {
            return IndexKey::Class(class.clone());
        }
        if let Some(tag) = simple.iter().find_map(|s| match s {
            SimpleSelector::Type { name, .. } => Some(name),
            _ => None,
        }) {
            return IndexKey::Tag(tag.to_ascii_lowercase());
        }
        IndexKey::Universal
    }

    /// [§ 4.1 Selector Matching](https://www.w3.org/TR/selectors-4/#match-a-selector-against-an-element)
    ///
    /// Match against an element in its tree. The pseudo-element part is not
    /// checked here; the cascade compares it separately.
    #[must_use]
    pub fn matches_in_tree(&self, tree: &DomTree, node_id: NodeId) -> bool {
        compound_matches(&self.complex.subject, tree, node_id)
            && match_chain(&self.complex.combinators, tree, node_id)
    }
}

/// Match the remaining combinator chain starting from an already-matched element.
/// Backtracks over ancestors and siblings so `a > b c` finds a `b` whose parent is `a`.
fn match_chain(chain: &[(Combinator, CompoundSelector)], tree: &DomTree, from: NodeId) -> bool {
    let Some(((combinator, compound), rest)) = chain.split_first() else {
        return true;
    };
    let try_node = |candidate: NodeId| {
        compound_matches(compound, tree, candidate) && match_chain(rest, tree, candidate)
    };
    match combinator {
        Combinator::Descendant => tree
            .ancestors(from)
            .filter(|&a| tree.as_element(a).is_some())
            .any(try_node),
        Combinator::Child => tree
            .parent(from)
            .filter(|&p| tree.as_element(p).is_some())
            .is_some_and(try_node),
        Combinator::NextSibling => previous_element_sibling(tree, from).is_some_and(try_node),
        Combinator::SubsequentSibling => tree
            .preceding_siblings(from)
            .filter(|&s| tree.as_element(s).is_some())
            .any(try_node),
    }
}

fn compound_matches(compound: &CompoundSelector, tree: &DomTree, node_id: NodeId) -> bool {
    let Some(element) = tree.as_element(node_id) else {
        return false;
    };
    compound
        .simple_selectors
        .iter()
        .all(|simple| simple_matches(simple, tree, node_id, element))
}

fn simple_matches(
    simple: &SimpleSelector,
    tree: &DomTree,
    node_id: NodeId,
    element: &ElementData,
) -> bool {
    match simple {
        SimpleSelector::Type { namespace, name } => {
            let name_matches = if is_html(element) {
                element.tag_name.eq_ignore_ascii_case(name)
            } else {
                element.tag_name == *name
            };
            name_matches && namespace.matches(element)
        }
        SimpleSelector::Universal(namespace) => namespace.matches(element),
        SimpleSelector::Class(class_name) => element.classes().contains(class_name.as_str()),
        SimpleSelector::Id(id) => element.id().is_some_and(|el_id| el_id == id),
        SimpleSelector::Attribute(attr) => attr.matches(element),
        SimpleSelector::PseudoClass(pc) => pseudo_class_matches(pc, tree, node_id, element),
        SimpleSelector::NeverMatch => false,
    }
}

fn is_html(element: &ElementData) -> bool {
    element
        .namespace
        .as_deref()
        .is_none_or(|ns| ns == XHTML_NAMESPACE)
}

fn same_type(a: &ElementData, b: &ElementData) -> bool {
    a.tag_name == b.tag_name && a.namespace == b.namespace
}

/// 1-based position among element siblings, counting from the start or the end,
/// optionally only among siblings of the same type.
fn sibling_index(tree: &DomTree, node_id: NodeId, from_end: bool, of_type: bool) -> i32 {
    let Some(element) = tree.as_element(node_id) else {
        return 0;
    };
    let Some(parent) = tree.parent(node_id) else {
        return 1;
    };
    let siblings = tree.children(parent);
    let qualifies = |c: &&NodeId| {
        tree.as_element(**c)
            .is_some_and(|e| !of_type || same_type(e, element))
    };
    let position = if from_end {
        siblings
            .iter()
            .rev()
            .filter(qualifies)
            .position(|&c| c == node_id)
    } else {
        siblings.iter().filter(qualifies).position(|&c| c == node_id)
    };
    position.map_or(0, |p| i32::try_from(p + 1).unwrap_or(i32::MAX))
}

/// [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
fn pseudo_class_matches(
    pc: &PseudoClass,
    tree: &DomTree,
    node_id: NodeId,
    element: &ElementData,
) -> bool {
    match pc {
        // "The :root pseudo-class represents an element that is the root of the document."
        PseudoClass::Root => tree.document_element() == Some(node_id),
        PseudoClass::FirstChild => sibling_index(tree, node_id, false, false) == 1,
        PseudoClass::LastChild => sibling_index(tree, node_id, true, false) == 1,
        PseudoClass::OnlyChild => {
            sibling_index(tree, node_id, false, false) == 1
                && sibling_index(tree, node_id, true, false) == 1
        }
        PseudoClass::FirstOfType => sibling_index(tree, node_id, false, true) == 1,
        PseudoClass::LastOfType => sibling_index(tree, node_id, true, true) == 1,
        PseudoClass::OnlyOfType => {
            sibling_index(tree, node_id, false, true) == 1
                && sibling_index(tree, node_id, true, true) == 1
        }
        // "The :empty pseudo-class represents an element that has no children except,
        // optionally, document white space characters."
        PseudoClass::Empty => tree
            .children(node_id)
            .iter()
            .all(|&c| match tree.get(c).map(|n| &n.node_type) {
                Some(NodeType::Text(t)) => t.trim().is_empty(),
                Some(NodeType::Comment(_)) => true,
                _ => false,
            }),
        PseudoClass::NthChild(nth) => nth.matches(sibling_index(tree, node_id, false, false)),
        PseudoClass::NthLastChild(nth) => nth.matches(sibling_index(tree, node_id, true, false)),
        PseudoClass::NthOfType(nth) => nth.matches(sibling_index(tree, node_id, false, true)),
        PseudoClass::NthLastOfType(nth) => nth.matches(sibling_index(tree, node_id, true, true)),
        PseudoClass::Not(inner) => !compound_matches(inner, tree, node_id),
        PseudoClass::Link => {
            matches!(element.tag_name.as_str(), "a" | "area") && element.attr("href").is_some()
        }
        PseudoClass::Lang(code) => {
            let lang = std::iter::once(node_id)
                .chain(tree.ancestors(node_id))
                .filter_map(|id| tree.as_element(id))
                .find_map(|e| e.attr("xml:lang").or_else(|| e.attr("lang")));
            lang.is_some_and(|l| {
                l.eq_ignore_ascii_case(code)
                    || l.to_ascii_lowercase()
                        .starts_with(&format!("{}-", code.to_ascii_lowercase()))
            })
        }
    }
}

fn previous_element_sibling(tree: &DomTree, node_id: NodeId) -> Option<NodeId> {
    tree.preceding_siblings(node_id)
        .find(|&sibling_id| tree.as_element(sibling_id).is_some())
}

impl CompoundSelector {
    /// Specificity contributed by this compound.
    #[must_use]
    pub fn specificity(&self) -> Specificity {
        self.simple_selectors
            .iter()
            .fold(Specificity::default(), |spec, simple| {
                spec.add(match simple {
                    SimpleSelector::Id(_) => Specificity(1, 0, 0),
                    // "The specificity of a :not() pseudo-class is replaced by the
                    // specificity of the most specific complex selector in its
                    // selector list argument."
                    SimpleSelector::PseudoClass(PseudoClass::Not(inner)) => inner.specificity(),
                    SimpleSelector::Class(_)
                    | SimpleSelector::Attribute(_)
                    | SimpleSelector::PseudoClass(_)
                    | SimpleSelector::NeverMatch => Specificity(0, 1, 0),
                    SimpleSelector::Type { .. } => Specificity(0, 0, 1),
                    SimpleSelector::Universal(_) => Specificity::default(),
                })
            })
    }
}

impl ComplexSelector {
    /// [§ 17 Calculating Specificity](https://www.w3.org/TR/selectors-4/#specificity-rules)
    #[must_use]
    pub fn calculate_specificity(&self) -> Specificity {
        self.combinators
            .iter()
            .fold(self.subject.specificity(), |spec, (_, compound)| {
                spec.add(compound.specificity())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nth_matches() {
        let odd = Nth { a: 2, b: 1 };
        assert!(odd.matches(1));
        assert!(!odd.matches(2));
        assert!(odd.matches(3));
        let first_three = Nth { a: -1, b: 3 };
        assert!(first_three.matches(1));
        assert!(first_three.matches(3));
        assert!(!first_three.matches(4));
        let exact = Nth { a: 0, b: 2 };
        assert!(exact.matches(2));
        assert!(!exact.matches(4));
    }

    #[test]
    fn test_pseudo_element_names() {
        assert_eq!(
            "footnote-call".parse::<PseudoElement>().ok(),
            Some(PseudoElement::FootnoteCall)
        );
        assert_eq!(PseudoElement::Before.to_string(), "before");
    }

    #[test]
    fn test_inline_specificity_beats_ids() {
        assert!(Specificity::INLINE > Specificity(100, 0, 0));
    }
}
