//! [§ 4 Selector syntax](https://www.w3.org/TR/selectors-4/#syntax)
//!
//! Selectors are parsed straight from the qualified rule's prelude tokens.
//! An invalid selector anywhere in a list invalidates the whole list, per
//! [§ 3.1](https://www.w3.org/TR/selectors-4/#invalid).

use thiserror::Error;

use super::{
    AttributeOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector,
    NamespaceConstraint, NamespaceMap, Nth, ParsedSelector, PseudoClass, PseudoElement,
    SimpleSelector, Specificity,
};
use crate::tokenizer::{CSSToken, CSSTokenizer};

/// Why a selector was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The prelude was empty or a list item was empty.
    #[error("empty selector")]
    Empty,
    /// A token that cannot appear at this point.
    #[error("unexpected '{0}' in selector")]
    Unexpected(String),
    /// A namespace prefix with no `@namespace` declaration.
    #[error("undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),
    /// An unsupported or misspelled pseudo-element.
    #[error("unknown pseudo-element '{0}'")]
    UnknownPseudoElement(String),
    /// Something followed a pseudo-element.
    #[error("pseudo-element must be last in a selector")]
    PseudoElementNotLast,
    /// Malformed `an+b` argument.
    #[error("invalid an+b expression '{0}'")]
    InvalidNth(String),
}

/// Parse a selector from text, e.g. for tests and the `folio` CLI.
///
/// # Errors
///
/// Returns [`SelectorError`] when the text is not a single valid selector.
pub fn parse_selector(text: &str) -> Result<ParsedSelector, SelectorError> {
    let mut tokenizer = CSSTokenizer::new(text);
    tokenizer.run();
    let tokens = tokenizer.into_tokens();
    let mut list = parse_selector_list(&tokens, &NamespaceMap::new())?;
    if list.len() != 1 {
        return Err(SelectorError::Unexpected(",".to_string()));
    }
    list.pop().ok_or(SelectorError::Empty)
}

/// [§ 5.1 Selector Lists](https://www.w3.org/TR/selectors-4/#selector-list)
///
/// "A selector list is a comma-separated list of selectors."
///
/// # Errors
///
/// Returns the first [`SelectorError`]; the caller drops the whole rule.
pub fn parse_selector_list(
    tokens: &[CSSToken],
    namespaces: &NamespaceMap,
) -> Result<Vec<ParsedSelector>, SelectorError> {
    tokens
        .split(|t| *t == CSSToken::Comma)
        .map(|part| {
            let part: Vec<&CSSToken> = part.iter().filter(|t| !t.is_eof()).collect();
            SelectorParser {
                tokens: part,
                position: 0,
                namespaces,
            }
            .parse_complex()
        })
        .collect()
}

struct SelectorParser<'a> {
    tokens: Vec<&'a CSSToken>,
    position: usize,
    namespaces: &'a NamespaceMap,
}

impl<'a> SelectorParser<'a> {
    fn parse_complex(&mut self) -> Result<ParsedSelector, SelectorError> {
        let _ = self.skip_whitespace();
        let mut compounds: Vec<CompoundSelector> = Vec::new();
        let mut combinators: Vec<Combinator> = Vec::new();
        let mut pseudo_element = None;

        loop {
            if pseudo_element.is_some() {
                let _ = self.skip_whitespace();
                if self.peek().is_some() {
                    return Err(SelectorError::PseudoElementNotLast);
                }
                break;
            }
            let (compound, pseudo) = self.parse_compound()?;
            if compound.simple_selectors.is_empty() && pseudo.is_none() {
                return Err(match self.peek() {
                    Some(token) => SelectorError::Unexpected(token.to_string()),
                    None => SelectorError::Empty,
                });
            }
            compounds.push(compound);
            pseudo_element = pseudo;
            if pseudo_element.is_some() {
                continue;
            }

            let saw_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None => break,
                Some(CSSToken::Delim('>')) => Combinator::Child,
                Some(CSSToken::Delim('+')) => Combinator::NextSibling,
                Some(CSSToken::Delim('~')) => Combinator::SubsequentSibling,
                Some(_) if saw_space => {
                    combinators.push(Combinator::Descendant);
                    continue;
                }
                Some(token) => return Err(SelectorError::Unexpected(token.to_string())),
            };
            self.position += 1;
            let _ = self.skip_whitespace();
            combinators.push(combinator);
        }

        if compounds.len() != combinators.len() + 1 {
            return Err(SelectorError::Empty);
        }
        let subject = compounds.pop().unwrap_or_default();
        let chain: Vec<(Combinator, CompoundSelector)> = combinators
            .into_iter()
            .rev()
            .zip(compounds.into_iter().rev())
            .collect();
        let complex = ComplexSelector {
            subject,
            combinators: chain,
        };
        let mut specificity = complex.calculate_specificity();
        if pseudo_element.is_some() {
            specificity = Specificity(specificity.0, specificity.1, specificity.2 + 1);
        }
        Ok(ParsedSelector {
            complex,
            pseudo_element,
            specificity,
        })
    }

    /// [§ 4.2 Compound selectors](https://www.w3.org/TR/selectors-4/#compound)
    fn parse_compound(
        &mut self,
    ) -> Result<(CompoundSelector, Option<PseudoElement>), SelectorError> {
        let mut simple = Vec::new();
        if let Some(type_selector) = self.parse_type_selector()? {
            simple.push(type_selector);
        }
        loop {
            match self.peek() {
                Some(CSSToken::Hash { value, .. }) => {
                    simple.push(SimpleSelector::Id(value.clone()));
                    self.position += 1;
                }
                Some(CSSToken::Delim('.')) => {
                    self.position += 1;
                    match self.next() {
                        Some(CSSToken::Ident(class)) => {
                            simple.push(SimpleSelector::Class(class.clone()));
                        }
                        other => return Err(unexpected(other)),
                    }
                }
                Some(CSSToken::LeftBracket) => {
                    self.position += 1;
                    simple.push(SimpleSelector::Attribute(self.parse_attribute()?));
                }
                Some(CSSToken::Colon) => {
                    self.position += 1;
                    if self.peek() == Some(&CSSToken::Colon) {
                        self.position += 1;
                        let name = match self.next() {
                            Some(CSSToken::Ident(name)) => name.to_ascii_lowercase(),
                            other => return Err(unexpected(other)),
                        };
                        let pseudo = name
                            .parse::<PseudoElement>()
                            .map_err(|_| SelectorError::UnknownPseudoElement(name))?;
                        return Ok((CompoundSelector { simple_selectors: simple }, Some(pseudo)));
                    }
                    match self.parse_pseudo_class()? {
                        PseudoOrLegacy::Class(selector) => simple.push(selector),
                        // CSS 2 single-colon pseudo-elements.
                        PseudoOrLegacy::Element(pseudo) => {
                            return Ok((
                                CompoundSelector {
                                    simple_selectors: simple,
                                },
                                Some(pseudo),
                            ));
                        }
                    }
                }
                _ => break,
            }
        }
        Ok((
            CompoundSelector {
                simple_selectors: simple,
            },
            None,
        ))
    }

    /// [§ 5.1 Type selector](https://www.w3.org/TR/selectors-4/#type-selectors) with an
    /// optional [namespace prefix](https://www.w3.org/TR/selectors-4/#type-nmsp).
    fn parse_type_selector(&mut self) -> Result<Option<SimpleSelector>, SelectorError> {
        let first = match self.peek() {
            Some(CSSToken::Ident(name)) => Some(name.clone()),
            Some(CSSToken::Delim('*')) => Some("*".to_string()),
            Some(CSSToken::Delim('|')) => None,
            _ => return Ok(None),
        };
        let (namespace, name) = if self.peek_at(1) == Some(&CSSToken::Delim('|'))
            && first.is_some()
            && matches!(self.peek_at(2), Some(CSSToken::Ident(_) | CSSToken::Delim('*')))
        {
            let prefix = first.unwrap_or_default();
            self.position += 2;
            let namespace = if prefix == "*" {
                NamespaceConstraint::Any
            } else {
                NamespaceConstraint::Uri(
                    self.namespaces
                        .get(&prefix)
                        .cloned()
                        .ok_or(SelectorError::UnknownPrefix(prefix))?,
                )
            };
            (namespace, self.take_name())
        } else if first.is_none() {
            // `|name`: no namespace.
            self.position += 1;
            (NamespaceConstraint::None, self.take_name())
        } else {
            let default = self
                .namespaces
                .get("")
                .map_or(NamespaceConstraint::Any, |uri| {
                    NamespaceConstraint::Uri(uri.clone())
                });
            (default, self.take_name())
        };
        Ok(match name {
            Some(name) if name == "*" => Some(SimpleSelector::Universal(namespace)),
            Some(name) => Some(SimpleSelector::Type { namespace, name }),
            None => None,
        })
    }

    fn take_name(&mut self) -> Option<String> {
        let name = match self.peek() {
            Some(CSSToken::Ident(name)) => name.clone(),
            Some(CSSToken::Delim('*')) => "*".to_string(),
            _ => return None,
        };
        self.position += 1;
        Some(name)
    }

    /// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
    ///
    /// The opening `[` was consumed.
    fn parse_attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        let _ = self.skip_whitespace();
        let mut any_namespace = false;
        let mut name = match self.next() {
            Some(CSSToken::Ident(name)) => name.clone(),
            Some(CSSToken::Delim('*')) => {
                any_namespace = true;
                String::new()
            }
            other => return Err(unexpected(other)),
        };
        // `prefix|name`; careful not to swallow the `|=` operator.
        if self.peek() == Some(&CSSToken::Delim('|'))
            && matches!(self.peek_at(1), Some(CSSToken::Ident(_)))
        {
            self.position += 1;
            let local = match self.next() {
                Some(CSSToken::Ident(local)) => local.clone(),
                other => return Err(unexpected(other)),
            };
            if any_namespace {
                name = local;
            } else {
                if !self.namespaces.contains_key(&name) {
                    return Err(SelectorError::UnknownPrefix(name));
                }
                name = format!("{name}:{local}");
            }
        } else if any_namespace {
            return Err(SelectorError::Unexpected("*".to_string()));
        }
        let _ = self.skip_whitespace();

        let operator = match self.next() {
            Some(CSSToken::RightBracket) => {
                return Ok(AttributeSelector {
                    name,
                    any_namespace,
                    operator: AttributeOperator::Exists,
                    value: String::new(),
                    case_insensitive: false,
                });
            }
            Some(CSSToken::Delim('=')) => AttributeOperator::Equals,
            Some(CSSToken::Delim(c @ ('~' | '|' | '^' | '$' | '*'))) => {
                let operator = match c {
                    '~' => AttributeOperator::Includes,
                    '|' => AttributeOperator::DashMatch,
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    _ => AttributeOperator::Substring,
                };
                match self.next() {
                    Some(CSSToken::Delim('=')) => operator,
                    other => return Err(unexpected(other)),
                }
            }
            other => return Err(unexpected(other)),
        };
        let _ = self.skip_whitespace();
        let value = match self.next() {
            Some(CSSToken::Ident(v) | CSSToken::String(v)) => v.clone(),
            Some(CSSToken::Number { value, .. }) => value.to_string(),
            other => return Err(unexpected(other)),
        };
        let _ = self.skip_whitespace();
        let case_insensitive = match self.peek() {
            Some(CSSToken::Ident(flag)) if flag.eq_ignore_ascii_case("i") => {
                self.position += 1;
                let _ = self.skip_whitespace();
                true
            }
            _ => false,
        };
        match self.next() {
            Some(CSSToken::RightBracket) => Ok(AttributeSelector {
                name,
                any_namespace,
                operator,
                value,
                case_insensitive,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// The `:` was consumed.
    fn parse_pseudo_class(&mut self) -> Result<PseudoOrLegacy, SelectorError> {
        match self.next() {
            Some(CSSToken::Ident(name)) => {
                let name = name.to_ascii_lowercase();
                let pc = match name.as_str() {
                    "root" => PseudoClass::Root,
                    "first-child" => PseudoClass::FirstChild,
                    "last-child" => PseudoClass::LastChild,
                    "only-child" => PseudoClass::OnlyChild,
                    "first-of-type" => PseudoClass::FirstOfType,
                    "last-of-type" => PseudoClass::LastOfType,
                    "only-of-type" => PseudoClass::OnlyOfType,
                    "empty" => PseudoClass::Empty,
                    "link" | "any-link" => PseudoClass::Link,
                    "before" | "after" | "first-letter" | "first-line" => {
                        let pseudo = name
                            .parse::<PseudoElement>()
                            .map_err(|_| SelectorError::UnknownPseudoElement(name.clone()))?;
                        return Ok(PseudoOrLegacy::Element(pseudo));
                    }
                    _ => return Ok(PseudoOrLegacy::Class(SimpleSelector::NeverMatch)),
                };
                Ok(PseudoOrLegacy::Class(SimpleSelector::PseudoClass(pc)))
            }
            Some(CSSToken::Function(name)) => {
                let name = name.to_ascii_lowercase();
                let args = self.take_arguments();
                let pc = match name.as_str() {
                    "nth-child" => PseudoClass::NthChild(parse_nth(&args)?),
                    "nth-last-child" => PseudoClass::NthLastChild(parse_nth(&args)?),
                    "nth-of-type" => PseudoClass::NthOfType(parse_nth(&args)?),
                    "nth-last-of-type" => PseudoClass::NthLastOfType(parse_nth(&args)?),
                    "lang" => match args.iter().find(|t| !t.is_whitespace()) {
                        Some(CSSToken::Ident(code) | CSSToken::String(code)) => {
                            PseudoClass::Lang(code.clone())
                        }
                        other => return Err(unexpected(other.copied())),
                    },
                    "not" => {
                        let mut inner = SelectorParser {
                            tokens: args,
                            position: 0,
                            namespaces: self.namespaces,
                        };
                        let _ = inner.skip_whitespace();
                        let (compound, pseudo) = inner.parse_compound()?;
                        let _ = inner.skip_whitespace();
                        if pseudo.is_some() || inner.peek().is_some() {
                            return Err(SelectorError::Unexpected("not(".to_string()));
                        }
                        PseudoClass::Not(Box::new(compound))
                    }
                    _ => return Ok(PseudoOrLegacy::Class(SimpleSelector::NeverMatch)),
                };
                Ok(PseudoOrLegacy::Class(SimpleSelector::PseudoClass(pc)))
            }
            other => Err(unexpected(other)),
        }
    }

    /// Tokens up to the `)` that closes the current function token.
    fn take_arguments(&mut self) -> Vec<&'a CSSToken> {
        let mut depth = 0usize;
        let mut args = Vec::new();
        while let Some(token) = self.next() {
            match token {
                CSSToken::RightParen if depth == 0 => break,
                CSSToken::RightParen => depth -= 1,
                CSSToken::LeftParen | CSSToken::Function(_) => depth += 1,
                _ => {}
            }
            args.push(token);
        }
        args
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.position;
        while self.peek().is_some_and(|t| t.is_whitespace()) {
            self.position += 1;
        }
        self.position > start
    }

    fn peek(&self) -> Option<&'a CSSToken> {
        self.tokens.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<&'a CSSToken> {
        self.tokens.get(self.position + offset).copied()
    }

    fn next(&mut self) -> Option<&'a CSSToken> {
        let token = self.tokens.get(self.position).copied()?;
        self.position += 1;
        Some(token)
    }
}

enum PseudoOrLegacy {
    Class(SimpleSelector),
    Element(PseudoElement),
}

fn unexpected(token: Option<&CSSToken>) -> SelectorError {
    token.map_or(SelectorError::Empty, |t| {
        SelectorError::Unexpected(t.to_string())
    })
}

/// [§ 6 The An+B microsyntax](https://www.w3.org/TR/css-syntax-3/#anb-microsyntax)
///
/// The tokenizer splits `2n+1` into a dimension and a signed number, so the
/// tokens are first re-joined with explicit signs and then read as text.
fn parse_nth(args: &[&CSSToken]) -> Result<Nth, SelectorError> {
    let mut text = String::new();
    let mut after_sign = false;
    for token in args.iter().filter(|t| !t.is_whitespace()) {
        match token {
            CSSToken::Ident(s) => text.push_str(s),
            CSSToken::Dimension { value, unit, .. } => text.push_str(&format!("{value}{unit}")),
            CSSToken::Number { value, .. } => {
                if *value >= 0.0 && !after_sign && !text.is_empty() {
                    text.push('+');
                }
                text.push_str(&value.to_string());
            }
            CSSToken::Delim(c @ ('+' | '-')) => text.push(*c),
            other => return Err(SelectorError::InvalidNth(other.to_string())),
        }
        after_sign = matches!(token, CSSToken::Delim('+' | '-'));
    }
    let text = text.to_ascii_lowercase();
    let invalid = || SelectorError::InvalidNth(text.clone());
    match text.as_str() {
        "odd" => return Ok(Nth { a: 2, b: 1 }),
        "even" => return Ok(Nth { a: 2, b: 0 }),
        "" => return Err(invalid()),
        _ => {}
    }
    let Some((a_part, b_part)) = text.split_once('n') else {
        return text.parse().map(|b| Nth { a: 0, b }).map_err(|_| invalid());
    };
    let a = match a_part {
        "" | "+" => 1,
        "-" => -1,
        other => other.parse().map_err(|_| invalid())?,
    };
    let b = if b_part.is_empty() {
        0
    } else {
        b_part.parse().map_err(|_| invalid())?
    };
    Ok(Nth { a, b })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<CSSToken> {
        let mut tokenizer = CSSTokenizer::new(text);
        tokenizer.run();
        tokenizer.into_tokens()
    }

    #[test]
    fn test_compound_with_class_and_id() {
        let selector = parse_selector("p.note#first").expect("valid");
        assert_eq!(selector.specificity, Specificity(1, 1, 1));
        assert!(selector.is_simple());
    }

    #[test]
    fn test_combinators_are_right_to_left() {
        let selector = parse_selector("div > ul li").expect("valid");
        assert_eq!(selector.complex.combinators.len(), 2);
        assert_eq!(selector.complex.combinators[0].0, Combinator::Descendant);
        assert_eq!(selector.complex.combinators[1].0, Combinator::Child);
    }

    #[test]
    fn test_nth_forms() {
        let nth = |s: &str| {
            let toks = tokens(s);
            let refs: Vec<&CSSToken> = toks.iter().filter(|t| !t.is_eof()).collect();
            parse_nth(&refs)
        };
        assert_eq!(nth("2n+1"), Ok(Nth { a: 2, b: 1 }));
        assert_eq!(nth("2n - 1"), Ok(Nth { a: 2, b: -1 }));
        assert_eq!(nth("-n+3"), Ok(Nth { a: -1, b: 3 }));
        assert_eq!(nth("odd"), Ok(Nth { a: 2, b: 1 }));
        assert_eq!(nth("5"), Ok(Nth { a: 0, b: 5 }));
        assert!(nth("foo").is_err());
    }

    #[test]
    fn test_pseudo_element_must_be_last() {
        assert_eq!(
            parse_selector("p::before.x"),
            Err(SelectorError::PseudoElementNotLast)
        );
        let selector = parse_selector("li::marker").expect("valid");
        assert_eq!(selector.pseudo_element, Some(PseudoElement::Marker));
        assert_eq!(selector.specificity, Specificity(0, 0, 2));
    }

    #[test]
    fn test_legacy_single_colon_pseudo_element() {
        let selector = parse_selector("p:before").expect("valid");
        assert_eq!(selector.pseudo_element, Some(PseudoElement::Before));
    }

    #[test]
    fn test_namespaced_attribute() {
        let mut ns = NamespaceMap::new();
        let _ = ns.insert("epub".into(), "http://www.idpf.org/2007/ops".into());
        let list = parse_selector_list(&tokens("aside[epub|type~=footnote]"), &ns).expect("valid");
        let SimpleSelector::Attribute(attr) = &list[0].complex.subject.simple_selectors[1] else {
            panic!("expected attribute selector");
        };
        assert_eq!(attr.name, "epub:type");
        assert_eq!(attr.operator, AttributeOperator::Includes);
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        let result = parse_selector_list(&tokens("svg|rect"), &NamespaceMap::new());
        assert_eq!(result, Err(SelectorError::UnknownPrefix("svg".into())));
    }

    #[test]
    fn test_list_fails_as_a_whole() {
        assert!(parse_selector_list(&tokens("p, ::bogus"), &NamespaceMap::new()).is_err());
        assert_eq!(
            parse_selector_list(&tokens("h1, h2"), &NamespaceMap::new())
                .map(|l| l.len())
                .ok(),
            Some(2)
        );
    }

    #[test]
    fn test_not_specificity_uses_argument() {
        let selector = parse_selector("p:not(#x)").expect("valid");
        assert_eq!(selector.specificity, Specificity(1, 0, 1));
    }

    #[test]
    fn test_dash_match_operator_not_namespace() {
        let selector = parse_selector("[lang|=en]").expect("valid");
        let SimpleSelector::Attribute(attr) = &selector.complex.subject.simple_selectors[0] else {
            panic!("expected attribute selector");
        };
        assert_eq!(attr.operator, AttributeOperator::DashMatch);
        assert_eq!(attr.name, "lang");
    }
}
