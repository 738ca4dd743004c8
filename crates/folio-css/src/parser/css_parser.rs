//! CSS Parser per [§ 5 Parsing](https://www.w3.org/TR/css-syntax-3/#parsing).
//!
//! "The input to the parsing stage is a stream of tokens from the tokenization stage."
//! Rules keep their prelude as raw tokens; selector lists, media query lists
//! and page selectors are interpreted by their own modules. At-rule blocks are
//! kept as raw tokens too so `@media` and `@page` can re-enter the parser with
//! the grammar that applies inside them.

use core::fmt;

use crate::tokenizer::{CSSToken, CSSTokenizer};

/// [§ 5.4.6 Consume a declaration](https://www.w3.org/TR/css-syntax-3/#consume-declaration)
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Property name, ASCII-lowercased.
    pub name: String,
    /// Value with `!important` and surrounding whitespace removed.
    pub value: Vec<ComponentValue>,
    /// Whether the declaration carried `!important`.
    pub important: bool,
    /// Position within its declaration block.
    pub source_order: usize,
}

/// [§ 5.4.8 Consume a component value](https://www.w3.org/TR/css-syntax-3/#consume-component-value)
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    /// A preserved token.
    Token(CSSToken),
    /// A function and its arguments.
    Function {
        /// Function name, as written.
        name: String,
        /// Arguments, including commas and whitespace.
        value: Vec<ComponentValue>,
    },
    /// A `()`, `[]` or `{}` block.
    Block {
        /// Opening character.
        token: char,
        /// Block contents.
        value: Vec<ComponentValue>,
    },
}

impl ComponentValue {
    /// True for a whitespace token.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        matches!(self, Self::Token(CSSToken::Whitespace))
    }

    /// The identifier, if this is an ident token.
    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Token(CSSToken::Ident(v)) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(token) => write!(f, "{token}"),
            Self::Function { name, value } => {
                write!(f, "{name}(")?;
                for v in value {
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Self::Block { token, value } => {
                let close = match token {
                    '[' => ']',
                    '{' => '}',
                    _ => ')',
                };
                write!(f, "{token}")?;
                for v in value {
                    write!(f, "{v}")?;
                }
                write!(f, "{close}")
            }
        }
    }
}

/// [§ 5.4.3 Consume a qualified rule](https://www.w3.org/TR/css-syntax-3/#consume-qualified-rule)
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    /// Selector list tokens, unparsed.
    pub prelude: Vec<CSSToken>,
    /// Declarations in the block.
    pub declarations: Vec<Declaration>,
    /// Line the rule started on.
    pub line: u32,
}

/// [§ 5.4.2 Consume an at-rule](https://www.w3.org/TR/css-syntax-3/#consume-at-rule)
#[derive(Debug, Clone, PartialEq)]
pub struct AtRule {
    /// Name without the `@`, ASCII-lowercased.
    pub name: String,
    /// Tokens between the name and the block or semicolon.
    pub prelude: Vec<CSSToken>,
    /// Tokens inside the `{}` block, if there was one.
    pub block: Option<Vec<CSSToken>>,
    /// Line the rule started on.
    pub line: u32,
}

/// A top-level rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// A qualified (style) rule.
    Style(StyleRule),
    /// An at-rule.
    At(AtRule),
}

/// [§ 5.3.3 Parse a stylesheet](https://www.w3.org/TR/css-syntax-3/#parse-stylesheet)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    /// Rules in source order.
    pub rules: Vec<Rule>,
    /// Recoverable problems found while parsing.
    pub issues: Vec<ParseIssue>,
}

impl Stylesheet {
    /// [CSS Cascade § 2](https://www.w3.org/TR/css-cascade-4/#at-import)
    ///
    /// Targets of the sheet's `@import` rules in order.
    #[must_use]
    pub fn imports(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|rule| match rule {
                Rule::At(at) if at.name == "import" => at.prelude.iter().find_map(|t| match t {
                    CSSToken::String(s) | CSSToken::Url(s) => Some(s.clone()),
                    _ => None,
                }),
                _ => None,
            })
            .collect()
    }
}

/// A localized parse error. The offending construct was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based source line, 0 when unknown.
    pub line: u32,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// Recursive-descent parser over a token list.
pub struct CSSParser {
    tokens: Vec<CSSToken>,
    lines: Vec<u32>,
    position: usize,
    issues: Vec<ParseIssue>,
}

impl CSSParser {
    /// Create a parser from tokens without line information.
    pub fn new(tokens: Vec<CSSToken>) -> Self {
        Self {
            tokens,
            lines: Vec::new(),
            position: 0,
            issues: Vec::new(),
        }
    }

    /// Tokenize `css` and create a parser that reports line numbers.
    pub fn from_css(css: &str) -> Self {
        let mut tokenizer = CSSTokenizer::new(css);
        tokenizer.run();
        let (tokens, lines) = tokenizer.into_parts();
        Self {
            tokens,
            lines,
            position: 0,
            issues: Vec::new(),
        }
    }

    /// [§ 5.3.3 Parse a stylesheet](https://www.w3.org/TR/css-syntax-3/#parse-stylesheet)
    pub fn parse_stylesheet(mut self) -> Stylesheet {
        // "Consume a list of rules from input, with the top-level flag set."
        let rules = self.consume_list_of_rules(true);
        Stylesheet {
            rules,
            issues: self.issues,
        }
    }

    /// Parse the contents of a `{}` block that holds rules (the body of `@media`).
    pub fn parse_rule_list(mut self) -> Stylesheet {
        let rules = self.consume_list_of_rules(false);
        Stylesheet {
            rules,
            issues: self.issues,
        }
    }

    /// [§ 5.3.8 Parse a list of declarations](https://www.w3.org/TR/css-syntax-3/#parse-list-of-declarations)
    ///
    /// Used for `style` attributes and `@page` bodies. Nested at-rules (page
    /// margin boxes) are returned alongside the declarations.
    pub fn parse_declaration_list(mut self) -> (Vec<Declaration>, Vec<AtRule>, Vec<ParseIssue>) {
        let (declarations, at_rules) = self.consume_list_of_declarations();
        (declarations, at_rules, self.issues)
    }

    /// [§ 5.3.10 Parse a list of component values](https://www.w3.org/TR/css-syntax-3/#parse-list-of-component-values)
    pub fn parse_component_values(mut self) -> Vec<ComponentValue> {
        let mut values = Vec::new();
        while let Some(v) = self.consume_component_value() {
            values.push(v);
        }
        values
    }

    /// [§ 5.4.1 Consume a list of rules](https://www.w3.org/TR/css-syntax-3/#consume-list-of-rules)
    fn consume_list_of_rules(&mut self, top_level: bool) -> Vec<Rule> {
        let mut rules = Vec::new();
        loop {
            match self.peek() {
                Some(CSSToken::Whitespace) => {
                    let _ = self.consume();
                }
                None | Some(CSSToken::EOF) => return rules,
                // "<CDO-token> <CDC-token>: If the top-level flag is set, do nothing."
                Some(CSSToken::CDO | CSSToken::CDC) if top_level => {
                    let _ = self.consume();
                }
                Some(CSSToken::AtKeyword(_)) => {
                    if let Some(rule) = self.consume_at_rule() {
                        rules.push(Rule::At(rule));
                    }
                }
                Some(_) => {
                    if let Some(rule) = self.consume_qualified_rule() {
                        rules.push(Rule::Style(rule));
                    }
                }
            }
        }
    }

    /// [§ 5.4.2 Consume an at-rule](https://www.w3.org/TR/css-syntax-3/#consume-at-rule)
    fn consume_at_rule(&mut self) -> Option<AtRule> {
        let line = self.current_line();
        let name = match self.consume() {
            Some(CSSToken::AtKeyword(name)) => name.to_ascii_lowercase(),
            _ => return None,
        };
        let mut prelude = Vec::new();
        loop {
            match self.peek() {
                Some(CSSToken::Semicolon) => {
                    let _ = self.consume();
                    break;
                }
                None | Some(CSSToken::EOF) => {
                    self.issue(line, format!("unterminated @{name} rule"));
                    break;
                }
                Some(CSSToken::LeftBrace) => {
                    let block = self.consume_block_tokens();
                    trim_whitespace(&mut prelude);
                    return Some(AtRule {
                        name,
                        prelude,
                        block: Some(block),
                        line,
                    });
                }
                Some(_) => self.consume_raw_component(&mut prelude),
            }
        }
        trim_whitespace(&mut prelude);
        Some(AtRule {
            name,
            prelude,
            block: None,
            line,
        })
    }

    /// [§ 5.4.3 Consume a qualified rule](https://www.w3.org/TR/css-syntax-3/#consume-qualified-rule)
    fn consume_qualified_rule(&mut self) -> Option<StyleRule> {
        let line = self.current_line();
        let mut prelude = Vec::new();
        loop {
            match self.peek() {
                // "<EOF-token>: This is a parse error. Return nothing."
                None | Some(CSSToken::EOF) => {
                    self.issue(line, "rule without a declaration block".to_string());
                    return None;
                }
                Some(CSSToken::LeftBrace) => {
                    let block = self.consume_block_tokens();
                    let mut inner = Self::new(block);
                    let (declarations, nested) = inner.consume_list_of_declarations();
                    for issue in inner.issues {
                        self.issue(line, issue.message);
                    }
                    if !nested.is_empty() {
                        self.issue(line, "at-rule inside a style rule ignored".to_string());
                    }
                    trim_whitespace(&mut prelude);
                    return Some(StyleRule {
                        prelude,
                        declarations,
                        line,
                    });
                }
                Some(_) => self.consume_raw_component(&mut prelude),
            }
        }
    }

    /// Consume a `{}` block and return the tokens between the braces.
    fn consume_block_tokens(&mut self) -> Vec<CSSToken> {
        let _ = self.consume();
        let mut depth = 0usize;
        let mut tokens = Vec::new();
        while let Some(token) = self.consume().cloned() {
            match token {
                CSSToken::EOF => break,
                CSSToken::RightBrace if depth == 0 => break,
                CSSToken::LeftBrace
                | CSSToken::LeftBracket
                | CSSToken::LeftParen
                | CSSToken::Function(_) => depth += 1,
                CSSToken::RightBrace | CSSToken::RightBracket | CSSToken::RightParen => {
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
            tokens.push(token);
        }
        tokens.push(CSSToken::EOF);
        tokens
    }

    /// Consume one component value into `out` as flat tokens.
    fn consume_raw_component(&mut self, out: &mut Vec<CSSToken>) {
        let Some(first) = self.consume().cloned() else {
            return;
        };
        let closing = match first {
            CSSToken::LeftParen | CSSToken::Function(_) => Some(CSSToken::RightParen),
            CSSToken::LeftBracket => Some(CSSToken::RightBracket),
            _ => None,
        };
        out.push(first);
        let Some(closing) = closing else {
            return;
        };
        loop {
            match self.peek() {
                None | Some(CSSToken::EOF) => return,
                Some(token) if *token == closing => {
                    out.push(closing);
                    let _ = self.consume();
                    return;
                }
                Some(_) => self.consume_raw_component(out),
            }
        }
    }

    /// [§ 5.4.5 Consume a list of declarations](https://www.w3.org/TR/css-syntax-3/#consume-list-of-declarations)
    fn consume_list_of_declarations(&mut self) -> (Vec<Declaration>, Vec<AtRule>) {
        let mut declarations = Vec::new();
        let mut at_rules = Vec::new();
        loop {
            match self.peek() {
                Some(CSSToken::Whitespace | CSSToken::Semicolon) => {
                    let _ = self.consume();
                }
                None | Some(CSSToken::EOF) => return (declarations, at_rules),
                Some(CSSToken::AtKeyword(_)) => {
                    if let Some(rule) = self.consume_at_rule() {
                        at_rules.push(rule);
                    }
                }
                Some(CSSToken::Ident(_)) => {
                    let line = self.current_line();
                    match self.consume_declaration(declarations.len()) {
                        Some(declaration) => declarations.push(declaration),
                        None => self.issue(line, "malformed declaration dropped".to_string()),
                    }
                }
                // "anything else: This is a parse error... As long as the next input
                // token is anything other than a <semicolon-token> or <EOF-token>,
                // consume a component value and throw away the returned value."
                Some(token) => {
                    let line = self.current_line();
                    let message = format!("unexpected '{token}' in declaration list");
                    self.issue(line, message);
                    while !matches!(
                        self.peek(),
                        None | Some(CSSToken::Semicolon | CSSToken::EOF)
                    ) {
                        let _ = self.consume_component_value();
                    }
                }
            }
        }
    }

    /// [§ 5.4.6 Consume a declaration](https://www.w3.org/TR/css-syntax-3/#consume-declaration)
    fn consume_declaration(&mut self, source_order: usize) -> Option<Declaration> {
        let name = match self.consume() {
            Some(CSSToken::Ident(name)) => name.to_ascii_lowercase(),
            _ => return None,
        };
        self.skip_whitespace();
        // "If the next input token is anything other than a <colon-token>, this
        // is a parse error. Return nothing."
        if self.peek() != Some(&CSSToken::Colon) {
            while !matches!(
                self.peek(),
                None | Some(CSSToken::Semicolon | CSSToken::EOF)
            ) {
                let _ = self.consume_component_value();
            }
            return None;
        }
        let _ = self.consume();
        self.skip_whitespace();

        let mut value = Vec::new();
        while !matches!(
            self.peek(),
            None | Some(CSSToken::EOF | CSSToken::Semicolon)
        ) {
            if let Some(v) = self.consume_component_value() {
                value.push(v);
            }
        }
        let important = strip_important(&mut value);
        Some(Declaration {
            name,
            value,
            important,
            source_order,
        })
    }

    /// [§ 5.4.8 Consume a component value](https://www.w3.org/TR/css-syntax-3/#consume-component-value)
    fn consume_component_value(&mut self) -> Option<ComponentValue> {
        let token = self.consume()?.clone();
        match token {
            CSSToken::EOF => None,
            CSSToken::LeftBrace | CSSToken::LeftBracket | CSSToken::LeftParen => {
                let (open, close) = match token {
                    CSSToken::LeftBrace => ('{', CSSToken::RightBrace),
                    CSSToken::LeftBracket => ('[', CSSToken::RightBracket),
                    _ => ('(', CSSToken::RightParen),
                };
                Some(ComponentValue::Block {
                    token: open,
                    value: self.consume_until(&close),
                })
            }
            CSSToken::Function(name) => Some(ComponentValue::Function {
                name,
                value: self.consume_until(&CSSToken::RightParen),
            }),
            other => Some(ComponentValue::Token(other)),
        }
    }

    fn consume_until(&mut self, close: &CSSToken) -> Vec<ComponentValue> {
        let mut value = Vec::new();
        loop {
            match self.peek() {
                Some(token) if token == close => {
                    let _ = self.consume();
                    return value;
                }
                None | Some(CSSToken::EOF) => return value,
                Some(_) => {
                    if let Some(v) = self.consume_component_value() {
                        value.push(v);
                    }
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek() == Some(&CSSToken::Whitespace) {
            let _ = self.consume();
        }
    }

    fn issue(&mut self, line: u32, message: String) {
        self.issues.push(ParseIssue { line, message });
    }

    fn current_line(&self) -> u32 {
        self.lines.get(self.position).copied().unwrap_or(0)
    }

    fn consume(&mut self) -> Option<&CSSToken> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn peek(&self) -> Option<&CSSToken> {
        self.tokens.get(self.position)
    }
}

/// Parse a full stylesheet from text.
#[must_use]
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    CSSParser::from_css(css).parse_stylesheet()
}

/// Parse the declarations of a `style` attribute.
#[must_use]
pub fn parse_declarations(css: &str) -> Vec<Declaration> {
    CSSParser::from_css(css).parse_declaration_list().0
}

/// Parse a property value from text, for values that arrive outside a stylesheet.
#[must_use]
pub fn parse_value(css: &str) -> Vec<ComponentValue> {
    let mut values = CSSParser::from_css(css).parse_component_values();
    values.retain(|v| !matches!(v, ComponentValue::Token(CSSToken::EOF)));
    trim_values(&mut values);
    values
}

/// Drop leading and trailing whitespace tokens.
pub fn trim_values(values: &mut Vec<ComponentValue>) {
    while values.last().is_some_and(ComponentValue::is_whitespace) {
        let _ = values.pop();
    }
    let leading = values.iter().take_while(|v| v.is_whitespace()).count();
    let _ = values.drain(..leading);
}

fn trim_whitespace(tokens: &mut Vec<CSSToken>) {
    while tokens.last().is_some_and(CSSToken::is_whitespace) {
        let _ = tokens.pop();
    }
    let leading = tokens.iter().take_while(|t| t.is_whitespace()).count();
    let _ = tokens.drain(..leading);
}

/// [§ 6.4.2 Important declarations](https://www.w3.org/TR/css-cascade-4/#importance)
///
/// "A declaration is important if it has a !important annotation, i.e. if the
/// last two (non-whitespace, non-comment) tokens in its value are a <delim-token>
/// with the value "!" followed by an <ident-token> with a value that is an ASCII
/// case-insensitive match for "important"."
///
/// Removes the annotation and surrounding whitespace; returns whether it was there.
fn strip_important(value: &mut Vec<ComponentValue>) -> bool {
    trim_values(value);
    let is_important = value
        .last()
        .and_then(ComponentValue::as_ident)
        .is_some_and(|s| s.eq_ignore_ascii_case("important"));
    if !is_important {
        return false;
    }
    let keep = value.len() - 1;
    let bang = value[..keep]
        .iter()
        .rposition(|v| !v.is_whitespace())
        .filter(|&i| value[i] == ComponentValue::Token(CSSToken::Delim('!')));
    let Some(bang) = bang else {
        return false;
    };
    value.truncate(bang);
    trim_values(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_rule_with_declarations() {
        let sheet = parse_stylesheet("p.x { color: blue; margin : 0 }");
        assert_eq!(sheet.rules.len(), 1);
        let Rule::Style(rule) = &sheet.rules[0] else {
            panic!("expected style rule");
        };
        assert_eq!(rule.declarations.len(), 2);
        assert_eq!(rule.declarations[0].name, "color");
        assert_eq!(rule.declarations[1].name, "margin");
        assert_eq!(rule.declarations[1].source_order, 1);
    }

    #[test]
    fn test_important_is_stripped() {
        let decls = parse_declarations("color: red ! important; width: 1px");
        assert!(decls[0].important);
        assert_eq!(decls[0].value.len(), 1);
        assert!(!decls[1].important);
    }

    #[test]
    fn test_media_block_kept_as_tokens() {
        let sheet = parse_stylesheet("@media print { p { color: green } }");
        let Rule::At(rule) = &sheet.rules[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(rule.name, "media");
        let inner = CSSParser::new(rule.block.clone().unwrap_or_default()).parse_rule_list();
        assert_eq!(inner.rules.len(), 1);
    }

    #[test]
    fn test_malformed_declaration_reports_issue() {
        let sheet = parse_stylesheet("p {\n color red; width: 1px }");
        let Rule::Style(rule) = &sheet.rules[0] else {
            panic!("expected style rule");
        };
        assert_eq!(rule.declarations.len(), 1);
        assert_eq!(sheet.issues.len(), 1);
        assert_eq!(sheet.issues[0].line, 1);
    }

    #[test]
    fn test_unterminated_rule_dropped() {
        let sheet = parse_stylesheet("p { color: red } div");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.issues.len(), 1);
    }

    #[test]
    fn test_page_block_with_margin_box() {
        let (decls, nested, _) =
            CSSParser::from_css("margin: 1in; @top-center { content: 'T' }")
                .parse_declaration_list();
        assert_eq!(decls.len(), 1);
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].name, "top-center");
    }
}
