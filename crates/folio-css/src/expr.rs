//! Value expressions: generated content and `-epubx-expr()`.
//!
//! `content` values and page margin boxes hold a list of [`Expr`] trees that
//! are evaluated lazily against an [`ExprContext`]. The box builder supplies
//! element attributes and the counter state; the page layout supplies
//! `counter(page)` and `counter(pages)`. This lets running headers update per
//! page without re-parsing the stylesheet.

use core::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::counters::{CounterStyle, format_counter};
use crate::parser::ComponentValue;
use crate::tokenizer::CSSToken;

/// Malformed expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// Input ended in the middle of an expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A component that cannot appear here.
    #[error("unexpected '{0}' in expression")]
    Unexpected(String),
    /// Wrong arguments to `attr()`, `counter()` or `counters()`.
    #[error("invalid arguments to {0}()")]
    BadArguments(String),
}

/// Binary operators of `-epubx-expr()`, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `==` or `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

impl BinaryOp {
    const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// String literal.
    Str(String),
    /// Named value, looked up in the context (`page-width`, ...).
    Ident(String),
    /// `attr(name)`
    Attr(String),
    /// `counter(name, style?)`
    Counter {
        /// Counter name.
        name: String,
        /// Formatting style.
        style: CounterStyle,
    },
    /// `counters(name, separator, style?)`
    Counters {
        /// Counter name.
        name: String,
        /// Text between nested values.
        separator: String,
        /// Formatting style.
        style: CounterStyle,
    },
    /// Unary minus.
    Neg(Box<Expr>),
    /// `!`
    Not(Box<Expr>),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
}

/// Result of evaluating an [`Expr`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprValue {
    /// A number.
    Number(f64),
    /// Text.
    Str(String),
    /// A comparison or logical result.
    Bool(bool),
}

impl ExprValue {
    /// Numeric view: strings parse, booleans are 0/1, anything else is NaN.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            Self::Bool(b) => f64::from(u8::from(*b)),
        }
    }

    /// Truthiness: non-zero numbers, non-empty strings.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Bool(b) => *b,
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// What an expression can see while it is evaluated.
pub trait ExprContext {
    /// Attribute of the element the value belongs to.
    fn attr(&self, name: &str) -> Option<String>;
    /// Innermost counter value.
    fn counter(&self, name: &str) -> Option<i32>;
    /// Every counter value in scope, outermost first.
    fn counters(&self, name: &str) -> Vec<i32>;
    /// Named value for a bare identifier.
    fn ident(&self, _name: &str) -> Option<ExprValue> {
        None
    }
}

impl Expr {
    /// Evaluate against `ctx`.
    #[must_use]
    pub fn evaluate(&self, ctx: &dyn ExprContext) -> ExprValue {
        match self {
            Self::Number(n) => ExprValue::Number(*n),
            Self::Str(s) => ExprValue::Str(s.clone()),
            Self::Ident(name) => ctx
                .ident(name)
                .unwrap_or_else(|| ExprValue::Str(name.clone())),
            Self::Attr(name) => ExprValue::Str(ctx.attr(name).unwrap_or_default()),
            // "If no counter of that name is in scope, the element behaves as
            // if a counter with value zero had been instantiated."
            Self::Counter { name, style } => {
                ExprValue::Str(format_counter(ctx.counter(name).unwrap_or(0), *style))
            }
            Self::Counters {
                name,
                separator,
                style,
            } => {
                let values = ctx.counters(name);
                let values = if values.is_empty() { vec![0] } else { values };
                ExprValue::Str(
                    values
                        .iter()
                        .map(|v| format_counter(*v, *style))
                        .collect::<Vec<_>>()
                        .join(separator),
                )
            }
            Self::Neg(inner) => ExprValue::Number(-inner.evaluate(ctx).as_number()),
            Self::Not(inner) => ExprValue::Bool(!inner.evaluate(ctx).truthy()),
            Self::Binary { op, lhs, rhs } => {
                let left = lhs.evaluate(ctx);
                // Short-circuit the logical operators.
                match op {
                    BinaryOp::And if !left.truthy() => return ExprValue::Bool(false),
                    BinaryOp::Or if left.truthy() => return ExprValue::Bool(true),
                    _ => {}
                }
                let right = rhs.evaluate(ctx);
                binary(*op, &left, &right)
            }
        }
    }

    /// Evaluate and render as text.
    #[must_use]
    pub fn text(&self, ctx: &dyn ExprContext) -> String {
        self.evaluate(ctx).to_string()
    }
}

fn binary(op: BinaryOp, left: &ExprValue, right: &ExprValue) -> ExprValue {
    let (a, b) = (left.as_number(), right.as_number());
    match op {
        BinaryOp::Or | BinaryOp::And => ExprValue::Bool(right.truthy()),
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (left, right) {
                (ExprValue::Str(x), ExprValue::Str(y)) => x == y,
                _ => a == b,
            };
            ExprValue::Bool(equal == (op == BinaryOp::Eq))
        }
        BinaryOp::Lt => ExprValue::Bool(a < b),
        BinaryOp::Le => ExprValue::Bool(a <= b),
        BinaryOp::Gt => ExprValue::Bool(a > b),
        BinaryOp::Ge => ExprValue::Bool(a >= b),
        // `+` on two strings concatenates.
        BinaryOp::Add => match (left, right) {
            (ExprValue::Str(x), ExprValue::Str(y)) if a.is_nan() || b.is_nan() => {
                ExprValue::Str(format!("{x}{y}"))
            }
            _ => ExprValue::Number(a + b),
        },
        BinaryOp::Sub => ExprValue::Number(a - b),
        BinaryOp::Mul => ExprValue::Number(a * b),
        // Division by zero yields zero rather than infinity.
        BinaryOp::Div => ExprValue::Number(if b == 0.0 { 0.0 } else { a / b }),
        BinaryOp::Rem => ExprValue::Number(if b == 0.0 { 0.0 } else { a % b }),
    }
}

/// A `content` value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Content {
    /// `normal`: `none` for `::before`/`::after`, the default marker for `::marker`.
    #[default]
    Normal,
    /// `none`: no box.
    None,
    /// A sequence of items whose texts are concatenated.
    Items(Vec<Expr>),
}

impl Content {
    /// Concatenated text of all items.
    #[must_use]
    pub fn text(&self, ctx: &dyn ExprContext) -> String {
        match self {
            Self::Items(items) => items.iter().map(|item| item.text(ctx)).collect(),
            Self::Normal | Self::None => String::new(),
        }
    }
}

/// [CSS Generated Content § 1](https://www.w3.org/TR/css-content-3/#content-property)
///
/// Parse a `content` value. Quote keywords produce typographic quotes.
///
/// # Errors
///
/// Returns an error for components that cannot appear in `content`.
pub fn parse_content(values: &[ComponentValue]) -> Result<Content, ExprError> {
    let items: Vec<&ComponentValue> = values.iter().filter(|v| !v.is_whitespace()).collect();
    if let [single] = items.as_slice()
        && let Some(ident) = single.as_ident()
    {
        if ident.eq_ignore_ascii_case("normal") {
            return Ok(Content::Normal);
        }
        if ident.eq_ignore_ascii_case("none") {
            return Ok(Content::None);
        }
    }
    let mut out = Vec::new();
    for item in items {
        let expr = match item {
            ComponentValue::Token(CSSToken::String(s)) => Expr::Str(s.clone()),
            ComponentValue::Token(CSSToken::Ident(ident)) => {
                match ident.to_ascii_lowercase().as_str() {
                    "open-quote" => Expr::Str("\u{201c}".into()),
                    "close-quote" => Expr::Str("\u{201d}".into()),
                    "no-open-quote" | "no-close-quote" => continue,
                    _ => return Err(ExprError::Unexpected(ident.clone())),
                }
            }
            ComponentValue::Function { .. } => parse_function(item)?,
            other => return Err(ExprError::Unexpected(other.to_string())),
        };
        out.push(expr);
    }
    Ok(Content::Items(out))
}

/// Split function arguments on top-level commas, dropping whitespace.
fn arguments(args: &[ComponentValue]) -> Vec<Vec<&ComponentValue>> {
    args.split(|v| matches!(v, ComponentValue::Token(CSSToken::Comma)))
        .map(|part| part.iter().filter(|v| !v.is_whitespace()).collect())
        .collect()
}

fn single_ident(part: Option<&Vec<&ComponentValue>>) -> Option<String> {
    match part.map(Vec::as_slice) {
        Some([value]) => value.as_ident().map(str::to_string),
        _ => None,
    }
}

fn counter_style(part: Option<&Vec<&ComponentValue>>, function: &str) -> Result<CounterStyle, ExprError> {
    match part {
        None => Ok(CounterStyle::Decimal),
        Some(_) => single_ident(part)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ExprError::BadArguments(function.to_string())),
    }
}

fn parse_function(value: &ComponentValue) -> Result<Expr, ExprError> {
    let ComponentValue::Function { name, value: args } = value else {
        return Err(ExprError::Unexpected(value.to_string()));
    };
    let lower = name.to_ascii_lowercase();
    let parts = arguments(args);
    let bad = || ExprError::BadArguments(lower.clone());
    match lower.as_str() {
        "attr" => single_ident(parts.first()).map(Expr::Attr).ok_or_else(bad),
        "counter" => {
            if parts.len() > 2 {
                return Err(bad());
            }
            Ok(Expr::Counter {
                name: single_ident(parts.first()).ok_or_else(bad)?,
                style: counter_style(parts.get(1), &lower)?,
            })
        }
        "counters" => {
            if !(2..=3).contains(&parts.len()) {
                return Err(bad());
            }
            let separator = match parts[1].as_slice() {
                [ComponentValue::Token(CSSToken::String(s))] => s.clone(),
                _ => return Err(bad()),
            };
            Ok(Expr::Counters {
                name: single_ident(parts.first()).ok_or_else(bad)?,
                separator,
                style: counter_style(parts.get(2), &lower)?,
            })
        }
        "-epubx-expr" | "-adapt-expr" => parse_expr(args),
        _ => Err(ExprError::Unexpected(format!("{name}("))),
    }
}

/// Parse the body of `-epubx-expr(...)`.
///
/// # Errors
///
/// Returns an error when the arguments are not a well-formed expression.
pub fn parse_expr(values: &[ComponentValue]) -> Result<Expr, ExprError> {
    let items: Vec<&ComponentValue> = values.iter().filter(|v| !v.is_whitespace()).collect();
    let mut parser = ExprParser {
        items,
        position: 0,
    };
    let expr = parser.parse_binary(0)?;
    match parser.items.get(parser.position) {
        None => Ok(expr),
        Some(extra) => Err(ExprError::Unexpected(extra.to_string())),
    }
}

struct ExprParser<'a> {
    items: Vec<&'a ComponentValue>,
    position: usize,
}

impl ExprParser<'_> {
    fn delim(&self, offset: usize) -> Option<char> {
        match self.items.get(self.position + offset) {
            Some(ComponentValue::Token(CSSToken::Delim(c))) => Some(*c),
            _ => None,
        }
    }

    /// Peek a binary operator and its token length.
    fn peek_operator(&self) -> Option<(BinaryOp, usize)> {
        let second = self.delim(1);
        Some(match (self.delim(0)?, second) {
            ('|', Some('|')) => (BinaryOp::Or, 2),
            ('&', Some('&')) => (BinaryOp::And, 2),
            ('=', Some('=')) => (BinaryOp::Eq, 2),
            ('=', _) => (BinaryOp::Eq, 1),
            ('!', Some('=')) => (BinaryOp::Ne, 2),
            ('<', Some('=')) => (BinaryOp::Le, 2),
            ('<', _) => (BinaryOp::Lt, 1),
            ('>', Some('=')) => (BinaryOp::Ge, 2),
            ('>', _) => (BinaryOp::Gt, 1),
            ('+', _) => (BinaryOp::Add, 1),
            ('-', _) => (BinaryOp::Sub, 1),
            ('*', _) => (BinaryOp::Mul, 1),
            ('/', _) => (BinaryOp::Div, 1),
            ('%', _) => (BinaryOp::Rem, 1),
            _ => return None,
        })
    }

    /// Precedence climbing.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            // `a +1` tokenizes the sign into the number: treat it as addition.
            if let Some(ComponentValue::Token(CSSToken::Number { value, .. })) =
                self.items.get(self.position)
                && BinaryOp::Add.precedence() > min_precedence
            {
                self.position += 1;
                lhs = Expr::Binary {
                    op: BinaryOp::Add,
                    lhs: Box::new(lhs),
                    rhs: Box::new(Expr::Number(*value)),
                };
                continue;
            }
            let Some((op, width)) = self.peek_operator() else {
                break;
            };
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.position += width;
            let rhs = self.parse_binary(precedence)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        match self.delim(0) {
            Some('-') => {
                self.position += 1;
                return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
            }
            Some('!') => {
                self.position += 1;
                return Ok(Expr::Not(Box::new(self.parse_unary()?)));
            }
            _ => {}
        }
        let item = *self.items.get(self.position).ok_or(ExprError::UnexpectedEnd)?;
        self.position += 1;
        match item {
            ComponentValue::Token(CSSToken::Number { value, .. }) => Ok(Expr::Number(*value)),
            ComponentValue::Token(CSSToken::Percentage(value)) => Ok(Expr::Number(value / 100.0)),
            ComponentValue::Token(CSSToken::String(s)) => Ok(Expr::Str(s.clone())),
            ComponentValue::Token(CSSToken::Ident(name)) => Ok(Expr::Ident(name.clone())),
            ComponentValue::Block { token: '(', value } => parse_expr(value),
            ComponentValue::Function { .. } => parse_function(item),
            other => Err(ExprError::Unexpected(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_value;
    use std::collections::HashMap;

    struct Ctx {
        counters: HashMap<&'static str, Vec<i32>>,
    }

    impl ExprContext for Ctx {
        fn attr(&self, name: &str) -> Option<String> {
            (name == "title").then(|| "Intro".to_string())
        }
        fn counter(&self, name: &str) -> Option<i32> {
            self.counters.get(name).and_then(|v| v.last().copied())
        }
        fn counters(&self, name: &str) -> Vec<i32> {
            self.counters.get(name).cloned().unwrap_or_default()
        }
    }

    fn ctx() -> Ctx {
        let mut counters = HashMap::new();
        let _ = counters.insert("page", vec![3]);
        let _ = counters.insert("section", vec![2, 4]);
        Ctx { counters }
    }

    fn content(text: &str) -> Content {
        parse_content(&parse_value(text)).expect("valid content")
    }

    #[test]
    fn test_content_concatenation() {
        let value = content(r#""Page " counter(page, upper-roman) " of " attr(title)"#);
        assert_eq!(value.text(&ctx()), "Page III of Intro");
    }

    #[test]
    fn test_counters_separator() {
        let value = content(r#"counters(section, ".") " ""#);
        assert_eq!(value.text(&ctx()), "2.4 ");
        assert_eq!(content("counter(missing)").text(&ctx()), "0");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(content("none"), Content::None);
        assert_eq!(content("normal"), Content::Normal);
        assert!(parse_content(&parse_value("bogus")).is_err());
    }

    #[test]
    fn test_epubx_expr_arithmetic_and_logic() {
        let value = content("-epubx-expr(counter(page) * 2 + 1)");
        assert_eq!(value.text(&ctx()), "7");
        let value = content("-epubx-expr(2 + 3 * 4 - 1)");
        assert_eq!(value.text(&ctx()), "13");
        let value = content("-epubx-expr(1 < 2 && !(3 == 4))");
        assert_eq!(value.text(&ctx()), "true");
        let value = content("-epubx-expr(10 / 0)");
        assert_eq!(value.text(&ctx()), "0");
    }

    #[test]
    fn test_signed_number_after_operand() {
        let expr = parse_expr(&parse_value("5 -1")).expect("valid");
        assert_eq!(expr.evaluate(&ctx()), ExprValue::Number(4.0));
    }
}
