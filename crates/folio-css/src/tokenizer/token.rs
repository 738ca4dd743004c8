//! Token types per [§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization).

use core::fmt;

/// [§ 4 Tokenization](https://www.w3.org/TR/css-syntax-3/#tokenization)
///
/// One preprocessed token. Numeric tokens keep whether they were written as
/// integers because `an+b` microsyntax and `counter-increment` care.
#[derive(Debug, Clone, PartialEq)]
pub enum CSSToken {
    /// `<ident-token>`
    Ident(String),
    /// `<function-token>`: the name, without the opening parenthesis.
    Function(String),
    /// `<at-keyword-token>`: the name, without the `@`.
    AtKeyword(String),
    /// `<hash-token>`
    Hash {
        /// Name after the `#`.
        value: String,
        /// "type flag set to 'id'" when the value would start an identifier.
        is_id: bool,
    },
    /// `<string-token>`
    String(String),
    /// `<bad-string-token>`
    BadString,
    /// `<url-token>`
    Url(String),
    /// `<bad-url-token>`
    BadUrl,
    /// `<delim-token>`
    Delim(char),
    /// `<number-token>`
    Number {
        /// Numeric value.
        value: f64,
        /// Written without a fraction or exponent.
        integer: bool,
    },
    /// `<percentage-token>`
    Percentage(f64),
    /// `<dimension-token>`
    Dimension {
        /// Numeric value.
        value: f64,
        /// Written without a fraction or exponent.
        integer: bool,
        /// Unit, as written.
        unit: String,
    },
    /// `<whitespace-token>`
    Whitespace,
    /// `<CDO-token>`
    CDO,
    /// `<CDC-token>`
    CDC,
    /// `<colon-token>`
    Colon,
    /// `<semicolon-token>`
    Semicolon,
    /// `<comma-token>`
    Comma,
    /// `<[-token>`
    LeftBracket,
    /// `<]-token>`
    RightBracket,
    /// `<(-token>`
    LeftParen,
    /// `<)-token>`
    RightParen,
    /// `<{-token>`
    LeftBrace,
    /// `<}-token>`
    RightBrace,
    /// `<EOF-token>`
    EOF,
}

impl CSSToken {
    /// Shorthand for an integer `<number-token>`.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::Number {
            value: value as f64,
            integer: true,
        }
    }

    /// True for `<EOF-token>`.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::EOF)
    }

    /// True for `<whitespace-token>`.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        matches!(self, Self::Whitespace)
    }

    /// The identifier value, if this is an `<ident-token>`.
    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(v) => Some(v),
            _ => None,
        }
    }
}

/// [§ 9 Serialization](https://www.w3.org/TR/css-syntax-3/#serialization)
///
/// Writes the token back as CSS text. Selector and media preludes are
/// re-parsed from this form, so the output must round-trip through the
/// tokenizer for the token kinds that appear there.
impl fmt::Display for CSSToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(v) => f.write_str(v),
            Self::Function(v) => write!(f, "{v}("),
            Self::AtKeyword(v) => write!(f, "@{v}"),
            Self::Hash { value, .. } => write!(f, "#{value}"),
            Self::String(v) => write!(f, "\"{}\"", v.replace('"', "\\\"")),
            Self::Url(v) => write!(f, "url({v})"),
            Self::BadString | Self::BadUrl | Self::EOF => Ok(()),
            Self::Delim(c) => write!(f, "{c}"),
            Self::Number { value, .. } => write!(f, "{value}"),
            Self::Percentage(value) => write!(f, "{value}%"),
            Self::Dimension { value, unit, .. } => write!(f, "{value}{unit}"),
            Self::Whitespace => f.write_str(" "),
            Self::CDO => f.write_str("<!--"),
            Self::CDC => f.write_str("-->"),
            Self::Colon => f.write_str(":"),
            Self::Semicolon => f.write_str(";"),
            Self::Comma => f.write_str(","),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBrace => f.write_str("{"),
            Self::RightBrace => f.write_str("}"),
        }
    }
}
