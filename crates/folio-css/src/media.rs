//! [Media Queries Level 4](https://www.w3.org/TR/mediaqueries-4/)
//!
//! `@media` preludes are parsed once into a [`MediaQueryList`] and evaluated
//! lazily against a [`MediaEnvironment`]. The cascade keeps the vector of
//! results so a viewport change that flips no query keeps the style cache.

use serde::Serialize;

use crate::style::absolute_unit_px;
use crate::tokenizer::CSSToken;

/// The device a document is rendered for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaEnvironment {
    /// [§ 2.3 Media Types](https://www.w3.org/TR/mediaqueries-4/#media-types).
    /// Paginated output is `print`.
    pub media_type: String,
    /// Viewport width in px.
    pub width: f32,
    /// Viewport height in px.
    pub height: f32,
}

impl Default for MediaEnvironment {
    fn default() -> Self {
        Self {
            media_type: "print".to_string(),
            width: 800.0,
            height: 1000.0,
        }
    }
}

impl MediaEnvironment {
    /// A print environment of the given viewport size.
    #[must_use]
    pub fn print(width: f32, height: f32) -> Self {
        Self {
            media_type: "print".to_string(),
            width,
            height,
        }
    }
}

/// [§ 4.2 Orientation](https://www.w3.org/TR/mediaqueries-4/#orientation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// "The orientation media feature is portrait when the value of the
    /// height media feature is greater than or equal to the value of the
    /// width media feature."
    Portrait,
    /// "Otherwise orientation is landscape."
    Landscape,
}

/// One `(feature: value)` test.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFeature {
    /// `(width: L)` and its `min-`/`max-` forms; bounds are inclusive.
    Width {
        /// Lower bound in px.
        min: Option<f32>,
        /// Upper bound in px.
        max: Option<f32>,
    },
    /// `(height: L)` and its `min-`/`max-` forms.
    Height {
        /// Lower bound in px.
        min: Option<f32>,
        /// Upper bound in px.
        max: Option<f32>,
    },
    /// `(orientation: portrait|landscape)`
    Orientation(Orientation),
    /// `(color)` and similar boolean tests true for any renderer.
    Always,
    /// A feature this engine does not know. "An unknown media feature
    /// evaluates to false."
    Unknown,
}

impl MediaFeature {
    fn matches(&self, env: &MediaEnvironment) -> bool {
        let within = |v: f32, min: Option<f32>, max: Option<f32>| {
            min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m)
        };
        match self {
            Self::Width { min, max } => within(env.width, *min, *max),
            Self::Height { min, max } => within(env.height, *min, *max),
            Self::Orientation(Orientation::Portrait) => env.height >= env.width,
            Self::Orientation(Orientation::Landscape) => env.height < env.width,
            Self::Always => true,
            Self::Unknown => false,
        }
    }
}

/// [§ 3 Syntax](https://www.w3.org/TR/mediaqueries-4/#mq-syntax)
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQuery {
    /// Leading `not`.
    pub negated: bool,
    /// Media type; `None` means `all`.
    pub media_type: Option<String>,
    /// Features joined with `and`.
    pub features: Vec<MediaFeature>,
}

impl MediaQuery {
    /// "A media query that does not match the grammar ... is replaced by `not all`."
    fn not_all() -> Self {
        Self {
            negated: true,
            media_type: None,
            features: Vec::new(),
        }
    }

    /// Evaluate the query.
    #[must_use]
    pub fn matches(&self, env: &MediaEnvironment) -> bool {
        let type_ok = self
            .media_type
            .as_deref()
            .is_none_or(|t| t == "all" || t.eq_ignore_ascii_case(&env.media_type));
        let result = type_ok && self.features.iter().all(|f| f.matches(env));
        result != self.negated
    }
}

/// [§ 2.1 Combining Media Queries](https://www.w3.org/TR/mediaqueries-4/#mq-list)
///
/// "A media query list is true if any of its component media queries are
/// true, and false only if all of its component media queries are false."
/// An empty list is true.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaQueryList {
    /// Comma-separated queries.
    pub queries: Vec<MediaQuery>,
}

impl MediaQueryList {
    /// Parse an `@media` prelude.
    #[must_use]
    pub fn parse(tokens: &[CSSToken]) -> Self {
        let queries = tokens
            .split(|t| *t == CSSToken::Comma)
            .filter_map(|part| {
                let part: Vec<&CSSToken> =
                    part.iter().filter(|t| !t.is_whitespace() && !t.is_eof()).collect();
                if part.is_empty() {
                    None
                } else {
                    Some(parse_query(&part).unwrap_or_else(MediaQuery::not_all))
                }
            })
            .collect();
        Self { queries }
    }

    /// Evaluate the list.
    #[must_use]
    pub fn matches(&self, env: &MediaEnvironment) -> bool {
        self.queries.is_empty() || self.queries.iter().any(|q| q.matches(env))
    }
}

fn parse_query(tokens: &[&CSSToken]) -> Option<MediaQuery> {
    let mut query = MediaQuery {
        negated: false,
        media_type: None,
        features: Vec::new(),
    };
    let mut rest = tokens;
    if let Some(CSSToken::Ident(first)) = rest.first() {
        let first = first.to_ascii_lowercase();
        match first.as_str() {
            "not" => {
                query.negated = true;
                rest = &rest[1..];
            }
            "only" => rest = &rest[1..],
            _ => {}
        }
    }
    if let Some(CSSToken::Ident(media_type)) = rest.first() {
        query.media_type = Some(media_type.to_ascii_lowercase());
        rest = &rest[1..];
        if rest.is_empty() {
            return Some(query);
        }
        if !is_and(rest.first()) {
            return None;
        }
        rest = &rest[1..];
    } else if query.negated {
        // `not` needs a media type.
        return None;
    }
    loop {
        if rest.first() != Some(&&CSSToken::LeftParen) {
            return None;
        }
        let close = rest.iter().position(|t| **t == CSSToken::RightParen)?;
        query.features.push(parse_feature(&rest[1..close]));
        rest = &rest[close + 1..];
        if rest.is_empty() {
            return Some(query);
        }
        if !is_and(rest.first()) {
            return None;
        }
        rest = &rest[1..];
    }
}

fn is_and(token: Option<&&CSSToken>) -> bool {
    token
        .and_then(|t| t.as_ident())
        .is_some_and(|i| i.eq_ignore_ascii_case("and"))
}

/// [§ 4 Media Features](https://www.w3.org/TR/mediaqueries-4/#mq-features)
fn parse_feature(tokens: &[&CSSToken]) -> MediaFeature {
    let Some(CSSToken::Ident(name)) = tokens.first() else {
        return MediaFeature::Unknown;
    };
    let name = name.to_ascii_lowercase();
    if tokens.len() == 1 {
        return match name.as_str() {
            "color" | "width" | "height" | "orientation" | "grid" => MediaFeature::Always,
            _ => MediaFeature::Unknown,
        };
    }
    if tokens.get(1) != Some(&&CSSToken::Colon) || tokens.len() != 3 {
        return MediaFeature::Unknown;
    }
    let value = tokens[2];
    let (prefix, feature) = if let Some(f) = name.strip_prefix("min-") {
        ("min", f)
    } else if let Some(f) = name.strip_prefix("max-") {
        ("max", f)
    } else {
        ("", name.as_str())
    };
    match feature {
        "width" | "height" => {
            let Some(px) = length_px(value) else {
                return MediaFeature::Unknown;
            };
            let (min, max) = match prefix {
                "min" => (Some(px), None),
                "max" => (None, Some(px)),
                _ => (Some(px), Some(px)),
            };
            if feature == "width" {
                MediaFeature::Width { min, max }
            } else {
                MediaFeature::Height { min, max }
            }
        }
        "orientation" if prefix.is_empty() => match value.as_ident().map(str::to_ascii_lowercase).as_deref() {
            Some("portrait") => MediaFeature::Orientation(Orientation::Portrait),
            Some("landscape") => MediaFeature::Orientation(Orientation::Landscape),
            _ => MediaFeature::Unknown,
        },
        _ => MediaFeature::Unknown,
    }
}

/// Media queries evaluate `em` against the initial font size.
fn length_px(token: &CSSToken) -> Option<f32> {
    match token {
        CSSToken::Dimension { value, unit, .. } => {
            let factor = match unit.to_ascii_lowercase().as_str() {
                "em" | "rem" => 16.0,
                other => absolute_unit_px(other)?,
            };
            Some((value * factor) as f32)
        }
        CSSToken::Number { value, .. } if *value == 0.0 => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::CSSTokenizer;

    fn list(text: &str) -> MediaQueryList {
        let mut tokenizer = CSSTokenizer::new(text);
        tokenizer.run();
        MediaQueryList::parse(&tokenizer.into_tokens())
    }

    #[test]
    fn test_min_width() {
        let q = list("(min-width: 500px)");
        assert!(!q.matches(&MediaEnvironment::print(400.0, 600.0)));
        assert!(q.matches(&MediaEnvironment::print(500.0, 600.0)));
    }

    #[test]
    fn test_media_types() {
        let env = MediaEnvironment::default();
        assert!(list("print").matches(&env));
        assert!(list("all and (orientation: portrait)").matches(&env));
        assert!(!list("screen").matches(&env));
        assert!(list("not screen").matches(&env));
        assert!(list("screen, print").matches(&env));
        assert!(list("").matches(&env));
    }

    #[test]
    fn test_malformed_query_is_not_all() {
        let env = MediaEnvironment::default();
        assert!(!list("print and").matches(&env));
        assert!(!list("(max-width 10px)").matches(&env));
        assert!(!list("(hover: hover)").matches(&env));
        assert!(list("(hover: hover), print").matches(&env));
    }

    #[test]
    fn test_em_units() {
        let q = list("(max-width: 30em)");
        assert!(q.matches(&MediaEnvironment::print(480.0, 600.0)));
        assert!(!q.matches(&MediaEnvironment::print(481.0, 600.0)));
    }
}
