//! [CSS Paged Media Level 3](https://www.w3.org/TR/css-page-3/)
//!
//! `@page` rules size the page box, set its margins, and fill the margin boxes
//! around the page area. Page selectors are matched per page with the page's
//! index, side and name; margin box `content` stays an expression until the
//! page is rendered, so `counter(pages)` can be filled in once the total is
//! known.

use std::collections::BTreeMap;

use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::cascade::Origin;
use crate::counters::CounterState;
use crate::expr::{Content, ExprContext, ExprValue, parse_content};
use crate::parser::{AtRule, CSSParser, ComponentValue, Declaration};
use crate::style::{
    LengthPercentage, PhysicalSide, ResolveContext, absolute_unit_px, parse_single_length,
    unprefixed,
};
use crate::tokenizer::CSSToken;

/// Left or right page of a spread.
///
/// [§ 4.3.2 Spread Pseudo-classes](https://www.w3.org/TR/css-page-3/#spread-pseudos)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PageSide {
    /// Verso.
    Left,
    /// Recto.
    Right,
}

impl PageSide {
    /// Side of the page at `index` (0-based). "In a left-to-right page
    /// progression the first page is a right page."
    #[must_use]
    pub const fn for_index(index: usize, rtl_progression: bool) -> Self {
        let first_is_right = !rtl_progression;
        if (index % 2 == 0) == first_is_right {
            Self::Right
        } else {
            Self::Left
        }
    }
}

/// What a page selector is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext<'a> {
    /// 0-based page index within the spine item.
    pub index: usize,
    /// Spread side.
    pub side: PageSide,
    /// Named page from the `page` property of the first box on the page.
    pub name: Option<&'a str>,
}

/// [§ 4.2 Page Selectors](https://www.w3.org/TR/css-page-3/#page-selectors)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSelector {
    /// Page type name.
    pub name: Option<String>,
    /// `:first`
    pub first: bool,
    /// `:left`
    pub left: bool,
    /// `:right`
    pub right: bool,
}

impl PageSelector {
    /// [§ 4.2.1 Cascading in the page context](https://www.w3.org/TR/css-page-3/#cascading-and-page-context):
    /// a page type name counts like an id, `:first` like a class, `:left`
    /// and `:right` like a type.
    #[must_use]
    pub fn specificity(&self) -> (u32, u32, u32) {
        (
            u32::from(self.name.is_some()),
            u32::from(self.first),
            u32::from(self.left) + u32::from(self.right),
        )
    }

    /// Whether the selector applies to a page.
    #[must_use]
    pub fn matches(&self, page: &PageContext<'_>) -> bool {
        self.name.as_deref().is_none_or(|n| page.name == Some(n))
            && (!self.first || page.index == 0)
            && (!self.left || page.side == PageSide::Left)
            && (!self.right || page.side == PageSide::Right)
    }

    /// Parse one comma-separated part of an `@page` prelude. An empty part is
    /// the universal page selector.
    fn parse(tokens: &[&CSSToken]) -> Option<Self> {
        let mut selector = Self::default();
        let mut rest = tokens;
        if let Some(CSSToken::Ident(name)) = rest.first() {
            selector.name = Some(name.clone());
            rest = &rest[1..];
        }
        while let [CSSToken::Colon, CSSToken::Ident(pseudo), tail @ ..] = rest {
            match pseudo.to_ascii_lowercase().as_str() {
                "first" => selector.first = true,
                "left" | "verso" => selector.left = true,
                "right" | "recto" => selector.right = true,
                _ => return None,
            }
            rest = tail;
        }
        rest.is_empty().then_some(selector)
    }
}

/// [§ 5.1 Page-Margin Boxes](https://www.w3.org/TR/css-page-3/#margin-boxes)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum MarginBoxName {
    /// `@top-left-corner`
    TopLeftCorner,
    /// `@top-left`
    TopLeft,
    /// `@top-center`
    TopCenter,
    /// `@top-right`
    TopRight,
    /// `@top-right-corner`
    TopRightCorner,
    /// `@bottom-left-corner`
    BottomLeftCorner,
    /// `@bottom-left`
    BottomLeft,
    /// `@bottom-center`
    BottomCenter,
    /// `@bottom-right`
    BottomRight,
    /// `@bottom-right-corner`
    BottomRightCorner,
    /// `@left-top`
    LeftTop,
    /// `@left-middle`
    LeftMiddle,
    /// `@left-bottom`
    LeftBottom,
    /// `@right-top`
    RightTop,
    /// `@right-middle`
    RightMiddle,
    /// `@right-bottom`
    RightBottom,
}

/// One `@page` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRule {
    /// Selector list; the rule applies if any selector matches.
    pub selectors: Vec<PageSelector>,
    /// Page box declarations.
    pub declarations: Vec<Declaration>,
    /// Margin box rules with their declarations.
    pub margin_boxes: Vec<(MarginBoxName, Vec<Declaration>)>,
    /// Cascade origin of the enclosing sheet.
    pub origin: Origin,
    /// Position among all page rules.
    pub order: usize,
}

impl PageRule {
    /// Build a page rule from an `@page` at-rule. Returns `None` for a
    /// malformed prelude; the caller logs and drops the rule.
    #[must_use]
    pub fn from_at_rule(rule: &AtRule, origin: Origin, order: usize) -> Option<Self> {
        let selectors = rule
            .prelude
            .split(|t| *t == CSSToken::Comma)
            .map(|part| {
                let part: Vec<&CSSToken> =
                    part.iter().filter(|t| !t.is_whitespace() && !t.is_eof()).collect();
                PageSelector::parse(&part)
            })
            .collect::<Option<Vec<_>>>()?;
        let (declarations, nested, _) =
            CSSParser::new(rule.block.clone().unwrap_or_default()).parse_declaration_list();
        let margin_boxes = nested
            .into_iter()
            .filter_map(|at| {
                let name = at.name.parse::<MarginBoxName>().ok()?;
                let (decls, _, _) =
                    CSSParser::new(at.block.unwrap_or_default()).parse_declaration_list();
                Some((name, decls))
            })
            .collect();
        Some(Self {
            selectors,
            declarations,
            margin_boxes,
            origin,
            order,
        })
    }

    fn best_specificity(&self, page: &PageContext<'_>) -> Option<(u32, u32, u32)> {
        self.selectors
            .iter()
            .filter(|s| s.matches(page))
            .map(PageSelector::specificity)
            .max()
    }
}

/// Resolved page box for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageStyle {
    /// Page box width in px.
    pub width: f32,
    /// Page box height in px.
    pub height: f32,
    /// Page margins, `[top, right, bottom, left]`.
    pub margin: [f32; 4],
    /// Margin box contents, evaluated when the page is rendered.
    pub margin_boxes: BTreeMap<MarginBoxName, Content>,
}

impl PageStyle {
    /// A page with no `@page` rules applied.
    #[must_use]
    pub fn new(width: f32, height: f32, margin: [f32; 4]) -> Self {
        Self {
            width,
            height,
            margin,
            margin_boxes: BTreeMap::new(),
        }
    }

    /// Width of the page area, never negative.
    #[must_use]
    pub fn content_width(&self) -> f32 {
        (self.width - self.margin[PhysicalSide::Left.index()] - self.margin[PhysicalSide::Right.index()])
            .max(0.0)
    }

    /// Height of the page area, never negative.
    #[must_use]
    pub fn content_height(&self) -> f32 {
        (self.height - self.margin[PhysicalSide::Top.index()] - self.margin[PhysicalSide::Bottom.index()])
            .max(0.0)
    }
}

/// Cascade the matching `@page` rules for one page.
///
/// `base` supplies the size and margins used when no rule sets them. Invalid
/// declarations are returned as warnings for the caller to log.
#[must_use]
pub fn resolve_page_style(
    rules: &[PageRule],
    page: &PageContext<'_>,
    base: &PageStyle,
) -> (PageStyle, Vec<String>) {
    let mut matched: Vec<(u8, (u32, u32, u32), usize, &Declaration)> = Vec::new();
    let mut boxes: Vec<(u8, (u32, u32, u32), usize, MarginBoxName, &Declaration)> = Vec::new();
    for rule in rules {
        let Some(specificity) = rule.best_specificity(page) else {
            continue;
        };
        for decl in &rule.declarations {
            matched.push((rule.origin.tier(decl.important), specificity, rule.order, decl));
        }
        for (name, decls) in &rule.margin_boxes {
            for decl in decls {
                boxes.push((rule.origin.tier(decl.important), specificity, rule.order, *name, decl));
            }
        }
    }
    matched.sort_by(|a, b| (a.0, a.1, a.2, a.3.source_order).cmp(&(b.0, b.1, b.2, b.3.source_order)));
    boxes.sort_by(|a, b| (a.0, a.1, a.2, a.4.source_order).cmp(&(b.0, b.1, b.2, b.4.source_order)));

    let mut style = base.clone();
    let mut warnings = Vec::new();
    // Size first so percentage margins see the final page box.
    for (_, _, _, decl) in matched.iter().filter(|m| unprefixed(&m.3.name) == "size") {
        match parse_page_size(&decl.value) {
            Some(size) => {
                if let Some((w, h)) = size {
                    style.width = w;
                    style.height = h;
                }
            }
            None => warnings.push(format!("invalid @page size: {}", join(&decl.value))),
        }
    }
    for (_, _, _, decl) in &matched {
        let name = unprefixed(&decl.name);
        if name == "size" {
            continue;
        }
        if !apply_page_margin(&mut style, name, &decl.value) {
            warnings.push(format!("unsupported @page declaration '{}'", decl.name));
        }
    }
    for (_, _, _, name, decl) in boxes {
        if unprefixed(&decl.name) != "content" {
            continue;
        }
        match parse_content(&decl.value) {
            Ok(content) => {
                let _ = style.margin_boxes.insert(name, content);
            }
            Err(err) => warnings.push(format!("invalid @{name} content: {err}")),
        }
    }
    style.margin_boxes.retain(|_, c| matches!(c, Content::Items(_)));
    (style, warnings)
}

fn join(values: &[ComponentValue]) -> String {
    values.iter().map(ToString::to_string).collect()
}

/// [§ 7.1 Page size: the 'size' property](https://www.w3.org/TR/css-page-3/#page-size-prop)
///
/// `Some(None)` for `auto`.
fn parse_page_size(values: &[ComponentValue]) -> Option<Option<(f32, f32)>> {
    const MM: f32 = 96.0 / 25.4;
    let parts: Vec<&ComponentValue> = values.iter().filter(|v| !v.is_whitespace()).collect();
    let mut size: Option<(f32, f32)> = None;
    let mut orientation: Option<bool> = None;
    let mut lengths = Vec::new();
    for part in &parts {
        if let Some(ident) = part.as_ident() {
            let named = match ident.to_ascii_lowercase().as_str() {
                "auto" => return Some(None),
                "portrait" => {
                    orientation = Some(false);
                    continue;
                }
                "landscape" => {
                    orientation = Some(true);
                    continue;
                }
                "a5" => (148.0 * MM, 210.0 * MM),
                "a4" => (210.0 * MM, 297.0 * MM),
                "a3" => (297.0 * MM, 420.0 * MM),
                "b5" => (176.0 * MM, 250.0 * MM),
                "b4" => (250.0 * MM, 353.0 * MM),
                "letter" => (816.0, 1056.0),
                "legal" => (816.0, 1344.0),
                "ledger" => (1056.0, 1632.0),
                _ => return None,
            };
            size = Some(named);
        } else {
            let px = match part {
                ComponentValue::Token(CSSToken::Dimension { value, unit, .. }) => {
                    (value * absolute_unit_px(&unit.to_ascii_lowercase())?) as f32
                }
                _ => return None,
            };
            if px <= 0.0 {
                return None;
            }
            lengths.push(px);
        }
    }
    match lengths.as_slice() {
        [] => {}
        [side] => size = Some((*side, *side)),
        [w, h] => size = Some((*w, *h)),
        _ => return None,
    }
    let (w, h) = size?;
    let landscape = orientation.unwrap_or(w > h);
    Some(Some(if landscape == (w > h) { (w, h) } else { (h, w) }))
}

/// `margin` and its longhands on the page box. Percentages refer to the page
/// width for left/right and the height for top/bottom.
fn apply_page_margin(style: &mut PageStyle, name: &str, value: &[ComponentValue]) -> bool {
    let ctx = ResolveContext::default();
    let (width, height) = (style.width, style.height);
    let resolve = |v: &ComponentValue, side: PhysicalSide| -> Option<f32> {
        let basis = match side {
            PhysicalSide::Left | PhysicalSide::Right => width,
            PhysicalSide::Top | PhysicalSide::Bottom => height,
        };
        let length: LengthPercentage = parse_single_length(v)?.compute(&ctx);
        Some(length.resolve(basis).max(0.0))
    };
    let parts: Vec<&ComponentValue> = value.iter().filter(|v| !v.is_whitespace()).collect();
    let side = match name {
        "margin-top" => Some(PhysicalSide::Top),
        "margin-right" => Some(PhysicalSide::Right),
        "margin-bottom" => Some(PhysicalSide::Bottom),
        "margin-left" => Some(PhysicalSide::Left),
        "margin" => None,
        _ => return false,
    };
    if let Some(side) = side {
        let [v] = parts.as_slice() else {
            return false;
        };
        let Some(px) = resolve(*v, side) else {
            return false;
        };
        style.margin[side.index()] = px;
        return true;
    }
    let indices: &[usize] = match parts.len() {
        1 => &[0, 0, 0, 0],
        2 => &[0, 1, 0, 1],
        3 => &[0, 1, 2, 1],
        4 => &[0, 1, 2, 3],
        _ => return false,
    };
    let mut margin = [0.0; 4];
    for (slot, side) in PhysicalSide::ALL.into_iter().enumerate() {
        let Some(px) = resolve(parts[indices[slot]], side) else {
            return false;
        };
        margin[slot] = px;
    }
    style.margin = margin;
    true
}

/// Expression context for margin boxes: the `page` and `pages` counters plus
/// the document counters in effect at the start of the page.
pub struct PageExprContext<'a> {
    /// 1-based page number.
    pub page_number: usize,
    /// Total page count, when known.
    pub page_count: Option<usize>,
    /// Document counters at the page start.
    pub counters: &'a CounterState,
}

impl ExprContext for PageExprContext<'_> {
    fn attr(&self, _name: &str) -> Option<String> {
        None
    }

    fn counter(&self, name: &str) -> Option<i32> {
        match name {
            "page" => i32::try_from(self.page_number).ok(),
            "pages" => self.page_count.and_then(|n| i32::try_from(n).ok()),
            _ => self.counters.value(name),
        }
    }

    fn counters(&self, name: &str) -> Vec<i32> {
        match name {
            "page" | "pages" => self.counter(name).into_iter().collect(),
            _ => self.counters.values(name).to_vec(),
        }
    }

    fn ident(&self, name: &str) -> Option<ExprValue> {
        match name {
            "page-number" => Some(ExprValue::Number(self.page_number as f64)),
            "page-count" => self.page_count.map(|n| ExprValue::Number(n as f64)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Rule, parse_stylesheet};

    fn page_rules(css: &str) -> Vec<PageRule> {
        parse_stylesheet(css)
            .rules
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| match rule {
                Rule::At(at) if at.name == "page" => PageRule::from_at_rule(at, Origin::Author, i),
                _ => None,
            })
            .collect()
    }

    fn page(index: usize) -> PageContext<'static> {
        PageContext {
            index,
            side: PageSide::for_index(index, false),
            name: None,
        }
    }

    #[test]
    fn test_first_page_margin_wins_by_specificity() {
        let rules = page_rules("@page :first { margin-top: 100px } @page { margin: 20px }");
        let base = PageStyle::new(800.0, 1000.0, [0.0; 4]);
        let (first, _) = resolve_page_style(&rules, &page(0), &base);
        let (second, _) = resolve_page_style(&rules, &page(1), &base);
        assert_eq!(first.margin, [100.0, 20.0, 20.0, 20.0]);
        assert_eq!(second.margin, [20.0; 4]);
    }

    #[test]
    fn test_size_keywords() {
        let rules = page_rules("@page { size: A4 landscape; margin: 10% }");
        let base = PageStyle::new(800.0, 1000.0, [0.0; 4]);
        let (style, warnings) = resolve_page_style(&rules, &page(0), &base);
        assert!(warnings.is_empty());
        assert!(style.width > style.height);
        assert!((style.width - 1122.5).abs() < 1.0);
        assert!((style.margin[0] - style.height * 0.1).abs() < 0.01);
        assert!((style.margin[1] - style.width * 0.1).abs() < 0.01);
    }

    #[test]
    fn test_margin_box_counter_evaluation() {
        let rules = page_rules(
            "@page { @bottom-center { content: counter(page) \" / \" counter(pages) } }",
        );
        let base = PageStyle::new(800.0, 1000.0, [50.0; 4]);
        let (style, _) = resolve_page_style(&rules, &page(2), &base);
        let content = &style.margin_boxes[&MarginBoxName::BottomCenter];
        let counters = CounterState::new();
        let ctx = PageExprContext {
            page_number: 3,
            page_count: Some(10),
            counters: &counters,
        };
        assert_eq!(content.text(&ctx), "3 / 10");
    }

    #[test]
    fn test_side_selectors() {
        assert_eq!(PageSide::for_index(0, false), PageSide::Right);
        assert_eq!(PageSide::for_index(0, true), PageSide::Left);
        let rules = page_rules("@page :left { margin-left: 5px } @page chapter:right { margin-left: 7px }");
        let base = PageStyle::new(800.0, 1000.0, [0.0; 4]);
        let (left, _) = resolve_page_style(&rules, &page(1), &base);
        assert_eq!(left.margin[3], 5.0);
        let named = PageContext {
            name: Some("chapter"),
            ..page(0)
        };
        let (right, _) = resolve_page_style(&rules, &named, &base);
        assert_eq!(right.margin[3], 7.0);
    }
}
