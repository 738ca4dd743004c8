//! [CSS Lists Level 3 § 4 Automatic Numbering](https://www.w3.org/TR/css-lists-3/#auto-numbering)
//!
//! Counter scoping and formatting. A [`CounterState`] is threaded through
//! box generation in document order; the state at the start of each page is
//! saved in the page checkpoint so layout can resume mid-document.

use std::collections::HashMap;

use serde::Serialize;
use strum_macros::{Display, EnumString};

/// [§ 3 Counter styles](https://www.w3.org/TR/css-counter-styles-3/#predefined-counters)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum CounterStyle {
    /// `1, 2, 3`
    #[default]
    Decimal,
    /// `i, ii, iii`
    LowerRoman,
    /// `I, II, III`
    UpperRoman,
    /// `a, b, c`
    #[strum(to_string = "lower-alpha", serialize = "lower-latin")]
    LowerAlpha,
    /// `A, B, C`
    #[strum(to_string = "upper-alpha", serialize = "upper-latin")]
    UpperAlpha,
    /// `•`
    Disc,
    /// `◦`
    Circle,
    /// `▪`
    Square,
    /// No marker text.
    None,
}

impl CounterStyle {
    /// Bullet styles ignore the counter value and have no `. ` suffix.
    #[must_use]
    pub const fn is_bullet(self) -> bool {
        matches!(self, Self::Disc | Self::Circle | Self::Square)
    }
}

/// Format `value` in `style`. Values outside a style's range fall back to
/// decimal, per the `fallback` descriptor of the predefined styles.
#[must_use]
pub fn format_counter(value: i32, style: CounterStyle) -> String {
    match style {
        CounterStyle::Decimal => value.to_string(),
        CounterStyle::LowerRoman => roman(value).map_or_else(|| value.to_string(), |s| s.to_lowercase()),
        CounterStyle::UpperRoman => roman(value).unwrap_or_else(|| value.to_string()),
        CounterStyle::LowerAlpha => alphabetic(value).map_or_else(|| value.to_string(), |s| s.to_lowercase()),
        CounterStyle::UpperAlpha => alphabetic(value).unwrap_or_else(|| value.to_string()),
        CounterStyle::Disc => "\u{2022}".to_string(),
        CounterStyle::Circle => "\u{25e6}".to_string(),
        CounterStyle::Square => "\u{25aa}".to_string(),
        CounterStyle::None => String::new(),
    }
}

/// Additive roman numerals, range 1..=3999.
fn roman(value: i32) -> Option<String> {
    const SYMBOLS: [(i32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if !(1..=3999).contains(&value) {
        return None;
    }
    let mut rest = value;
    let mut out = String::new();
    for (weight, symbol) in SYMBOLS {
        while rest >= weight {
            out.push_str(symbol);
            rest -= weight;
        }
    }
    Some(out)
}

/// Bijective base-26 (`A`..`Z`, `AA`, ...), range 1..
fn alphabetic(value: i32) -> Option<String> {
    if value < 1 {
        return None;
    }
    let mut n = value;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    Some(letters.iter().rev().collect())
}

/// Nested counter instances in scope at one point of the document.
///
/// Scopes follow CSS 2.1 § 12.4.1: a counter instantiated by an element is
/// visible to the element, its descendants and its following siblings, so
/// instances are recorded in the frame of the element's *parent* and vanish
/// when the parent is left.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CounterState {
    counters: HashMap<String, Vec<i32>>,
    frames: Vec<Vec<String>>,
}

impl CounterState {
    /// Empty state with one root frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
            frames: vec![Vec::new()],
        }
    }

    /// `counter-reset: name value` on the current element.
    pub fn reset(&mut self, name: &str, value: i32) {
        self.counters.entry(name.to_string()).or_default().push(value);
        if let Some(frame) = self.frames.last_mut() {
            frame.push(name.to_string());
        }
    }

    /// `counter-increment: name by`. "If there is not currently a counter of
    /// the given name on the element, the element instantiates a new counter."
    pub fn increment(&mut self, name: &str, by: i32) {
        match self.counters.get_mut(name).and_then(|stack| stack.last_mut()) {
            Some(value) => *value = value.saturating_add(by),
            None => self.reset(name, by),
        }
    }

    /// `counter-set: name value`
    pub fn set(&mut self, name: &str, value: i32) {
        match self.counters.get_mut(name).and_then(|stack| stack.last_mut()) {
            Some(current) => *current = value,
            None => self.reset(name, value),
        }
    }

    /// Enter the children of the current element.
    pub fn push_scope(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Leave the children of an element, dropping the instances they created.
    pub fn pop_scope(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for name in frame {
            if let Some(stack) = self.counters.get_mut(&name) {
                let _ = stack.pop();
                if stack.is_empty() {
                    let _ = self.counters.remove(&name);
                }
            }
        }
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
    }

    /// Innermost value of `name`, as `counter()` sees it.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<i32> {
        self.counters.get(name).and_then(|stack| stack.last().copied())
    }

    /// All values of `name`, outermost first, as `counters()` sees them.
    #[must_use]
    pub fn values(&self, name: &str) -> &[i32] {
        self.counters.get(name).map_or(&[], Vec::as_slice)
    }

    /// Nesting depth, for sanity checks.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roman_and_alpha() {
        assert_eq!(format_counter(1994, CounterStyle::UpperRoman), "MCMXCIV");
        assert_eq!(format_counter(4, CounterStyle::LowerRoman), "iv");
        assert_eq!(format_counter(0, CounterStyle::LowerRoman), "0");
        assert_eq!(format_counter(27, CounterStyle::UpperAlpha), "AA");
        assert_eq!(format_counter(26, CounterStyle::LowerAlpha), "z");
        assert_eq!(format_counter(3, CounterStyle::None), "");
    }

    #[test]
    fn test_style_names() {
        assert_eq!("lower-latin".parse::<CounterStyle>().ok(), Some(CounterStyle::LowerAlpha));
        assert_eq!(CounterStyle::UpperRoman.to_string(), "upper-roman");
    }

    #[test]
    fn test_nested_scopes() {
        let mut state = CounterState::new();
        // <ol> resets list-item, its children increment it.
        state.reset("list-item", 0);
        state.push_scope();
        state.increment("list-item", 1);
        state.increment("list-item", 1);
        // nested <ol> inside the second item
        state.push_scope();
        state.reset("list-item", 0);
        state.push_scope();
        state.increment("list-item", 1);
        assert_eq!(state.values("list-item"), &[2, 1]);
        state.pop_scope();
        state.pop_scope();
        assert_eq!(state.value("list-item"), Some(2));
        state.pop_scope();
        assert_eq!(state.value("list-item"), Some(2));
    }

    #[test]
    fn test_increment_without_reset_instantiates() {
        let mut state = CounterState::new();
        state.push_scope();
        state.increment("chapter", 1);
        assert_eq!(state.value("chapter"), Some(1));
        state.pop_scope();
        assert_eq!(state.value("chapter"), None);
    }
}
