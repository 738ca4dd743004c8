//! Break candidates and the selection policy.
//!
//! [CSS Fragmentation § 4.4 Unforced Breaks](https://www.w3.org/TR/css-break-3/#unforced-breaks)
//!
//! "When an unforced break occurs, the UA should ... break as few times as
//! possible while honoring the break rules."
//!
//! Rules that would be violated by a break add to its penalty instead of
//! removing it, so a column always has somewhere to end.

use crate::style::BreakValue;

/// Penalty for each `avoid` that a break would ignore.
pub const AVOID_PENALTY: u32 = 10;

/// What is known about a break point when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakConstraints {
    /// Combined `break-after`/`break-before` value at a sibling boundary.
    pub between: BreakValue,
    /// Number of enclosing boxes with `break-inside` avoiding this break.
    pub avoid_inside: u32,
    /// Lines of the same paragraph left before the break in this column.
    pub lines_before: Option<u32>,
    /// Lines of the same paragraph after the break.
    pub lines_after: Option<u32>,
    /// [§ 3.3 'orphans'](https://www.w3.org/TR/css-break-3/#widows-orphans)
    pub orphans: u32,
    /// 'widows'
    pub widows: u32,
    /// The break would end a page rather than a column.
    pub page_context: bool,
}

impl BreakConstraints {
    /// Zero when the break honors every rule.
    ///
    /// [§ 4.4](https://www.w3.org/TR/css-break-3/#unforced-breaks)
    /// Rule 1 (`avoid` values) and rule 2 (orphans and widows) are what a
    /// break may violate; each missing line costs 1, each avoid
    /// [`AVOID_PENALTY`].
    #[must_use]
    pub fn penalty(&self) -> u32 {
        let mut penalty = 0;
        if self.between.avoids(self.page_context) {
            penalty += AVOID_PENALTY;
        }
        penalty += AVOID_PENALTY * self.avoid_inside;
        if let Some(before) = self.lines_before {
            penalty += self.orphans.saturating_sub(before);
        }
        if let Some(after) = self.lines_after {
            penalty += self.widows.saturating_sub(after);
        }
        penalty
    }
}

/// A place where the column may end.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakPosition<T> {
    /// Engine state to restore when the break is taken.
    pub at: T,
    /// Cost of breaking here; zero is a clean break.
    pub penalty: u32,
}

impl<T> BreakPosition<T> {
    /// The break honors orphans, widows and avoid rules.
    #[must_use]
    pub const fn is_feasible(&self) -> bool {
        self.penalty == 0
    }
}

/// Candidates registered in the current column, in flow order.
#[derive(Debug, Clone)]
pub struct BreakCandidates<T> {
    list: Vec<BreakPosition<T>>,
}

impl<T> Default for BreakCandidates<T> {
    fn default() -> Self {
        Self { list: Vec::new() }
    }
}

impl<T> BreakCandidates<T> {
    /// No candidates yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a break point after every earlier one.
    pub fn push(&mut self, at: T, constraints: &BreakConstraints) -> usize {
        self.list.push(BreakPosition {
            at,
            penalty: constraints.penalty(),
        });
        self.list.len() - 1
    }

    /// Change the penalty of a registered candidate, when more break values
    /// meet at the same point.
    pub fn repenalize(&mut self, index: usize, constraints: &BreakConstraints) {
        if let Some(candidate) = self.list.get_mut(index) {
            candidate.penalty = constraints.penalty();
        }
    }

    /// Candidate at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BreakPosition<T>> {
        self.list.get(index)
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// No candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop every candidate once the column commits.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Pick the break for an overflowing column.
    ///
    /// The latest feasible candidate wins. Without one, the least penalized
    /// candidate is taken, the latest among equals, so the column still
    /// ends and layout moves forward.
    #[must_use]
    pub fn choose(&self) -> Option<&BreakPosition<T>> {
        if let Some(clean) = self.list.iter().rev().find(|c| c.is_feasible()) {
            return Some(clean);
        }
        self.list
            .iter()
            .rev()
            .min_by_key(|c| c.penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(before: u32, after: u32) -> BreakConstraints {
        BreakConstraints {
            lines_before: Some(before),
            lines_after: Some(after),
            orphans: 2,
            widows: 2,
            page_context: true,
            ..BreakConstraints::default()
        }
    }

    #[test]
    fn test_penalties() {
        assert_eq!(lines(2, 2).penalty(), 0);
        assert_eq!(lines(1, 5).penalty(), 1);
        assert_eq!(lines(4, 0).penalty(), 2);
        let avoid = BreakConstraints {
            between: BreakValue::Avoid,
            avoid_inside: 1,
            ..BreakConstraints::default()
        };
        assert_eq!(avoid.penalty(), 2 * AVOID_PENALTY);
        let avoid_column = BreakConstraints {
            between: BreakValue::AvoidColumn,
            page_context: true,
            ..BreakConstraints::default()
        };
        assert_eq!(avoid_column.penalty(), 0);
    }

    #[test]
    fn test_latest_feasible_wins() {
        let mut candidates = BreakCandidates::new();
        for k in 1..40 {
            let _ = candidates.push(k, &lines(k, 40 - k));
        }
        assert_eq!(candidates.choose().map(|c| c.at), Some(38));
    }

    #[test]
    fn test_fallback_prefers_least_penalty_then_latest() {
        let mut candidates = BreakCandidates::new();
        let _ = candidates.push("after 1", &lines(1, 2));
        let _ = candidates.push("after 2", &lines(2, 1));
        assert_eq!(candidates.choose().map(|c| c.at), Some("after 2"));

        let mut candidates = BreakCandidates::new();
        let _ = candidates.push("clean-ish", &lines(1, 3));
        let _ = candidates.push("avoided", &BreakConstraints {
            between: BreakValue::Avoid,
            ..BreakConstraints::default()
        });
        assert_eq!(candidates.choose().map(|c| c.at), Some("clean-ish"));
    }

    #[test]
    fn test_repenalize_and_clear() {
        let mut candidates = BreakCandidates::new();
        let index = candidates.push((), &BreakConstraints::default());
        candidates.repenalize(index, &BreakConstraints {
            between: BreakValue::Avoid,
            ..BreakConstraints::default()
        });
        assert_eq!(candidates.get(index).map(|c| c.penalty), Some(AVOID_PENALTY));
        candidates.clear();
        assert!(candidates.is_empty());
        assert!(candidates.choose().is_none());
    }
}
