//! The footnote area at the bottom of a column.
//!
//! [GCPM § 2.2 The footnote area](https://www.w3.org/TR/css-gcpm-3/#footnote-area)
//!
//! "The footnote area is ... placed at the bottom of the page area." Each
//! body placed here reduces the block extent left for the flow above it.

use folio_dom::NodeId;

use crate::layout::LogicalFragment;

/// A footnote body laid out in an area.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedFootnote {
    /// Footnote number.
    pub number: i32,
    /// Element holding the body.
    pub body_node: NodeId,
    /// Height of the body's margin box.
    pub block_size: f32,
    /// Fragments relative to the top of the body.
    pub fragments: Vec<LogicalFragment>,
}

/// Footnote bodies stacked at the bottom of one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootnoteArea {
    notes: Vec<PlacedFootnote>,
    gap: f32,
}

impl FootnoteArea {
    /// Empty area that leaves `gap` between the flow and the first body.
    #[must_use]
    pub const fn new(gap: f32) -> Self {
        Self {
            notes: Vec::new(),
            gap,
        }
    }

    /// Block extent the area takes from the column.
    #[must_use]
    pub fn block_size(&self) -> f32 {
        if self.notes.is_empty() {
            0.0
        } else {
            self.gap + self.notes_size()
        }
    }

    /// Block extent once a body of size `extra` is added.
    #[must_use]
    pub fn block_size_with(&self, extra: f32) -> f32 {
        self.gap + self.notes_size() + extra
    }

    fn notes_size(&self) -> f32 {
        self.notes.iter().map(|n| n.block_size).sum()
    }

    /// Add a body below the ones already placed.
    pub fn push(&mut self, note: PlacedFootnote) {
        self.notes.push(note);
    }

    /// Number of bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// No bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Forget bodies added after the first `len`, when the break that placed
    /// their calls is taken back.
    pub fn truncate(&mut self, len: usize) {
        self.notes.truncate(len);
    }

    /// Bodies in placement order.
    #[must_use]
    pub fn notes(&self) -> &[PlacedFootnote] {
        &self.notes
    }

    /// Space between the flow and the first body.
    #[must_use]
    pub const fn gap(&self) -> f32 {
        self.gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(number: i32, block_size: f32) -> PlacedFootnote {
        PlacedFootnote {
            number,
            body_node: NodeId(number as usize),
            block_size,
            fragments: Vec::new(),
        }
    }

    #[test]
    fn test_area_grows_with_bodies() {
        let mut area = FootnoteArea::new(10.0);
        assert!(area.block_size().abs() < f32::EPSILON);
        assert!((area.block_size_with(30.0) - 40.0).abs() < f32::EPSILON);
        area.push(note(1, 30.0));
        area.push(note(2, 20.0));
        assert!((area.block_size() - 60.0).abs() < f32::EPSILON);
        area.truncate(1);
        assert_eq!(area.len(), 1);
        assert_eq!(area.notes()[0].number, 1);
    }
}
