//! Fragmentation: choosing where a column or page ends.
//!
//! [CSS Fragmentation Level 3](https://www.w3.org/TR/css-break-3/)
//!
//! "The process of breaking a flow into fragmentainers is called
//! fragmentation." The column engine registers a [`BreakPosition`] at every
//! legal break point it passes; when content overflows it asks
//! [`BreakCandidates::choose`] where to end, and footnote bodies claim room
//! at the bottom of the column through a [`FootnoteArea`].

mod candidates;
mod footnotes;

pub use candidates::{AVOID_PENALTY, BreakCandidates, BreakConstraints, BreakPosition};
pub use footnotes::{FootnoteArea, PlacedFootnote};
