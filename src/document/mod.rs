//! Document model
//!
//! Positions, the host document contract, an in-memory implementation and
//! the anchors that keep chunk toolbars pinned to their rows.

mod anchor;
mod position;
mod text;

pub use anchor::{AnchorEvent, AnchorId, AnchorSet, Anchors};
pub use position::{Position, Range};
pub use text::{DocumentChange, TextDocument};

/// The host document as seen by the scope tracker and chunk synchronizer.
pub trait Document {
    /// Text of `row` without its line terminator.
    fn line(&self, row: usize) -> Option<&str>;

    fn row_count(&self) -> usize;

    /// Current cursor position.
    fn cursor(&self) -> Position;
}
