//! R source reformatting
//!
//! A token cursor, the newline-inserting reformatter, a bracket-depth
//! reindenter and assignment alignment.

mod align;
mod cursor;
mod newlines;
mod reindent;

pub use align::{align_assignments, alignment_ranges};
pub use cursor::TokenCursor;
pub use newlines::Reformatter;
pub use reindent::reindent;
