//! Scope tracking
//!
//! A tree of sections, chunks, functions and braces over a document, kept
//! current incrementally as the document is edited.

mod builder;
mod rename;
mod schedule;
mod tracker;
mod tree;

pub use builder::{RScopeBuilder, ScopeBuilder};
pub use rename::{occurrences_in_scope, status_label};
pub use schedule::RebuildTimer;
pub use tracker::{ScopeTracker, TrackerEvent};
pub use tree::{Scope, ScopeId, ScopeKind, ScopeTree};
