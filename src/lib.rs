//! Scopeline
//!
//! Editor services for R scripts and R Markdown documents: an incremental
//! scope tracker, run toolbars for executable chunks and a token stream
//! reformatter.

pub mod chunks;
pub mod config;
pub mod document;
pub mod error;
pub mod reformat;
pub mod scope;
pub mod string_utils;
pub mod token;

pub use chunks::{ChunkOptions, ChunkToolbarSynchronizer, ExecutionMode, RunnablePolicy};
pub use config::{load_config, Settings};
pub use document::{Document, Position, Range, TextDocument};
pub use error::{Error, Result};
pub use reformat::{align_assignments, Reformatter};
pub use scope::{ScopeTracker, ScopeTree};
pub use token::Flavor;
