//! Executable chunks of literate documents
//!
//! Chunk options, the runnable policy and the toolbar synchronizer that
//! keeps run toolbars attached to runnable chunks.

mod options;
mod policy;
mod toolbar;

pub use crate::config::ExecutionMode;
pub use options::{ChunkOptions, DEFAULT_ENGINE};
pub use policy::RunnablePolicy;
pub use toolbar::{ChunkToolbar, ChunkToolbarSynchronizer, ToolbarEvent};
