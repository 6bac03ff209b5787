//! Settings for the formatter, the scope tracker and the chunk toolbars,
//! stored as JSON in the platform config directory.

mod persistence;
mod settings;

pub use persistence::*;
pub use settings::*;
