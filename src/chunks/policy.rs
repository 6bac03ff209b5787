//! Which chunks get a run toolbar.

use super::options::ChunkOptions;
use crate::config::{ChunkSettings, ExecutionMode};

/// Decides whether a chunk can be run in the current execution mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnablePolicy {
    pub mode: ExecutionMode,
    /// Lowercase engine names runnable in console mode
    console_engines: Vec<String>,
}

impl Default for RunnablePolicy {
    fn default() -> Self {
        Self::from_settings(&ChunkSettings::default())
    }
}

impl RunnablePolicy {
    pub fn new<S: AsRef<str>>(mode: ExecutionMode, console_engines: &[S]) -> Self {
        Self {
            mode,
            console_engines: console_engines
                .iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_settings(settings: &ChunkSettings) -> Self {
        Self::new(settings.mode, &settings.console_engines)
    }

    pub fn console_engines(&self) -> &[String] {
        &self.console_engines
    }

    /// Every chunk runs inline; in the console only allow-listed engines do.
    pub fn is_runnable(&self, options: &ChunkOptions) -> bool {
        match self.mode {
            ExecutionMode::Inline => true,
            ExecutionMode::Console => {
                let engine = options.engine().to_ascii_lowercase();
                self.console_engines.iter().any(|e| *e == engine)
            }
        }
    }
}
