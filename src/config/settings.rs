//! User settings for scopeline
//!
//! This module defines the `Settings` struct that holds the tunable knobs of
//! the formatter, the scope tracker and the chunk toolbars, with serde
//! support for JSON persistence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Execution Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Where chunk output goes, which decides which chunks get a run toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Output renders inline under each chunk; every chunk can run
    #[default]
    Inline,
    /// Output goes to the console; only some engines can run
    Console,
}

impl ExecutionMode {
    /// Get a display label for the mode.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionMode::Inline => "Inline",
            ExecutionMode::Console => "Console",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(ExecutionMode::Inline),
            "console" => Ok(ExecutionMode::Console),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatter Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Scores and thresholds of the newline heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterSettings {
    /// Indent width, also the per-level brace nesting penalty
    pub tab_size: u8,
    /// Added per top-level comma beyond the first
    pub comma_penalty: usize,
    /// Added per top-level `=` beyond the first
    pub equals_penalty: usize,
    /// Added when the region is a function's argument list
    pub function_args_penalty: usize,
    /// Added per level of parenthesis nesting when deciding brace breaks
    pub paren_nesting_penalty: usize,
    /// Score at which commas are followed by newlines
    pub comma_break_threshold: usize,
    /// Score at which opening brackets are followed by newlines
    pub brace_break_threshold: usize,
    /// Column after which binary operators are followed by a newline
    pub wrap_column: usize,
    /// Accumulated length at which logical operators in `if` conditions,
    /// and arguments of the always-break calls, start breaking
    pub condition_break_length: usize,
    /// Calls whose arguments always go on their own lines once long enough
    pub always_break_calls: Vec<String>,
    /// Re-indent the formatted text by bracket depth
    pub reindent: bool,
}

impl Default for FormatterSettings {
    fn default() -> Self {
        Self {
            tab_size: 2,
            comma_penalty: 15,
            equals_penalty: 20,
            function_args_penalty: 20,
            paren_nesting_penalty: 20,
            comma_break_threshold: 60,
            brace_break_threshold: 80,
            wrap_column: 70,
            condition_break_length: 20,
            always_break_calls: vec!["tryCatch".to_string()],
            reindent: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Batching of incremental scope rebuilds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    /// Rows processed per batch
    pub batch_rows: usize,
    /// Pause between batches, in milliseconds
    pub delay_ms: u64,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            batch_rows: 200,
            delay_ms: 5,
        }
    }
}

impl ScopeSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunk Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Chunk toolbar preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    pub mode: ExecutionMode,
    /// Engines that can run in console mode
    pub console_engines: Vec<String>,
    /// Whether run toolbars are shown at all
    pub show_toolbars: bool,
}

impl ChunkSettings {
    pub fn default_console_engines() -> Vec<String> {
        vec!["r".to_string(), "python".to_string()]
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Inline,
            console_engines: Self::default_console_engines(),
            show_toolbars: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Everything in `config.json`. Missing sections and fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub formatter: FormatterSettings,
    pub scopes: ScopeSettings,
    pub chunks: ChunkSettings,
}

impl Settings {
    // Accepted ranges
    pub const MIN_TAB_SIZE: u8 = 1;
    pub const MAX_TAB_SIZE: u8 = 8;
    pub const MIN_BATCH_ROWS: usize = 10;
    pub const MAX_BATCH_ROWS: usize = 10_000;
    /// Longest pause between rebuild batches
    pub const MAX_DELAY_MS: u64 = 1000;
    /// Bounds for the comma and brace break scores
    pub const MIN_THRESHOLD: usize = 10;
    pub const MAX_THRESHOLD: usize = 400;
    pub const MIN_WRAP_COLUMN: usize = 20;
    pub const MAX_WRAP_COLUMN: usize = 400;
    pub const MAX_PENALTY: usize = 200;

    /// Pull every value back into its accepted range. Hand-edited files can
    /// hold anything.
    pub fn sanitize(&mut self) {
        let f = &mut self.formatter;
        f.tab_size = f.tab_size.clamp(Self::MIN_TAB_SIZE, Self::MAX_TAB_SIZE);
        f.comma_break_threshold = f
            .comma_break_threshold
            .clamp(Self::MIN_THRESHOLD, Self::MAX_THRESHOLD);
        f.brace_break_threshold = f
            .brace_break_threshold
            .clamp(Self::MIN_THRESHOLD, Self::MAX_THRESHOLD);
        f.condition_break_length = f.condition_break_length.min(Self::MAX_THRESHOLD);
        f.wrap_column = f
            .wrap_column
            .clamp(Self::MIN_WRAP_COLUMN, Self::MAX_WRAP_COLUMN);
        f.comma_penalty = f.comma_penalty.min(Self::MAX_PENALTY);
        f.equals_penalty = f.equals_penalty.min(Self::MAX_PENALTY);
        f.function_args_penalty = f.function_args_penalty.min(Self::MAX_PENALTY);
        f.paren_nesting_penalty = f.paren_nesting_penalty.min(Self::MAX_PENALTY);

        self.scopes.batch_rows = self
            .scopes
            .batch_rows
            .clamp(Self::MIN_BATCH_ROWS, Self::MAX_BATCH_ROWS);
        self.scopes.delay_ms = self.scopes.delay_ms.min(Self::MAX_DELAY_MS);

        // Engines compare case-insensitively; drop blanks
        self.chunks.console_engines = self
            .chunks
            .console_engines
            .iter()
            .map(|e| e.trim().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if self.chunks.console_engines.is_empty() {
            self.chunks.console_engines = ChunkSettings::default_console_engines();
        }
    }

    /// Parse JSON, then [`sanitize`](Self::sanitize).
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.formatter.tab_size, 2);
        assert_eq!(settings.formatter.comma_break_threshold, 60);
        assert_eq!(settings.formatter.brace_break_threshold, 80);
        assert_eq!(settings.formatter.always_break_calls, vec!["tryCatch"]);
        assert_eq!(settings.scopes.batch_rows, 200);
        assert_eq!(settings.scopes.delay(), Duration::from_millis(5));
        assert_eq!(settings.chunks.mode, ExecutionMode::Inline);
        assert_eq!(settings.chunks.console_engines, vec!["r", "python"]);
    }

    #[test]
    fn test_execution_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Console).unwrap(),
            "\"console\""
        );
        assert_eq!(
            serde_json::from_str::<ExecutionMode>("\"inline\"").unwrap(),
            ExecutionMode::Inline
        );
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!("Console".parse::<ExecutionMode>(), Ok(ExecutionMode::Console));
        assert!("notebook".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::Inline.to_string(), "Inline");
    }

    #[test]
    fn test_defaults_survive_json() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"console_engines\""));
        assert_eq!(serde_json::from_str::<Settings>(&json).unwrap(), Settings::default());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = r#"{"formatter": {"tab_size": 4}, "chunks": {"mode": "console"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.formatter.tab_size, 4);
        assert_eq!(settings.formatter.wrap_column, 70);
        assert_eq!(settings.chunks.mode, ExecutionMode::Console);
        assert!(settings.chunks.show_toolbars);
        assert_eq!(settings.scopes, ScopeSettings::default());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(serde_json::from_str::<Settings>("{}").unwrap(), Settings::default());
    }

    #[test]
    fn test_sanitize_clamps_values() {
        let mut settings = Settings::default();
        settings.formatter.tab_size = 0;
        settings.formatter.comma_break_threshold = 1;
        settings.formatter.wrap_column = 5000;
        settings.scopes.batch_rows = 1;
        settings.scopes.delay_ms = 60_000;

        settings.sanitize();

        assert_eq!(settings.formatter.tab_size, Settings::MIN_TAB_SIZE);
        assert_eq!(settings.formatter.comma_break_threshold, Settings::MIN_THRESHOLD);
        assert_eq!(settings.formatter.wrap_column, Settings::MAX_WRAP_COLUMN);
        assert_eq!(settings.scopes.batch_rows, Settings::MIN_BATCH_ROWS);
        assert_eq!(settings.scopes.delay_ms, Settings::MAX_DELAY_MS);
    }

    #[test]
    fn test_sanitize_console_engines() {
        let mut settings = Settings::default();
        settings.chunks.console_engines = vec![" R ".to_string(), "".to_string()];
        settings.sanitize();
        assert_eq!(settings.chunks.console_engines, vec!["r"]);

        settings.chunks.console_engines.clear();
        settings.sanitize();
        assert_eq!(settings.chunks.console_engines, vec!["r", "python"]);
    }

    #[test]
    fn test_from_json_sanitized() {
        let settings = Settings::from_json_sanitized(r#"{"formatter": {"tab_size": 99}}"#).unwrap();
        assert_eq!(settings.formatter.tab_size, Settings::MAX_TAB_SIZE);
        assert!(Settings::from_json_sanitized("not json").is_err());
    }
}
