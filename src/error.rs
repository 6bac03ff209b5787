//! Errors at the edges of scopeline
//!
//! Scope tracking, chunk synchronization and reformatting never fail. Bad
//! brackets, unterminated chunks and odd tokens all degrade to a partial
//! result. What can fail is reading and writing files, the settings file,
//! and the optional `#|` option lines of a chunk, which are dropped with a
//! warning through [`ResultExt::unwrap_or_warn_default`].

use log::warn;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Source files
    // ─────────────────────────────────────────────────────────────────────────
    Io(io::Error),

    /// An R script or R Markdown document could not be read
    FileRead { path: PathBuf, source: io::Error },

    /// A reformatted document could not be written back
    FileWrite { path: PathBuf, source: io::Error },

    // ─────────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────────
    /// The settings file exists but could not be read
    ConfigLoad { path: PathBuf, source: io::Error },

    /// The settings file or its directory could not be written
    ConfigSave { path: PathBuf, source: io::Error },

    /// The settings file is not settings JSON
    ConfigParse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },

    /// The platform has no configuration directory (no HOME, for instance)
    ConfigDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Chunks
    // ─────────────────────────────────────────────────────────────────────────
    /// `#|` option lines that are not a YAML mapping
    ChunkOptions { message: String },

    Application(String),
}

impl Error {
    pub fn read(path: &Path, source: io::Error) -> Self {
        Error::FileRead {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn write(path: &Path, source: io::Error) -> Self {
        Error::FileWrite {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error comes from the settings file rather than a document.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigLoad { .. }
                | Error::ConfigSave { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigDirNotFound
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::ConfigParse { path: None, source }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ChunkOptions {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::FileRead { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            Error::FileWrite { path, source } => {
                write!(f, "cannot write {}: {}", path.display(), source)
            }
            Error::ConfigLoad { path, source } => {
                write!(f, "cannot read settings from {}: {}", path.display(), source)
            }
            Error::ConfigSave { path, source } => {
                write!(f, "cannot save settings to {}: {}", path.display(), source)
            }
            Error::ConfigParse {
                path: Some(path),
                source,
            } => write!(f, "invalid settings in {}: {}", path.display(), source),
            Error::ConfigParse { path: None, source } => write!(f, "invalid settings: {}", source),
            Error::ConfigDirNotFound => write!(f, "no configuration directory on this platform"),
            Error::ChunkOptions { message } => write!(f, "invalid chunk options: {}", message),
            Error::Application(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(source)
            | Error::FileRead { source, .. }
            | Error::FileWrite { source, .. }
            | Error::ConfigLoad { source, .. }
            | Error::ConfigSave { source, .. } => Some(source),
            Error::ConfigParse { source, .. } => Some(source),
            Error::ConfigDirNotFound | Error::ChunkOptions { .. } | Error::Application(_) => None,
        }
    }
}

/// Silent degradation for optional inputs.
pub trait ResultExt<T> {
    /// The value, or `default` after logging the error at `warn` with
    /// `context` in front of it.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        self.unwrap_or_else(|err| {
            warn!("{}: {}", context, err);
            default
        })
    }
}
