//! Reading and writing `config.json`
//!
//! The file sits in `<platform config dir>/scopeline/`. A missing or blank
//! file means defaults; anything unreadable is reported to the caller, and
//! [`load_config`] turns that into defaults plus a warning.

use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "scopeline";
const FILE_NAME: &str = "config.json";
/// Staging file; renamed over [`FILE_NAME`] once fully written.
const STAGING_NAME: &str = "config.json.bak";

/// `%APPDATA%\scopeline`, `~/Library/Application Support/scopeline` or
/// `~/.config/scopeline`, depending on the platform.
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(Error::ConfigDirNotFound)?;
    Ok(base.join(APP_DIR))
}

pub fn get_config_file_path() -> Result<PathBuf> {
    get_config_dir().map(|dir| dir.join(FILE_NAME))
}

/// A settings file at a fixed location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    file: PathBuf,
}

impl ConfigStore {
    /// The store at the platform location.
    pub fn locate() -> Result<Self> {
        get_config_file_path().map(Self::at)
    }

    pub fn at(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Read and sanitize the settings.
    pub fn load(&self) -> Result<Settings> {
        let text = match fs::read_to_string(&self.file) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", self.file.display());
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(Error::ConfigLoad {
                    path: self.file.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            debug!("Settings file {} is blank", self.file.display());
            return Ok(Settings::default());
        }

        let settings =
            Settings::from_json_sanitized(&text).map_err(|source| Error::ConfigParse {
                path: Some(self.file.clone()),
                source,
            })?;
        info!("Loaded settings from {}", self.file.display());
        Ok(settings)
    }

    /// Write the settings, creating the directory if needed. The JSON goes to
    /// a staging file first so a crash never leaves a half-written config.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let save_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| Error::ConfigSave { path, source }
        };

        if let Some(dir) = self.file.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(save_error(dir))?;
        }

        let json = serde_json::to_string_pretty(settings)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
            .map_err(save_error(&self.file))?;

        let staging = self.file.with_file_name(STAGING_NAME);
        fs::write(&staging, json).map_err(save_error(&staging))?;
        fs::rename(&staging, &self.file).map_err(save_error(&self.file))?;

        info!("Saved settings to {}", self.file.display());
        Ok(())
    }

    /// [`ConfigStore::save`], logging the failure instead of returning it.
    pub fn save_silent(&self, settings: &Settings) -> bool {
        if let Err(err) = self.save(settings) {
            warn!("Could not save settings: {}", err);
            return false;
        }
        true
    }
}

/// Settings from the platform location; defaults if anything goes wrong.
pub fn load_config() -> Settings {
    ConfigStore::locate()
        .and_then(|store| store.load())
        .unwrap_or_warn_default(Settings::default(), "Could not load settings")
}

pub fn load_config_from(path: &Path) -> Result<Settings> {
    ConfigStore::at(path).load()
}

pub fn save_config(settings: &Settings) -> Result<()> {
    ConfigStore::locate()?.save(settings)
}

pub fn save_config_to(settings: &Settings, path: &Path) -> Result<()> {
    ConfigStore::at(path).save(settings)
}

/// [`save_config`], logging the failure instead of returning it.
pub fn save_config_silent(settings: &Settings) -> bool {
    match ConfigStore::locate() {
        Ok(store) => store.save_silent(settings),
        Err(err) => {
            warn!("Could not save settings: {}", err);
            false
        }
    }
}
