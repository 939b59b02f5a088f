//! Application settings and paths.
//!
//! Settings are read from a JSON file in the XDG config directory
//! (`~/.config/portsweep/settings.json` on Linux) or from an explicit path.
//! Every field has a default, so a partial file is fine.

use crate::cli::OutputFormat;
use crate::config::timing::DEFAULT_LEVEL;
use crate::error::{ConfigError, ConfigResult};
use crate::scanner::Protocol;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform configuration directory.
    pub fn discover() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("", "", "portsweep").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Timing level used when `-T` is not given.
    pub timing_level: u8,
    /// Protocols probed when neither `--tcp` nor `--udp` is given.
    pub protocols: Vec<Protocol>,
    /// Default output format.
    pub output_format: OutputFormat,
    /// Include CLOSED ports in the results table.
    pub show_closed: bool,
    /// Include ERROR results in the results table.
    pub show_errors: bool,
    /// Global probe rate cap in probes per second, 0 for none.
    pub max_rate: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timing_level: DEFAULT_LEVEL,
            protocols: vec![Protocol::Tcp],
            output_format: OutputFormat::Plain,
            show_closed: false,
            show_errors: false,
            max_rate: 0,
        }
    }
}

impl AppSettings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let file = match Paths::discover() {
            Ok(paths) => paths.settings_file(),
            Err(e) => {
                tracing::debug!("no config directory ({}), using defaults", e);
                return Ok(Self::default());
            }
        };

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }
}
