//! Booking configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. `.booking/config.json` - Project-level config
//! 2. `<platform config dir>/clinic-booking/config.json` - Global config
//! 3. Built-in defaults
//!
//! ```json
//! {"horizonDays": 14, "skipWeekends": true, "clinicFixture": "clinic.json"}
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfig {
    /// How many days ahead dates are offered
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Leave Saturdays and Sundays out of the offered dates
    #[serde(default = "default_skip_weekends")]
    pub skip_weekends: bool,

    /// JSON clinic fixture, relative to the config directory
    #[serde(default)]
    pub clinic_fixture: Option<PathBuf>,

    /// Patient to book for when no one is signed in
    #[serde(default)]
    pub default_patient_id: Option<String>,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            skip_weekends: default_skip_weekends(),
            clinic_fixture: None,
            default_patient_id: None,
        }
    }
}

fn default_horizon_days() -> u32 {
    14
}

fn default_skip_weekends() -> bool {
    true
}

/// A config together with the directory it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: BookingConfig,
    pub source_dir: Option<PathBuf>,
}

impl LoadedConfig {
    /// Fixture path resolved against the directory the config was read from
    pub fn clinic_fixture_path(&self) -> Option<PathBuf> {
        let fixture = self.config.clinic_fixture.as_ref()?;
        match &self.source_dir {
            Some(dir) if fixture.is_relative() => Some(dir.join(fixture)),
            _ => Some(fixture.clone()),
        }
    }
}

impl BookingConfig {
    /// Strictly read one config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from a directory's config.json
    ///
    /// A directory without config.json yields defaults; an unreadable or
    /// malformed file is logged and also yields defaults.
    pub fn load_from_dir(dir: &Path) -> Option<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            if dir.exists() {
                return Some(Self::default());
            }
            return None;
        }

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::debug!("Loaded booking config from {}", config_path.display());
                Some(config)
            }
            Err(ConfigError::Parse { source, .. }) => {
                tracing::warn!("Failed to parse {}: {}", config_path.display(), source);
                Some(Self::default())
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// Try the project directory first, then the global one, then defaults
    pub fn load_from_directory(project_dir: Option<&Path>, global_dir: Option<&Path>) -> LoadedConfig {
        let project = project_dir.and_then(|dir| Self::load_from_dir(dir).map(|c| (c, dir)));
        let found = project.or_else(|| global_dir.and_then(|dir| Self::load_from_dir(dir).map(|c| (c, dir))));

        match found {
            Some((config, dir)) => LoadedConfig {
                config,
                source_dir: Some(dir.to_path_buf()),
            },
            None => LoadedConfig {
                config: Self::default(),
                source_dir: None,
            },
        }
    }
}

/// `.booking/` under the given project root
pub fn project_config_dir(root: &Path) -> PathBuf {
    root.join(".booking")
}

/// Platform config directory for clinic-booking
pub fn global_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "clinic-booking")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .or_else(|| dirs::config_dir().map(|d| d.join("clinic-booking")))
}
