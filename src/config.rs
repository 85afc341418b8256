use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::BoxBoxError;

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "boxbox";

pub const JOLPICA_BASE_URL: &str = "https://api.jolpi.ca/ergast/f1";
pub const OPENF1_BASE_URL: &str = "https://api.openf1.org/v1";
pub const MULTIVIEWER_BASE_URL: &str = "https://api.multiviewer.app";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Where raw provider responses are cached, defaults to the user cache dir
    pub cache_dir: Option<PathBuf>,
    pub cache_enabled: bool,
    /// Where rendered charts are written
    pub output_dir: PathBuf,
    pub charts_enabled: bool,
    pub jolpica_base_url: String,
    pub openf1_base_url: String,
    pub multiviewer_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            cache_enabled: true,
            output_dir: PathBuf::from("boxbox_charts"),
            charts_enabled: true,
            jolpica_base_url: JOLPICA_BASE_URL.to_string(),
            openf1_base_url: OPENF1_BASE_URL.to_string(),
            multiviewer_base_url: MULTIVIEWER_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the config from the user config dir, falling back to defaults
    pub fn from_local_file() -> Result<Self, BoxBoxError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, BoxBoxError> {
        let file =
            std::fs::File::open(path).map_err(|e| BoxBoxError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| BoxBoxError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<(), BoxBoxError> {
        let config_path = Self::default_path().ok_or(BoxBoxError::NoConfigDir)?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), BoxBoxError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BoxBoxError::ConfigIOError { source: e })?;
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| BoxBoxError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| BoxBoxError::ConfigSerializeError { source: e })
    }

    pub fn resolved_cache_dir(&self) -> Result<PathBuf, BoxBoxError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::cache_dir()
                .ok_or(BoxBoxError::NoConfigDir)?
                .join(APP_DIR_NAME)),
        }
    }

    pub fn provider_config(&self) -> Result<ProviderConfig, BoxBoxError> {
        let cache_dir = match self.resolved_cache_dir() {
            Ok(dir) => dir,
            Err(e) if !self.cache_enabled => {
                warn!("No cache directory available ({e}), cache is disabled anyway");
                PathBuf::from(".")
            }
            Err(e) => return Err(e),
        };
        Ok(ProviderConfig {
            cache_dir,
            cache_enabled: self.cache_enabled,
            jolpica_base_url: self.jolpica_base_url.clone(),
            openf1_base_url: self.openf1_base_url.clone(),
            multiviewer_base_url: self.multiviewer_base_url.clone(),
            user_agent: format!("boxbox/{}", env!("CARGO_PKG_VERSION")),
        })
    }
}

/// Settings injected into the HTTP data provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
    pub jolpica_base_url: String,
    pub openf1_base_url: String,
    pub multiviewer_base_url: String,
    pub user_agent: String,
}
