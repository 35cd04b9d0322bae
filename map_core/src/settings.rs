//! Application settings
//!
//! Stored as `garden_map.toml` in the config directory. Environment variables
//! override the backend URLs for a single run without touching the file.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::storage::{self, StorageError};

pub const SETTINGS_NAME: &str = "garden_map";
pub const API_URL_ENV: &str = "GARDEN_MAP_API_URL";
pub const IMAGE_URL_ENV: &str = "GARDEN_MAP_IMAGE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Base URL of the REST API (`map/active`, `regions`, `specimens`)
    pub api_base_url: String,
    /// Base URL the map image `filePath` is resolved against
    pub image_base_url: String,
    /// Sector type sent with newly created regions
    pub sector_type: i32,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            image_base_url: "http://localhost:8080".to_string(),
            sector_type: 1,
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl AppSettings {
    /// Load from disk, writing the defaults on first run. Errors are logged
    /// and fall back to the defaults.
    pub fn load() -> Self {
        match storage::load_settings::<AppSettings>(SETTINGS_NAME) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                let settings = AppSettings::default();
                match settings.save() {
                    Ok(()) => info!("Wrote default settings"),
                    Err(e) => warn!("Could not write default settings: {}", e),
                }
                settings
            }
            Err(e) => {
                warn!("Could not read settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), StorageError> {
        storage::save_settings(SETTINGS_NAME, self)
    }

    /// Apply URL overrides; `lookup` is `std::env::var(..).ok()` in the app.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            info!("API URL overridden by {}", API_URL_ENV);
            self.api_base_url = url.trim().to_string();
        }
        if let Some(url) = lookup(IMAGE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            info!("Image URL overridden by {}", IMAGE_URL_ENV);
            self.image_base_url = url.trim().to_string();
        }
    }
}
