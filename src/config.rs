//! Process configuration, loaded once from a TOML file with environment
//! overrides for secrets.

use std::path::Path;

use serde::Deserialize;

use crate::common::error::{GeoError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub geocoders: GeocoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port for the Prometheus exporter; disabled when absent.
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub gazetteer_db: String,
    pub cadastral_db: String,
    pub localities_db: String,
    pub electoral_db: String,
    pub boundaries_db: String,
    pub hierarchy_glossary: String,
    pub abbreviation_glossary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
    #[serde(default = "default_google_url")]
    pub google_url: String,
    /// Falls back to the GOOGLE_API_KEY environment variable.
    #[serde(default)]
    pub google_api_key: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Deadline for each external call; expiry falls through to the next
    /// cascade state.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_google_url() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
}

fn default_user_agent() -> String {
    "georesolver/0.1 (contacto@georesolver.cl)".to_string()
}

fn default_call_timeout_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_port: None,
            log_dir: default_log_dir(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            nominatim_url: default_nominatim_url(),
            google_url: default_google_url(),
            google_api_key: String::new(),
            user_agent: default_user_agent(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| GeoError::Config {
            message: format!("failed to read config {}: {}", path.as_ref().display(), e),
        })?;
        let mut config: AppConfig = toml::from_str(&content).map_err(|e| GeoError::Config {
            message: format!("failed to parse config {}: {}", path.as_ref().display(), e),
        })?;
        if config.geocoders.google_api_key.is_empty() {
            if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
                config.geocoders.google_api_key = key;
            }
        }
        Ok(config)
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.geocoders.call_timeout_secs)
    }
}
