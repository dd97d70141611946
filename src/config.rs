use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_PREFIX: &str = "sheets-quickstart";

const DEFAULT_APPLICATION_NAME: &str = "Google Sheets API Quickstart";
const DEFAULT_CALLBACK_PORT: u16 = 8080;
const CLIENT_SECRET_FILE: &str = "client_secret.json";
const SERVICE_ACCOUNT_FILE: &str = "service.json";
const TOKEN_CACHE_SUBDIR: &str = ".credentials/sheets.googleapis.com-java-quickstart";

// https://docs.google.com/spreadsheets/d/1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms/edit
const DEFAULT_SPREADSHEET_ID: &str = "1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms";
const DEFAULT_RANGE: &str = "A3:A11";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub google: GoogleConfig,
    pub sheet: SheetConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    /// Sent as the user agent on every Sheets API request
    pub application_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_cache_dir: Option<PathBuf>,
    pub callback_port: u16,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            client_secret: None,
            service_account_key: None,
            token_cache_dir: None,
            callback_port: DEFAULT_CALLBACK_PORT,
        }
    }
}

impl GoogleConfig {
    /// OAuth client descriptor, next to the config file unless overridden
    pub fn client_secret_path(&self) -> Result<PathBuf> {
        match &self.client_secret {
            Some(path) => Ok(path.clone()),
            None => Config::config_dir_file(CLIENT_SECRET_FILE),
        }
    }

    /// Service account key, next to the config file unless overridden
    pub fn service_account_key_path(&self) -> Result<PathBuf> {
        match &self.service_account_key {
            Some(path) => Ok(path.clone()),
            None => Config::config_dir_file(SERVICE_ACCOUNT_FILE),
        }
    }

    pub fn token_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.token_cache_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Failed to determine home directory".to_string()))?;
        Ok(home.join(TOKEN_CACHE_SUBDIR))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub range: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            range: DEFAULT_RANGE.to_string(),
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.google.application_name.is_empty() {
            return Err(AppError::Config(
                "google.application_name must not be empty".to_string(),
            ));
        }

        if config.sheet.spreadsheet_id.is_empty() || config.sheet.range.is_empty() {
            return Err(AppError::Config(
                "sheet.spreadsheet_id and sheet.range must not be empty".to_string(),
            ));
        }

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Self::config_dir_file("config.toml")
    }

    fn config_dir_file(filename: &str) -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file(filename)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }
}
