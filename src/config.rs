use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::utils;

pub const API_KEY_ENV: &str = "API_KEY";
pub const API_KEY_FALLBACK_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_REASONING_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_IMAGE_EDIT_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
const DEFAULT_THINKING_BUDGET: u32 = 32768;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings kept in `config.json`. The API credential is deliberately not
/// part of it; it only ever comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub text_model: String,
    pub reasoning_model: String,
    pub image_edit_model: String,
    pub image_model: String,
    pub thinking_budget: u32,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            image_edit_model: DEFAULT_IMAGE_EDIT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub const KEYS: [&'static str; 7] = [
        "api_base_url",
        "text_model",
        "reasoning_model",
        "image_edit_model",
        "image_model",
        "thinking_budget",
        "request_timeout_secs",
    ];

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("a value is required for {key}"));
        }
        match key {
            "api_base_url" => self.api_base_url = value.to_string(),
            "text_model" => self.text_model = value.to_string(),
            "reasoning_model" => self.reasoning_model = value.to_string(),
            "image_edit_model" => self.image_edit_model = value.to_string(),
            "image_model" => self.image_model = value.to_string(),
            "thinking_budget" => {
                self.thinking_budget = value
                    .parse()
                    .map_err(|_| format!("thinking_budget must be a number, got {value}"))?
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .map_err(|_| format!("request_timeout_secs must be a number, got {value}"))?
            }
            other => {
                return Err(format!(
                    "unknown config key {other} (expected one of: {})",
                    Self::KEYS.join(", ")
                ))
            }
        }
        Ok(())
    }
}

/// Reads the API credential. Absence is only a warning: calls fail later.
pub fn api_key_from_env() -> Option<String> {
    let key = std::env::var(API_KEY_ENV)
        .or_else(|_| std::env::var(API_KEY_FALLBACK_ENV))
        .ok()
        .filter(|key| !key.trim().is_empty());
    if key.is_none() {
        tracing::warn!(
            "{API_KEY_ENV} environment variable not set. Some features may not work."
        );
    }
    key
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load(root: &Path) -> Self {
        Self::load_from(utils::config_path(root))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = read_config(&path).unwrap_or_else(|err| {
            tracing::warn!("ignoring unreadable config {}: {err}", path.display());
            AppConfig::default()
        });
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn read(&self) -> AppConfig {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, String>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), String>,
    {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| "config mutex poisoned".to_string())?;
        let mut next = guard.clone();
        transform(&mut next)?;
        write_config(&self.path, &next)?;
        *guard = next;
        Ok(guard.clone())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), String> {
    utils::ensure_parent(path);
    let contents = serde_json::to_string_pretty(config).map_err(|err| err.to_string())?;
    fs::write(path, contents).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::load_from(dir.path().join("config.json"));
        assert_eq!(store.read(), AppConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"text_model": "gemini-2.0-flash"}"#).unwrap();
        let config = ConfigStore::load_from(path).read();
        assert_eq!(config.text_model, "gemini-2.0-flash");
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
    }

    #[test]
    fn update_writes_back_and_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.json");
        let store = ConfigStore::load_from(path.clone());

        let updated = store
            .update(|config| config.set("thinking_budget", "1024"))
            .unwrap();
        assert_eq!(updated.thinking_budget, 1024);
        assert_eq!(ConfigStore::load_from(path).read().thinking_budget, 1024);

        assert!(store.update(|config| config.set("thinking_budget", "lots")).is_err());
        assert!(store.update(|config| config.set("api_key", "secret")).is_err());
        assert_eq!(store.read().thinking_budget, 1024);
    }
}
