use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.0-flash";

/// Optional settings read from `<config_dir>/homete/config.json`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub text_model: Option<String>,
    pub vision_model: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Malformed config file {}", path.display()))?;
        Ok(config)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("homete").join("config.json"))
    }
}

/// Fully resolved connection settings for the model gateway
#[derive(Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .finish()
    }
}

impl GatewaySettings {
    /// Layer startup parameters over the config file over built-in defaults.
    ///
    /// Fails when no credential is available from either source.
    pub fn resolve(overrides: Config, file: Config) -> Result<Self> {
        let api_key = overrides
            .api_key
            .or(file.api_key)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!("No API key configured. Pass --api-key or set GEMINI_API_KEY")
            })?;

        Ok(Self {
            api_key,
            base_url: overrides
                .base_url
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            text_model: overrides
                .text_model
                .or(file.text_model)
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            vision_model: overrides
                .vision_model
                .or(file.vision_model)
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "api_key": "from-file", "text_model": "gemini-pro" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.text_model.as_deref(), Some("gemini-pro"));
        assert!(config.vision_model.is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let overrides = Config {
            api_key: Some("cli-key".to_string()),
            vision_model: Some("cli-vision".to_string()),
            ..Config::default()
        };
        let file = Config {
            api_key: Some("file-key".to_string()),
            text_model: Some("file-text".to_string()),
            vision_model: Some("file-vision".to_string()),
            base_url: None,
        };

        let settings = GatewaySettings::resolve(overrides, file).unwrap();
        assert_eq!(settings.api_key, "cli-key");
        assert_eq!(settings.text_model, "file-text");
        assert_eq!(settings.vision_model, "cli-vision");
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = GatewaySettings::resolve(Config::default(), Config::default()).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let empty = Config {
            api_key: Some(String::new()),
            ..Config::default()
        };
        assert!(GatewaySettings::resolve(empty, Config::default()).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = GatewaySettings::resolve(
            Config {
                api_key: Some("secret".to_string()),
                ..Config::default()
            },
            Config::default(),
        )
        .unwrap();
        assert!(!format!("{:?}", settings).contains("secret"));
    }
}
