use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow, Context};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const API_KEY_ENV: &str = "GEMINI_API_KEY";
const MODEL_ENV: &str = "GEMINI_MODEL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub render_markup: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_api_key(key: &str) -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        Self::update_at(&path, |config| config.api_key = Some(key.trim().to_string()))?;
        Ok(path)
    }

    pub fn save_model(model: &str) -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        Self::update_at(&path, |config| config.model = Some(model.trim().to_string()))?;
        Ok(path)
    }

    /// Load the file at `path`, apply `change` and write it back. A file that
    /// fails to parse is left untouched and reported.
    pub fn update_at(path: &Path, change: impl FnOnce(&mut Config)) -> Result<()> {
        let mut config = Self::load_from(path)?;
        change(&mut config);
        config.save_to(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("bubblechat").join("config.json"))
    }
}

/// Values given on the command line, which win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub plain: bool,
}

/// Fully resolved settings for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub render_markup: bool,
}

impl Settings {
    /// Resolve CLI flags, then environment, then the config file, then defaults.
    pub fn resolve(config: &Config, overrides: &Overrides) -> Self {
        Self::resolve_with_env(config, overrides, |name| std::env::var(name).ok())
    }

    fn resolve_with_env(
        config: &Config,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_key = non_empty(overrides.api_key.clone())
            .or_else(|| non_empty(env(API_KEY_ENV)))
            .or_else(|| non_empty(config.api_key.clone()));
        let model = non_empty(overrides.model.clone())
            .or_else(|| non_empty(env(MODEL_ENV)))
            .or_else(|| non_empty(config.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = non_empty(config.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let render_markup = !overrides.plain && config.render_markup.unwrap_or(true);

        Self {
            api_key,
            model,
            base_url,
            render_markup,
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No Gemini API key configured. Set {} or run: chatbot set-key <KEY>",
                API_KEY_ENV
            )
        })
    }
}
