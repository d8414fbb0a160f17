use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::food_recognizer::DEFAULT_MAX_IMAGE_BYTES;
use crate::plate::{validate_grams, DEFAULT_PORTION_G};

// Environment variables
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
pub const REFERENCE_TABLE_ENV_VAR: &str = "PLATE_NUTRI_REFERENCE_TABLE";
pub const DEFAULT_PORTION_ENV_VAR: &str = "PLATE_NUTRI_DEFAULT_PORTION_G";
pub const VISION_MODEL_ENV_VAR: &str = "PLATE_NUTRI_VISION_MODEL";
pub const MAX_IMAGE_BYTES_ENV_VAR: &str = "PLATE_NUTRI_MAX_IMAGE_BYTES";

pub const DEFAULT_VISION_MODEL: &str = "openai/gpt-4o";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Name of the variable holding the OpenRouter key. The key itself is read when a request is made.
    pub api_key_env_var: String,
    /// CSV replacing the built-in reference table.
    pub reference_table: Option<PathBuf>,
    pub default_portion_g: f64,
    pub vision_model: String,
    pub max_image_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_env_var: API_KEY_ENV_VAR.to_string(),
            reference_table: None,
            default_portion_g: DEFAULT_PORTION_G,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset or blank variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(path) = get(REFERENCE_TABLE_ENV_VAR) {
            config.reference_table = Some(PathBuf::from(path));
        }
        if let Some(raw) = get(DEFAULT_PORTION_ENV_VAR) {
            let grams = raw
                .parse::<f64>()
                .with_context(|| format!("{} must be a number, got '{}'", DEFAULT_PORTION_ENV_VAR, raw))?;
            config.default_portion_g =
                validate_grams(grams).with_context(|| format!("Invalid {}", DEFAULT_PORTION_ENV_VAR))?;
        }
        if let Some(model) = get(VISION_MODEL_ENV_VAR) {
            config.vision_model = model;
        }
        if let Some(raw) = get(MAX_IMAGE_BYTES_ENV_VAR) {
            config.max_image_bytes = raw
                .parse::<u64>()
                .with_context(|| format!("{} must be a byte count, got '{}'", MAX_IMAGE_BYTES_ENV_VAR, raw))?;
        }

        Ok(config)
    }

    /// Command-line flags take precedence over the environment.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(path) = &cli.reference_table {
            self.reference_table = Some(path.clone());
        }
        if let Some(grams) = cli.default_portion {
            self.default_portion_g = validate_grams(grams).context("Invalid --default-portion")?;
        }
        Ok(())
    }
}
