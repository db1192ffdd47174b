//! CLI configuration
//!
//! Read from `<config dir>/criteria-sql/config.toml` when present:
//!
//! ```toml
//! schema_path = "schema.toml"
//! output = "json"
//! color = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CriteriaError, CriteriaResult};

/// How compiled SQL is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entity schema document (TOML or JSON)
    pub schema_path: Option<PathBuf>,

    /// Output format
    pub output: OutputFormat,

    /// Colored terminal output
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_path: None,
            output: OutputFormat::Text,
            color: true,
        }
    }
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// `<config dir>/criteria-sql/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("criteria-sql").join("config.toml"))
    }

    pub fn from_toml(input: &str) -> CriteriaResult<Self> {
        toml::from_str(input).map_err(|e| CriteriaError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> CriteriaResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Load the file at [`Config::default_path`], falling back to defaults
    /// when it does not exist.
    pub fn load_default() -> CriteriaResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from an existing configuration
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the schema path
    pub fn schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schema_path = Some(path.into());
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.config.output = output;
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.config.color = color;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}
