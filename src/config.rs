//! Converter configuration
//!
//! Read from the `[convert]` table of `qail.toml`:
//!
//! ```toml
//! [convert]
//! client_timezone = "Europe/Paris"
//! client_encoding = "UTF8"
//! driver = "pgsql"
//! fallback = "strict"
//!
//! [postgres]
//! url = "postgres://localhost/app"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::converter::{Converter, DefaultConverter, Driver, FallbackMode, Registry};
use crate::error::{ConvertError, ConvertResult};

pub const CONFIG_FILE: &str = "qail.toml";

/// Session settings and converter stack selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// IANA time zone the session works in.
    pub client_timezone: String,

    /// Client character encoding.
    pub client_encoding: String,

    /// Decorator put around the default converter.
    pub driver: Driver,

    /// Behaviour for types no converter claims.
    pub fallback: FallbackMode,

    /// Install the date/time and interval converters.
    pub register_defaults: bool,

    /// Connection URL used by the runner (optional)
    pub database_url: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            client_timezone: "UTC".to_string(),
            client_encoding: "UTF8".to_string(),
            driver: Driver::Pgsql,
            fallback: FallbackMode::Strict,
            register_defaults: true,
            database_url: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    convert: Option<ConverterConfig>,
    #[serde(default)]
    postgres: Option<PostgresSection>,
}

#[derive(Debug, Deserialize)]
struct PostgresSection {
    url: String,
}

impl ConverterConfig {
    /// Create a new configuration builder
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder::default()
    }

    /// Parse the contents of a `qail.toml` file.
    pub fn from_toml_str(content: &str) -> ConvertResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConvertError::Config(e.to_string()))?;
        let mut config = file.convert.unwrap_or_default();
        if config.database_url.is_none() {
            config.database_url = file.postgres.map(|p| p.url);
        }
        Ok(config)
    }

    /// Load an explicit file.
    pub fn load(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded converter config from {}", path.display());
        Ok(config)
    }

    /// `./qail.toml`, then the user config directory, then defaults.
    pub fn discover() -> ConvertResult<Self> {
        match Self::search_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => {
                tracing::debug!("No {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("qail").join(CONFIG_FILE));
        }
        paths
    }

    /// Build the converter stack this configuration describes.
    pub fn build_converter(&self) -> Box<dyn Converter> {
        let registry = Registry::with_defaults(self.register_defaults);
        let converter = DefaultConverter::with_registry(registry).fallback(self.fallback);
        self.driver.build(converter)
    }
}

/// Builder for ConverterConfig
#[derive(Debug, Default)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    /// Start from an existing configuration
    pub fn from_config(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.config.client_timezone = timezone.into();
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.config.client_encoding = encoding.into();
        self
    }

    pub fn driver(mut self, driver: Driver) -> Self {
        self.config.driver = driver;
        self
    }

    pub fn fallback(mut self, fallback: FallbackMode) -> Self {
        self.config.fallback = fallback;
        self
    }

    pub fn register_defaults(mut self, register: bool) -> Self {
        self.config.register_defaults = register;
        self
    }

    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConverterConfig {
        self.config
    }
}
