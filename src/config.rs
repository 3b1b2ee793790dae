// ⚙️ Configuration - TOML settings for the CLI and server
//
// Every section has defaults, so an empty file (or no file at all) is a valid
// configuration. Lookup: --config, then $SECOMPAIR_CONFIG, then defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file when `--config` is not given
pub const CONFIG_ENV_VAR: &str = "SECOMPAIR_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub comparison: ComparisonDefaults,
    pub export: ExportConfig,
    pub server: ServerConfig,
    pub source: SourceConfig,
}

/// Axes selected before the user picks anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonDefaults {
    pub default_x_label: String,
    pub default_y_label: String,
}

impl Default for ComparisonDefaults {
    fn default() -> Self {
        // Every filer reports Assets
        Self {
            default_x_label: "Assets".into(),
            default_y_label: "Assets".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub filename_prefix: String,
    /// chrono strftime format appended to the prefix
    pub timestamp_format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename_prefix: "Secdata_Downloaded_at_".into(),
            timestamp_format: "%d_%m_%Y %H.%M.%S".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Raw facts CSV used when `--facts` is not given (CLI) and as the
    /// server's FactsSource
    pub facts_csv: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// `explicit` path first, then $SECOMPAIR_CONFIG, then defaults.
    /// A path that is named but unreadable is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
