//! Process configuration
//!
//! Loaded from TOML, installed once with `init_global`, read everywhere
//! through `global()`.

use crate::abi::{AbiProfile, AggregatePassing, Target};
use crate::logging::{self, LogConfig};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

static GLOBAL: OnceCell<MarshalConfig> = OnceCell::new();
static DEFAULTS: OnceCell<MarshalConfig> = OnceCell::new();

/// File names probed by `discover`
const CONFIG_FILES: [&str; 2] = [".valistrc", ".valistrc.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarshalConfig {
    #[serde(default)]
    pub abi: AbiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbiConfig {
    /// Host target when unset
    #[serde(default)]
    pub target: Option<Target>,

    /// Override for the target's single narrow field struct rule
    #[serde(default)]
    pub single_field_struct: Option<AggregatePassing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub spans: bool,

    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            spans: false,
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug)]
pub enum ConfigError {
    AlreadyInitialized,
    Io(std::io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "Configuration already initialized"),
            Self::Io(err) => write!(f, "Failed to read config: {}", err),
            Self::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl MarshalConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if logging::parse_level(&config.logging.level).is_none() {
            return Err(ConfigError::Parse(format!(
                "unknown log level '{}'",
                config.logging.level
            )));
        }
        Ok(config)
    }

    /// Find a config file in the current directory or its parents
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            for name in CONFIG_FILES {
                let path = dir.join(name);
                if path.exists() {
                    if let Ok(config) = Self::from_file(&path) {
                        return config;
                    }
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Configured or host profile with overrides applied
    pub fn profile(&self) -> AbiProfile {
        let profile = self.abi.target.map_or_else(AbiProfile::host, Target::profile);
        match self.abi.single_field_struct {
            Some(passing) => profile.with_single_field_struct(passing),
            None => profile,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: logging::parse_level(&self.logging.level).unwrap_or(tracing::Level::INFO),
            log_path: self.logging.file.clone(),
            json_format: self.logging.json,
            show_spans: self.logging.spans,
        }
    }
}

/// Install the process-wide configuration; only the first call succeeds
pub fn init_global(config: MarshalConfig) -> Result<&'static MarshalConfig, ConfigError> {
    let mut installed = false;
    let current = GLOBAL.get_or_init(|| {
        installed = true;
        config
    });
    if installed {
        Ok(current)
    } else {
        Err(ConfigError::AlreadyInitialized)
    }
}

/// Process-wide configuration, defaults when never initialized
pub fn global() -> &'static MarshalConfig {
    GLOBAL
        .get()
        .unwrap_or_else(|| DEFAULTS.get_or_init(MarshalConfig::default))
}
