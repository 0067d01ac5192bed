//! Runtime configuration
//!
//! Resolution order: explicit path, `config/scry.yaml`, then
//! `<config_dir>/scry/config.yaml`; defaults when none exists. `SCRY_*`
//! environment variables override file values.

use std::env;
use std::path::{Path, PathBuf};

use plan_optimizer::OptimizerPolicy;
use script_executor::ExecutorConfig;
use self_heal::DiagnoserPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const LOCAL_CONFIG_PATH: &str = "config/scry.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value '{value}' for {var}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScryConfig {
    /// Upper bound on executed attempts per job
    pub max_repair_attempts: u32,
    pub artifacts_root: PathBuf,
    pub executor: ExecutorConfig,
    pub optimizer: OptimizerPolicy,
    pub diagnoser: DiagnoserPolicy,
}

impl Default for ScryConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 20,
            artifacts_root: PathBuf::from("./artifacts"),
            executor: ExecutorConfig::default(),
            optimizer: OptimizerPolicy::default(),
            diagnoser: DiagnoserPolicy::default(),
        }
    }
}

/// A resolved configuration and the file it came from, if any
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ScryConfig,
    pub path: Option<PathBuf>,
}

impl ScryConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Loads, applies environment overrides and validates
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_path(),
        };

        let mut config = match &path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "loaded configuration");
                Self::from_yaml_str(&raw)?
            }
            None => {
                warn!("no config file found; using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|var| env::var(var).ok())?;
        config.validate()?;
        Ok(LoadedConfig { config, path })
    }

    /// Applies `SCRY_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SCRY_MAX_REPAIR_ATTEMPTS") {
            self.max_repair_attempts =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        var: "SCRY_MAX_REPAIR_ATTEMPTS",
                        value: value.clone(),
                    })?;
        }
        if let Some(value) = lookup("SCRY_ARTIFACTS_ROOT") {
            self.artifacts_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("SCRY_HEADLESS") {
            self.executor.headless = parse_bool(&value).ok_or(ConfigError::InvalidOverride {
                var: "SCRY_HEADLESS",
                value,
            })?;
        }
        if let Some(value) = lookup("SCRY_INTERPRETER") {
            self.executor.interpreter = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_repair_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_repair_attempts must be at least 1".to_string(),
            ));
        }
        if self.executor.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("executor.interpreter is empty".to_string()));
        }
        if self.executor.overall_timeout_ms == 0 || self.executor.step_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "executor timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }
    let mut user = dirs::config_dir()?;
    user.push("scry");
    user.push("config.yaml");
    user.exists().then_some(user)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
