//! Configuration schema (pipegraph.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::diagnostic::{DiagnosticCode, Severity};

/// Environment variable forcing strict mode on or off
pub const ENV_STRICT: &str = "PIPEGRAPH_STRICT";

/// Environment variable selecting the id strategy
pub const ENV_ID_STRATEGY: &str = "PIPEGRAPH_ID_STRATEGY";

/// How node ids are derived from table and step names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Raw names; table and step names must not collide
    #[default]
    Plain,

    /// Names prefixed by kind (`table:`, `transform:`, `group:`)
    Namespaced,
}

impl std::str::FromStr for IdStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "namespaced" => Ok(Self::Namespaced),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown id strategy '{}', expected 'plain' or 'namespaced'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for IdStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Namespaced => write!(f, "namespaced"),
        }
    }
}

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Step selection applied before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep only transforms whose name starts with this prefix
    #[serde(default)]
    pub name_prefix: String,

    /// Keep only transforms carrying every one of these labels
    #[serde(default)]
    pub labels: Vec<(String, String)>,
}

impl FilterConfig {
    /// True when the filter keeps every step
    pub fn is_empty(&self) -> bool {
        self.name_prefix.is_empty() && self.labels.is_empty()
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node id strategy
    #[serde(default)]
    pub id_strategy: IdStrategy,

    /// Fail instead of returning a graph with error-level diagnostics
    #[serde(default)]
    pub strict: bool,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Step filter
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply `PIPEGRAPH_*` environment overrides on top of the file values
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_STRICT).ok().as_deref(),
            std::env::var(ENV_ID_STRATEGY).ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, strict: Option<&str>, id_strategy: Option<&str>) -> Result<(), ConfigError> {
        if let Some(value) = strict {
            self.strict = parse_bool(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!("{} must be a boolean, got '{}'", ENV_STRICT, value))
            })?;
        }

        if let Some(value) = id_strategy {
            self.id_strategy = value.parse()?;
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
