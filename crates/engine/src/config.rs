//! Linter configuration: explicit overrides, then environment, then defaults.

use crate::context::QueryContext;
use std::path::PathBuf;

pub const ENV_DATASET: &str = "APILINT_DATASET";
pub const ENV_API_LEVEL: &str = "APILINT_API_LEVEL";
pub const ENV_STRICT: &str = "APILINT_STRICT";

/// Dataset shipped next to the workspace, used when no cached copy exists.
pub const PACKAGED_DATASET: &str = "rules/rules.rkyv";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected an integer API level, got `{value}`")]
    InvalidApiLevel { var: &'static str, value: String },
    #[error("{var}: expected a boolean, got `{value}`")]
    InvalidBool { var: &'static str, value: String },
}

/// Values given explicitly, typically from command line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub dataset: Option<PathBuf>,
    pub api_level: Option<i32>,
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinterConfig {
    pub dataset: PathBuf,
    pub api_level: Option<i32>,
    pub strict: bool,
}

impl LinterConfig {
    /// Resolves against the process environment.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolves with an explicit environment lookup. Empty values count as unset.
    pub fn resolve_with<F>(overrides: ConfigOverrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let dataset = match overrides.dataset {
            Some(path) => path,
            None => env(ENV_DATASET)
                .map(PathBuf::from)
                .unwrap_or_else(default_dataset_path),
        };

        let api_level = match overrides.api_level {
            Some(level) => Some(level),
            None => env(ENV_API_LEVEL)
                .map(|raw| {
                    raw.trim().parse::<i32>().map_err(|_| ConfigError::InvalidApiLevel {
                        var: ENV_API_LEVEL,
                        value: raw,
                    })
                })
                .transpose()?,
        };

        let strict = match overrides.strict {
            Some(strict) => strict,
            None => match env(ENV_STRICT) {
                Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidBool {
                    var: ENV_STRICT,
                    value: raw,
                })?,
                None => false,
            },
        };

        Ok(Self {
            dataset,
            api_level,
            strict,
        })
    }

    pub fn query_context(&self) -> QueryContext {
        QueryContext {
            api_level: self.api_level,
            strict: self.strict,
        }
    }
}

/// User cache copy when present, else the packaged dataset.
pub fn default_dataset_path() -> PathBuf {
    dirs::cache_dir()
        .map(|base| base.join("apilint").join("rules.rkyv"))
        .filter(|cached| cached.is_file())
        .unwrap_or_else(|| PathBuf::from(PACKAGED_DATASET))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
