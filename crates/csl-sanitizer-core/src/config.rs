/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Configuration file and environment toggles.
 */

//! Configuration.
//!
//! Settings come from an optional TOML file:
//!
//! ```toml
//! skip = ["styles/broken.csl"]
//! vendor_variables = ["nationality", "container-title-zh", "locale"]
//!
//! [validator]
//! binary = "/usr/local/bin/hayagriva"
//! timeout_secs = 30
//! ```
//!
//! Three boolean toggles are read from the environment; see [`Toggles`].

use crate::rules::DEFAULT_VENDOR_VARIABLES;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SanitizerConfig {
    /// Styles left out of batch runs.
    pub skip: Vec<PathBuf>,
    /// Non-standard variables removed by `strip-vendor-variables`.
    pub vendor_variables: Vec<String>,
    pub validator: ValidatorConfig,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            vendor_variables: DEFAULT_VENDOR_VARIABLES
                .iter()
                .map(|v| v.to_string())
                .collect(),
            validator: ValidatorConfig::default(),
        }
    }
}

impl SanitizerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Whether `path` is listed in `skip`.
    ///
    /// Entries match either the full path or a trailing part of it, so
    /// `broken.csl` skips `styles/broken.csl`.
    pub fn is_skipped(&self, path: &Path) -> bool {
        self.skip.iter().any(|skip| path.ends_with(skip))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Path of the hayagriva binary; discovered when unset.
    pub binary: Option<PathBuf>,
    /// Bibliography sample; the embedded one when unset.
    pub sample: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            binary: None,
            sample: None,
            timeout_secs: 30,
        }
    }
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Environment access, replaceable in tests.
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

pub const DEBUG_ENV: &str = "CSL_SANITIZER_DEBUG";
pub const CHECK_EACH_RULE_ENV: &str = "CSL_SANITIZER_CHECK_EACH_RULE";
pub const SKIP_CHECK_ENV: &str = "CSL_SANITIZER_SKIP_CHECK";

/// Run toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Toggles {
    /// Log every change message as it is produced.
    pub debug: bool,
    /// Validate after every rule that changed something.
    pub check_each_rule: bool,
    /// Do not run the validator at all.
    pub skip_check: bool,
}

impl Toggles {
    pub fn from_env() -> Self {
        Self::from_env_with(&SystemEnvProvider)
    }

    pub fn from_env_with(env: &impl EnvProvider) -> Self {
        let flag = |key: &str| env.get(key).is_some_and(|value| bool_env_value(&value));
        Self {
            debug: flag(DEBUG_ENV),
            check_each_rule: flag(CHECK_EACH_RULE_ENV),
            skip_check: flag(SKIP_CHECK_ENV),
        }
    }
}

/// Empty, `0` and `false` in any case are off; anything else is on.
pub fn bool_env_value(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}
