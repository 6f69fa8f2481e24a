/*
 * snapshot.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Fixture-based regression tests for the pipeline.
 */

//! Snapshot fixtures.
//!
//! A fixture is a TOML file with the input style and, once generated, the
//! expected change log and output:
//!
//! ```toml
//! input = '''
//! <style>...</style>
//! '''
//!
//! expected_messages = [
//!   "Removed the localized (en) layout for bibliography. [Discard CSL-M extension]",
//! ]
//!
//! expected_output = '''
//! <style>...</style>
//! '''
//! ```
//!
//! In [`SnapshotMode::Check`] any difference is a failure. In
//! [`SnapshotMode::Update`] the expectations are rewritten from the current
//! result, for reviewed changes to rule behavior.

use crate::config::bool_env_value;
use crate::error::NormalizeError;
use crate::index::unified_diff;
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Setting this variable to a true value switches to update mode.
pub const UPDATE_ENV: &str = "UPDATE_SNAPSHOTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_messages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    Check,
    Update,
}

impl SnapshotMode {
    pub fn from_env() -> Self {
        match std::env::var(UPDATE_ENV) {
            Ok(value) if bool_env_value(&value) => SnapshotMode::Update,
            _ => SnapshotMode::Check,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureOutcome {
    Passed,
    Updated,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write fixture: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{path}: {source}")]
    Normalize {
        path: PathBuf,
        #[source]
        source: NormalizeError,
    },

    #[error("{path} has no expectations yet; run with UPDATE_SNAPSHOTS=1 to record them")]
    MissingExpectation { path: PathBuf },

    #[error("{path} does not match:\n{detail}")]
    Mismatch { path: PathBuf, detail: String },
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as TOML, keeping documents readable in literal strings.
    pub fn to_toml(&self) -> Result<String, SnapshotError> {
        let documents = std::iter::once(&self.input).chain(&self.expected_output);
        if !documents.into_iter().all(|d| fits_literal(d)) {
            return Ok(toml::to_string(self)?);
        }

        let mut out = format!("input = '''\n{}'''\n", self.input);
        if let Some(messages) = &self.expected_messages {
            out.push_str("\nexpected_messages = [\n");
            for message in messages {
                out.push_str("  ");
                out.push_str(&toml::Value::String(message.clone()).to_string());
                out.push_str(",\n");
            }
            out.push_str("]\n");
        }
        if let Some(output) = &self.expected_output {
            out.push_str(&format!("\nexpected_output = '''\n{}'''\n", output));
        }
        Ok(out)
    }
}

/// Whether `text` survives a round trip through a multi-line literal string.
fn fits_literal(text: &str) -> bool {
    !text.contains("'''")
        && !text.ends_with('\'')
        && !text
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t')
}

/// Run the pipeline on one fixture and compare or update it.
pub fn run_fixture(
    path: &Path,
    pipeline: &Pipeline,
    mode: SnapshotMode,
) -> Result<FixtureOutcome, SnapshotError> {
    let fixture = Fixture::load(path)?;
    let (output, report) =
        pipeline
            .normalize_str(&fixture.input)
            .map_err(|source| SnapshotError::Normalize {
                path: path.to_path_buf(),
                source,
            })?;
    let messages: Vec<String> = report.messages.iter().map(ToString::to_string).collect();

    match mode {
        SnapshotMode::Update => {
            let updated = Fixture {
                input: fixture.input.clone(),
                expected_messages: Some(messages),
                expected_output: Some(output),
            };
            if updated == fixture {
                return Ok(FixtureOutcome::Passed);
            }
            std::fs::write(path, updated.to_toml()?).map_err(|source| SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(fixture = %path.display(), "Updated snapshot");
            Ok(FixtureOutcome::Updated)
        }
        SnapshotMode::Check => {
            let (Some(expected_messages), Some(expected_output)) =
                (&fixture.expected_messages, &fixture.expected_output)
            else {
                return Err(SnapshotError::MissingExpectation {
                    path: path.to_path_buf(),
                });
            };

            let mut detail = String::new();
            if *expected_messages != messages {
                detail.push_str(&unified_diff(
                    &lines(expected_messages),
                    &lines(&messages),
                ));
            }
            if *expected_output != output {
                detail.push_str(&unified_diff(expected_output, &output));
            }
            if detail.is_empty() {
                Ok(FixtureOutcome::Passed)
            } else {
                Err(SnapshotError::Mismatch {
                    path: path.to_path_buf(),
                    detail,
                })
            }
        }
    }
}

fn lines(messages: &[String]) -> String {
    messages.iter().map(|m| format!("{}\n", m)).collect()
}
