/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error taxonomy for normalization and validation.
 */

//! Error types for csl-sanitizer-core.
//!
//! Failures split into what stops processing of one file
//! ([`NormalizeError`]), what stops validation ([`ValidateError`]), and
//! tolerated oddities that are only logged ([`KnownMalformedShape`]).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A file that cannot be normalized.
#[derive(Debug, Error)]
pub enum MalformedInput {
    /// The bytes are not well-formed XML.
    #[error("{0}")]
    Xml(#[from] csl_sanitizer_xml::Error),

    /// A structural precondition of a rule does not hold.
    #[error("{rule}: {detail}")]
    Structure { rule: &'static str, detail: String },
}

/// Errors that abort processing of a single file.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] MalformedInput),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Validation requested during the run could not be performed.
    #[error("Validation failed to run: {0}")]
    Validate(#[from] ValidateError),
}

impl NormalizeError {
    /// A structural precondition violation found by `rule`.
    pub fn structure(rule: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedInput(MalformedInput::Structure {
            rule,
            detail: detail.into(),
        })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the input itself is at fault.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }
}

impl From<csl_sanitizer_xml::Error> for NormalizeError {
    fn from(err: csl_sanitizer_xml::Error) -> Self {
        Self::MalformedInput(MalformedInput::Xml(err))
    }
}

/// Errors from the external validator.
///
/// A rejected style is not an error; see
/// [`Verdict`](crate::validator::Verdict).
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The validator binary is missing or could not be started.
    #[error("Validator unavailable ({binary}): {reason}")]
    Unavailable { binary: PathBuf, reason: String },

    /// The validator did not finish in time and was killed.
    #[error("Validator timed out after {}s on {style}", .timeout.as_secs())]
    TimedOut { style: PathBuf, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A previously observed malformed structure that a rule skips.
///
/// Never fatal. Every occurrence is logged with `warn!` and collected in the
/// run report so it stays visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownMalformedShape {
    /// Name of the rule that skipped the construct.
    pub rule: &'static str,
    /// `xml:lang` of the affected locale, if any.
    pub locale: Option<String>,
    /// The offending element, e.g. `date`.
    pub element: String,
    /// What was expected in its place.
    pub context: &'static str,
}

impl fmt::Display for KnownMalformedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: skipped <{}> in {} of locale {}",
            self.rule,
            self.element,
            self.context,
            self.locale.as_deref().unwrap_or("(default)")
        )
    }
}
