/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Normalization engine for CSL styles.
 */

//! Normalization engine for CSL styles.
//!
//! Styles written for citeproc-js or CSL-M often use constructs outside the
//! CSL specification, which stricter processors such as hayagriva reject.
//! This crate rewrites those constructs to their nearest compliant
//! equivalent and records a message for every change.
//!
//! - [`style`] - typed views of the well-known parts of a style
//! - [`rules`] - the rule catalog
//! - [`pipeline`] - runs the catalog over one document
//! - [`validator`] - acceptance check with the external validator
//! - [`index`] - style metadata, diffs and the JSON change-log index
//! - [`snapshot`] - fixture-based regression tests
//! - [`config`] - configuration file and environment toggles

pub mod config;
pub mod error;
pub mod index;
pub mod message;
pub mod pipeline;
pub mod rules;
pub mod snapshot;
pub mod style;
pub mod validator;

pub use config::{SanitizerConfig, Toggles, ValidatorConfig};
pub use error::{KnownMalformedShape, MalformedInput, NormalizeError, ValidateError};
pub use message::{Deviation, Message};
pub use pipeline::{Checkpoint, FileOutcome, Pipeline, RunReport};
pub use rules::{Rule, RuleContext};
pub use style::Style;
pub use validator::{Hayagriva, StyleValidator, Verdict};
