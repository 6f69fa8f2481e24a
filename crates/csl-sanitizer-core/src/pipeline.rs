/*
 * pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Ordered execution of the rule catalog over one style.
 */

//! The normalization pipeline.
//!
//! A [`Pipeline`] runs its rules in insertion order over one document and
//! concatenates their messages into the change log. Running a pipeline on
//! its own output produces no messages and the same bytes.
//!
//! # Example
//!
//! ```
//! use csl_sanitizer_core::Pipeline;
//!
//! let pipeline = Pipeline::standard(&[]);
//! let source = r#"<style><citation><layout/></citation></style>"#;
//! let (output, report) = pipeline.normalize_str(source).unwrap();
//!
//! assert_eq!(output, r#"<style><citation><layout><text value=""/></layout></citation></style>"#);
//! assert_eq!(report.messages.len(), 1);
//! ```

use crate::error::{KnownMalformedShape, NormalizeError};
use crate::message::Message;
use crate::rules::{Rule, RuleContext, catalog};
use crate::style::Style;
use crate::validator::{StyleValidator, Verdict};
use csl_sanitizer_xml::{Document, parse};
use std::path::Path;

/// Validator verdict on the document right after one rule changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub rule: &'static str,
    pub verdict: Verdict,
}

/// Everything one pipeline run produced besides the document.
#[derive(Debug, Default)]
pub struct RunReport {
    /// The change log, in rule order.
    pub messages: Vec<Message>,
    /// Constructs the rules skipped as known malformed shapes.
    pub skipped: Vec<KnownMalformedShape>,
    /// Only filled by [`Pipeline::run_checked`].
    pub checkpoints: Vec<Checkpoint>,
}

impl RunReport {
    /// Whether no rule changed anything.
    pub fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }

    /// The first rule whose output the validator rejected.
    pub fn first_rejection(&self) -> Option<&Checkpoint> {
        self.checkpoints
            .iter()
            .find(|checkpoint| !checkpoint.verdict.is_accepted())
    }
}

/// The result of processing one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub original: String,
    pub output: String,
    pub report: RunReport,
}

/// An ordered list of rules.
pub struct Pipeline {
    rules: Vec<Box<dyn Rule>>,
    verbose: bool,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            verbose: false,
        }
    }

    /// The full rule catalog, stripping the given vendor variables.
    pub fn standard(vendor_variables: &[String]) -> Self {
        let mut pipeline = Self::new();
        pipeline.extend(catalog(vendor_variables));
        pipeline
    }

    /// Log every change message at `info` level as it is produced.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Add a rule. Rules run in the order they are added.
    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Box<dyn Rule>>) {
        self.rules.extend(rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names of all rules in execution order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Run every rule over `document`.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered. Execution stops on error and the
    /// document is left partially rewritten.
    pub fn run(&self, document: &mut Document) -> Result<RunReport, NormalizeError> {
        self.execute(document, None)
    }

    /// Like [`run`](Self::run), but validate the document after each rule
    /// that changed it, to find out which rule produced output the
    /// validator rejects.
    pub fn run_checked(
        &self,
        document: &mut Document,
        validator: &dyn StyleValidator,
    ) -> Result<RunReport, NormalizeError> {
        self.execute(document, Some(validator))
    }

    fn execute(
        &self,
        document: &mut Document,
        validator: Option<&dyn StyleValidator>,
    ) -> Result<RunReport, NormalizeError> {
        let mut ctx = RuleContext::new();
        let mut report = RunReport::default();

        for rule in &self.rules {
            tracing::debug!(rule = rule.name(), "Running rule");
            let messages = {
                let mut style = Style::new(document)?;
                rule.apply(&mut style, &mut ctx)?
            };
            if self.verbose {
                for message in &messages {
                    tracing::info!(rule = rule.name(), "{}", message);
                }
            }

            let changed = !messages.is_empty();
            report.messages.extend(messages);

            if let (true, Some(validator)) = (changed, validator) {
                let verdict = validator.check_source(&document.to_bytes())?;
                if let Verdict::Rejected { diagnostic } = &verdict {
                    tracing::warn!(rule = rule.name(), %diagnostic, "Output rejected after rule");
                }
                report.checkpoints.push(Checkpoint {
                    rule: rule.name(),
                    verdict,
                });
            }
        }

        report.skipped = ctx.into_skipped();
        Ok(report)
    }

    /// Parse, run and serialize.
    pub fn normalize(&self, bytes: &[u8]) -> Result<(Vec<u8>, RunReport), NormalizeError> {
        let mut document = parse(bytes)?;
        let report = self.run(&mut document)?;
        Ok((document.to_bytes(), report))
    }

    pub fn normalize_str(&self, source: &str) -> Result<(String, RunReport), NormalizeError> {
        let mut document = csl_sanitizer_xml::parse_str(source)?;
        let report = self.run(&mut document)?;
        Ok((document.to_xml_string(), report))
    }

    /// Normalize the style at `source` and write the result to `dest`.
    ///
    /// With `per_rule`, the document is validated after every rule that
    /// changed it, as in [`run_checked`](Self::run_checked).
    pub fn process_file(
        &self,
        source: &Path,
        dest: &Path,
        per_rule: Option<&dyn StyleValidator>,
    ) -> Result<FileOutcome, NormalizeError> {
        let bytes = std::fs::read(source).map_err(|e| NormalizeError::io(source, e))?;
        let mut document = parse(&bytes)?;
        let report = self.execute(&mut document, per_rule)?;
        let output = document.to_bytes();

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NormalizeError::io(parent, e))?;
        }
        std::fs::write(dest, &output).map_err(|e| NormalizeError::io(dest, e))?;

        Ok(FileOutcome {
            original: String::from_utf8_lossy(&bytes).into_owned(),
            output: String::from_utf8_lossy(&output).into_owned(),
            report,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
