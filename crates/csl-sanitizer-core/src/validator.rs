/*
 * validator.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Acceptance check against the strict consumer.
 */

//! Validation against hayagriva.
//!
//! The strict consumer is an opaque pass/fail oracle: a style is accepted
//! when `hayagriva <sample> reference --csl <style>` exits successfully.
//! Its diagnostics are passed on verbatim.
//!
//! # Finding hayagriva
//!
//! [`find_hayagriva`] searches in this order:
//! 1. An explicit path from the configuration or the command line
//! 2. `HAYAGRIVA` environment variable
//! 3. System PATH via `which`

use crate::config::ValidatorConfig;
use crate::error::ValidateError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// The bibliography every style renders during validation.
pub const SAMPLE: &str = include_str!("../data/sample.yaml");

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcome of one validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { diagnostic: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Something that can accept or reject a style.
///
/// Any `Fn(&Path) -> Result<Verdict, ValidateError>` closure is a validator,
/// which keeps tests independent from the real binary.
pub trait StyleValidator: Send + Sync {
    /// Validate a style file on disk.
    fn check_file(&self, style: &Path) -> Result<Verdict, ValidateError>;

    /// Validate serialized style source.
    ///
    /// The source is staged in a scratch file of its own, so concurrent
    /// callers never share a path.
    fn check_source(&self, source: &[u8]) -> Result<Verdict, ValidateError> {
        let mut scratch = tempfile::Builder::new()
            .prefix("csl-sanitizer-")
            .suffix(".csl")
            .tempfile()?;
        scratch.write_all(source)?;
        scratch.flush()?;
        self.check_file(scratch.path())
    }
}

impl<F> StyleValidator for F
where
    F: Fn(&Path) -> Result<Verdict, ValidateError> + Send + Sync,
{
    fn check_file(&self, style: &Path) -> Result<Verdict, ValidateError> {
        self(style)
    }
}

/// Find the hayagriva binary.
pub fn find_hayagriva(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(value) = std::env::var("HAYAGRIVA") {
        let path = PathBuf::from(value);
        if path.is_file() {
            return Some(path);
        }
    }

    which::which("hayagriva").ok()
}

enum Sample {
    Configured(PathBuf),
    /// The embedded sample, written out for the lifetime of the validator.
    Embedded(NamedTempFile),
}

impl Sample {
    fn path(&self) -> &Path {
        match self {
            Sample::Configured(path) => path,
            Sample::Embedded(file) => file.path(),
        }
    }
}

/// The hayagriva command-line tool as a validator.
pub struct Hayagriva {
    binary: PathBuf,
    sample: Sample,
    timeout: Duration,
}

impl Hayagriva {
    /// Use `binary` with the given sample, or the embedded one.
    pub fn new(
        binary: PathBuf,
        sample: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, ValidateError> {
        let sample = match sample {
            Some(path) => Sample::Configured(path),
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix("csl-sanitizer-sample-")
                    .suffix(".yaml")
                    .tempfile()?;
                file.write_all(SAMPLE.as_bytes())?;
                file.flush()?;
                Sample::Embedded(file)
            }
        };
        Ok(Self {
            binary,
            sample,
            timeout,
        })
    }

    /// Locate the binary as described in the module docs.
    pub fn discover(config: &ValidatorConfig) -> Result<Self, ValidateError> {
        let binary = find_hayagriva(config.binary.as_deref()).ok_or_else(|| {
            ValidateError::Unavailable {
                binary: PathBuf::from("hayagriva"),
                reason: "not found via HAYAGRIVA or PATH".to_string(),
            }
        })?;
        tracing::debug!(binary = %binary.display(), "Using hayagriva");
        Self::new(binary, config.sample.clone(), config.timeout())
    }
}

impl StyleValidator for Hayagriva {
    fn check_file(&self, style: &Path) -> Result<Verdict, ValidateError> {
        let mut child = Command::new(&self.binary)
            .arg(self.sample.path())
            .arg("reference")
            .arg("--csl")
            .arg(style)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ValidateError::Unavailable {
                binary: self.binary.clone(),
                reason: e.to_string(),
            })?;

        // Drain both pipes while waiting so a chatty child cannot block
        let stdout = child.stdout.take().map(read_in_thread);
        let stderr = child.stderr.take().map(read_in_thread);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(style = %style.display(), "Validator timed out");
                return Err(ValidateError::TimedOut {
                    style: style.to_path_buf(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if status.success() {
            tracing::debug!(style = %style.display(), "Validator accepted style");
            return Ok(Verdict::Accepted);
        }

        let diagnostic = match stderr.trim() {
            "" => stdout.trim().to_string(),
            stderr => stderr.to_string(),
        };
        tracing::info!(style = %style.display(), %status, "Validator rejected style");
        Ok(Verdict::Rejected { diagnostic })
    }
}

fn read_in_thread<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
