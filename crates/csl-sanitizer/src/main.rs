/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Batch driver: sanitize a directory of CSL styles and check them with hayagriva.
 */

use anyhow::{Context, Result};
use clap::Parser;
use csl_sanitizer_core::index::{
    IndexEntry, StyleInfo, diff_path, json_index, sort_entries, unified_diff,
};
use csl_sanitizer_core::{
    Hayagriva, Pipeline, RunReport, SanitizerConfig, StyleValidator, Toggles, Verdict,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "csl-sanitizer")]
#[command(about = "Rewrite CSL styles so that hayagriva accepts them")]
#[command(version)]
struct Args {
    /// Styles to process; all `.csl` files under --styles-dir when empty
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Directory searched for styles
    #[arg(long, default_value = "styles")]
    styles_dir: PathBuf,

    /// Directory for sanitized styles, diffs and index.json
    #[arg(long, default_value = "dist")]
    out_dir: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate after every rule that changed the style
    #[arg(long)]
    check_each_rule: bool,

    /// Skip validation
    #[arg(long)]
    no_check: bool,

    /// Log every change as it is made
    #[arg(short, long)]
    verbose: bool,

    /// Seconds before a validator run is killed
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path of the hayagriva binary
    #[arg(long, value_name = "PATH")]
    hayagriva: Option<PathBuf>,

    /// Bibliography used for validation instead of the built-in sample
    #[arg(long, value_name = "PATH")]
    sample: Option<PathBuf>,

    /// Print the rule catalog and exit
    #[arg(long)]
    list_rules: bool,
}

impl Args {
    /// Command-line flags win over the environment.
    fn toggles(&self, env: Toggles) -> Toggles {
        Toggles {
            debug: self.verbose || env.debug,
            check_each_rule: self.check_each_rule || env.check_each_rule,
            skip_check: self.no_check || env.skip_check,
        }
    }

    fn config(&self) -> Result<SanitizerConfig> {
        let mut config = match &self.config {
            Some(path) => SanitizerConfig::load(path)?,
            None => SanitizerConfig::default(),
        };
        if let Some(timeout) = self.timeout {
            config.validator.timeout_secs = timeout;
        }
        if let Some(binary) = &self.hayagriva {
            config.validator.binary = Some(binary.clone());
        }
        if let Some(sample) = &self.sample {
            config.validator.sample = Some(sample.clone());
        }
        Ok(config)
    }
}

/// A style that made it through the pipeline.
struct Processed {
    entry: IndexEntry,
    report: RunReport,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csl_sanitizer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.config()?;
    let toggles = args.toggles(Toggles::from_env());

    let pipeline = Pipeline::standard(&config.vendor_variables).with_verbose(toggles.debug);

    if args.list_rules {
        for name in pipeline.rule_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let validator = if toggles.skip_check {
        None
    } else {
        Some(
            Hayagriva::discover(&config.validator)
                .context("Validation requested but hayagriva is unavailable (use --no-check)")?,
        )
    };

    let files = if args.files.is_empty() {
        find_styles(&args.styles_dir, &config)?
    } else {
        args.files.clone()
    };
    tracing::debug!(count = files.len(), "Found styles");

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.out_dir))?;

    let planned = plan_outputs(&files, &args.styles_dir)?;

    let results: Vec<(PathBuf, Result<Processed>)> = planned
        .par_iter()
        .map(|(path, relative)| {
            let result = process_style(
                path,
                &args.out_dir.join(relative),
                &pipeline,
                validator.as_ref(),
                toggles.check_each_rule,
            );
            (relative.clone(), result)
        })
        .collect();

    let mut entries = Vec::new();
    let mut accepted = 0;
    let mut rejected = 0;
    let mut failed = 0;

    for (relative, result) in results {
        match result {
            Ok(processed) => {
                match &processed.entry.verdict {
                    Some(Verdict::Rejected { diagnostic }) => {
                        println!("💥 {}", relative.display());
                        println!("{}", diagnostic);
                        if let Some(checkpoint) = processed.report.first_rejection() {
                            println!("   (first rejected after rule {})", checkpoint.rule);
                        }
                        rejected += 1;
                    }
                    Some(Verdict::Accepted) | None => {
                        println!("✅ {}", relative.display());
                        accepted += 1;
                    }
                }
                entries.push(processed.entry);
            }
            Err(e) => {
                println!("✗ Error processing {}: {:#}", relative.display(), e);
                failed += 1;
            }
        }
    }

    sort_entries(&mut entries);
    let index_path = args.out_dir.join("index.json");
    let index = json_index(&entries, &args.out_dir).context("Failed to serialize index")?;
    fs::write(&index_path, index)
        .with_context(|| format!("Failed to write index: {:?}", index_path))?;

    eprintln!(
        "\nProcessed {} styles: {} accepted, {} rejected, {} failed",
        accepted + rejected + failed,
        accepted,
        rejected,
        failed
    );

    if rejected + failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// All `.csl` files below `styles_dir` that are not skipped, sorted.
fn find_styles(styles_dir: &Path, config: &SanitizerConfig) -> Result<Vec<PathBuf>> {
    if !styles_dir.is_dir() {
        anyhow::bail!("Styles directory does not exist: {:?}", styles_dir);
    }
    let mut files: Vec<PathBuf> = WalkDir::new(styles_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "csl"))
        .map(|e| e.path().to_path_buf())
        .filter(|path| {
            let skipped = config.is_skipped(path);
            if skipped {
                tracing::info!(style = %path.display(), "Skipping style");
            }
            !skipped
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Where a style goes below the output directory: its path relative to the
/// styles directory, or its whole path when it lives elsewhere.
fn relative_path(path: &Path, styles_dir: &Path) -> PathBuf {
    let path = normal_components(path);
    let styles_dir = normal_components(styles_dir);
    match path.strip_prefix(&styles_dir) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
        _ => path,
    }
}

/// `path` without its root, prefix, `.` and `..` components.
fn normal_components(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Pair every style with its destination relative to the output directory.
///
/// Workers write their outputs concurrently, so every destination must be
/// unique before any of them starts.
fn plan_outputs(files: &[PathBuf], styles_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    let mut planned = Vec::with_capacity(files.len());
    for path in files {
        let relative = relative_path(path, styles_dir);
        if let Some(previous) = seen.insert(relative.clone(), path.as_path()) {
            anyhow::bail!(
                "{:?} and {:?} would both be written to {:?}",
                previous,
                path,
                relative
            );
        }
        planned.push((path.clone(), relative));
    }
    Ok(planned)
}

fn process_style(
    path: &Path,
    dest: &Path,
    pipeline: &Pipeline,
    validator: Option<&Hayagriva>,
    check_each_rule: bool,
) -> Result<Processed> {
    let per_rule = validator
        .filter(|_| check_each_rule)
        .map(|v| v as &dyn StyleValidator);
    let outcome = pipeline.process_file(path, dest, per_rule)?;

    let diff = diff_path(dest);
    fs::write(&diff, unified_diff(&outcome.original, &outcome.output))
        .with_context(|| format!("Failed to write diff: {:?}", diff))?;

    let info = StyleInfo::from_source(&outcome.output)?;
    let verdict = validator.map(|v| v.check_file(dest)).transpose()?;

    Ok(Processed {
        entry: IndexEntry {
            info,
            sanitized: dest.to_path_buf(),
            diff,
            changes: outcome
                .report
                .messages
                .iter()
                .map(ToString::to_string)
                .collect(),
            verdict,
        },
        report: outcome.report,
    })
}
