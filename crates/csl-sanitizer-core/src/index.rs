/*
 * index.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Style metadata, diffs and the change-log index.
 */

//! The change-log index consumed by the results site.
//!
//! Every processed style contributes an [`IndexEntry`]: its metadata, where
//! the sanitized file and its diff were written, and the change messages.
//! [`json_index`] serializes the entries keyed by style id.

use crate::error::NormalizeError;
use crate::validator::Verdict;
use csl_sanitizer_xml::{Document, Element};
use serde::Serialize;
use similar::TextDiff;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

const GB_T_7714: &str = "GB/T 7714—";

/// Metadata from the `<info>` element of a style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleInfo {
    pub title: String,
    pub id: String,
    pub updated: String,
}

impl StyleInfo {
    /// Read title, id and update time.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if `<info>` or one of the fields is missing.
    pub fn from_document(document: &Document) -> Result<Self, NormalizeError> {
        let info = document
            .root
            .child_elements_named("info")
            .next()
            .ok_or_else(|| NormalizeError::structure("style-info", "<info> is missing"))?;
        Ok(Self {
            title: field(info, "title")?,
            id: field(info, "id")?,
            updated: field(info, "updated")?,
        })
    }

    /// Parse `source` and read its metadata.
    pub fn from_source(source: &str) -> Result<Self, NormalizeError> {
        Self::from_document(&csl_sanitizer_xml::parse_str(source)?)
    }
}

fn field(info: &Element, name: &str) -> Result<String, NormalizeError> {
    info.child_elements_named(name)
        .next()
        .map(|element| element.text().trim().to_string())
        .ok_or_else(|| NormalizeError::structure("style-info", format!("<info> has no <{}>", name)))
}

/// One processed style.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub info: StyleInfo,
    pub sanitized: PathBuf,
    pub diff: PathBuf,
    pub changes: Vec<String>,
    /// `None` when validation was skipped.
    pub verdict: Option<Verdict>,
}

/// Where the diff for a sanitized style is written: next to it, with the
/// extension replaced by `diff`.
pub fn diff_path(sanitized: &Path) -> PathBuf {
    sanitized.with_extension("diff")
}

/// Unified diff from the original to the sanitized source.
///
/// Empty when nothing changed.
pub fn unified_diff(original: &str, sanitized: &str) -> String {
    if original == sanitized {
        return String::new();
    }
    TextDiff::from_lines(original, sanitized)
        .unified_diff()
        .context_radius(3)
        .header("Original", "Sanitized")
        .to_string()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TitleKey<'a> {
    /// GB/T 7714 editions, newest first.
    GbT7714 {
        newest: std::cmp::Reverse<u32>,
        rest: &'a str,
    },
    /// Titles that do not start with a Latin capital, mostly Chinese.
    NonLatin(&'a str),
    Latin(&'a str),
}

fn title_key(title: &str) -> TitleKey<'_> {
    if let Some(rest) = title.strip_prefix(GB_T_7714) {
        let split = rest.char_indices().nth(4).map_or(rest.len(), |(i, _)| i);
        let (year, rest) = rest.split_at(split);
        return TitleKey::GbT7714 {
            newest: std::cmp::Reverse(year.parse().unwrap_or(0)),
            rest,
        };
    }
    if title.starts_with(|c: char| c.is_ascii_uppercase()) {
        TitleKey::Latin(title)
    } else {
        TitleKey::NonLatin(title)
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    title_key(a).cmp(&title_key(b))
}

/// Sort entries the way the results site lists them.
pub fn sort_entries(entries: &mut [IndexEntry]) {
    entries.sort_by(|a, b| compare_titles(&a.info.title, &b.info.title));
}

#[derive(Serialize)]
struct IndexRecord<'a> {
    title: &'a str,
    updated: &'a str,
    sanitized_url: String,
    diff_url: String,
    changes: &'a [String],
}

/// `./`-prefixed path relative to `out_dir`, with `/` separators.
fn relative_url(path: &Path, out_dir: &Path) -> String {
    let relative = path.strip_prefix(out_dir).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("./{}", parts.join("/"))
}

/// The JSON index, keyed by style id in the order of `entries`.
pub fn json_index(entries: &[IndexEntry], out_dir: &Path) -> Result<String, serde_json::Error> {
    let mut map = serde_json::Map::new();
    for entry in entries {
        let record = IndexRecord {
            title: &entry.info.title,
            updated: &entry.info.updated,
            sanitized_url: relative_url(&entry.sanitized, out_dir),
            diff_url: relative_url(&entry.diff, out_dir),
            changes: &entry.changes,
        };
        map.insert(entry.info.id.clone(), serde_json::to_value(record)?);
    }
    serde_json::to_string_pretty(&map)
}
