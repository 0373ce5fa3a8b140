//! Shared TSV dialect and scratch-directory helpers.
//!
//! The dumps are plain tab-separated text without quoting: a `"` inside a
//! title is data, never a quote character. Normalized files are written in
//! the same dialect so the Loader can read them back with the same rules.

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;

pub fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(b'\t').quoting(false).has_headers(true);
    builder
}

pub fn writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder.delimiter(b'\t').quote_style(QuoteStyle::Never);
    builder
}

/// Regular files in `dir` whose name ends with `suffix`, sorted by name.
/// A missing directory yields nothing.
pub fn list_files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("Directory {} does not exist, nothing to process", dir.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(suffix))
            .unwrap_or(false);
        if matches && entry.file_type()?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name component as an owned string, for logging and naming
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
