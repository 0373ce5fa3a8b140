//! Naming rules for a dataset dump as it moves through the pipeline.
//!
//! `title.basics.tsv.gz` is downloaded to `<staging>/title.basics.tsv.gz`,
//! normalized to `<processed>/title.basics.tsv` and loaded as `title_basics`.

use std::path::{Path, PathBuf};

use crate::constants::COMPRESSED_SUFFIX;

/// A single dataset dump identified by its file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub file_name: String,
}

impl DatasetFile {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url, self.file_name)
    }

    pub fn staged_path(&self, staging_dir: &Path) -> PathBuf {
        staging_dir.join(&self.file_name)
    }

    pub fn processed_name(&self) -> String {
        processed_file_name(&self.file_name)
    }

    pub fn processed_path(&self, processed_dir: &Path) -> PathBuf {
        processed_dir.join(self.processed_name())
    }

    pub fn table_name(&self) -> String {
        table_name_for(&self.processed_name())
    }
}

/// Strip the compression suffix, if any
pub fn processed_file_name(file_name: &str) -> String {
    file_name
        .strip_suffix(COMPRESSED_SUFFIX)
        .unwrap_or(file_name)
        .to_string()
}

/// Table name for a processed file: last extension removed, `.` and `-` become `_`
pub fn table_name_for(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    stem.replace(['.', '-'], "_")
}
