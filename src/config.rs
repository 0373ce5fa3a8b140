use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::constants;
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub transform: TransformConfig,
    pub analytics: AnalyticsConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub datasets: Vec<String>,
    /// No timeout when unset; a stalled server then stalls the run
    pub timeout_seconds: Option<u64>,
    /// Abort before normalizing when any dataset failed to download
    pub fail_on_missing_downloads: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub staging_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub database: PathBuf,
    /// Delete each intermediate file once the next stage has consumed it
    pub cleanup_consumed: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformConfig {
    pub null_sentinel: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub refresh: AnalyticsRefresh,
}

/// How the analytical tables are rebuilt on each run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsRefresh {
    /// Drop and recreate so every run reflects the current raw tables
    #[default]
    Replace,
    /// Create only when absent; existing tables are never refreshed
    IfMissing,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub cron: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: constants::IMDB_BASE_URL.to_string(),
            datasets: constants::get_dataset_files()
                .into_iter()
                .map(str::to_string)
                .collect(),
            timeout_seconds: None,
            fail_on_missing_downloads: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(constants::DEFAULT_STAGING_DIR),
            processed_dir: PathBuf::from(constants::DEFAULT_PROCESSED_DIR),
            database: PathBuf::from(constants::DEFAULT_DATABASE),
            cleanup_consumed: true,
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            null_sentinel: constants::NULL_SENTINEL.to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: constants::DEFAULT_SCHEDULE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `imdb_etl.toml` when present), apply
    /// `IMDB_ETL_*` environment overrides and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override individual settings from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IMDB_ETL_BASE_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = lookup("IMDB_ETL_DATA_DIR") {
            self.storage.staging_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("IMDB_ETL_PROCESSED_DIR") {
            self.storage.processed_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("IMDB_ETL_DATABASE") {
            self.storage.database = PathBuf::from(v);
        }
        if let Some(v) = lookup("IMDB_ETL_LOG_DIR") {
            self.logging.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("IMDB_ETL_SCHEDULE") {
            self.schedule.cron = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = &self.source.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(EtlError::Config(format!("base_url must be http(s): {}", url)));
        }
        if !url.ends_with('/') {
            return Err(EtlError::Config(format!("base_url must end with '/': {}", url)));
        }
        if self.source.datasets.is_empty() {
            return Err(EtlError::Config("at least one dataset is required".to_string()));
        }
        for name in &self.source.datasets {
            if !name.ends_with(constants::COMPRESSED_SUFFIX) || name.contains('/') {
                return Err(EtlError::Config(format!(
                    "dataset '{}' must be a bare file name ending in {}",
                    name,
                    constants::COMPRESSED_SUFFIX
                )));
            }
        }
        if self.transform.null_sentinel.is_empty() {
            return Err(EtlError::Config("null_sentinel must not be empty".to_string()));
        }
        if self.storage.staging_dir == self.storage.processed_dir {
            return Err(EtlError::Config(
                "staging_dir and processed_dir must differ".to_string(),
            ));
        }
        crate::scheduler::parse_schedule(&self.schedule.cron)?;
        Ok(())
    }
}
