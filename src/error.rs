use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TSV parsing failed for {file}: {source}")]
    Tsv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no header row")]
    MissingHeader(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid schedule '{expression}': {message}")]
    Schedule { expression: String, message: String },

    #[error("Stage task failed to complete: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{} dataset(s) failed to download: {}", .0.len(), .0.join(", "))]
    IncompleteDownload(Vec<String>),
}

impl EtlError {
    /// Attach the offending file name to a TSV error
    pub fn tsv(file: impl Into<String>, source: csv::Error) -> Self {
        EtlError::Tsv {
            file: file.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
