use std::path::PathBuf;

use thiserror::Error;

use crate::payload::PayloadError;

/// All errors that can abort a reconciliation run.
///
/// Record-level problems (unknown author, empty candidate pool, unparseable
/// payload outside strict mode) never surface here: they become flagged rows.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to read dataset {path}: {source}")]
    Dataset {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate work id in catalog: {0}")]
    DuplicateWorkId(String),

    #[error("Malformed author payload for {author:?}: {source}")]
    MalformedPayload {
        author: String,
        #[source]
        source: PayloadError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
