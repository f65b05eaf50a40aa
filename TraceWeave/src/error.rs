//! Error types for TraceWeave

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Alias table error: {0}")]
    AliasTable(String),

    #[error(
        "Merge conflict on {kind} {id}: trusted records disagree between {incoming} and {existing}"
    )]
    MergeConflict {
        kind: &'static str,
        id: i64,
        incoming: String,
        existing: String,
    },

    #[error("Inconsistent input in {path}: record has no \"id\" field and no known alias")]
    InconsistentInput { path: String },

    #[error("Invalid {kind} record in {path}: {reason}")]
    InvalidRecord {
        kind: &'static str,
        path: String,
        reason: String,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Text map must be loaded before exporting")]
    TextMapMissing,

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::InvalidPath(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
