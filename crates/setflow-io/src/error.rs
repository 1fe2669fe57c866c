//! IO errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A field could not be converted to its column type.
    #[error("line {line}, column '{column}': {msg}")]
    Parse {
        line: u64,
        column: String,
        msg: String,
    },

    #[error("schema: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, IoError>;
