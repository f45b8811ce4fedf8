use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("import file not found: {0}")]
    ImportNotFound(PathBuf),

    #[error("unsupported import format (expected .parquet or .csv): {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no results for query")]
    NoResults,

    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("document not found in stage: {0}")]
    BlobNotFound(PathBuf),

    #[error("invalid document file name: {0:?}")]
    InvalidFileName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}
