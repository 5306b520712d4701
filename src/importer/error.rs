// ==========================================
// Delivery Window Planner - import error types
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== file =====
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0} (only .csv is accepted)")]
    UnsupportedFormat(String),

    #[error("File read failed: {0}")]
    FileReadError(String),

    #[error("CSV parse failed: {0}")]
    CsvParseError(String),

    // ===== column scheme =====
    #[error("Unknown column scheme: CSV must contain either 'externalOrderId' or 'orderID'")]
    UnknownScheme,

    #[error("CSV missing required columns for {scheme} scheme: {columns}")]
    MissingColumns { scheme: String, columns: String },

    // ===== row mapping =====
    #[error("Type conversion failed (row {row}, field {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    #[error("Window format invalid (row {row}, field {field}): expected 'HH:MM AM' style times, got '{value}'")]
    WindowFormatError {
        row: usize,
        field: String,
        value: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
