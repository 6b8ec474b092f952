//! Error types for sheetmap-core

use thiserror::Error;

/// Boxed cause carried by read/write failures
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`SheetMapError`]
pub type Result<T> = std::result::Result<T, SheetMapError>;

/// Errors surfaced by the read and write engines
#[derive(Debug, Error)]
pub enum SheetMapError {
    /// Caller broke an input contract (absent workbook, out-of-range coordinate, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The source container could not be parsed
    #[error("Failed to read workbook: {source}")]
    WorkbookRead {
        #[source]
        source: BoxedCause,
    },

    /// The output container could not be assembled or flushed
    #[error("Failed to write workbook: {source}")]
    WorkbookWrite {
        #[source]
        source: BoxedCause,
    },

    /// Invalid configuration or registry entry
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SheetMapError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        SheetMapError::InvalidArgument(msg.into())
    }

    pub fn read<E: Into<BoxedCause>>(cause: E) -> Self {
        SheetMapError::WorkbookRead {
            source: cause.into(),
        }
    }

    pub fn write<E: Into<BoxedCause>>(cause: E) -> Self {
        SheetMapError::WorkbookWrite {
            source: cause.into(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for SheetMapError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        SheetMapError::write(err)
    }
}
