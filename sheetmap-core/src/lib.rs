//! Conversion between spreadsheet files and a string-valued workbook model
//!
//! Reading accepts XLSX, XLS and ODS sources and turns every cell into an optional string:
//! text is trimmed, numbers use their shortest round-trip form, booleans become
//! `true`/`false`, and dates are rendered through a [`DateFormatRegistry`] keyed by the
//! cell's native number format. Native formats come from XLSX and ODS containers only, so
//! XLS date cells read as [`ERROR_PATTERN`]. Writing produces XLSX with every value as text
//! and comments as cell notes.

pub mod config;
pub mod date_format;
pub mod error;
pub mod reader;
pub mod validation;
pub mod workbook;
pub mod writer;

pub use config::{SheetMapConfig, WriteConfig};
pub use date_format::{DateFormatRegistry, ERROR_PATTERN};
pub use error::{Result, SheetMapError};
pub use reader::{WorkbookReader, read_workbook, read_workbook_file};
pub use validation::{
    CellReference, Failure, UnsupportedDateFormatValidator, Validation, ValidationOutcome,
    WorkbookValidator,
};
pub use workbook::{Cell, Comment, Row, Sheet, Workbook};
pub use writer::strategy::StrategyKind;
pub use writer::{WorkbookWriter, select_strategy, write_workbook, write_workbook_file};
