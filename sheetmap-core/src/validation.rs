//! Validation of read workbooks
//!
//! Validators inspect the model and report failures by cell. A validation run either passes
//! or returns its failures, which can be written back onto the model as cell comments so the
//! annotated workbook can be handed back to whoever supplied it.

use crate::date_format::ERROR_PATTERN;
use crate::error::Result;
use crate::reader::parser_utils::to_cell_ref;
use crate::workbook::Workbook;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Position of a cell inside a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellReference {
    pub sheet: usize,
    pub row: u32,
    pub col: u32,
}

impl CellReference {
    pub fn new(sheet: usize, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }

    /// Excel-style reference within the sheet (e.g., "B3")
    pub fn to_excel_ref(&self) -> String {
        to_cell_ref(self.row, self.col)
    }
}

impl PartialOrd for CellReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sheet
            .cmp(&other.sheet)
            .then_with(|| self.row.cmp(&other.row))
            .then_with(|| self.col.cmp(&other.col))
    }
}

impl std::fmt::Display for CellReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sheet {} {}", self.sheet + 1, self.to_excel_ref())
    }
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Validator ID (e.g., "DATE001")
    pub validator_id: String,
    pub cell: CellReference,
    pub message: String,
}

impl Failure {
    pub fn new(
        validator_id: impl Into<String>,
        cell: CellReference,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validator_id: validator_id.into(),
            cell,
            message: message.into(),
        }
    }
}

impl PartialOrd for Failure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Failure {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cell
            .cmp(&other.cell)
            .then_with(|| self.validator_id.cmp(&other.validator_id))
            .then_with(|| self.message.cmp(&other.message))
    }
}

/// A check over a whole workbook
pub trait WorkbookValidator {
    fn id(&self) -> &'static str;

    fn validate(&self, workbook: &Workbook) -> Vec<Failure>;
}

/// Flags cells whose date could not be rendered with a known format
pub struct UnsupportedDateFormatValidator;

impl WorkbookValidator for UnsupportedDateFormatValidator {
    fn id(&self) -> &'static str {
        "DATE001"
    }

    fn validate(&self, workbook: &Workbook) -> Vec<Failure> {
        let mut failures = Vec::new();
        for (sheet_index, sheet) in workbook.sheets.iter().enumerate() {
            for (row_index, row) in (0u32..).zip(&sheet.rows) {
                for (col_index, cell) in (0u32..).zip(&row.cells) {
                    if cell.value.as_deref() == Some(ERROR_PATTERN) {
                        failures.push(Failure::new(
                            self.id(),
                            CellReference::new(sheet_index, row_index, col_index),
                            "Date format is not supported, use a format such as yyyy-mm-dd",
                        ));
                    }
                }
            }
        }
        failures
    }
}

/// Outcome of a validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Passed,
    Failed(Vec<Failure>),
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    pub fn failures(&self) -> &[Failure] {
        match self {
            ValidationOutcome::Passed => &[],
            ValidationOutcome::Failed(failures) => failures,
        }
    }
}

/// A set of validators run together
pub struct Validation {
    validators: Vec<Box<dyn WorkbookValidator>>,
}

impl Default for Validation {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Validation {
    pub fn new(validators: Vec<Box<dyn WorkbookValidator>>) -> Self {
        Self { validators }
    }

    /// Every built-in validator
    pub fn builtin() -> Self {
        Self::new(vec![Box::new(UnsupportedDateFormatValidator)])
    }

    /// Run every validator; failures come back sorted by cell
    pub fn run(&self, workbook: &Workbook) -> ValidationOutcome {
        let mut failures: Vec<Failure> = self
            .validators
            .iter()
            .flat_map(|validator| {
                let found = validator.validate(workbook);
                log::debug!("{} reported {} failure(s)", validator.id(), found.len());
                found
            })
            .collect();

        if failures.is_empty() {
            ValidationOutcome::Passed
        } else {
            failures.sort();
            ValidationOutcome::Failed(failures)
        }
    }

    /// Write failure messages onto their cells as comments. Several messages for one cell
    /// are joined by newlines and replace any comment already there.
    pub fn annotate(workbook: &mut Workbook, failures: &[Failure]) -> Result<()> {
        let mut by_cell: BTreeMap<CellReference, Vec<&str>> = BTreeMap::new();
        for failure in failures {
            by_cell
                .entry(failure.cell)
                .or_default()
                .push(failure.message.as_str());
        }

        for (cell, messages) in by_cell {
            workbook.set_comment(
                cell.sheet,
                cell.row as usize,
                cell.col as usize,
                messages.join("\n"),
            )?;
        }
        Ok(())
    }
}
