//! Workbook data structures
//!
//! The model is format agnostic: every cell value is an optional string and comments are
//! plain text bound to a cell by position.

use crate::error::{Result, SheetMapError};
use serde::{Deserialize, Serialize};

/// Represents a complete workbook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet, returning its index
    pub fn add_sheet(&mut self, sheet: Sheet) -> usize {
        self.sheets.push(sheet);
        self.sheets.len() - 1
    }

    /// Get a sheet by name
    pub fn get_sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name.as_deref() == Some(name))
    }

    /// Whether any cell of any sheet carries a comment
    pub fn has_comments(&self) -> bool {
        self.sheets.iter().any(Sheet::has_comments)
    }

    pub fn cell(&self, sheet: usize, row: usize, col: usize) -> Option<&Cell> {
        self.sheets.get(sheet)?.rows.get(row)?.cells.get(col)
    }

    pub fn cell_mut(&mut self, sheet: usize, row: usize, col: usize) -> Option<&mut Cell> {
        self.sheets
            .get_mut(sheet)?
            .rows
            .get_mut(row)?
            .cells
            .get_mut(col)
    }

    /// Attach a comment to an existing cell, replacing any previous one
    pub fn set_comment(
        &mut self,
        sheet: usize,
        row: usize,
        col: usize,
        text: impl Into<String>,
    ) -> Result<()> {
        let cell = self.cell_mut(sheet, row, col).ok_or_else(|| {
            SheetMapError::invalid_argument(format!(
                "no cell at sheet {} row {} column {}",
                sheet, row, col
            ))
        })?;
        cell.comment = Some(Comment::new(text));
        Ok(())
    }
}

/// Represents a worksheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    /// `None` lets the writer pick a default name
    pub name: Option<String>,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn has_comments(&self) -> bool {
        self.rows
            .iter()
            .any(|row| row.cells.iter().any(|c| c.comment.is_some()))
    }

    /// Widest row length
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

/// Represents a row of cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row of cells holding the given values
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            cells: values.into_iter().map(|v| Cell::new(v.map(Into::into))).collect(),
        }
    }

    pub fn add_cell(&mut self, cell: Cell) -> usize {
        self.cells.push(cell);
        self.cells.len() - 1
    }

    /// Cell values in order
    pub fn values(&self) -> Vec<Option<&str>> {
        self.cells.iter().map(|c| c.value.as_deref()).collect()
    }
}

/// Represents a single cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// `None` covers both blank and unreadable source cells
    pub value: Option<String>,
    pub comment: Option<Comment>,
}

impl Cell {
    pub fn new(value: Option<String>) -> Self {
        Self {
            value,
            comment: None,
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self::new(Some(value.into()))
    }

    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(Comment::new(text));
        self
    }
}

/// Plain text annotation on a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
