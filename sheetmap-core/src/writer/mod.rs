//! XLSX writer for the string-valued model
//!
//! Every model value is written as a text cell. An absent value becomes a blank cell with
//! the text number format, which the container keeps so the grid shape survives a re-read.
//! Workbooks without comments are written with the streaming strategy; a single comment
//! anywhere switches the whole write to the in-memory strategy.

use crate::config::SheetMapConfig;
use crate::error::{Result, SheetMapError};
use crate::workbook::{Row, Sheet, Workbook};
use rust_xlsxwriter::{Format, Note, Worksheet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub mod strategy;

use self::strategy::{InMemoryStrategy, StrategyKind, StreamingStrategy, WriteStrategy};

/// Row limit of an XLSX worksheet
pub const MAX_ROWS: usize = 1_048_576;
/// Column limit of an XLSX worksheet
pub const MAX_COLS: usize = 16_384;

/// Writes the model to XLSX
#[derive(Debug, Clone, Default)]
pub struct WorkbookWriter {
    spill_dir: Option<PathBuf>,
    comment_author: Option<String>,
}

impl WorkbookWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SheetMapConfig) -> Self {
        Self {
            spill_dir: config.write.spill_dir.clone(),
            comment_author: config.write.comment_author.clone(),
        }
    }

    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    pub fn with_comment_author(mut self, author: impl Into<String>) -> Self {
        self.comment_author = Some(author.into());
        self
    }

    /// Write `workbook` as XLSX to `sink`.
    ///
    /// An absent workbook or one exceeding the worksheet limits fails with
    /// [`SheetMapError::InvalidArgument`] before anything touches the sink.
    /// The sink is not closed.
    pub fn write<W: Write>(&self, workbook: Option<&Workbook>, sink: &mut W) -> Result<()> {
        let workbook =
            workbook.ok_or_else(|| SheetMapError::invalid_argument("workbook is absent"))?;
        check_dimensions(workbook)?;

        let mut strategy = self.strategy_for(workbook)?;
        log::debug!(
            "Writing {} sheet(s) with the {} strategy",
            workbook.sheets.len(),
            strategy.kind()
        );

        for sheet in &workbook.sheets {
            self.write_sheet(strategy.as_mut(), sheet)?;
        }

        strategy.finish(sink).inspect_err(|e| {
            log::error!("{}", e);
        })
    }

    fn strategy_for(&self, workbook: &Workbook) -> Result<Box<dyn WriteStrategy>> {
        Ok(match select_strategy(workbook) {
            StrategyKind::InMemory => Box::new(InMemoryStrategy::new()),
            StrategyKind::Streaming => {
                Box::new(StreamingStrategy::new(self.spill_dir.as_deref())?)
            }
        })
    }

    fn write_sheet(&self, strategy: &mut dyn WriteStrategy, sheet: &Sheet) -> Result<()> {
        strategy.create_sheet(sheet.name.as_deref())?;

        let blank = Format::new().set_num_format("@");
        let mut next_row: u32 = 0;
        for row in &sheet.rows {
            write_row(strategy.current_sheet()?, next_row, row, &blank)?;
            next_row += 1;
        }

        if sheet.has_comments() {
            let worksheet = strategy.current_sheet()?;
            for (row_index, row) in (0u32..).zip(&sheet.rows) {
                for (col_index, cell) in (0u16..).zip(&row.cells) {
                    if let Some(comment) = &cell.comment {
                        worksheet.insert_note(row_index, col_index, &self.note(&comment.text))?;
                    }
                }
            }
        }

        Ok(())
    }

    fn note(&self, text: &str) -> Note {
        // Comment text is stored verbatim, without the author prefix line
        let note = Note::new(text).add_author_prefix(false);
        match &self.comment_author {
            Some(author) => note.set_author(author),
            None => note,
        }
    }

    /// Write to a file path, creating or truncating it
    pub fn write_file<P: AsRef<Path>>(&self, workbook: &Workbook, path: P) -> Result<()> {
        let path = path.as_ref();
        // Validate before creating the file so a rejected workbook leaves no trace
        check_dimensions(workbook)?;
        let file = File::create(path).map_err(SheetMapError::write)?;
        let mut sink = BufWriter::new(file);
        self.write(Some(workbook), &mut sink)?;
        log::debug!("Saved workbook {}", path.display());
        Ok(())
    }
}

/// Strategy a workbook would be written with
pub fn select_strategy(workbook: &Workbook) -> StrategyKind {
    if workbook.has_comments() {
        StrategyKind::InMemory
    } else {
        StrategyKind::Streaming
    }
}

/// Write a workbook with default settings
pub fn write_workbook<W: Write>(workbook: &Workbook, sink: &mut W) -> Result<()> {
    WorkbookWriter::new().write(Some(workbook), sink)
}

/// Write a workbook to a file path with default settings
pub fn write_workbook_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> Result<()> {
    WorkbookWriter::new().write_file(workbook, path)
}

fn write_row(worksheet: &mut Worksheet, row_index: u32, row: &Row, blank: &Format) -> Result<()> {
    for (col_index, cell) in (0u16..).zip(&row.cells) {
        // An empty string cell would be dropped by the codec
        match cell.value.as_deref() {
            Some(value) if !value.is_empty() => {
                worksheet.write_string(row_index, col_index, value)?;
            }
            _ => {
                worksheet.write_blank(row_index, col_index, blank)?;
            }
        }
    }
    Ok(())
}

fn check_dimensions(workbook: &Workbook) -> Result<()> {
    for (index, sheet) in workbook.sheets.iter().enumerate() {
        let label = sheet
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1));

        if sheet.rows.len() > MAX_ROWS {
            return Err(SheetMapError::invalid_argument(format!(
                "sheet {} has {} rows, the limit is {}",
                label,
                sheet.rows.len(),
                MAX_ROWS
            )));
        }
        let cols = sheet.column_count();
        if cols > MAX_COLS {
            return Err(SheetMapError::invalid_argument(format!(
                "sheet {} has {} columns, the limit is {}",
                label, cols, MAX_COLS
            )));
        }
    }
    Ok(())
}
