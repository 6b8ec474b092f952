//! Worksheet allocation strategies for the write engine
//!
//! Both strategies assemble an XLSX container with rust_xlsxwriter. They differ in where
//! cell data lives before the container is saved: the streaming strategy spills each
//! finished row to temporary storage, the in-memory strategy keeps the whole grid
//! resident so drawing objects (comment notes) can be attached to any cell.

use crate::error::{Result, SheetMapError};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Which strategy a write runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Streaming,
    InMemory,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Streaming => write!(f, "streaming"),
            StrategyKind::InMemory => write!(f, "in-memory"),
        }
    }
}

/// Container under construction
pub trait WriteStrategy {
    fn kind(&self) -> StrategyKind;

    /// Create a sheet, which becomes the current sheet
    fn create_sheet(&mut self, name: Option<&str>) -> Result<()>;

    /// The most recently created sheet
    fn current_sheet(&mut self) -> Result<&mut Worksheet>;

    /// Serialize the container to `sink` and release any temporary storage.
    /// The sink is flushed but never closed.
    fn finish(self: Box<Self>, sink: &mut dyn Write) -> Result<()>;
}

/// rust_xlsxwriter workbook plus the bookkeeping needed to find the current sheet
struct Container {
    workbook: XlsxWorkbook,
    sheet_count: usize,
}

impl Container {
    fn new() -> Self {
        Self {
            workbook: XlsxWorkbook::new(),
            sheet_count: 0,
        }
    }

    fn add_sheet(&mut self, name: Option<&str>, constant_memory: bool) -> Result<()> {
        let worksheet = if constant_memory {
            self.workbook.add_worksheet_with_constant_memory()
        } else {
            self.workbook.add_worksheet()
        };
        if let Some(name) = name {
            worksheet.set_name(name)?;
        }
        self.sheet_count += 1;
        Ok(())
    }

    fn current(&mut self) -> Result<&mut Worksheet> {
        let index = self
            .sheet_count
            .checked_sub(1)
            .ok_or_else(|| SheetMapError::invalid_argument("no sheet has been created yet"))?;
        Ok(self.workbook.worksheet_from_index(index)?)
    }

    fn save(&mut self, sink: &mut dyn Write) -> Result<()> {
        let buffer = self.workbook.save_to_buffer()?;
        sink.write_all(&buffer).map_err(SheetMapError::write)?;
        sink.flush().map_err(SheetMapError::write)?;
        log::debug!("Wrote {} bytes ({} sheet(s))", buffer.len(), self.sheet_count);
        Ok(())
    }
}

/// Keeps every sheet resident until the container is saved
pub struct InMemoryStrategy {
    container: Container,
}

impl InMemoryStrategy {
    pub fn new() -> Self {
        Self {
            container: Container::new(),
        }
    }
}

impl Default for InMemoryStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteStrategy for InMemoryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InMemory
    }

    fn create_sheet(&mut self, name: Option<&str>) -> Result<()> {
        self.container.add_sheet(name, false)
    }

    fn current_sheet(&mut self) -> Result<&mut Worksheet> {
        self.container.current()
    }

    fn finish(mut self: Box<Self>, sink: &mut dyn Write) -> Result<()> {
        self.container.save(sink)
    }
}

/// Flushes finished rows to a private spill directory
pub struct StreamingStrategy {
    container: Container,
    // Removed on drop when the write fails before `finish`
    spill: TempDir,
}

impl StreamingStrategy {
    /// Create a strategy spilling under `parent`, or the system temp dir when unset
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sheetmap-spill-");
        let spill = match parent {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .map_err(SheetMapError::write)?;

        let mut container = Container::new();
        container.workbook.set_tempdir(spill.path())?;
        log::debug!("Spilling rows to {}", spill.path().display());

        Ok(Self { container, spill })
    }

    pub fn spill_path(&self) -> &Path {
        self.spill.path()
    }
}

impl WriteStrategy for StreamingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Streaming
    }

    fn create_sheet(&mut self, name: Option<&str>) -> Result<()> {
        self.container.add_sheet(name, true)
    }

    fn current_sheet(&mut self) -> Result<&mut Worksheet> {
        self.container.current()
    }

    fn finish(self: Box<Self>, sink: &mut dyn Write) -> Result<()> {
        let Self {
            mut container,
            spill,
        } = *self;

        let result = container.save(sink);
        drop(container);

        // A failed cleanup never turns a successful write into a failure
        let path = spill.path().to_path_buf();
        if let Err(e) = spill.close() {
            log::warn!("Failed to remove spill directory {}: {}", path.display(), e);
        }

        result
    }
}
