//! Excel/ODS file reader using calamine
//!
//! Produces a [`Workbook`] whose rows are padded to a common width per sheet and whose
//! cell values are coerced to strings (see [`coerce`]).
//!
//! Native date formats are recovered from XLSX styles and ODS date styles. Legacy XLS
//! containers expose none, so their date cells read as [`crate::ERROR_PATTERN`].

use crate::date_format::DateFormatRegistry;
use crate::error::{Result, SheetMapError};
use crate::workbook::{Cell, Comment, Row, Sheet, Workbook};
use calamine::{CellType, Data, Range, Reader, SheetType, Sheets, open_workbook_auto_from_rs};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

pub mod coerce;
pub mod ods_parser;
pub mod parser_utils;
pub mod xml_parser;

use self::coerce::SourceCell;

/// Reads spreadsheet sources into the string-valued model
#[derive(Debug, Clone, Copy)]
pub struct WorkbookReader<'a> {
    registry: &'a DateFormatRegistry,
}

impl Default for WorkbookReader<'static> {
    fn default() -> Self {
        Self::new(DateFormatRegistry::shared())
    }
}

impl<'a> WorkbookReader<'a> {
    pub fn new(registry: &'a DateFormatRegistry) -> Self {
        Self { registry }
    }

    /// Read a whole source. An empty source yields a workbook with no sheets.
    pub fn read<R: Read>(&self, mut source: R) -> Result<Workbook> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).map_err(|e| {
            log::error!("Failed to read workbook source: {}", e);
            SheetMapError::read(e)
        })?;

        if bytes.is_empty() {
            log::debug!("Empty source, returning a workbook with no sheets");
            return Ok(Workbook::new());
        }

        self.read_bytes(&bytes).inspect_err(|e| {
            log::error!("{}", e);
        })
    }

    fn read_bytes(&self, bytes: &[u8]) -> Result<Workbook> {
        let mut excel =
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(SheetMapError::read)?;

        let metadata = ContainerMetadata::load(ContainerKind::of(&excel), Cursor::new(bytes))?;

        let result = self.read_sheets(&mut excel, &metadata);

        // Release the codec before handing the result back, on success and failure alike
        drop(excel);
        log::debug!("Released workbook source");

        result
    }

    fn read_sheets<RS: Read + Seek>(
        &self,
        excel: &mut Sheets<RS>,
        metadata: &ContainerMetadata,
    ) -> Result<Workbook> {
        let mut workbook = Workbook::new();
        let sheets_metadata = excel.sheets_metadata().to_vec();

        for (index, sheet_meta) in sheets_metadata.iter().enumerate() {
            if sheet_meta.typ != SheetType::WorkSheet {
                log::debug!("Skipping non-worksheet '{}'", sheet_meta.name);
                continue;
            }

            let values = excel
                .worksheet_range(&sheet_meta.name)
                .map_err(SheetMapError::read)?;

            let formulas = match excel.worksheet_formula(&sheet_meta.name) {
                Ok(range) => Some(range),
                Err(e) => {
                    log::debug!("No formulas for sheet '{}': {}", sheet_meta.name, e);
                    None
                }
            };

            let sheet_metadata = metadata.sheets.get(index);
            let sheet = self.build_sheet(
                &sheet_meta.name,
                &values,
                formulas.as_ref(),
                sheet_metadata.map_or((0, 0), |m| m.extent),
                |row, col| sheet_metadata.and_then(|m| metadata.native_format(m, row, col)),
            );
            let sheet_index = workbook.add_sheet(sheet);

            if let Some(sheet_metadata) = sheet_metadata {
                attach_comments(&mut workbook.sheets[sheet_index], &sheet_metadata.comments);
            }
        }

        log::debug!("Read workbook with {} sheet(s)", workbook.sheets.len());
        Ok(workbook)
    }

    fn build_sheet<'f>(
        &self,
        name: &str,
        values: &Range<Data>,
        formulas: Option<&Range<String>>,
        container_extent: (u32, u32),
        native_format: impl Fn(u32, u32) -> Option<&'f str>,
    ) -> Sheet {
        let mut sheet = if name.trim().is_empty() {
            Sheet::new()
        } else {
            Sheet::named(name)
        };

        // Valueless cells the codec skips still count towards the extent
        let (value_rows, value_cols) = sheet_extent(values, formulas);
        let row_count = value_rows.max(container_extent.0);
        let col_count = value_cols.max(container_extent.1);

        for row in 0..row_count {
            let mut model_row = Row::new();
            for col in 0..col_count {
                let is_formula = formulas
                    .and_then(|f| f.get_value((row, col)))
                    .is_some_and(|f| !f.is_empty());
                let source = SourceCell::from_data(
                    values.get_value((row, col)),
                    is_formula,
                    native_format(row, col),
                );
                model_row.add_cell(Cell::new(source.coerce(self.registry)));
            }
            sheet.add_row(model_row);
        }

        sheet
    }
}

/// Read a workbook with the process-wide date format registry
pub fn read_workbook<R: Read>(source: R) -> Result<Workbook> {
    WorkbookReader::default().read(source)
}

/// Read a workbook from a file path
pub fn read_workbook_file<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    let file = File::open(path).map_err(SheetMapError::read)?;
    log::debug!("Reading workbook {}", path.display());
    read_workbook(file)
}

/// Number of rows and the common row width of a sheet: the largest
/// last-cell-index + 1 over every row holding a value or a formula
fn sheet_extent(values: &Range<Data>, formulas: Option<&Range<String>>) -> (u32, u32) {
    let (value_rows, value_cols) = used_extent(values);
    let (formula_rows, formula_cols) = formulas.map(used_extent).unwrap_or((0, 0));
    (value_rows.max(formula_rows), value_cols.max(formula_cols))
}

fn used_extent<T: CellType>(range: &Range<T>) -> (u32, u32) {
    let Some((start_row, start_col)) = range.start() else {
        return (0, 0);
    };
    range
        .used_cells()
        .fold((0, 0), |(rows, cols), (row, col, _)| {
            (
                rows.max(start_row + row as u32 + 1),
                cols.max(start_col + col as u32 + 1),
            )
        })
}

fn attach_comments(sheet: &mut Sheet, comments: &[((u32, u32), String)]) {
    for ((row, col), text) in comments {
        let cell = sheet
            .rows
            .get_mut(*row as usize)
            .and_then(|r| r.cells.get_mut(*col as usize));
        match cell {
            Some(cell) => cell.comment = Some(Comment::new(text.clone())),
            None => log::debug!(
                "Dropping comment at {} outside the data area",
                parser_utils::to_cell_ref(*row, *col)
            ),
        }
    }
}

/// Container kinds whose metadata can be read beside calamine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Xlsx,
    Ods,
    /// XLS and XLSB: no native format strings are recovered
    Other,
}

impl ContainerKind {
    fn of<RS: Read + Seek>(sheets: &Sheets<RS>) -> Self {
        match sheets {
            Sheets::Xlsx(_) => ContainerKind::Xlsx,
            Sheets::Ods(_) => ContainerKind::Ods,
            _ => ContainerKind::Other,
        }
    }
}

/// Metadata read straight from the container
#[derive(Debug, Default)]
struct ContainerMetadata {
    /// Distinct native number format codes
    formats: Vec<String>,
    /// Per worksheet, in workbook order
    sheets: Vec<SheetMetadata>,
}

#[derive(Debug, Default)]
struct SheetMetadata {
    /// (row, col) -> index into `formats`
    styles: HashMap<(u32, u32), usize>,
    /// Rows and columns spanned by every stored cell, valueless ones included
    extent: (u32, u32),
    comments: Vec<((u32, u32), String)>,
}

impl ContainerMetadata {
    fn load<RS: Read + Seek>(kind: ContainerKind, source: RS) -> Result<Self> {
        match kind {
            ContainerKind::Xlsx => Self::load_xlsx(source),
            ContainerKind::Ods => Self::load_ods(source),
            ContainerKind::Other => {
                log::debug!("Container exposes no native number formats");
                Ok(Self::default())
            }
        }
    }

    fn load_xlsx<RS: Read + Seek>(source: RS) -> Result<Self> {
        let mut archive = ZipArchive::new(source).map_err(SheetMapError::read)?;
        let formats = xml_parser::parse_styles(&mut archive).map_err(SheetMapError::read)?;

        let mut sheets = Vec::new();
        for path in xml_parser::extract_sheet_paths(&mut archive).map_err(SheetMapError::read)? {
            let scan =
                xml_parser::scan_sheet_cells(&mut archive, &path).map_err(SheetMapError::read)?;
            let comments =
                xml_parser::extract_comments(&mut archive, &path).map_err(SheetMapError::read)?;
            sheets.push(SheetMetadata {
                styles: scan.styles,
                extent: scan.extent,
                comments,
            });
        }

        Ok(Self { formats, sheets })
    }

    fn load_ods<RS: Read + Seek>(source: RS) -> Result<Self> {
        let mut archive = ZipArchive::new(source).map_err(SheetMapError::read)?;
        let found =
            ods_parser::extract_date_formats(&mut archive).map_err(SheetMapError::read)?;

        let sheets = found
            .sheets
            .into_iter()
            .map(|styles| SheetMetadata {
                styles,
                ..SheetMetadata::default()
            })
            .collect();

        Ok(Self {
            formats: found.formats,
            sheets,
        })
    }

    fn native_format<'m>(&'m self, sheet: &SheetMetadata, row: u32, col: u32) -> Option<&'m str> {
        sheet
            .styles
            .get(&(row, col))
            .and_then(|index| self.formats.get(*index))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_yields_empty_workbook() {
        let workbook = read_workbook(std::io::empty()).unwrap();
        assert!(workbook.sheets.is_empty());
    }

    #[test]
    fn test_garbage_source_is_read_error() {
        let result = read_workbook(&b"definitely not a spreadsheet"[..]);
        assert!(matches!(result, Err(SheetMapError::WorkbookRead { .. })));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = read_workbook_file("/nonexistent/input.xlsx");
        assert!(matches!(result, Err(SheetMapError::WorkbookRead { .. })));
    }

    #[test]
    fn test_sheet_extent_is_widest_row() {
        let mut values: Range<Data> = Range::new((0, 0), (3, 4));
        values.set_value((0, 0), Data::String("a".to_string()));
        values.set_value((1, 4), Data::Float(1.0));
        values.set_value((2, 1), Data::Bool(true));

        assert_eq!(sheet_extent(&values, None), (3, 5));

        let mut formulas: Range<String> = Range::new((0, 0), (5, 2));
        formulas.set_value((5, 2), "SUM(A1:A2)".to_string());
        assert_eq!(sheet_extent(&values, Some(&formulas)), (6, 5));
    }

    #[test]
    fn test_build_sheet_pads_ragged_rows() {
        let mut values: Range<Data> = Range::new((0, 0), (1, 2));
        values.set_value((0, 0), Data::String(" name ".to_string()));
        values.set_value((0, 2), Data::Float(3.14));
        values.set_value((1, 0), Data::Bool(false));

        let reader = WorkbookReader::default();
        let sheet = reader.build_sheet("  ", &values, None, (0, 0), |_, _| None);

        assert_eq!(sheet.name, None);
        assert_eq!(sheet.rows.len(), 2);
        assert!(sheet.rows.iter().all(|r| r.cells.len() == 3));
        assert_eq!(sheet.rows[0].values(), vec![Some("name"), None, Some("3.14")]);
        assert_eq!(sheet.rows[1].values(), vec![Some("false"), None, None]);
    }

    #[test]
    fn test_container_extent_keeps_valueless_cells() {
        let mut values: Range<Data> = Range::new((0, 0), (0, 0));
        values.set_value((0, 0), Data::String("a".to_string()));

        let reader = WorkbookReader::default();
        let sheet = reader.build_sheet("S", &values, None, (2, 3), |_, _| None);

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].values(), vec![Some("a"), None, None]);
        assert_eq!(sheet.rows[1].values(), vec![None, None, None]);
    }

    #[test]
    fn test_dates_without_native_format_are_unsupported() {
        let mut values: Range<Data> = Range::new((0, 0), (0, 1));
        values.set_value((0, 0), Data::DateTimeIso("2023-08-01".to_string()));
        values.set_value((0, 1), Data::DateTimeIso("2023-08-01".to_string()));

        // Legacy containers bind no native format to any cell
        let metadata = ContainerMetadata::load(ContainerKind::Other, Cursor::new(&b""[..])).unwrap();
        assert!(metadata.sheets.is_empty());

        let reader = WorkbookReader::default();
        let sheet = reader.build_sheet("S", &values, None, (0, 0), |_, col| {
            (col == 1).then_some("yyyy-mm-dd")
        });
        assert_eq!(
            sheet.rows[0].values(),
            vec![Some(crate::ERROR_PATTERN), Some("2023-08-01")]
        );
    }

    #[test]
    fn test_attach_comments_inside_grid_only() {
        let mut sheet = Sheet::named("S");
        sheet.add_row(Row::from_values([Some("a"), Some("b")]));

        attach_comments(
            &mut sheet,
            &[((0, 1), "kept".to_string()), ((4, 4), "dropped".to_string())],
        );

        assert_eq!(
            sheet.rows[0].cells[1].comment,
            Some(Comment::new("kept"))
        );
        assert!(sheet.rows[0].cells[0].comment.is_none());
    }
}
