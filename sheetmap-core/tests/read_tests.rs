use rust_xlsxwriter::{ExcelDateTime, Format, Workbook as XlsxWorkbook};
use sheetmap_core::{
    DateFormatRegistry, ERROR_PATTERN, SheetMapConfig, SheetMapError, WorkbookReader,
    read_workbook, read_workbook_file,
};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// Helper to build a typed XLSX fixture the way a spreadsheet application would store it
fn create_typed_xlsx() -> anyhow::Result<Vec<u8>> {
    let mut workbook = XlsxWorkbook::new();
    let iso_date = Format::new().set_num_format("yyyy-mm-dd");
    let dotted_date = Format::new().set_num_format("dd.mm.yyyy");
    let date = ExcelDateTime::from_ymd(2023, 8, 1)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Typed")?;
    sheet.write_number(0, 0, 3.140000)?;
    sheet.write_boolean(0, 1, true)?;
    sheet.write_string(0, 2, "  padded  ")?;
    sheet.write_datetime_with_format(1, 0, &date, &iso_date)?;
    sheet.write_datetime_with_format(1, 1, &date, &dotted_date)?;
    sheet.write_formula(2, 0, "=1+1")?;
    sheet.write_number(2, 1, 42.0)?;

    let second = workbook.add_worksheet();
    second.set_name("Second")?;
    second.write_string(0, 0, "only")?;

    Ok(workbook.save_to_buffer()?)
}

// Zip the given parts in order, the first one stored uncompressed
fn create_container(parts: &[(&str, &str)]) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, (name, content)) in parts.iter().enumerate() {
        let options = if index == 0 {
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
        };
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

// Minimal XLSX whose cells carry no `r` references, as some producers write them
fn create_unreferenced_xlsx() -> anyhow::Result<Vec<u8>> {
    create_container(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Plain" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
        ),
        (
            "xl/styles.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
<cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="164" applyNumberFormat="1"/></cellXfs>
</styleSheet>"#,
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row><c s="1"><v>45139</v></c><c><v>7</v></c></row>
<row><c><v>8</v></c><c s="1"><v>45140</v></c></row>
</sheetData>
</worksheet>"#,
        ),
    ])
}

// Minimal ODS with a long ISO date style and a short day.month style
fn create_dated_ods() -> anyhow::Result<Vec<u8>> {
    create_container(&[
        ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
        (
            "META-INF/manifest.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2">
<manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
<manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>"#,
        ),
        (
            "content.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:number="urn:oasis:names:tc:opendocument:xmlns:datastyle:1.0" office:version="1.2">
<office:automatic-styles>
<number:date-style style:name="N37"><number:year number:style="long"/><number:text>-</number:text><number:month number:style="long"/><number:text>-</number:text><number:day number:style="long"/></number:date-style>
<number:date-style style:name="N38"><number:day number:style="long"/><number:text>.</number:text><number:month number:style="long"/><number:text>.</number:text><number:year number:style="long"/></number:date-style>
<style:style style:name="ce1" style:family="table-cell" style:data-style-name="N37"/>
<style:style style:name="ce2" style:family="table-cell" style:data-style-name="N38"/>
</office:automatic-styles>
<office:body><office:spreadsheet>
<table:table table:name="Dated">
<table:table-row>
<table:table-cell table:style-name="ce1" office:value-type="date" office:date-value="2023-08-01"><text:p>2023-08-01</text:p></table:table-cell>
<table:table-cell table:style-name="ce2" office:value-type="date" office:date-value="2023-08-01"><text:p>01.08.2023</text:p></table:table-cell>
<table:table-cell office:value-type="string"><text:p>label</text:p></table:table-cell>
</table:table-row>
</table:table>
</office:spreadsheet></office:body>
</office:document-content>"#,
        ),
    ])
}

#[test]
fn test_read_typed_cells() -> anyhow::Result<()> {
    let bytes = create_typed_xlsx()?;
    let workbook = read_workbook(Cursor::new(bytes))?;

    assert_eq!(workbook.sheets.len(), 2);
    let sheet = workbook.get_sheet("Typed").expect("Typed sheet");

    assert_eq!(sheet.rows.len(), 3);
    assert!(sheet.rows.iter().all(|r| r.cells.len() == 3));

    assert_eq!(
        sheet.rows[0].values(),
        vec![Some("3.14"), Some("true"), Some("padded")]
    );
    assert_eq!(
        sheet.rows[1].values(),
        vec![Some("2023-08-01"), Some(ERROR_PATTERN), None]
    );
    // Formula cells read as absent whatever their cached result
    assert_eq!(sheet.rows[2].values(), vec![None, Some("42"), None]);

    let second = &workbook.sheets[1];
    assert_eq!(second.name.as_deref(), Some("Second"));
    assert_eq!(second.rows.len(), 1);
    assert_eq!(second.rows[0].values(), vec![Some("only")]);

    Ok(())
}

#[test]
fn test_configured_format_renders_date() -> anyhow::Result<()> {
    let config = SheetMapConfig::from_toml_str(
        r#"
        [date_formats]
        "dd.mm.yyyy" = "%d.%m.%Y"
        "#,
    )?;
    let registry = DateFormatRegistry::from_config(&config)?;

    let bytes = create_typed_xlsx()?;
    let workbook = WorkbookReader::new(&registry).read(Cursor::new(bytes))?;

    assert_eq!(workbook.sheets[0].rows[1].values()[1], Some("01.08.2023"));
    Ok(())
}

#[test]
fn test_empty_registry_marks_every_date() -> anyhow::Result<()> {
    let registry = DateFormatRegistry::empty();
    let bytes = create_typed_xlsx()?;
    let workbook = WorkbookReader::new(&registry).read(Cursor::new(bytes))?;

    let dates = &workbook.sheets[0].rows[1];
    assert_eq!(dates.values()[0], Some(ERROR_PATTERN));
    assert_eq!(dates.values()[1], Some(ERROR_PATTERN));
    Ok(())
}

#[test]
fn test_read_from_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("typed.xlsx");
    std::fs::write(&path, create_typed_xlsx()?)?;

    let workbook = read_workbook_file(&path)?;
    assert_eq!(workbook.sheets.len(), 2);
    Ok(())
}

#[test]
fn test_zero_byte_file_has_no_sheets() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.xlsx");
    std::fs::write(&path, b"")?;

    let workbook = read_workbook_file(&path)?;
    assert!(workbook.sheets.is_empty());
    Ok(())
}

#[test]
fn test_truncated_container_is_read_error() -> anyhow::Result<()> {
    let bytes = create_typed_xlsx()?;
    let truncated = &bytes[..bytes.len() / 2];

    let result = read_workbook(Cursor::new(truncated));
    assert!(matches!(result, Err(SheetMapError::WorkbookRead { .. })));
    Ok(())
}

#[test]
fn test_cells_without_references_keep_native_format() -> anyhow::Result<()> {
    let workbook = read_workbook(Cursor::new(create_unreferenced_xlsx()?))?;

    let sheet = workbook.get_sheet("Plain").expect("Plain sheet");
    assert_eq!(sheet.rows[0].values(), vec![Some("2023-08-01"), Some("7")]);
    assert_eq!(sheet.rows[1].values(), vec![Some("8"), Some("2023-08-02")]);
    Ok(())
}

#[test]
fn test_ods_dates_use_native_format() -> anyhow::Result<()> {
    let bytes = create_dated_ods()?;
    let workbook = read_workbook(Cursor::new(bytes.clone()))?;

    let sheet = workbook.get_sheet("Dated").expect("Dated sheet");
    // The dotted pattern is not registered by default
    assert_eq!(
        sheet.rows[0].values(),
        vec![Some("2023-08-01"), Some(ERROR_PATTERN), Some("label")]
    );

    let config = SheetMapConfig::from_toml_str(
        r#"
        [date_formats]
        "dd.mm.yyyy" = "%d.%m.%Y"
        "#,
    )?;
    let registry = DateFormatRegistry::from_config(&config)?;
    let workbook = WorkbookReader::new(&registry).read(Cursor::new(bytes))?;
    assert_eq!(workbook.sheets[0].rows[0].values()[1], Some("01.08.2023"));
    Ok(())
}
