//! XML parsing utilities for XLSX metadata calamine does not expose:
//! per-cell number format codes and cell comments.

use super::parser_utils::parse_cell_ref;
use anyhow::Result;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

/// Built-in number formats (ECMA-376 18.8.30) that imply dates or times
const BUILTIN_FORMATS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

/// Resolve the archive path of every worksheet, in workbook order
pub fn extract_sheet_paths(archive: &mut ZipArchive<impl Read + Seek>) -> Result<Vec<String>> {
    let mut targets: HashMap<String, String> = HashMap::new();
    if let Ok(rels) = archive.by_name("xl/_rels/workbook.xml.rels") {
        for (id, _, target) in parse_relationships(rels)? {
            targets.insert(id, resolve_target("xl", &target));
        }
    }

    let workbook_xml = match archive.by_name("xl/workbook.xml") {
        Ok(file) => file,
        Err(_) => return Ok(Vec::new()),
    };

    let mut reader = Reader::from_reader(BufReader::new(workbook_xml));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut paths = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                // Fall back to the conventional part name when the relationship is missing
                let index = paths.len();
                let path = attribute(&e, b"id")
                    .and_then(|id| targets.get(&id).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));
                paths.push(path);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(paths)
}

/// Number format code of every `cellXfs` entry, indexed by style index
pub fn parse_styles(archive: &mut ZipArchive<impl Read + Seek>) -> Result<Vec<String>> {
    let mut num_fmts: HashMap<u32, String> = BUILTIN_FORMATS
        .iter()
        .map(|(id, code)| (*id, code.to_string()))
        .collect();

    let styles_xml = match archive.by_name("xl/styles.xml") {
        Ok(file) => file,
        Err(_) => return Ok(Vec::new()),
    };

    let mut reader = Reader::from_reader(BufReader::new(styles_xml));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut xfs = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"numFmt" => {
                    let id = attribute(&e, b"numFmtId").and_then(|v| v.parse::<u32>().ok());
                    let code = attribute(&e, b"formatCode");
                    if let (Some(id), Some(code)) = (id, code) {
                        if !code.is_empty() {
                            num_fmts.insert(id, code);
                        }
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let num_fmt_id = attribute(&e, b"numFmtId")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(0);
                    // numFmt definitions precede cellXfs in styles.xml
                    let format_code = num_fmts
                        .get(&num_fmt_id)
                        .cloned()
                        .unwrap_or_else(|| "General".to_string());
                    xfs.push(format_code);
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"cellXfs" {
                    in_cell_xfs = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(xfs)
}

/// Cell positions of a worksheet part
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CellScan {
    /// Style index of every styled cell
    pub styles: HashMap<(u32, u32), usize>,
    /// Rows and columns spanned by `<c>` elements, valueless ones included
    pub extent: (u32, u32),
}

/// Scan every `<c>` of a worksheet. Cells and rows without an `r` attribute take the
/// position after their predecessor.
pub fn scan_sheet_cells(
    archive: &mut ZipArchive<impl Read + Seek>,
    sheet_path: &str,
) -> Result<CellScan> {
    let mut scan = CellScan::default();

    let sheet_xml = match archive.by_name(sheet_path) {
        Ok(file) => file,
        Err(_) => return Ok(scan),
    };

    let mut reader = Reader::from_reader(BufReader::new(sheet_xml));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut next_row = 0u32;
    let mut current_row = 0u32;
    let mut next_col = 0u32;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = attribute(&e, b"r")
                        .and_then(|r| r.parse::<u32>().ok())
                        .and_then(|r| r.checked_sub(1))
                        .unwrap_or(next_row);
                    next_row = current_row.saturating_add(1);
                    next_col = 0;
                }
                b"c" => {
                    let (row, col) = attribute(&e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .unwrap_or((current_row, next_col));
                    next_col = col.saturating_add(1);

                    if let Some(style) = attribute(&e, b"s").and_then(|s| s.parse::<usize>().ok()) {
                        scan.styles.insert((row, col), style);
                    }
                    scan.extent = (
                        scan.extent.0.max(row.saturating_add(1)),
                        scan.extent.1.max(col.saturating_add(1)),
                    );
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(scan)
}

/// Extract the comments attached to a worksheet as ((row, col), text)
pub fn extract_comments(
    archive: &mut ZipArchive<impl Read + Seek>,
    sheet_path: &str,
) -> Result<Vec<((u32, u32), String)>> {
    let Some(comments_path) = find_comments_part(archive, sheet_path)? else {
        return Ok(Vec::new());
    };

    let comments_xml = match archive.by_name(&comments_path) {
        Ok(file) => file,
        Err(_) => return Ok(Vec::new()),
    };

    // Whitespace inside <t> is significant
    let mut reader = Reader::from_reader(BufReader::new(comments_xml));

    let mut buf = Vec::new();
    let mut comments = Vec::new();
    let mut current: Option<((u32, u32), String)> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"comment" => {
                    current = attribute(&e, b"ref")
                        .and_then(|r| parse_cell_ref(&r))
                        .map(|position| (position, String::new()));
                }
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::CData(e)) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"comment" => {
                    if let Some(comment) = current.take() {
                        comments.push(comment);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(comments)
}

fn find_comments_part(
    archive: &mut ZipArchive<impl Read + Seek>,
    sheet_path: &str,
) -> Result<Option<String>> {
    let (dir, file_name) = sheet_path.rsplit_once('/').unwrap_or(("", sheet_path));
    let rels_path = format!("{}/_rels/{}.rels", dir, file_name);

    let rels = match archive.by_name(&rels_path) {
        Ok(file) => file,
        Err(_) => return Ok(None),
    };

    Ok(parse_relationships(rels)?
        .into_iter()
        .find(|(_, rel_type, _)| rel_type.ends_with("/comments"))
        .map(|(_, _, target)| resolve_target(dir, &target)))
}

/// Parse a relationships part into (Id, Type, Target) triples
fn parse_relationships(rels: impl Read) -> Result<Vec<(String, String, String)>> {
    let mut reader = Reader::from_reader(BufReader::new(rels));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                let id = attribute(&e, b"Id").unwrap_or_default();
                let rel_type = attribute(&e, b"Type").unwrap_or_default();
                let target = attribute(&e, b"Target").unwrap_or_default();
                relationships.push((id, rel_type, target));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Unescaped value of the attribute whose local name is `name`
pub(crate) fn attribute(element: &BytesStart, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}
