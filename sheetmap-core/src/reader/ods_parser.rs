//! ODS date formats: rebuilds a spreadsheet-style native pattern (`yyyy-mm-dd`, ...) from
//! `number:date-style` definitions and binds it to every date cell by position.

use super::xml_parser::attribute;
use anyhow::Result;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

/// Parent chains longer than this are treated as unresolvable
const MAX_STYLE_DEPTH: usize = 8;

/// Native date patterns of an ODS container
#[derive(Debug, Default)]
pub struct OdsDateFormats {
    /// Distinct native patterns, referenced by index
    pub formats: Vec<String>,
    /// Per table in document order: (row, col) -> index into `formats`
    pub sheets: Vec<HashMap<(u32, u32), usize>>,
}

/// Read every date style and locate the date cells using them
pub fn extract_date_formats(archive: &mut ZipArchive<impl Read + Seek>) -> Result<OdsDateFormats> {
    let mut styles = StyleTable::default();

    // Automatic styles live in content.xml, common styles in styles.xml
    for part in ["styles.xml", "content.xml"] {
        if let Ok(file) = archive.by_name(part) {
            styles.parse(file)?;
        }
    }

    let mut resolved = ResolvedStyles::new(&styles);
    let sheets = match archive.by_name("content.xml") {
        Ok(file) => locate_date_cells(file, &mut resolved)?,
        Err(_) => Vec::new(),
    };

    Ok(OdsDateFormats {
        formats: resolved.formats,
        sheets,
    })
}

#[derive(Debug, Default)]
struct StyleTable {
    /// Data style name -> native pattern
    date_styles: HashMap<String, String>,
    /// Cell style name -> (data style, parent style)
    cell_styles: HashMap<String, (Option<String>, Option<String>)>,
}

impl StyleTable {
    fn parse(&mut self, part: impl Read) -> Result<()> {
        let mut reader = Reader::from_reader(BufReader::new(part));

        let mut buf = Vec::new();
        let mut current: Option<(String, String)> = None;
        let mut in_text = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"number:date-style" => {
                        current = attribute(&e, b"name").map(|name| (name, String::new()));
                    }
                    b"number:text" if current.is_some() => in_text = true,
                    b"style:style" => self.add_cell_style(&e),
                    _ => {
                        if let Some((_, pattern)) = current.as_mut() {
                            push_date_token(pattern, &e);
                        }
                    }
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"style:style" => self.add_cell_style(&e),
                    _ => {
                        if let Some((_, pattern)) = current.as_mut() {
                            push_date_token(pattern, &e);
                        }
                    }
                },
                Ok(Event::Text(e)) if in_text => {
                    if let Some((_, pattern)) = current.as_mut() {
                        push_literal(pattern, &e.unescape()?);
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"number:text" => in_text = false,
                    b"number:date-style" => {
                        if let Some((name, pattern)) = current.take() {
                            self.date_styles.insert(name, pattern);
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

        Ok(())
    }

    fn add_cell_style(&mut self, e: &BytesStart) {
        if attribute(e, b"family").as_deref() != Some("table-cell") {
            return;
        }
        if let Some(name) = attribute(e, b"name") {
            let data_style = attribute(e, b"data-style-name");
            let parent = attribute(e, b"parent-style-name");
            self.cell_styles.insert(name, (data_style, parent));
        }
    }
}

/// Append the spreadsheet token for one `number:*` date element
fn push_date_token(pattern: &mut String, e: &BytesStart) {
    let long = attribute(e, b"style").as_deref() == Some("long");
    let textual = attribute(e, b"textual").as_deref() == Some("true");

    let token = match e.name().as_ref() {
        b"number:year" => if long { "yyyy" } else { "yy" },
        b"number:month" => match (textual, long) {
            (true, true) => "mmmm",
            (true, false) => "mmm",
            (false, true) => "mm",
            (false, false) => "m",
        },
        b"number:day" => if long { "dd" } else { "d" },
        b"number:day-of-week" => if long { "dddd" } else { "ddd" },
        b"number:hours" => if long { "hh" } else { "h" },
        b"number:minutes" => if long { "mm" } else { "m" },
        b"number:seconds" => if long { "ss" } else { "s" },
        b"number:am-pm" => "AM/PM",
        _ => return,
    };
    pattern.push_str(token);
}

/// Separators pass through; anything that could read as a date token is quoted
fn push_literal(pattern: &mut String, text: &str) {
    let plain = text
        .chars()
        .all(|c| matches!(c, '-' | '/' | '.' | ':' | ',' | ' '));
    if plain {
        pattern.push_str(text);
    } else {
        pattern.push('"');
        pattern.push_str(text);
        pattern.push('"');
    }
}

/// Cell style name -> interned native pattern
struct ResolvedStyles<'s> {
    styles: &'s StyleTable,
    cache: HashMap<String, Option<usize>>,
    by_pattern: HashMap<String, usize>,
    formats: Vec<String>,
}

impl<'s> ResolvedStyles<'s> {
    fn new(styles: &'s StyleTable) -> Self {
        Self {
            styles,
            cache: HashMap::new(),
            by_pattern: HashMap::new(),
            formats: Vec::new(),
        }
    }

    fn index_of(&mut self, cell_style: &str) -> Option<usize> {
        if let Some(cached) = self.cache.get(cell_style) {
            return *cached;
        }

        let index = self.pattern_of(cell_style).map(|pattern| {
            match self.by_pattern.get(&pattern) {
                Some(index) => *index,
                None => {
                    self.formats.push(pattern.clone());
                    self.by_pattern.insert(pattern, self.formats.len() - 1);
                    self.formats.len() - 1
                }
            }
        });
        self.cache.insert(cell_style.to_string(), index);
        index
    }

    /// Follow parent styles until one names a date data style
    fn pattern_of(&self, cell_style: &str) -> Option<String> {
        let mut name = cell_style;
        for _ in 0..MAX_STYLE_DEPTH {
            let (data_style, parent) = self.styles.cell_styles.get(name)?;
            if let Some(pattern) = data_style
                .as_ref()
                .and_then(|d| self.styles.date_styles.get(d))
            {
                return Some(pattern.clone());
            }
            name = parent.as_deref()?;
        }
        None
    }
}

/// Column default cell styles of the current table, as (first, end, style)
#[derive(Debug, Default)]
struct ColumnDefaults {
    spans: Vec<(u32, u32, String)>,
    next: u32,
}

impl ColumnDefaults {
    fn add(&mut self, repeated: u32, style: Option<String>) {
        let end = self.next.saturating_add(repeated);
        if let Some(style) = style {
            self.spans.push((self.next, end, style));
        }
        self.next = end;
    }

    fn style_at(&self, col: u32) -> Option<&str> {
        self.spans
            .iter()
            .find(|(first, end, _)| (*first..*end).contains(&col))
            .map(|(_, _, style)| style.as_str())
    }
}

fn repeat_count(e: &BytesStart, name: &[u8]) -> u32 {
    attribute(e, name)
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

fn locate_date_cells(
    content: impl Read,
    resolved: &mut ResolvedStyles,
) -> Result<Vec<HashMap<(u32, u32), usize>>> {
    let mut reader = Reader::from_reader(BufReader::new(content));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut sheets: Vec<HashMap<(u32, u32), usize>> = Vec::new();
    let mut columns = ColumnDefaults::default();
    let mut current_row = 0u32;
    let mut current_col = 0u32;
    let mut row_repeated = 1u32;
    let mut row_style: Option<String> = None;

    loop {
        let (e, is_empty) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"table:table-row" {
                    current_row = current_row.saturating_add(row_repeated);
                }
                buf.clear();
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {
                buf.clear();
                continue;
            }
        };

        match e.name().as_ref() {
            b"table:table" => {
                sheets.push(HashMap::new());
                columns = ColumnDefaults::default();
                current_row = 0;
            }
            b"table:table-column" => {
                columns.add(
                    repeat_count(&e, b"number-columns-repeated"),
                    attribute(&e, b"default-cell-style-name"),
                );
            }
            b"table:table-row" => {
                current_col = 0;
                row_repeated = repeat_count(&e, b"number-rows-repeated");
                row_style = attribute(&e, b"default-cell-style-name");
                if is_empty {
                    current_row = current_row.saturating_add(row_repeated);
                }
            }
            b"table:table-cell" | b"table:covered-table-cell" => {
                let repeated = repeat_count(&e, b"number-columns-repeated");
                let is_date = attribute(&e, b"value-type").as_deref() == Some("date");

                if is_date {
                    let style = attribute(&e, b"style-name")
                        .or_else(|| row_style.clone())
                        .or_else(|| columns.style_at(current_col).map(str::to_string));
                    let index = style.and_then(|s| resolved.index_of(&s));

                    if let (Some(index), Some(sheet)) = (index, sheets.last_mut()) {
                        for row in 0..row_repeated {
                            for col in 0..repeated {
                                sheet.insert(
                                    (current_row.saturating_add(row), current_col.saturating_add(col)),
                                    index,
                                );
                            }
                        }
                    }
                }

                current_col = current_col.saturating_add(repeated);
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}
