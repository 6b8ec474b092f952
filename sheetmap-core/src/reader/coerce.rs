//! Coercion of typed source cells into model string values

use crate::date_format::{DateFormatRegistry, ERROR_PATTERN};
use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime};

/// Kind of a source cell, as classified from the codec's typed value
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCell {
    Blank,
    Boolean(bool),
    Error,
    Formula,
    Numeric { value: Number, date: Option<DateCell> },
    String(String),
    Unknown,
}

/// Numeric payload; integers are kept apart so their text stays exact beyond 2^53
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_text(self) -> String {
        match self {
            Number::Int(i) => i.to_string(),
            Number::Float(f) => number_to_text(f),
        }
    }
}

/// Date information of a date-formatted numeric cell
#[derive(Debug, Clone, PartialEq)]
pub struct DateCell {
    /// `None` when the serial value is outside the representable range
    pub datetime: Option<NaiveDateTime>,
    /// Native number format code, when the container exposes it
    pub native_format: Option<String>,
}

impl SourceCell {
    /// Classify a calamine value. `formula` marks cells holding a formula, whose cached
    /// result is ignored.
    pub fn from_data(data: Option<&Data>, formula: bool, native_format: Option<&str>) -> Self {
        if formula {
            return SourceCell::Formula;
        }
        let Some(data) = data else {
            return SourceCell::Blank;
        };

        match data {
            Data::Empty => SourceCell::Blank,
            Data::Bool(b) => SourceCell::Boolean(*b),
            Data::Error(_) => SourceCell::Error,
            Data::Int(i) => SourceCell::Numeric {
                value: Number::Int(*i),
                date: None,
            },
            Data::Float(f) => SourceCell::Numeric {
                value: Number::Float(*f),
                date: None,
            },
            Data::DateTime(dt) => SourceCell::Numeric {
                value: Number::Float(dt.as_f64()),
                date: Some(DateCell {
                    datetime: dt.as_datetime(),
                    native_format: native_format.map(str::to_string),
                }),
            },
            // ODS stores dates as ISO text with no native format code
            Data::DateTimeIso(s) => SourceCell::Numeric {
                value: Number::Float(0.0),
                date: Some(DateCell {
                    datetime: parse_iso_datetime(s),
                    native_format: native_format.map(str::to_string),
                }),
            },
            Data::String(s) => SourceCell::String(s.clone()),
            Data::DurationIso(_) => SourceCell::Unknown,
        }
    }

    /// Model value of this cell
    pub fn coerce(&self, registry: &DateFormatRegistry) -> Option<String> {
        match self {
            SourceCell::Blank => None,
            SourceCell::Boolean(b) => Some(b.to_string()),
            SourceCell::Error => None,
            SourceCell::Formula => None,
            SourceCell::Numeric { value, date: None } => Some(value.to_text()),
            SourceCell::Numeric {
                date: Some(date), ..
            } => Some(match &date.datetime {
                Some(datetime) => registry.format_date(date.native_format.as_deref(), datetime),
                None => ERROR_PATTERN.to_string(),
            }),
            SourceCell::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            SourceCell::Unknown => None,
        }
    }
}

/// Shortest decimal text that round-trips to `value`; never locale formatted or scientific
pub fn number_to_text(value: f64) -> String {
    if value == 0.0 {
        // Also folds -0.0
        return "0".to_string();
    }
    value.to_string()
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
