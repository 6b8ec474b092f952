//! Date format registry
//!
//! Maps spreadsheet-native number formats (`yyyy-mm-dd`, `m/d/yy h:mm`, ...) to the
//! `strftime` pattern used to render a date cell as text. A registry is immutable once
//! built and is handed to the reader by shared reference.

use crate::config::SheetMapConfig;
use crate::error::{Result, SheetMapError};
use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{LazyLock, OnceLock};

/// Value stored in a date cell whose native format has no registry entry
pub const ERROR_PATTERN: &str = "UNSUPPORTED_DATE_FORMAT";

/// Built-in mappings, keyed by the native format code as Excel writes it
const DEFAULT_FORMATS: &[(&str, &str)] = &[
    // Built-in format ids 14-22
    ("mm-dd-yy", "%m-%d-%y"),
    ("m/d/yy", "%-m/%-d/%y"),
    ("d-mmm-yy", "%-d-%b-%y"),
    ("d-mmm", "%-d-%b"),
    ("mmm-yy", "%b-%y"),
    ("h:mm AM/PM", "%-I:%M %p"),
    ("h:mm:ss AM/PM", "%-I:%M:%S %p"),
    ("h:mm", "%-H:%M"),
    ("h:mm:ss", "%-H:%M:%S"),
    ("m/d/yy h:mm", "%-m/%-d/%y %-H:%M"),
    ("mm:ss", "%M:%S"),
    // Common custom formats
    ("yyyy-mm-dd", "%Y-%m-%d"),
    ("yyyy/mm/dd", "%Y/%m/%d"),
    ("yyyy/m/d", "%Y/%-m/%-d"),
    ("m/d/yyyy", "%-m/%-d/%Y"),
    ("mm/dd/yyyy", "%m/%d/%Y"),
    ("dd/mm/yyyy", "%d/%m/%Y"),
    ("dd-mm-yyyy", "%d-%m-%Y"),
    ("yyyymmdd", "%Y%m%d"),
    ("hh:mm", "%H:%M"),
    ("hh:mm:ss", "%H:%M:%S"),
    ("yyyy-mm-dd hh:mm", "%Y-%m-%d %H:%M"),
    ("yyyy-mm-dd hh:mm:ss", "%Y-%m-%d %H:%M:%S"),
    ("yyyy/mm/dd hh:mm", "%Y/%m/%d %H:%M"),
    ("yyyy/mm/dd hh:mm:ss", "%Y/%m/%d %H:%M:%S"),
    ("m/d/yyyy h:mm", "%-m/%-d/%Y %-H:%M"),
    ("yyyy\"年\"m\"月\"d\"日\"", "%Y年%-m月%-d日"),
    ("yyyy\"年\"m\"月\"", "%Y年%-m月"),
    ("m\"月\"d\"日\"", "%-m月%-d日"),
];

/// Locale (`[$-409]`) and colour (`[Red]`) sections; elapsed-time tokens like `[h]` are kept
static DECORATION_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\[(?:\$[^\]]*|black|blue|cyan|green|magenta|red|white|yellow|color\s*\d+)\]",
    )
    .expect("static regex")
});

/// Immutable native-format -> output-pattern table
#[derive(Debug, Clone, Default)]
pub struct DateFormatRegistry {
    exact: HashMap<String, String>,
    normalized: HashMap<String, String>,
}

impl DateFormatRegistry {
    /// Registry with no entries; every date cell renders as [`ERROR_PATTERN`]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in mappings
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        for (native, output) in DEFAULT_FORMATS {
            registry.insert(native, output);
        }
        registry
    }

    /// Built-in mappings plus `entries`, which take precedence on conflicts
    pub fn with_entries<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut registry = Self::with_defaults();
        for (native, output) in entries {
            let (native, output) = (native.as_ref(), output.as_ref());
            validate_output_pattern(native, output)?;
            registry.insert(native, output);
        }
        Ok(registry)
    }

    /// Built-in mappings plus the `[date_formats]` table of `config`
    pub fn from_config(config: &SheetMapConfig) -> Result<Self> {
        Self::with_entries(&config.date_formats)
    }

    /// Process-wide default registry, built on first use
    pub fn shared() -> &'static DateFormatRegistry {
        static SHARED: OnceLock<DateFormatRegistry> = OnceLock::new();
        SHARED.get_or_init(DateFormatRegistry::with_defaults)
    }

    fn insert(&mut self, native: &str, output: &str) {
        self.exact.insert(native.to_string(), output.to_string());
        self.normalized
            .insert(normalize_native_format(native), output.to_string());
    }

    /// Output pattern for a native format, if registered
    pub fn lookup(&self, native: &str) -> Option<&str> {
        if let Some(output) = self.exact.get(native) {
            return Some(output);
        }
        self.normalized
            .get(&normalize_native_format(native))
            .map(String::as_str)
    }

    /// Render `value` with the pattern registered for `native`, or [`ERROR_PATTERN`]
    pub fn format_date(&self, native: Option<&str>, value: &NaiveDateTime) -> String {
        let Some(pattern) = native.and_then(|n| self.lookup(n)) else {
            return ERROR_PATTERN.to_string();
        };
        let mut rendered = String::new();
        match write!(rendered, "{}", value.format(pattern)) {
            Ok(()) => rendered,
            Err(_) => ERROR_PATTERN.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// Strip decorations that do not change how a date reads
pub fn normalize_native_format(native: &str) -> String {
    let stripped = DECORATION_SECTION.replace_all(native, "");
    let stripped = stripped.trim_end_matches(";@");
    stripped
        .chars()
        .filter(|c| *c != '\\' && *c != '"')
        .collect::<String>()
        .trim()
        .to_lowercase()
}

fn validate_output_pattern(native: &str, output: &str) -> Result<()> {
    if native.trim().is_empty() {
        return Err(SheetMapError::Config(
            "date format key must not be blank".to_string(),
        ));
    }
    if StrftimeItems::new(output).any(|item| matches!(item, Item::Error)) {
        return Err(SheetMapError::Config(format!(
            "invalid output pattern '{}' for date format '{}'",
            output, native
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_datetime() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 8, 1)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_lookup_exact() {
        let registry = DateFormatRegistry::with_defaults();
        assert_eq!(registry.lookup("yyyy-mm-dd"), Some("%Y-%m-%d"));
        assert_eq!(registry.lookup("h:mm"), Some("%-H:%M"));
        assert_eq!(registry.lookup("General"), None);
    }

    #[test]
    fn test_lookup_normalized() {
        let registry = DateFormatRegistry::with_defaults();
        assert_eq!(registry.lookup("yyyy\\-mm\\-dd"), Some("%Y-%m-%d"));
        assert_eq!(registry.lookup("[$-409]m/d/yyyy;@"), Some("%-m/%-d/%Y"));
        assert_eq!(registry.lookup("YYYY-MM-DD"), Some("%Y-%m-%d"));
        assert_eq!(registry.lookup("yyyy年m月d日"), Some("%Y年%-m月%-d日"));
    }

    #[test]
    fn test_normalize_keeps_elapsed_hours() {
        assert_eq!(normalize_native_format("[h]:mm:ss"), "[h]:mm:ss");
        assert_eq!(normalize_native_format("[Red]yyyy/mm/dd"), "yyyy/mm/dd");
    }

    #[test]
    fn test_format_date() {
        let registry = DateFormatRegistry::with_defaults();
        let value = sample_datetime();
        assert_eq!(registry.format_date(Some("yyyy-mm-dd"), &value), "2023-08-01");
        assert_eq!(
            registry.format_date(Some("yyyy-mm-dd hh:mm:ss"), &value),
            "2023-08-01 14:05:09"
        );
        assert_eq!(registry.format_date(Some("m/d/yy"), &value), "8/1/23");
    }

    #[test]
    fn test_format_date_unmapped() {
        let registry = DateFormatRegistry::with_defaults();
        let value = sample_datetime();
        assert_eq!(registry.format_date(Some("dd.mm.yyyy"), &value), ERROR_PATTERN);
        assert_eq!(registry.format_date(None, &value), ERROR_PATTERN);
        assert_eq!(
            DateFormatRegistry::empty().format_date(Some("yyyy-mm-dd"), &value),
            ERROR_PATTERN
        );
    }

    #[test]
    fn test_custom_entries_override_defaults() {
        let registry =
            DateFormatRegistry::with_entries([("dd.mm.yyyy", "%d.%m.%Y"), ("yyyy-mm-dd", "%Y%m%d")])
                .unwrap();
        let value = sample_datetime();
        assert_eq!(registry.format_date(Some("dd.mm.yyyy"), &value), "01.08.2023");
        assert_eq!(registry.format_date(Some("yyyy-mm-dd"), &value), "20230801");
    }

    #[test]
    fn test_invalid_output_pattern_rejected() {
        let result = DateFormatRegistry::with_entries([("dd.mm.yyyy", "%Q")]);
        assert!(matches!(result, Err(SheetMapError::Config(_))));
    }

    #[test]
    fn test_from_config() {
        let mut config = SheetMapConfig::default();
        config
            .date_formats
            .insert("d.m.yy".to_string(), "%-d.%-m.%y".to_string());
        let registry = DateFormatRegistry::from_config(&config).unwrap();
        assert_eq!(registry.lookup("d.m.yy"), Some("%-d.%-m.%y"));
        assert_eq!(registry.len(), DEFAULT_FORMATS.len() + 1);
    }

    #[test]
    fn test_shared_registry_is_built_once() {
        let first = DateFormatRegistry::shared() as *const DateFormatRegistry;
        let second = DateFormatRegistry::shared() as *const DateFormatRegistry;
        assert_eq!(first, second);
        assert!(!DateFormatRegistry::shared().is_empty());
    }
}
