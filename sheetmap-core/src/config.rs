//! Configuration for the read and write engines

use crate::error::{Result, SheetMapError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetMapConfig {
    /// Extra native-format -> output-pattern entries layered over the built-in registry
    #[serde(default)]
    pub date_formats: BTreeMap<String, String>,
    #[serde(default)]
    pub write: WriteConfig,
}

impl SheetMapConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SheetMapError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SheetMapError::Config(e.to_string()))
    }
}

/// Write engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Parent directory for streaming spill storage (system temp dir when unset)
    #[serde(default)]
    pub spill_dir: Option<PathBuf>,
    /// Author stamped on written comments
    #[serde(default)]
    pub comment_author: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = SheetMapConfig::from_toml_str(
            r#"
            [date_formats]
            "dd.mm.yyyy" = "%d.%m.%Y"

            [write]
            spill_dir = "/var/tmp/sheetmap"
            comment_author = "validator"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.date_formats.get("dd.mm.yyyy").map(String::as_str),
            Some("%d.%m.%Y")
        );
        assert_eq!(
            config.write.spill_dir,
            Some(PathBuf::from("/var/tmp/sheetmap"))
        );
        assert_eq!(config.write.comment_author.as_deref(), Some("validator"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SheetMapConfig::from_toml_str("").unwrap();
        assert!(config.date_formats.is_empty());
        assert!(config.write.spill_dir.is_none());
        assert!(config.write.comment_author.is_none());
    }

    #[test]
    fn test_invalid_config() {
        let result = SheetMapConfig::from_toml_str("[write]\nspill_dir = 3");
        assert!(matches!(result, Err(SheetMapError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = SheetMapConfig::from_file("/nonexistent/sheetmap.toml");
        assert!(matches!(result, Err(SheetMapError::Config(_))));
    }
}
