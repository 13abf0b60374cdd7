use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CHAPTER_PATTERN: &str =
    r"(?m)^[ \t]*(?:第[0-9零一二三四五六七八九十百千万]+[章节回卷]|Chapter\s+\S+).*$";

/// Settings read from `<library>/config.yml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub chapter_pattern: String,
    pub fallback_label: String,
    pub title_in_body: bool,
    pub language: String,
    pub default_title: String,
    pub default_author: String,
    pub default_description: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            chapter_pattern: DEFAULT_CHAPTER_PATTERN.to_string(),
            fallback_label: "Prologue".to_string(),
            title_in_body: false,
            language: "en".to_string(),
            default_title: "Untitled".to_string(),
            default_author: "Anonymous".to_string(),
            default_description: String::new(),
        }
    }
}

impl LibraryConfig {
    /// Load the config file, or the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(&content)?)
    }
}
