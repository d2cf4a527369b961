use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layer::Side;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse appearance config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid color for {role}: '{value}' (expected #RRGGBB)")]
    InvalidColor { role: &'static str, value: String },
}

/// Colors used for each kind of item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub front: String,
    pub back: String,
    pub wip: String,
    pub notes: String,
    pub highlighted: String,
    pub node: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            front: "#FF0000".to_string(),
            back: "#00FF00".to_string(),
            wip: "#00FFFF".to_string(),
            notes: "#FFFFFF".to_string(),
            highlighted: "#FFFFFF".to_string(),
            node: "#00FF00".to_string(),
        }
    }
}

impl Palette {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("front", &self.front),
            ("back", &self.back),
            ("wip", &self.wip),
            ("notes", &self.notes),
            ("highlighted", &self.highlighted),
            ("node", &self.node),
        ]
    }
}

/// Appearance preferences that travel with a board file.
///
/// A `pcb-trace.toml` only needs the keys it wants to change:
///
/// ```toml
/// link_width = 4
///
/// [colors]
/// front = "#FF8800"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub colors: Palette,

    /// Stroke width for links without their own width
    pub link_width: u32,

    /// Diameter for points without their own size
    pub pad_size: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            colors: Palette::default(),
            link_width: 6,
            pad_size: 12,
        }
    }
}

impl AppearanceConfig {
    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (role, value) in self.colors.entries() {
            if !HEX_COLOR.is_match(value) {
                return Err(ConfigError::InvalidColor {
                    role,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn color_for_side(&self, side: Side) -> &str {
        match side {
            Side::Front => &self.colors.front,
            Side::Back => &self.colors.back,
            Side::WorkInProgress => &self.colors.wip,
            Side::Notes => &self.colors.notes,
            Side::Point => &self.colors.node,
        }
    }

    pub fn effective_link_width(&self, width: Option<u32>) -> u32 {
        width.unwrap_or(self.link_width)
    }

    pub fn effective_point_size(&self, size: Option<u32>) -> u32 {
        size.unwrap_or(self.pad_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = AppearanceConfig::parse("").unwrap();
        assert_eq!(config, AppearanceConfig::default());
        assert_eq!(config.link_width, 6);
        assert_eq!(config.pad_size, 12);
    }

    #[test]
    fn test_parse_partial_config() {
        let content = r##"
link_width = 4

[colors]
front = "#FF8800"
"##;

        let config = AppearanceConfig::parse(content).unwrap();
        assert_eq!(config.link_width, 4);
        assert_eq!(config.pad_size, 12);
        assert_eq!(config.colors.front, "#FF8800");
        assert_eq!(config.colors.back, "#00FF00");
        assert_eq!(config.color_for_side(Side::Front), "#FF8800");
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let content = r#"
[colors]
notes = "white"
"#;

        let err = AppearanceConfig::parse(content).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidColor { role: "notes", .. }
        ));
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let err = AppearanceConfig::parse("link_width = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_color_for_side() {
        let config = AppearanceConfig::default();
        assert_eq!(config.color_for_side(Side::Back), "#00FF00");
        assert_eq!(config.color_for_side(Side::WorkInProgress), "#00FFFF");
        assert_eq!(config.color_for_side(Side::Point), "#00FF00");
    }

    #[test]
    fn test_effective_sizes() {
        let config = AppearanceConfig::default();
        assert_eq!(config.effective_link_width(None), 6);
        assert_eq!(config.effective_link_width(Some(2)), 2);
        assert_eq!(config.effective_point_size(None), 12);
        assert_eq!(config.effective_point_size(Some(20)), 20);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcb-trace.toml");
        std::fs::write(&path, "pad_size = 16\n").unwrap();

        let config = AppearanceConfig::from_file(&path).unwrap();
        assert_eq!(config.pad_size, 16);

        let missing = AppearanceConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
