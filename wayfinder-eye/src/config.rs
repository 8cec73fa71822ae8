//! Configuration for wayfinder-eye

use crate::error::VisionError;
use crate::models::{BoxUnits, TensorLayout};
use crate::processing::ColorEncoding;
use crate::vocabulary::LabelVocabulary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How the decoder learns the output tensor layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSetting {
    /// Inferred from the first tensor, then pinned for the pipeline's lifetime
    Auto,
    AttributesFirst,
    BoxesFirst,
}

impl LayoutSetting {
    pub fn pinned(&self) -> Option<TensorLayout> {
        match self {
            LayoutSetting::Auto => None,
            LayoutSetting::AttributesFirst => Some(TensorLayout::AttributesFirst),
            LayoutSetting::BoxesFirst => Some(TensorLayout::BoxesFirst),
        }
    }
}

/// Grounding pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Model input resolution (width, height)
    pub input_size: (u32, u32),
    /// Number of class channels after the 4 box values
    pub class_count: usize,
    /// Minimum best-class score for a box to survive decoding
    pub confidence_threshold: f32,
    /// Output tensor layout
    pub layout: LayoutSetting,
    /// Units of the raw box values
    pub box_units: BoxUnits,
    /// Encoding assigned to source frames loaded from files
    pub source_encoding: ColorEncoding,
    /// Optional class-name file replacing the built-in labels
    pub labels_path: Option<PathBuf>,
    /// Phrases that mark a user message as a navigation request
    pub navigation_phrases: Vec<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            input_size: (416, 416),
            class_count: 80,
            confidence_threshold: 0.5,
            layout: LayoutSetting::Auto,
            box_units: BoxUnits::Normalized,
            source_encoding: ColorEncoding::Srgb,
            labels_path: None,
            navigation_phrases: vec!["guide me to".to_string(), "take me to".to_string()],
        }
    }
}

impl VisionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.input_size.0 == 0 || self.input_size.1 == 0 {
            return Err("Input size must be non-zero".to_string());
        }

        if self.input_size.0 > 4096 || self.input_size.1 > 4096 {
            return Err("Input size too large (max 4096)".to_string());
        }

        if self.class_count == 0 {
            return Err("Class count must be non-zero".to_string());
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be between 0 and 1".to_string());
        }

        if self.navigation_phrases.iter().any(|p| p.trim().is_empty()) {
            return Err("Navigation phrases must not be empty".to_string());
        }

        Ok(())
    }

    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from string (JSON first, then TOML)
    pub fn from_str(content: &str) -> Result<Self, VisionError> {
        if let Ok(config) = serde_json::from_str::<VisionConfig>(content) {
            return Ok(config);
        }

        toml::from_str::<VisionConfig>(content)
            .map_err(|e| VisionError::Config(format!("Unrecognised config format: {}", e)))
    }

    /// Overlay environment variables
    pub fn with_env(mut self) -> Self {
        if let Ok(value) = std::env::var("WAYFINDER_CONFIDENCE") {
            if let Ok(threshold) = value.parse::<f32>() {
                self.confidence_threshold = threshold;
            }
        }

        if let Ok(path) = std::env::var("WAYFINDER_LABELS") {
            self.labels_path = Some(PathBuf::from(path));
        }

        self
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Label table for this configuration, checked against `class_count`.
    pub fn label_vocabulary(&self) -> Result<LabelVocabulary, VisionError> {
        let vocabulary = match &self.labels_path {
            Some(path) => LabelVocabulary::from_file(path)?,
            None => LabelVocabulary::coco(),
        };

        if vocabulary.len() < self.class_count {
            return Err(VisionError::Config(format!(
                "{} labels for {} class channels",
                vocabulary.len(),
                self.class_count
            )));
        }

        Ok(vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.input_size, (416, 416));
        assert_eq!(config.class_count, 80);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.layout, LayoutSetting::Auto);
        assert_eq!(config.box_units, BoxUnits::Normalized);
        assert_eq!(config.source_encoding, ColorEncoding::Srgb);
        assert!(config.labels_path.is_none());
        assert_eq!(config.navigation_phrases.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_input_size_zero() {
        let mut config = VisionConfig::default();
        config.input_size = (0, 416);
        assert!(config.validate().is_err());

        config.input_size = (416, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_threshold_range() {
        let mut config = VisionConfig::default();
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        config.confidence_threshold = -0.1;
        assert!(config.validate().is_err());

        config.confidence_threshold = f32::NAN;
        assert!(config.validate().is_err());

        config.confidence_threshold = 0.0;
        assert!(config.validate().is_ok());

        config.confidence_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_class_count_zero() {
        let mut config = VisionConfig::default();
        config.class_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_blank_phrase() {
        let mut config = VisionConfig::default();
        config.navigation_phrases.push("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layout_setting_pinned() {
        assert_eq!(LayoutSetting::Auto.pinned(), None);
        assert_eq!(
            LayoutSetting::BoxesFirst.pinned(),
            Some(TensorLayout::BoxesFirst)
        );
    }

    #[test]
    fn test_config_from_toml() {
        let content = r#"
            confidence_threshold = 0.35
            layout = "boxes_first"
            box_units = "input_pixels"
            source_encoding = "linear"
        "#;
        let config = VisionConfig::from_str(content).unwrap();
        assert_eq!(config.confidence_threshold, 0.35);
        assert_eq!(config.layout, LayoutSetting::BoxesFirst);
        assert_eq!(config.box_units, BoxUnits::InputPixels);
        assert_eq!(config.source_encoding, ColorEncoding::Linear);
        assert_eq!(config.class_count, 80);
    }

    #[test]
    fn test_config_from_json() {
        let content = r#"{ "input_size": [640, 640], "class_count": 3 }"#;
        let config = VisionConfig::from_str(content).unwrap();
        assert_eq!(config.input_size, (640, 640));
        assert_eq!(config.class_count, 3);
    }

    #[test]
    fn test_config_from_garbage() {
        assert!(matches!(
            VisionConfig::from_str("input_size = {"),
            Err(VisionError::Config(_))
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = 0.6").unwrap();
        let config = VisionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.confidence_threshold, 0.6);
    }

    #[test]
    fn test_label_vocabulary_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cone\nbarrel").unwrap();

        let mut config = VisionConfig::default();
        config.labels_path = Some(file.path().to_path_buf());
        config.class_count = 2;
        let vocab = config.label_vocabulary().unwrap();
        assert_eq!(vocab.label(0), Some("cone"));

        config.class_count = 3;
        assert!(matches!(config.label_vocabulary(), Err(VisionError::Config(_))));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = VisionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: VisionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.input_size, deserialized.input_size);
        assert_eq!(config.layout, deserialized.layout);
        assert_eq!(config.navigation_phrases, deserialized.navigation_phrases);
    }
}
