//! Fixed label and color vocabularies shared by the decoder and the query resolver.
//!
//! Both tables fold tokens through [`normalize_token`], so a label the decoder
//! emits is always spelled exactly the way the resolver looks it up.

use crate::error::VisionError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Built-in detector labels (80 classes, index-stable).
pub const COCO_LABELS: &[&str] = &[
    "person", "bicycle", "car", "motorbike", "aeroplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "sofa", "pottedplant", "bed", "diningtable", "toilet", "tvmonitor", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Case-folds a token: lowercase, surrounding ASCII punctuation stripped.
pub fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase()
}

/// Ordered detector label table with a precomputed lookup.
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build from an ordered list. The first occurrence of a duplicate wins the lookup.
    pub fn new<I, S>(labels: I) -> Result<Self, VisionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|l| normalize_token(l.as_ref()))
            .filter(|l| !l.is_empty())
            .collect();

        if labels.is_empty() {
            return Err(VisionError::Vocabulary("label vocabulary is empty".to_string()));
        }

        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            index.entry(label.clone()).or_insert(i);
        }

        Ok(Self { labels, index })
    }

    /// The built-in 80-class table.
    pub fn coco() -> Self {
        let labels: Vec<String> = COCO_LABELS.iter().map(|l| l.to_string()).collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }

    /// One label per line; blank lines are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, VisionError> {
        let lines = BufReader::new(reader)
            .lines()
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(lines)
    }

    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a class channel, if the index is inside the table.
    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.index.get(&normalize_token(token)).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index_of(token).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::coco()
    }
}

/// Coarse color palette. Fixed for the lifetime of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorLabel {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    Pink,
    White,
    Black,
    Gray,
}

impl ColorLabel {
    pub const ALL: [ColorLabel; 11] = [
        ColorLabel::Red,
        ColorLabel::Orange,
        ColorLabel::Yellow,
        ColorLabel::Green,
        ColorLabel::Cyan,
        ColorLabel::Blue,
        ColorLabel::Purple,
        ColorLabel::Pink,
        ColorLabel::White,
        ColorLabel::Black,
        ColorLabel::Gray,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorLabel::Red => "red",
            ColorLabel::Orange => "orange",
            ColorLabel::Yellow => "yellow",
            ColorLabel::Green => "green",
            ColorLabel::Cyan => "cyan",
            ColorLabel::Blue => "blue",
            ColorLabel::Purple => "purple",
            ColorLabel::Pink => "pink",
            ColorLabel::White => "white",
            ColorLabel::Black => "black",
            ColorLabel::Gray => "gray",
        }
    }
}

impl fmt::Display for ColorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorLabel {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = normalize_token(s);
        ColorLabel::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == token)
            .ok_or_else(|| VisionError::Vocabulary(format!("unknown color '{}'", s)))
    }
}

/// Precomputed set of color words the resolver recognises.
#[derive(Debug, Clone)]
pub struct ColorVocabulary {
    words: HashMap<&'static str, ColorLabel>,
}

impl ColorVocabulary {
    pub fn new(colors: impl IntoIterator<Item = ColorLabel>) -> Self {
        let words = colors.into_iter().map(|c| (c.as_str(), c)).collect();
        Self { words }
    }

    /// Match an already-normalized token.
    pub fn lookup(&self, token: &str) -> Option<ColorLabel> {
        self.words.get(token).copied()
    }

    pub fn colors(&self) -> HashSet<ColorLabel> {
        self.words.values().copied().collect()
    }
}

impl Default for ColorVocabulary {
    fn default() -> Self {
        Self::new(ColorLabel::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_has_80_labels() {
        let vocab = LabelVocabulary::coco();
        assert_eq!(vocab.len(), 80);
        assert_eq!(vocab.label(0), Some("person"));
        assert_eq!(vocab.label(2), Some("car"));
        assert_eq!(vocab.label(79), Some("toothbrush"));
        assert_eq!(vocab.label(80), None);
    }

    #[test]
    fn test_lookup_is_case_folded() {
        let vocab = LabelVocabulary::coco();
        assert!(vocab.contains("Car"));
        assert!(vocab.contains("car."));
        assert!(vocab.contains("SOFA"));
        assert!(!vocab.contains("couch"));
        assert_eq!(vocab.index_of("dog"), Some(16));
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  Red,"), "red");
        assert_eq!(normalize_token("\"car?\""), "car");
        assert_eq!(normalize_token("!!"), "");
    }

    #[test]
    fn test_from_reader_skips_blank_lines() {
        let text = "cone\n\nBarrel\n  \nforklift\n";
        let vocab = LabelVocabulary::from_reader(text.as_bytes()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.label(1), Some("barrel"));
    }

    #[test]
    fn test_from_reader_empty_is_error() {
        let result = LabelVocabulary::from_reader("\n\n".as_bytes());
        assert!(matches!(result, Err(VisionError::Vocabulary(_))));
    }

    #[test]
    fn test_duplicate_label_first_wins() {
        let vocab = LabelVocabulary::new(["cup", "mug", "cup"]).unwrap();
        assert_eq!(vocab.index_of("cup"), Some(0));
    }

    #[test]
    fn test_color_round_trip_through_str() {
        for color in ColorLabel::ALL {
            assert_eq!(color.as_str().parse::<ColorLabel>().unwrap(), color);
        }
        assert!("magenta".parse::<ColorLabel>().is_err());
    }

    #[test]
    fn test_color_vocabulary_default_is_full_palette() {
        let colors = ColorVocabulary::default();
        assert_eq!(colors.colors().len(), 11);
        assert_eq!(colors.lookup("cyan"), Some(ColorLabel::Cyan));
        assert_eq!(colors.lookup("car"), None);
    }

    #[test]
    fn test_color_serde_lowercase() {
        let json = serde_json::to_string(&ColorLabel::Gray).unwrap();
        assert_eq!(json, "\"gray\"");
    }
}
