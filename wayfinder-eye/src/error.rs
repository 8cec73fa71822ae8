//! Error types for wayfinder-eye

use crate::vocabulary::ColorLabel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Shape mismatch: tensor shape {shape:?} has no axis of {expected_channels} channels")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected_channels: usize,
    },

    #[error("Missing source: no image available for this cycle")]
    MissingSource,

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Inference(err.to_string())
    }
}

impl From<serde_json::Error> for VisionError {
    fn from(err: serde_json::Error) -> Self {
        VisionError::Serialization(err.to_string())
    }
}

/// Failure to turn a free-text instruction into a navigation target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No known object label in message")]
    NoLabelRecognized,

    #[error("No reachable {} {label} in view", color_word(.color))]
    NoMatch {
        label: String,
        color: Option<ColorLabel>,
    },
}

fn color_word(color: &Option<ColorLabel>) -> &'static str {
    color.map(|c| c.as_str()).unwrap_or("matching")
}
