//! Detector inference and output decoding

pub mod backend;
pub mod yolo;

#[cfg(feature = "onnx")]
pub use backend::OnnxBackend;
pub use backend::{InferenceBackend, ModelSession, ReplayBackend, TensorFixture};
pub use yolo::{decode, BoxUnits, DetectionCandidate, NormalizedBox, TensorLayout, YoloDecoder};
