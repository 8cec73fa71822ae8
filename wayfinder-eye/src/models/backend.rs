//! Inference backends and the scoped model session

use crate::error::VisionError;
use ndarray::{Array4, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Executes the detector network.
///
/// `run` blocks until the output tensor is fully materialized; partial or
/// streamed reads are not supported.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the network on a `[1, 3, H, W]` input.
    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, VisionError>;

    /// Release model resources. Called once by [`ModelSession`].
    fn release(&mut self) {}
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, VisionError> {
        (**self).run(input)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Owns a backend from startup until an explicit shutdown.
pub struct ModelSession<B: InferenceBackend> {
    backend: Option<B>,
}

impl<B: InferenceBackend> ModelSession<B> {
    pub fn acquire(backend: B) -> Self {
        info!("Inference backend '{}' acquired", backend.name());
        Self {
            backend: Some(backend),
        }
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    pub fn infer(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, VisionError> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| VisionError::Inference("model session already shut down".to_string()))?;
        let output = backend.run(input)?;
        debug!("Inference output shape: {:?}", output.shape());
        Ok(output)
    }

    /// Release the backend. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.release();
            info!("Inference backend '{}' released", backend.name());
        }
    }
}

impl<B: InferenceBackend> Drop for ModelSession<B> {
    fn drop(&mut self) {
        if self.backend.is_some() {
            warn!("Model session dropped without shutdown");
            self.shutdown();
        }
    }
}

/// Recorded output tensor in JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorFixture {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl TensorFixture {
    pub fn from_array(array: &ArrayD<f32>) -> Self {
        Self {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn into_array(self) -> Result<ArrayD<f32>, VisionError> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data)
            .map_err(|e| VisionError::Serialization(format!("tensor fixture: {}", e)))
    }
}

/// Replays a fixed output tensor for every frame.
pub struct ReplayBackend {
    output: ArrayD<f32>,
    runs: usize,
}

impl ReplayBackend {
    pub fn new(output: ArrayD<f32>) -> Self {
        Self { output, runs: 0 }
    }

    pub fn from_fixture(path: &Path) -> Result<Self, VisionError> {
        Ok(Self::new(TensorFixture::from_file(path)?.into_array()?))
    }

    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl InferenceBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, VisionError> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(VisionError::Inference(format!(
                "expected [1, 3, H, W] input, got {:?}",
                shape
            )));
        }
        self.runs += 1;
        Ok(self.output.clone())
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;

#[cfg(feature = "onnx")]
mod onnx {
    use super::InferenceBackend;
    use crate::error::VisionError;
    use ndarray::{Array4, ArrayD, IxDyn};
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;
    use tracing::info;

    /// ONNX Runtime session over a YOLO export with an `images` input.
    pub struct OnnxBackend {
        session: Session,
    }

    impl OnnxBackend {
        pub fn load(model_path: &Path) -> Result<Self, VisionError> {
            let session = Session::builder()?.commit_from_file(model_path)?;
            info!("ONNX model loaded from {:?}", model_path);
            Ok(Self { session })
        }
    }

    impl InferenceBackend for OnnxBackend {
        fn name(&self) -> &'static str {
            "onnx"
        }

        fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>, VisionError> {
            let dims = input.shape();
            let shape = [dims[0], dims[1], dims[2], dims[3]];
            let input = input.as_standard_layout().into_owned();
            let (data, _offset) = input.into_raw_vec_and_offset();
            let tensor = Tensor::from_array((shape, data.into_boxed_slice()))?;
            let outputs = self.session.run(ort::inputs!["images" => tensor])?;
            let (out_shape, out_data) = outputs[0].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = out_shape.iter().map(|&d| d.max(0) as usize).collect();
            ArrayD::from_shape_vec(IxDyn(&dims), out_data.to_vec())
                .map_err(|e| VisionError::Inference(e.to_string()))
        }
    }
}
