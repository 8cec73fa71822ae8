// Loading of CLI inputs: configuration, scene description, backend and frame

use anyhow::{anyhow, Context, Result};
use clap::Args;
use nalgebra::Point3;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wayfinder_eye::models::InferenceBackend;
use wayfinder_eye::{
    DetectionSnapshot, GroundingPipeline, ObserverPose, PinholeCamera, ReplayBackend, SceneRayCaster, SourceFrame,
    ViewContext, VisionConfig,
};

#[derive(Args, Debug, Clone)]
pub struct FrameArgs {
    /// Recorded output tensor (JSON with "shape" and "data")
    #[arg(long)]
    pub tensor: Option<PathBuf>,

    /// ONNX model file, run instead of a recorded tensor
    #[cfg(feature = "onnx")]
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Source image aligned with the model input
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Scene description (TOML): camera, observer, ground and objects
    #[arg(long)]
    pub scene: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub vertical_fov_deg: f32,
    /// Width over height; taken from the image when unset
    pub aspect: Option<f32>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 1.6, 0.0],
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            vertical_fov_deg: 60.0,
            aspect: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObserverSettings {
    pub position: [f32; 3],
    pub yaw_deg: f32,
}

/// Scene file: viewpoint plus the ray-cast geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub observer: ObserverSettings,
    #[serde(flatten)]
    pub geometry: SceneRayCaster,
}

impl SceneFile {
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid scene file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read scene {:?}", path))?;
        Self::from_str(&content)
    }

    pub fn view(&self, image_size: Option<(u32, u32)>) -> ViewContext {
        let aspect = self.camera.aspect.unwrap_or_else(|| match image_size {
            Some((w, h)) if h > 0 => w as f32 / h as f32,
            _ => 1.0,
        });
        let [cx, cy, cz] = self.camera.position;
        let [ox, oy, oz] = self.observer.position;

        ViewContext {
            camera: PinholeCamera::looking(
                Point3::new(cx, cy, cz),
                self.camera.yaw_deg,
                self.camera.pitch_deg,
                self.camera.vertical_fov_deg,
                aspect,
            ),
            observer: ObserverPose::facing(Point3::new(ox, oy, oz), self.observer.yaw_deg),
        }
    }
}

/// Config file (or defaults) with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<VisionConfig> {
    let config = match path {
        Some(path) => VisionConfig::from_file(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => VisionConfig::default(),
    }
    .with_env();

    config.validate().map_err(|e| anyhow!("Invalid config: {}", e))?;
    Ok(config)
}

#[cfg(feature = "onnx")]
fn model_backend(args: &FrameArgs) -> Result<Option<Box<dyn InferenceBackend>>> {
    let Some(model) = &args.model else {
        return Ok(None);
    };
    let backend: Box<dyn InferenceBackend> = Box::new(
        wayfinder_eye::models::OnnxBackend::load(model).with_context(|| format!("Failed to load model {:?}", model))?,
    );
    Ok(Some(backend))
}

#[cfg(not(feature = "onnx"))]
fn model_backend(_args: &FrameArgs) -> Result<Option<Box<dyn InferenceBackend>>> {
    Ok(None)
}

fn load_backend(args: &FrameArgs) -> Result<Box<dyn InferenceBackend>> {
    if let Some(backend) = model_backend(args)? {
        return Ok(backend);
    }

    let tensor = args
        .tensor
        .as_ref()
        .ok_or_else(|| anyhow!("--tensor is required"))?;
    let backend =
        ReplayBackend::from_fixture(tensor).with_context(|| format!("Failed to load tensor {:?}", tensor))?;
    Ok(Box::new(backend))
}

/// A pipeline bound to one frame and viewpoint.
pub struct GroundingSession {
    pub pipeline: GroundingPipeline<Box<dyn InferenceBackend>>,
    pub frame: Option<SourceFrame>,
    pub view: ViewContext,
}

impl GroundingSession {
    pub fn open(config: VisionConfig, args: &FrameArgs) -> Result<Self> {
        let scene = SceneFile::load(&args.scene)?;
        let frame = args
            .image
            .as_ref()
            .map(|path| {
                SourceFrame::open(path, config.source_encoding)
                    .with_context(|| format!("Failed to open image {:?}", path))
            })
            .transpose()?;
        let view = scene.view(frame.as_ref().map(|f| f.size()));

        let backend = load_backend(args)?;
        let pipeline = GroundingPipeline::new(config, backend, Box::new(scene.geometry))?;

        Ok(Self { pipeline, frame, view })
    }

    pub fn cycle(&mut self) -> Result<Arc<DetectionSnapshot>> {
        self.pipeline
            .process_frame(self.frame.as_ref(), &self.view)
            .context("Grounding cycle failed")
    }

    pub fn close(mut self) {
        self.pipeline.shutdown();
    }
}
