//! wayfinder-eye: grounding detector output in a 3D scene
//!
//! Decodes raw object-detector tensors, classifies the dominant color of each
//! detected region, projects detections into world space through a camera
//! ray, and publishes one immutable snapshot per frame. Free-text
//! instructions such as "guide me to the red car" are resolved against the
//! latest snapshot to a navigation target.

pub mod config;
pub mod error;
pub mod frame;
pub mod models;
pub mod navigation;
pub mod pipeline;
pub mod preprocess;
pub mod processing;
pub mod scene;
pub mod vocabulary;

pub use config::{LayoutSetting, VisionConfig};
pub use error::{ResolutionError, VisionError};
pub use frame::{PixelRect, SourceFrame};
pub use models::{DetectionCandidate, InferenceBackend, ModelSession, ReplayBackend, TensorLayout, YoloDecoder};
pub use navigation::{NavigationController, NavigationQuery, NavigationQueryResolver, NavigationSink};
pub use pipeline::GroundingPipeline;
pub use processing::{
    summarize, ColorClassifier, Detection, DetectionAggregator, DetectionSnapshot, ObserverPose, PinholeCamera,
    RayCaster, RayHit, RelativeDirection, SceneRayCaster, SnapshotSubscription, SpatialProjector, ViewContext,
};
pub use scene::SceneContext;
pub use vocabulary::{ColorLabel, ColorVocabulary, LabelVocabulary};
