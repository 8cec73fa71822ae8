//! Grounding stages applied to decoded candidates

pub mod aggregator;
pub mod color;
pub mod projection;
pub mod raycast;

pub use aggregator::{summarize, Detection, DetectionAggregator, DetectionSnapshot, SnapshotSubscription};
pub use color::{ColorClassifier, ColorEncoding, Hsv};
pub use projection::{
    ObserverPose, PinholeCamera, Projection, RayCaster, RayHit, RelativeDirection, SpatialProjector, ViewContext,
    CENTER_THRESHOLD, UNKNOWN_SURFACE,
};
pub use raycast::{GroundPlane, SceneObject, SceneRayCaster};
