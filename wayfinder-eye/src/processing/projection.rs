//! Projection of 2D detections into world space
//!
//! Frame convention throughout: +X right, +Y up, +Z forward. A positive yaw
//! turns the view toward +X, a positive pitch tilts it down.

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Lateral offset (observer-local units) inside which a target is "center".
pub const CENTER_THRESHOLD: f32 = 0.3;

/// Surface reported when the ray hit nothing.
pub const UNKNOWN_SURFACE: &str = "unknown";

/// Coarse bearing of a target relative to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeDirection {
    Left,
    Center,
    Right,
}

impl RelativeDirection {
    pub fn from_lateral(offset: f32) -> Self {
        if offset.abs() < CENTER_THRESHOLD {
            RelativeDirection::Center
        } else if offset < 0.0 {
            RelativeDirection::Left
        } else {
            RelativeDirection::Right
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelativeDirection::Left => "left",
            RelativeDirection::Center => "center",
            RelativeDirection::Right => "right",
        }
    }
}

impl fmt::Display for RelativeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a ray struck.
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    pub point: Point3<f32>,
    /// Semantic tag of the struck object, if it has one
    pub tag: Option<String>,
    /// Object identifier, used when there is no tag
    pub name: String,
}

impl RayHit {
    pub fn surface(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.name)
    }
}

/// Scene ray-casting collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait RayCaster {
    fn cast_ray(&self, origin: &Point3<f32>, direction: &Unit<Vector3<f32>>) -> Option<RayHit>;
}

/// Perspective camera producing rays through viewport points.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    pub position: Point3<f32>,
    pub orientation: UnitQuaternion<f32>,
    pub vertical_fov_deg: f32,
    /// Width over height
    pub aspect: f32,
}

impl PinholeCamera {
    pub fn new(position: Point3<f32>, orientation: UnitQuaternion<f32>, vertical_fov_deg: f32, aspect: f32) -> Self {
        Self {
            position,
            orientation,
            vertical_fov_deg,
            aspect,
        }
    }

    /// Camera at `position` turned by yaw then pitch, in degrees.
    pub fn looking(position: Point3<f32>, yaw_deg: f32, pitch_deg: f32, vertical_fov_deg: f32, aspect: f32) -> Self {
        Self::new(position, yaw_pitch(yaw_deg, pitch_deg), vertical_fov_deg, aspect)
    }

    /// Ray through a bottom-up viewport point; `(0.5, 0.5)` is the optical axis.
    pub fn viewport_ray(&self, viewport_point: (f32, f32)) -> (Point3<f32>, Unit<Vector3<f32>>) {
        let tan_half = (self.vertical_fov_deg.to_radians() / 2.0).tan();
        let ndc_x = viewport_point.0 * 2.0 - 1.0;
        let ndc_y = viewport_point.1 * 2.0 - 1.0;
        let local = Vector3::new(ndc_x * tan_half * self.aspect, ndc_y * tan_half, 1.0);
        (self.position, Unit::new_normalize(self.orientation * local))
    }
}

/// Position and heading of the agent that will walk to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverPose {
    pub position: Point3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl ObserverPose {
    pub fn new(position: Point3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self { position, orientation }
    }

    pub fn facing(position: Point3<f32>, yaw_deg: f32) -> Self {
        Self::new(position, yaw_pitch(yaw_deg, 0.0))
    }

    /// World point expressed in the observer's local frame.
    pub fn to_local(&self, point: &Point3<f32>) -> Vector3<f32> {
        self.orientation.inverse() * (point - self.position)
    }
}

/// Everything the projector needs to know about the viewpoint for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext {
    pub camera: PinholeCamera,
    pub observer: ObserverPose,
}

/// Grounded position of one detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub world_position: Option<Point3<f32>>,
    pub distance: Option<f32>,
    pub direction: RelativeDirection,
    pub surface: String,
}

impl Projection {
    /// Result for a ray that hit nothing.
    pub fn unreached() -> Self {
        Self {
            world_position: None,
            distance: None,
            direction: RelativeDirection::Center,
            surface: UNKNOWN_SURFACE.to_string(),
        }
    }
}

/// Casts one ray per detection and grounds the hit relative to the observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialProjector;

impl SpatialProjector {
    pub fn project(
        &self,
        viewport_point: (f32, f32),
        ray_caster: &dyn RayCaster,
        view: &ViewContext,
    ) -> Projection {
        let (origin, direction) = view.camera.viewport_ray(viewport_point);
        let Some(hit) = ray_caster.cast_ray(&origin, &direction) else {
            debug!("No ray hit through viewport point {:?}", viewport_point);
            return Projection::unreached();
        };

        let distance = nalgebra::distance(&view.observer.position, &hit.point);
        let lateral = view.observer.to_local(&hit.point).x;

        Projection {
            world_position: Some(hit.point),
            distance: Some(distance),
            direction: RelativeDirection::from_lateral(lateral),
            surface: hit.surface().to_string(),
        }
    }
}

fn yaw_pitch(yaw_deg: f32, pitch_deg: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw_deg.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch_deg.to_radians())
}
