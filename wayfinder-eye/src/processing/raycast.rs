//! Static scene ray caster: an optional ground plane and tagged boxes

use crate::error::VisionError;
use crate::processing::projection::{RayCaster, RayHit};
use nalgebra::{Point3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const PARALLEL_EPSILON: f32 = 1e-6;

/// Horizontal plane at `y = height`, hit from above only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundPlane {
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Axis-aligned box with a name and optional semantic tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl SceneObject {
    /// Entry distance along the ray, or `None` on a miss.
    fn intersect(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> Option<f32> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;

        for axis in 0..3 {
            let (o, d) = (origin[axis], direction[axis]);
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() < PARALLEL_EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let t1 = (lo - o) / d;
            let t2 = (hi - o) / d;
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
        }

        if t_far < t_near || t_far < 0.0 {
            return None;
        }
        // Origin inside the box reports the exit point.
        Some(if t_near >= 0.0 { t_near } else { t_far })
    }
}

/// Ray caster over a fixed scene description, loadable from TOML.
///
/// ```toml
/// [ground]
/// height = 0.0
/// tag = "floor"
///
/// [[objects]]
/// name = "Car_01"
/// tag = "car"
/// min = [-1.0, 0.0, 4.0]
/// max = [1.0, 1.5, 8.0]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRayCaster {
    #[serde(default)]
    pub ground: Option<GroundPlane>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

impl SceneRayCaster {
    pub fn new(ground: Option<GroundPlane>, objects: Vec<SceneObject>) -> Self {
        Self { ground, objects }
    }

    pub fn from_str(content: &str) -> Result<Self, VisionError> {
        toml::from_str(content).map_err(|e| VisionError::Config(format!("Invalid scene description: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, VisionError> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    fn ground_hit(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> Option<f32> {
        let ground = self.ground.as_ref()?;
        if direction.y > -PARALLEL_EPSILON {
            return None;
        }
        let t = (ground.height - origin.y) / direction.y;
        (t >= 0.0).then_some(t)
    }
}

impl RayCaster for SceneRayCaster {
    fn cast_ray(&self, origin: &Point3<f32>, direction: &Unit<Vector3<f32>>) -> Option<RayHit> {
        let mut nearest: Option<(f32, RayHit)> = None;
        let mut consider = |t: f32, tag: &Option<String>, name: &str| {
            if nearest.as_ref().map_or(true, |(best, _)| t < *best) {
                nearest = Some((
                    t,
                    RayHit {
                        point: origin + direction.as_ref() * t,
                        tag: tag.clone(),
                        name: name.to_string(),
                    },
                ));
            }
        };

        for object in &self.objects {
            if let Some(t) = object.intersect(origin, direction) {
                consider(t, &object.tag, &object.name);
            }
        }
        if let (Some(t), Some(ground)) = (self.ground_hit(origin, direction), &self.ground) {
            consider(t, &ground.tag, "ground");
        }

        nearest.map(|(_, hit)| hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
        [ground]
        height = 0.0
        tag = "floor"

        [[objects]]
        name = "Car_01"
        tag = "car"
        min = [-1.0, 0.0, 4.0]
        max = [1.0, 1.5, 8.0]

        [[objects]]
        name = "Wall"
        min = [-10.0, 0.0, 20.0]
        max = [10.0, 5.0, 21.0]
    "#;

    fn ray(x: f32, y: f32, z: f32) -> Unit<Vector3<f32>> {
        Unit::new_normalize(Vector3::new(x, y, z))
    }

    #[test]
    fn test_parse_scene() {
        let scene = SceneRayCaster::from_str(SCENE).unwrap();
        assert_eq!(scene.objects.len(), 2);
        assert_eq!(scene.ground.as_ref().and_then(|g| g.tag.as_deref()), Some("floor"));
    }

    #[test]
    fn test_invalid_scene_is_config_error() {
        assert!(matches!(
            SceneRayCaster::from_str("[[objects]]\nname = 3"),
            Err(VisionError::Config(_))
        ));
    }

    #[test]
    fn test_nearest_box_wins() {
        let scene = SceneRayCaster::from_str(SCENE).unwrap();
        let hit = scene.cast_ray(&Point3::new(0.0, 1.0, 0.0), &ray(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(hit.surface(), "car");
        assert!((hit.point.z - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_untagged_object_falls_back_to_name() {
        let scene = SceneRayCaster::from_str(SCENE).unwrap();
        let hit = scene.cast_ray(&Point3::new(5.0, 1.0, 0.0), &ray(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(hit.tag, None);
        assert_eq!(hit.surface(), "Wall");
    }

    #[test]
    fn test_ground_hit_from_above() {
        let scene = SceneRayCaster::from_str(SCENE).unwrap();
        let hit = scene.cast_ray(&Point3::new(5.0, 2.0, 0.0), &ray(0.0, -1.0, 1.0)).unwrap();
        assert_eq!(hit.surface(), "floor");
        assert!(hit.point.y.abs() < 1e-5);
        assert!((hit.point.z - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_sky_is_a_miss() {
        let scene = SceneRayCaster::from_str(SCENE).unwrap();
        assert!(scene.cast_ray(&Point3::new(0.0, 1.0, 0.0), &ray(0.0, 1.0, 0.0)).is_none());
        assert!(scene.cast_ray(&Point3::new(0.0, 1.0, 0.0), &ray(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn test_empty_scene_never_hits() {
        let scene = SceneRayCaster::default();
        assert!(scene.cast_ray(&Point3::origin(), &ray(0.0, -1.0, 1.0)).is_none());
    }
}
