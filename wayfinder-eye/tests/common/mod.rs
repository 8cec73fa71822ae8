//! Shared street-scene fixture: a red car ahead-left, a blue car ahead-right
//! (closer), and a dog drawn against the sky where no ray can land.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use nalgebra::Point3;
use ndarray::{Array3, ArrayD};
use wayfinder_eye::processing::SceneObject;
use wayfinder_eye::{
    GroundingPipeline, ObserverPose, PinholeCamera, ReplayBackend, SceneRayCaster, ViewContext, VisionConfig,
};

pub const SIZE: u32 = 100;
pub const CAR: usize = 2;
pub const DOG: usize = 16;

pub const RED_CAR_HIT: [f32; 3] = [-2.0, 1.0, 4.0];
pub const BLUE_CAR_HIT: [f32; 3] = [1.0, 1.0, 2.0];

/// `(class, score, [cx, cy, w, h])` per box.
pub type BoxSpec = (usize, f32, [f32; 4]);

pub fn street_boxes() -> Vec<BoxSpec> {
    vec![
        (CAR, 0.91, [0.25, 0.5, 0.2, 0.2]),
        (CAR, 0.88, [0.75, 0.5, 0.2, 0.2]),
        (DOG, 0.70, [0.5, 0.05, 0.1, 0.1]),
        // Below threshold
        (CAR, 0.30, [0.5, 0.5, 0.1, 0.1]),
    ]
}

/// `[1, 84, N]` tensor for `boxes`.
pub fn attributes_first(boxes: &[BoxSpec]) -> ArrayD<f32> {
    let mut tensor = Array3::<f32>::zeros((1, 84, boxes.len()));
    for (i, (class, score, bbox)) in boxes.iter().enumerate() {
        for (k, value) in bbox.iter().enumerate() {
            tensor[[0, k, i]] = *value;
        }
        tensor[[0, 4 + class, i]] = *score;
    }
    tensor.into_dyn()
}

/// `[1, N, 84]` tensor with the same values.
pub fn boxes_first(boxes: &[BoxSpec]) -> ArrayD<f32> {
    attributes_first(boxes).permuted_axes(vec![0, 2, 1]).as_standard_layout().to_owned()
}

fn fill(image: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, Rgb(color));
        }
    }
}

pub fn street_image() -> RgbImage {
    let mut image = RgbImage::from_pixel(SIZE, SIZE, Rgb([128, 128, 128]));
    fill(&mut image, 15, 40, 35, 60, [220, 20, 20]);
    fill(&mut image, 65, 40, 85, 60, [20, 40, 220]);
    image
}

pub fn street_scene() -> SceneRayCaster {
    SceneRayCaster::new(
        None,
        vec![
            SceneObject {
                name: "RedCar".to_string(),
                tag: Some("vehicle".to_string()),
                min: [-3.0, 0.0, 4.0],
                max: [-1.0, 2.0, 6.0],
            },
            SceneObject {
                name: "BlueCar".to_string(),
                tag: None,
                min: [0.5, 0.0, 2.0],
                max: [3.0, 2.0, 3.0],
            },
        ],
    )
}

pub fn street_view() -> ViewContext {
    ViewContext {
        camera: PinholeCamera::looking(Point3::new(0.0, 1.0, 0.0), 0.0, 0.0, 90.0, 1.0),
        observer: ObserverPose::facing(Point3::origin(), 0.0),
    }
}

pub fn config() -> VisionConfig {
    VisionConfig {
        input_size: (SIZE, SIZE),
        ..VisionConfig::default()
    }
}

pub fn pipeline(output: ArrayD<f32>) -> GroundingPipeline<ReplayBackend> {
    GroundingPipeline::new(config(), ReplayBackend::new(output), Box::new(street_scene())).unwrap()
}

pub fn near(point: Option<Point3<f32>>, expected: [f32; 3]) -> bool {
    point.map_or(false, |p| {
        (p.x - expected[0]).abs() < 1e-3 && (p.y - expected[1]).abs() < 1e-3 && (p.z - expected[2]).abs() < 1e-3
    })
}
