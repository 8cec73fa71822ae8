//! Source frames and pixel-space boxes

use crate::models::NormalizedBox;
use crate::processing::ColorEncoding;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Axis-aligned box in source-image pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Denormalize a center-format box into an image of `image_size` pixels.
    pub fn from_normalized(bbox: &NormalizedBox, image_size: (u32, u32)) -> Self {
        let (w, h) = (image_size.0 as f32, image_size.1 as f32);
        Self {
            x: (bbox.cx - bbox.w / 2.0) * w,
            y: (bbox.cy - bbox.h / 2.0) * h,
            width: bbox.w * w,
            height: bbox.h * h,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Integer pixel span `[x0, x1) x [y0, y1)` inside a `width x height`
    /// image, or `None` when nothing of the box is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()) {
            return None;
        }

        let x0 = self.x.floor().clamp(0.0, width as f32) as u32;
        let y0 = self.y.floor().clamp(0.0, height as f32) as u32;
        let x1 = (self.x + self.width).ceil().clamp(0.0, width as f32) as u32;
        let y1 = (self.y + self.height).ceil().clamp(0.0, height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

/// One captured image, aligned with the model input.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub image: RgbImage,
    pub encoding: ColorEncoding,
}

impl SourceFrame {
    pub fn new(image: RgbImage, encoding: ColorEncoding) -> Self {
        Self { image, encoding }
    }

    pub fn open(path: &Path, encoding: ColorEncoding) -> Result<Self, crate::error::VisionError> {
        let image = image::open(path)?.to_rgb8();
        Ok(Self::new(image, encoding))
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Normalized viewport point for a pixel position: clamped to `[0, 1]` on
    /// both axes, vertical axis flipped so `y = 0` is the bottom row.
    pub fn viewport_point(&self, pixel: (f32, f32)) -> (f32, f32) {
        let (w, h) = self.size();
        if w == 0 || h == 0 {
            return (0.5, 0.5);
        }
        (
            (pixel.0 / w as f32).clamp(0.0, 1.0),
            (1.0 - pixel.1 / h as f32).clamp(0.0, 1.0),
        )
    }
}
