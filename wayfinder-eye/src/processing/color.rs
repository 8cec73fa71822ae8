//! Dominant color classification for detected regions

use crate::frame::PixelRect;
use crate::vocabulary::ColorLabel;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Transfer function of the source pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorEncoding {
    /// Gamma-encoded sRGB, classified as-is
    Srgb,
    /// Linear light, gamma-encoded before classification
    Linear,
}

/// Sampling grid step in pixels, both axes.
const SAMPLE_STRIDE: usize = 2;
/// Pixels at or below this value are too dark for a stable hue.
const MIN_VALUE: f32 = 0.15;

/// Hue, saturation, value with hue in degrees `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let h = if delta <= f32::EPSILON {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };

        let s = if max <= f32::EPSILON { 0.0 } else { delta / max };

        Self {
            h: h.rem_euclid(360.0),
            s,
            v: max,
        }
    }

    /// Map onto the palette.
    pub fn label(&self) -> ColorLabel {
        if self.s < 0.18 {
            return ColorLabel::Gray;
        }
        if self.s < 0.20 && self.v > 0.90 {
            return ColorLabel::White;
        }
        if self.v < 0.12 {
            return ColorLabel::Black;
        }

        match self.h {
            h if h < 15.0 => ColorLabel::Red,
            h if h < 45.0 => ColorLabel::Orange,
            h if h < 70.0 => ColorLabel::Yellow,
            h if h < 170.0 => ColorLabel::Green,
            h if h < 205.0 => ColorLabel::Cyan,
            h if h < 255.0 => ColorLabel::Blue,
            h if h < 295.0 => ColorLabel::Purple,
            h if h < 345.0 => ColorLabel::Pink,
            _ => ColorLabel::Red,
        }
    }
}

/// sRGB transfer function for one linear channel in `[0, 1]`.
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Classifies the dominant color of an image region by its most saturated
/// sufficiently bright pixel.
#[derive(Debug, Clone, Copy)]
pub struct ColorClassifier {
    encoding: ColorEncoding,
}

impl ColorClassifier {
    pub fn new(encoding: ColorEncoding) -> Self {
        Self { encoding }
    }

    pub fn classify(&self, image: &RgbImage, region: PixelRect) -> ColorLabel {
        let Some((x0, y0, x1, y1)) = region.clamp_to(image.width(), image.height()) else {
            return ColorLabel::Gray;
        };

        let mut best: Option<Hsv> = None;
        for y in (y0..y1).step_by(SAMPLE_STRIDE) {
            for x in (x0..x1).step_by(SAMPLE_STRIDE) {
                let hsv = self.to_hsv(image.get_pixel(x, y).0);
                if hsv.v <= MIN_VALUE {
                    continue;
                }
                if best.map_or(true, |b| hsv.s > b.s) {
                    best = Some(hsv);
                }
            }
        }

        // Every sample was near-black.
        best.map_or(ColorLabel::Black, |hsv| hsv.label())
    }

    fn to_hsv(&self, [r, g, b]: [u8; 3]) -> Hsv {
        let channel = |c: u8| {
            let c = c as f32 / 255.0;
            match self.encoding {
                ColorEncoding::Srgb => c,
                ColorEncoding::Linear => linear_to_srgb(c),
            }
        };
        Hsv::from_rgb(channel(r), channel(g), channel(b))
    }
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::new(ColorEncoding::Srgb)
    }
}
