//! Image to model-input conversion

use crate::error::VisionError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Resize `image` to the model input and lay it out as `[1, 3, H, W]` RGB in `[0, 1]`.
pub fn image_to_input_tensor(image: &RgbImage, input_size: (u32, u32)) -> Result<Array4<f32>, VisionError> {
    let (width, height) = input_size;
    if width == 0 || height == 0 {
        return Err(VisionError::Config("Model input size cannot be zero".to_string()));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(VisionError::MissingSource);
    }

    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        resized = imageops::resize(image, width, height, FilterType::Triangle);
        &resized
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in source.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel.0[channel] as f32 / 255.0;
        }
    }
    Ok(tensor)
}
