//! YOLO output tensor decoding

use crate::error::VisionError;
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Values per box ahead of the class scores: cx, cy, w, h.
pub const BOX_CHANNELS: usize = 4;

/// Axis ordering of a `[1, 4 + C, N]` or `[1, N, 4 + C]` output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, 4 + C, N]`: the channel axis comes second
    AttributesFirst,
    /// `[1, N, 4 + C]`: the channel axis comes third
    BoxesFirst,
}

impl TensorLayout {
    /// Work out the layout from a tensor shape.
    ///
    /// When both axes equal `4 + C` the tensor is read as attributes-first;
    /// pin the layout in configuration to avoid relying on this.
    pub fn infer(shape: &[usize], class_count: usize) -> Result<Self, VisionError> {
        let channels = BOX_CHANNELS + class_count;
        if shape.len() != 3 || shape[0] != 1 {
            return Err(shape_mismatch(shape, channels));
        }

        if shape[1] == channels {
            Ok(TensorLayout::AttributesFirst)
        } else if shape[2] == channels {
            Ok(TensorLayout::BoxesFirst)
        } else {
            Err(shape_mismatch(shape, channels))
        }
    }

    fn channel_axis(&self) -> usize {
        match self {
            TensorLayout::AttributesFirst => 1,
            TensorLayout::BoxesFirst => 2,
        }
    }
}

/// Units of the four raw box values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxUnits {
    /// Already in [0, 1] of the model input frame
    Normalized,
    /// Pixels of the model input frame
    InputPixels,
}

/// Center-format box in normalized model-input coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// A box that survived thresholding, before grounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub class_index: usize,
    pub confidence: f32,
    pub bbox: NormalizedBox,
}

/// Turns raw detector output into candidates.
///
/// There is no non-maximum suppression: overlapping boxes of one object all
/// survive if they clear the threshold.
#[derive(Debug, Clone)]
pub struct YoloDecoder {
    layout: TensorLayout,
    class_count: usize,
    confidence_threshold: f32,
    box_units: BoxUnits,
    input_size: (u32, u32),
}

impl YoloDecoder {
    pub fn new(layout: TensorLayout, class_count: usize, confidence_threshold: f32) -> Self {
        Self {
            layout,
            class_count,
            confidence_threshold,
            box_units: BoxUnits::Normalized,
            input_size: (1, 1),
        }
    }

    /// Scale raw boxes by the model input size when they are in pixels.
    pub fn with_box_units(mut self, box_units: BoxUnits, input_size: (u32, u32)) -> Self {
        self.box_units = box_units;
        self.input_size = input_size;
        self
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Decode one output tensor. Candidate order follows the tensor's box order.
    pub fn decode(&self, output: ArrayViewD<'_, f32>) -> Result<Vec<DetectionCandidate>, VisionError> {
        let channels = BOX_CHANNELS + self.class_count;
        let shape = output.shape().to_vec();

        let output = output
            .into_dimensionality::<Ix3>()
            .map_err(|_| shape_mismatch(&shape, channels))?;

        if shape[0] != 1 || shape[self.layout.channel_axis()] != channels {
            return Err(shape_mismatch(&shape, channels));
        }

        let frame = output.index_axis_move(Axis(0), 0);
        let rows: ArrayView2<'_, f32> = match self.layout {
            TensorLayout::AttributesFirst => frame.reversed_axes(),
            TensorLayout::BoxesFirst => frame,
        };

        let (scale_x, scale_y) = match self.box_units {
            BoxUnits::Normalized => (1.0, 1.0),
            BoxUnits::InputPixels => (self.input_size.0 as f32, self.input_size.1 as f32),
        };

        let mut candidates = Vec::new();
        for row in rows.axis_iter(Axis(0)) {
            // Strict `>` keeps the lowest class index on ties.
            let (class_index, confidence) = row
                .iter()
                .skip(BOX_CHANNELS)
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |(best_idx, best), (idx, &score)| {
                    if score > best {
                        (idx, score)
                    } else {
                        (best_idx, best)
                    }
                });

            if !(confidence >= self.confidence_threshold) {
                continue;
            }

            candidates.push(DetectionCandidate {
                class_index,
                confidence,
                bbox: NormalizedBox {
                    cx: row[0] / scale_x,
                    cy: row[1] / scale_y,
                    w: row[2] / scale_x,
                    h: row[3] / scale_y,
                },
            });
        }

        debug!(
            "Decoded {} candidates from {} boxes ({:?})",
            candidates.len(),
            rows.nrows(),
            self.layout
        );
        Ok(candidates)
    }
}

/// Decode with an explicit layout and threshold.
pub fn decode(
    output: ArrayViewD<'_, f32>,
    layout: TensorLayout,
    class_count: usize,
    confidence_threshold: f32,
) -> Result<Vec<DetectionCandidate>, VisionError> {
    YoloDecoder::new(layout, class_count, confidence_threshold).decode(output)
}

fn shape_mismatch(shape: &[usize], expected_channels: usize) -> VisionError {
    VisionError::ShapeMismatch {
        shape: shape.to_vec(),
        expected_channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array3};

    /// Builds a boxes-first tensor from rows of `[cx, cy, w, h, scores...]`.
    fn boxes_first(rows: &[Vec<f32>]) -> Array3<f32> {
        let channels = rows[0].len();
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        Array3::from_shape_vec((1, rows.len(), channels), data).unwrap()
    }

    #[test]
    fn test_infer_layout() {
        assert_eq!(
            TensorLayout::infer(&[1, 84, 8400], 80).unwrap(),
            TensorLayout::AttributesFirst
        );
        assert_eq!(
            TensorLayout::infer(&[1, 8400, 84], 80).unwrap(),
            TensorLayout::BoxesFirst
        );
        assert_eq!(
            TensorLayout::infer(&[1, 84, 84], 80).unwrap(),
            TensorLayout::AttributesFirst
        );
    }

    #[test]
    fn test_infer_layout_mismatch() {
        assert!(matches!(
            TensorLayout::infer(&[1, 85, 100], 80),
            Err(VisionError::ShapeMismatch { expected_channels: 84, .. })
        ));
        assert!(TensorLayout::infer(&[84, 100], 80).is_err());
        assert!(TensorLayout::infer(&[2, 84, 100], 80).is_err());
    }

    #[test]
    fn test_decode_picks_max_class() {
        let tensor = boxes_first(&[vec![0.5, 0.5, 0.2, 0.2, 0.1, 0.9, 0.3]]);
        let candidates = decode(tensor.view().into_dyn(), TensorLayout::BoxesFirst, 3, 0.5).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_index, 1);
        assert_eq!(candidates[0].confidence, 0.9);
        assert_eq!(candidates[0].bbox.cx, 0.5);
    }

    #[test]
    fn test_decode_tie_keeps_lowest_class() {
        let tensor = boxes_first(&[vec![0.5, 0.5, 0.2, 0.2, 0.2, 0.7, 0.7]]);
        let candidates = decode(tensor.view().into_dyn(), TensorLayout::BoxesFirst, 3, 0.5).unwrap();
        assert_eq!(candidates[0].class_index, 1);
    }

    #[test]
    fn test_decode_threshold_is_inclusive() {
        let tensor = boxes_first(&[
            vec![0.1, 0.1, 0.1, 0.1, 0.5, 0.0],
            vec![0.2, 0.2, 0.1, 0.1, 0.49, 0.0],
        ]);
        let candidates = decode(tensor.view().into_dyn(), TensorLayout::BoxesFirst, 2, 0.5).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bbox.cx, 0.1);
    }

    #[test]
    fn test_decode_preserves_tensor_order() {
        let tensor = boxes_first(&[
            vec![0.1, 0.1, 0.1, 0.1, 0.6, 0.0],
            vec![0.2, 0.2, 0.1, 0.1, 0.0, 0.95],
            vec![0.3, 0.3, 0.1, 0.1, 0.8, 0.0],
        ]);
        let candidates = decode(tensor.view().into_dyn(), TensorLayout::BoxesFirst, 2, 0.5).unwrap();
        let xs: Vec<f32> = candidates.iter().map(|c| c.bbox.cx).collect();
        assert_eq!(xs, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_decode_attributes_first_matches_transpose() {
        let boxes = boxes_first(&[
            vec![0.1, 0.2, 0.3, 0.4, 0.7, 0.1],
            vec![0.5, 0.6, 0.1, 0.1, 0.2, 0.8],
        ]);
        let attrs = boxes.view().permuted_axes([0, 2, 1]).to_owned();
        assert_eq!(attrs.shape(), &[1, 6, 2]);

        let a = decode(attrs.view().into_dyn(), TensorLayout::AttributesFirst, 2, 0.5).unwrap();
        let b = decode(boxes.view().into_dyn(), TensorLayout::BoxesFirst, 2, 0.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_empty_tensor() {
        let tensor = Array::<f32, _>::zeros((1, 84, 0));
        let candidates = decode(tensor.view().into_dyn(), TensorLayout::AttributesFirst, 80, 0.5).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_decode_wrong_channel_count() {
        let tensor = Array::<f32, _>::zeros((1, 10, 85));
        let result = decode(tensor.view().into_dyn(), TensorLayout::BoxesFirst, 80, 0.5);
        assert!(matches!(result, Err(VisionError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_decode_wrong_rank() {
        let tensor = Array::<f32, _>::zeros((84, 10));
        let result = decode(tensor.view().into_dyn(), TensorLayout::AttributesFirst, 80, 0.5);
        assert!(matches!(result, Err(VisionError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_decode_input_pixel_units() {
        let tensor = boxes_first(&[vec![208.0, 104.0, 41.6, 20.8, 0.9]]);
        let decoder = YoloDecoder::new(TensorLayout::BoxesFirst, 1, 0.5)
            .with_box_units(BoxUnits::InputPixels, (416, 208));
        let candidates = decoder.decode(tensor.view().into_dyn()).unwrap();
        let bbox = candidates[0].bbox;
        assert!((bbox.cx - 0.5).abs() < 1e-6);
        assert!((bbox.cy - 0.5).abs() < 1e-6);
        assert!((bbox.w - 0.1).abs() < 1e-6);
        assert!((bbox.h - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_decode_nan_scores_never_win() {
        let tensor = boxes_first(&[vec![0.5, 0.5, 0.1, 0.1, f32::NAN, f32::NAN]]);
        let candidates = decode(tensor.view().into_dyn(), TensorLayout::BoxesFirst, 2, 0.0).unwrap();
        assert!(candidates.is_empty());
    }
}
