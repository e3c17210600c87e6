// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO output decoding and non-maximum suppression
//!
//! Ultralytics detection exports emit a single tensor of shape
//! `[1, 4 + nc, N]` where each of the N candidates carries
//! `cx, cy, w, h` in letterboxed pixels followed by one score per class.
//! Some converters transpose it to `[1, N, 4 + nc]`; both are accepted.

use anyhow::Result;
use ndarray::{ArrayViewD, Ix2};
use tracing::{debug, warn};

use super::labels::ClassNames;
use super::preprocessing::LetterboxInfo;
use super::{BoundingBox, Detection};

/// Ultralytics predict defaults
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

/// Thresholds applied while decoding
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}

/// Decode raw detector output into detections in original image coordinates
///
/// `num_classes` is a hint for the number of class score rows. When it is
/// `None`, or matches neither axis, the count is taken from the smaller
/// non-batch axis (YOLO always has far more anchors than classes). Class ids
/// beyond `names` render as `class_<id>`.
pub fn decode_output(
    output: ArrayViewD<f32>,
    num_classes: Option<usize>,
    letterbox: &LetterboxInfo,
    names: &ClassNames,
    params: &DecodeParams,
) -> Result<Vec<Detection>> {
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        anyhow::bail!("Unexpected detector output shape: {:?}, expected [1, 4 + nc, N]", shape);
    }

    let (rows, cols) = (shape[1], shape[2]);
    let attributes = match num_classes {
        Some(nc) if rows == nc + 4 || cols == nc + 4 => nc + 4,
        Some(nc) => {
            warn!(
                "Expected {} classes but output is {:?}; using the tensor's class count",
                nc, shape
            );
            rows.min(cols)
        }
        None => rows.min(cols),
    };

    // Normalize to [N, 4 + nc]
    let matrix = output
        .index_axis(ndarray::Axis(0), 0)
        .into_dimensionality::<Ix2>()?;
    let candidates = if rows == attributes {
        matrix.reversed_axes()
    } else if cols == attributes {
        matrix
    } else {
        anyhow::bail!(
            "Detector output {:?} does not match {} attributes per candidate",
            shape,
            attributes
        );
    };

    if attributes <= 4 {
        anyhow::bail!("Detector output has no class scores: {:?}", shape);
    }

    let orig_w = letterbox.original_width as f32;
    let orig_h = letterbox.original_height as f32;
    let mut detections = Vec::new();

    for candidate in candidates.outer_iter() {
        let (class_id, confidence) = candidate
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .fold((0usize, f32::MIN), |best, (idx, score)| {
                if score > best.1 {
                    (idx, score)
                } else {
                    best
                }
            });

        if confidence < params.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (candidate[0], candidate[1], candidate[2], candidate[3]);
        let (x1, y1) = letterbox.map_to_original(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.map_to_original(cx + w / 2.0, cy + h / 2.0);

        let bbox = BoundingBox { x1, y1, x2, y2 }.clip(orig_w, orig_h);
        if !bbox.is_valid() {
            continue;
        }

        detections.push(Detection {
            class_id,
            class_name: names.name(class_id),
            confidence: confidence.min(1.0),
            bbox,
        });
    }

    debug!("{} candidates above confidence {}", detections.len(), params.confidence_threshold);

    let mut kept = non_max_suppression(detections, params.iou_threshold);
    kept.truncate(params.max_detections);
    Ok(kept)
}

/// Class-wise non-maximum suppression
///
/// Returns survivors sorted by descending confidence.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
