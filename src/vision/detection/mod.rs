// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection for uploaded images
//!
//! This module wraps a YOLO detector exported to ONNX and runs it on CPU.
//!
//! Components:
//! - `model` - ONNX session wrapper and explicit load options
//! - `preprocessing` - Letterbox resize and NCHW tensor conversion
//! - `postprocess` - YOLO head decoding and class-wise NMS
//! - `labels` - Class name resolution (labels file or model metadata)

pub mod labels;
pub mod model;
pub mod postprocess;
pub mod preprocessing;

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub use labels::ClassNames;
pub use model::{ModelLoadOptions, YoloDetector};

/// Axis-aligned box in original image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// A box is usable when it has positive extent on both axes
    pub fn is_valid(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clip to `[0, width] x [0, height]`
    pub fn clip(&self, width: f32, height: f32) -> BoundingBox {
        BoundingBox {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// One recognized object instance
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class index as emitted by the model
    pub class_id: usize,
    /// Resolved class label
    pub class_name: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Location in original image space
    pub bbox: BoundingBox,
}

/// A detector that turns a decoded image into detections
///
/// Implementations are blocking; callers run them on the inference pool.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectDetector: Send + Sync {
    /// Run detection on an image, returning boxes in original pixel coordinates
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// Short model name for logs
    fn name(&self) -> String;
}
