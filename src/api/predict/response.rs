// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response types

use serde::{Deserialize, Serialize};

use crate::vision::Detection;

/// Response from POST /upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Annotated JPEG, base64
    pub image: String,
}

impl UploadResponse {
    pub fn new(image: String) -> Self {
        Self {
            success: true,
            image,
        }
    }
}

/// One detection as reported to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionRecord {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in original image pixels
    pub bbox: [f32; 4],
}

impl From<&Detection> for DetectionRecord {
    fn from(detection: &Detection) -> Self {
        Self {
            class_name: detection.class_name.clone(),
            confidence: detection.confidence,
            bbox: detection.bbox.to_array(),
        }
    }
}

/// Response from POST /predict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    pub detections: Vec<DetectionRecord>,
    /// Annotated JPEG, base64
    pub image: String,
}

impl PredictResponse {
    pub fn new(detections: &[Detection], image: String) -> Self {
        Self {
            success: true,
            detections: detections.iter().map(DetectionRecord::from).collect(),
            image,
        }
    }
}
