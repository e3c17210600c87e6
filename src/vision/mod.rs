// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for uploaded images
//!
//! This module provides:
//! - Upload sniffing, decoding and JPEG/base64 encoding
//! - YOLO object detection over ONNX Runtime (CPU)
//! - Annotated output rendering

pub mod annotate;
pub mod detection;
pub mod image_utils;

pub use annotate::Annotator;
pub use detection::{BoundingBox, Detection, ObjectDetector, YoloDetector};
pub use image_utils::{
    decode_image_bytes, detect_format, encode_base64, encode_jpeg, format_to_extension,
    sniff_upload, ImageError, ImageInfo, DEFAULT_MAX_IMAGE_SIZE,
};
