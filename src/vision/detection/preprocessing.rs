// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the YOLO detector

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Default square input size for YOLO exports
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox fill value (matches Ultralytics)
pub const PAD_VALUE: u8 = 114;

/// Preprocess an image for detection
///
/// Steps:
/// 1. Letterbox to `input_size` x `input_size` (aspect ratio preserved, centered)
/// 2. Convert to RGB
/// 3. Scale to [0, 1]
/// 4. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess_for_detection(image: &DynamicImage, input_size: u32) -> (Array4<f32>, LetterboxInfo) {
    let info = LetterboxInfo::new(image, input_size);
    let letterboxed = letterbox(image, &info);

    let size = input_size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in letterboxed.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, info)
}

/// Resize with aspect ratio preservation and pad with `PAD_VALUE`
pub fn letterbox(image: &DynamicImage, info: &LetterboxInfo) -> RgbImage {
    let target = info.target_size;
    let mut output = RgbImage::from_pixel(target, target, Rgb([PAD_VALUE; 3]));

    if info.original_width == 0 || info.original_height == 0 {
        return output;
    }

    let resized = image
        .resize_exact(info.scaled_width, info.scaled_height, FilterType::Triangle)
        .to_rgb8();

    image::imageops::replace(
        &mut output,
        &resized,
        info.offset_x as i64,
        info.offset_y as i64,
    );

    output
}

/// Scaling factor and offsets used during letterboxing
///
/// Needed to map detector output back to original coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// Scale factor applied
    pub scale: f32,
    /// X offset from padding
    pub offset_x: u32,
    /// Y offset from padding
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub target_size: u32,
    /// Original image width
    pub original_width: u32,
    /// Original image height
    pub original_height: u32,
}

impl LetterboxInfo {
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();
        Self::from_dimensions(orig_w, orig_h, target_size)
    }

    pub fn from_dimensions(orig_w: u32, orig_h: u32, target_size: u32) -> Self {
        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                scaled_width: 0,
                scaled_height: 0,
                target_size,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
            scaled_width: new_w,
            scaled_height: new_h,
            target_size,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a coordinate from letterboxed space back to original image space
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (orig_x, orig_y)
    }
}
