// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Render detections onto the uploaded image and persist the result

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::detection::Detection;
use super::image_utils::encode_jpeg;

/// Subdirectory of a run directory holding annotated output
pub const PREDICT_SUBDIR: &str = "predict";

const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Per-class colours, cycled by class index
const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [52, 69, 147],
    [203, 56, 255],
];

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws boxes (and labels when a font is available) and writes JPEGs
pub struct Annotator {
    font: Option<FontVec>,
    jpeg_quality: u8,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl Annotator {
    /// Boxes only, no label text
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            font: None,
            jpeg_quality,
        }
    }

    /// Load a TTF/OTF font for label text
    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow::anyhow!("Invalid font file {}", path.display()))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Return a copy of `image` with every detection drawn on it
    pub fn render(&self, image: &DynamicImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.to_rgb8();
        let (w, h) = canvas.dimensions();
        if w == 0 || h == 0 {
            return canvas;
        }

        for det in detections {
            let color = class_color(det.class_id);
            let x1 = det.bbox.x1.floor() as i32;
            let y1 = det.bbox.y1.floor() as i32;
            let x2 = (det.bbox.x2.ceil() as i32).min(w as i32 - 1);
            let y2 = (det.bbox.y2.ceil() as i32).min(h as i32 - 1);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            for t in 0..BOX_THICKNESS {
                let bw = x2 - x1 - 2 * t;
                let bh = y2 - y1 - 2 * t;
                if bw <= 0 || bh <= 0 {
                    break;
                }
                let rect = Rect::at(x1 + t, y1 + t).of_size(bw as u32 + 1, bh as u32 + 1);
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }

            if let Some(font) = &self.font {
                self.draw_label(&mut canvas, font, det, x1, y1, color);
            }
        }

        canvas
    }

    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        font: &FontVec,
        det: &Detection,
        x: i32,
        y: i32,
        color: Rgb<u8>,
    ) {
        let label = format!("{} {:.2}", det.class_name, det.confidence);
        let scale = PxScale::from(LABEL_FONT_SIZE);
        let (text_w, text_h) = text_size(scale, font, &label);
        let box_h = text_h as i32 + 2 * LABEL_PADDING;

        // Above the box when there is room, otherwise just inside it
        let top = if y - box_h >= 0 { y - box_h } else { y };
        draw_filled_rect_mut(
            canvas,
            Rect::at(x, top).of_size(text_w + 2 * LABEL_PADDING as u32, box_h as u32),
            color,
        );
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            x + LABEL_PADDING,
            top + LABEL_PADDING,
            scale,
            font,
            &label,
        );
    }

    /// Render and save as `<run_dir>/predict/<stem>.jpg`, returning the path
    pub fn save(
        &self,
        image: &DynamicImage,
        detections: &[Detection],
        run_dir: &Path,
        stem: &str,
    ) -> Result<PathBuf> {
        let rendered = DynamicImage::ImageRgb8(self.render(image, detections));
        let jpeg = encode_jpeg(&rendered, self.jpeg_quality)?;

        // The run dir must already exist; never recreate one that was released
        let out_dir = run_dir.join(PREDICT_SUBDIR);
        match std::fs::create_dir(&out_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", out_dir.display()))
            }
        }

        let out_path = out_dir.join(format!("{}.jpg", stem));
        std::fs::write(&out_path, jpeg)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;

        debug!("Annotated image saved to {}", out_path.display());
        Ok(out_path)
    }
}
