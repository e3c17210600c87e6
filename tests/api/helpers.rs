// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixtures for the HTTP endpoint tests
//!
//! A scripted detector stands in for the ONNX model so the full request
//! lifecycle runs without a model file.

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response},
    Router,
};
use buglens_node::{
    api::http_server::{create_app, AppState},
    config::ServerConfig,
    inference::{InferencePool, PoolConfig},
    pipeline::{DetectionPipeline, PipelineConfig},
    vision::{Annotator, BoundingBox, Detection, ObjectDetector},
};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const BOUNDARY: &str = "buglens-test-boundary";

/// Detector that returns canned results
pub struct ScriptedDetector {
    /// Class reported for the single detection; `None` means no detections
    pub class_name: Option<String>,
    /// Name the class after the image width, so concurrent requests differ
    pub class_from_width: bool,
    pub delay: Duration,
    pub fail: bool,
}

impl ScriptedDetector {
    pub fn single(class_name: &str) -> Self {
        Self {
            class_name: Some(class_name.to_string()),
            class_from_width: false,
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            class_name: None,
            class_from_width: false,
            delay: Duration::ZERO,
            fail: false,
        }
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            anyhow::bail!("scripted detector failure");
        }

        let (w, h) = image.dimensions();
        let class_name = if self.class_from_width {
            format!("w{}", w)
        } else {
            match &self.class_name {
                Some(name) => name.clone(),
                None => return Ok(Vec::new()),
            }
        };

        Ok(vec![Detection {
            class_id: 0,
            class_name,
            confidence: 0.87,
            bbox: BoundingBox {
                x1: w as f32 * 0.25,
                y1: h as f32 * 0.25,
                x2: w as f32 * 0.75,
                y2: h as f32 * 0.75,
            },
        }])
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

/// App wired to a scripted detector and throwaway directory roots
pub struct TestApp {
    pub app: Router,
    pub upload_dir: PathBuf,
    pub runs_dir: PathBuf,
    _root: TempDir,
}

impl TestApp {
    pub fn new(detector: ScriptedDetector) -> Self {
        Self::with_pool(detector, PoolConfig::default())
    }

    pub fn with_pool(detector: ScriptedDetector, pool: PoolConfig) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let upload_dir = root.path().join("temp");
        let runs_dir = root.path().join("runs");
        std::fs::create_dir_all(&upload_dir).unwrap();
        std::fs::create_dir_all(&runs_dir).unwrap();

        let mut config = ServerConfig::default();
        config.upload_dir = upload_dir.clone();
        config.runs_dir = runs_dir.clone();
        config.max_concurrent_inferences = pool.max_concurrent;

        let pipeline = DetectionPipeline::new(
            Arc::new(detector),
            Annotator::new(config.jpeg_quality),
            InferencePool::new(pool),
            PipelineConfig {
                upload_dir: upload_dir.clone(),
                runs_dir: runs_dir.clone(),
                max_upload_bytes: config.max_upload_bytes,
            },
        );

        Self {
            app: create_app(AppState::new(pipeline, config)),
            upload_dir,
            runs_dir,
            _root: root,
        }
    }

    /// Both roots exist and hold nothing
    pub fn assert_clean(&self) {
        assert_empty_dir(&self.upload_dir);
        assert_empty_dir(&self.runs_dir);
    }
}

pub fn assert_empty_dir(path: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "{} not empty: {:?}", path.display(), leftovers);
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgb8(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Build a multipart body with one file field
pub fn multipart_body(field: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn image_request(uri: &str, bytes: &[u8]) -> Request<Body> {
    upload_request(uri, multipart_body("file", "photo.png", "image/png", bytes))
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Decode the base64 `image` field and return its dimensions and format
pub fn decode_image_field(json: &serde_json::Value) -> (u32, u32, ImageFormat) {
    use base64::Engine;
    let b64 = json["image"].as_str().expect("image field");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .expect("valid base64");
    let format = image::guess_format(&bytes).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    (img.width(), img.height(), format)
}
