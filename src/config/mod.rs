// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Every option is a CLI flag that can also be set through a `BUGLENS_*`
//! environment variable (or a `.env` file loaded at startup).

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::inference::PoolConfig;
use crate::vision::detection::postprocess::DecodeParams;
use crate::vision::detection::ModelLoadOptions;
use crate::vision::image_utils::DEFAULT_MAX_IMAGE_SIZE;

/// Object detection over HTTP
#[derive(Parser, Debug, Clone)]
#[command(name = "buglens-node")]
#[command(about = "Serve a YOLO object detector over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "BUGLENS_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: SocketAddr,

    /// Path to the YOLO ONNX model, relative to the working directory
    #[arg(long, env = "BUGLENS_MODEL_PATH", default_value = "model.onnx")]
    pub model_path: PathBuf,

    /// Labels file (one class per line); overrides names embedded in the model
    #[arg(long, env = "BUGLENS_LABELS_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Root directory for per-request upload scratch space
    #[arg(long, env = "BUGLENS_UPLOAD_DIR", default_value = "temp")]
    pub upload_dir: PathBuf,

    /// Root directory for per-request annotated output
    #[arg(long, env = "BUGLENS_RUNS_DIR", default_value = "runs")]
    pub runs_dir: PathBuf,

    /// Minimum class confidence for a detection to be reported
    #[arg(long, env = "BUGLENS_CONFIDENCE", default_value_t = 0.25)]
    pub confidence_threshold: f32,

    /// IoU above which overlapping boxes of the same class are suppressed
    #[arg(long, env = "BUGLENS_IOU", default_value_t = 0.45)]
    pub iou_threshold: f32,

    /// Maximum detections returned per image
    #[arg(long, env = "BUGLENS_MAX_DETECTIONS", default_value_t = 300)]
    pub max_detections: usize,

    /// Square model input size in pixels
    #[arg(long, env = "BUGLENS_INPUT_SIZE", default_value_t = 640)]
    pub input_size: u32,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "BUGLENS_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// ONNX graph optimization level (0-3)
    #[arg(long, env = "BUGLENS_OPT_LEVEL", default_value_t = 3)]
    pub optimization_level: u8,

    /// Inferences allowed to run at once
    #[arg(long, env = "BUGLENS_MAX_CONCURRENT_INFERENCES", default_value_t = 2)]
    pub max_concurrent_inferences: usize,

    /// Seconds a request may wait for and run inference
    #[arg(long, env = "BUGLENS_INFERENCE_TIMEOUT_SECS", default_value_t = 30)]
    pub inference_timeout_secs: u64,

    /// Largest accepted upload in bytes
    #[arg(long, env = "BUGLENS_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
    pub max_upload_bytes: usize,

    /// Allowed CORS origins, comma separated
    #[arg(
        long,
        env = "BUGLENS_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,

    /// TTF/OTF font used for label text on annotated images
    #[arg(long, env = "BUGLENS_FONT_PATH")]
    pub font_path: Option<PathBuf>,

    /// JPEG quality of annotated images (1-100)
    #[arg(long, env = "BUGLENS_JPEG_QUALITY", default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Emit logs as JSON
    #[arg(long, env = "BUGLENS_LOG_JSON")]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["buglens-node"])
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!("IoU threshold must be within [0, 1], got {}", self.iou_threshold);
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            anyhow::bail!(
                "input size must be a positive multiple of 32, got {}",
                self.input_size
            );
        }
        if self.max_detections == 0 {
            anyhow::bail!("max detections must be at least 1");
        }
        if self.max_concurrent_inferences == 0 {
            anyhow::bail!("max concurrent inferences must be at least 1");
        }
        if self.inference_timeout_secs == 0 {
            anyhow::bail!("inference timeout must be at least 1 second");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max upload bytes must be positive");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            anyhow::bail!("JPEG quality must be within [1, 100], got {}", self.jpeg_quality);
        }
        if self.cors_origins.iter().all(|o| o.trim().is_empty()) {
            anyhow::bail!("at least one CORS origin is required");
        }
        Ok(())
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// Options handed to the model loader at its single call site
    pub fn model_load_options(&self) -> ModelLoadOptions {
        ModelLoadOptions {
            intra_threads: self.intra_threads,
            optimization_level: self.optimization_level,
            input_size: self.input_size,
            labels_path: self.labels_path.clone(),
            decode: DecodeParams {
                confidence_threshold: self.confidence_threshold,
                iou_threshold: self.iou_threshold,
                max_detections: self.max_detections,
            },
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_concurrent: self.max_concurrent_inferences,
            timeout: self.inference_timeout(),
        }
    }
}
