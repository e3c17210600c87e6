// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload → inference → cleanup lifecycle for one request

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::errors::{DetectError, RequestError};
use crate::inference::InferencePool;
use crate::vision::annotate::Annotator;
use crate::vision::detection::{Detection, ObjectDetector};
use crate::vision::image_utils::{decode_image_bytes, encode_base64, format_to_extension, sniff_upload};
use crate::workspace::RequestWorkspace;

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied name; logged, never used as a path
    pub original_filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of one processed upload
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub request_id: Uuid,
    pub detections: Vec<Detection>,
    /// Annotated JPEG, base64 (standard alphabet, padded)
    pub image_base64: String,
    pub processing_time_ms: u64,
}

/// Filesystem roots and limits for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub upload_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// Runs the request lifecycle against a shared detector
#[derive(Clone)]
pub struct DetectionPipeline {
    detector: Arc<dyn ObjectDetector>,
    annotator: Arc<Annotator>,
    pool: InferencePool,
    config: PipelineConfig,
}

impl std::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("detector", &self.detector.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        annotator: Annotator,
        pool: InferencePool,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            annotator: Arc::new(annotator),
            pool,
            config,
        }
    }

    pub fn pool(&self) -> &InferencePool {
        &self.pool
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one upload end to end
    ///
    /// Both scratch directories are gone when this returns, whatever the outcome.
    pub async fn process(&self, upload: UploadedImage) -> Result<DetectionOutcome, RequestError> {
        let start = Instant::now();

        let workspace = RequestWorkspace::acquire(&self.config.upload_dir, &self.config.runs_dir)
            .map_err(|e| DetectError::Storage(format!("failed to create workspace: {}", e)))?;
        let request_id = workspace.request_id();

        info!(
            request_id = %request_id,
            filename = upload.original_filename.as_deref().unwrap_or("<none>"),
            bytes = upload.bytes.len(),
            "Processing upload"
        );

        let gate = ArtifactGate::default();
        let result = self.run_in_workspace(&workspace, upload, &gate).await;

        // A job still running after a timeout must not write into a directory being removed
        gate.close().await;

        // Release even on failure; the first error wins
        let released = workspace.release();
        let (detections, image_base64) = match (result, released) {
            (Ok(output), Ok(())) => output,
            (Ok(_), Err(e)) => {
                warn!(request_id = %request_id, "Cleanup failed: {}", e);
                return Err(DetectError::CleanupFailure(e.to_string()).with_request(request_id));
            }
            (Err(e), released) => {
                if let Err(cleanup) = released {
                    warn!(request_id = %request_id, "Cleanup after failure also failed: {}", cleanup);
                }
                warn!(request_id = %request_id, error_type = e.error_type(), "Request failed: {}", e);
                return Err(e.with_request(request_id));
            }
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            request_id = %request_id,
            detections = detections.len(),
            processing_time_ms,
            "Upload processed"
        );

        Ok(DetectionOutcome {
            request_id,
            detections,
            image_base64,
            processing_time_ms,
        })
    }

    async fn run_in_workspace(
        &self,
        workspace: &RequestWorkspace,
        upload: UploadedImage,
        gate: &ArtifactGate,
    ) -> Result<(Vec<Detection>, String), DetectError> {
        // 1. Persist under an internal name derived from the sniffed format
        let format = sniff_upload(&upload.bytes, self.config.max_upload_bytes)?;
        let input_path = workspace.input_path(format_to_extension(format));
        tokio::fs::write(&input_path, &upload.bytes)
            .await
            .map_err(|e| DetectError::Storage(format!("failed to persist upload: {}", e)))?;
        drop(upload);

        // 2-3. Inference and annotated artifact, off the async executor
        let detector = self.detector.clone();
        let annotator = self.annotator.clone();
        let run_dir = workspace.run_dir().to_path_buf();
        let stem = workspace.request_id().to_string();
        let max_bytes = self.config.max_upload_bytes;
        let gate = gate.clone();

        let (detections, artifact) = self
            .pool
            .run(move || {
                infer_and_annotate(
                    detector.as_ref(),
                    &annotator,
                    &gate,
                    &input_path,
                    &run_dir,
                    &stem,
                    max_bytes,
                )
            })
            .await??;

        // 4. Read the artifact back
        let annotated = tokio::fs::read(&artifact)
            .await
            .map_err(|e| DetectError::Storage(format!("failed to read {}: {}", artifact.display(), e)))?;
        debug!("Annotated artifact {} is {} bytes", artifact.display(), annotated.len());

        Ok((detections, encode_base64(&annotated)))
    }
}

/// Guards the run directory against writes once the request has moved on
///
/// The blocking job holds the lock for the whole save; the request closes the
/// gate before releasing its workspace.
#[derive(Debug, Clone, Default)]
struct ArtifactGate {
    closed: Arc<tokio::sync::Mutex<bool>>,
}

impl ArtifactGate {
    async fn close(&self) {
        *self.closed.lock().await = true;
    }
}

/// Blocking part of the lifecycle, run on the inference pool
fn infer_and_annotate(
    detector: &dyn ObjectDetector,
    annotator: &Annotator,
    gate: &ArtifactGate,
    input_path: &Path,
    run_dir: &Path,
    stem: &str,
    max_bytes: usize,
) -> Result<(Vec<Detection>, PathBuf), DetectError> {
    let bytes = std::fs::read(input_path)
        .map_err(|e| DetectError::Storage(format!("failed to read upload back: {}", e)))?;
    let (image, info) = decode_image_bytes(&bytes, max_bytes)?;
    debug!("Decoded {}x{} {:?}", info.width, info.height, info.format);

    let detections = detector
        .detect(&image)
        .map_err(|e| DetectError::InferenceFailure(format!("{:#}", e)))?;

    let closed = gate.closed.blocking_lock();
    if *closed {
        debug!("Request already finished; discarding annotated output");
        return Err(DetectError::InferenceFailure(
            "request finished before annotation".to_string(),
        ));
    }
    let artifact = annotator
        .save(&image, &detections, run_dir, stem)
        .map_err(|e| DetectError::Storage(format!("{:#}", e)))?;
    drop(closed);

    Ok((detections, artifact))
}
