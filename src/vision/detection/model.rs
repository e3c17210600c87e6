// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO object detection model (ONNX Runtime, CPU)

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::labels::ClassNames;
use super::postprocess::{decode_output, DecodeParams};
use super::preprocessing::{preprocess_for_detection, DEFAULT_INPUT_SIZE};
use super::{Detection, ObjectDetector};

/// Metadata key Ultralytics writes the class table under
const NAMES_METADATA_KEY: &str = "names";

/// Everything the loader needs, passed explicitly at the one call site
/// that builds the session. Nothing here touches process-wide state.
#[derive(Debug, Clone)]
pub struct ModelLoadOptions {
    /// Intra-op thread count for the ONNX session
    pub intra_threads: usize,
    /// Graph optimization level (0-3)
    pub optimization_level: u8,
    /// Square model input size
    pub input_size: u32,
    /// Optional labels file overriding model metadata
    pub labels_path: Option<PathBuf>,
    /// Decode thresholds
    pub decode: DecodeParams,
}

impl Default for ModelLoadOptions {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            optimization_level: 3,
            input_size: DEFAULT_INPUT_SIZE,
            labels_path: None,
            decode: DecodeParams::default(),
        }
    }
}

impl ModelLoadOptions {
    fn graph_optimization_level(&self) -> GraphOptimizationLevel {
        match self.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        }
    }
}

/// YOLO detector backed by an ONNX Runtime session
///
/// Loaded once at startup and shared across requests. The session sits
/// behind a mutex; concurrency is bounded upstream by the inference pool.
#[derive(Clone)]
pub struct YoloDetector {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    input_size: u32,
    /// Number of classes, when known from labels
    num_classes: Option<usize>,
    names: ClassNames,
    decode: DecodeParams,
    model_name: String,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("num_classes", &self.num_classes)
            .field("decode", &self.decode)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load the detector from an ONNX file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    /// - Model has unexpected input/output ranks
    /// - The labels file is given but unreadable
    pub fn load<P: AsRef<Path>>(model_path: P, options: &ModelLoadOptions) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(options.graph_optimization_level())
            .context("Failed to set optimization level")?
            .with_intra_threads(options.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("Failed to load detection model from {}", model_path.display())
            })?;

        if session.inputs.len() != 1 {
            anyhow::bail!(
                "Detection model must have exactly one input, found {}",
                session.inputs.len()
            );
        }
        let input_name = session.inputs[0].name.clone();
        debug!("Detection model input: {} {:?}", input_name, session.inputs[0].input_type);

        if let Some(shape) = session.inputs[0].input_type.tensor_shape() {
            if shape.len() != 4 {
                anyhow::bail!("Detection model input must be rank 4 (NCHW), got {:?}", shape);
            }
        }

        let output_classes = match session.outputs.first() {
            Some(output) => match output.output_type.tensor_shape() {
                Some(shape) if shape.len() != 3 => anyhow::bail!(
                    "Detection model output must be rank 3 ([1, 4 + nc, N]), got {:?}",
                    shape
                ),
                Some(shape) => class_count_from_shape(shape[1], shape[2]),
                None => None,
            },
            None => anyhow::bail!("Detection model has no outputs"),
        };

        let names = match &options.labels_path {
            Some(path) => ClassNames::from_file(path)?,
            None => Self::names_from_metadata(&session).unwrap_or_else(|| {
                warn!("No class names in model metadata and no labels file; using class_<id>");
                ClassNames::default()
            }),
        };
        // The output tensor, not the label table, decides the class count
        let num_classes = output_classes;
        match num_classes {
            Some(nc) if !names.is_empty() && names.len() != nc => warn!(
                "Model has {} classes but {} names were found; unnamed ids use class_<id>",
                nc,
                names.len()
            ),
            Some(_) => {}
            None => debug!("Detection output shape is dynamic; class count read per inference"),
        }

        let model_name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        info!(
            "✅ Detection model {} loaded (CPU-only, {} classes, input {}px)",
            model_name,
            names.len(),
            options.input_size
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            input_size: options.input_size,
            num_classes,
            names,
            decode: options.decode,
            model_name,
        })
    }

    fn names_from_metadata(session: &Session) -> Option<ClassNames> {
        let metadata = session.metadata().ok()?;
        let raw = metadata.custom(NAMES_METADATA_KEY).ok()??;
        ClassNames::from_ultralytics_metadata(&raw)
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.names
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let start = Instant::now();
        let (input, letterbox) = preprocess_for_detection(image, self.input_size);

        let input_value =
            Value::from_array(input).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Detection session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Detection inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        debug!("Detection output shape: {:?}", output_tensor.shape());

        let detections = decode_output(
            output_tensor.view(),
            self.num_classes,
            &letterbox,
            &self.names,
            &self.decode,
        )?;

        debug!(
            "Detected {} objects in {}ms",
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(detections)
    }

    fn name(&self) -> String {
        self.model_name.clone()
    }
}

/// Class count from a static `[1, a, b]` output, where the smaller axis is `4 + nc`
fn class_count_from_shape(a: i64, b: i64) -> Option<usize> {
    if a <= 0 || b <= 0 {
        return None;
    }
    let attributes = a.min(b) as usize;
    (attributes > 4).then(|| attributes - 4)
}
