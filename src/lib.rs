// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod inference;
pub mod pipeline;
pub mod version;
pub mod vision;
pub mod workspace;

pub use api::{create_app, start_server, AppState, DetectError, RequestError};
pub use config::ServerConfig;
pub use inference::{InferencePool, PoolConfig, PoolError};
pub use pipeline::{DetectionOutcome, DetectionPipeline, PipelineConfig, UploadedImage};
pub use workspace::RequestWorkspace;
