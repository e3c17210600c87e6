// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use buglens_node::{
    api::{start_server, AppState},
    config::ServerConfig,
    inference::InferencePool,
    pipeline::{DetectionPipeline, PipelineConfig},
    vision::{Annotator, ObjectDetector, YoloDetector},
};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    let config = ServerConfig::parse();
    init_tracing(config.log_json);

    println!("🚀 Starting BugLens Node...\n");
    println!("📦 BUILD VERSION: {}", buglens_node::version::VERSION);
    println!("📅 Build Date: {}", buglens_node::version::BUILD_DATE);
    println!();
    info!("{}", buglens_node::version::get_version_string());
    debug!("Build info: {}", buglens_node::version::get_version_info());

    config.validate().context("invalid configuration")?;

    for dir in [&config.upload_dir, &config.runs_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    // Single place the model is loaded; options are scoped to this call
    println!("🧠 Loading detection model from {}...", config.model_path.display());
    let detector = YoloDetector::load(&config.model_path, &config.model_load_options())
        .with_context(|| format!("failed to load model {}", config.model_path.display()))?;
    info!(
        "Model {} loaded with {} classes",
        detector.name(),
        detector.class_names().len()
    );
    println!("✅ Detection model loaded");

    let mut annotator = Annotator::new(config.jpeg_quality);
    if let Some(font) = &config.font_path {
        annotator = annotator
            .with_font_file(font)
            .with_context(|| format!("failed to load font {}", font.display()))?;
    }

    let pool = InferencePool::new(config.pool_config());
    let pipeline = DetectionPipeline::new(
        Arc::new(detector),
        annotator,
        pool,
        PipelineConfig {
            upload_dir: config.upload_dir.clone(),
            runs_dir: config.runs_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        },
    );

    info!(
        "Inference pool: {} concurrent, {:?} timeout",
        config.max_concurrent_inferences,
        config.inference_timeout()
    );
    println!("🌐 Listening on http://{}", config.listen_addr);

    start_server(AppState::new(pipeline, config)).await?;

    println!("👋 BugLens Node stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
