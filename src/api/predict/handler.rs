// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handlers

use axum::{extract::State, Json};
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use tracing::info;

use super::request::{accept_multipart, read_upload};
use super::response::{PredictResponse, UploadResponse};
use crate::api::errors::RequestError;
use crate::api::http_server::AppState;

/// POST /upload - Annotate an uploaded image
///
/// Returns only the annotated image.
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, RequestError> {
    let upload = read_upload(accept_multipart(multipart)?).await?;
    let outcome = state.pipeline.process(upload).await?;

    info!(
        request_id = %outcome.request_id,
        "Upload complete: {} detections in {}ms",
        outcome.detections.len(),
        outcome.processing_time_ms
    );

    Ok(Json(UploadResponse::new(outcome.image_base64)))
}

/// POST /predict - Detect objects in an uploaded image
///
/// Returns the detections alongside the annotated image.
pub async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, RequestError> {
    let upload = read_upload(accept_multipart(multipart)?).await?;
    let outcome = state.pipeline.process(upload).await?;

    info!(
        request_id = %outcome.request_id,
        "Predict complete: {} detections in {}ms",
        outcome.detections.len(),
        outcome.processing_time_ms
    );

    Ok(Json(PredictResponse::new(
        &outcome.detections,
        outcome.image_base64,
    )))
}
