// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::inference::PoolError;
use crate::vision::ImageError;

/// Wire format for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
    pub request_id: Option<String>,
}

/// Everything that can go wrong while handling an upload
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("inference failed: {0}")]
    InferenceFailure(String),

    #[error("inference timed out after {}s", .0.as_secs_f32())]
    InferenceTimeout(Duration),

    #[error("cleanup failed: {0}")]
    CleanupFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DetectError {
    pub fn error_type(&self) -> &'static str {
        match self {
            DetectError::InvalidUpload(_) => "invalid_upload",
            DetectError::InferenceFailure(_) => "inference_failure",
            DetectError::InferenceTimeout(_) => "inference_timeout",
            DetectError::CleanupFailure(_) => "cleanup_failure",
            DetectError::Storage(_) => "storage_failure",
        }
    }

    /// All failures share one status so existing clients keep working;
    /// `error_type` carries the distinction.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn to_response(&self, request_id: Option<Uuid>) -> ErrorResponse {
        ErrorResponse {
            detail: format!("Error processing file: {}", self),
            error_type: self.error_type().to_string(),
            request_id: request_id.map(|id| id.to_string()),
        }
    }

    pub fn with_request(self, request_id: Uuid) -> RequestError {
        RequestError {
            error: self,
            request_id: Some(request_id),
        }
    }
}

impl From<ImageError> for DetectError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::EncodeFailed(msg) => DetectError::Storage(msg),
            other => DetectError::InvalidUpload(other.to_string()),
        }
    }
}

impl From<PoolError> for DetectError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(after) => DetectError::InferenceTimeout(after),
            other => DetectError::InferenceFailure(other.to_string()),
        }
    }
}

/// A failure tagged with the request it belongs to, ready to render
#[derive(Debug)]
pub struct RequestError {
    pub error: DetectError,
    pub request_id: Option<Uuid>,
}

impl From<DetectError> for RequestError {
    fn from(error: DetectError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = self.error.to_response(self.request_id);
        (self.error.status_code(), Json(body)).into_response()
    }
}
