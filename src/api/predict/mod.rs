// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection API endpoints
//!
//! Provides POST /upload and POST /predict for multipart image uploads.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{predict_handler, upload_handler};
pub use request::read_upload;
pub use response::{DetectionRecord, PredictResponse, UploadResponse};
