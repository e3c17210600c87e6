// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction

use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use tracing::debug;

use crate::api::errors::DetectError;
use crate::pipeline::UploadedImage;

/// Form field clients are expected to use
pub const UPLOAD_FIELD: &str = "file";

/// Turn an extractor rejection (e.g. a non-multipart `Content-Type`) into the
/// regular error body instead of axum's plain-text 400
pub fn accept_multipart(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Multipart, DetectError> {
    multipart.map_err(|rejection| {
        DetectError::InvalidUpload(format!("expected multipart/form-data: {}", rejection))
    })
}

/// Pull the uploaded file out of a multipart body
///
/// Takes the `file` field, or failing that the first field that carries a
/// filename. Only that field's bytes are buffered.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadedImage, DetectError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DetectError::InvalidUpload(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);

        if name.as_deref() != Some(UPLOAD_FIELD) && filename.is_none() {
            debug!("Skipping multipart field {:?}", name);
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| DetectError::InvalidUpload(format!("failed to read upload: {}", e)))?;

        return Ok(UploadedImage {
            original_filename: filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(DetectError::InvalidUpload(format!(
        "no '{}' field in multipart body",
        UPLOAD_FIELD
    )))
}
