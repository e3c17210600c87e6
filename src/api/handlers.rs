// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body of GET /
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub success: bool,
}

/// GET / - Liveness probe; touches nothing on disk
pub async fn root_handler() -> Json<HealthResponse> {
    Json(HealthResponse { success: true })
}
