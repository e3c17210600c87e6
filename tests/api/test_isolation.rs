// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Concurrency and timeout tests
//!
//! These tests verify that:
//! - Concurrent requests never see each other's files or results
//! - A detector slower than the timeout yields inference_timeout
//! - Directories are cleaned up in both cases

use super::helpers::*;
use axum::http::StatusCode;
use buglens_node::inference::PoolConfig;
use futures::future::join_all;
use image::ImageFormat;
use std::time::Duration;
use tower::util::ServiceExt;

#[cfg(test)]
mod isolation_tests {
    use super::*;

    /// Test 1: Parallel requests each get their own result
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_isolated() {
        let mut detector = ScriptedDetector::empty();
        detector.class_from_width = true;
        detector.delay = Duration::from_millis(20);
        let app = TestApp::with_pool(
            detector,
            PoolConfig {
                max_concurrent: 2,
                timeout: Duration::from_secs(30),
            },
        );

        let widths: Vec<u32> = (0..8).map(|i| 16 + i * 8).collect();
        let requests = widths.iter().map(|&w| {
            let app = app.app.clone();
            async move {
                let response = app
                    .oneshot(image_request("/predict", &png_bytes(w, 12)))
                    .await
                    .unwrap();
                (w, response.status(), json_body(response).await)
            }
        });

        for (w, status, json) in join_all(requests).await {
            assert_eq!(status, StatusCode::OK, "width {}: {}", w, json);
            assert_eq!(json["detections"][0]["class"], format!("w{}", w));
            assert_eq!(decode_image_field(&json), (w, 12, ImageFormat::Jpeg));
        }

        app.assert_clean();
    }

    /// Test 2: Slow detector times out
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_detector_times_out() {
        let mut detector = ScriptedDetector::single("X");
        detector.delay = Duration::from_millis(800);
        let app = TestApp::with_pool(
            detector,
            PoolConfig {
                max_concurrent: 1,
                timeout: Duration::from_millis(100),
            },
        );

        let response = app
            .app
            .clone()
            .oneshot(image_request("/predict", &png_bytes(16, 16)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "inference_timeout");
        app.assert_clean();

        // The stray job finishes without recreating anything
        tokio::time::sleep(Duration::from_millis(1000)).await;
        app.assert_clean();
    }
}
