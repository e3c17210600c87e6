// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Liveness endpoint tests
//!
//! These tests verify that:
//! - GET / answers `{"success": true}`
//! - It creates nothing on disk
//! - Upload routes reject GET

use super::helpers::*;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use tower::util::ServiceExt; // for `oneshot`

#[cfg(test)]
mod root_tests {
    use super::*;

    /// Test 1: Liveness body
    #[tokio::test]
    async fn test_root_returns_success() {
        let app = TestApp::new(ScriptedDetector::empty());

        let response = app
            .app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"success": true}));
    }

    /// Test 2: No filesystem effects
    #[tokio::test]
    async fn test_root_touches_nothing() {
        let app = TestApp::new(ScriptedDetector::empty());

        for _ in 0..3 {
            let response = app
                .app
                .clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        app.assert_clean();
    }

    /// Test 3: Upload routes are POST only
    #[tokio::test]
    async fn test_upload_routes_reject_get() {
        let app = TestApp::new(ScriptedDetector::empty());

        for uri in ["/upload", "/predict"] {
            let response = app
                .app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::GET)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", uri);
        }
    }

    /// Test 4: CORS preflight from the configured origin
    #[tokio::test]
    async fn test_cors_allows_default_origin() {
        let app = TestApp::new(ScriptedDetector::empty());

        let response = app
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/predict")
                    .header("Origin", "http://localhost:3000")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );
    }

    /// Test 5: Other origins get no CORS grant
    #[tokio::test]
    async fn test_cors_rejects_other_origin() {
        let app = TestApp::new(ScriptedDetector::empty());

        let response = app
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/predict")
                    .header("Origin", "http://evil.example")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
