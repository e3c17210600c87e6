// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /predict tests
//!
//! These tests verify that:
//! - Detections are reported as `{class, confidence, bbox}` records
//! - The annotated image accompanies the detections
//! - An image with nothing in it yields an empty list

use super::helpers::*;
use axum::http::StatusCode;
use image::ImageFormat;
use tower::util::ServiceExt;

#[cfg(test)]
mod predict_tests {
    use super::*;

    /// Test 1: One detection of class "X"
    #[tokio::test]
    async fn test_predict_single_detection() {
        let app = TestApp::new(ScriptedDetector::single("X"));

        let response = app
            .app
            .clone()
            .oneshot(image_request("/predict", &png_bytes(100, 80)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);

        let detections = json["detections"].as_array().unwrap();
        assert_eq!(detections.len(), 1);
        let record = &detections[0];
        assert_eq!(record["class"], "X");

        let confidence = record["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));

        let bbox: Vec<f64> = record["bbox"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(bbox.len(), 4);
        assert!(bbox[0] < bbox[2]);
        assert!(bbox[1] < bbox[3]);
        assert_eq!(bbox, vec![25.0, 20.0, 75.0, 60.0]);

        assert_eq!(decode_image_field(&json), (100, 80, ImageFormat::Jpeg));
        app.assert_clean();
    }

    /// Test 2: No detections
    #[tokio::test]
    async fn test_predict_no_detections() {
        let app = TestApp::new(ScriptedDetector::empty());

        let response = app
            .app
            .clone()
            .oneshot(image_request("/predict", &png_bytes(32, 32)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["detections"], serde_json::json!([]));
        assert_eq!(decode_image_field(&json), (32, 32, ImageFormat::Jpeg));
        app.assert_clean();
    }

    /// Test 3: JPEG input is accepted as well as PNG
    #[tokio::test]
    async fn test_predict_jpeg_input() {
        let app = TestApp::new(ScriptedDetector::single("moth"));

        let jpeg = buglens_node::vision::encode_jpeg(&image::DynamicImage::new_rgb8(40, 30), 90)
            .unwrap();
        let body = multipart_body("file", "moth.jpg", "image/jpeg", &jpeg);
        let response = app
            .app
            .clone()
            .oneshot(upload_request("/predict", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["detections"][0]["class"], "moth");
        assert_eq!(decode_image_field(&json), (40, 30, ImageFormat::Jpeg));
        app.assert_clean();
    }

    /// Test 4: Non-image on /predict uses the same error body
    #[tokio::test]
    async fn test_predict_non_image() {
        let app = TestApp::new(ScriptedDetector::single("X"));

        let body = multipart_body("file", "x.png", "image/png", b"%PDF-1.7 not a picture");
        let response = app
            .app
            .clone()
            .oneshot(upload_request("/predict", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error_type"], "invalid_upload");
        assert!(json.get("detections").is_none());
        app.assert_clean();
    }
}
