mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{text_image, ScriptedEngine};
use ocr_session::server::router;
use ocr_session::{Recognizer, SessionConfig};
use serde::Deserialize;
use std::io::Cursor;
use tower::ServiceExt;

const BOUNDARY: &str = "ocr-session-test-boundary";
const MAX_FILE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OcrResponse {
    text: String,
    pages: u32,
    processing_time_ms: u64,
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EngineInfo {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct InfoResponse {
    version: String,
    engine: EngineInfo,
    supported_formats: Vec<String>,
    max_file_size_bytes: usize,
    language: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct Word {
    text: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct WordsResponse {
    words: Vec<Word>,
    processing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: String,
}

fn app(engine: ScriptedEngine) -> axum::Router {
    router(
        Recognizer::new(engine, SessionConfig::new("eng")),
        MAX_FILE_SIZE,
    )
}

fn png_bytes(text: &str) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    text_image(text)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Hand-built multipart body; `file` is (bytes, content type)
fn multipart_body(file: Option<(&[u8], &str)>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((bytes, content_type)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("Failed to parse response")
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app(ScriptedEngine::new())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = json(response).await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_info_endpoint() {
    let response = app(ScriptedEngine::new())
        .oneshot(Request::get("/info").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let info: InfoResponse = json(response).await;
    assert_eq!(info.engine.name, "scripted");
    assert_eq!(info.language, "eng");
    assert_eq!(info.max_file_size_bytes, MAX_FILE_SIZE);
    assert!(info.supported_formats.contains(&"image/png".to_string()));
    assert!(info
        .supported_formats
        .contains(&"application/pdf".to_string()));
}

#[tokio::test]
async fn test_ocr_png() {
    let engine = ScriptedEngine::new();
    let body = multipart_body(Some((png_bytes("HELLO 12345").as_slice(), "image/png")), &[]);

    let response = app(engine.clone())
        .oneshot(upload("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result: OcrResponse = json(response).await;
    assert_eq!(result.text, "HELLO 12345\n");
    assert_eq!(result.pages, 1);
    assert!(result.warnings.is_empty());
    assert_eq!(engine.created(), engine.deleted());
}

#[tokio::test]
async fn test_ocr_hocr_format_field() {
    let body = multipart_body(
        Some((png_bytes("MARKUP").as_slice(), "image/png")),
        &[("format", "hocr"), ("psm", "6")],
    );

    let response = app(ScriptedEngine::new())
        .oneshot(upload("/ocr", body))
        .await
        .unwrap();

    let result: OcrResponse = json(response).await;
    assert!(result.text.starts_with("<!DOCTYPE html"));
    assert!(result.text.contains("MARKUP"));
    assert!(result.text.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_ocr_without_file_is_bad_request() {
    let body = multipart_body(None, &[("format", "text")]);

    let response = app(ScriptedEngine::new())
        .oneshot(upload("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json(response).await;
    assert_eq!(error.code, "MISSING_FILE");
}

#[tokio::test]
async fn test_ocr_invalid_psm_is_bad_request() {
    let body = multipart_body(
        Some((png_bytes("X").as_slice(), "image/png")),
        &[("psm", "42")],
    );

    let response = app(ScriptedEngine::new())
        .oneshot(upload("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ocr_unreadable_upload() {
    let body = multipart_body(Some((&b"not an image at all"[..], "image/png")), &[]);

    let response = app(ScriptedEngine::new())
        .oneshot(upload("/ocr", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_words_endpoint() {
    let body = multipart_body(
        Some((png_bytes("HELLO WORLD").as_slice(), "image/png")),
        &[("level", "word")],
    );

    let response = app(ScriptedEngine::new())
        .oneshot(upload("/words", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result: WordsResponse = json(response).await;
    let texts: Vec<&str> = result.words.iter().map(|w| w.text.as_str()).collect();
    assert_eq!(texts, ["HELLO", "WORLD"]);
    assert!(result.words.iter().all(|w| w.confidence <= 100.0));
}
