use crate::cli::ServeArgs;
use crate::config::{OutputMode, PageSegMode};
use crate::engine::{IteratorLevel, RecognitionEngine};
use crate::error::OcrError;
use crate::recognizer::{EngineInfo, Recognizer};
use crate::words::Word;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared application state
pub struct AppState<E: RecognitionEngine> {
    pub recognizer: Recognizer<E>,
    pub max_file_size: usize,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub pages: u32,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

/// Word extraction response
#[derive(Serialize)]
pub struct WordsResponse {
    pub words: Vec<Word>,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: EngineInfo,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
    pub language: String,
}

/// Build the HTTP router
pub fn router<E>(recognizer: Recognizer<E>, max_file_size: usize) -> Router
where
    E: RecognitionEngine + 'static,
{
    let state = Arc::new(AppState {
        recognizer,
        max_file_size,
    });

    Router::new()
        .route("/ocr", post(handle_ocr::<E>))
        .route("/words", post(handle_words::<E>))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info::<E>))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run<E>(recognizer: Recognizer<E>, args: ServeArgs) -> anyhow::Result<()>
where
    E: RecognitionEngine + 'static,
{
    let addr = format!("{}:{}", args.host, args.port);
    let app = router(recognizer, args.max_file_size);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Fields accepted by the upload endpoints
#[derive(Default)]
struct Upload {
    data: Option<Bytes>,
    content_type: Option<String>,
    fields: Vec<(String, String)>,
}

impl Upload {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

async fn read_upload(mut multipart: Multipart, max_file_size: usize) -> Result<Upload, OcrError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            upload.content_type = field.content_type().map(|s| s.to_string());
            upload.data = Some(field.bytes().await.map_err(|e| {
                OcrError::InvalidRequest(format!("Failed to read file data: {}", e))
            })?);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| OcrError::InvalidRequest(format!("Invalid field '{}': {}", name, e)))?;
            upload.fields.push((name, value));
        }
    }

    let size = upload.data.as_ref().ok_or(OcrError::MissingFile)?.len();
    if size > max_file_size {
        return Err(OcrError::ImageTooLarge {
            size,
            max: max_file_size,
        });
    }

    Ok(upload)
}

/// Write the upload to a temp file whose extension matches its content type
fn spool(upload: &Upload) -> Result<tempfile::NamedTempFile, OcrError> {
    let mime = upload
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    let extension = match mime {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        "image/webp" => ".webp",
        "image/tiff" => ".tiff",
        "application/pdf" => ".pdf",
        _ => ".tmp",
    };

    let mut temp_file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .map_err(|e| OcrError::Internal(format!("Failed to create temp file: {}", e)))?;

    temp_file
        .write_all(upload.data.as_deref().unwrap_or_default())
        .map_err(|e| OcrError::Internal(format!("Failed to write temp file: {}", e)))?;

    Ok(temp_file)
}

/// Handle OCR requests
async fn handle_ocr<E>(
    State(state): State<Arc<AppState<E>>>,
    multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError>
where
    E: RecognitionEngine + 'static,
{
    let start = Instant::now();
    let upload = read_upload(multipart, state.max_file_size).await?;

    let mut config = state.recognizer.config().clone();
    if let Some(format) = upload.field("format") {
        config.output_mode = format.parse::<OutputMode>()?;
    }
    if let Some(psm) = upload.field("psm") {
        let psm = psm
            .trim()
            .parse::<i32>()
            .map_err(|e| OcrError::InvalidRequest(format!("Invalid psm: {}", e)))?;
        config.page_seg_mode = PageSegMode::from_number(psm)?;
    }
    if let Some(language) = upload.field("language").filter(|l| !l.is_empty()) {
        config.language = language.to_string();
    }

    let temp_file = spool(&upload)?;
    let recognizer = state.recognizer.with_config(config);

    let output = tokio::task::spawn_blocking(move || recognizer.ocr_file(temp_file.path(), None))
        .await
        .map_err(|e| OcrError::Internal(format!("OCR worker failed: {}", e)))??;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "OCR completed in {}ms, {} page(s), text length: {}",
        processing_time_ms,
        output.pages,
        output.text.len()
    );

    Ok(Json(OcrResponse {
        warnings: output.warnings(),
        text: output.text,
        pages: output.pages,
        processing_time_ms,
    }))
}

/// Handle word extraction requests
async fn handle_words<E>(
    State(state): State<Arc<AppState<E>>>,
    multipart: Multipart,
) -> Result<Json<WordsResponse>, OcrError>
where
    E: RecognitionEngine + 'static,
{
    let start = Instant::now();
    let upload = read_upload(multipart, state.max_file_size).await?;

    let level = match upload.field("level") {
        Some(level) => level.parse::<IteratorLevel>()?,
        None => IteratorLevel::Word,
    };
    let image = image::load_from_memory(upload.data.as_deref().unwrap_or_default())?;
    let recognizer = state.recognizer.clone();

    let words = tokio::task::spawn_blocking(move || recognizer.words(&image, level))
        .await
        .map_err(|e| OcrError::Internal(format!("OCR worker failed: {}", e)))??;

    Ok(Json(WordsResponse {
        words,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info<E>(State(state): State<Arc<AppState<E>>>) -> impl IntoResponse
where
    E: RecognitionEngine + 'static,
{
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.recognizer.info(),
        supported_formats: vec![
            "image/png".to_string(),
            "image/jpeg".to_string(),
            "image/gif".to_string(),
            "image/bmp".to_string(),
            "image/webp".to_string(),
            "image/tiff".to_string(),
            "application/pdf".to_string(),
        ],
        max_file_size_bytes: state.max_file_size,
        language: state.recognizer.config().language.clone(),
    })
}
