use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Failed to decode image: {0}")]
    CodecError(String),

    #[error("Failed to rasterize document: {0}")]
    RasterizeError(String),

    #[error("Engine rejected variable '{key}'")]
    VariableRejected { key: String },

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("OCR failed for {input}")]
    Recognition {
        input: String,
        #[source]
        source: Box<OcrError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Wrap a failure of a single-shot entry point, keeping the original cause.
    pub fn recognition(input: impl Into<String>, source: OcrError) -> Self {
        OcrError::Recognition {
            input: input.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping any `Recognition` wrappers.
    pub fn root_cause(&self) -> &OcrError {
        match self {
            OcrError::Recognition { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<image::ImageError> for OcrError {
    fn from(e: image::ImageError) -> Self {
        OcrError::CodecError(e.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match self.root_cause() {
            OcrError::InitializationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::InvalidFrame(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_FRAME"),
            OcrError::CodecError(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT"),
            OcrError::RasterizeError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "RASTERIZE_ERROR"),
            OcrError::VariableRejected { .. } => (StatusCode::BAD_REQUEST, "VARIABLE_REJECTED"),
            OcrError::ProcessingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::Io(_) | OcrError::Internal(_) | OcrError::Recognition { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
