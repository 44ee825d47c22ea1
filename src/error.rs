use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Unknown threshold method: {0} (expected adaptive, otsu or fixed)")]
    UnknownThresholdMethod(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-readable error report printed by the CLI
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl OcrError {
    /// Stable identifier for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            OcrError::InvalidImage(_) => "INVALID_IMAGE",
            OcrError::Recognition(_) => "RECOGNITION_ERROR",
            OcrError::UnknownThresholdMethod(_) => "UNKNOWN_THRESHOLD_METHOD",
            OcrError::InvalidOption(_) => "INVALID_OPTION",
            OcrError::InitializationError(_) => "INIT_ERROR",
            OcrError::Io(_) => "IO_ERROR",
            OcrError::Json(_) => "JSON_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        }
    }
}
