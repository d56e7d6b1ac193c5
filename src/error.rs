//! Error taxonomy for the extraction pipeline.
//!
//! Adapters return these errors; only the pipeline folds them into a
//! well-formed `ExtractionResult` with `success == false`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is empty.")]
    EmptyInput,

    #[error(
        "Unsupported file type '{0}'. Supported: png, jpg, jpeg, pdf, csv, txt, tsv, xlsx, xls"
    )]
    UnsupportedExtension(String),

    #[error("Cloud OCR is not configured: {0}")]
    CloudNotConfigured(String),

    #[error("Cloud OCR request failed: {0}")]
    CloudRequest(String),

    #[error("Cloud OCR timed out after {0}s")]
    CloudTimeout(u64),

    #[error("Cloud OCR failed ({status}): {body}")]
    CloudHttp { status: u16, body: String },

    #[error("Invalid cloud OCR response: {0}")]
    CloudResponse(String),

    #[error("Cloud OCR returned no tables and no text")]
    CloudEmpty,

    #[error("Local OCR failed: {0}")]
    OcrEngine(String),

    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Could not render PDF: {0}")]
    Pdf(String),

    #[error("Could not read spreadsheet: {0}")]
    Spreadsheet(String),
}

impl ExtractionError {
    /// Errors that end the extraction immediately; everything else is an
    /// adapter failure the pipeline may recover from by falling back.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ExtractionError::FileNotFound(_)
                | ExtractionError::EmptyInput
                | ExtractionError::UnsupportedExtension(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
