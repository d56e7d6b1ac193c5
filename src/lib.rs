//! Soil and leaf lab-report extraction.
//!
//! [`extract_from_file`] / [`extract_from_bytes`] take a scanned image, PDF,
//! spreadsheet or delimited text file and return an [`ExtractionResult`] with
//! standardized, typed sample records.

pub mod cleaner;
pub mod config;
pub mod delimited;
pub mod error;
pub mod excel;
pub mod local_ocr;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod services;
pub mod types;

pub use config::ExtractorConfig;
pub use error::{ExtractionError, Result};
pub use pipeline::{extract_from_bytes, extract_from_file, Modality};
pub use types::{
    CellValue, DataEntry, ExtractedTable, ExtractionMethod, ExtractionResult, RawData, ReportKind,
    SampleRecord, TableType, ValidationWarning, WarningKind,
};
