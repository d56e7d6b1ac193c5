//! Extraction orchestrator: one file in, one well-formed result out.
//!
//! Scanned input (images, PDFs) goes to Document AI first and to local
//! Tesseract when the cloud stage is disabled or fails. Spreadsheets and
//! delimited text are parsed directly. Detected tables are classified and
//! structured; when they yield nothing, the raw text is reconstructed.
//! Errors never escape: they end up in `ExtractionResult::error`.

use crate::config::ExtractorConfig;
use crate::delimited::{delimiter_name, read_delimited_table};
use crate::error::{ExtractionError, Result};
use crate::excel::{read_workbook_tables, synthesize_raw_text};
use crate::local_ocr::run_local_ocr;
use crate::ocr::{mime_type_for, run_document_ai};
use crate::services::classifier::classify_text;
use crate::services::reconstructor::reconstruct;
use crate::services::table_extractor::extract_with_hint;
use crate::services::validation::validate_tables;
use crate::types::{
    ExtractedTable, ExtractionMethod, ExtractionResult, RawData, RawTable, ReportKind,
};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "pdf", "csv", "txt", "tsv", "xlsx", "xls",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Image,
    Pdf,
    Excel,
    Delimited,
}

impl Modality {
    /// Case-insensitive; a leading dot is accepted.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Ok(Modality::Image),
            "pdf" => Ok(Modality::Pdf),
            "xlsx" | "xls" => Ok(Modality::Excel),
            "csv" | "tsv" | "txt" => Ok(Modality::Delimited),
            other => Err(ExtractionError::UnsupportedExtension(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Pdf => "pdf",
            Modality::Excel => "excel",
            Modality::Delimited => "delimited",
        }
    }

    /// Method reported when extraction fails before any adapter succeeds.
    pub fn default_method(&self) -> ExtractionMethod {
        match self {
            Modality::Image | Modality::Pdf => ExtractionMethod::TesseractFallback,
            Modality::Excel => ExtractionMethod::ExcelParser,
            Modality::Delimited => ExtractionMethod::CsvParser,
        }
    }
}

/// What one adapter chain produced before final assembly.
struct AdapterOutput {
    method: ExtractionMethod,
    text: String,
    tables: Vec<ExtractedTable>,
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Extract lab data from a file on disk.
pub fn extract_from_file(path: impl AsRef<Path>, config: &ExtractorConfig) -> ExtractionResult {
    let path = path.as_ref();
    let extension = file_extension(path);
    let method = Modality::from_extension(&extension)
        .map(|m| m.default_method())
        .unwrap_or(ExtractionMethod::Unknown);

    if !path.exists() {
        let err = ExtractionError::FileNotFound(path.to_path_buf());
        warn!(path = %path.display(), "input file not found");
        return ExtractionResult::failure(method, err.to_string(), RawData::default());
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = ExtractionError::from(e);
            warn!(path = %path.display(), error = %err, "could not read input");
            return ExtractionResult::failure(method, err.to_string(), RawData::default());
        }
    };

    let mut result = extract_from_bytes(&bytes, &extension, config);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        result
            .raw_data
            .extraction_details
            .insert("file_name".into(), json!(name));
    }
    result
}

/// Extract lab data from an in-memory upload with its declared extension.
pub fn extract_from_bytes(
    bytes: &[u8],
    extension: &str,
    config: &ExtractorConfig,
) -> ExtractionResult {
    let extension = extension.trim_start_matches('.').to_lowercase();
    let mut details = Map::new();
    details.insert("extension".into(), json!(extension));
    details.insert("byte_size".into(), json!(bytes.len()));

    let modality = match Modality::from_extension(&extension) {
        Ok(modality) => modality,
        Err(err) => {
            warn!(extension = %extension, "unsupported file type");
            return ExtractionResult::failure(
                ExtractionMethod::Unknown,
                err.to_string(),
                RawData {
                    text: String::new(),
                    extraction_details: details,
                },
            );
        }
    };
    details.insert("modality".into(), json!(modality.as_str()));
    info!(modality = modality.as_str(), bytes = bytes.len(), "starting extraction");

    if bytes.is_empty() {
        return ExtractionResult::failure(
            modality.default_method(),
            ExtractionError::EmptyInput.to_string(),
            RawData {
                text: String::new(),
                extraction_details: details,
            },
        );
    }

    let output = match modality {
        Modality::Image | Modality::Pdf => {
            extract_scanned(bytes, modality, &extension, config, &mut details)
        }
        Modality::Excel => extract_spreadsheet(bytes, &mut details),
        Modality::Delimited => Ok(extract_delimited(bytes, &mut details)),
    };

    match output {
        Ok(output) => {
            let tables = unique_sample_ids(output.tables);
            let warnings = validate_tables(&tables);
            if !warnings.is_empty() {
                info!(count = warnings.len(), "validation warnings attached");
            }
            info!(
                method = output.method.as_str(),
                tables = tables.len(),
                samples = tables.iter().map(|t| t.total_samples).sum::<usize>(),
                "extraction finished"
            );
            ExtractionResult {
                success: true,
                method: output.method,
                tables,
                raw_data: RawData {
                    text: output.text,
                    extraction_details: details,
                },
                error: None,
                warnings,
            }
        }
        Err((method, text, err)) => {
            warn!(method = method.as_str(), error = %err, "extraction failed");
            ExtractionResult::failure(
                method,
                err,
                RawData {
                    text,
                    extraction_details: details,
                },
            )
        }
    }
}

type AdapterResult = std::result::Result<AdapterOutput, (ExtractionMethod, String, String)>;

/// Domain hint for a document: first classified table, else the text.
fn document_hint(tables: &[ExtractedTable], text: &str) -> ReportKind {
    tables
        .iter()
        .map(|t| t.table_type.report_kind())
        .find(ReportKind::is_known)
        .unwrap_or_else(|| classify_text(text))
}

/// Sample IDs are unique per result: a repeat in a later table (or later in
/// the same table) is dropped, keeping the first in discovery order.
fn unique_sample_ids(tables: Vec<ExtractedTable>) -> Vec<ExtractedTable> {
    let had_samples = tables.iter().any(|t| !t.samples.is_empty());
    let mut seen = HashSet::new();
    let tables: Vec<ExtractedTable> = tables
        .into_iter()
        .enumerate()
        .map(|(index, table)| {
            let before = table.samples.len();
            let samples: Vec<_> = table
                .samples
                .into_iter()
                .filter(|s| seen.insert(s.sample_id.clone()))
                .collect();
            if samples.len() < before {
                debug!(
                    table = index,
                    dropped = before - samples.len(),
                    "duplicate sample ids dropped"
                );
            }
            ExtractedTable::new(table.table_type, table.headers, samples)
        })
        .collect();
    if had_samples {
        tables.into_iter().filter(|t| !t.samples.is_empty()).collect()
    } else {
        tables
    }
}

/// Header and cell text of every table, for domain classification.
fn table_text(tables: &[RawTable]) -> String {
    tables
        .iter()
        .flat_map(|t| std::iter::once(&t.headers).chain(&t.rows))
        .map(|cells| cells.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep tables with samples; if none have any, rebuild from the raw text.
fn finish_tables(
    candidates: Vec<ExtractedTable>,
    text: &str,
    details: &mut Map<String, Value>,
) -> Vec<ExtractedTable> {
    if candidates.iter().any(|t| !t.samples.is_empty()) {
        return candidates.into_iter().filter(|t| !t.samples.is_empty()).collect();
    }
    if text.trim().is_empty() {
        return candidates;
    }
    let hint = document_hint(&candidates, text);
    debug!(hint = %hint, "no samples in detected tables, reconstructing from text");
    let reconstruction = reconstruct(text, hint);
    match reconstruction.strategy {
        Some(strategy) => {
            details.insert("reconstruction_strategy".into(), json!(strategy.as_str()));
            details.insert("positional_mapping".into(), json!(reconstruction.positional));
            details.insert(
                "mapping_confidence".into(),
                json!(if reconstruction.positional { "low" } else { "normal" }),
            );
        }
        None => {
            details.insert("reconstruction_strategy".into(), Value::Null);
        }
    }
    vec![reconstruction.into_table()]
}

fn structure_tables(raw: &[RawTable], hint: ReportKind) -> Vec<ExtractedTable> {
    raw.iter()
        .map(|t| extract_with_hint(&t.headers, &t.rows, hint))
        .collect()
}

fn extract_scanned(
    bytes: &[u8],
    modality: Modality,
    extension: &str,
    config: &ExtractorConfig,
    details: &mut Map<String, Value>,
) -> AdapterResult {
    let mut cloud_error = None;
    match (&config.document_ai, mime_type_for(extension)) {
        (Some(cloud), Some(mime_type)) => match run_document_ai(bytes, mime_type, cloud) {
            Ok(output) => {
                details.insert("cloud_ocr".into(), json!("ok"));
                details.insert("page_count".into(), json!(output.page_count));
                details.insert("tables_detected".into(), json!(output.tables.len()));
                let hint = classify_text(&output.text);
                let candidates = structure_tables(&output.tables, hint);
                let tables = finish_tables(candidates, &output.text, details);
                return Ok(AdapterOutput {
                    method: ExtractionMethod::DocumentAi,
                    text: output.text,
                    tables,
                });
            }
            Err(err) => {
                warn!(error = %err, "cloud OCR failed, falling back to local OCR");
                details.insert("cloud_ocr".into(), json!("failed"));
                details.insert("cloud_error".into(), json!(err.to_string()));
                cloud_error = Some(err.to_string());
            }
        },
        _ => {
            debug!("cloud OCR not configured, using local OCR");
            details.insert("cloud_ocr".into(), json!("disabled"));
        }
    }

    match run_local_ocr(bytes, modality == Modality::Pdf, config) {
        Ok(output) => {
            details.insert("page_count".into(), json!(output.page_count));
            details.insert("tables_detected".into(), json!(0));
            let tables = finish_tables(Vec::new(), &output.text, details);
            Ok(AdapterOutput {
                method: ExtractionMethod::TesseractFallback,
                text: output.text,
                tables,
            })
        }
        Err(err) => {
            details.insert("local_ocr_error".into(), json!(err.to_string()));
            let message = match cloud_error {
                Some(cloud) => format!("OCR failed. Cloud: {} Local: {}", cloud, err),
                None => err.to_string(),
            };
            Err((ExtractionMethod::TesseractFallback, String::new(), message))
        }
    }
}

fn extract_spreadsheet(bytes: &[u8], details: &mut Map<String, Value>) -> AdapterResult {
    let book = read_workbook_tables(bytes)
        .map_err(|e| (ExtractionMethod::ExcelParser, String::new(), e.to_string()))?;
    details.insert("worksheets".into(), json!(book.sheet_names));
    details.insert("tables_detected".into(), json!(book.tables.len()));

    let raw: Vec<RawTable> = book.tables.into_iter().map(|(_, table)| table).collect();
    let hint = classify_text(&table_text(&raw));
    let tables = unique_sample_ids(structure_tables(&raw, hint));
    let text = synthesize_raw_text(&tables);
    Ok(AdapterOutput {
        method: ExtractionMethod::ExcelParser,
        text,
        tables,
    })
}

fn extract_delimited(bytes: &[u8], details: &mut Map<String, Value>) -> AdapterOutput {
    let parsed = read_delimited_table(bytes);
    details.insert("delimiter".into(), json!(delimiter_name(parsed.delimiter)));
    let mut candidates = Vec::new();
    // Without a delimiter the file is free text; leave it to reconstruction.
    if parsed.delimiter.is_some() && !parsed.table.headers.is_empty() {
        details.insert("tables_detected".into(), json!(1));
        let hint = classify_text(&parsed.text);
        candidates.push(extract_with_hint(&parsed.table.headers, &parsed.table.rows, hint));
    } else {
        details.insert("tables_detected".into(), json!(0));
    }
    let tables = finish_tables(candidates, &parsed.text, details);
    AdapterOutput {
        method: ExtractionMethod::CsvParser,
        text: parsed.text,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentAiConfig;
    use crate::types::{CellValue, SampleRecord, TableType};
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;

    fn offline() -> ExtractorConfig {
        let mut config = ExtractorConfig::default();
        config.tesseract.path = "/nonexistent/tesseract".to_string();
        config
    }

    #[test]
    fn extension_dispatch() {
        assert_eq!(Modality::from_extension(".PNG").unwrap(), Modality::Image);
        assert_eq!(Modality::from_extension("tsv").unwrap(), Modality::Delimited);
        assert_eq!(Modality::from_extension("xls").unwrap(), Modality::Excel);
        assert!(matches!(
            Modality::from_extension("docx"),
            Err(ExtractionError::UnsupportedExtension(_))
        ));
        for ext in SUPPORTED_EXTENSIONS {
            assert!(Modality::from_extension(ext).is_ok());
        }
    }

    #[test]
    fn unsupported_extension_is_reported() {
        let result = extract_from_bytes(b"hello", "docx", &offline());
        assert!(!result.success);
        assert_eq!(result.method, ExtractionMethod::Unknown);
        assert!(result.error.unwrap().contains("docx"));
    }

    #[test]
    fn empty_input_fails_cleanly() {
        let result = extract_from_bytes(b"", "csv", &offline());
        assert!(!result.success);
        assert_eq!(result.method, ExtractionMethod::CsvParser);
        assert_eq!(result.error.as_deref(), Some("File is empty."));
    }

    #[test]
    fn csv_round_trip() {
        let result = extract_from_bytes(b"Sample ID,pH,N (%)\nS001,4.5,0.1\n", "csv", &offline());
        assert!(result.success);
        assert_eq!(result.method, ExtractionMethod::CsvParser);
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].table_type, TableType::Soil);
        assert_eq!(result.tables[0].samples[0].value("N (%)"), Some(&CellValue::Float(0.1)));
        assert_eq!(result.raw_data.extraction_details["delimiter"], json!("comma"));
        assert!(result.raw_data.text.contains("S001"));
    }

    #[test]
    fn free_text_is_reconstructed() {
        let text = "S001: pH: 4.5 N (%): 0.1 Org. C (%): 0.8 Total P (mg/kg): 50 Avail P (mg/kg): 2 Exch. K (meq%): 0.1 Exch. Ca (meq%): 0.3 Exch. Mg (meq%): 0.15 CEC (meq%): 6.5";
        let result = extract_from_bytes(text.as_bytes(), "txt", &offline());
        assert!(result.success);
        assert_eq!(result.total_samples(), 1);
        let details = &result.raw_data.extraction_details;
        assert_eq!(details["reconstruction_strategy"], json!("structured_sample_id"));
        assert_eq!(details["positional_mapping"], json!(true));
        assert_eq!(details["mapping_confidence"], json!("low"));
    }

    #[test]
    fn ocr_failure_without_cloud_is_a_failed_result() {
        let result = extract_from_bytes(b"not an image", "png", &offline());
        assert!(!result.success);
        assert_eq!(result.method, ExtractionMethod::TesseractFallback);
        assert_eq!(result.raw_data.extraction_details["cloud_ocr"], json!("disabled"));
        assert!(result.error.is_some());
    }

    #[test]
    fn cloud_failure_falls_back_to_local_ocr() {
        let mut config = offline();
        config.document_ai = Some(DocumentAiConfig {
            project_id: "lab".to_string(),
            location: "us".to_string(),
            processor_id: "proc".to_string(),
            access_token: "token".to_string(),
            endpoint: Some("http://127.0.0.1:1".to_string()),
            timeout_secs: 1,
        });
        let result = extract_from_bytes(b"not an image", "png", &config);
        assert!(!result.success);
        assert_eq!(result.method, ExtractionMethod::TesseractFallback);
        let details = &result.raw_data.extraction_details;
        assert_eq!(details["cloud_ocr"], json!("failed"));
        assert!(details.contains_key("cloud_error"));
        assert!(details.contains_key("local_ocr_error"));
        let error = result.error.unwrap();
        assert!(error.starts_with("OCR failed. Cloud: "), "{}", error);
        assert!(error.contains(" Local: "), "{}", error);
    }

    #[test]
    fn sample_ids_are_unique_across_worksheets() {
        let mut workbook = Workbook::new();
        for (name, ph) in [("A", 4.5), ("B", 6.0)] {
            let sheet = workbook.add_worksheet();
            sheet.set_name(name).unwrap();
            sheet.write_string(0, 0, "Sample ID").unwrap();
            sheet.write_string(0, 1, "pH").unwrap();
            sheet.write_string(1, 0, "S001").unwrap();
            sheet.write_number(1, 1, ph).unwrap();
        }
        workbook.add_worksheet().set_name("C").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let result = extract_from_bytes(&bytes, "xlsx", &offline());
        assert!(result.success);
        let ids: Vec<_> = result
            .tables
            .iter()
            .flat_map(|t| &t.samples)
            .map(|s| (s.sample_id.as_str(), s.value("pH").cloned()))
            .collect();
        assert_eq!(ids, vec![("S001", Some(CellValue::Float(4.5)))]);
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].total_samples, 1);
        assert_eq!(result.raw_data.text, "S001: pH 4.5");
    }

    #[test]
    fn later_tables_keep_their_new_ids() {
        let table = |ids: &[&str]| {
            let samples = ids
                .iter()
                .map(|id| {
                    let mut sample = SampleRecord::new(*id);
                    sample.insert("pH", CellValue::Float(5.0));
                    sample
                })
                .collect();
            ExtractedTable::new(TableType::Soil, vec![], samples)
        };
        let tables = unique_sample_ids(vec![table(&["S1", "S2"]), table(&["S2", "S3"])]);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].total_samples, 1);
        assert_eq!(tables[1].samples[0].sample_id, "S3");
    }

    #[test]
    fn out_of_range_ph_becomes_a_warning() {
        let csv = b"Sample ID,pH,Org. C (%),Avail P (mg/kg)\nS001,11.2,1.0,3\n";
        let result = extract_from_bytes(csv, "csv", &offline());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.tables[0].samples.len(), 1);
    }
}
