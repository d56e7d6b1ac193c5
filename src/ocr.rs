use crate::config::DocumentAiConfig;
use crate::error::{ExtractionError, Result};
use crate::types::RawTable;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

/// What the cloud processor recognised in one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudOcrOutput {
    pub text: String,
    pub tables: Vec<RawTable>,
    pub page_count: usize,
}

/// MIME type Document AI expects for a supported upload.
pub fn mime_type_for(extension: &str) -> Option<&'static str> {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Send one document to the Document AI `:process` endpoint.
pub fn run_document_ai(
    bytes: &[u8],
    mime_type: &str,
    config: &DocumentAiConfig,
) -> Result<CloudOcrOutput> {
    let url = config.process_url();
    let client = Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| ExtractionError::CloudRequest(e.to_string()))?;

    let payload = json!({
        "rawDocument": {
            "content": STANDARD.encode(bytes),
            "mimeType": mime_type,
        }
    });
    debug!(url = %url, bytes = bytes.len(), mime_type, "calling Document AI");

    let response = client
        .post(&url)
        .bearer_auth(&config.access_token)
        .json(&payload)
        .send()
        .map_err(|e| {
            if e.is_timeout() {
                ExtractionError::CloudTimeout(config.timeout_secs)
            } else if e.is_connect() {
                ExtractionError::CloudRequest(
                    "Check your internet connection and try again.".to_string(),
                )
            } else {
                ExtractionError::CloudRequest(e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ExtractionError::CloudHttp {
            status: status.as_u16(),
            body: if body.is_empty() {
                "Invalid credentials or processor?".to_string()
            } else {
                body
            },
        });
    }

    let body: Value = response.json().map_err(|e| {
        if e.is_timeout() {
            ExtractionError::CloudTimeout(config.timeout_secs)
        } else {
            ExtractionError::CloudResponse(format!("Invalid JSON: {}", e))
        }
    })?;
    let output = parse_process_response(&body)?;
    info!(
        pages = output.page_count,
        tables = output.tables.len(),
        chars = output.text.len(),
        "Document AI response parsed"
    );
    Ok(output)
}

/// Offsets arrive as JSON strings (int64) or numbers; absent means 0.
fn offset(value: Option<&Value>) -> usize {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        _ => 0,
    }
}

/// Resolve a layout's text anchor against the document text.
fn anchor_text(layout: Option<&Value>, chars: &[char]) -> String {
    let empty: Vec<Value> = vec![];
    let segments = layout
        .and_then(|l| l.get("textAnchor"))
        .and_then(|a| a.get("textSegments"))
        .and_then(|s| s.as_array())
        .unwrap_or(&empty);
    let mut text = String::new();
    for segment in segments {
        let start = offset(segment.get("startIndex")).min(chars.len());
        let end = offset(segment.get("endIndex")).min(chars.len());
        if start < end {
            text.extend(&chars[start..end]);
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn row_cells(row: &Value, chars: &[char]) -> Vec<String> {
    row.get("cells")
        .and_then(|c| c.as_array())
        .map(|cells| {
            cells
                .iter()
                .map(|cell| anchor_text(cell.get("layout"), chars))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_table(table: &Value, chars: &[char]) -> Option<RawTable> {
    let rows_of = |key: &str| -> Vec<Vec<String>> {
        table
            .get(key)
            .and_then(|r| r.as_array())
            .map(|rows| rows.iter().map(|row| row_cells(row, chars)).collect())
            .unwrap_or_default()
    };
    let header_rows = rows_of("headerRows");
    let mut body_rows = rows_of("bodyRows");

    let headers = if header_rows.is_empty() {
        if body_rows.is_empty() {
            return None;
        }
        body_rows.remove(0)
    } else {
        // Stacked header rows are merged column by column.
        let width = header_rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..width)
            .map(|col| {
                header_rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .filter(|cell| !cell.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    };
    Some(RawTable {
        headers,
        rows: body_rows,
    })
}

/// Pull the full text and every table out of a `:process` response body.
pub fn parse_process_response(body: &Value) -> Result<CloudOcrOutput> {
    let document = body
        .get("document")
        .ok_or_else(|| ExtractionError::CloudResponse("No document in response".to_string()))?;
    let text = document
        .get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string();
    let chars: Vec<char> = text.chars().collect();

    let empty_pages: Vec<Value> = vec![];
    let pages = document
        .get("pages")
        .and_then(|p| p.as_array())
        .unwrap_or(&empty_pages);
    let mut tables = Vec::new();
    for (page_index, page) in pages.iter().enumerate() {
        let empty_tables: Vec<Value> = vec![];
        let page_tables = page
            .get("tables")
            .and_then(|t| t.as_array())
            .unwrap_or(&empty_tables);
        for table in page_tables {
            match parse_table(table, &chars) {
                Some(parsed) => tables.push(parsed),
                None => debug!(page = page_index + 1, "empty table skipped"),
            }
        }
    }

    if tables.is_empty() && text.trim().is_empty() {
        return Err(ExtractionError::CloudEmpty);
    }
    Ok(CloudOcrOutput {
        text,
        tables,
        page_count: pages.len(),
    })
}
