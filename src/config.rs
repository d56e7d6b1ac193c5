//! Runtime configuration, read from the environment (and `.env`).

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_LOCATION: &str = "us";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TESSERACT: &str = "tesseract";
pub const DEFAULT_TESSERACT_LANG: &str = "eng";
/// Tesseract page segmentation mode 6: a single uniform block of text.
pub const DEFAULT_TESSERACT_PSM: u8 = 6;
pub const DEFAULT_PDF_RENDER_SCALE: f32 = 2.0;

/// Google Document AI processor credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAiConfig {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
    /// OAuth bearer token sent as `Authorization: Bearer ...`.
    pub access_token: String,
    /// Base URL override, e.g. for a proxy. Defaults to the regional endpoint.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl DocumentAiConfig {
    pub fn process_url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-documentai.googleapis.com", self.location),
        };
        format!(
            "{}/v1/projects/{}/locations/{}/processors/{}:process",
            base, self.project_id, self.location, self.processor_id
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TesseractConfig {
    pub path: String,
    pub lang: String,
    pub psm: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_TESSERACT.to_string(),
            lang: DEFAULT_TESSERACT_LANG.to_string(),
            psm: DEFAULT_TESSERACT_PSM,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// `None` disables the cloud stage; image and PDF input go straight to
    /// local OCR.
    pub document_ai: Option<DocumentAiConfig>,
    pub tesseract: TesseractConfig,
    /// Directory holding the PDFium shared library; system lookup otherwise.
    pub pdfium_library_dir: Option<PathBuf>,
    pub pdf_render_scale: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            document_ai: None,
            tesseract: TesseractConfig::default(),
            pdfium_library_dir: None,
            pdf_render_scale: DEFAULT_PDF_RENDER_SCALE,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> T {
    match non_empty(value) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            debug!(variable = name, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}

impl ExtractorConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = parse_or(
            "DOCUMENT_AI_TIMEOUT_SECS",
            lookup("DOCUMENT_AI_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        );
        let document_ai = match (
            non_empty(lookup("DOCUMENT_AI_PROJECT_ID")),
            non_empty(lookup("DOCUMENT_AI_PROCESSOR_ID")),
            non_empty(lookup("DOCUMENT_AI_ACCESS_TOKEN")),
        ) {
            (Some(project_id), Some(processor_id), Some(access_token)) => Some(DocumentAiConfig {
                project_id,
                location: non_empty(lookup("DOCUMENT_AI_LOCATION"))
                    .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
                processor_id,
                access_token,
                endpoint: non_empty(lookup("DOCUMENT_AI_ENDPOINT")),
                timeout_secs,
            }),
            _ => {
                debug!("Document AI credentials incomplete, cloud OCR disabled");
                None
            }
        };

        let tesseract = TesseractConfig {
            path: non_empty(lookup("TESSERACT_PATH"))
                .unwrap_or_else(|| DEFAULT_TESSERACT.to_string()),
            lang: non_empty(lookup("TESSERACT_LANG"))
                .unwrap_or_else(|| DEFAULT_TESSERACT_LANG.to_string()),
            psm: parse_or("TESSERACT_PSM", lookup("TESSERACT_PSM"), DEFAULT_TESSERACT_PSM),
        };

        let pdf_render_scale = parse_or(
            "PDF_RENDER_SCALE",
            lookup("PDF_RENDER_SCALE"),
            DEFAULT_PDF_RENDER_SCALE,
        );

        Self {
            document_ai,
            tesseract,
            pdfium_library_dir: non_empty(lookup("PDFIUM_LIBRARY_DIR")).map(PathBuf::from),
            pdf_render_scale: if pdf_render_scale > 0.0 {
                pdf_render_scale
            } else {
                DEFAULT_PDF_RENDER_SCALE
            },
        }
    }

    pub fn without_cloud(mut self) -> Self {
        self.document_ai = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ExtractorConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExtractorConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), ExtractorConfig::default());
    }

    #[test]
    fn cloud_needs_project_processor_and_token() {
        let partial = config_from(&[
            ("DOCUMENT_AI_PROJECT_ID", "p"),
            ("DOCUMENT_AI_PROCESSOR_ID", "x"),
        ]);
        assert!(partial.document_ai.is_none());

        let full = config_from(&[
            ("DOCUMENT_AI_PROJECT_ID", "lab-project"),
            ("DOCUMENT_AI_PROCESSOR_ID", "abc123"),
            ("DOCUMENT_AI_ACCESS_TOKEN", "token"),
            ("DOCUMENT_AI_LOCATION", "eu"),
            ("DOCUMENT_AI_TIMEOUT_SECS", "15"),
        ]);
        let cloud = full.document_ai.unwrap();
        assert_eq!(cloud.timeout_secs, 15);
        assert_eq!(
            cloud.process_url(),
            "https://eu-documentai.googleapis.com/v1/projects/lab-project/locations/eu/processors/abc123:process"
        );
    }

    #[test]
    fn endpoint_override_and_bad_numbers() {
        let config = config_from(&[
            ("DOCUMENT_AI_PROJECT_ID", "p"),
            ("DOCUMENT_AI_PROCESSOR_ID", "x"),
            ("DOCUMENT_AI_ACCESS_TOKEN", "t"),
            ("DOCUMENT_AI_ENDPOINT", "http://localhost:9000/"),
            ("DOCUMENT_AI_TIMEOUT_SECS", "soon"),
            ("TESSERACT_PSM", "4"),
            ("PDF_RENDER_SCALE", "-1"),
        ]);
        let cloud = config.document_ai.unwrap();
        assert_eq!(cloud.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(
            cloud.process_url(),
            "http://localhost:9000/v1/projects/p/locations/us/processors/x:process"
        );
        assert_eq!(config.tesseract.psm, 4);
        assert_eq!(config.pdf_render_scale, DEFAULT_PDF_RENDER_SCALE);
    }
}
