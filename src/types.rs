use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Domain of a lab report, decided once per detected table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Soil,
    Leaf,
    Unknown,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Soil => "soil",
            ReportKind::Leaf => "leaf",
            ReportKind::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ReportKind::Unknown)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag of an output table. `Generic` marks tables whose headers matched
/// no canonical parameter and whose values are kept under the original keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Soil,
    Leaf,
    Unknown,
    Generic,
}

impl TableType {
    pub fn report_kind(&self) -> ReportKind {
        match self {
            TableType::Soil => ReportKind::Soil,
            TableType::Leaf => ReportKind::Leaf,
            TableType::Unknown | TableType::Generic => ReportKind::Unknown,
        }
    }
}

impl From<ReportKind> for TableType {
    fn from(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Soil => TableType::Soil,
            ReportKind::Leaf => TableType::Leaf,
            ReportKind::Unknown => TableType::Unknown,
        }
    }
}

/// A cleaned cell: integer, float, or a string for bounded values (`"<1"`),
/// the not-detected sentinel (`"N.D."`) and unparseable pass-through text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            CellValue::Text(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// One entry of a sample's `data` map: either a parameter value or a named
/// display group of values (leaf reports only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataEntry {
    Value(CellValue),
    Group(BTreeMap<String, CellValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub data: BTreeMap<String, DataEntry>,
}

impl SampleRecord {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, parameter: impl Into<String>, value: CellValue) {
        self.data.insert(parameter.into(), DataEntry::Value(value));
    }

    /// Flat parameter value, ignoring display groups.
    pub fn value(&self, parameter: &str) -> Option<&CellValue> {
        match self.data.get(parameter)? {
            DataEntry::Value(v) => Some(v),
            DataEntry::Group(_) => None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&BTreeMap<String, CellValue>> {
        match self.data.get(name)? {
            DataEntry::Group(g) => Some(g),
            DataEntry::Value(_) => None,
        }
    }

    /// Number of flat (non-group) parameters.
    pub fn parameter_count(&self) -> usize {
        self.data
            .values()
            .filter(|e| matches!(e, DataEntry::Value(_)))
            .count()
    }
}

/// A table as detected by a modality adapter, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    #[serde(rename = "type")]
    pub table_type: TableType,
    pub headers: Vec<String>,
    pub samples: Vec<SampleRecord>,
    pub total_samples: usize,
}

impl ExtractedTable {
    pub fn new(table_type: TableType, headers: Vec<String>, samples: Vec<SampleRecord>) -> Self {
        let total_samples = samples.len();
        Self {
            table_type,
            headers,
            samples,
            total_samples,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    DocumentAi,
    TesseractFallback,
    ExcelParser,
    CsvParser,
    Unknown,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::DocumentAi => "document_ai",
            ExtractionMethod::TesseractFallback => "tesseract_fallback",
            ExtractionMethod::ExcelParser => "excel_parser",
            ExtractionMethod::CsvParser => "csv_parser",
            ExtractionMethod::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    pub text: String,
    pub extraction_details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingParameter,
    OutOfRange,
}

/// Advisory finding from completeness validation. Never removes data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub table_index: usize,
    pub sample_id: String,
    pub kind: WarningKind,
    pub parameter: String,
    pub message: String,
}

/// Top-level outcome of one extraction. Always well-formed, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub method: ExtractionMethod,
    pub tables: Vec<ExtractedTable>,
    pub raw_data: RawData,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationWarning>,
}

impl ExtractionResult {
    pub fn failure(method: ExtractionMethod, error: impl Into<String>, raw_data: RawData) -> Self {
        Self {
            success: false,
            method,
            tables: Vec::new(),
            raw_data,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &SampleRecord> {
        self.tables.iter().flat_map(|t| t.samples.iter())
    }

    pub fn total_samples(&self) -> usize {
        self.tables.iter().map(|t| t.total_samples).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_serializes_to_the_public_shape() {
        let mut sample = SampleRecord::new("S001");
        sample.insert("pH", CellValue::Float(4.5));
        sample.insert("CEC (meq%)", CellValue::Text("<1".into()));
        let result = ExtractionResult {
            success: true,
            method: ExtractionMethod::ExcelParser,
            tables: vec![ExtractedTable::new(
                TableType::Soil,
                vec!["Sample ID".into(), "pH".into()],
                vec![sample],
            )],
            raw_data: RawData::default(),
            error: None,
            warnings: Vec::new(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "method": "excel_parser",
                "tables": [{
                    "type": "soil",
                    "headers": ["Sample ID", "pH"],
                    "samples": [{"sample_id": "S001", "data": {"CEC (meq%)": "<1", "pH": 4.5}}],
                    "total_samples": 1
                }],
                "raw_data": {"text": "", "extraction_details": {}},
                "error": null
            })
        );
    }

    #[test]
    fn groups_deserialize_back_as_groups() {
        let sample: SampleRecord = serde_json::from_value(json!({
            "sample_id": "L001",
            "data": {"N (%)": 2.4, "% Dry Matter": {"N": 2.4}, "B (mg/kg)": 12}
        }))
        .unwrap();
        assert_eq!(sample.value("N (%)"), Some(&CellValue::Float(2.4)));
        assert_eq!(sample.value("B (mg/kg)"), Some(&CellValue::Int(12)));
        assert_eq!(sample.group("% Dry Matter").unwrap()["N"], CellValue::Float(2.4));
        assert_eq!(sample.parameter_count(), 2);
    }

    #[test]
    fn cell_value_display_matches_source_text() {
        assert_eq!(CellValue::Float(0.15).to_string(), "0.15");
        assert_eq!(CellValue::Int(50).to_string(), "50");
        assert_eq!(CellValue::Text("N.D.".into()).to_string(), "N.D.");
        assert_eq!(CellValue::Int(3).as_f64(), Some(3.0));
        assert!(CellValue::Text(" ".into()).is_empty());
    }
}
