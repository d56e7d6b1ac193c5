//! Structured-table extraction: headers + rows → typed sample records.

use crate::cleaner::{clean, is_reading};
use crate::models::LEAF_PARAMETERS;
use crate::services::classifier::classify;
use crate::services::standardizer::{standardize_name, standardize_name_for};
use crate::types::{DataEntry, ExtractedTable, ReportKind, SampleRecord, TableType};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Statistics/footer labels that are not samples, compared against the
/// whole identifier with punctuation removed.
const SUMMARY_ROW_LABELS: &[&str] = &[
    "mean",
    "average",
    "avg",
    "median",
    "min",
    "minimum",
    "max",
    "maximum",
    "std",
    "std dev",
    "stdev",
    "std deviation",
    "standard deviation",
    "sd",
    "cv",
    "range",
    "total",
    "grand total",
];

/// Clean a sample identifier cell; `None` when nothing usable remains.
pub fn normalize_sample_id(raw: &str) -> Option<String> {
    let id = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let id = id.trim_end_matches([':', ';', ',']).trim();
    if !id.chars().any(|c| c.is_alphanumeric()) {
        return None;
    }
    Some(id.to_string())
}

fn is_summary_row(id: &str) -> bool {
    let label = id
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    SUMMARY_ROW_LABELS.contains(&label.as_str())
}

/// The header row repeated inside the data: same identifier label, or most
/// filled value cells name parameters.
fn is_repeated_header<S: AsRef<str>>(sample_id: &str, row: &[S], id_header: &str) -> bool {
    if sample_id.eq_ignore_ascii_case(id_header) {
        return true;
    }
    let filled: Vec<&str> = row[1..]
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect();
    let named = filled.iter().filter(|c| standardize_name(c).is_some()).count();
    !filled.is_empty() && named * 2 > filled.len()
}

/// Column index → output key. Column 0 is always the identifier.
fn map_columns<S: AsRef<str>>(headers: &[S], kind: ReportKind) -> (Vec<Option<String>>, bool) {
    let mut seen = HashSet::new();
    let mut columns: Vec<Option<String>> = vec![None; headers.len()];
    for (i, header) in headers.iter().enumerate().skip(1) {
        if let Some(canonical) = standardize_name_for(header.as_ref(), kind) {
            if seen.insert(canonical) {
                columns[i] = Some(canonical.to_string());
            } else {
                debug!(column = i, canonical, "second column for the same parameter ignored");
            }
        }
    }
    if headers.len() > 1 && columns.iter().all(Option::is_none) {
        // Last resort: keep values under the original header text.
        let generic = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    return None;
                }
                let text = h.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
                Some(if text.is_empty() {
                    format!("Column_{}", i)
                } else {
                    text
                })
            })
            .collect();
        return (generic, true);
    }
    (columns, false)
}

/// Add the `% Dry Matter` / `mg/kg Dry Matter` display groups to a leaf sample.
pub fn add_leaf_groups(sample: &mut SampleRecord) {
    let mut groups: BTreeMap<&'static str, BTreeMap<String, _>> = BTreeMap::new();
    for spec in LEAF_PARAMETERS {
        let Some(group) = spec.group else { continue };
        if let Some(value) = sample.value(spec.canonical) {
            groups
                .entry(group)
                .or_default()
                .insert(spec.display.to_string(), value.clone());
        }
    }
    for (name, values) in groups {
        sample.data.insert(name.to_string(), DataEntry::Group(values));
    }
}

/// Classify the table, then extract it.
pub fn extract<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> ExtractedTable {
    extract_with_hint(headers, rows, ReportKind::Unknown)
}

/// Like [`extract`], falling back to `hint` when the headers carry no evidence.
pub fn extract_with_hint<S: AsRef<str>>(
    headers: &[S],
    rows: &[Vec<S>],
    hint: ReportKind,
) -> ExtractedTable {
    let mut kind = classify(headers, rows);
    if !kind.is_known() && hint.is_known() {
        debug!(hint = %hint, "no classification evidence, using hint");
        kind = hint;
    }
    extract_as(headers, rows, kind)
}

/// Extract with an already decided report kind.
pub fn extract_as<S: AsRef<str>>(
    headers: &[S],
    rows: &[Vec<S>],
    kind: ReportKind,
) -> ExtractedTable {
    let header_texts: Vec<String> = headers
        .iter()
        .map(|h| h.as_ref().trim().to_string())
        .collect();
    if headers.is_empty() {
        return ExtractedTable::new(TableType::from(kind), header_texts, Vec::new());
    }
    let (columns, generic) = map_columns(headers, kind);
    let table_type = if generic {
        TableType::Generic
    } else {
        TableType::from(kind)
    };

    let mut samples = Vec::new();
    let mut seen_ids = HashSet::new();
    for (row_index, row) in rows.iter().enumerate() {
        if row.len() < headers.len() {
            debug!(
                row = row_index,
                cells = row.len(),
                expected = headers.len(),
                "short row skipped"
            );
            continue;
        }
        let Some(sample_id) = normalize_sample_id(row[0].as_ref()) else {
            continue;
        };
        if is_summary_row(&sample_id) || is_repeated_header(&sample_id, row, &header_texts[0]) {
            debug!(row = row_index, id = %sample_id, "summary or repeated header row skipped");
            continue;
        }
        if seen_ids.contains(&sample_id) {
            debug!(row = row_index, id = %sample_id, "duplicate sample id, keeping first");
            continue;
        }

        let mut sample = SampleRecord::new(sample_id.clone());
        for (i, key) in columns.iter().enumerate() {
            let Some(key) = key else { continue };
            let value = clean(row[i].as_ref());
            if value.is_empty() {
                continue;
            }
            sample.insert(key.clone(), value);
        }
        let has_reading = sample.data.values().any(|entry| match entry {
            DataEntry::Value(value) => is_reading(value),
            DataEntry::Group(_) => false,
        });
        if !has_reading {
            debug!(row = row_index, id = %sample.sample_id, "row without any reading skipped");
            continue;
        }
        if table_type == TableType::Leaf {
            add_leaf_groups(&mut sample);
        }
        seen_ids.insert(sample_id);
        samples.push(sample);
    }

    debug!(table_type = ?table_type, samples = samples.len(), "extracted table");
    ExtractedTable::new(table_type, header_texts, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;
    use pretty_assertions::assert_eq;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_a_minimal_soil_table() {
        let headers = row(&["Sample ID", "pH", "N (%)"]);
        let table = extract(&headers, &[row(&["S001", "4.5", "0.1"])]);
        assert_eq!(table.table_type, TableType::Soil);
        assert_eq!(table.total_samples, 1);
        let sample = &table.samples[0];
        assert_eq!(sample.sample_id, "S001");
        assert_eq!(sample.data.len(), 2);
        assert_eq!(sample.value("pH"), Some(&CellValue::Float(4.5)));
        assert_eq!(sample.value("N (%)"), Some(&CellValue::Float(0.1)));
    }

    #[test]
    fn leaf_samples_get_display_groups() {
        let headers = row(&[
            "Lab No.", "N (%)", "P (%)", "K (%)", "Mg (%)", "Ca (%)", "B (mg/kg)", "Cu (mg/kg)",
            "Zn (mg/kg)",
        ]);
        let rows = vec![row(&["L001", "2.45", "0.15", "1.02", "0.25", "0.6", "12", "5.1", "14"])];
        let table = extract(&headers, &rows);
        assert_eq!(table.table_type, TableType::Leaf);
        let sample = &table.samples[0];
        assert_eq!(sample.parameter_count(), 8);
        let percent = sample.group("% Dry Matter").unwrap();
        assert_eq!(percent.keys().cloned().collect::<Vec<_>>(), vec!["Ca", "K", "Mg", "N", "P"]);
        assert_eq!(percent["N"], CellValue::Float(2.45));
        let mgkg = sample.group("mg/kg Dry Matter").unwrap();
        assert_eq!(mgkg["B"], CellValue::Int(12));
        assert_eq!(mgkg.len(), 3);
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let headers = row(&["Sample", "pH", "CEC"]);
        let rows = vec![
            row(&["", "5.0", "6"]),
            row(&["S002", "4.8"]),
            row(&["S003", "", ""]),
            row(&["Mean", "4.9", "6.1"]),
            row(&["Sample", "pH", "CEC"]),
            row(&["S004", "abc", "<1"]),
            row(&["S004", "9.9", "9.9"]),
        ];
        let table = extract(&headers, &rows);
        assert_eq!(table.total_samples, 1);
        let sample = &table.samples[0];
        assert_eq!(sample.sample_id, "S004");
        assert_eq!(sample.value("pH"), Some(&CellValue::Text("abc".into())));
        assert_eq!(sample.value("CEC (meq%)"), Some(&CellValue::Text("<1".into())));
    }

    #[test]
    fn rows_of_plain_text_are_not_samples() {
        let headers = row(&["Site", "Texture", "Colour"]);
        let rows = vec![row(&["North", "loam", "brown"]), row(&["South", "clay", "N.D."])];
        let table = extract(&headers, &rows);
        assert_eq!(table.total_samples, 1);
        assert_eq!(table.samples[0].sample_id, "South");
        assert_eq!(table.samples[0].value("Texture"), Some(&CellValue::Text("clay".into())));
    }

    #[test]
    fn unmapped_headers_make_a_generic_table() {
        let headers = row(&["Plot", "Moisture", ""]);
        let table = extract(&headers, &[row(&["A1", "12.5", "3"])]);
        assert_eq!(table.table_type, TableType::Generic);
        let sample = &table.samples[0];
        assert_eq!(sample.value("Moisture"), Some(&CellValue::Float(12.5)));
        assert_eq!(sample.value("Column_2"), Some(&CellValue::Int(3)));
    }

    #[test]
    fn unmapped_columns_are_dropped_when_others_map() {
        let headers = row(&["Sample ID", "pH", "Remarks"]);
        let table = extract(&headers, &[row(&["S010", "5.2", "clay"])]);
        assert_eq!(table.samples[0].data.len(), 1);
        assert_eq!(table.headers, headers);
    }

    #[test]
    fn hint_is_used_only_without_evidence() {
        let headers = row(&["ID", "Nitrogen", "Phosphorus"]);
        let leaf = extract_with_hint(&headers, &[row(&["L1", "2.1", "0.2"])], ReportKind::Leaf);
        // "nitrogen" is soil evidence; the hint does not override it.
        assert_eq!(leaf.table_type, TableType::Soil);
        let headers = row(&["ID", "P", "K"]);
        let hinted = extract_with_hint(&headers, &[row(&["L1", "0.2", "1.1"])], ReportKind::Leaf);
        assert_eq!(hinted.table_type, TableType::Leaf);
        assert_eq!(hinted.samples[0].value("K (%)"), Some(&CellValue::Float(1.1)));
    }

    #[test]
    fn deterministic_output() {
        let headers = row(&["Sample ID", "pH", "Org. C (%)", "CEC (meq%)"]);
        let rows = vec![row(&["S1", "4.1", "1.2", "5"]), row(&["S2", "4.3", "0.9", "6"])];
        assert_eq!(extract(&headers, &rows), extract(&headers, &rows));
    }

    #[test]
    fn sample_id_normalization() {
        assert_eq!(normalize_sample_id(" S001: "), Some("S001".into()));
        assert_eq!(normalize_sample_id("Sample   12"), Some("Sample 12".into()));
        assert_eq!(normalize_sample_id(" - "), None);
        assert!(is_summary_row("Std. Dev"));
        assert!(is_summary_row("Total:"));
        assert!(is_summary_row("CV (%)"));
        assert!(!is_summary_row("S001"));
        assert!(!is_summary_row("Range 2"));
        assert!(!is_summary_row("Min-1"));
    }

    #[test]
    fn identifiers_that_look_like_labels_are_still_samples() {
        let headers = row(&["Sample ID", "pH", "CEC"]);
        let rows = vec![
            row(&["Zinc Block 3", "4.5", "6"]),
            row(&["Range 2", "5.0", "7"]),
            row(&["CV 12", "5.2", "7.5"]),
            row(&["Min-1", "4.9", "6.6"]),
            row(&["S003", "5.1", "8"]),
            row(&["Mean", "5.0", "7.0"]),
            row(&["Lab code", "pH", "CEC (meq%)"]),
        ];
        let table = extract(&headers, &rows);
        let ids: Vec<_> = table.samples.iter().map(|s| s.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["Zinc Block 3", "Range 2", "CV 12", "Min-1", "S003"]);
        assert_eq!(table.samples[0].value("pH"), Some(&CellValue::Float(4.5)));
    }
}
