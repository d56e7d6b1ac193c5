//! Advisory completeness checks over extracted samples.

use crate::types::{ExtractedTable, SampleRecord, TableType, ValidationWarning, WarningKind};

pub const SOIL_REQUIRED: &[&str] = &["pH", "Org. C (%)", "Avail P (mg/kg)"];
pub const LEAF_REQUIRED: &[&str] = &["N (%)", "P (%)", "K (%)"];
/// Plausible soil pH; readings outside are flagged, not dropped.
pub const PH_RANGE: (f64, f64) = (3.0, 10.0);

fn check_sample(
    table_index: usize,
    table_type: TableType,
    sample: &SampleRecord,
) -> Vec<ValidationWarning> {
    let required = match table_type {
        TableType::Soil => SOIL_REQUIRED,
        TableType::Leaf => LEAF_REQUIRED,
        TableType::Unknown | TableType::Generic => return Vec::new(),
    };
    let warn = |kind, parameter: &str, message: String| ValidationWarning {
        table_index,
        sample_id: sample.sample_id.clone(),
        kind,
        parameter: parameter.to_string(),
        message,
    };

    let mut warnings: Vec<ValidationWarning> = required
        .iter()
        .filter(|p| sample.value(p).is_none())
        .map(|p| {
            warn(
                WarningKind::MissingParameter,
                *p,
                format!("Sample {} is missing {}", sample.sample_id, p),
            )
        })
        .collect();

    if table_type == TableType::Soil {
        if let Some(ph) = sample.value("pH").and_then(|v| v.as_f64()) {
            let (low, high) = PH_RANGE;
            if !(low..=high).contains(&ph) {
                warnings.push(warn(
                    WarningKind::OutOfRange,
                    "pH",
                    format!(
                        "Sample {} has suspicious pH {} (expected {}-{})",
                        sample.sample_id, ph, low, high
                    ),
                ));
            }
        }
    }
    warnings
}

/// Warnings for every sample of every table, in table then sample order.
pub fn validate_tables(tables: &[ExtractedTable]) -> Vec<ValidationWarning> {
    tables
        .iter()
        .enumerate()
        .flat_map(|(i, table)| {
            table
                .samples
                .iter()
                .flat_map(move |sample| check_sample(i, table.table_type, sample))
        })
        .collect()
}
