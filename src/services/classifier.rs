//! Soil vs leaf classification of detected tables and raw OCR text.
//!
//! Every weight and keyword list lives here so the heuristics can be tuned
//! without touching control flow.

use crate::services::standardizer::{boundary_matches, contains_at_boundary, normalize_name};
use crate::types::ReportKind;
use tracing::debug;

/// Weight of a keyword that only shows up in one domain.
pub const SPECIFIC_WEIGHT: u32 = 2;
/// Weight of nutrient keywords shared by both report layouts.
pub const GENERIC_WEIGHT: u32 = 1;
/// Header hits count this many times a data-row hit.
pub const HEADER_MULTIPLIER: u32 = 2;
pub const ROW_MULTIPLIER: u32 = 1;
/// Only the first few data rows are inspected.
pub const ROWS_SAMPLED: usize = 3;
/// Tie with both scores above zero resolves to this domain.
pub const TIE_BREAK: ReportKind = ReportKind::Soil;

pub const SOIL_SPECIFIC_KEYWORDS: &[&str] = &[
    "cec",
    "exch.",
    "exch k",
    "exch ca",
    "exch mg",
    "exchangeable",
    "organic",
    "org. c",
    "org c",
    "avail p",
    "avail. p",
    "available p",
    "total p",
    "meq%",
    "cmol",
    "soil",
];

pub const SOIL_GENERIC_KEYWORDS: &[&str] = &["ph", "n (%)", "nitrogen"];

pub const LEAF_SPECIFIC_KEYWORDS: &[&str] = &[
    "% dry matter",
    "mg/kg dry matter",
    "dry matter",
    "b (mg/kg)",
    "cu (mg/kg)",
    "zn (mg/kg)",
    "boron",
    "copper",
    "zinc",
    "leaf",
    "frond",
    "foliar",
];

pub const LEAF_GENERIC_KEYWORDS: &[&str] = &["n (%)", "p (%)", "k (%)", "mg (%)", "ca (%)"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeScores {
    pub soil: u32,
    pub leaf: u32,
}

impl TypeScores {
    pub fn decide(&self) -> ReportKind {
        if self.soil == 0 && self.leaf == 0 {
            ReportKind::Unknown
        } else if self.soil > self.leaf {
            ReportKind::Soil
        } else if self.leaf > self.soil {
            ReportKind::Leaf
        } else {
            TIE_BREAK
        }
    }
}

/// Weighted number of distinct keywords present in one cell.
fn cell_hits(cell: &str, specific: &[&str], generic: &[&str]) -> u32 {
    let specific_hits = specific.iter().filter(|k| contains_at_boundary(cell, k)).count() as u32;
    let generic_hits = generic.iter().filter(|k| contains_at_boundary(cell, k)).count() as u32;
    specific_hits * SPECIFIC_WEIGHT + generic_hits * GENERIC_WEIGHT
}

fn score_cell(cell: &str, multiplier: u32, scores: &mut TypeScores) {
    let cell = normalize_name(cell);
    if cell.is_empty() {
        return;
    }
    scores.soil += cell_hits(&cell, SOIL_SPECIFIC_KEYWORDS, SOIL_GENERIC_KEYWORDS) * multiplier;
    scores.leaf += cell_hits(&cell, LEAF_SPECIFIC_KEYWORDS, LEAF_GENERIC_KEYWORDS) * multiplier;
}

pub fn score_table<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> TypeScores {
    let mut scores = TypeScores::default();
    for header in headers {
        score_cell(header.as_ref(), HEADER_MULTIPLIER, &mut scores);
    }
    for row in rows.iter().take(ROWS_SAMPLED) {
        for cell in row {
            score_cell(cell.as_ref(), ROW_MULTIPLIER, &mut scores);
        }
    }
    scores
}

/// Decide soil/leaf/unknown for one detected table.
pub fn classify<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> ReportKind {
    let scores = score_table(headers, rows);
    let kind = scores.decide();
    debug!(soil = scores.soil, leaf = scores.leaf, kind = %kind, "classified table");
    kind
}

pub fn score_text(text: &str) -> TypeScores {
    let text = normalize_name(text);
    let weigh = |specific: &[&str], generic: &[&str]| -> u32 {
        let s: usize = specific.iter().map(|k| boundary_matches(&text, k)).sum();
        let g: usize = generic.iter().map(|k| boundary_matches(&text, k)).sum();
        s as u32 * SPECIFIC_WEIGHT + g as u32 * GENERIC_WEIGHT
    };
    TypeScores {
        soil: weigh(SOIL_SPECIFIC_KEYWORDS, SOIL_GENERIC_KEYWORDS),
        leaf: weigh(LEAF_SPECIFIC_KEYWORDS, LEAF_GENERIC_KEYWORDS),
    }
}

/// Classification from free text, e.g. a whole OCR page.
pub fn classify_text(text: &str) -> ReportKind {
    let scores = score_text(text);
    let kind = scores.decide();
    debug!(soil = scores.soil, leaf = scores.leaf, kind = %kind, "classified text");
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn soil_headers() {
        let headers = strings(&[
            "Sample ID",
            "pH",
            "N (%)",
            "Org. C (%)",
            "Total P (mg/kg)",
            "Avail P (mg/kg)",
            "Exch. K (meq%)",
            "CEC (meq%)",
        ]);
        assert_eq!(classify(&headers, &[]), ReportKind::Soil);
    }

    #[test]
    fn leaf_headers() {
        let headers = strings(&[
            "Lab No.",
            "N (%)",
            "P (%)",
            "K (%)",
            "Mg (%)",
            "Ca (%)",
            "B (mg/kg)",
            "Cu (mg/kg)",
            "Zn (mg/kg)",
        ]);
        assert_eq!(classify(&headers, &[]), ReportKind::Leaf);
    }

    #[test]
    fn generic_only_headers_prefer_soil() {
        assert_eq!(classify(&strings(&["pH", "N (%)"]), &[]), ReportKind::Soil);
        let tied = score_table(&strings(&["N (%)"]), &[]);
        assert_eq!(tied.soil, tied.leaf);
        assert_eq!(tied.decide(), ReportKind::Soil);
    }

    #[test]
    fn no_evidence_is_unknown() {
        assert_eq!(classify(&strings(&["Name", "Value"]), &[]), ReportKind::Unknown);
        assert_eq!(classify::<String>(&[], &[]), ReportKind::Unknown);
        assert_eq!(classify_text(""), ReportKind::Unknown);
    }

    #[test]
    fn rows_contribute_less_than_headers() {
        let headers = strings(&["Sample", "A", "B"]);
        let rows = vec![strings(&["Leaf analysis", "x", "y"])];
        let scores = score_table(&headers, &rows);
        assert_eq!(scores.leaf, SPECIFIC_WEIGHT * ROW_MULTIPLIER);
        assert_eq!(classify(&headers, &rows), ReportKind::Leaf);

        let many_rows: Vec<Vec<String>> = (0..10).map(|_| strings(&["soil"])).collect();
        let scores = score_table(&strings(&["x"]), &many_rows);
        assert_eq!(scores.soil, SPECIFIC_WEIGHT * ROWS_SAMPLED as u32);
    }

    #[test]
    fn text_classification() {
        let soil = "SOIL ANALYSIS REPORT S001 pH 4.5 Org. C 0.8 CEC 6.5 Exch. K 0.1";
        assert_eq!(classify_text(soil), ReportKind::Soil);
        let leaf = "LEAF ANALYSIS % Dry Matter N P K mg/kg Dry Matter B Cu Zn L001 2.4";
        assert_eq!(classify_text(leaf), ReportKind::Leaf);
    }

    #[test]
    fn keywords_respect_word_boundaries() {
        assert_eq!(classify(&strings(&["Phosphorus"]), &[]), ReportKind::Unknown);
        assert_eq!(classify(&strings(&["Mn (%)"]), &[]), ReportKind::Unknown);
    }
}
