//! Rebuild sample tables from unstructured OCR text.
//!
//! Strategies run in a fixed order and the first one producing at least one
//! sample wins: delimited rows, space-aligned rows, sample-ID anchors, and a
//! generic column split. Strategies that assign values by position (rather
//! than by a recognised header) mark the result as positional; callers should
//! treat such values as low confidence.

use crate::cleaner::is_measurement_token;
use crate::models::canonical_order;
use crate::services::classifier::classify_text;
use crate::services::standardizer::standardize_name_for;
use crate::services::table_extractor::{extract_as, extract_with_hint};
use crate::types::{ExtractedTable, ReportKind, SampleRecord, TableType};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info};

/// A single OCR line longer than this is split on sample-ID anchors first.
pub const SINGLE_LINE_THRESHOLD: usize = 100;
/// Candidate delimiters, in preference order on equal counts.
pub const DELIMITERS: [char; 4] = [',', '\t', '|', ';'];
/// Share of lines that must contain a delimiter for it to count as dense.
pub const DELIMITER_LINE_SHARE: f64 = 0.6;
/// Minimum cells per delimited row.
pub const MIN_DELIMITED_CELLS: usize = 3;
/// Minimum whitespace tokens on a space-aligned data row.
pub const MIN_ALIGNED_TOKENS: usize = 3;
/// Share of non-identifier tokens that must be measurements on an aligned row.
pub const MIN_NUMERIC_SHARE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Delimited,
    SpaceAligned,
    StructuredSampleId,
    Generic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Delimited => "delimited",
            Strategy::SpaceAligned => "space_aligned",
            Strategy::StructuredSampleId => "structured_sample_id",
            Strategy::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub table_type: TableType,
    pub headers: Vec<String>,
    pub samples: Vec<SampleRecord>,
    /// Strategy that produced the samples; `None` when all strategies failed.
    pub strategy: Option<Strategy>,
    /// Values were assigned by column position, not by a recognised header.
    pub positional: bool,
}

impl Reconstruction {
    fn empty(hint: ReportKind) -> Self {
        Self {
            table_type: TableType::from(hint),
            headers: Vec::new(),
            samples: Vec::new(),
            strategy: None,
            positional: false,
        }
    }

    fn from_table(table: ExtractedTable, strategy: Strategy, positional: bool) -> Option<Self> {
        if table.samples.is_empty() {
            return None;
        }
        Some(Self {
            table_type: table.table_type,
            headers: table.headers,
            samples: table.samples,
            strategy: Some(strategy),
            positional,
        })
    }

    pub fn into_table(self) -> ExtractedTable {
        ExtractedTable::new(self.table_type, self.headers, self.samples)
    }
}

/// A pattern that fails to compile matches nothing.
fn regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn lab_code_anchor() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"\b[SLP]\d{1,5}(?:/\d{1,4})?\b")
}

fn sample_word_anchor() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"(?i)\bsample\s*(?:no\.?\s*|id\s*)?(\d{1,5})\b")
}

fn lab_no_anchor() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"(?i)\blab\s*(?:no\.?|number)\s*(\d{1,6})\b")
}

fn id_token() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"^(?:[SLPslp]\d{1,5}(?:/\d{1,4})?|\d{1,3})$")
}

fn column_gap() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"\t+|\s{2,}")
}

/// Cells of a line split on tabs or runs of two or more spaces.
fn split_columns(line: &str) -> Vec<String> {
    let cells: Vec<String> = match column_gap() {
        Some(gap) => gap.split(line).map(|c| c.trim().to_string()).collect(),
        None => vec![line.trim().to_string()],
    };
    cells.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Split into non-empty lines with control characters (except tabs) removed.
fn prepare_lines(raw_text: &str) -> Vec<String> {
    raw_text
        .lines()
        .map(|line| {
            line.chars()
                .filter(|c| *c == '\t' || !c.is_control())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Join lines and keep only `[A-Za-z0-9 .-()/<>]`, collapsing whitespace.
pub fn normalize_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            let table_char = matches!(c, ' ' | '.' | '-' | '(' | ')' | '/' | '<' | '>');
            if c.is_ascii_alphanumeric() || table_char {
                c
            } else {
                ' '
            }
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Anchor {
    id: String,
    start: usize,
    end: usize,
}

/// Sample-ID anchors of the first pattern tier that matches anything:
/// lab codes (`S001`, `L12`, `P220/25`), then `Sample N`, then `Lab No. N`.
fn find_anchors(text: &str) -> Vec<Anchor> {
    let codes: Vec<Anchor> = lab_code_anchor()
        .map(|re| {
            re.find_iter(text)
                .map(|m| Anchor {
                    id: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                })
                .collect()
        })
        .unwrap_or_default();
    if !codes.is_empty() {
        return codes;
    }
    let numbered = |re: Option<&Regex>, label: &str| -> Vec<Anchor> {
        let Some(re) = re else { return Vec::new() };
        re.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1)?;
                Some(Anchor {
                    id: format!("{} {}", label, number.as_str()),
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect()
    };
    let samples = numbered(sample_word_anchor(), "Sample");
    if !samples.is_empty() {
        return samples;
    }
    numbered(lab_no_anchor(), "Lab No.")
}

/// Break one long OCR line into pseudo-lines starting at each sample anchor.
fn split_single_line(line: &str) -> Vec<String> {
    let anchors = find_anchors(line);
    if anchors.len() < 2 {
        return vec![line.to_string()];
    }
    let mut parts = Vec::new();
    let head = line[..anchors[0].start].trim();
    if !head.is_empty() {
        parts.push(head.to_string());
    }
    for (i, anchor) in anchors.iter().enumerate() {
        let end = anchors.get(i + 1).map_or(line.len(), |next| next.start);
        let part = line[anchor.start..end].trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
    }
    debug!(pieces = parts.len(), "split single-line OCR output on sample anchors");
    parts
}

fn measurement_values(tokens: &[&str]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| is_measurement_token(t))
        .map(|t| {
            t.trim_matches(|c: char| matches!(c, '(' | ')' | ':' | ',' | ';'))
                .to_string()
        })
        .collect()
}

/// Build a table from `(sample id, ordered values)` rows by assigning values
/// to the domain's canonical slots in order. Unknown domains get
/// `Parameter_N` columns and come back as a generic table.
pub fn positional_table(rows: &[(String, Vec<String>)], kind: ReportKind) -> ExtractedTable {
    let max_values = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let mut headers = vec!["Sample ID".to_string()];
    if kind.is_known() {
        let slots = canonical_order(kind);
        if max_values > slots.len() {
            debug!(values = max_values, slots = slots.len(), "extra positional values dropped");
        }
        headers.extend(slots.iter().take(max_values).map(|s| s.to_string()));
    } else {
        headers.extend((0..max_values).map(|i| format!("Parameter_{}", i)));
    }
    let width = headers.len();
    let table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|(id, values)| {
            let mut cells = Vec::with_capacity(width);
            cells.push(id.clone());
            cells.extend(values.iter().take(width - 1).cloned());
            cells.resize(width, String::new());
            cells
        })
        .collect();
    extract_as(&headers, &table_rows, kind)
}

fn split_delimited(line: &str, delimiter: char) -> Vec<String> {
    let mut cells: Vec<String> = line
        .split(delimiter)
        .map(|c| c.trim().trim_matches('"').trim().to_string())
        .collect();
    while cells.first().map_or(false, |c| c.is_empty()) {
        cells.remove(0);
    }
    while cells.last().map_or(false, |c| c.is_empty()) {
        cells.pop();
    }
    cells
}

/// The delimiter present on most lines, if it is dense enough to trust.
pub fn dense_delimiter(lines: &[String]) -> Option<char> {
    if lines.is_empty() {
        return None;
    }
    let mut best: Option<(char, usize)> = None;
    for delimiter in DELIMITERS {
        let with = lines.iter().filter(|l| l.contains(delimiter)).count();
        let total: usize = lines.iter().map(|l| l.matches(delimiter).count()).sum();
        if with == 0 || (with as f64) < DELIMITER_LINE_SHARE * lines.len() as f64 {
            continue;
        }
        if total < with * (MIN_DELIMITED_CELLS - 1) {
            continue;
        }
        if best.map_or(true, |(_, t)| total > t) {
            best = Some((delimiter, total));
        }
    }
    best.map(|(d, _)| d)
}

/// At least two header cells name known parameters.
fn looks_like_header(cells: &[String], kind: ReportKind) -> bool {
    cells
        .iter()
        .skip(1)
        .filter(|c| standardize_name_for(c, kind).is_some())
        .count()
        >= 2
}

fn try_delimited(lines: &[String], kind: ReportKind) -> Option<Reconstruction> {
    let delimiter = dense_delimiter(lines)?;
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|l| split_delimited(l, delimiter))
        .filter(|cells| cells.iter().filter(|c| !c.is_empty()).count() >= 2)
        .collect();
    if rows.is_empty() {
        return None;
    }
    debug!(delimiter = ?delimiter, rows = rows.len(), "trying delimited parsing");
    if looks_like_header(&rows[0], kind) {
        let table = extract_with_hint(&rows[0], &rows[1..], kind);
        return Reconstruction::from_table(table, Strategy::Delimited, false);
    }
    let positional: Vec<(String, Vec<String>)> = rows
        .into_iter()
        .map(|mut cells| {
            let id = cells.remove(0);
            (id, cells)
        })
        .collect();
    Reconstruction::from_table(positional_table(&positional, kind), Strategy::Delimited, true)
}

/// `(id, remaining tokens)` when a line starts with a sample identifier.
fn split_identifier<'a>(tokens: &[&'a str]) -> Option<(String, Vec<&'a str>)> {
    let first = tokens.first()?.trim_end_matches([':', ',', ';']);
    let lower = first.to_lowercase();
    if lower == "sample" {
        let number = tokens.get(1)?.trim_end_matches([':', ',', ';']);
        if number.chars().all(|c| c.is_ascii_digit()) && !number.is_empty() {
            return Some((format!("Sample {}", number), tokens[2..].to_vec()));
        }
        return None;
    }
    if lower == "lab" {
        let no = tokens.get(1)?.to_lowercase();
        let number = tokens.get(2)?.trim_end_matches([':', ',', ';']);
        let is_number = !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
        if (no == "no" || no == "no.") && is_number {
            return Some((format!("Lab No. {}", number), tokens[3..].to_vec()));
        }
        return None;
    }
    if id_token().is_some_and(|re| re.is_match(first)) {
        return Some((first.to_string(), tokens[1..].to_vec()));
    }
    None
}

/// `(id, values)` for a line that reads as one aligned data row.
fn aligned_row(line: &str) -> Option<(String, Vec<String>)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_ALIGNED_TOKENS || !line.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let (id, rest) = split_identifier(&tokens)?;
    if rest.len() < 2 {
        return None;
    }
    let values = measurement_values(&rest);
    if (values.len() as f64) < MIN_NUMERIC_SHARE * rest.len() as f64 {
        return None;
    }
    Some((id, values))
}

fn try_space_aligned(lines: &[String], kind: ReportKind) -> Option<Reconstruction> {
    let mut rows = Vec::new();
    let mut first_data_line = None;
    for (i, line) in lines.iter().enumerate() {
        if let Some(row) = aligned_row(line) {
            first_data_line.get_or_insert(i);
            rows.push(row);
        }
    }
    let first = first_data_line?;
    debug!(rows = rows.len(), "trying space-aligned parsing");

    // A header line split on wide gaps that lines up with the data wins over
    // positional assignment.
    if first > 0 {
        let header = split_columns(&lines[first - 1]);
        let width = rows[0].1.len() + 1;
        let aligned = rows.iter().all(|(_, v)| v.len() + 1 == width);
        if aligned && header.len() == width && looks_like_header(&header, kind) {
            let table_rows: Vec<Vec<String>> = rows
                .iter()
                .map(|(id, values)| {
                    std::iter::once(id.clone())
                        .chain(values.iter().cloned())
                        .collect()
                })
                .collect();
            let table = extract_with_hint(&header, &table_rows, kind);
            return Reconstruction::from_table(table, Strategy::SpaceAligned, false);
        }
    }
    Reconstruction::from_table(positional_table(&rows, kind), Strategy::SpaceAligned, true)
}

fn try_structured_sample_ids(lines: &[String], kind: ReportKind) -> Option<Reconstruction> {
    let text = normalize_text(&lines.join(" "));
    let anchors = find_anchors(&text);
    let mut rows: Vec<(String, Vec<String>)> = Vec::new();
    let mut seen = HashSet::new();

    if anchors.is_empty() {
        // Bare 1-3 digit numbers leading a line are the weakest anchors.
        for line in lines {
            let normalized = normalize_text(line);
            let tokens: Vec<&str> = normalized.split_whitespace().collect();
            let Some(first) = tokens.first() else { continue };
            if first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let values = measurement_values(&tokens[1..]);
            if values.len() >= 2 && seen.insert(first.to_string()) {
                rows.push((first.to_string(), values));
            }
        }
    } else {
        for (i, anchor) in anchors.iter().enumerate() {
            let end = anchors.get(i + 1).map_or(text.len(), |next| next.start);
            let chunk = &text[anchor.end..end];
            let tokens: Vec<&str> = chunk.split_whitespace().collect();
            let values = measurement_values(&tokens);
            if values.is_empty() || seen.contains(&anchor.id) {
                continue;
            }
            seen.insert(anchor.id.clone());
            rows.push((anchor.id.clone(), values));
        }
    }
    if rows.is_empty() {
        return None;
    }
    debug!(samples = rows.len(), "trying structured sample-id parsing");
    Reconstruction::from_table(positional_table(&rows, kind), Strategy::StructuredSampleId, true)
}

fn try_generic(lines: &[String], kind: ReportKind) -> Option<Reconstruction> {
    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|l| split_columns(l))
        .filter(|cells| cells.len() >= 2)
        .collect();
    if rows.len() < 2 {
        return None;
    }
    debug!(rows = rows.len(), "trying generic column split");
    let table = extract_with_hint(&rows[0], &rows[1..], kind);
    Reconstruction::from_table(table, Strategy::Generic, false)
}

/// Recover samples from raw OCR text. Never fails: when nothing can be
/// recovered the result has no samples and the hinted type.
pub fn reconstruct(raw_text: &str, hint: ReportKind) -> Reconstruction {
    let mut lines = prepare_lines(raw_text);
    if lines.is_empty() {
        return Reconstruction::empty(hint);
    }
    if lines.len() == 1 && lines[0].chars().count() > SINGLE_LINE_THRESHOLD {
        lines = split_single_line(&lines[0]);
    }
    let kind = if hint.is_known() {
        hint
    } else {
        classify_text(raw_text)
    };

    let strategies: [(Strategy, fn(&[String], ReportKind) -> Option<Reconstruction>); 4] = [
        (Strategy::Delimited, try_delimited),
        (Strategy::SpaceAligned, try_space_aligned),
        (Strategy::StructuredSampleId, try_structured_sample_ids),
        (Strategy::Generic, try_generic),
    ];
    for (strategy, run) in strategies {
        if let Some(found) = run(&lines, kind) {
            info!(
                strategy = strategy.as_str(),
                samples = found.samples.len(),
                positional = found.positional,
                "reconstructed table from raw text"
            );
            return found;
        }
    }
    debug!("no reconstruction strategy produced samples");
    Reconstruction::empty(hint)
}
