use crate::error::{ExtractionError, Result};
use crate::types::{DataEntry, ExtractedTable, RawTable};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::io::Cursor;
use tracing::debug;

/// Every worksheet that holds at least one non-empty row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookTables {
    /// All sheet names in workbook order, including empty sheets.
    pub sheet_names: Vec<String>,
    /// `(sheet name, table)` for sheets with content.
    pub tables: Vec<(String, RawTable)>,
}

/// Cell text as the user sees it; whole floats print without a fraction.
fn cell_text(cell: &Data) -> String {
    if cell.is_empty() {
        return String::new();
    }
    cell.as_string()
        .unwrap_or_else(|| cell.to_string())
        .trim()
        .to_string()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.is_empty())
}

/// Read every worksheet of an `.xlsx`/`.xls` workbook. The first non-empty
/// row of a sheet is its header row; later blank rows are dropped.
pub fn read_workbook_tables(bytes: &[u8]) -> Result<WorkbookTables> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractionError::Spreadsheet(format!("Could not open Excel file: {}", e)))?;
    let sheet_names = workbook.sheet_names().to_vec();

    let mut tables = Vec::new();
    for name in &sheet_names {
        let range = workbook.worksheet_range(name).map_err(|e| {
            ExtractionError::Spreadsheet(format!("Sheet '{}' unreadable: {}", name, e))
        })?;
        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|row| !is_blank(row));
        let Some(headers) = rows.next() else {
            debug!(sheet = %name, "empty worksheet skipped");
            continue;
        };
        let rows: Vec<Vec<String>> = rows.collect();
        debug!(sheet = %name, columns = headers.len(), rows = rows.len(), "worksheet read");
        tables.push((name.clone(), RawTable { headers, rows }));
    }
    Ok(WorkbookTables { sheet_names, tables })
}

/// Text stand-in for a spreadsheet: one `"<id>: <parameter> <value>, ..."`
/// line per extracted sample. Display groups are left out.
pub fn synthesize_raw_text(tables: &[ExtractedTable]) -> String {
    let mut lines = Vec::new();
    for sample in tables.iter().flat_map(|t| &t.samples) {
        let values: Vec<String> = sample
            .data
            .iter()
            .filter_map(|(name, entry)| match entry {
                DataEntry::Value(value) => Some(format!("{} {}", name, value)),
                DataEntry::Group(_) => None,
            })
            .collect();
        lines.push(format!("{}: {}", sample.sample_id, values.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::services::table_extractor::extract;
    use rust_xlsxwriter::Workbook;

    fn workbook_bytes(build: impl FnOnce(&mut Workbook)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        build(&mut workbook);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_headers_and_numbers() {
        let bytes = workbook_bytes(|wb| {
            let sheet = wb.add_worksheet();
            sheet.set_name("Soil").unwrap();
            sheet.write_string(0, 0, "Sample ID").unwrap();
            sheet.write_string(0, 1, "pH").unwrap();
            sheet.write_string(0, 2, "Total P (mg/kg)").unwrap();
            sheet.write_string(2, 0, "S001").unwrap();
            sheet.write_number(2, 1, 4.5).unwrap();
            sheet.write_number(2, 2, 12.0).unwrap();
        });
        let book = read_workbook_tables(&bytes).unwrap();
        assert_eq!(book.sheet_names, vec!["Soil"]);
        let (name, table) = &book.tables[0];
        assert_eq!(name, "Soil");
        assert_eq!(table.headers, vec!["Sample ID", "pH", "Total P (mg/kg)"]);
        assert_eq!(table.rows, vec![vec!["S001".to_string(), "4.5".into(), "12".into()]]);
    }

    #[test]
    fn empty_sheets_are_listed_but_skipped() {
        let bytes = workbook_bytes(|wb| {
            wb.add_worksheet();
            let sheet = wb.add_worksheet();
            sheet.write_string(0, 0, "Lab No.").unwrap();
        });
        let book = read_workbook_tables(&bytes).unwrap();
        assert_eq!(book.sheet_names.len(), 2);
        assert_eq!(book.tables.len(), 1);
        assert!(book.tables[0].1.rows.is_empty());
    }

    #[test]
    fn garbage_is_a_spreadsheet_error() {
        let err = read_workbook_tables(b"PK\x03\x04 not really a zip").unwrap_err();
        assert!(matches!(err, ExtractionError::Spreadsheet(_)));
    }

    #[test]
    fn raw_text_lists_extracted_samples_only() {
        let headers: Vec<String> = vec!["Sample ID".into(), "pH".into(), "CEC".into()];
        let rows: Vec<Vec<String>> = vec![
            vec!["S001".into(), "4.5".into(), "6.5".into()],
            vec!["S002".into(), "".into(), "7".into()],
            vec!["Mean: ".into(), "4.5".into(), "6.8".into()],
            vec!["Sample ID".into(), "pH".into(), "CEC".into()],
        ];
        let table = extract(&headers, &rows);
        assert_eq!(
            synthesize_raw_text(&[table]),
            "S001: CEC (meq%) 6.5, pH 4.5\nS002: CEC (meq%) 7"
        );
    }
}
