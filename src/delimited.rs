//! CSV / TSV / TXT input.

use crate::types::RawTable;
use tracing::debug;

/// Candidates for sniffing, in tie-break order.
pub const SNIFF_CANDIDATES: [char; 4] = [',', '\t', '|', ';'];

#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedTable {
    /// `None` when the rows were split on runs of whitespace.
    pub delimiter: Option<char>,
    pub table: RawTable,
    /// The decoded input, used as raw text.
    pub text: String,
}

/// The candidate occurring most often in `line`, if any occurs at all.
pub fn sniff_delimiter(line: &str) -> Option<char> {
    let mut best: Option<(char, usize)> = None;
    for candidate in SNIFF_CANDIDATES {
        let count = line.matches(candidate).count();
        if count > 0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((candidate, count));
        }
    }
    best.map(|(d, _)| d)
}

/// Split one line, honouring double-quoted fields (`""` is a literal quote).
fn split_line(line: &str, delimiter: Option<char>) -> Vec<String> {
    let Some(delimiter) = delimiter else {
        return line.split_whitespace().map(str::to_string).collect();
    };
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Decode (lossy UTF-8, BOM stripped) and split into a header row plus data
/// rows. Blank lines are ignored.
pub fn read_delimited_table(bytes: &[u8]) -> DelimitedTable {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let body = text.trim_start_matches('\u{feff}');
    let mut lines = body.lines().filter(|l| !l.trim().is_empty());

    let Some(first) = lines.next() else {
        return DelimitedTable {
            delimiter: None,
            table: RawTable::default(),
            text,
        };
    };
    let delimiter = sniff_delimiter(first);
    debug!(delimiter = ?delimiter, "sniffed delimiter");

    let headers = split_line(first, delimiter);
    let rows = lines.map(|l| split_line(l, delimiter)).collect();
    DelimitedTable {
        delimiter,
        table: RawTable { headers, rows },
        text,
    }
}

/// Label used in extraction details.
pub fn delimiter_name(delimiter: Option<char>) -> &'static str {
    match delimiter {
        Some(',') => "comma",
        Some('\t') => "tab",
        Some('|') => "pipe",
        Some(';') => "semicolon",
        Some(_) => "other",
        None => "whitespace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sniffing_picks_the_most_frequent_candidate() {
        assert_eq!(sniff_delimiter("a,b,c"), Some(','));
        assert_eq!(sniff_delimiter("a\tb\tc,d"), Some('\t'));
        assert_eq!(sniff_delimiter("a;b"), Some(';'));
        assert_eq!(sniff_delimiter("a b c"), None);
    }

    #[test]
    fn quoted_fields_keep_delimiters() {
        let input = b"\xef\xbb\xbfSample ID,\"Exch. K, meq%\"\n\n\"S001\",\"0.1\"\n";
        let parsed = read_delimited_table(input);
        assert_eq!(parsed.delimiter, Some(','));
        assert_eq!(parsed.table.headers, vec!["Sample ID", "Exch. K, meq%"]);
        assert_eq!(parsed.table.rows, vec![vec!["S001".to_string(), "0.1".to_string()]]);
    }

    #[test]
    fn whitespace_fallback() {
        let parsed = read_delimited_table(b"ID pH\nS1   5.5");
        assert_eq!(parsed.delimiter, None);
        assert_eq!(delimiter_name(parsed.delimiter), "whitespace");
        assert_eq!(parsed.table.rows[0], vec!["S1", "5.5"]);
    }

    #[test]
    fn invalid_utf8_and_empty_input_do_not_fail() {
        let parsed = read_delimited_table(b"\xff\xfe\x00");
        assert_eq!(parsed.table.rows.len(), 0);
        let empty = read_delimited_table(b"   \n\n");
        assert!(empty.table.headers.is_empty());
    }
}
