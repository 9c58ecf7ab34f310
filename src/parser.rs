// 🧹 Normalizer - raw delimited text → typed rows
//
// Handheld exports and catalog sheets come in with any of `,` `;` or tab,
// quoted or not, with or without an "EPC" header row. Parsing is tolerant:
// a bad row is skipped, never fatal.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::settings::Settings;

/// Header sentinel found in the first column of exported files
pub const HEADER_SENTINEL: &str = "EPC";

// ============================================================================
// CORE TYPES
// ============================================================================

/// ParseMode - which kind of file is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    /// `prefix, model name[, ...]`
    Catalog,

    /// `EPC[, TID, COUNT, RSSI]`
    Scan,
}

impl ParseMode {
    pub fn name(&self) -> &str {
        match self {
            ParseMode::Catalog => "catalog",
            ParseMode::Scan => "scan",
        }
    }
}

/// One catalog line: a tag prefix and the model it identifies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub prefix: String,
    pub model_name: String,
    pub line_number: u64,
}

/// One reader line: a tag id plus whatever metadata the reader exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRow {
    pub tag_id: String,
    pub count: u32,
    pub rssi: String,
    pub line_number: u64,
}

/// CsvRow - a cleaned row, typed by file kind right after parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsvRow {
    Catalog(CatalogRow),
    Scan(ScanRow),
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Detect the field delimiter from the first non-empty line.
///
/// Priority: comma, semicolon, tab. Defaults to comma.
pub fn detect_delimiter(text: &str) -> u8 {
    let first = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    if first.contains(',') {
        b','
    } else if first.contains(';') {
        b';'
    } else if first.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Strip surrounding quotes (single or double) and whitespace
pub fn clean_field(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn has_balanced_quotes(line: &str) -> bool {
    line.matches('"').count() % 2 == 0
}

fn is_header(first_column: &str) -> bool {
    first_column.to_uppercase() == HEADER_SENTINEL
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct Normalizer {
    /// Minimum cleaned tag length (default: 6)
    pub min_tag_len: usize,

    /// Minimum catalog prefix length (default: 4, i.e. longer than 3)
    pub min_prefix_len: usize,
}

impl Normalizer {
    pub fn new() -> Self {
        Normalizer {
            min_tag_len: 6,
            min_prefix_len: 4,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Normalizer {
            min_tag_len: settings.min_tag_len,
            min_prefix_len: settings.min_prefix_len,
        }
    }

    /// Parse raw text into cleaned rows, in input order, not deduplicated.
    pub fn normalize(&self, text: &str, mode: ParseMode) -> Vec<CsvRow> {
        let delimiter = detect_delimiter(text);

        // Lines with balanced quotes are read as RFC 4180 (a quoted field may
        // hold the delimiter or a doubled quote). A stray quote falls back to
        // the raw reader so it cannot swallow the rest of the file.
        let mut quoted = ReaderBuilder::new();
        quoted.has_headers(false).flexible(true).delimiter(delimiter);
        let mut raw = ReaderBuilder::new();
        raw.has_headers(false).flexible(true).quoting(false).delimiter(delimiter);

        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let builder = if has_balanced_quotes(line) { &quoted } else { &raw };
            let record = match builder.from_reader(line.as_bytes()).records().next() {
                Some(Ok(r)) => r,
                Some(Err(e)) => {
                    debug!("skipping unreadable {} row: {}", mode.name(), e);
                    skipped += 1;
                    continue;
                }
                None => continue,
            };

            let line_number = index as u64 + 1;
            let fields: Vec<String> = record.iter().map(clean_field).collect();

            let row = match mode {
                ParseMode::Catalog => self.catalog_row(&fields, line_number).map(CsvRow::Catalog),
                ParseMode::Scan => self.scan_row(&fields, line_number).map(CsvRow::Scan),
            };

            match row {
                Some(r) => rows.push(r),
                None => skipped += 1,
            }
        }

        debug!(
            "normalized {} {} rows ({} skipped, delimiter {:?})",
            rows.len(),
            mode.name(),
            skipped,
            delimiter as char
        );

        rows
    }

    fn catalog_row(&self, fields: &[String], line_number: u64) -> Option<CatalogRow> {
        let prefix = fields.first()?.to_uppercase();
        let model_name = fields.get(1)?.clone();

        if is_header(&prefix) || prefix.chars().count() < self.min_prefix_len || model_name.is_empty() {
            return None;
        }

        Some(CatalogRow {
            prefix,
            model_name,
            line_number,
        })
    }

    fn scan_row(&self, fields: &[String], line_number: u64) -> Option<ScanRow> {
        let tag_id = fields.first()?.to_uppercase();

        if is_header(&tag_id) || tag_id.chars().count() < self.min_tag_len {
            return None;
        }

        // Reader layout: EPC, TID, COUNT, RSSI
        let count = fields
            .get(2)
            .and_then(|c| c.parse::<u32>().ok())
            .filter(|c| *c > 0)
            .unwrap_or(1);

        let rssi = fields
            .get(3)
            .filter(|r| !r.is_empty())
            .cloned()
            .unwrap_or_else(|| "0".to_string());

        Some(ScanRow {
            tag_id,
            count,
            rssi,
            line_number,
        })
    }

    /// Catalog-mode shorthand
    pub fn parse_catalog(&self, text: &str) -> Vec<CatalogRow> {
        self.normalize(text, ParseMode::Catalog)
            .into_iter()
            .filter_map(|row| match row {
                CsvRow::Catalog(c) => Some(c),
                CsvRow::Scan(_) => None,
            })
            .collect()
    }

    /// Scan-mode shorthand
    pub fn parse_scans(&self, text: &str) -> Vec<ScanRow> {
        self.normalize(text, ParseMode::Scan)
            .into_iter()
            .filter_map(|row| match row {
                CsvRow::Scan(s) => Some(s),
                CsvRow::Catalog(_) => None,
            })
            .collect()
    }

    /// Read a file and normalize it
    pub fn normalize_file(&self, path: &Path, mode: ParseMode) -> Result<Vec<CsvRow>> {
        let text = read_text(path)?;
        Ok(self.normalize(&text, mode))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an uploaded file as text. Invalid UTF-8 is replaced, not rejected.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter_priority() {
        assert_eq!(detect_delimiter("a,b;c\td"), b',');
        assert_eq!(detect_delimiter("a;b\tc"), b';');
        assert_eq!(detect_delimiter("a\tb"), b'\t');
        assert_eq!(detect_delimiter("abcdef"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn test_detect_delimiter_skips_blank_lines() {
        assert_eq!(detect_delimiter("\n  \r\nA;B\nC,D"), b';');
    }

    #[test]
    fn test_clean_field() {
        assert_eq!(clean_field("  \"E280ABC\"  "), "E280ABC");
        assert_eq!(clean_field("'Model X'"), "Model X");
        assert_eq!(clean_field("\" spaced \""), "spaced");
        assert_eq!(clean_field(""), "");
    }

    #[test]
    fn test_scan_rows_drop_header_short_and_blank() {
        let text = "EPC,TID,COUNT,RSSI\r\ne280aa01,tid,3,-45\r\n\r\nABC\r\n  \r\nE280AA02\r\n";
        let rows = Normalizer::new().parse_scans(text);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag_id, "E280AA01");
        assert_eq!(rows[0].count, 3);
        assert_eq!(rows[0].rssi, "-45");
        assert_eq!(rows[1].tag_id, "E280AA02");
        assert_eq!(rows[1].count, 1);
        assert_eq!(rows[1].rssi, "0");
    }

    #[test]
    fn test_scan_rows_keep_order_and_duplicates() {
        let text = "\"E280AA02\";x\n\"E280AA01\";x\n\"E280AA02\";x\n";
        let tags: Vec<String> = Normalizer::new()
            .parse_scans(text)
            .into_iter()
            .map(|r| r.tag_id)
            .collect();

        assert_eq!(tags, vec!["E280AA02", "E280AA01", "E280AA02"]);
    }

    #[test]
    fn test_scan_unparsable_count_defaults_to_one() {
        let rows = Normalizer::new().parse_scans("E280AA01\tT\tmany\t\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].rssi, "0");
    }

    #[test]
    fn test_catalog_rows() {
        let text = "epc;modelo\nab12;Short Prefix\nABC;Too Short\nE2801234;Chair\nE2805678;\nE280;Generic;ignored\nLONEPREFIX\n";
        let rows = Normalizer::new().parse_catalog(text);

        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.prefix.as_str(), r.model_name.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![("AB12", "Short Prefix"), ("E2801234", "Chair"), ("E280", "Generic")]
        );
    }

    #[test]
    fn test_normalize_returns_tagged_variants() {
        let n = Normalizer::new();
        assert!(matches!(
            n.normalize("E2801234,Chair", ParseMode::Catalog)[0],
            CsvRow::Catalog(_)
        ));
        assert!(matches!(
            n.normalize("E2801234,Chair", ParseMode::Scan)[0],
            CsvRow::Scan(_)
        ));
    }

    #[test]
    fn test_stray_quote_does_not_abort_file() {
        let rows = Normalizer::new().parse_scans("E280AA01\n\"E280AA02\nE280AA03\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].tag_id, "E280AA02");
    }

    #[test]
    fn test_quoted_fields_keep_delimiter_and_quotes() {
        let text = "EPC,TID\n\"E280;AAAA01\",t\n\"AB\"\"CDEF12\",t\n";
        let tags: Vec<String> = Normalizer::new()
            .parse_scans(text)
            .into_iter()
            .map(|r| r.tag_id)
            .collect();

        assert_eq!(tags, vec!["E280;AAAA01", "AB\"CDEF12"]);
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let rows = Normalizer::new().parse_scans("EPC\n\nE280AA01\n");
        assert_eq!(rows[0].line_number, 3);
    }

    #[test]
    fn test_custom_thresholds() {
        let n = Normalizer {
            min_tag_len: 3,
            min_prefix_len: 2,
        };
        assert_eq!(n.parse_scans("ABC\n").len(), 1);
        assert_eq!(n.parse_catalog("AB,Model\n").len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let n = Normalizer::new();
        assert!(n.normalize("", ParseMode::Scan).is_empty());
        assert!(n.normalize("\n\n", ParseMode::Catalog).is_empty());
    }
}
