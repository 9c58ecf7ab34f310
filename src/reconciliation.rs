// ⚖️ Reconciliation Engine - cross-checkpoint presence table
//
// Every tag seen at ANY checkpoint gets exactly one row: its model (via the
// catalog), its serial remainder, and whether each checkpoint saw it.
//
// Ordering:
//   resolved models first, UNKNOWN last
//   then model name, then serial with numeric-aware comparison ("9" < "10")

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::entities::{Catalog, Model, Reading, ScanRecord};
use crate::parser::ScanRow;
use crate::settings::{Settings, UnknownPolicy};

// ============================================================================
// CHECKPOINT
// ============================================================================

/// A named position in the line holding the tags of its latest import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    readings: BTreeMap<String, Reading>,
}

impl Checkpoint {
    pub fn new(name: &str) -> Self {
        Checkpoint {
            name: name.to_string(),
            readings: BTreeMap::new(),
        }
    }

    pub fn from_rows(name: &str, rows: Vec<ScanRow>) -> Self {
        let mut checkpoint = Checkpoint::new(name);
        checkpoint.replace(rows);
        checkpoint
    }

    pub fn from_tags<I, S>(name: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut checkpoint = Checkpoint::new(name);
        for tag in tags {
            checkpoint.insert(Reading::new(tag.as_ref()));
        }
        checkpoint
    }

    /// Rebuild from persisted scans, keeping imported counts and RSSI
    pub fn from_scans(name: &str, scans: &[ScanRecord]) -> Self {
        let mut checkpoint = Checkpoint::new(name);
        for scan in scans {
            checkpoint.insert(Reading::from(scan));
        }
        checkpoint
    }

    /// Replace the whole set with a fresh import (last import wins)
    pub fn replace(&mut self, rows: Vec<ScanRow>) {
        self.readings.clear();
        for row in rows {
            self.insert(Reading::from(row));
        }
    }

    /// Add one reading; a tag read twice in the same session stays one tag
    pub fn insert(&mut self, reading: Reading) {
        match self.readings.get_mut(&reading.tag_id) {
            Some(existing) => existing.absorb(&reading),
            None => {
                self.readings.insert(reading.tag_id.clone(), reading);
            }
        }
    }

    pub fn contains(&self, tag_id: &str) -> bool {
        self.readings.contains_key(tag_id)
    }

    pub fn reading(&self, tag_id: &str) -> Option<&Reading> {
        self.readings.get(tag_id)
    }

    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.readings.values()
    }

    pub fn tags(&self) -> BTreeSet<&str> {
        self.readings.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

// ============================================================================
// RECONCILED ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub tag_id: String,
    pub model: Model,
    pub serial: String,

    /// checkpoint name → seen in its latest import
    pub presence: BTreeMap<String, bool>,

    /// Reads summed over the checkpoints that saw the tag
    pub read_count: u32,

    /// Furthest checkpoint (line order) that saw the tag
    pub last_checkpoint: Option<String>,

    /// RSSI reported at `last_checkpoint`
    pub last_rssi: Option<String>,
}

impl ReconciledRow {
    pub fn is_present(&self, checkpoint: &str) -> bool {
        self.presence.get(checkpoint).copied().unwrap_or(false)
    }
}

/// Aggregates over a reconciled table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InventorySummary {
    pub total: usize,
    pub complete: usize,
    pub partial: usize,
    pub missing_from_first: usize,
}

/// Row count per model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCount {
    pub model: String,
    pub count: usize,
}

// ============================================================================
// INVENTORY TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InventoryTable {
    /// Checkpoint names in line order
    pub checkpoints: Vec<String>,

    pub rows: Vec<ReconciledRow>,

    /// Checkpoints whose latest import was non-empty
    pub checkpoints_loaded: usize,
}

impl InventoryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of checkpoints that saw this row
    pub fn presence_total(&self, row: &ReconciledRow) -> usize {
        self.checkpoints.iter().filter(|c| row.is_present(c)).count()
    }

    fn present_everywhere(&self, row: &ReconciledRow) -> bool {
        self.checkpoints.iter().all(|c| row.is_present(c))
    }

    /// Rows present at every checkpoint
    pub fn complete_count(&self) -> usize {
        self.rows.iter().filter(|r| self.present_everywhere(r)).count()
    }

    /// Rows present somewhere but not everywhere
    pub fn partial_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| {
                self.checkpoints.iter().any(|c| r.is_present(c)) && !self.present_everywhere(r)
            })
            .count()
    }

    /// Rows seen at the first checkpoint but missing from some later one
    pub fn missing_from_first_count(&self) -> usize {
        let Some((first, rest)) = self.checkpoints.split_first() else {
            return 0;
        };

        self.rows
            .iter()
            .filter(|r| r.is_present(first) && !rest.iter().all(|c| r.is_present(c)))
            .count()
    }

    pub fn summary(&self) -> InventorySummary {
        InventorySummary {
            total: self.rows.len(),
            complete: self.complete_count(),
            partial: self.partial_count(),
            missing_from_first: self.missing_from_first_count(),
        }
    }

    /// Case-insensitive substring filter over model, tag id and serial
    pub fn filter(&self, text: &str) -> Vec<&ReconciledRow> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.rows.iter().collect();
        }

        self.rows
            .iter()
            .filter(|r| {
                r.model.name().to_lowercase().contains(&needle)
                    || r.tag_id.to_lowercase().contains(&needle)
                    || r.serial.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Rows per model, most frequent first
    pub fn model_summary(&self) -> Vec<ModelCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in &self.rows {
            *counts.entry(row.model.name()).or_insert(0) += 1;
        }

        let mut summary: Vec<ModelCount> = counts
            .into_iter()
            .map(|(model, count)| ModelCount {
                model: model.to_string(),
                count,
            })
            .collect();

        summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.model.cmp(&b.model)));
        summary
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    pub unknown_policy: UnknownPolicy,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            unknown_policy: UnknownPolicy::Include,
        }
    }

    pub fn with_policy(unknown_policy: UnknownPolicy) -> Self {
        ReconciliationEngine { unknown_policy }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_policy(settings.unknown_policy)
    }

    /// Build the presence table for checkpoints given in line order
    pub fn reconcile(&self, checkpoints: &[Checkpoint], catalog: &Catalog) -> InventoryTable {
        let all_tags: BTreeSet<&str> = checkpoints.iter().flat_map(|c| c.tags()).collect();

        let mut rows: Vec<ReconciledRow> = all_tags
            .into_iter()
            .map(|tag| build_row(tag, checkpoints, catalog))
            .collect();

        if self.unknown_policy == UnknownPolicy::Filter {
            rows.retain(|r| !r.model.is_unknown());
        }

        rows.sort_by(compare_rows);

        let table = InventoryTable {
            checkpoints: checkpoints.iter().map(|c| c.name.clone()).collect(),
            rows,
            checkpoints_loaded: checkpoints.iter().filter(|c| !c.is_empty()).count(),
        };

        tracing::debug!(
            "reconciled {} tags across {} checkpoints ({} unknown)",
            table.len(),
            table.checkpoints.len(),
            table.rows.iter().filter(|r| r.model.is_unknown()).count()
        );

        table
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn build_row(tag: &str, checkpoints: &[Checkpoint], catalog: &Catalog) -> ReconciledRow {
    let resolution = catalog.resolve(tag);

    let mut presence = BTreeMap::new();
    let mut read_count = 0u32;
    let mut last: Option<&Checkpoint> = None;

    for checkpoint in checkpoints {
        let reading = checkpoint.reading(tag);
        presence.insert(checkpoint.name.clone(), reading.is_some());

        if let Some(r) = reading {
            read_count = read_count.saturating_add(r.count);
            last = Some(checkpoint);
        }
    }

    ReconciledRow {
        tag_id: tag.to_string(),
        model: resolution.model,
        serial: resolution.serial,
        presence,
        read_count,
        last_checkpoint: last.map(|c| c.name.clone()),
        last_rssi: last.and_then(|c| c.reading(tag)).map(|r| r.rssi.clone()),
    }
}

fn compare_rows(a: &ReconciledRow, b: &ReconciledRow) -> Ordering {
    a.model
        .is_unknown()
        .cmp(&b.model.is_unknown())
        .then_with(|| a.model.name().cmp(b.model.name()))
        .then_with(|| natural_cmp(&a.serial, &b.serial))
        .then_with(|| a.tag_id.cmp(&b.tag_id))
}

// ============================================================================
// NATURAL ORDER
// ============================================================================

/// Compare strings treating digit runs as numbers: "A9" < "A10"
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_numeric(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

// Arbitrary-length digit runs: compare without parsing
fn cmp_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

/// Splits a string into alternating digit / non-digit runs
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Chunks { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());

        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CatalogEntry;
    use proptest::prelude::*;

    fn catalog() -> Catalog {
        Catalog::from_entries(vec![
            CatalogEntry::new("AAAA", "X"),
            CatalogEntry::new("BBBB", "Y"),
        ])
    }

    fn three_points() -> Vec<Checkpoint> {
        vec![
            Checkpoint::from_tags("Entry", ["AAAA01", "AAAA02", "BBBB01", "ZZZZ01"]),
            Checkpoint::from_tags("Paint", ["AAAA01", "BBBB01", "ZZZZ01"]),
            Checkpoint::from_tags("Exit", ["AAAA01", "BBBB02"]),
        ]
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("9", "10"), Ordering::Less);
        assert_eq!(natural_cmp("A10", "A9"), Ordering::Greater);
        assert_eq!(natural_cmp("A2B10", "A2B3"), Ordering::Greater);
        assert_eq!(natural_cmp("007", "7"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abd"), Ordering::Less);
        assert_eq!(natural_cmp("", "1"), Ordering::Less);
        assert_eq!(natural_cmp("12", "12"), Ordering::Equal);
        assert_eq!(
            natural_cmp("123456789012345678901234567890", "99"),
            Ordering::Greater
        );
    }

    #[test]
    fn test_one_row_per_distinct_tag() {
        let table = ReconciliationEngine::new().reconcile(&three_points(), &catalog());
        // AAAA01 AAAA02 BBBB01 BBBB02 ZZZZ01
        assert_eq!(table.len(), 5);
        assert_eq!(table.checkpoints, vec!["Entry", "Paint", "Exit"]);
        assert_eq!(table.checkpoints_loaded, 3);
    }

    #[test]
    fn test_presence_and_aggregates() {
        let table = ReconciliationEngine::new().reconcile(&three_points(), &catalog());

        let row = table.rows.iter().find(|r| r.tag_id == "BBBB01").unwrap();
        assert!(row.is_present("Entry"));
        assert!(row.is_present("Paint"));
        assert!(!row.is_present("Exit"));
        assert_eq!(table.presence_total(row), 2);

        let summary = table.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.complete, 1); // AAAA01
        assert_eq!(summary.partial, 4);
        // AAAA02, BBBB01, ZZZZ01 start at Entry but don't reach every later point
        assert_eq!(summary.missing_from_first, 3);
    }

    #[test]
    fn test_sort_order_unknown_last_and_numeric_serials() {
        let points = vec![Checkpoint::from_tags(
            "Entry",
            ["AAAA10", "AAAA9", "ZZZZ00", "BBBB1", "AAAA100"],
        )];
        let table = ReconciliationEngine::new().reconcile(&points, &catalog());

        let order: Vec<(&str, &str)> = table
            .rows
            .iter()
            .map(|r| (r.model.name(), r.serial.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![
                ("X", "9"),
                ("X", "10"),
                ("X", "100"),
                ("Y", "1"),
                ("UNKNOWN", "ZZZZ00"),
            ]
        );
    }

    #[test]
    fn test_filter_unknown_policy() {
        let table = ReconciliationEngine::with_policy(UnknownPolicy::Filter)
            .reconcile(&three_points(), &catalog());
        assert_eq!(table.len(), 4);
        assert!(table.rows.iter().all(|r| !r.model.is_unknown()));
    }

    #[test]
    fn test_zero_checkpoints() {
        let table = ReconciliationEngine::new().reconcile(&[], &catalog());
        assert!(table.is_empty());
        assert_eq!(table.summary(), InventorySummary::default());
    }

    #[test]
    fn test_single_checkpoint_has_no_loss_from_first() {
        let points = vec![Checkpoint::from_tags("Entry", ["AAAA01", "AAAA02"])];
        let table = ReconciliationEngine::new().reconcile(&points, &catalog());
        assert_eq!(table.complete_count(), 2);
        assert_eq!(table.partial_count(), 0);
        assert_eq!(table.missing_from_first_count(), 0);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let engine = ReconciliationEngine::new();
        let points = three_points();
        let first = engine.reconcile(&points, &catalog());
        let second = engine.reconcile(&points, &catalog());
        assert_eq!(first, second);
        assert_eq!(first.summary(), second.summary());
    }

    #[test]
    fn test_empty_catalog_keeps_every_tag_unknown() {
        let table = ReconciliationEngine::new().reconcile(&three_points(), &Catalog::new());
        assert_eq!(table.len(), 5);
        assert!(table.rows.iter().all(|r| r.model.is_unknown()));
    }

    #[test]
    fn test_checkpoint_replace_and_dedup() {
        let rows = |tags: &[&str]| {
            tags.iter()
                .map(|t| ScanRow {
                    tag_id: t.to_string(),
                    count: 2,
                    rssi: "-50".to_string(),
                    line_number: 1,
                })
                .collect::<Vec<_>>()
        };

        let mut point = Checkpoint::from_rows("Entry", rows(&["AAAA01", "AAAA01", "AAAA02"]));
        assert_eq!(point.len(), 2);
        assert_eq!(point.reading("AAAA01").unwrap().count, 4);

        point.replace(rows(&["BBBB01"]));
        assert_eq!(point.len(), 1);
        assert!(!point.contains("AAAA01"));
    }

    #[test]
    fn test_read_count_and_last_checkpoint() {
        let table = ReconciliationEngine::new().reconcile(&three_points(), &catalog());
        let row = table.rows.iter().find(|r| r.tag_id == "ZZZZ01").unwrap();
        assert_eq!(row.read_count, 2);
        assert_eq!(row.last_checkpoint.as_deref(), Some("Paint"));
        assert_eq!(row.last_rssi.as_deref(), Some("0"));
    }

    #[test]
    fn test_filter_text() {
        let table = ReconciliationEngine::new().reconcile(&three_points(), &catalog());
        assert_eq!(table.filter("   ").len(), 5);
        assert_eq!(table.filter("bbbb").len(), 2);
        assert_eq!(table.filter("unknown").len(), 1);
        assert_eq!(table.filter("nothing-like-this").len(), 0);
    }

    #[test]
    fn test_model_summary() {
        let table = ReconciliationEngine::new().reconcile(&three_points(), &catalog());
        let summary = table.model_summary();
        assert_eq!(
            summary,
            vec![
                ModelCount { model: "X".to_string(), count: 2 },
                ModelCount { model: "Y".to_string(), count: 2 },
                ModelCount { model: "UNKNOWN".to_string(), count: 1 },
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_one_row_per_distinct_tag(
            sets in proptest::collection::vec(
                proptest::collection::vec("(AAAA|BBBB|CCCC)[0-9]{2,4}", 0..8),
                0..5,
            ),
        ) {
            let checkpoints: Vec<Checkpoint> = sets
                .iter()
                .enumerate()
                .map(|(i, tags)| Checkpoint::from_tags(&format!("P{}", i), tags))
                .collect();
            let union: BTreeSet<&String> = sets.iter().flatten().collect();

            let table = ReconciliationEngine::new().reconcile(&checkpoints, &catalog());
            prop_assert_eq!(table.len(), union.len());

            for row in &table.rows {
                let seen = table.presence_total(row);
                prop_assert!(seen >= 1 && seen <= checkpoints.len());
            }

            let filtered = ReconciliationEngine::with_policy(UnknownPolicy::Filter)
                .reconcile(&checkpoints, &catalog());
            let known = union.iter().filter(|t| !t.starts_with("CCCC")).count();
            prop_assert_eq!(filtered.len(), known);
        }
    }
}
