// 📤 Inventory export - semicolon CSV, every field quoted
//
//   EPC;LECTURAS;RSSI;PUNTO_CONTROL;FECHA
//
// One line per reconciled tag. LECTURAS sums reads over the checkpoints that
// saw the tag; RSSI and PUNTO_CONTROL come from the furthest one.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, WriterBuilder};
use std::path::Path;

use crate::reconciliation::InventoryTable;

pub const EXPORT_HEADER: [&str; 5] = ["EPC", "LECTURAS", "RSSI", "PUNTO_CONTROL", "FECHA"];

pub fn export_inventory(table: &InventoryTable, exported_at: DateTime<Utc>) -> Result<String> {
    let mut buf = Vec::new();
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .quote_style(QuoteStyle::Always)
        .from_writer(&mut buf);

    writer.write_record(EXPORT_HEADER)?;

    let fecha = exported_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    for row in &table.rows {
        let reads = row.read_count.to_string();
        writer.write_record([
            row.tag_id.as_str(),
            reads.as_str(),
            row.last_rssi.as_deref().unwrap_or("0"),
            row.last_checkpoint.as_deref().unwrap_or(""),
            fecha.as_str(),
        ])?;
    }

    writer.flush().context("Failed to flush CSV export")?;
    drop(writer);

    Ok(String::from_utf8(buf)?)
}

pub fn export_inventory_file(table: &InventoryTable, exported_at: DateTime<Utc>, path: &Path) -> Result<()> {
    let text = export_inventory(table, exported_at)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write export: {}", path.display()))?;
    tracing::info!("exported {} rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Catalog, CatalogEntry, Reading};
    use crate::parser::Normalizer;
    use crate::reconciliation::{Checkpoint, ReconciliationEngine};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn table() -> InventoryTable {
        let mut entry = Checkpoint::new("Entry");
        entry.insert(Reading {
            tag_id: "E2801111001".to_string(),
            count: 3,
            rssi: "-41".to_string(),
        });
        entry.insert(Reading::new("E2801111002"));

        let mut exit = Checkpoint::new("Exit");
        exit.insert(Reading {
            tag_id: "E2801111001".to_string(),
            count: 2,
            rssi: "-63".to_string(),
        });
        exit.insert(Reading::new("FFFF000001"));

        let catalog = Catalog::from_entries(vec![CatalogEntry::new("E2801111", "Chair")]);
        ReconciliationEngine::new().reconcile(&[entry, exit], &catalog)
    }

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_export_format() {
        let csv = export_inventory(&table(), at()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "\"EPC\";\"LECTURAS\";\"RSSI\";\"PUNTO_CONTROL\";\"FECHA\"");
        assert_eq!(
            lines[1],
            "\"E2801111001\";\"5\";\"-63\";\"Exit\";\"2025-03-01T12:00:00Z\""
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_export_round_trip_recovers_tag_set() {
        let table = table();
        let csv = export_inventory(&table, at()).unwrap();

        let reparsed: BTreeSet<String> = Normalizer::new()
            .parse_scans(&csv)
            .into_iter()
            .map(|r| r.tag_id)
            .collect();
        let original: BTreeSet<String> = table.rows.iter().map(|r| r.tag_id.clone()).collect();

        assert_eq!(reparsed, original);
    }

    #[test]
    fn test_export_round_trip_with_delimiter_and_quote_in_tag() {
        let entry = Checkpoint::from_tags("Entry", ["E280;AAAA01", "AB\"CDEF12"]);
        let table = ReconciliationEngine::new().reconcile(&[entry], &Catalog::new());
        let csv = export_inventory(&table, at()).unwrap();

        let back: BTreeSet<String> = Normalizer::new()
            .parse_scans(&csv)
            .into_iter()
            .map(|r| r.tag_id)
            .collect();

        assert_eq!(back, BTreeSet::from(["AB\"CDEF12".to_string(), "E280;AAAA01".to_string()]));
    }

    proptest! {
        #[test]
        fn prop_export_recovers_tag_set(
            tags in proptest::collection::btree_set("[A-Z0-9][A-Z0-9;,'\" ]{4,12}[A-Z0-9]", 0..10),
        ) {
            let entry = Checkpoint::from_tags("Entry", &tags);
            let table = ReconciliationEngine::new().reconcile(&[entry], &Catalog::new());
            let csv = export_inventory(&table, at()).unwrap();

            let back: BTreeSet<String> = Normalizer::new()
                .parse_scans(&csv)
                .into_iter()
                .map(|r| r.tag_id)
                .collect();
            prop_assert_eq!(back, tags);
        }
    }

    #[test]
    fn test_export_empty_table() {
        let csv = export_inventory(&InventoryTable::default(), at()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
