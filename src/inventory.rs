// 📦 Inventory Session - bulk import per checkpoint → reconciled table
//
// Flow:
//   1. active line from the store (required)
//   2. catalog CSV → Catalog
//   3. one CSV per checkpoint → Checkpoint set (re-import replaces)
//   4. reconcile + sequential diff on demand, always from the current sets

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::diff::{diff_sequential, SequentialDiff};
use crate::entities::{Catalog, LineConfig, ScanRecord};
use crate::error::TraceError;
use crate::parser::{read_text, Normalizer};
use crate::reconciliation::{Checkpoint, InventoryTable, ReconciliationEngine};
use crate::settings::Settings;
use crate::store::TraceStore;

pub struct InventorySession<'a> {
    store: &'a dyn TraceStore,
    line: LineConfig,
    catalog: Catalog,
    checkpoints: Vec<Checkpoint>,
    normalizer: Normalizer,
    engine: ReconciliationEngine,
}

impl<'a> InventorySession<'a> {
    /// Start a session on the active line
    pub fn open(store: &'a dyn TraceStore, settings: &Settings) -> Result<Self> {
        let line = store.get_active_config()?.ok_or(TraceError::NoActiveConfig)?;
        Ok(Self::for_line(store, line, settings))
    }

    pub fn for_line(store: &'a dyn TraceStore, line: LineConfig, settings: &Settings) -> Self {
        let checkpoints = line.locations.iter().map(|name| Checkpoint::new(name)).collect();

        InventorySession {
            store,
            line,
            catalog: Catalog::new(),
            checkpoints,
            normalizer: Normalizer::from_settings(settings),
            engine: ReconciliationEngine::from_settings(settings),
        }
    }

    pub fn line(&self) -> &LineConfig {
        &self.line
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Replace the catalog. Returns the number of entries.
    pub fn load_catalog(&mut self, text: &str) -> usize {
        self.catalog = Catalog::from_text(text, &self.normalizer);
        self.catalog.len()
    }

    pub fn load_catalog_file(&mut self, path: &Path) -> Result<usize> {
        Ok(self.load_catalog(&read_text(path)?))
    }

    /// Import one checkpoint's reader export, replacing its previous set and
    /// its persisted scans. Returns the number of distinct tags.
    pub fn import_checkpoint(&mut self, name: &str, text: &str, now: DateTime<Utc>) -> Result<usize> {
        let index = self
            .line
            .position(name)
            .ok_or_else(|| TraceError::UnknownCheckpoint(name.to_string()))?;

        let rows = self.normalizer.parse_scans(text);
        let checkpoint = &mut self.checkpoints[index];
        checkpoint.replace(rows);

        let scans: Vec<ScanRecord> = checkpoint
            .readings()
            .map(|reading| ScanRecord::from_reading(reading, name, now))
            .collect();
        let count = scans.len();

        self.store.clear_point_scans(&self.line.id, name)?;
        self.store.add_bulk_scans(&self.line.id, name, scans)?;

        if count == 0 {
            warn!("checkpoint {} imported with no valid tags", name);
        } else {
            info!("checkpoint {} imported: {} tags", name, count);
        }

        Ok(count)
    }

    pub fn import_checkpoint_file(&mut self, name: &str, path: &Path, now: DateTime<Utc>) -> Result<usize> {
        let text = read_text(path)?;
        self.import_checkpoint(name, &text, now)
    }

    /// Rebuild checkpoint sets from persisted scan history
    pub fn restore_from_store(&mut self) -> Result<()> {
        for checkpoint in &mut self.checkpoints {
            let scans = self.store.get_scans_for_point(&self.line.id, &checkpoint.name)?;
            *checkpoint = Checkpoint::from_scans(&checkpoint.name, &scans);
        }
        Ok(())
    }

    pub fn generate_table(&self) -> InventoryTable {
        self.engine.reconcile(&self.checkpoints, &self.catalog)
    }

    pub fn diff(&self) -> SequentialDiff {
        diff_sequential(&self.checkpoints)
    }
}
