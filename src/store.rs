// 🗃️ Trace Store - persisted configs, active line and scan history
//
// Key-value semantics, last write wins. The engines never touch the store;
// sessions read sets out of it and write imports back.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::entities::{LineConfig, ScanRecord};

/// configId → checkpoint name → scans (most recent first)
pub type ScanStorage = HashMap<String, HashMap<String, Vec<ScanRecord>>>;

pub trait TraceStore {
    fn get_configs(&self) -> Result<Vec<LineConfig>>;

    /// Upsert by id; a new config is prepended as newest
    fn save_config(&self, config: &LineConfig) -> Result<()>;

    /// `None` clears the active selection
    fn set_active_config_id(&self, id: Option<&str>) -> Result<()>;

    fn get_active_config(&self) -> Result<Option<LineConfig>>;

    /// Prepend one scan (most recent first)
    fn add_scan(&self, config_id: &str, checkpoint: &str, scan: ScanRecord) -> Result<()>;

    /// Prepend a whole batch ahead of existing scans
    fn add_bulk_scans(&self, config_id: &str, checkpoint: &str, scans: Vec<ScanRecord>) -> Result<()>;

    fn get_scans_for_point(&self, config_id: &str, checkpoint: &str) -> Result<Vec<ScanRecord>>;

    fn clear_point_scans(&self, config_id: &str, checkpoint: &str) -> Result<()>;

    fn get_config(&self, id: &str) -> Result<Option<LineConfig>> {
        Ok(self.get_configs()?.into_iter().find(|c| c.id == id))
    }
}

// Shared by both backends so the upsert/prepend rules live in one place
pub(crate) fn upsert_config(configs: &mut Vec<LineConfig>, config: &LineConfig) {
    match configs.iter().position(|c| c.id == config.id) {
        Some(i) => configs[i] = config.clone(),
        None => configs.insert(0, config.clone()),
    }
}

pub(crate) fn prepend_scans(storage: &mut ScanStorage, config_id: &str, checkpoint: &str, scans: Vec<ScanRecord>) {
    let point = storage
        .entry(config_id.to_string())
        .or_default()
        .entry(checkpoint.to_string())
        .or_default();

    let mut merged = scans;
    merged.append(point);
    *point = merged;
}

pub(crate) fn remove_point(storage: &mut ScanStorage, config_id: &str, checkpoint: &str) -> bool {
    storage
        .get_mut(config_id)
        .and_then(|points| points.remove(checkpoint))
        .is_some()
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Default)]
struct MemoryState {
    configs: Vec<LineConfig>,
    active_id: Option<String>,
    scans: ScanStorage,
}

/// In-process store for tests and one-shot CLI runs
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl TraceStore for MemoryStore {
    fn get_configs(&self) -> Result<Vec<LineConfig>> {
        Ok(self.read()?.configs.clone())
    }

    fn save_config(&self, config: &LineConfig) -> Result<()> {
        upsert_config(&mut self.write()?.configs, config);
        Ok(())
    }

    fn set_active_config_id(&self, id: Option<&str>) -> Result<()> {
        self.write()?.active_id = id.map(str::to_string);
        Ok(())
    }

    fn get_active_config(&self) -> Result<Option<LineConfig>> {
        let state = self.read()?;
        Ok(state
            .active_id
            .as_ref()
            .and_then(|id| state.configs.iter().find(|c| &c.id == id))
            .cloned())
    }

    fn add_scan(&self, config_id: &str, checkpoint: &str, scan: ScanRecord) -> Result<()> {
        prepend_scans(&mut self.write()?.scans, config_id, checkpoint, vec![scan]);
        Ok(())
    }

    fn add_bulk_scans(&self, config_id: &str, checkpoint: &str, scans: Vec<ScanRecord>) -> Result<()> {
        prepend_scans(&mut self.write()?.scans, config_id, checkpoint, scans);
        Ok(())
    }

    fn get_scans_for_point(&self, config_id: &str, checkpoint: &str) -> Result<Vec<ScanRecord>> {
        Ok(self
            .read()?
            .scans
            .get(config_id)
            .and_then(|points| points.get(checkpoint))
            .cloned()
            .unwrap_or_default())
    }

    fn clear_point_scans(&self, config_id: &str, checkpoint: &str) -> Result<()> {
        remove_point(&mut self.write()?.scans, config_id, checkpoint);
        Ok(())
    }
}
