// 🔫 Operator Session - live capture at one checkpoint
//
// The reader types the tag id into an input; once it reaches the minimum
// length the read is processed: trimmed, debounced, recorded (most recent
// first) under the selected checkpoint of the active line.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deduplication::ScanDebouncer;
use crate::entities::{LineConfig, ScanRecord};
use crate::error::TraceError;
use crate::progress::{progress_for, Progress};
use crate::settings::Settings;
use crate::store::TraceStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcome {
    /// Stored as a new scan
    Recorded(ScanRecord),

    /// Same tag inside the bounce window; input cleared, nothing stored
    Bounced,

    /// Not enough characters yet; keep reading
    Incomplete,
}

pub struct OperatorSession<'a> {
    store: &'a dyn TraceStore,
    line: LineConfig,
    selected: usize,
    debouncer: ScanDebouncer,
    min_tag_len: usize,

    /// Most recent first, across all checkpoints of the line
    history: Vec<ScanRecord>,
}

impl<'a> OperatorSession<'a> {
    /// Start on the active line with its first checkpoint selected
    pub fn open(store: &'a dyn TraceStore, settings: &Settings) -> Result<Self> {
        let line = store.get_active_config()?.ok_or(TraceError::NoActiveConfig)?;
        if line.is_empty() {
            return Err(TraceError::EmptyLine.into());
        }

        let mut history = Vec::new();
        for name in &line.locations {
            history.extend(store.get_scans_for_point(&line.id, name)?);
        }
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(OperatorSession {
            store,
            line,
            selected: 0,
            debouncer: ScanDebouncer::with_window(settings.debounce_window()),
            min_tag_len: settings.min_tag_len,
            history,
        })
    }

    pub fn line(&self) -> &LineConfig {
        &self.line
    }

    pub fn selected_checkpoint(&self) -> &str {
        &self.line.locations[self.selected]
    }

    pub fn select_checkpoint(&mut self, name: &str) -> Result<()> {
        self.selected = self
            .line
            .position(name)
            .ok_or_else(|| TraceError::UnknownCheckpoint(name.to_string()))?;
        Ok(())
    }

    /// Called on every input change; processes once long enough
    pub fn on_input(&mut self, value: &str, now: DateTime<Utc>) -> Result<ScanOutcome> {
        if value.trim().chars().count() < self.min_tag_len {
            return Ok(ScanOutcome::Incomplete);
        }
        self.record(value, now)
    }

    /// Process one complete read
    pub fn record(&mut self, raw: &str, now: DateTime<Utc>) -> Result<ScanOutcome> {
        let tag_id = raw.trim().to_uppercase();
        if tag_id.is_empty() {
            return Ok(ScanOutcome::Incomplete);
        }

        if !self.debouncer.accept_scan(&tag_id, now).is_accepted() {
            return Ok(ScanOutcome::Bounced);
        }

        let checkpoint = self.selected_checkpoint().to_string();
        let scan = ScanRecord::new(&tag_id, &checkpoint, now);
        self.store.add_scan(&self.line.id, &checkpoint, scan.clone())?;
        self.history.insert(0, scan.clone());

        tracing::info!("scan {} at {}", tag_id, checkpoint);
        Ok(ScanOutcome::Recorded(scan))
    }

    pub fn history(&self) -> &[ScanRecord] {
        &self.history
    }

    pub fn last_scan(&self) -> Option<&ScanRecord> {
        self.history.first()
    }

    pub fn total_scans(&self) -> usize {
        self.history.len()
    }

    pub fn scans_at_selected(&self) -> usize {
        let selected = self.selected_checkpoint();
        self.history.iter().filter(|s| s.checkpoint_name == selected).count()
    }

    /// Wipe the line's scan history and the bounce reference
    pub fn clear_history(&mut self) -> Result<()> {
        for name in &self.line.locations {
            self.store.clear_point_scans(&self.line.id, name)?;
        }
        self.history.clear();
        self.debouncer.reset();
        Ok(())
    }

    pub fn progress(&self, tag_id: &str) -> Result<Progress> {
        progress_for(self.store, &self.line, tag_id)
    }
}
