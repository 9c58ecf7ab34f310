// 📍 Progress Tracker - how far along the line has a chip been confirmed?
//
// Furthest checkpoint wins: a chip seen at P3 but never at P2 still counts
// as 3/3. Traversal does not have to be contiguous.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::{LineConfig, ScanRecord};
use crate::store::TraceStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Checkpoints up to and including the furthest one reached (k)
    pub reached: usize,

    /// Checkpoints in the line (N)
    pub total: usize,

    /// round(k / N * 100), 0 when N = 0
    pub percent: u8,
}

impl Progress {
    /// "k/N"
    pub fn label(&self) -> String {
        format!("{}/{}", self.reached, self.total)
    }

    pub fn fraction(&self) -> f64 {
        self.percent as f64 / 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.reached == self.total
    }
}

/// Compute progress from scan history keyed by checkpoint name
pub fn progress(
    tag_id: &str,
    checkpoints: &[String],
    history: &HashMap<String, Vec<ScanRecord>>,
) -> Progress {
    // stored chip ids are uppercase
    let tag = tag_id.trim().to_uppercase();

    let furthest = checkpoints
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            history
                .get(name.as_str())
                .is_some_and(|scans| scans.iter().any(|s| s.chip_id == tag))
        })
        .map(|(i, _)| i)
        .last();

    let reached = furthest.map(|i| i + 1).unwrap_or(0);
    let total = checkpoints.len();
    let percent = if total > 0 {
        ((reached as f64 / total as f64) * 100.0).round() as u8
    } else {
        0
    };

    Progress {
        reached,
        total,
        percent,
    }
}

/// Progress for a chip on a line, reading history from the store
pub fn progress_for(store: &dyn TraceStore, config: &LineConfig, tag_id: &str) -> Result<Progress> {
    let mut history = HashMap::new();
    for name in &config.locations {
        history.insert(name.clone(), store.get_scans_for_point(&config.id, name)?);
    }

    Ok(progress(tag_id, &config.locations, &history))
}
