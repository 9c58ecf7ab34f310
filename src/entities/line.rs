// 🏭 Line Configuration - ordered checkpoints with stable identity
//
// The line is the root aggregate: checkpoints are positions inside it and
// are not stored on their own. Position drives diffing and progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Stable identity (UUID)
    pub id: String,

    pub name: String,

    /// Checkpoint names in line order
    pub locations: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LineConfig {
    /// Create a new line. Names are trimmed, blank ones dropped.
    pub fn new(name: &str, locations: &[&str]) -> Self {
        let now = Utc::now();

        LineConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            locations: clean_locations(locations),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace name and checkpoints, keeping identity and creation time
    pub fn update(&mut self, name: &str, locations: &[&str]) {
        self.name = name.trim().to_string();
        self.locations = clean_locations(locations);
        self.updated_at = Utc::now();
    }

    pub fn checkpoint_count(&self) -> usize {
        self.locations.len()
    }

    /// Number of links between consecutive checkpoints
    pub fn connections_count(&self) -> usize {
        self.locations.len().saturating_sub(1)
    }

    pub fn position(&self, checkpoint: &str) -> Option<usize> {
        self.locations.iter().position(|l| l == checkpoint)
    }

    pub fn contains(&self, checkpoint: &str) -> bool {
        self.position(checkpoint).is_some()
    }

    pub fn first_checkpoint(&self) -> Option<&str> {
        self.locations.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

fn clean_locations(locations: &[&str]) -> Vec<String> {
    locations
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
