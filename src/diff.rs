// 🔀 Sequential Diff - what was lost / gained between consecutive checkpoints
//
// The line is directional: tags are expected to persist from entry to exit.
//   lost   = previous − current   (shrinkage, damage, removal)
//   gained = current − previous   (appeared without passing upstream)

use serde::{Deserialize, Serialize};

use crate::reconciliation::Checkpoint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,

    /// Tag ids, sorted
    pub tags: Vec<String>,
}

impl Transition {
    /// "A → B"
    pub fn label(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SequentialDiff {
    pub losses: Vec<Transition>,
    pub gains: Vec<Transition>,
}

impl SequentialDiff {
    pub fn is_empty(&self) -> bool {
        self.losses.is_empty() && self.gains.is_empty()
    }

    pub fn total_lost(&self) -> usize {
        self.losses.iter().map(|t| t.tags.len()).sum()
    }

    pub fn total_gained(&self) -> usize {
        self.gains.iter().map(|t| t.tags.len()).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} tags lost over {} transitions, {} tags gained over {} transitions",
            self.total_lost(),
            self.losses.len(),
            self.total_gained(),
            self.gains.len()
        )
    }
}

/// Diff each checkpoint against the one before it. Empty transitions are
/// omitted; fewer than two checkpoints yields an empty diff.
pub fn diff_sequential(checkpoints: &[Checkpoint]) -> SequentialDiff {
    let mut diff = SequentialDiff::default();

    for pair in checkpoints.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let prev_tags = prev.tags();
        let curr_tags = curr.tags();

        let lost: Vec<String> = prev_tags.difference(&curr_tags).map(|t| t.to_string()).collect();
        let gained: Vec<String> = curr_tags.difference(&prev_tags).map(|t| t.to_string()).collect();

        if !lost.is_empty() {
            diff.losses.push(Transition {
                from: prev.name.clone(),
                to: curr.name.clone(),
                tags: lost,
            });
        }

        if !gained.is_empty() {
            diff.gains.push(Transition {
                from: prev.name.clone(),
                to: curr.name.clone(),
                tags: gained,
            });
        }
    }

    tracing::debug!("{}", diff.summary());
    diff
}
