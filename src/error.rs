// ⚠️ Structural errors
//
// Data-quality problems (bad rows, unmatched tags, bounced scans) are never
// errors. Only these structural conditions are surfaced to callers.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    /// No line configuration is marked active
    #[error("no active line configuration; create or activate one first")]
    NoActiveConfig,

    /// Configuration id not present in the store
    #[error("line configuration not found: {0}")]
    ConfigNotFound(String),

    /// Checkpoint name is not part of the line
    #[error("checkpoint '{0}' is not part of the active line")]
    UnknownCheckpoint(String),

    /// Line configuration without any checkpoint
    #[error("line configuration has no checkpoints")]
    EmptyLine,
}
