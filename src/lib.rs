// RFID Trace - Core Library
// Tag movement across line checkpoints: CSV normalization, catalog matching,
// cross-checkpoint reconciliation, sequential diffs and chip progress.

pub mod error;
pub mod settings;
pub mod parser;         // Normalizer: raw CSV text → typed rows
pub mod entities;       // Catalog, line configuration, scan records
pub mod reconciliation; // Presence table + aggregates
pub mod diff;           // Losses/gains between consecutive checkpoints
pub mod progress;       // Furthest checkpoint reached by a chip
pub mod deduplication;  // Live-scan bounce suppression
pub mod store;          // TraceStore trait + in-memory store
pub mod db;             // SQLite-backed TraceStore
pub mod inventory;      // Bulk import session
pub mod operator;       // Live capture session
pub mod export;         // Inventory CSV export

// Re-export commonly used types
pub use error::TraceError;
pub use settings::{Settings, UnknownPolicy};
pub use parser::{
    CatalogRow, CsvRow, Normalizer, ParseMode, ScanRow,
    clean_field, detect_delimiter, read_text,
};
pub use entities::{
    Catalog, CatalogEntry, LineConfig, Model, Reading, Resolution, ScanRecord, MIN_PREFIX_LEN,
    UNKNOWN_MODEL,
};
pub use reconciliation::{
    Checkpoint, InventorySummary, InventoryTable, ModelCount, ReconciledRow,
    ReconciliationEngine, natural_cmp,
};
pub use diff::{SequentialDiff, Transition, diff_sequential};
pub use progress::{Progress, progress, progress_for};
pub use deduplication::{ScanDebouncer, ScanDecision};
pub use store::{MemoryStore, TraceStore};
pub use db::{Event, SqliteStore, setup_database};
pub use inventory::InventorySession;
pub use operator::{OperatorSession, ScanOutcome};
pub use export::{EXPORT_HEADER, export_inventory, export_inventory_file};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
