// Entity Models
//
// - Catalog: prefix → model registry, resolves tag ids to models
// - Line: ordered checkpoint configuration with stable identity (UUID)
// - Scan: recorded reads and per-checkpoint readings

pub mod catalog;
pub mod line;
pub mod scan;

pub use catalog::{Catalog, CatalogEntry, Model, Resolution, MIN_PREFIX_LEN, UNKNOWN_MODEL};
pub use line::LineConfig;
pub use scan::{Reading, ScanRecord};
