// 🏷️ Catalog - tag prefix → model name
//
// Prefixes may nest ("E280" general, "E2801234" a sub-model), so resolution
// always takes the LONGEST matching prefix. Equal-length matches keep the
// entry declared first.

use serde::{Deserialize, Serialize};

use crate::parser::{CatalogRow, Normalizer, HEADER_SENTINEL};

/// Label used for tags that no catalog entry matches
pub const UNKNOWN_MODEL: &str = "UNKNOWN";

/// Shortest prefix a catalog entry may carry
pub const MIN_PREFIX_LEN: usize = 4;

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    Known(String),
    Unknown,
}

impl Model {
    pub fn name(&self) -> &str {
        match self {
            Model::Known(name) => name.as_str(),
            Model::Unknown => UNKNOWN_MODEL,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Model::Unknown)
    }
}

// ============================================================================
// CATALOG ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Uppercase tag prefix
    pub prefix: String,

    pub model_name: String,
}

impl CatalogEntry {
    pub fn new(prefix: &str, model_name: &str) -> Self {
        CatalogEntry {
            prefix: prefix.trim().to_uppercase(),
            model_name: model_name.trim().to_string(),
        }
    }

    /// Prefix longer than 3 chars, not the header sentinel, model named
    pub fn is_valid(&self) -> bool {
        self.prefix.chars().count() >= MIN_PREFIX_LEN
            && self.prefix != HEADER_SENTINEL
            && !self.model_name.is_empty()
    }

    pub fn matches(&self, tag_id: &str) -> bool {
        tag_id.starts_with(&self.prefix)
    }
}

impl From<CatalogRow> for CatalogEntry {
    fn from(row: CatalogRow) -> Self {
        CatalogEntry {
            prefix: row.prefix,
            model_name: row.model_name,
        }
    }
}

/// Outcome of resolving one tag id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub model: Model,

    /// Prefix that won, if any
    pub prefix: Option<String>,

    /// Tag id with the matched prefix removed; the full id when unmatched
    pub serial: String,
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            entries: Vec::new(),
        }
    }

    /// Entries that break the prefix rules are dropped
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut catalog = Catalog::new();
        for entry in entries {
            catalog.add(entry);
        }
        catalog
    }

    /// Build from raw catalog CSV text
    pub fn from_text(text: &str, normalizer: &Normalizer) -> Self {
        let entries: Vec<CatalogEntry> = normalizer
            .parse_catalog(text)
            .into_iter()
            .map(CatalogEntry::from)
            .collect();

        tracing::info!("catalog loaded: {} entries", entries.len());
        Catalog { entries }
    }

    /// Returns false (and keeps nothing) for an invalid entry
    pub fn add(&mut self, entry: CatalogEntry) -> bool {
        if !entry.is_valid() {
            tracing::debug!("rejected catalog entry {:?} → {:?}", entry.prefix, entry.model_name);
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest matching prefix; first declared wins on equal length
    pub fn best_match(&self, tag_id: &str) -> Option<&CatalogEntry> {
        let tag = tag_id.trim().to_uppercase();

        let mut best: Option<&CatalogEntry> = None;
        for entry in self.entries.iter().filter(|e| e.matches(&tag)) {
            // strictly longer only, so the earlier of two equal prefixes stays
            if best.map_or(true, |b| entry.prefix.len() > b.prefix.len()) {
                best = Some(entry);
            }
        }
        best
    }

    /// Resolve a tag id to its model and serial remainder
    pub fn resolve(&self, tag_id: &str) -> Resolution {
        let tag = tag_id.trim().to_uppercase();

        match self.best_match(&tag) {
            Some(entry) => {
                let remainder = &tag[entry.prefix.len()..];
                Resolution {
                    model: Model::Known(entry.model_name.clone()),
                    prefix: Some(entry.prefix.clone()),
                    // A tag equal to its prefix has no serial part of its own
                    serial: if remainder.is_empty() {
                        tag.clone()
                    } else {
                        remainder.to_string()
                    },
                }
            }
            None => Resolution {
                model: Model::Unknown,
                prefix: None,
                serial: tag,
            },
        }
    }

    /// Distinct model names, sorted
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.model_name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

// ============================================================================
// TESTS
// ============================================================================
