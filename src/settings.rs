// ⚙️ Settings - thresholds and runtime options
//
// Defaults match the handheld readers in use: 6-char minimum tag, prefixes
// longer than 3 chars, 1.5s bounce window.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with tags that no catalog prefix matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Keep them, labelled UNKNOWN, after all resolved rows
    #[default]
    Include,

    /// Drop them from the reconciled table
    Filter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum length of a cleaned tag identifier
    pub min_tag_len: usize,

    /// Minimum length of a catalog prefix
    pub min_prefix_len: usize,

    /// Live-scan bounce window in milliseconds
    pub debounce_ms: i64,

    pub unknown_policy: UnknownPolicy,

    /// SQLite file backing the key-value store
    pub db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            min_tag_len: 6,
            min_prefix_len: 4,
            debounce_ms: 1500,
            unknown_policy: UnknownPolicy::Include,
            db_path: "rfid-trace.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields defaults.
    /// Environment overrides are applied afterwards.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse settings: {}", path.display()))?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `RFID_TRACE_DB` / `RFID_TRACE_DEBOUNCE_MS` overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("RFID_TRACE_DB") {
            if !db.trim().is_empty() {
                self.db_path = db.trim().to_string();
            }
        }

        if let Some(ms) = lookup("RFID_TRACE_DEBOUNCE_MS") {
            match ms.trim().parse::<i64>() {
                Ok(v) if v >= 0 => self.debounce_ms = v,
                _ => tracing::warn!("ignoring invalid RFID_TRACE_DEBOUNCE_MS={}", ms),
            }
        }
    }

    pub fn debounce_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.min_tag_len, 6);
        assert_eq!(s.min_prefix_len, 4);
        assert_eq!(s.debounce_window(), chrono::Duration::milliseconds(1500));
        assert_eq!(s.unknown_policy, UnknownPolicy::Include);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{"unknown_policy":"filter"}"#).unwrap();
        assert_eq!(s.unknown_policy, UnknownPolicy::Filter);
        assert_eq!(s.min_tag_len, 6);
    }

    #[test]
    fn test_env_overrides() {
        let mut s = Settings::default();
        s.apply_env(|k| match k {
            "RFID_TRACE_DB" => Some("/tmp/line.db".to_string()),
            "RFID_TRACE_DEBOUNCE_MS" => Some("2000".to_string()),
            _ => None,
        });
        assert_eq!(s.db_path, "/tmp/line.db");
        assert_eq!(s.debounce_ms, 2000);

        // Garbage is ignored
        s.apply_env(|k| (k == "RFID_TRACE_DEBOUNCE_MS").then(|| "soon".to_string()));
        assert_eq!(s.debounce_ms, 2000);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let s = Settings::load(Path::new("/nonexistent/rfid-trace.json")).unwrap();
        assert_eq!(s.min_prefix_len, 4);
    }
}
