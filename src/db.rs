// 🗄️ SQLite store - key-value table + audit events
//
// Each logical key (configs, active id, scans) is a JSON document in `kv`.
// Writes replace the whole document: last write wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entities::{LineConfig, ScanRecord};
use crate::store::{prepend_scans, remove_point, upsert_config, ScanStorage, TraceStore};

pub const KEY_CONFIGS: &str = "trazabilidad_configs";
pub const KEY_ACTIVE_ID: &str = "trazabilidad_active_id";
pub const KEY_SCANS: &str = "trazabilidad_scans";

/// Event for audit trail (imports, clears, config saves)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (no-op for in-memory databases)
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;

        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).with_context(|| format!("Corrupt value under key {}", key))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn scan_storage(&self) -> Result<ScanStorage> {
        Ok(self.get_value(KEY_SCANS)?.unwrap_or_default())
    }

    /// Insert event into audit trail
    pub fn insert_event(&self, event: &Event) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }

    /// Events for one entity, newest first
    pub fn get_events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;

        let raw = stmt
            .query_map(params![entity_type, entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(event_id, ts, event_type, entity_type, entity_id, data, actor)| -> Result<Event> {
                Ok(Event {
                    event_id,
                    timestamp: DateTime::parse_from_rfc3339(&ts)
                        .with_context(|| format!("Bad event timestamp: {}", ts))?
                        .with_timezone(&Utc),
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data)?,
                    actor,
                })
            })
            .collect()
    }

    fn write_scans(&self, config_id: &str, checkpoint: &str, scans: Vec<ScanRecord>) -> Result<()> {
        let mut storage = self.scan_storage()?;
        prepend_scans(&mut storage, config_id, checkpoint, scans);
        self.put_value(KEY_SCANS, &storage)
    }

    fn log_event(&self, event_type: &str, entity_type: &str, entity_id: &str, data: serde_json::Value) {
        let event = Event::new(event_type, entity_type, entity_id, data, "rfid_trace");
        if let Err(e) = self.insert_event(&event) {
            tracing::warn!("failed to record {} event: {}", event_type, e);
        }
    }
}

fn point_entity(config_id: &str, checkpoint: &str) -> String {
    format!("{}/{}", config_id, checkpoint)
}

impl TraceStore for SqliteStore {
    fn get_configs(&self) -> Result<Vec<LineConfig>> {
        Ok(self.get_value(KEY_CONFIGS)?.unwrap_or_default())
    }

    fn save_config(&self, config: &LineConfig) -> Result<()> {
        let mut configs = self.get_configs()?;
        upsert_config(&mut configs, config);
        self.put_value(KEY_CONFIGS, &configs)?;

        self.log_event(
            "config_saved",
            "line_config",
            &config.id,
            serde_json::json!({ "name": config.name, "locations": config.locations }),
        );
        Ok(())
    }

    fn set_active_config_id(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => self.put_value(KEY_ACTIVE_ID, &id),
            None => self.delete_value(KEY_ACTIVE_ID),
        }
    }

    fn get_active_config(&self) -> Result<Option<LineConfig>> {
        let Some(id) = self.get_value::<String>(KEY_ACTIVE_ID)? else {
            return Ok(None);
        };
        self.get_config(&id)
    }

    fn add_scan(&self, config_id: &str, checkpoint: &str, scan: ScanRecord) -> Result<()> {
        self.write_scans(config_id, checkpoint, vec![scan])
    }

    fn add_bulk_scans(&self, config_id: &str, checkpoint: &str, scans: Vec<ScanRecord>) -> Result<()> {
        let count = scans.len();
        self.write_scans(config_id, checkpoint, scans)?;

        if count > 0 {
            self.log_event(
                "scans_imported",
                "checkpoint",
                &point_entity(config_id, checkpoint),
                serde_json::json!({ "count": count }),
            );
        }
        Ok(())
    }

    fn get_scans_for_point(&self, config_id: &str, checkpoint: &str) -> Result<Vec<ScanRecord>> {
        Ok(self
            .scan_storage()?
            .remove(config_id)
            .and_then(|mut points| points.remove(checkpoint))
            .unwrap_or_default())
    }

    fn clear_point_scans(&self, config_id: &str, checkpoint: &str) -> Result<()> {
        let mut storage = self.scan_storage()?;
        if remove_point(&mut storage, config_id, checkpoint) {
            self.put_value(KEY_SCANS, &storage)?;
            self.log_event(
                "scans_cleared",
                "checkpoint",
                &point_entity(config_id, checkpoint),
                serde_json::json!({}),
            );
        }
        Ok(())
    }
}
