// 📡 Scans - recorded reads and imported readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::ScanRow;

/// A recorded read of one tag at one checkpoint (append-only history)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,

    pub chip_id: String,

    #[serde(rename = "puntoNombre")]
    pub checkpoint_name: String,

    /// ISO-8601 on the wire
    pub timestamp: DateTime<Utc>,

    /// Reader count carried over from a bulk import; unset for live scans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<String>,
}

impl ScanRecord {
    pub fn new(chip_id: &str, checkpoint_name: &str, timestamp: DateTime<Utc>) -> Self {
        ScanRecord {
            id: uuid::Uuid::new_v4().to_string(),
            chip_id: chip_id.to_string(),
            checkpoint_name: checkpoint_name.to_string(),
            timestamp,
            count: None,
            rssi: None,
        }
    }

    /// Persisted form of an imported reading
    pub fn from_reading(reading: &Reading, checkpoint_name: &str, timestamp: DateTime<Utc>) -> Self {
        ScanRecord {
            count: Some(reading.count),
            rssi: Some(reading.rssi.clone()),
            ..ScanRecord::new(&reading.tag_id, checkpoint_name, timestamp)
        }
    }
}

/// One tag's reading in a checkpoint import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub tag_id: String,

    /// Times the reader saw the tag during the session
    pub count: u32,

    pub rssi: String,
}

impl Reading {
    pub fn new(tag_id: &str) -> Self {
        Reading {
            tag_id: tag_id.to_uppercase(),
            count: 1,
            rssi: "0".to_string(),
        }
    }

    /// Fold a repeated read of the same tag: counts add, first RSSI stays
    pub fn absorb(&mut self, other: &Reading) {
        self.count = self.count.saturating_add(other.count);
    }
}

impl From<ScanRow> for Reading {
    fn from(row: ScanRow) -> Self {
        Reading {
            tag_id: row.tag_id,
            count: row.count,
            rssi: row.rssi,
        }
    }
}

impl From<&ScanRecord> for Reading {
    fn from(scan: &ScanRecord) -> Self {
        Reading {
            tag_id: scan.chip_id.to_uppercase(),
            count: scan.count.unwrap_or(1),
            rssi: scan.rssi.clone().unwrap_or_else(|| "0".to_string()),
        }
    }
}
