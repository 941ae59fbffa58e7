/*!
Snapshot representation and identifier generation.
*/

use crate::record::{RecordSet, METADATA_KEY};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a snapshot came to be captured.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Explicitly requested by the user.
    Manual,
    /// Taken by the interval scheduler.
    Scheduled,
    /// Captured for export to another installation.
    Transfer,
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotKind::Manual => write!(f, "manual"),
            SnapshotKind::Scheduled => write!(f, "scheduled"),
            SnapshotKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// One immutable captured record set plus metadata.
///
/// The payload is a deep copy taken at capture time; later writes to the
/// live record store never alter a stored snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Unique identifier, generated at creation.
    pub id: String,

    /// ISO 8601 capture time.
    pub timestamp: DateTime<Utc>,

    /// How the snapshot was captured.
    pub kind: SnapshotKind,

    /// The captured record set, including the `_metadata` entry.
    pub payload: RecordSet,

    /// Byte length of the serialized payload, computed once at capture.
    pub size_bytes: u64,
}

impl Snapshot {
    /// Create a snapshot from a captured payload, minting a fresh id and
    /// timestamp and computing the serialized payload size.
    pub fn new(kind: SnapshotKind, payload: RecordSet) -> Result<Self> {
        let serialized = serde_json::to_string(&payload)?;
        Ok(Self {
            id: generate_snapshot_id(),
            timestamp: Utc::now(),
            kind,
            payload,
            size_bytes: serialized.len() as u64,
        })
    }

    /// Number of application records in the payload, excluding `_metadata`.
    pub fn record_count(&self) -> usize {
        self.payload
            .keys()
            .filter(|key| key.as_str() != METADATA_KEY)
            .count()
    }

    /// Suggested filename for exporting this snapshot.
    ///
    /// Format: `2d-backup-{id}-{YYYY-MM-DD}.json`. The embedded id and date
    /// are for traceability only and are never parsed back.
    pub fn suggested_filename(&self) -> String {
        format!(
            "2d-backup-{}-{}.json",
            self.id,
            self.timestamp.format("%Y-%m-%d")
        )
    }
}

/// Generate a snapshot identifier: millisecond timestamp plus a random
/// suffix, uppercased. Collision probability is negligible.
pub fn generate_snapshot_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("BACKUP-{:X}-{}", millis, suffix[..9].to_uppercase())
}

/// Humanize a byte count for display surfaces.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
