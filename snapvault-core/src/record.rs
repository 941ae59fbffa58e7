/*!
Record model for captured application state.

A record set is the full mapping of application keys to values captured at a
point in time. Values are opaque to the vault: they are carried as parsed JSON
when possible and as the raw stored string otherwise, so a corrupt value never
aborts a capture.
*/

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Application key prefix scanned for records beyond the allow-list.
pub const APP_KEY_PREFIX: &str = "2d";

/// Fixed allow-list of known application record keys.
pub const KNOWN_KEYS: &[&str] = &[
    "2dNumbers",
    "2dCurrentNumbers",
    "2dClosingConfig",
    "paymentVerifications",
    "2dAnalyticsData",
    "2dUserData",
    "2dPurchaseHistory",
    "2dUserSettings",
    "2dNotifications",
    "2dNotificationSettings",
    "2dShareStats",
    "2dRecentShares",
    "adminNotifications",
];

/// Bookkeeping keys owned by the vault itself. Never captured into a
/// snapshot payload and never erased or overwritten by a restore.
pub const RESERVED_KEYS: &[&str] = &["2dBackupData", "2dBackupHistory", "2dBackupSettings"];

/// Key under which snapshot history is persisted.
pub const HISTORY_KEY: &str = "2dBackupHistory";

/// Key under which vault settings are persisted.
pub const SETTINGS_KEY: &str = "2dBackupSettings";

/// Synthetic payload entry describing the capture itself.
pub const METADATA_KEY: &str = "_metadata";

/// Application version recorded in capture metadata.
pub const APP_VERSION: &str = "2d-plus-1.0";

/// A single captured value.
///
/// `Raw` preserves a stored string that failed JSON parsing unchanged; the
/// alternative of discarding it would make a single corrupt value abort or
/// silently thin out a whole capture.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RecordValue {
    /// A value that parsed as JSON.
    Json(serde_json::Value),
    /// A stored string that is not valid JSON, kept verbatim.
    Raw(String),
}

impl RecordValue {
    /// Parse a stored string leniently: JSON when possible, raw otherwise.
    pub fn parse_lenient(stored: &str) -> Self {
        match serde_json::from_str(stored) {
            Ok(value) => RecordValue::Json(value),
            Err(_) => RecordValue::Raw(stored.to_string()),
        }
    }

    /// Serialize back to the string form written into the record store.
    ///
    /// Raw values round-trip byte-for-byte; JSON values are written in
    /// compact form.
    pub fn to_stored_string(&self) -> crate::Result<String> {
        match self {
            RecordValue::Json(value) => Ok(serde_json::to_string(value)?),
            RecordValue::Raw(raw) => Ok(raw.clone()),
        }
    }
}

/// The full mapping of application keys to captured values.
pub type RecordSet = BTreeMap<String, RecordValue>;

/// Whether a key belongs to the vault's own bookkeeping.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Whether a key is eligible for the prefix scan at capture time.
pub fn is_prefix_key(key: &str) -> bool {
    key.starts_with(APP_KEY_PREFIX) && !KNOWN_KEYS.contains(&key) && !is_reserved_key(key)
}

/// Build the synthetic `_metadata` entry added to a captured payload.
///
/// `total_keys` counts the application records only, not the metadata entry.
pub fn metadata_entry(total_keys: usize) -> RecordValue {
    RecordValue::Json(serde_json::json!({
        "backupDate": chrono::Utc::now().to_rfc3339(),
        "totalKeys": total_keys,
        "appVersion": APP_VERSION,
    }))
}
