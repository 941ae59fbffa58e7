/*!
Vault settings: scheduled-capture configuration and retention limits.

Settings are loaded once at startup and merged over hardcoded defaults, so
fields added in later versions do not break previously persisted settings.
Every mutation is persisted immediately by the vault.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse capture interval classes for the scheduler.
///
/// Thresholds are fixed hour counts, not calendar-aware: a "monthly" check
/// at 720 hours drifts against real month boundaries. This is a known
/// limitation carried over deliberately, not a bug.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureInterval {
    Daily,
    Weekly,
    Monthly,
}

impl CaptureInterval {
    /// Elapsed-hours threshold after which a scheduled capture is due.
    pub fn threshold_hours(&self) -> i64 {
        match self {
            CaptureInterval::Daily => 24,
            CaptureInterval::Weekly => 168,
            CaptureInterval::Monthly => 720,
        }
    }
}

impl std::fmt::Display for CaptureInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureInterval::Daily => write!(f, "daily"),
            CaptureInterval::Weekly => write!(f, "weekly"),
            CaptureInterval::Monthly => write!(f, "monthly"),
        }
    }
}

/// Process-wide vault configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VaultSettings {
    /// Whether the interval scheduler may take captures.
    #[serde(default)]
    pub scheduled_capture_enabled: bool,

    /// Interval class for scheduled captures.
    #[serde(default = "default_interval")]
    pub capture_interval: CaptureInterval,

    /// Maximum number of snapshots retained in history. Always at least 1.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,

    /// Timestamp of the last scheduled capture, if any.
    #[serde(default)]
    pub last_scheduled_capture_at: Option<DateTime<Utc>>,
}

fn default_interval() -> CaptureInterval {
    CaptureInterval::Daily
}

fn default_max_retained() -> usize {
    10
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            scheduled_capture_enabled: false,
            capture_interval: default_interval(),
            max_retained: default_max_retained(),
            last_scheduled_capture_at: None,
        }
    }
}
