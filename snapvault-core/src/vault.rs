/*!
Snapshot vault engine.

This module contains the core logic for capturing, retaining, restoring,
exporting and importing snapshots of the application's key-value records.
The vault owns the snapshot history and settings aggregates in memory and
persists both through the injected record store.
*/

use crate::notify::{NotificationCategory, NotificationSink};
use crate::record::{
    is_prefix_key, is_reserved_key, metadata_entry, RecordSet, RecordValue, HISTORY_KEY,
    KNOWN_KEYS, METADATA_KEY, SETTINGS_KEY,
};
use crate::settings::VaultSettings;
use crate::snapshot::{format_size, Snapshot, SnapshotKind};
use crate::store::RecordStore;
use crate::{Result, VaultError};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Where a restore payload comes from.
pub enum RestoreSource {
    /// A snapshot already held in history, located by id.
    SnapshotId(String),
    /// An externally supplied payload, e.g. parsed from an imported file.
    Payload(RecordSet),
}

/// A validated restore awaiting explicit confirmation.
///
/// Produced by [`SnapshotVault::request_restore`]; nothing destructive has
/// happened yet. Dropping it without confirming aborts the restore with no
/// side effects.
#[derive(Debug, Clone)]
pub struct PendingRestore {
    payload: RecordSet,
    description: String,
}

impl PendingRestore {
    /// Human-readable description of what would be restored.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of application records in the pending payload.
    pub fn record_count(&self) -> usize {
        self.payload
            .keys()
            .filter(|key| key.as_str() != METADATA_KEY)
            .count()
    }
}

/// Result of a confirmed restore.
///
/// Restore is best-effort per key, not atomic: `failed_keys` lists records
/// that could not be written while the rest went through. Callers must
/// treat `requires_full_reload` as binding and reload their own state from
/// the record store rather than trusting any in-memory caches.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    /// Number of records written back successfully.
    pub restored_keys: usize,
    /// Records that failed to write and were skipped.
    pub failed_keys: Vec<String>,
    /// Always true: live state changed underneath every other component.
    pub requires_full_reload: bool,
}

/// What to serialize when exporting.
pub enum ExportTarget {
    /// The live record store contents, captured fresh. Pure over state: no
    /// snapshot is created and history is not touched.
    Current,
    /// A stored snapshot's payload, located by id.
    Snapshot(String),
}

/// An export ready to be written out by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    /// Suggested filename embedding the snapshot id and ISO date.
    pub filename: String,
    /// Pretty-printed UTF-8 JSON text.
    pub contents: String,
}

/// Aggregate counters for display surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultStats {
    pub snapshot_count: usize,
    pub last_capture_at: Option<DateTime<Utc>>,
    pub total_payload_bytes: u64,
    pub scheduled_capture_enabled: bool,
}

/// Orchestrates snapshot capture, retention, restore and export over the
/// injected record store, notifying the sink on completed operations.
///
/// Constructed once at process start. Single-threaded use is assumed; in a
/// multi-threaded environment the whole vault must sit behind one mutex,
/// since history and settings are shared mutable aggregates.
///
/// # Example
/// ```
/// use snapvault_core::{MemoryRecordStore, NullSink, RecordStore, SnapshotKind, SnapshotVault};
///
/// let store = MemoryRecordStore::new();
/// store.set("2dNumbers", r#"{"07":"sold"}"#)?;
///
/// let mut vault = SnapshotVault::open(store, NullSink)?;
/// let snapshot = vault.capture(SnapshotKind::Manual)?;
/// assert_eq!(snapshot.record_count(), 1);
/// # Ok::<(), snapvault_core::VaultError>(())
/// ```
pub struct SnapshotVault<S, N>
where
    S: RecordStore,
    N: NotificationSink,
{
    store: S,
    sink: N,
    history: Vec<Snapshot>,
    settings: VaultSettings,
}

impl<S, N> SnapshotVault<S, N>
where
    S: RecordStore,
    N: NotificationSink,
{
    /// Open a vault over the given record store, loading any persisted
    /// history and settings. Corrupt bookkeeping records are logged and
    /// replaced with empty/default state rather than blocking startup.
    pub fn open(store: S, sink: N) -> Result<Self> {
        let history = match store.get(HISTORY_KEY)? {
            Some(text) => match serde_json::from_str::<Vec<Snapshot>>(&text) {
                Ok(history) => history,
                Err(e) => {
                    warn!(error = %e, "persisted snapshot history unreadable, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let settings = match store.get(SETTINGS_KEY)? {
            Some(text) => match serde_json::from_str::<VaultSettings>(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "persisted settings unreadable, using defaults");
                    VaultSettings::default()
                }
            },
            None => VaultSettings::default(),
        };
        let mut vault = Self {
            store,
            sink,
            history,
            settings,
        };
        vault.sort_history();
        Ok(vault)
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot history, newest first.
    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    /// Locate a snapshot by id.
    pub fn find(&self, id: &str) -> Option<&Snapshot> {
        self.history.iter().find(|s| s.id == id)
    }

    /// Current settings.
    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// Aggregate counters for a status display.
    pub fn stats(&self) -> VaultStats {
        VaultStats {
            snapshot_count: self.history.len(),
            last_capture_at: self.history.first().map(|s| s.timestamp),
            total_payload_bytes: self.history.iter().map(|s| s.size_bytes).sum(),
            scheduled_capture_enabled: self.settings.scheduled_capture_enabled,
        }
    }

    /// Capture a snapshot of the live record set and retain it.
    ///
    /// Collects every allow-listed key plus any present key with the
    /// application prefix, inserts the snapshot at the head of history,
    /// enforces the retention bound and persists. On a persistence failure
    /// the insertion is rolled back: no partial snapshot is retained.
    pub fn capture(&mut self, kind: SnapshotKind) -> Result<Snapshot> {
        let payload = self
            .collect_records()
            .map_err(|e| VaultError::capture(e.to_string()))?;
        let snapshot =
            Snapshot::new(kind, payload).map_err(|e| VaultError::capture(e.to_string()))?;

        let previous = self.history.clone();
        self.history.insert(0, snapshot.clone());
        self.enforce_retention();
        if let Err(e) = self.persist_history() {
            self.history = previous;
            return Err(VaultError::capture(format!(
                "failed to persist snapshot history: {e}"
            )));
        }

        if kind == SnapshotKind::Scheduled {
            self.settings.last_scheduled_capture_at = Some(snapshot.timestamp);
            if let Err(e) = self.persist_settings() {
                warn!(error = %e, "failed to persist last scheduled capture time");
            }
        }

        self.sink.notify(
            "Backup Created",
            &format!(
                "New {} backup created. Size: {}",
                kind,
                format_size(snapshot.size_bytes)
            ),
            NotificationCategory::System,
        );
        info!(
            id = %snapshot.id,
            kind = %kind,
            records = snapshot.record_count(),
            size_bytes = snapshot.size_bytes,
            "snapshot captured"
        );
        Ok(snapshot)
    }

    /// Run the interval scheduler once. Idempotent and safe to call from a
    /// periodic timer or resume hook; missed ticks need no draining since
    /// the elapsed time is always recomputed from the last capture.
    ///
    /// Returns the snapshot taken, if one was due.
    pub fn schedule_check(&mut self) -> Result<Option<Snapshot>> {
        if !self.settings.scheduled_capture_enabled {
            return Ok(None);
        }
        let Some(last) = self.settings.last_scheduled_capture_at else {
            return Ok(None);
        };
        let elapsed_hours = Utc::now().signed_duration_since(last).num_hours();
        let threshold = self.settings.capture_interval.threshold_hours();
        if elapsed_hours < threshold {
            debug!(elapsed_hours, threshold, "scheduled capture not due");
            return Ok(None);
        }
        debug!(elapsed_hours, threshold, "scheduled capture due");
        self.capture(SnapshotKind::Scheduled).map(Some)
    }

    /// Validate a restore target and stage it for confirmation.
    ///
    /// Everything is located and parsed here, before anything destructive:
    /// an unknown id or empty payload fails with `RestoreFailed` and the
    /// live store is untouched.
    pub fn request_restore(&self, source: RestoreSource) -> Result<PendingRestore> {
        match source {
            RestoreSource::SnapshotId(id) => {
                let snapshot = self
                    .find(&id)
                    .ok_or_else(|| VaultError::restore(format!("no snapshot with id {id}")))?;
                Ok(PendingRestore {
                    payload: snapshot.payload.clone(),
                    description: format!(
                        "snapshot {} captured {}",
                        snapshot.id,
                        snapshot.timestamp.to_rfc3339()
                    ),
                })
            }
            RestoreSource::Payload(payload) => {
                let records = payload
                    .keys()
                    .filter(|key| key.as_str() != METADATA_KEY)
                    .count();
                if records == 0 {
                    return Err(VaultError::restore("payload contains no records"));
                }
                Ok(PendingRestore {
                    payload,
                    description: format!("external payload with {records} records"),
                })
            }
        }
    }

    /// Apply a confirmed restore over the live record store.
    ///
    /// Erases every current key except the vault's own bookkeeping, then
    /// writes each payload record independently. A failed write is logged
    /// and skipped rather than aborting the rest, so restore is not atomic;
    /// the returned outcome says which keys were left behind.
    pub fn confirm_restore(&self, pending: PendingRestore) -> Result<RestoreOutcome> {
        let existing = self
            .store
            .keys()
            .map_err(|e| VaultError::restore(format!("cannot enumerate record store: {e}")))?;
        for key in existing {
            if is_reserved_key(&key) {
                continue;
            }
            if let Err(e) = self.store.remove(&key) {
                warn!(key = %key, error = %e, "failed to erase key before restore");
            }
        }

        let mut restored_keys = 0;
        let mut failed_keys = Vec::new();
        for (key, value) in &pending.payload {
            if key == METADATA_KEY || is_reserved_key(key) {
                continue;
            }
            match value
                .to_stored_string()
                .and_then(|stored| self.store.set(key, &stored))
            {
                Ok(()) => restored_keys += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to restore key, skipping");
                    failed_keys.push(key.clone());
                }
            }
        }

        self.sink.notify(
            "Backup Restored",
            "All data has been restored from backup. Reload application state.",
            NotificationCategory::System,
        );
        info!(
            restored = restored_keys,
            failed = failed_keys.len(),
            "restore applied"
        );
        Ok(RestoreOutcome {
            restored_keys,
            failed_keys,
            requires_full_reload: true,
        })
    }

    /// Delete a snapshot by id. Deleting an absent id is a no-op; returns
    /// whether anything was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.history.iter().position(|s| s.id == id) else {
            return Ok(false);
        };
        self.history.remove(index);
        self.persist_history()?;
        info!(id, "snapshot deleted");
        Ok(true)
    }

    /// Truncate history to the newest `limit` snapshots. A no-op when the
    /// history is already within the limit; returns the evicted count.
    pub fn prune_to_limit(&mut self, limit: usize) -> Result<usize> {
        if limit == 0 {
            return Err(VaultError::validation("prune limit must be at least 1"));
        }
        if self.history.len() <= limit {
            return Ok(0);
        }
        let evicted = self.history.len() - limit;
        self.history.truncate(limit);
        self.persist_history()?;
        info!(evicted, kept = limit, "history pruned");
        Ok(evicted)
    }

    /// Serialize a snapshot payload or the live record set as a
    /// pretty-printed export. Pure over state: nothing is mutated.
    pub fn export(&self, target: ExportTarget) -> Result<ExportFile> {
        match target {
            ExportTarget::Snapshot(id) => {
                let snapshot = self
                    .find(&id)
                    .ok_or_else(|| VaultError::validation(format!("no snapshot with id {id}")))?;
                Ok(ExportFile {
                    filename: snapshot.suggested_filename(),
                    contents: serde_json::to_string_pretty(&snapshot.payload)?,
                })
            }
            ExportTarget::Current => {
                let payload = self.collect_records()?;
                Ok(ExportFile {
                    filename: format!("2d-full-export-{}.json", Utc::now().format("%Y-%m-%d")),
                    contents: serde_json::to_string_pretty(&payload)?,
                })
            }
        }
    }

    /// Enable or disable scheduled captures; persisted immediately.
    pub fn set_scheduled_capture_enabled(&mut self, enabled: bool) -> Result<()> {
        self.settings.scheduled_capture_enabled = enabled;
        self.persist_settings()
    }

    /// Change the scheduled capture interval; persisted immediately.
    pub fn set_capture_interval(&mut self, interval: crate::CaptureInterval) -> Result<()> {
        self.settings.capture_interval = interval;
        self.persist_settings()
    }

    /// Change the retention bound; persisted immediately. Lowering the
    /// bound prunes history at once so the retention invariant holds after
    /// every mutating operation.
    pub fn set_max_retained(&mut self, max_retained: usize) -> Result<()> {
        if max_retained == 0 {
            return Err(VaultError::validation("max retained must be at least 1"));
        }
        self.settings.max_retained = max_retained;
        self.persist_settings()?;
        if self.history.len() > max_retained {
            self.enforce_retention();
            self.persist_history()?;
        }
        Ok(())
    }

    fn collect_records(&self) -> Result<RecordSet> {
        let mut payload = RecordSet::new();
        for key in KNOWN_KEYS {
            if let Some(stored) = self.store.get(key)? {
                payload.insert((*key).to_string(), RecordValue::parse_lenient(&stored));
            }
        }
        // Pick up any additional application-prefixed keys not already
        // captured. Reserved bookkeeping keys are excluded so a snapshot
        // never contains (and a restore can never clobber) vault state.
        for key in self.store.keys()? {
            if is_prefix_key(&key) && !payload.contains_key(&key) {
                if let Some(stored) = self.store.get(&key)? {
                    payload.insert(key, RecordValue::parse_lenient(&stored));
                }
            }
        }
        let total = payload.len();
        payload.insert(METADATA_KEY.to_string(), metadata_entry(total));
        Ok(payload)
    }

    fn sort_history(&mut self) {
        self.history
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    fn enforce_retention(&mut self) {
        self.sort_history();
        if self.history.len() > self.settings.max_retained {
            self.history.truncate(self.settings.max_retained);
        }
    }

    fn persist_history(&self) -> Result<()> {
        let text = serde_json::to_string(&self.history)?;
        self.store.set(HISTORY_KEY, &text)
    }

    fn persist_settings(&self) -> Result<()> {
        let text = serde_json::to_string(&self.settings)?;
        self.store.set(SETTINGS_KEY, &text)
    }
}

/// Parse an imported export file into a record set.
///
/// Permissive by design: any key in the top-level object is accepted
/// verbatim, including keys this version knows nothing about. Malformed
/// input fails with `ImportParse` and changes no state.
pub fn parse_import(text: &str) -> Result<RecordSet> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| VaultError::import_parse(e.to_string()))?;
    let serde_json::Value::Object(map) = value else {
        return Err(VaultError::import_parse(
            "top level must be a JSON object of records",
        ));
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, RecordValue::Json(value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_support::RecordingSink;
    use crate::notify::NullSink;
    use crate::settings::CaptureInterval;
    use crate::store::MemoryRecordStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn seeded_store() -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        store
            .set("2dNumbers", r#"{"07":"sold","23":"available"}"#)
            .unwrap();
        store
            .set("2dUserData", r#"{"name":"Mya","vip":true}"#)
            .unwrap();
        store.set("paymentVerifications", r#"[{"ref":"TX1"}]"#).unwrap();
        store
    }

    fn open_vault(
        store: MemoryRecordStore,
    ) -> (SnapshotVault<MemoryRecordStore, Arc<RecordingSink>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let vault = SnapshotVault::open(store, sink.clone()).unwrap();
        (vault, sink)
    }

    #[test]
    fn test_capture_collects_known_and_prefix_keys() {
        let store = seeded_store();
        store.set("2dDrawCache", r#"{"draws":[]}"#).unwrap();
        store.set("unrelatedKey", "ignored").unwrap();
        let (mut vault, _) = open_vault(store);

        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();
        assert!(snapshot.payload.contains_key("2dNumbers"));
        assert!(snapshot.payload.contains_key("2dDrawCache"));
        assert!(snapshot.payload.contains_key(METADATA_KEY));
        assert!(!snapshot.payload.contains_key("unrelatedKey"));
        assert_eq!(snapshot.record_count(), 4);
    }

    #[test]
    fn test_capture_excludes_own_bookkeeping() {
        let (mut vault, _) = open_vault(seeded_store());
        vault.capture(SnapshotKind::Manual).unwrap();

        // Second capture runs with history already persisted under a
        // prefixed key; it must not swallow it into the payload.
        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();
        assert!(!snapshot.payload.contains_key(HISTORY_KEY));
        assert!(!snapshot.payload.contains_key(SETTINGS_KEY));
    }

    #[test]
    fn test_lenient_capture_keeps_corrupt_value() {
        let store = seeded_store();
        store.set("2dShareStats", "corrupt {{ not json").unwrap();
        let (mut vault, _) = open_vault(store);

        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();
        assert_eq!(
            snapshot.payload.get("2dShareStats"),
            Some(&RecordValue::Raw("corrupt {{ not json".to_string()))
        );
    }

    #[test]
    fn test_retention_invariant() {
        let (mut vault, _) = open_vault(seeded_store());
        vault.set_max_retained(2).unwrap();

        let first = vault.capture(SnapshotKind::Manual).unwrap();
        vault.capture(SnapshotKind::Manual).unwrap();
        let third = vault.capture(SnapshotKind::Manual).unwrap();

        assert_eq!(vault.history().len(), 2);
        // Newest first, oldest evicted
        assert_eq!(vault.history()[0].id, third.id);
        assert!(vault.find(&first.id).is_none());
        for window in vault.history().windows(2) {
            assert!(window[0].timestamp >= window[1].timestamp);
        }
    }

    #[test]
    fn test_lowering_max_retained_prunes_immediately() {
        let (mut vault, _) = open_vault(seeded_store());
        for _ in 0..5 {
            vault.capture(SnapshotKind::Manual).unwrap();
        }
        vault.set_max_retained(3).unwrap();
        assert_eq!(vault.history().len(), 3);
    }

    #[test]
    fn test_restore_round_trip() {
        let store = seeded_store();
        store.set("2dShareStats", "raw text value").unwrap();
        let (mut vault, _) = open_vault(store);

        let before = vault.store().dump();
        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();

        let pending = vault
            .request_restore(RestoreSource::SnapshotId(snapshot.id.clone()))
            .unwrap();
        let outcome = vault.confirm_restore(pending).unwrap();

        assert!(outcome.requires_full_reload);
        assert!(outcome.failed_keys.is_empty());
        assert_eq!(outcome.restored_keys, 4);

        let after = vault.store().dump();
        for (key, value) in &before {
            assert_eq!(after.get(key), Some(value), "mismatch for {key}");
        }
        assert!(!after.contains_key(METADATA_KEY));
    }

    #[test]
    fn test_restore_preserves_bookkeeping() {
        let (mut vault, _) = open_vault(seeded_store());
        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();

        let history_before = vault.store().get(HISTORY_KEY).unwrap().unwrap();
        vault.set_max_retained(7).unwrap();
        let settings_before = vault.store().get(SETTINGS_KEY).unwrap().unwrap();

        let pending = vault
            .request_restore(RestoreSource::SnapshotId(snapshot.id.clone()))
            .unwrap();
        vault.confirm_restore(pending).unwrap();

        assert_eq!(
            vault.store().get(HISTORY_KEY).unwrap().unwrap(),
            history_before
        );
        assert_eq!(
            vault.store().get(SETTINGS_KEY).unwrap().unwrap(),
            settings_before
        );
    }

    #[test]
    fn test_restore_unknown_id_leaves_store_untouched() {
        let (mut vault, _) = open_vault(seeded_store());
        vault.capture(SnapshotKind::Manual).unwrap();

        let before = vault.store().dump();
        let result = vault.request_restore(RestoreSource::SnapshotId("MISSING".to_string()));
        assert!(matches!(result, Err(VaultError::RestoreFailed(_))));
        assert_eq!(vault.store().dump(), before);
    }

    #[test]
    fn test_restore_external_payload() {
        let (vault, _) = open_vault(seeded_store());

        let mut payload = RecordSet::new();
        payload.insert(
            "2dNumbers".to_string(),
            RecordValue::Json(serde_json::json!({"42": "sold"})),
        );
        let pending = vault
            .request_restore(RestoreSource::Payload(payload))
            .unwrap();
        assert_eq!(pending.record_count(), 1);
        let outcome = vault.confirm_restore(pending).unwrap();
        assert_eq!(outcome.restored_keys, 1);

        // Pre-existing application records were erased first
        assert!(vault.store().get("2dUserData").unwrap().is_none());
        assert_eq!(
            vault.store().get("2dNumbers").unwrap().as_deref(),
            Some(r#"{"42":"sold"}"#)
        );
    }

    #[test]
    fn test_restore_rejects_empty_payload() {
        let (vault, _) = open_vault(seeded_store());
        let mut payload = RecordSet::new();
        payload.insert(METADATA_KEY.to_string(), metadata_entry(0));
        let result = vault.request_restore(RestoreSource::Payload(payload));
        assert!(matches!(result, Err(VaultError::RestoreFailed(_))));
    }

    #[test]
    fn test_delete_idempotent() {
        let (mut vault, _) = open_vault(seeded_store());
        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();

        assert!(vault.delete(&snapshot.id).unwrap());
        let before = vault.history().to_vec();
        assert!(!vault.delete(&snapshot.id).unwrap());
        assert_eq!(vault.history(), &before[..]);
    }

    #[test]
    fn test_prune_idempotent_within_limit() {
        let (mut vault, _) = open_vault(seeded_store());
        vault.capture(SnapshotKind::Manual).unwrap();
        vault.capture(SnapshotKind::Manual).unwrap();

        assert_eq!(vault.prune_to_limit(5).unwrap(), 0);
        assert_eq!(vault.history().len(), 2);
        assert_eq!(vault.prune_to_limit(1).unwrap(), 1);
        assert_eq!(vault.history().len(), 1);
    }

    #[test]
    fn test_prune_rejects_zero() {
        let (mut vault, _) = open_vault(seeded_store());
        assert!(matches!(
            vault.prune_to_limit(0),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn test_schedule_check_triggers_when_due() {
        let (mut vault, _) = open_vault(seeded_store());
        vault.settings.scheduled_capture_enabled = true;
        vault.settings.capture_interval = CaptureInterval::Daily;
        vault.settings.last_scheduled_capture_at = Some(Utc::now() - Duration::hours(25));

        let taken = vault.schedule_check().unwrap();
        let snapshot = taken.expect("capture should be due after 25h on a daily interval");
        assert_eq!(snapshot.kind, SnapshotKind::Scheduled);
        assert_eq!(vault.history().len(), 1);

        // The last-capture time was advanced, so a second check is a no-op
        assert!(vault.schedule_check().unwrap().is_none());
    }

    #[test]
    fn test_schedule_check_noop_when_disabled_or_unseeded() {
        let (mut vault, _) = open_vault(seeded_store());

        vault.settings.scheduled_capture_enabled = false;
        vault.settings.last_scheduled_capture_at = Some(Utc::now() - Duration::hours(1000));
        assert!(vault.schedule_check().unwrap().is_none());

        vault.settings.scheduled_capture_enabled = true;
        vault.settings.last_scheduled_capture_at = None;
        assert!(vault.schedule_check().unwrap().is_none());
    }

    #[test]
    fn test_schedule_check_not_due() {
        let (mut vault, _) = open_vault(seeded_store());
        vault.settings.scheduled_capture_enabled = true;
        vault.settings.capture_interval = CaptureInterval::Weekly;
        vault.settings.last_scheduled_capture_at = Some(Utc::now() - Duration::hours(100));
        assert!(vault.schedule_check().unwrap().is_none());
    }

    #[test]
    fn test_export_snapshot_and_import_round_trip() {
        let (mut vault, _) = open_vault(seeded_store());
        let snapshot = vault.capture(SnapshotKind::Transfer).unwrap();

        let export = vault
            .export(ExportTarget::Snapshot(snapshot.id.clone()))
            .unwrap();
        assert!(export.filename.contains(&snapshot.id));
        assert!(export.filename.ends_with(".json"));

        let imported = parse_import(&export.contents).unwrap();
        assert!(imported.contains_key("2dNumbers"));
        assert!(imported.contains_key(METADATA_KEY));

        let pending = vault
            .request_restore(RestoreSource::Payload(imported))
            .unwrap();
        let outcome = vault.confirm_restore(pending).unwrap();
        assert_eq!(outcome.restored_keys, snapshot.record_count());
    }

    #[test]
    fn test_export_current_does_not_mutate() {
        let (vault, _) = open_vault(seeded_store());
        let export = vault.export(ExportTarget::Current).unwrap();
        assert!(export.filename.starts_with("2d-full-export-"));
        assert!(export.contents.contains("_metadata"));
        assert!(vault.history().is_empty());
    }

    #[test]
    fn test_parse_import_rejects_malformed_input() {
        assert!(matches!(
            parse_import("not json at all"),
            Err(VaultError::ImportParse(_))
        ));
        assert!(matches!(
            parse_import("[1, 2, 3]"),
            Err(VaultError::ImportParse(_))
        ));
    }

    #[test]
    fn test_capture_notifies_sink() {
        let (mut vault, sink) = open_vault(seeded_store());
        vault.capture(SnapshotKind::Manual).unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "Backup Created");
        assert_eq!(events[0].2, NotificationCategory::System);
    }

    #[test]
    fn test_history_and_settings_survive_reopen() {
        let store = seeded_store();
        let sink = Arc::new(RecordingSink::default());
        let mut vault = SnapshotVault::open(store, sink.clone()).unwrap();
        let snapshot = vault.capture(SnapshotKind::Manual).unwrap();
        vault.set_max_retained(4).unwrap();

        let store = MemoryRecordStore::new();
        for (key, value) in vault.store().dump() {
            store.set(&key, &value).unwrap();
        }
        let reopened = SnapshotVault::open(store, sink).unwrap();
        assert_eq!(reopened.history().len(), 1);
        assert_eq!(reopened.history()[0].id, snapshot.id);
        assert_eq!(reopened.settings().max_retained, 4);
    }

    #[test]
    fn test_open_with_corrupt_history_starts_empty() {
        let store = seeded_store();
        store.set(HISTORY_KEY, "corrupt!!").unwrap();
        let (vault, _) = open_vault(store);
        assert!(vault.history().is_empty());
    }

    /// Store wrapper that fails writes to the history key on demand.
    struct FlakyHistoryStore {
        inner: MemoryRecordStore,
        fail_history_writes: std::sync::atomic::AtomicBool,
    }

    impl RecordStore for FlakyHistoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == HISTORY_KEY
                && self
                    .fail_history_writes
                    .load(std::sync::atomic::Ordering::SeqCst)
            {
                return Err(VaultError::storage("quota exceeded"));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys()
        }
    }

    #[test]
    fn test_capture_rolls_back_on_persist_failure() {
        let store = FlakyHistoryStore {
            inner: seeded_store(),
            fail_history_writes: std::sync::atomic::AtomicBool::new(true),
        };
        let mut vault = SnapshotVault::open(store, NullSink).unwrap();

        let result = vault.capture(SnapshotKind::Manual);
        assert!(matches!(result, Err(VaultError::CaptureFailed(_))));
        assert!(vault.history().is_empty());

        vault
            .store()
            .fail_history_writes
            .store(false, std::sync::atomic::Ordering::SeqCst);
        vault.capture(SnapshotKind::Manual).unwrap();
        assert_eq!(vault.history().len(), 1);
    }
}
