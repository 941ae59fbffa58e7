/*!
# Snapvault Core Engine

Local-state snapshot and restore system for key-value application data.

This crate captures the full set of named application records from a durable
key-value store into versioned snapshots, keeps a bounded newest-first
history of them, and can restore any historical snapshot (or an imported
payload) back over live state.

## Architecture

The engine is isolated from infrastructure concerns behind two ports:

- [`RecordStore`] — the durable key-value backing (file-based adapter
  provided, in-memory adapter for tests)
- [`NotificationSink`] — best-effort consumer of "backup created/restored"
  events

Both are injected at construction, so the vault is a plain object with test
doubles instead of ambient global state.

## Usage

```
use snapvault_core::{MemoryRecordStore, NullSink, RecordStore, RestoreSource, SnapshotKind, SnapshotVault};

let store = MemoryRecordStore::new();
store.set("2dNumbers", r#"{"07":"sold"}"#)?;

let mut vault = SnapshotVault::open(store, NullSink)?;
let snapshot = vault.capture(SnapshotKind::Manual)?;

let pending = vault.request_restore(RestoreSource::SnapshotId(snapshot.id.clone()))?;
let outcome = vault.confirm_restore(pending)?;
assert!(outcome.requires_full_reload);
# Ok::<(), snapvault_core::VaultError>(())
```

Restore is best-effort per key, not atomic: callers must fully reload their
own state afterward rather than trusting in-memory caches.
*/

pub mod error;
pub mod notify;
pub mod record;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod vault;

pub use error::{Result, VaultError};
pub use notify::{LogSink, NotificationCategory, NotificationSink, NullSink};
pub use record::{RecordSet, RecordValue};
pub use settings::{CaptureInterval, VaultSettings};
pub use snapshot::{format_size, Snapshot, SnapshotKind};
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use vault::{
    parse_import, ExportFile, ExportTarget, PendingRestore, RestoreOutcome, RestoreSource,
    SnapshotVault, VaultStats,
};
