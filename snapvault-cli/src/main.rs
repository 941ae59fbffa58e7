/*!
Snapvault CLI - Command-line interface for the Snapvault snapshot system.

This CLI drives the snapshot vault over a file-backed record store:
capturing, listing, restoring, exporting and pruning snapshots, and
managing the scheduled-capture settings.
*/

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use snapvault_core::{
    format_size, parse_import, CaptureInterval, ExportTarget, FileRecordStore, LogSink,
    PendingRestore, RestoreSource, SnapshotKind, SnapshotVault,
};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::info;

type Vault = SnapshotVault<FileRecordStore, LogSink>;

#[derive(Parser)]
#[command(name = "snapvault")]
#[command(about = "CLI for the Snapvault local-state snapshot system")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path of the record store file
    #[arg(short, long, global = true, env = "SNAPVAULT_STORE", default_value = "./snapvault-store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CaptureKindArg {
    Manual,
    Scheduled,
    Transfer,
}

impl From<CaptureKindArg> for SnapshotKind {
    fn from(arg: CaptureKindArg) -> Self {
        match arg {
            CaptureKindArg::Manual => SnapshotKind::Manual,
            CaptureKindArg::Scheduled => SnapshotKind::Scheduled,
            CaptureKindArg::Transfer => SnapshotKind::Transfer,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum IntervalArg {
    Daily,
    Weekly,
    Monthly,
}

impl From<IntervalArg> for CaptureInterval {
    fn from(arg: IntervalArg) -> Self {
        match arg {
            IntervalArg::Daily => CaptureInterval::Daily,
            IntervalArg::Weekly => CaptureInterval::Weekly,
            IntervalArg::Monthly => CaptureInterval::Monthly,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show vault status and settings
    Status,
    /// Capture a snapshot of the current application records
    Capture {
        /// Kind of snapshot to record
        #[arg(short, long, value_enum, default_value = "manual")]
        kind: CaptureKindArg,
    },
    /// List all retained snapshots
    List,
    /// Show details of a specific snapshot
    Show {
        /// Snapshot identifier
        snapshot_id: String,
    },
    /// Restore a snapshot over live state
    Restore {
        /// Snapshot identifier
        snapshot_id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Restore from an exported backup file
    RestoreFile {
        /// Path of the exported JSON file
        path: PathBuf,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Export a snapshot (or the live state) as a JSON file
    Export {
        /// Snapshot identifier, or "current" for the live record set
        target: String,
        /// Directory to write the export into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Delete a snapshot
    Delete {
        /// Snapshot identifier
        snapshot_id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Truncate history to the newest N snapshots
    Prune {
        /// Number of snapshots to keep
        keep: usize,
    },
    /// Run the scheduled-capture check once
    Check,
    /// Inspect or change vault settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Show current settings
    Show,
    /// Enable or disable scheduled captures
    Auto {
        #[arg(value_enum)]
        state: ToggleArg,
    },
    /// Set the scheduled capture interval
    Interval {
        #[arg(value_enum)]
        interval: IntervalArg,
    },
    /// Set the maximum number of retained snapshots
    Max {
        max_retained: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ToggleArg {
    On,
    Off,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Created")]
    timestamp: String,
    #[tabled(rename = "Records")]
    records: usize,
    #[tabled(rename = "Size")]
    size: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let store = FileRecordStore::new(&cli.store);
    let mut vault = SnapshotVault::open(store, LogSink)
        .with_context(|| format!("opening record store {}", cli.store.display()))?;

    match cli.command {
        Commands::Status => show_status(&vault),
        Commands::Capture { kind } => capture(&mut vault, kind.into())?,
        Commands::List => list_snapshots(&vault),
        Commands::Show { snapshot_id } => show_snapshot(&vault, &snapshot_id)?,
        Commands::Restore { snapshot_id, force } => {
            let pending = vault.request_restore(RestoreSource::SnapshotId(snapshot_id))?;
            apply_restore(&vault, pending, force)?;
        }
        Commands::RestoreFile { path, force } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading backup file {}", path.display()))?;
            let payload = parse_import(&text)?;
            let pending = vault.request_restore(RestoreSource::Payload(payload))?;
            apply_restore(&vault, pending, force)?;
        }
        Commands::Export { target, out } => export(&vault, &target, &out)?,
        Commands::Delete { snapshot_id, force } => delete_snapshot(&mut vault, &snapshot_id, force)?,
        Commands::Prune { keep } => {
            let evicted = vault.prune_to_limit(keep)?;
            if evicted == 0 {
                println!("Nothing to prune, {} snapshots retained", vault.history().len());
            } else {
                println!("Pruned {evicted} snapshots, kept the newest {keep}");
            }
        }
        Commands::Check => match vault.schedule_check()? {
            Some(snapshot) => println!("Scheduled snapshot captured: {}", snapshot.id),
            None => println!("No scheduled capture due"),
        },
        Commands::Settings { action } => settings_command(&mut vault, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn show_status(vault: &Vault) {
    let stats = vault.stats();
    let settings = vault.settings();

    println!("Vault Status:");
    println!("  Snapshots retained: {}", stats.snapshot_count);
    println!(
        "  Last capture: {}",
        stats
            .last_capture_at
            .map(format_timestamp)
            .unwrap_or_else(|| "Never".to_string())
    );
    println!("  Total data: {}", format_size(stats.total_payload_bytes));
    println!(
        "  Auto backup: {}",
        if stats.scheduled_capture_enabled { "ON" } else { "OFF" }
    );
    println!("  Interval: {}", settings.capture_interval);
    println!("  Max retained: {}", settings.max_retained);
    if let Some(last) = settings.last_scheduled_capture_at {
        println!("  Last scheduled capture: {}", format_timestamp(last));
    }
}

fn capture(vault: &mut Vault, kind: SnapshotKind) -> Result<(), anyhow::Error> {
    let snapshot = vault.capture(kind)?;
    println!(
        "Snapshot {} captured ({} records, {})",
        snapshot.id,
        snapshot.record_count(),
        format_size(snapshot.size_bytes)
    );
    Ok(())
}

fn list_snapshots(vault: &Vault) {
    if vault.history().is_empty() {
        println!("No snapshots yet");
        return;
    }

    let rows: Vec<SnapshotRow> = vault
        .history()
        .iter()
        .map(|snapshot| SnapshotRow {
            id: snapshot.id.clone(),
            kind: snapshot.kind.to_string(),
            timestamp: format_timestamp(snapshot.timestamp),
            records: snapshot.record_count(),
            size: format_size(snapshot.size_bytes),
        })
        .collect();
    let table = Table::new(rows);
    println!("{table}");
}

fn show_snapshot(vault: &Vault, snapshot_id: &str) -> Result<(), anyhow::Error> {
    let snapshot = vault
        .find(snapshot_id)
        .with_context(|| format!("no snapshot with id {snapshot_id}"))?;

    println!("Snapshot Details:");
    println!("  ID: {}", snapshot.id);
    println!("  Kind: {}", snapshot.kind);
    println!("  Created: {}", format_timestamp(snapshot.timestamp));
    println!("  Records: {}", snapshot.record_count());
    println!("  Size: {}", format_size(snapshot.size_bytes));
    println!("  Keys:");
    for key in snapshot.payload.keys() {
        println!("    {key}");
    }
    Ok(())
}

fn apply_restore(vault: &Vault, pending: PendingRestore, force: bool) -> Result<(), anyhow::Error> {
    if !force {
        let prompt = format!(
            "Restore {} ({} records)? This overwrites ALL current data. (y/N): ",
            pending.description(),
            pending.record_count()
        );
        if !confirm(&prompt)? {
            println!("Restore cancelled");
            return Ok(());
        }
    }

    let outcome = vault.confirm_restore(pending)?;
    println!("Restored {} records", outcome.restored_keys);
    if !outcome.failed_keys.is_empty() {
        println!(
            "Warning: {} records could not be written: {}",
            outcome.failed_keys.len(),
            outcome.failed_keys.join(", ")
        );
    }
    println!("Live state replaced; restart any application using this store");
    Ok(())
}

fn export(vault: &Vault, target: &str, out: &std::path::Path) -> Result<(), anyhow::Error> {
    let target = if target.eq_ignore_ascii_case("current") {
        ExportTarget::Current
    } else {
        ExportTarget::Snapshot(target.to_string())
    };

    let export = vault.export(target)?;
    let path = out.join(&export.filename);
    std::fs::write(&path, &export.contents)
        .with_context(|| format!("writing export to {}", path.display()))?;
    info!(path = %path.display(), "export written");
    println!("Exported to {}", path.display());
    Ok(())
}

fn delete_snapshot(vault: &mut Vault, snapshot_id: &str, force: bool) -> Result<(), anyhow::Error> {
    if !force {
        let prompt = format!("Delete snapshot '{snapshot_id}'? (y/N): ");
        if !confirm(&prompt)? {
            println!("Deletion cancelled");
            return Ok(());
        }
    }

    if vault.delete(snapshot_id)? {
        println!("Snapshot deleted");
    } else {
        println!("No snapshot with id {snapshot_id}");
    }
    Ok(())
}

fn settings_command(vault: &mut Vault, action: SettingsCommand) -> Result<(), anyhow::Error> {
    match action {
        SettingsCommand::Show => {
            let settings = vault.settings();
            println!(
                "{}",
                serde_json::to_string_pretty(settings).context("serializing settings")?
            );
        }
        SettingsCommand::Auto { state } => {
            let enabled = matches!(state, ToggleArg::On);
            vault.set_scheduled_capture_enabled(enabled)?;
            println!(
                "Auto backup {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        SettingsCommand::Interval { interval } => {
            let interval: CaptureInterval = interval.into();
            vault.set_capture_interval(interval)?;
            println!("Capture interval set to {interval}");
        }
        SettingsCommand::Max { max_retained } => {
            vault.set_max_retained(max_retained)?;
            println!("Max retained snapshots set to {max_retained}");
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, anyhow::Error> {
    use std::io::{self, Write};

    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase().starts_with('y'))
}

fn format_timestamp(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}
