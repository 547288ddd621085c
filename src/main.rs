//! lotto-alert - store proximity monitor
//!
//! Feeds location samples, store directory updates and permission changes
//! into the proximity engine and emits lotto-number notifications through
//! the log when the user comes near a store.
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded drive against a store directory
//! ./lotto-alert --stores stores.json --events drive.jsonl --speed 0
//!
//! # Live feed from another process
//! location-feed | ./lotto-alert --stores stores.json --stdin
//!
//! # Write the default configuration
//! ./lotto-alert --print-config > lotto_alert.toml
//! ```
//!
//! # Environment Variables
//!
//! - `LOTTO_ALERT_CONFIG`: Path to the TOML configuration file
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_DB`: Set to "true" to wipe recommendation history on startup

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lotto_alert::config::{self, EngineConfig};
use lotto_alert::pipeline::{EventSource, FileSource, ProcessingLoop, StdinSource};
use lotto_alert::proximity::{EngineHandle, EngineParts, EngineStats, LogChannel, ProximityEngine};
use lotto_alert::storage::{
    InMemoryHistoryBackend, RecommendationHistoryStore, SledHistoryBackend,
};
use lotto_alert::types::{Store, StoreRecord};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "lotto-alert")]
#[command(about = "Store proximity monitor with throttled lotto-number notifications")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML configuration file (overrides LOTTO_ALERT_CONFIG)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Store directory as a JSON array of records
    #[arg(long, value_name = "FILE")]
    stores: Option<PathBuf>,

    /// Replay engine events from a JSON-lines file
    #[arg(long, value_name = "FILE", conflicts_with = "stdin")]
    events: Option<PathBuf>,

    /// Read engine events from stdin (JSON lines)
    #[arg(long)]
    stdin: bool,

    /// Replay speed multiplier for --events (1 = one event per second, 0 = no delay)
    #[arg(long, default_value = "0")]
    speed: u64,

    /// Wipe recommendation history before starting.
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Startup helpers
// ============================================================================

/// Check whether history should be reset (CLI flag or env var).
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

/// Remove the history database directory.
fn reset_history_db(path: &Path) -> Result<()> {
    if !path.exists() {
        info!("History database does not exist, nothing to reset");
        return Ok(());
    }
    warn!("RESET_DB detected, removing {}", path.display());
    std::fs::remove_dir_all(path).context("Failed to remove history database")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(EngineConfig::load()),
    }
}

/// Open sled-backed history, falling back to memory when the database is unavailable.
fn open_history(config: &EngineConfig) -> RecommendationHistoryStore {
    let max_size = config.history.max_size;
    if let Some(parent) = config.history.db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create {}: {}", parent.display(), e);
        }
    }
    match SledHistoryBackend::open(&config.history.db_path, config.history.key.clone()) {
        Ok(backend) => {
            info!(
                "💾 History database {} ({} bytes on disk)",
                config.history.db_path.display(),
                backend.size_bytes()
            );
            RecommendationHistoryStore::open(backend, max_size)
        }
        Err(e) => {
            warn!(
                "History database unavailable ({}), history will not survive restart",
                e
            );
            RecommendationHistoryStore::open(InMemoryHistoryBackend::new(), max_size)
        }
    }
}

fn load_stores(path: &Path) -> Result<Vec<Store>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read store directory {}", path.display()))?;
    let records: Vec<StoreRecord> =
        serde_json::from_str(&raw).context("Failed to parse store directory")?;
    let stores: Vec<Store> = records.into_iter().map(StoreRecord::into_store).collect();
    let monitorable = stores.iter().filter(|s| s.is_monitorable()).count();
    info!(
        "🏪 {} stores loaded ({} with coordinates)",
        stores.len(),
        monitorable
    );
    Ok(stores)
}

async fn run_source<S: EventSource>(
    mut source: S,
    handle: EngineHandle,
    cancel_token: CancellationToken,
) -> Result<EngineStats> {
    ProcessingLoop::new(handle, cancel_token)
        .run(&mut source)
        .await
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let engine_config = load_config(args.config.as_deref())?;
    if args.print_config {
        let toml = engine_config.to_toml()?;
        print!("{toml}");
        return Ok(());
    }

    if args.events.is_none() && !args.stdin {
        anyhow::bail!("No input selected: pass --events <FILE> or --stdin");
    }

    // Reset before the database is opened
    if should_reset_db(args.reset_db) {
        reset_history_db(&engine_config.history.db_path)?;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  lotto-alert - store proximity monitor");
    info!(
        "  Regions: {} | Radius: {}m | Cooldown: {}s",
        engine_config.geofence.capacity,
        engine_config.geofence.trigger_radius_meters,
        engine_config.notification.min_interval_secs
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let history = open_history(&engine_config);
    let parts = EngineParts::from_config(&engine_config, history, Arc::new(LogChannel::new()));
    let (engine, handle) = ProximityEngine::new(parts, &engine_config.engine);
    let engine_task = engine.spawn();

    if let Some(path) = &args.stores {
        handle.store_set_changed(load_stores(path)?).await?;
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if let Some(path) = &args.events {
        let delay_ms = if args.speed == 0 {
            0
        } else {
            config::defaults::REPLAY_BASE_DELAY_MS / args.speed
        };
        info!("📥 Input: {} ({}ms between events)", path.display(), delay_ms);
        let source = FileSource::open(path, delay_ms).await?;
        run_source(source, handle, cancel_token).await?;
    } else {
        info!("📥 Input: stdin (JSON engine events)");
        run_source(StdinSource::new(), handle, cancel_token).await?;
    }

    // All handles are gone now; the engine drains outstanding deliveries
    let stats = engine_task.await.context("Proximity engine task failed")?;

    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Samples Processed:    {}", stats.samples_processed);
    info!("   Samples Dropped:      {}", stats.samples_dropped);
    info!("   Entry Events:         {}", stats.entry_events);
    info!("   Delivered:            {}", stats.delivered);
    info!("   Failed:               {}", stats.failed);
    info!("   Throttled:            {}", stats.throttled);
    info!("   History Size:         {}", stats.history_len);
    if stats.persistence_failures > 0 {
        warn!("   Persistence Failures: {}", stats.persistence_failures);
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("✓ lotto-alert shutdown complete");
    Ok(())
}
