//! Zenguard session engine binary.
//!
//! Reads host notifications as newline-delimited JSON from stdin and renders
//! the blocking surface as log lines.
//!
//! # Usage
//!
//! ```bash
//! # In-memory settings, default policy
//! zenguard
//!
//! # Persistent settings, unresolved foreground apps are blocked
//! zenguard --db zenguard.redb --unresolved block
//!
//! # Exercise degraded enforcement
//! echo '{"type":"start","duration_secs":5}' | zenguard --deny-lock-mode
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use zenguard_core::{DEFAULT_SELF_ID, SessionConfig, UnresolvedDisposition};
use zenguard_service::{
    ConsoleLockMode, ConsolePresentation, Engine, EngineConfig, MemorySettingsStore,
    RedbSettingsStore, SettingsStore, SystemEnv, feed,
};

/// Handling of foreground changes the host could not resolve.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Unresolved {
    /// Leave the blocking surface as it is
    Keep,
    /// Release the blocking surface
    Allow,
    /// Show the blocking surface
    Block,
}

impl From<Unresolved> for UnresolvedDisposition {
    fn from(value: Unresolved) -> Self {
        match value {
            Unresolved::Keep => Self::Keep,
            Unresolved::Allow => Self::Allow,
            Unresolved::Block => Self::Block,
        }
    }
}

/// Zenguard focus session engine
#[derive(Parser, Debug)]
#[command(name = "zenguard")]
#[command(about = "Focus session enforcement engine fed by newline-delimited JSON on stdin")]
#[command(version)]
struct Args {
    /// Path to the settings database. Settings are kept in memory if omitted
    #[arg(long)]
    db: Option<PathBuf>,

    /// Handling of unresolved foreground applications
    #[arg(long, value_enum, default_value = "keep")]
    unresolved: Unresolved,

    /// Application id of the engine itself (always allowed)
    #[arg(long, default_value = DEFAULT_SELF_ID)]
    self_id: String,

    /// Engine queue capacity
    #[arg(long, default_value = "64")]
    queue_capacity: usize,

    /// Refuse lock mode, to exercise degraded enforcement
    #[arg(long)]
    deny_lock_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!("zenguard starting");

    let config = EngineConfig {
        queue_capacity: args.queue_capacity,
        tick_interval: Duration::from_secs(1),
        session: SessionConfig {
            self_id: args.self_id.clone(),
            unresolved: args.unresolved.into(),
        },
    };

    match &args.db {
        Some(path) => {
            tracing::info!(path = %path.display(), "using persistent settings");
            run(RedbSettingsStore::open(path)?, config, args.deny_lock_mode).await
        },
        None => {
            tracing::info!("using in-memory settings");
            run(MemorySettingsStore::new(), config, args.deny_lock_mode).await
        },
    }
}

async fn run<S: SettingsStore>(
    store: S,
    config: EngineConfig,
    deny_lock_mode: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let env = SystemEnv::new();
    let lock_mode =
        if deny_lock_mode { ConsoleLockMode::denying() } else { ConsoleLockMode::new() };
    let (engine, handle) = Engine::new(env, ConsolePresentation::new(), lock_mode, store, config);
    let engine_task = tokio::spawn(engine.run());

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = feed::pump(stdin, &handle, &env) => match result {
            Ok(forwarded) => {
                tracing::info!(forwarded, "input closed, waiting for the session to end");
                wait_for_idle(&handle).await;
            },
            Err(e) => tracing::error!(error = %e, "feed stopped"),
        },
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    handle.shutdown().await;
    drop(handle);
    engine_task.await?;

    tracing::info!("zenguard stopped");
    Ok(())
}

/// Wait until no session is active, or until interrupted.
async fn wait_for_idle(handle: &zenguard_service::EngineHandle) {
    let mut snapshots = handle.subscribe();
    tokio::select! {
        result = snapshots.wait_for(|snapshot| !snapshot.active) => {
            if result.is_err() {
                tracing::debug!("engine stopped before the session ended");
            }
        },
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }
}
