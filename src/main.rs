mod api;
mod auth;
mod catalog;
mod config;
mod error;
mod fetcher;
mod matcher;
mod notifier;
mod scheduler;
mod state;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::{Settings, DEFAULT_DATA_DIR, PROGRESS_CHANNEL_CAPACITY};
use crate::error::Result;
use crate::scheduler::{RunHandles, Scheduler, SchedulerState};

#[tokio::main]
async fn main() {
    let data_dir = std::env::var("AAA_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

    let settings = match Settings::load(&data_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_level))
        .init();

    if let Err(e) = run(settings).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<()> {
    info!(
        "Starting {} scanner | data dir {} | {} workers | scan window [{}, {}]",
        settings.region,
        settings.data_dir.display(),
        settings.threads,
        settings.scan_time_min,
        settings.scan_time_max,
    );

    let handles = RunHandles::new()?;
    let cancel = CancellationToken::new();

    // --- Shutdown on Ctrl-C ---
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[SCHED] shutdown requested, finishing in-flight scans");
            shutdown.cancel();
        }
    });

    // --- Progress lines ---
    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let consumer = tokio::spawn(progress_consumer(progress_rx, Arc::clone(&handles.health)));

    // --- HTTP status API ---
    if settings.api_port != 0 {
        let app = router(ApiState {
            health: Arc::clone(&handles.health),
            latency: Arc::clone(&handles.latency),
            alert_log: Arc::clone(&handles.alert_log),
            store: Arc::clone(&handles.store),
        });
        let bind_addr = format!("0.0.0.0:{}", settings.api_port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        info!("HTTP API listening on {bind_addr}");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("HTTP API stopped: {e}");
            }
        });
    }

    let result = match Scheduler::boot(settings, handles.clone(), progress_tx.clone(), cancel).await {
        Ok(scheduler) => scheduler.run().await,
        Err(e) => {
            handles.health.set_state(SchedulerState::Stopped);
            let _ = progress_tx.try_send(format!("stopped during boot: {e}"));
            Err(e)
        }
    };

    drop(progress_tx);
    let _ = consumer.await;
    result
}

/// Logs each progress line and keeps the latest for /health.
async fn progress_consumer(mut rx: mpsc::Receiver<String>, health: Arc<HealthState>) {
    while let Some(line) = rx.recv().await {
        info!("[SCHED] {line}");
        health.set_progress(line);
    }
}
