//! # Shopfloor Back Office
//!
//! Long-running process that owns the tenant router.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load config ──► init tracing ──► create data dir                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ConnectionRouter ──► control plane ──► warm every active tenant store │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  wait for Ctrl+C / SIGTERM ──► close_all                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! shopfloor                        # platform config file, if any
//! shopfloor --config ./shopfloor.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use shopfloor_db::ConnectionRouter;
use shopfloor_service::{telemetry, Backoffice, BackofficeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = parse_args();

    let config = BackofficeConfig::load(config_path).context("loading configuration")?;
    telemetry::init(&config.logging.filter);

    info!("Starting Shopfloor back office...");
    info!(
        data_dir = %config.storage.data_dir.display(),
        in_memory = config.storage.in_memory,
        control_store = %config.storage.control_store,
        "Configuration loaded"
    );

    if !config.storage.in_memory {
        std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
            format!("creating data dir {}", config.storage.data_dir.display())
        })?;
    }

    let router = Arc::new(ConnectionRouter::new(config.router_config()));
    let backoffice = Backoffice::new(Arc::clone(&router));

    let control = router
        .control_plane()
        .await
        .context("opening the control plane")?;
    let tenants = control.tenants().list_active().await?;
    info!(count = tenants.len(), "Registered tenants");

    for tenant in &tenants {
        match backoffice.store_for(&tenant.id).await {
            Ok(_) => info!(tenant = %tenant.name, store_name = %tenant.store_name, "Store ready"),
            Err(e) => warn!(
                tenant = %tenant.name,
                store_name = %tenant.store_name,
                error = %e,
                "Store unavailable, will retry on first request"
            ),
        }
    }

    shutdown_signal().await;

    let open = backoffice.tracker().active_count().await.unwrap_or(0);
    if open > 0 {
        warn!(sessions = open, "Discarding sessions that were never closed");
    }

    router.close_all().await;
    info!("Shutdown complete");
    Ok(())
}

/// `--config <path>` / `-c <path>`; everything else is ignored.
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        if matches!(args[i].as_str(), "--config" | "-c") && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
        i += 1;
    }
    None
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
