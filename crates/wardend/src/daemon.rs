//! `wardend run`: control loop plus health endpoints in one process.
//!
//! Ctrl-C stops both gracefully. A fatal controller error also stops the
//! HTTP server and makes the process exit non-zero.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use warden_api::{ApiState, build_router};
use warden_controller::{Controller, ControllerSettings, FileFleet, ProviderRegistry};
use warden_core::WardenConfig;
use warden_health::HealthMonitor;

use crate::admin::open_store;

pub async fn run(config: WardenConfig) -> anyhow::Result<()> {
    info!("Warden daemon starting");
    if config.controller.namespaces.is_empty() {
        warn!("namespace allow-list is empty; the controller has nothing to watch");
    }

    // ── Initialize subsystems ──────────────────────────────────

    let store = open_store(&config)?;

    let fleet = Arc::new(FileFleet::new(
        &config.fleet.pods,
        config.controller.namespaces.iter().cloned(),
    ));
    info!(path = ?config.fleet.pods, "fleet file client initialized");

    let registry = ProviderRegistry::with_defaults();
    let settings = ControllerSettings::from_config(&config);
    if registry.select(&settings.manifest_source).is_none() {
        warn!(source = %settings.manifest_source, "no manifest provider handles the configured source");
    }
    let mut controller = Controller::new(settings, fleet.clone(), store, registry);

    let monitor = Arc::new(HealthMonitor::new(
        fleet.clone(),
        config.min_healthy_duration(),
    ));
    info!(
        min_healthy_secs = config.min_healthy_duration().as_secs(),
        "health monitor initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_shutdown = shutdown_rx.clone();
    let mut server_shutdown = shutdown_rx;

    // ── Control loop ───────────────────────────────────────────

    let mut controller_handle =
        tokio::spawn(async move { controller.run(controller_shutdown).await });

    // ── Health API ─────────────────────────────────────────────

    let state = ApiState::new(monitor, fleet, config.controller.namespaces.iter().cloned());
    let router = build_router(state);
    let addr: SocketAddr = config
        .health
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.health.listen))?;
    info!(%addr, "health API starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_shutdown.changed().await;
    });
    let server_handle = tokio::spawn(async move { server.await });

    // ── Wait for Ctrl-C or a controller exit ───────────────────

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("installing Ctrl-C handler")?;
            info!("shutdown signal received");
            None
        }
        joined = &mut controller_handle => Some(joined),
    };
    let _ = shutdown_tx.send(true);

    let outcome = match finished {
        Some(joined) => joined,
        None => controller_handle.await,
    };
    server_handle.await??;

    match outcome? {
        Ok(()) => {
            info!("Warden daemon stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "controller stopped");
            Err(e.into())
        }
    }
}
