use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use autosuite_api::background::schedule_sweep;
use autosuite_api::config::ServerConfig;
use autosuite_api::prometheus;
use autosuite_api::router::build_app_router;
use autosuite_api::state::AppState;
use autosuite_core::settings::Settings;
use autosuite_engine::FlowRegistry;
use autosuite_worker::{reconcile_stale_jobs, telemetry, ProcessLauncher, Scheduler};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    telemetry::init("autosuite_api=debug,autosuite_worker=debug,tower_http=debug");

    // --- Configuration ---
    let settings = Arc::new(Settings::from_env()?);
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        max_workers = settings.executor_max_workers,
        "Loaded configuration"
    );

    // --- Database ---
    let pool = autosuite_db::create_pool(&settings.db_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    autosuite_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    autosuite_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Crash recovery ---
    // Any RUNNING job at this point belongs to a worker from a previous run.
    let report = reconcile_stale_jobs(&pool).await?;
    if report.jobs_failed > 0 {
        tracing::warn!(
            jobs_failed = report.jobs_failed,
            items_cancelled = report.items_cancelled,
            "Reconciled jobs orphaned by a previous run"
        );
    }

    // --- Metrics ---
    // Installed before the scheduler so the first claims are counted.
    let metrics = settings
        .metrics_enabled
        .then(prometheus::install_recorder)
        .transpose()?;
    tracing::info!(enabled = metrics.is_some(), "Metrics recorder configured");

    // --- Scheduler ---
    let launcher = Arc::new(ProcessLauncher::from_settings(&settings)?);
    tracing::info!(worker = %launcher.program().display(), "Worker launcher ready");
    let scheduler = Scheduler::new(pool.clone(), launcher, settings.executor_max_workers);

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        settings: Arc::clone(&settings),
        config: Arc::new(config.clone()),
        registry: Arc::new(FlowRegistry::with_http_sessions(Arc::clone(&settings))),
        scheduler: scheduler.clone(),
        metrics,
    };

    // Pick up jobs queued before the restart.
    if let Err(e) = scheduler.schedule_jobs().await {
        tracing::error!(error = %e, "Initial scheduling pass failed");
    }

    // --- Background sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = (settings.scheduler_sweep_secs > 0).then(|| {
        tokio::spawn(schedule_sweep::run(
            scheduler.clone(),
            Duration::from_secs(settings.scheduler_sweep_secs),
            sweep_cancel.clone(),
        ))
    });

    // --- Start server ---
    let app = build_app_router(state, &config);
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Schedule sweep stopped");
    }

    // Workers are separate processes and keep running; they write their own
    // results.
    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
