use std::sync::Arc;

use autosuite_core::settings::Settings;
use autosuite_engine::{FlowRegistry, FlowRunner};
use autosuite_worker::{execute_job, telemetry, ProcessLauncher, Scheduler};
use clap::Parser;

/// Run one automation job to completion.
#[derive(Debug, Parser)]
#[command(name = "autosuite-worker", version)]
struct Cli {
    /// Id of the job to run.
    #[arg(long)]
    job_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("autosuite_worker=debug,autosuite_engine=debug");

    let cli = Cli::parse();
    let settings = Arc::new(Settings::from_env()?);

    // Separate process, so it opens its own pool.
    let pool = autosuite_db::create_pool(&settings.db_url).await?;

    let launcher = Arc::new(ProcessLauncher::from_settings(&settings)?);
    let scheduler = Scheduler::new(pool.clone(), launcher, settings.executor_max_workers);

    let registry = Arc::new(FlowRegistry::with_http_sessions(Arc::clone(&settings)));
    let runner = FlowRunner::new(registry, settings.item_max_retries);

    let outcome = execute_job(&pool, &runner, &scheduler, &cli.job_id).await?;
    tracing::info!(job_id = %cli.job_id, ?outcome, "Worker done");

    pool.close().await;
    Ok(())
}
