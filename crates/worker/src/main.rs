use anyhow::Context;
use sitecheck_engine::upload_replay::UploadReplayer;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitecheck_worker::config::WorkerConfig;
use sitecheck_worker::replay_loop::ReplayLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitecheck_worker=debug,sitecheck_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    tracing::info!(
        batch_size = config.batch_size,
        max_attempts = config.retry.max_attempts,
        "Loaded worker configuration",
    );

    let pool = sitecheck_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    sitecheck_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    let replayer = UploadReplayer::new(pool.clone())
        .with_policy(config.retry)
        .with_batch_size(config.batch_size)
        .with_lock_timeout(config.lock_timeout);
    let replay_loop = ReplayLoop::new(replayer, config.interval, config.stale_after);

    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move { replay_loop.run(loop_cancel).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    tracing::info!("Received SIGINT (Ctrl-C), stopping replay loop");

    cancel.cancel();
    handle.await.context("Replay loop panicked")?;
    pool.close().await;

    tracing::info!("Worker stopped");
    Ok(())
}
