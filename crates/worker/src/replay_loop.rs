//! Periodic upload replay.
//!
//! Each tick first settles stale `processing` items, then replays one
//! batch of due items.

use std::time::Duration;

use sitecheck_engine::upload_replay::{ReplaySummary, UploadReplayer};
use sitecheck_engine::EngineError;
use tokio_util::sync::CancellationToken;

pub struct ReplayLoop {
    replayer: UploadReplayer,
    interval: Duration,
    stale_after: Duration,
}

impl ReplayLoop {
    pub fn new(replayer: UploadReplayer, interval: Duration, stale_after: Duration) -> Self {
        Self {
            replayer,
            interval,
            stale_after,
        }
    }

    /// Run until the cancellation token is triggered. A cycle in progress
    /// finishes before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            stale_after_secs = self.stale_after.as_secs(),
            "Upload replay loop started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Upload replay loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.cycle().await {
                        tracing::error!(error = %e, code = e.code(), "Upload replay cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: settle stale claims, then replay a batch.
    pub async fn cycle(&self) -> Result<ReplaySummary, EngineError> {
        self.replayer.release_stale(self.stale_after).await?;
        self.replayer.replay_due().await
    }
}
