use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use super::manager::BillingManager;
use super::models::BatchResult;

/// key: billing-scheduler -> periodic batch passes
pub fn spawn(manager: Arc<BillingManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = process_tick(&manager, Utc::now()).await {
                error!(?err, "billing batch tick failed");
            }
        }
    })
}

/// key: billing-scheduler -> tick handler
pub async fn process_tick(manager: &BillingManager, now: DateTime<Utc>) -> Result<BatchResult> {
    let result = manager.run_batch(now).await?;

    if result.processed > 0 {
        info!(
            processed = result.processed,
            charged = result.charged,
            expired = result.expired,
            skipped = result.skipped,
            failed = result.failed,
            "billing batch pass complete"
        );
    }

    Ok(result)
}
