use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

const REAP_INTERVAL: Duration = Duration::from_secs(5);
const COMPACT_INTERVAL: Duration = Duration::from_secs(60);

/// Expire every lapsed payment hold once. Returns how many were expired.
pub async fn sweep_expired_holds(engine: &Engine) -> usize {
    let mut reaped = 0;
    for (id, farm_id) in engine.collect_expired_holds(engine.now_ms()) {
        match engine.expire_reservation(id).await {
            Ok(_) => {
                info!("expired unpaid reservation {id} on farm {farm_id}");
                reaped += 1;
            }
            // Paid, cancelled or removed since it was collected.
            Err(e) => tracing::debug!("reaper skip {id}: {e}"),
        }
    }
    reaped
}

/// Background task that periodically expires lapsed payment holds.
pub async fn run_reaper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(REAP_INTERVAL);
    loop {
        interval.tick().await;
        sweep_expired_holds(&engine).await;
    }
}

/// Compact the WAL once it has grown by `threshold` appends. Returns whether
/// a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that keeps the WAL from growing without bound.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}
