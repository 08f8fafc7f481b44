use fritz_booking::ReservationManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Periodically deletes holds whose expiry has passed. Reads already ignore
/// them; this keeps the table from accumulating dead rows.
pub fn spawn_hold_sweeper(manager: Arc<ReservationManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Hold sweeper started, running every {:?}", every);
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            sweep(&manager).await;
        }
    })
}

pub async fn sweep(manager: &ReservationManager) -> u64 {
    match manager.reclaim_expired().await {
        Ok(reclaimed) => reclaimed,
        Err(e) => {
            error!("Hold sweep failed: {}", e);
            0
        }
    }
}
