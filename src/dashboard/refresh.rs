//! Periodic background refresh.

use super::service::DashboardService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

/// Owns a running refresher. Stopping (or dropping) it cancels future
/// ticks; refreshes already in flight run to completion.
pub struct RefreshHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl RefreshHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and wait for the ticking loop to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("Refresh loop ended abnormally: {}", e);
        }
    }
}

/// Refresh `user_id`'s dashboard now and then every `interval`.
///
/// Each tick spawns an independent refresh, so a slow refresh never delays
/// the next tick; overlapping refreshes publish in completion order.
pub fn spawn_refresh(
    service: Arc<DashboardService>,
    user_id: i64,
    interval: Duration,
) -> RefreshHandle {
    let token = CancellationToken::new();
    let cancel = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Refreshing dashboard for user {} every {:?}", user_id, interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Refresher for user {} stopped", user_id);
                    return;
                }
                _ = ticker.tick() => {
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        if let Err(e) = service.get_role_scoped_dashboard_data(user_id).await {
                            warn!("Scheduled refresh for user {} failed: {}", user_id, e);
                        }
                    });
                }
            }
        }
    });

    RefreshHandle {
        _guard: token.clone().drop_guard(),
        token,
        task,
    }
}
