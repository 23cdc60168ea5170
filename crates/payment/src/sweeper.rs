//! Background sweeper for approval timeouts.

use std::sync::Arc;
use std::time::Duration;

use catalog::CatalogStore;
use orders::OrderStore;

use crate::coordinator::PaymentCoordinator;

/// Runs the approval-timeout sweep on an interval, forever.
///
/// Spawn with `tokio::spawn`; errors are logged, never propagated — a
/// stale approval is a background concern, not a request failure.
pub async fn run_sweeper<S, C>(coordinator: Arc<PaymentCoordinator<S, C>>, every: Duration)
where
    S: OrderStore,
    C: CatalogStore,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match coordinator.sweep_approval_timeouts().await {
            Ok(0) => {}
            Ok(swept) => tracing::info!(swept, "approval sweep complete"),
            Err(err) => tracing::warn!(error = %err, "approval sweep failed"),
        }
    }
}
