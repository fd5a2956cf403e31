//! Per-market lifecycle task.
//!
//! Every market gets one task at creation, driving the two timers of
//! its life: sleep until the close time and flip
//! `Open -> AwaitingResolution`, then sleep the grace period and
//! auto-refund if the creator never resolved. The task is aborted the
//! moment a manual resolution succeeds; the state compare-and-set
//! inside [`SettlementEngine::refund`] additionally guards the window
//! between a resolution landing and the abort taking effect, so
//! resolve and auto-refund can never both pay out.

use crate::error::MarketError;
use crate::notify::Notifier;
use crate::registry::MarketHandle;
use crate::settlement::SettlementEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Drive one market from open to a terminal state.
///
/// Spawned by the engine at market creation; never panics, so a
/// failure in one market's lifecycle cannot take down another's.
pub(crate) async fn run(
    handle: Arc<MarketHandle>,
    settlement: Arc<SettlementEngine>,
    notifier: Arc<dyn Notifier>,
    close_at: DateTime<Utc>,
    grace_period: Duration,
) {
    sleep_until(close_at).await;

    // Race-checked flip: if the market somehow left Open already,
    // there is nothing left for this task to do.
    let closed_snapshot = {
        let mut market = handle.lock().await;
        if !market.begin_awaiting_resolution() {
            debug!(market_id = %handle.id, "market left Open before close timer fired");
            return;
        }
        market.clone()
    };
    debug!(market_id = %handle.id, "betting closed, awaiting resolution");

    if let Err(e) = notifier
        .market_closed(closed_snapshot.creator_id, &closed_snapshot)
        .await
    {
        warn!(market_id = %handle.id, "creator notification failed: {e}");
    }

    tokio::time::sleep(grace_period).await;

    let mut market = handle.lock().await;
    match settlement.refund(&mut market).await {
        Ok(report) => {
            debug!(
                market_id = %handle.id,
                refunded = report.total_refunded,
                "grace period expired, stakes auto-refunded"
            );
        }
        // Lost the race against a manual resolution: the terminal
        // compare-and-set already happened, nothing to refund.
        Err(MarketError::AlreadyResolved(_)) | Err(MarketError::AlreadyRefunded(_)) => {
            debug!(market_id = %handle.id, "market resolved during grace period");
        }
        Err(e) => {
            error!(market_id = %handle.id, "auto-refund failed: {e}");
        }
    }
}

/// Sleep until a wall-clock instant, returning immediately if it has
/// passed.
async fn sleep_until(deadline: DateTime<Utc>) {
    let now = Utc::now();
    if let Ok(remaining) = (deadline - now).to_std() {
        tokio::time::sleep(remaining).await;
    }
}
