//! Best-effort user notifications.
//!
//! Settlement, refunds and lifecycle transitions emit events through
//! the [`Notifier`] seam so a front end can deliver them to users.
//! Delivery is best-effort by contract: a failed notification is
//! logged by the caller and never rolls back ledger credits or state
//! transitions already committed.

use crate::market::{Market, UserId};
use async_trait::async_trait;
use tracing::info;

/// Delivery failure, described for the log only.
pub type NotifyError = String;

/// Asynchronous, best-effort message delivery to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Betting closed; nudge the creator to resolve before the grace
    /// period expires.
    async fn market_closed(&self, creator: UserId, market: &Market) -> Result<(), NotifyError>;

    /// A participant backed the winning option.
    async fn stake_won(
        &self,
        user: UserId,
        market: &Market,
        stake: u64,
        payout: u64,
    ) -> Result<(), NotifyError>;

    /// A participant backed a losing option.
    async fn stake_lost(
        &self,
        user: UserId,
        market: &Market,
        stake: u64,
        winning_option: &str,
    ) -> Result<(), NotifyError>;

    /// A participant's stake was returned after an auto-refund.
    async fn stake_refunded(
        &self,
        user: UserId,
        market: &Market,
        amount: u64,
    ) -> Result<(), NotifyError>;
}

/// Notifier that writes events to the structured log.
///
/// Stands in for a chat front end; also useful as the delivery sink in
/// headless deployments.
#[derive(Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn market_closed(&self, creator: UserId, market: &Market) -> Result<(), NotifyError> {
        info!(
            market_id = %market.id,
            creator,
            question = %market.question,
            "betting closed; market awaits resolution before stakes auto-refund"
        );
        Ok(())
    }

    async fn stake_won(
        &self,
        user: UserId,
        market: &Market,
        stake: u64,
        payout: u64,
    ) -> Result<(), NotifyError> {
        info!(
            market_id = %market.id,
            user,
            stake,
            payout,
            profit = payout.saturating_sub(stake),
            "winning stake paid out"
        );
        Ok(())
    }

    async fn stake_lost(
        &self,
        user: UserId,
        market: &Market,
        stake: u64,
        winning_option: &str,
    ) -> Result<(), NotifyError> {
        info!(
            market_id = %market.id,
            user,
            stake,
            winning_option,
            "losing stake"
        );
        Ok(())
    }

    async fn stake_refunded(
        &self,
        user: UserId,
        market: &Market,
        amount: u64,
    ) -> Result<(), NotifyError> {
        info!(market_id = %market.id, user, amount, "stake refunded");
        Ok(())
    }
}
