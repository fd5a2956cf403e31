//! Settlement and refund passes over a closed market.
//!
//! Payouts are always pari-mutuel whatever pricing model quoted the
//! stakes: each winner receives `floor(total_staked * stake /
//! staked_on_winner)`, so winners split the entire pool in proportion
//! to their stake on the winning option. Refunds return every
//! participant exactly their cumulative stake.
//!
//! Both passes begin with the market's terminal compare-and-set, which
//! the caller runs under the per-market lock; that flip is what
//! guarantees exactly one payout or refund pass per market. Ledger
//! credits issued after the flip are logged on failure but never
//! unwind the terminal state, and notifications are best-effort.

use crate::error::Result;
use crate::ledger::LedgerClient;
use crate::market::{Market, UserId};
use crate::notify::Notifier;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of a settlement pass.
#[derive(Clone, Debug)]
pub struct SettlementReport {
    pub market_id: String,
    pub winning_option: String,
    /// Points credited to winners. At most `total_staked`; the
    /// difference is integer truncation (or the whole pool when nobody
    /// backed the winner).
    pub total_distributed: u64,
    pub payouts: Vec<(UserId, u64)>,
    /// Credits the ledger refused; logged for manual follow-up.
    pub failed_credits: Vec<(UserId, u64)>,
}

/// Outcome of a refund pass.
#[derive(Clone, Debug)]
pub struct RefundReport {
    pub market_id: String,
    /// Points returned. Equals `total_staked` when every credit
    /// succeeded.
    pub total_refunded: u64,
    pub refunds: Vec<(UserId, u64)>,
    pub failed_credits: Vec<(UserId, u64)>,
}

/// Computes payouts/refunds from final market state and drives the
/// ledger credits.
pub struct SettlementEngine {
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementEngine {
    pub fn new(ledger: Arc<dyn LedgerClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { ledger, notifier }
    }

    /// Resolve the market with `winning_option` and pay out winners.
    ///
    /// The caller holds the market's lock. Fails without any side
    /// effect if the option is unknown or the market is not awaiting
    /// resolution; after the state flip succeeds, credit failures are
    /// reported but the resolution stands.
    pub async fn settle(&self, market: &mut Market, winning_option: &str) -> Result<SettlementReport> {
        let winning_index = market.option_index(winning_option)?;
        market.complete_resolution(winning_index)?;

        let winning_pool = market.staked_on(winning_index);
        let mut report = SettlementReport {
            market_id: market.id.clone(),
            winning_option: winning_option.to_string(),
            total_distributed: 0,
            payouts: Vec::new(),
            failed_credits: Vec::new(),
        };

        if winning_pool == 0 {
            // Nobody backed the winner; escrowed stakes stay with the
            // house. Losers are still told the outcome below.
            info!(
                market_id = %market.id,
                winning_option,
                pool = market.total_staked,
                "no stakes on winning option; pool retained"
            );
        } else {
            let mut payouts: Vec<(UserId, u64)> = market.stakes[winning_index]
                .iter()
                .map(|(&participant, &stake)| {
                    (participant, payout_for(market.total_staked, stake, winning_pool))
                })
                .collect();
            // Deterministic credit order; payouts themselves are
            // order-independent.
            payouts.sort_unstable();

            for &(participant, payout) in &payouts {
                if payout == 0 {
                    continue;
                }
                match self.ledger.credit_points(participant, payout).await {
                    Ok(()) => {
                        report.total_distributed += payout;
                        let stake = market.participant_stake(winning_index, participant);
                        if let Err(e) = self
                            .notifier
                            .stake_won(participant, market, stake, payout)
                            .await
                        {
                            warn!(market_id = %market.id, participant, "win notification failed: {e}");
                        }
                    }
                    Err(e) => {
                        error!(
                            market_id = %market.id,
                            participant,
                            payout,
                            "payout credit failed, needs manual follow-up: {e}"
                        );
                        report.failed_credits.push((participant, payout));
                    }
                }
            }
            report.payouts = payouts;
        }

        for (index, _option) in market.options.iter().enumerate() {
            if index == winning_index {
                continue;
            }
            for (&participant, &stake) in &market.stakes[index] {
                if let Err(e) = self
                    .notifier
                    .stake_lost(participant, market, stake, winning_option)
                    .await
                {
                    warn!(market_id = %market.id, participant, "loss notification failed: {e}");
                }
            }
        }

        info!(
            market_id = %market.id,
            winning_option,
            distributed = report.total_distributed,
            winners = report.payouts.len(),
            "market resolved"
        );
        Ok(report)
    }

    /// Refund every stake after the grace period expired unresolved.
    ///
    /// The caller holds the market's lock. Idempotent against
    /// scheduler races: a market already resolved or refunded fails
    /// the initial compare-and-set and nothing is credited.
    pub async fn refund(&self, market: &mut Market) -> Result<RefundReport> {
        market.complete_refund()?;

        let mut report = RefundReport {
            market_id: market.id.clone(),
            total_refunded: 0,
            refunds: Vec::new(),
            failed_credits: Vec::new(),
        };

        let mut refunds: Vec<(UserId, u64)> = Vec::new();
        for stakes in &market.stakes {
            for (&participant, &amount) in stakes {
                refunds.push((participant, amount));
            }
        }
        refunds.sort_unstable();

        for &(participant, amount) in &refunds {
            match self.ledger.credit_points(participant, amount).await {
                Ok(()) => {
                    report.total_refunded += amount;
                    if let Err(e) = self
                        .notifier
                        .stake_refunded(participant, market, amount)
                        .await
                    {
                        warn!(market_id = %market.id, participant, "refund notification failed: {e}");
                    }
                }
                Err(e) => {
                    error!(
                        market_id = %market.id,
                        participant,
                        amount,
                        "refund credit failed, needs manual follow-up: {e}"
                    );
                    report.failed_credits.push((participant, amount));
                }
            }
        }
        report.refunds = refunds;

        info!(
            market_id = %market.id,
            refunded = report.total_refunded,
            "market refunded"
        );
        Ok(report)
    }
}

/// A winner's pari-mutuel share of the pool, floored.
fn payout_for(total_staked: u64, stake: u64, winning_pool: u64) -> u64 {
    ((total_staked as u128 * stake as u128) / winning_pool as u128) as u64
}
