//! # Prediction Engine
//!
//! The façade tying the registry, the ledger, settlement and the
//! per-market lifecycle tasks together. Front ends call these
//! operations with validated primitive inputs and render the
//! structured results or errors; no business logic lives outside this
//! crate.
//!
//! Every operation that touches a market's pool or state runs inside
//! that market's exclusive section, covering the whole
//! read-compute-write span (including the escrow call), so concurrent
//! stakes can never price against a pool state the other has already
//! invalidated. Operations on different markets run fully in parallel.

use crate::config::EngineConfig;
use crate::error::{MarketError, Result};
use crate::ledger::LedgerClient;
use crate::lifecycle;
use crate::market::{Market, PricingModel, Quote, UserId};
use crate::notify::Notifier;
use crate::registry::{MarketFilter, MarketRegistry};
use crate::settlement::{SettlementEngine, SettlementReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Inputs for opening a market.
#[derive(Clone, Debug)]
pub struct CreateMarket {
    pub question: String,
    pub options: Vec<String>,
    pub creator: UserId,
    pub category: Option<String>,
    pub close_at: DateTime<Utc>,
    pub pricing_model: PricingModel,
}

/// Confirmation returned for an accepted stake.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StakeReceipt {
    pub market_id: String,
    pub participant: UserId,
    pub option: String,
    pub amount: u64,
    /// Shares bought under the market's pricing model.
    pub shares: f64,
    pub price_per_share: f64,
    /// Pari-mutuel odds on the option after this stake landed.
    pub odds_after: f64,
}

/// The prediction-market engine.
///
/// Cheap to share: clones of the inner `Arc`s; one engine per process
/// owns the registry and all lifecycle tasks.
pub struct PredictionEngine {
    registry: Arc<MarketRegistry>,
    ledger: Arc<dyn LedgerClient>,
    notifier: Arc<dyn Notifier>,
    settlement: Arc<SettlementEngine>,
    config: EngineConfig,
}

impl PredictionEngine {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let settlement = Arc::new(SettlementEngine::new(ledger.clone(), notifier.clone()));
        Self {
            registry: Arc::new(MarketRegistry::new()),
            ledger,
            notifier,
            settlement,
            config,
        }
    }

    /// The engine's market registry, for read-only queries.
    pub fn registry(&self) -> &MarketRegistry {
        &self.registry
    }

    /// Open a market and start its lifecycle task.
    ///
    /// Returns a snapshot of the freshly created market.
    pub async fn create_market(&self, request: CreateMarket) -> Result<Market> {
        let market = Market::new(
            request.question,
            request.options,
            request.creator,
            request.category,
            Utc::now(),
            request.close_at,
            request.pricing_model,
            self.config.initial_liquidity,
        )?;
        let snapshot = market.clone();

        let handle = self.registry.insert(market);
        let task = tokio::spawn(lifecycle::run(
            handle.clone(),
            self.settlement.clone(),
            self.notifier.clone(),
            snapshot.close_at,
            self.config.grace_period,
        ));
        handle.set_lifecycle(task.abort_handle());

        info!(
            market_id = %snapshot.id,
            creator = snapshot.creator_id,
            question = %snapshot.question,
            close_at = %snapshot.close_at,
            "market created"
        );
        Ok(snapshot)
    }

    /// Price a candidate stake without committing anything.
    pub async fn quote(&self, market_id: &str, option: &str, amount: u64) -> Result<Quote> {
        let handle = self.lookup(market_id)?;
        let market = handle.lock().await;
        market.quote(option, amount)
    }

    /// Stake points on an open market.
    ///
    /// Escrows the stake into the house account first, then commits
    /// the pool bookkeeping; both happen inside the market's exclusive
    /// section. If the escrow fails nothing is mutated; if the local
    /// commit fails after escrow, a compensating transfer returns the
    /// points before the error surfaces.
    pub async fn stake(
        &self,
        participant: UserId,
        market_id: &str,
        option: &str,
        amount: u64,
    ) -> Result<StakeReceipt> {
        let handle = self.lookup(market_id)?;
        let mut market = handle.lock().await;

        if !market.is_open_at(Utc::now()) {
            return Err(MarketError::MarketClosed(market.id.clone()));
        }
        let quote = market.quote(option, amount)?;
        let option_index = market.option_index(option)?;

        let balance = self.ledger.get_balance(participant).await?;
        if balance < amount {
            return Err(MarketError::InsufficientBalance {
                balance,
                needed: amount,
            });
        }

        // Escrow first; the points sit with the house until the market
        // settles or refunds.
        self.ledger
            .transfer_points(participant, self.config.house_account, amount)
            .await?;

        match market.apply_stake(participant, option_index, amount) {
            Ok(shares) => {
                let receipt = StakeReceipt {
                    market_id: market.id.clone(),
                    participant,
                    option: option.to_string(),
                    amount,
                    shares,
                    price_per_share: quote.price_per_share,
                    odds_after: market.odds(option_index),
                };
                info!(
                    market_id = %market.id,
                    participant,
                    option,
                    amount,
                    shares,
                    "stake placed"
                );
                Ok(receipt)
            }
            Err(e) => {
                // Local commit failed after escrow: reverse the ledger
                // side-effect before surfacing the error.
                if let Err(comp) = self
                    .ledger
                    .transfer_points(self.config.house_account, participant, amount)
                    .await
                {
                    error!(
                        market_id = %market.id,
                        participant,
                        amount,
                        "compensating transfer failed, escrow stranded: {comp}"
                    );
                }
                Err(e)
            }
        }
    }

    /// Resolve a closed market with its winning option and distribute
    /// payouts.
    ///
    /// Only the market's creator may resolve it. A successful
    /// resolution cancels the market's lifecycle task so the
    /// auto-refund timer cannot fire afterwards.
    pub async fn resolve(
        &self,
        caller: UserId,
        market_id: &str,
        winning_option: &str,
    ) -> Result<SettlementReport> {
        let handle = self.lookup(market_id)?;
        let report = {
            let mut market = handle.lock().await;
            if market.creator_id != caller {
                return Err(MarketError::NotCreator {
                    market_id: market.id.clone(),
                    user: caller,
                });
            }
            self.settlement.settle(&mut market, winning_option).await?
        };
        handle.cancel_lifecycle();
        Ok(report)
    }

    /// Snapshot of every market matching the filter.
    pub async fn list(&self, filter: &MarketFilter) -> Vec<Market> {
        self.registry.snapshot(filter, Utc::now()).await
    }

    /// Every position on one market.
    pub async fn bet_history(&self, market_id: &str) -> Result<Vec<(UserId, String, u64)>> {
        let handle = self.lookup(market_id)?;
        let market = handle.lock().await;
        Ok(market.bet_history())
    }

    /// Distinct categories across all markets.
    pub async fn categories(&self) -> Vec<String> {
        self.registry.categories().await
    }

    fn lookup(&self, market_id: &str) -> Result<Arc<crate::registry::MarketHandle>> {
        self.registry
            .get(market_id)
            .ok_or_else(|| MarketError::MarketNotFound(market_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ledger::MemoryLedger;
    use crate::market::MarketState;
    use crate::notify::LogNotifier;
    use crate::test_utils::{FlakyLedger, HOUSE};
    use chrono::Duration as ChronoDuration;

    fn engine_with(ledger: Arc<dyn LedgerClient>) -> PredictionEngine {
        PredictionEngine::new(ledger, Arc::new(LogNotifier), EngineConfig::new(HOUSE))
    }

    fn create_request(pricing_model: PricingModel) -> CreateMarket {
        CreateMarket {
            question: "Will it rain tomorrow?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            creator: 1,
            category: Some("weather".to_string()),
            close_at: Utc::now() + ChronoDuration::minutes(1),
            pricing_model,
        }
    }

    #[tokio::test]
    async fn test_stake_escrows_to_house() {
        let ledger = Arc::new(MemoryLedger::new().with_balance(2, 500));
        let engine = engine_with(ledger.clone());
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        let receipt = engine.stake(2, &market.id, "Yes", 200).await.unwrap();
        assert_eq!(receipt.amount, 200);
        assert_eq!(receipt.shares, 200.0);

        assert_eq!(ledger.get_balance(2).await.unwrap(), 300);
        assert_eq!(ledger.get_balance(HOUSE).await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_stake_rejects_insufficient_balance() {
        let ledger = Arc::new(MemoryLedger::new().with_balance(2, 50));
        let engine = engine_with(ledger.clone());
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        let err = engine.stake(2, &market.id, "Yes", 100).await.unwrap_err();
        assert!(matches!(
            err,
            MarketError::InsufficientBalance {
                balance: 50,
                needed: 100
            }
        ));
        // No escrow, no pool mutation.
        assert_eq!(ledger.get_balance(2).await.unwrap(), 50);
        assert_eq!(engine.bet_history(&market.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_failed_escrow_leaves_pool_untouched() {
        // Ledger fails the transfer after the balance check passed.
        let ledger = Arc::new(FlakyLedger::failing_transfers(
            MemoryLedger::new().with_balance(2, 500),
        ));
        let engine = engine_with(ledger.clone());
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        let err = engine.stake(2, &market.id, "Yes", 100).await.unwrap_err();
        assert!(matches!(err, MarketError::Ledger(_)));

        let markets = engine.list(&MarketFilter::default()).await;
        assert_eq!(markets[0].total_staked, 0);
    }

    #[tokio::test]
    async fn test_stake_on_unknown_market_or_option() {
        let ledger = Arc::new(MemoryLedger::new().with_balance(2, 500));
        let engine = engine_with(ledger);
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        assert!(matches!(
            engine.stake(2, "XXXXXXXX", "Yes", 10).await.unwrap_err(),
            MarketError::MarketNotFound(_)
        ));
        assert!(matches!(
            engine.stake(2, &market.id, "Maybe", 10).await.unwrap_err(),
            MarketError::InvalidOption(_)
        ));
        assert!(matches!(
            engine.stake(2, &market.id, "Yes", 0).await.unwrap_err(),
            MarketError::InvalidAmount(0)
        ));
    }

    #[tokio::test]
    async fn test_amm_stake_receipt_prices_match_quote() {
        let ledger = Arc::new(MemoryLedger::new().with_balance(2, 500));
        let engine = engine_with(ledger);
        let market = engine
            .create_market(create_request(PricingModel::ConstantProductAmm))
            .await
            .unwrap();

        let quote = engine.quote(&market.id, "Yes", 50).await.unwrap();
        let receipt = engine.stake(2, &market.id, "Yes", 50).await.unwrap();
        assert_eq!(receipt.shares, quote.shares);
        assert!((receipt.price_per_share - 1.5).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_resolve_requires_creator_and_closed_market() {
        let ledger = Arc::new(MemoryLedger::new().with_balance(2, 500));
        let engine = engine_with(ledger);
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        assert!(matches!(
            engine.resolve(2, &market.id, "Yes").await.unwrap_err(),
            MarketError::NotCreator { user: 2, .. }
        ));
        // Creator, but market still open.
        assert!(matches!(
            engine.resolve(1, &market.id, "Yes").await.unwrap_err(),
            MarketError::MarketNotClosed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_resolution_flow() {
        let ledger = Arc::new(
            MemoryLedger::new()
                .with_balance(2, 100)
                .with_balance(3, 300),
        );
        let engine = engine_with(ledger.clone());
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        engine.stake(2, &market.id, "Yes", 100).await.unwrap();
        engine.stake(3, &market.id, "No", 300).await.unwrap();

        // Let the close timer fire.
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;

        let report = engine.resolve(1, &market.id, "Yes").await.unwrap();
        assert_eq!(report.total_distributed, 400);
        assert_eq!(ledger.get_balance(2).await.unwrap(), 400);
        assert_eq!(ledger.get_balance(3).await.unwrap(), 0);

        let markets = engine.list(&MarketFilter::default()).await;
        assert_eq!(markets[0].state, MarketState::Resolved);

        // Second resolution attempt is rejected.
        assert!(matches!(
            engine.resolve(1, &market.id, "No").await.unwrap_err(),
            MarketError::AlreadyResolved(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stake_rejected_after_close() {
        let ledger = Arc::new(MemoryLedger::new().with_balance(2, 500));
        let engine = engine_with(ledger);
        let market = engine
            .create_market(create_request(PricingModel::PariMutuel))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(61)).await;

        assert!(matches!(
            engine.stake(2, &market.id, "Yes", 10).await.unwrap_err(),
            MarketError::MarketClosed(_)
        ));
    }
}
