//! Common test utilities for parlay-core tests.
//!
//! Shared builders for markets and fault-injecting collaborator
//! implementations used across the module tests.

use crate::config::DEFAULT_INITIAL_LIQUIDITY;
use crate::ledger::{LedgerClient, LedgerError, MemoryLedger};
use crate::market::{Market, PricingModel, UserId};
use async_trait::async_trait;
use chrono::{Duration, Utc};

/// House/escrow account used by engine tests.
pub const HOUSE: UserId = 999;

/// A pari-mutuel market created by user 1, closing in one minute.
pub fn pari_market(options: &[&str]) -> Market {
    pari_market_with(options, 1, None)
}

/// A pari-mutuel market with an explicit creator and category.
pub fn pari_market_with(options: &[&str], creator: UserId, category: Option<&str>) -> Market {
    let now = Utc::now();
    Market::new(
        "Who will win the match?".to_string(),
        options.iter().map(|o| o.to_string()).collect(),
        creator,
        category.map(|c| c.to_string()),
        now,
        now + Duration::minutes(1),
        PricingModel::PariMutuel,
        DEFAULT_INITIAL_LIQUIDITY,
    )
    .unwrap()
}

/// A two-option AMM market with both reserves at 100 (`k = 10000`).
pub fn amm_market() -> Market {
    let now = Utc::now();
    Market::new(
        "Will it rain tomorrow?".to_string(),
        vec!["Yes".to_string(), "No".to_string()],
        1,
        None,
        now,
        now + Duration::minutes(1),
        PricingModel::ConstantProductAmm,
        DEFAULT_INITIAL_LIQUIDITY,
    )
    .unwrap()
}

/// Ledger wrapper that fails selected operations, for exercising the
/// engine's abort and compensation paths.
pub struct FlakyLedger {
    inner: MemoryLedger,
    fail_transfers: bool,
    fail_credits: bool,
}

impl FlakyLedger {
    /// Every transfer fails; balances and credits behave normally.
    pub fn failing_transfers(inner: MemoryLedger) -> Self {
        Self {
            inner,
            fail_transfers: true,
            fail_credits: false,
        }
    }

    /// Every credit fails; useful for settlement failure reporting.
    pub fn failing_credits(inner: MemoryLedger) -> Self {
        Self {
            inner,
            fail_transfers: false,
            fail_credits: true,
        }
    }
}

#[async_trait]
impl LedgerClient for FlakyLedger {
    async fn get_balance(&self, user_id: UserId) -> Result<u64, LedgerError> {
        self.inner.get_balance(user_id).await
    }

    async fn credit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError> {
        if self.fail_credits {
            return Err(LedgerError::Unavailable("injected credit failure".to_string()));
        }
        self.inner.credit_points(user_id, amount).await
    }

    async fn debit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError> {
        self.inner.debit_points(user_id, amount).await
    }

    async fn transfer_points(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if self.fail_transfers {
            return Err(LedgerError::Unavailable(
                "injected transfer failure".to_string(),
            ));
        }
        self.inner
            .transfer_points(from_user_id, to_user_id, amount)
            .await
    }
}
